//! # untie_host
//!
//! Headless server that drives the untie state machine against an
//! in-memory world. Actors, crates and player input come from a JSON script
//! (see [`script`]); a built-in demo runs when none is given.
//!
//! ## Startup Sequence
//!
//! 1. Load `--config`, writing defaults if the file does not exist.
//! 2. Load per-language message overrides from `--lang`, if given.
//! 3. Load `--script`, or fall back to the demo.
//! 4. Run the fixed-timestep loop, paced to wall-clock time with
//!    `--realtime`, otherwise as fast as possible.

mod chat;
mod lang;
mod permissions;
mod script;
mod tick;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use script::Script;
use tick::{TickConfig, TickLoop};
use untie_core::{MessageCatalog, MonitorRegistry, UntieConfig};

#[derive(Debug, Parser)]
#[command(name = "untie_host", about = "Run an underwater untie simulation")]
struct Args {
    /// JSON config file. Created with defaults if missing.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory of `<language>.json` message overrides.
    #[arg(long)]
    lang: Option<PathBuf>,

    /// JSON scenario script. Runs the built-in demo if omitted.
    #[arg(long)]
    script: Option<PathBuf>,

    /// Stop after this many ticks (0 = when the script is done).
    #[arg(long, default_value_t = 0)]
    ticks: u64,

    /// Server ticks per second.
    #[arg(long, default_value_t = 50.0)]
    tick_rate: f64,

    /// Pace ticks to wall-clock time.
    #[arg(long)]
    realtime: bool,

    /// Seed for poll jitter.
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("untie_host=info".parse()?))
        .init();

    let args = Args::parse();
    if !(args.tick_rate.is_finite() && args.tick_rate > 0.0) {
        anyhow::bail!("--tick-rate must be a positive number");
    }

    let config = match &args.config {
        Some(path) => UntieConfig::load_or_init(path)?,
        None => UntieConfig::default(),
    };

    let mut messages = MessageCatalog::new();
    if let Some(dir) = &args.lang {
        lang::load_language_dir(dir, &mut messages)?;
    }

    let script = match &args.script {
        Some(path) => Script::load(path)?,
        None => {
            info!("no script given, running the demo");
            Script::demo()
        }
    };

    info!(
        actors = script.actors.len(),
        targets = script.targets.len(),
        steps = script.steps.len(),
        duration = script.duration(),
        delay = config.commit_delay,
        "untie host starting"
    );

    let registry = MonitorRegistry::new(config, messages, args.seed)?;
    let tick_config = TickConfig {
        tick_rate: args.tick_rate,
        max_ticks: args.ticks,
    };
    let mut tick_loop = TickLoop::new(tick_config, registry, script);

    let summary = if args.realtime {
        tick_loop.run_async().await?
    } else {
        tick_loop.run_fast()?
    };

    info!(
        ticks = summary.ticks,
        timers_fired = summary.timers_fired,
        untied = ?summary.untied,
        still_tied = ?summary.still_tied,
        chat_lines = summary.chat_lines,
        "untie host shut down"
    );
    Ok(())
}
