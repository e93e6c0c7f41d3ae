//! Fixed-timestep server loop.
//!
//! Each tick advances the server clock by one step, applies the script steps
//! that have come due, then lets the registry fire every timer due at or
//! before the new time.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::{debug, info, warn};
use untie_core::{
    ActorId, ActorState, LifecycleEvent, MonitorRegistry, SimWorld, TargetBody, TargetId,
    USE_PERMISSION, World,
};
use untie_math::Pose;

use crate::chat::ChatLog;
use crate::permissions::GrantTable;
use crate::script::{Action, ActorSpec, Script, Step};

/// Configuration for the tick loop.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Ticks per second.
    pub tick_rate: f64,
    /// Maximum number of ticks to run (0 = until the script is done and
    /// nothing is pending).
    pub max_ticks: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate: 50.0,
            max_ticks: 0,
        }
    }
}

/// What a finished run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Ticks run.
    pub ticks: u64,
    /// Timers fired across all monitors.
    pub timers_fired: u64,
    /// Targets freed during the run, sorted.
    pub untied: Vec<TargetId>,
    /// Targets still tied down at the end, sorted.
    pub still_tied: Vec<TargetId>,
    /// Chat lines delivered.
    pub chat_lines: usize,
}

/// The host's loop state.
#[derive(Debug)]
pub struct TickLoop {
    tick_id: u64,
    config: TickConfig,
    registry: MonitorRegistry,
    world: SimWorld,
    grants: GrantTable,
    chat: ChatLog,
    roster: Vec<ActorSpec>,
    targets: Vec<TargetId>,
    steps: VecDeque<Step>,
    timers_fired: u64,
}

impl TickLoop {
    /// Build the world described by `script` and announce server start.
    #[must_use]
    pub fn new(config: TickConfig, registry: MonitorRegistry, script: Script) -> Self {
        let mut world = SimWorld::new();
        let mut targets = Vec::with_capacity(script.targets.len());
        for spec in &script.targets {
            let mut body = TargetBody::tied(spec.position);
            if let Some(effect) = &spec.freed_effect {
                body = body.with_freed_effect(effect.clone());
            }
            world.insert_target(spec.id, body, spec.radius);
            targets.push(spec.id);
        }
        targets.sort();

        let mut grants = GrantTable::new();
        for &actor in &script.grants {
            grants.grant_user(actor, USE_PERMISSION);
        }

        let mut tick_loop = Self {
            tick_id: 0,
            config,
            registry,
            world,
            grants,
            chat: ChatLog::new(),
            roster: script.actors,
            targets,
            steps: script.steps.into(),
            timers_fired: 0,
        };
        tick_loop.registry.handle(
            LifecycleEvent::ServerInitialized,
            0.0,
            &tick_loop.world,
            &tick_loop.grants,
        );
        tick_loop
    }

    /// Returns the current tick counter.
    #[must_use]
    pub fn tick_id(&self) -> u64 {
        self.tick_id
    }

    /// Server time at the current tick, in seconds.
    #[must_use]
    pub fn now(&self) -> f64 {
        self.tick_id as f64 / self.config.tick_rate
    }

    #[must_use]
    pub fn world(&self) -> &SimWorld {
        &self.world
    }

    #[must_use]
    pub fn registry(&self) -> &MonitorRegistry {
        &self.registry
    }

    #[must_use]
    pub fn chat(&self) -> &ChatLog {
        &self.chat
    }

    /// Whether every script step has been applied.
    #[must_use]
    pub fn script_done(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run one tick.
    ///
    /// # Errors
    ///
    /// Returns an error if a notification fails to render.
    pub fn tick(&mut self) -> Result<()> {
        self.tick_id += 1;
        let now = self.now();

        while self.steps.front().is_some_and(|s| s.at <= now) {
            if let Some(step) = self.steps.pop_front() {
                self.apply(step.action, now);
            }
        }

        let fired = self
            .registry
            .run_until(now, &mut self.world, &self.grants, &mut self.chat)?;
        self.timers_fired += fired as u64;

        if fired > 0 {
            debug!(tick_id = self.tick_id, now, fired, "timers fired");
        }
        Ok(())
    }

    fn apply(&mut self, action: Action, now: f64) {
        debug!(?action, now, "script step");
        let event = match action {
            Action::Connect { actor } => {
                let Some(spec) = self.roster.iter().find(|a| a.id == actor) else {
                    warn!(%actor, "connect for unknown actor");
                    return;
                };
                self.world.spawn_actor(actor, spawn_state(spec));
                Some(LifecycleEvent::Connected(actor))
            }
            Action::Disconnect { actor } => {
                self.world.despawn_actor(actor);
                Some(LifecycleEvent::Disconnected(actor))
            }
            Action::SetWaterFactor { actor, water_factor } => {
                warn_if_absent(actor, self.world.set_water_factor(actor, water_factor));
                None
            }
            Action::LookAt { actor, point } => {
                warn_if_absent(actor, self.world.look_at(actor, point));
                None
            }
            Action::PressUse { actor } => {
                warn_if_absent(actor, self.world.set_use_held(actor, true));
                None
            }
            Action::ReleaseUse { actor } => {
                warn_if_absent(actor, self.world.set_use_held(actor, false));
                None
            }
            Action::Grant { actor } => Some(self.grants.grant_user(actor, USE_PERMISSION)),
            Action::Revoke { actor } => Some(self.grants.revoke_user(actor, USE_PERMISSION)),
            Action::JoinGroup { actor, group } => Some(self.grants.add_to_group(actor, &group)),
            Action::LeaveGroup { actor, group } => {
                Some(self.grants.remove_from_group(actor, &group))
            }
            Action::GrantGroup { group } => Some(self.grants.grant_group(&group, USE_PERMISSION)),
            Action::RevokeGroup { group } => {
                Some(self.grants.revoke_group(&group, USE_PERMISSION))
            }
            Action::Unload => Some(LifecycleEvent::Unload),
        };

        if let Some(event) = event {
            self.registry.handle(event, now, &self.world, &self.grants);
        }
    }

    fn finished(&self, tick_count: u64) -> bool {
        if self.config.max_ticks > 0 {
            tick_count >= self.config.max_ticks
        } else {
            self.script_done() && self.registry.pending_commits().is_empty()
        }
    }

    /// Run without sleeping until the tick limit, or until the script is
    /// done and no commit is pending.
    ///
    /// # Errors
    ///
    /// See [`TickLoop::tick`].
    pub fn run_fast(&mut self) -> Result<RunSummary> {
        info!(max_ticks = self.config.max_ticks, "running without pacing");
        let mut tick_count = 0u64;
        while !self.finished(tick_count) {
            self.tick()?;
            tick_count += 1;
        }
        info!(ticks = tick_count, now = self.now(), "tick loop complete");
        Ok(self.summary())
    }

    /// Run paced to wall-clock time.
    ///
    /// # Errors
    ///
    /// See [`TickLoop::tick`].
    pub async fn run_async(&mut self) -> Result<RunSummary> {
        let tick_duration = Duration::from_secs_f64(1.0 / self.config.tick_rate);
        let mut interval = tokio::time::interval(tick_duration);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut tick_count = 0u64;

        info!(
            tick_rate = self.config.tick_rate,
            max_ticks = self.config.max_ticks,
            "starting tick loop"
        );

        while !self.finished(tick_count) {
            interval.tick().await;
            let start = Instant::now();

            self.tick()?;
            tick_count += 1;

            let elapsed = start.elapsed();
            if elapsed > tick_duration {
                warn!(
                    tick_id = self.tick_id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    budget_ms = tick_duration.as_millis() as u64,
                    "tick exceeded time budget"
                );
            }
        }

        info!(ticks = tick_count, now = self.now(), "tick loop complete");
        Ok(self.summary())
    }

    /// Snapshot of the run so far.
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        let (still_tied, untied) = self
            .targets
            .iter()
            .copied()
            .partition(|&id| self.world.is_eligible(id));
        RunSummary {
            ticks: self.tick_id,
            timers_fired: self.timers_fired,
            untied,
            still_tied,
            chat_lines: self.chat.lines().len(),
        }
    }
}

fn warn_if_absent(actor: ActorId, applied: bool) {
    if !applied {
        warn!(%actor, "script step for disconnected actor ignored");
    }
}

fn spawn_state(spec: &ActorSpec) -> ActorState {
    let eyes = match spec.look_at {
        Some(point) => Pose::looking_at(spec.position, point),
        None => Pose::from_position(spec.position),
    };
    let mut state = ActorState::new(eyes);
    state.language = spec.language.clone();
    state
}
