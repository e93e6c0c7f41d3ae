//! # untie_core
//!
//! Hold-to-untie state machine for underwater crates.
//!
//! Each connected actor with the use permission gets an [`ActorMonitor`].
//! The monitor polls, at a slow jittered interval, whether the actor is fully
//! submerged. While it is, a fast detection tick watches the use key: holding
//! it while looking at a tied crate within reach arms a one-shot commit
//! timer, and releasing it before the timer fires cancels the untie.
//!
//! This crate provides:
//!
//! - [`MonitorRegistry`]: one monitor per eligible actor, driven by
//!   [`LifecycleEvent`]s and [`MonitorRegistry::run_until`].
//! - [`ActorMonitor`] and the [`detection`] step: the per-actor machine.
//! - [`commit::untie`]: the idempotent untie itself.
//! - [`Scheduler`]: cancelable one-shot and repeating timers.
//! - [`World`]: the seam to the game, with [`SimWorld`] as an in-memory
//!   implementation.
//! - [`UntieConfig`] and [`MessageCatalog`]: configuration and notification
//!   templates.

pub mod commit;
pub mod config;
pub mod context;
pub mod detection;
pub mod error;
pub mod ids;
pub mod messages;
pub mod monitor;
pub mod registry;
pub mod scheduler;
pub mod sim;
pub mod world;

#[cfg(test)]
mod scenarios;

pub use commit::CommitOutcome;
pub use config::UntieConfig;
pub use context::{ChatSink, MonitorContext, Permissions};
pub use detection::Decision;
pub use error::{ConfigError, MessageError, UntieError};
pub use ids::{ActorId, TargetId};
pub use messages::{MessageCatalog, MessageKey};
pub use monitor::{ActorMonitor, MonitorState, PendingCommit};
pub use registry::{LifecycleEvent, MonitorRegistry, USE_PERMISSION};
pub use scheduler::{Fired, Scheduler, Task, TimerHandle};
pub use sim::SimWorld;
pub use world::{ActorState, Buoyancy, TargetBody, World};
