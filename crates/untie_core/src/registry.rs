//! Monitor registry: one [`ActorMonitor`] per eligible connected actor.
//!
//! The registry owns the scheduler and every live monitor. The hosting
//! server feeds it [`LifecycleEvent`]s and calls
//! [`MonitorRegistry::run_until`] once per server tick.
//!
//! Connect, disconnect and unload act immediately. Permission and group
//! changes only queue a reconcile, which runs at the start of the next
//! `run_until`, so a host iterating its player list never sees a monitor
//! appear or vanish mid-iteration.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::UntieConfig;
use crate::context::{ChatSink, MonitorContext, Permissions};
use crate::error::{ConfigError, UntieError};
use crate::ids::{ActorId, TargetId};
use crate::messages::MessageCatalog;
use crate::monitor::ActorMonitor;
use crate::scheduler::Scheduler;
use crate::world::World;

/// Permission an actor needs for a monitor.
pub const USE_PERMISSION: &str = "instantuntie.use";

/// Events from the hosting server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The server finished loading; attach every connected actor.
    ServerInitialized,
    /// An actor connected.
    Connected(ActorId),
    /// An actor disconnected.
    Disconnected(ActorId),
    /// The module is being unloaded; stop everything.
    Unload,
    /// A permission was granted directly to an actor.
    UserPermissionGranted {
        /// The actor.
        actor: ActorId,
        /// The permission name.
        permission: String,
    },
    /// A permission was revoked directly from an actor.
    UserPermissionRevoked {
        /// The actor.
        actor: ActorId,
        /// The permission name.
        permission: String,
    },
    /// An actor joined a group.
    UserGroupAdded {
        /// The actor.
        actor: ActorId,
        /// The group name.
        group: String,
    },
    /// An actor left a group.
    UserGroupRemoved {
        /// The actor.
        actor: ActorId,
        /// The group name.
        group: String,
    },
    /// A permission was granted to a group.
    GroupPermissionGranted {
        /// The group name.
        group: String,
        /// The permission name.
        permission: String,
    },
    /// A permission was revoked from a group.
    GroupPermissionRevoked {
        /// The group name.
        group: String,
        /// The permission name.
        permission: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reconcile {
    Actor(ActorId),
    AllActive,
}

/// All live monitors plus the scheduler that drives them.
#[derive(Debug)]
pub struct MonitorRegistry {
    config: Arc<UntieConfig>,
    messages: MessageCatalog,
    scheduler: Scheduler,
    monitors: HashMap<ActorId, ActorMonitor>,
    deferred: Vec<Reconcile>,
}

impl MonitorRegistry {
    /// Create an empty registry. `seed` drives the poll jitter.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `config` fails
    /// [`UntieConfig::validate`].
    pub fn new(
        config: UntieConfig,
        messages: MessageCatalog,
        seed: u64,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            messages,
            scheduler: Scheduler::new(seed),
            monitors: HashMap::new(),
            deferred: Vec::new(),
        })
    }

    /// The scheduler, for inspection.
    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// The monitor for `actor`, if one is live.
    #[must_use]
    pub fn monitor(&self, actor: ActorId) -> Option<&ActorMonitor> {
        self.monitors.get(&actor)
    }

    /// Iterate live monitors.
    pub fn monitors(&self) -> impl Iterator<Item = &ActorMonitor> {
        self.monitors.values()
    }

    /// Number of live monitors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    /// Returns `true` if no monitor is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }

    /// Targets with a pending commit, by actor.
    #[must_use]
    pub fn pending_commits(&self) -> Vec<(ActorId, TargetId)> {
        let mut pending: Vec<_> = self
            .monitors
            .values()
            .filter_map(|m| m.pending_target().map(|t| (m.actor(), t)))
            .collect();
        pending.sort();
        pending
    }

    /// Apply a lifecycle event.
    pub fn handle(
        &mut self,
        event: LifecycleEvent,
        now: f64,
        world: &dyn World,
        permissions: &dyn Permissions,
    ) {
        debug!(?event, now, "lifecycle event");
        match event {
            LifecycleEvent::ServerInitialized => {
                for actor in world.active_actors() {
                    self.attach(actor, now, permissions);
                }
            }
            LifecycleEvent::Connected(actor) => {
                self.attach(actor, now, permissions);
            }
            LifecycleEvent::Disconnected(actor) => {
                self.detach(actor);
            }
            LifecycleEvent::Unload => {
                self.shutdown();
            }
            LifecycleEvent::UserPermissionGranted { actor, permission }
            | LifecycleEvent::UserPermissionRevoked { actor, permission } => {
                if permission == USE_PERMISSION {
                    self.defer(Reconcile::Actor(actor));
                }
            }
            LifecycleEvent::UserGroupAdded { actor, .. }
            | LifecycleEvent::UserGroupRemoved { actor, .. } => {
                self.defer(Reconcile::Actor(actor));
            }
            LifecycleEvent::GroupPermissionGranted { permission, .. }
            | LifecycleEvent::GroupPermissionRevoked { permission, .. } => {
                if permission == USE_PERMISSION {
                    self.defer(Reconcile::AllActive);
                }
            }
        }
    }

    /// Start a monitor for `actor` if it holds [`USE_PERMISSION`] and has
    /// none yet. Returns `true` if one was started.
    pub fn attach(&mut self, actor: ActorId, now: f64, permissions: &dyn Permissions) -> bool {
        if !permissions.has_permission(actor, USE_PERMISSION) {
            debug!(%actor, "not attaching, permission missing");
            return false;
        }
        if self.monitors.contains_key(&actor) {
            return false;
        }

        let monitor = ActorMonitor::start(actor, Arc::clone(&self.config), now, &mut self.scheduler);
        self.monitors.insert(actor, monitor);
        info!(%actor, monitors = self.monitors.len(), "monitor attached");
        true
    }

    /// Stop and forget the monitor for `actor`. Returns `true` if there was
    /// one.
    pub fn detach(&mut self, actor: ActorId) -> bool {
        match self.monitors.remove(&actor) {
            Some(mut monitor) => {
                monitor.stop(&mut self.scheduler);
                true
            }
            None => false,
        }
    }

    /// Stop every monitor and drop queued reconciles. Returns how many
    /// monitors were stopped.
    pub fn shutdown(&mut self) -> usize {
        let count = self.monitors.len();
        for (_, mut monitor) in self.monitors.drain() {
            monitor.stop(&mut self.scheduler);
        }
        self.deferred.clear();
        info!(stopped = count, "all monitors stopped");
        count
    }

    /// Run queued reconciles, then every timer due at or before `now`.
    /// Returns the number of timers that fired.
    ///
    /// Monitors whose actor has vanished from the world are stopped and
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns [`UntieError::Message`] if a notification fails to render.
    /// Timers still due are left for the next call.
    pub fn run_until(
        &mut self,
        now: f64,
        world: &mut dyn World,
        permissions: &dyn Permissions,
        chat: &mut dyn ChatSink,
    ) -> Result<usize, UntieError> {
        for reconcile in std::mem::take(&mut self.deferred) {
            match reconcile {
                Reconcile::Actor(actor) => self.reconcile(actor, now, &*world, permissions),
                Reconcile::AllActive => {
                    for actor in world.active_actors() {
                        self.reconcile(actor, now, &*world, permissions);
                    }
                }
            }
        }

        let mut fired_count = 0;
        while let Some(fired) = self.scheduler.pop_due(now) {
            let actor = fired.task.actor();
            let Some(monitor) = self.monitors.get_mut(&actor) else {
                self.scheduler.cancel(fired.handle);
                continue;
            };
            fired_count += 1;

            let mut cx = MonitorContext {
                now: fired.at,
                scheduler: &mut self.scheduler,
                world: &mut *world,
                chat: &mut *chat,
                messages: &self.messages,
            };
            match monitor.dispatch(fired, &mut cx) {
                Ok(()) => {}
                Err(UntieError::ActorGone(gone)) => {
                    warn!(actor = %gone, "actor vanished, stopping its monitor");
                    self.detach(gone);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(fired_count)
    }

    fn defer(&mut self, reconcile: Reconcile) {
        if !self.deferred.contains(&reconcile) {
            self.deferred.push(reconcile);
        }
    }

    /// Make monitor presence match permission for a connected actor.
    fn reconcile(
        &mut self,
        actor: ActorId,
        now: f64,
        world: &dyn World,
        permissions: &dyn Permissions,
    ) {
        if world.actor(actor).is_none() {
            return;
        }
        let has_permission = permissions.has_permission(actor, USE_PERMISSION);
        let has_monitor = self.monitors.contains_key(&actor);
        if has_permission == has_monitor {
            return;
        }

        if has_monitor {
            info!(%actor, "permission lost, detaching monitor");
            self.detach(actor);
        } else {
            self.attach(actor, now, permissions);
        }
    }
}
