//! Per-actor monitor.
//!
//! An [`ActorMonitor`] owns one actor's [`MonitorState`] and its timers:
//!
//! 1. A repeating, jittered precondition poll, started immediately. It
//!    turns the detection tick on when the actor is fully submerged and
//!    off when it is not.
//! 2. A repeating detection tick, live only while the precondition holds.
//! 3. At most one one-shot commit timer, owned by [`PendingCommit`].
//!
//! Turning the detection tick off does not cancel a pending commit. Only
//! releasing the key (seen by a detection tick) or [`ActorMonitor::stop`]
//! does.

use std::sync::Arc;

use tracing::{debug, info};

use crate::commit::{self, CommitOutcome};
use crate::config::UntieConfig;
use crate::context::MonitorContext;
use crate::detection::{self, Decision};
use crate::error::UntieError;
use crate::ids::{ActorId, TargetId};
use crate::scheduler::{Fired, Scheduler, Task, TimerHandle};

/// A commit waiting for its timer. Target and timer exist together or not
/// at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingCommit {
    /// The target that will be untied.
    pub target: TargetId,
    /// The one-shot commit timer.
    pub timer: TimerHandle,
}

/// Mutable state of one actor's machine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonitorState {
    /// Whether the detection tick is running.
    pub precondition_active: bool,
    /// Earliest time the next probe may run.
    pub next_probe_time: f64,
    /// The armed commit, if any.
    pub pending: Option<PendingCommit>,
}

impl MonitorState {
    /// Arm a commit on `target`, replacing (and canceling) any previous one.
    pub(crate) fn arm(
        &mut self,
        actor: ActorId,
        target: TargetId,
        delay: f64,
        cx: &mut MonitorContext<'_>,
    ) {
        if let Some(previous) = self.pending.take() {
            cx.scheduler.cancel(previous.timer);
        }
        let timer = cx.scheduler.schedule_once(cx.now, delay, Task::Commit(actor));
        self.pending = Some(PendingCommit { target, timer });
    }

    /// The target of the pending commit.
    #[must_use]
    pub fn pending_target(&self) -> Option<TargetId> {
        self.pending.map(|p| p.target)
    }
}

/// One actor's hold-to-untie machine.
#[derive(Debug)]
pub struct ActorMonitor {
    actor: ActorId,
    config: Arc<UntieConfig>,
    poll_timer: Option<TimerHandle>,
    detection_timer: Option<TimerHandle>,
    state: MonitorState,
}

impl ActorMonitor {
    /// Create the monitor and start polling the precondition at `now`.
    #[must_use]
    pub fn start(
        actor: ActorId,
        config: Arc<UntieConfig>,
        now: f64,
        scheduler: &mut Scheduler,
    ) -> Self {
        let poll_timer = scheduler.schedule_repeating(
            now,
            0.0,
            config.precondition_poll_interval,
            config.poll_jitter,
            Task::PollPrecondition(actor),
        );
        debug!(%actor, interval = config.precondition_poll_interval, "monitor started");
        Self {
            actor,
            config,
            poll_timer: Some(poll_timer),
            detection_timer: None,
            state: MonitorState::default(),
        }
    }

    /// The monitored actor.
    #[must_use]
    pub fn actor(&self) -> ActorId {
        self.actor
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> &MonitorState {
        &self.state
    }

    /// Whether the detection tick is running.
    #[must_use]
    pub fn precondition_active(&self) -> bool {
        self.state.precondition_active
    }

    /// The target of the pending commit.
    #[must_use]
    pub fn pending_target(&self) -> Option<TargetId> {
        self.state.pending_target()
    }

    /// Whether a commit is pending.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.state.pending.is_some()
    }

    /// Whether the monitor still owns live timers (not stopped).
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.poll_timer.is_some()
    }

    /// Route a fired timer to its handler. Timers that no longer belong to
    /// this monitor are ignored.
    ///
    /// # Errors
    ///
    /// Propagates handler errors.
    pub fn dispatch(&mut self, fired: Fired, cx: &mut MonitorContext<'_>) -> Result<(), UntieError> {
        match fired.task {
            Task::PollPrecondition(_) if self.poll_timer == Some(fired.handle) => {
                self.on_periodic_check(cx)
            }
            Task::DetectionTick(_) if self.detection_timer == Some(fired.handle) => {
                self.on_detection_tick(cx).map(|_| ())
            }
            Task::Commit(_) => self.on_commit_timer(fired.handle, cx).map(|_| ()),
            _ => {
                debug!(actor = %self.actor, handle = fired.handle.id(), "ignoring foreign timer");
                Ok(())
            }
        }
    }

    /// Poll the submersion precondition and switch the detection tick.
    ///
    /// # Errors
    ///
    /// Returns [`UntieError::ActorGone`] if the actor vanished.
    pub fn on_periodic_check(&mut self, cx: &mut MonitorContext<'_>) -> Result<(), UntieError> {
        let submerged = cx
            .world
            .actor(self.actor)
            .map(|a| a.is_submerged())
            .ok_or(UntieError::ActorGone(self.actor))?;

        if submerged && !self.state.precondition_active {
            let interval = self.config.detection_interval;
            self.detection_timer = Some(cx.scheduler.schedule_repeating(
                cx.now,
                interval,
                interval,
                0.0,
                Task::DetectionTick(self.actor),
            ));
            self.state.precondition_active = true;
            debug!(actor = %self.actor, now = cx.now, "submerged, detection enabled");
        } else if !submerged && self.state.precondition_active {
            if let Some(timer) = self.detection_timer.take() {
                cx.scheduler.cancel(timer);
            }
            self.state.precondition_active = false;
            debug!(actor = %self.actor, now = cx.now, "surfaced, detection disabled");
        }
        Ok(())
    }

    /// Run one detection tick.
    ///
    /// # Errors
    ///
    /// See [`detection::step`].
    pub fn on_detection_tick(
        &mut self,
        cx: &mut MonitorContext<'_>,
    ) -> Result<Decision, UntieError> {
        detection::step(&mut self.state, self.actor, &self.config, cx)
    }

    /// The commit timer `handle` fired. Untie the pending target if the
    /// handle is the armed one, then return to Idle.
    ///
    /// Returns `None` if `handle` is not the armed timer.
    ///
    /// # Errors
    ///
    /// Returns [`UntieError::ActorGone`] if the actor vanished; the commit is
    /// not applied for a missing actor.
    pub fn on_commit_timer(
        &mut self,
        handle: TimerHandle,
        cx: &mut MonitorContext<'_>,
    ) -> Result<Option<CommitOutcome>, UntieError> {
        let Some(pending) = self.state.pending.filter(|p| p.timer == handle) else {
            return Ok(None);
        };
        if cx.world.actor(self.actor).is_none() {
            return Err(UntieError::ActorGone(self.actor));
        }

        self.state.pending = None;
        let outcome = commit::untie(
            &mut *cx.world,
            pending.target,
            self.config.commit_buoyancy_scale,
        );
        debug!(actor = %self.actor, target = %pending.target, ?outcome, "commit timer fired");
        Ok(Some(outcome))
    }

    /// Cancel every timer and clear the state.
    pub fn stop(&mut self, scheduler: &mut Scheduler) {
        let timers = [
            self.poll_timer.take(),
            self.detection_timer.take(),
            self.state.pending.take().map(|p| p.timer),
        ];
        for timer in timers.into_iter().flatten() {
            scheduler.cancel(timer);
        }
        self.state = MonitorState::default();
        info!(actor = %self.actor, "monitor stopped");
    }
}
