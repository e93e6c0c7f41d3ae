//! Per-tick hold detection.
//!
//! Runs on every detection tick while the actor is submerged. The loop is
//! either **Idle** (no pending commit) or **Armed** (one pending commit on a
//! target):
//!
//! - Idle, key held, rate limit elapsed: probe along the eyes. An eligible
//!   hit arms a one-shot commit timer.
//! - Armed, key released: cancel the timer and return to Idle.
//!
//! The commit timer firing is handled by
//! [`ActorMonitor::on_commit_timer`](crate::monitor::ActorMonitor::on_commit_timer).

use tracing::{debug, info};

use crate::config::UntieConfig;
use crate::context::MonitorContext;
use crate::error::UntieError;
use crate::ids::{ActorId, TargetId};
use crate::messages::MessageKey;
use crate::monitor::MonitorState;

/// What one detection tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Idle with the key up.
    KeyUp,
    /// Idle, key held, but too soon since the last probe.
    RateLimited,
    /// Probed and found nothing eligible.
    Missed,
    /// Probed and armed a commit on the target.
    Armed(TargetId),
    /// Armed and the key is still held.
    Holding(TargetId),
    /// Armed, the key was released and the commit canceled.
    Canceled(TargetId),
}

impl Decision {
    /// Whether a probe was attempted on this tick.
    #[must_use]
    pub fn probed(self) -> bool {
        matches!(self, Self::Missed | Self::Armed(_))
    }
}

/// Evaluate one detection tick for `actor`.
///
/// # Errors
///
/// Returns [`UntieError::ActorGone`] if the actor vanished, and
/// [`UntieError::Message`] if a notification fails to render. State
/// transitions are applied before notifying, so the state stays consistent
/// on error.
pub fn step(
    state: &mut MonitorState,
    actor: ActorId,
    config: &UntieConfig,
    cx: &mut MonitorContext<'_>,
) -> Result<Decision, UntieError> {
    let (held, ray) = cx
        .world
        .actor(actor)
        .map(|a| (a.use_held, a.head_ray()))
        .ok_or(UntieError::ActorGone(actor))?;

    if let Some(pending) = state.pending {
        if held {
            return Ok(Decision::Holding(pending.target));
        }

        cx.scheduler.cancel(pending.timer);
        state.pending = None;
        info!(%actor, target = %pending.target, "untie canceled, use key released");

        if config.show_canceled_notification {
            cx.notify(actor, MessageKey::Canceled, &[])?;
        }
        return Ok(Decision::Canceled(pending.target));
    }

    if !held {
        return Ok(Decision::KeyUp);
    }
    if cx.now < state.next_probe_time {
        return Ok(Decision::RateLimited);
    }

    state.next_probe_time = cx.now + config.probe_rate_limit;
    let hit = cx
        .world
        .raycast(&ray, config.probe_distance)
        .filter(|&target| cx.world.is_eligible(target));
    let Some(target) = hit else {
        debug!(%actor, now = cx.now, "probe found no tied target");
        return Ok(Decision::Missed);
    };

    state.arm(actor, target, config.commit_delay, cx);
    info!(%actor, %target, delay = config.commit_delay, "untie started");

    if config.show_started_notification {
        cx.notify(actor, MessageKey::Untie, &[&config.commit_delay])?;
    }
    Ok(Decision::Armed(target))
}

#[cfg(test)]
mod tests {
    use untie_math::{Pose, Vec3};

    use super::*;
    use crate::messages::MessageCatalog;
    use crate::scheduler::Scheduler;
    use crate::sim::SimWorld;
    use crate::world::{ActorState, TargetBody, World};

    const ACTOR: ActorId = ActorId(5);

    struct Fixture {
        state: MonitorState,
        scheduler: Scheduler,
        world: SimWorld,
        chat: Vec<(ActorId, String)>,
        messages: MessageCatalog,
        config: UntieConfig,
    }

    impl Fixture {
        fn new(config: UntieConfig) -> Self {
            let mut world = SimWorld::new();
            let mut actor = ActorState::new(Pose::from_position(Vec3::new(0.0, -6.0, 0.0)));
            actor.water_factor = 1.0;
            world.spawn_actor(ACTOR, actor);
            Self {
                state: MonitorState::default(),
                scheduler: Scheduler::new(0),
                world,
                chat: Vec::new(),
                messages: MessageCatalog::new(),
                config,
            }
        }

        fn add_box(&mut self, distance: f32) -> TargetId {
            self.world
                .spawn_target(TargetBody::tied(Vec3::new(0.0, -6.0, distance)))
        }

        fn tick(&mut self, now: f64) -> Decision {
            let mut cx = MonitorContext {
                now,
                scheduler: &mut self.scheduler,
                world: &mut self.world,
                chat: &mut self.chat,
                messages: &self.messages,
            };
            step(&mut self.state, ACTOR, &self.config, &mut cx).unwrap()
        }
    }

    fn delayed(seconds: f64) -> UntieConfig {
        UntieConfig::default().with_commit_delay(seconds)
    }

    #[test]
    fn test_key_up_does_nothing() {
        let mut f = Fixture::new(delayed(2.0));
        f.add_box(2.0);
        assert_eq!(f.tick(0.0), Decision::KeyUp);
        assert!(f.scheduler.is_empty());
        assert_eq!(f.state.next_probe_time, 0.0);
    }

    #[test]
    fn test_hold_on_tied_box_arms() {
        let mut f = Fixture::new(delayed(2.0));
        let target = f.add_box(2.0);
        f.world.set_use_held(ACTOR, true);

        assert_eq!(f.tick(1.0), Decision::Armed(target));
        let pending = f.state.pending.unwrap();
        assert_eq!(pending.target, target);
        assert!(f.scheduler.is_scheduled(pending.timer));
        assert_eq!(f.scheduler.next_due(), Some(3.0));
        assert_eq!(f.state.next_probe_time, 2.0);

        assert_eq!(f.chat.len(), 1);
        assert!(f.chat[0].1.contains("The box will untie in 2 seconds."));

        assert_eq!(f.tick(1.02), Decision::Holding(target));
        assert_eq!(f.scheduler.len(), 1);
    }

    #[test]
    fn test_release_cancels_and_notifies() {
        let mut f = Fixture::new(delayed(2.0));
        let target = f.add_box(2.0);
        f.world.set_use_held(ACTOR, true);
        f.tick(0.0);
        let timer = f.state.pending.unwrap().timer;

        f.world.set_use_held(ACTOR, false);
        assert_eq!(f.tick(1.0), Decision::Canceled(target));
        assert!(f.state.pending.is_none());
        assert!(!f.scheduler.is_scheduled(timer));
        assert!(f.chat[1].1.contains("You have canceled untying the box."));

        assert_eq!(f.tick(1.02), Decision::KeyUp);
    }

    #[test]
    fn test_notifications_can_be_silenced() {
        let mut f = Fixture::new(UntieConfig {
            show_started_notification: false,
            show_canceled_notification: false,
            ..delayed(2.0)
        });
        f.add_box(2.0);
        f.world.set_use_held(ACTOR, true);
        assert!(matches!(f.tick(0.0), Decision::Armed(_)));
        f.world.set_use_held(ACTOR, false);
        assert!(matches!(f.tick(0.5), Decision::Canceled(_)));
        assert!(f.chat.is_empty());
    }

    #[test]
    fn test_untied_box_is_not_a_target() {
        let mut f = Fixture::new(delayed(2.0));
        let target = f.add_box(2.0);
        if let Some(body) = f.world.target_mut(target) {
            body.tied_down = false;
        }
        f.world.set_use_held(ACTOR, true);
        assert_eq!(f.tick(0.0), Decision::Missed);
        assert!(f.scheduler.is_empty());
    }

    #[test]
    fn test_box_out_of_reach_is_missed() {
        let mut f = Fixture::new(delayed(2.0));
        f.add_box(4.0);
        f.world.set_use_held(ACTOR, true);
        assert_eq!(f.tick(0.0), Decision::Missed);
    }

    #[test]
    fn test_probes_are_rate_limited_even_when_missing() {
        let mut f = Fixture::new(delayed(2.0).with_probe_rate_limit(1.0));
        f.world.set_use_held(ACTOR, true);

        let mut probes = Vec::new();
        for i in 0..150 {
            let now = f64::from(i) * 0.02;
            if f.tick(now).probed() {
                probes.push(now);
            }
        }

        assert_eq!(probes.len(), 3);
        for pair in probes.windows(2) {
            assert!(pair[1] - pair[0] >= 1.0 - 1e-9, "probes {pair:?} too close");
        }
    }

    #[test]
    fn test_rearm_after_cancel_waits_for_rate_limit() {
        let mut f = Fixture::new(delayed(5.0).with_probe_rate_limit(1.0));
        let target = f.add_box(2.0);
        f.world.set_use_held(ACTOR, true);
        assert_eq!(f.tick(0.0), Decision::Armed(target));

        f.world.set_use_held(ACTOR, false);
        assert_eq!(f.tick(0.2), Decision::Canceled(target));

        f.world.set_use_held(ACTOR, true);
        assert_eq!(f.tick(0.4), Decision::RateLimited);
        assert_eq!(f.tick(1.0), Decision::Armed(target));
        assert_eq!(
            f.scheduler.count_where(|t| matches!(t, crate::scheduler::Task::Commit(_))),
            1
        );
    }

    #[test]
    fn test_missing_actor_is_reported() {
        let mut f = Fixture::new(delayed(1.0));
        f.world.despawn_actor(ACTOR);
        let mut cx = MonitorContext {
            now: 0.0,
            scheduler: &mut f.scheduler,
            world: &mut f.world,
            chat: &mut f.chat,
            messages: &f.messages,
        };
        assert!(matches!(
            step(&mut f.state, ACTOR, &f.config, &mut cx),
            Err(UntieError::ActorGone(ACTOR))
        ));
    }
}
