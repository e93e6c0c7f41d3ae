//! End-to-end runs of the registry against [`SimWorld`] at a fixed 50 Hz
//! server tick.

use std::collections::HashSet;

use untie_math::{Pose, Vec3};

use crate::config::UntieConfig;
use crate::context::Permissions;
use crate::ids::{ActorId, TargetId};
use crate::messages::MessageCatalog;
use crate::registry::{LifecycleEvent, MonitorRegistry, USE_PERMISSION};
use crate::scheduler::Task;
use crate::sim::SimWorld;
use crate::world::{ActorState, TargetBody, World};

const DT: f64 = 0.02;
const EFFECT: &str = "assets/prefabs/misc/supply drop/effects/supply_drop_freed.prefab";

const ALICE: ActorId = ActorId(76561198000000001);
const BOB: ActorId = ActorId(76561198000000002);

struct Grants(HashSet<ActorId>);

impl Permissions for Grants {
    fn has_permission(&self, actor: ActorId, permission: &str) -> bool {
        permission == USE_PERMISSION && self.0.contains(&actor)
    }
}

struct Sim {
    registry: MonitorRegistry,
    world: SimWorld,
    grants: Grants,
    chat: Vec<(ActorId, String)>,
    tick: u64,
    target: TargetId,
}

impl Sim {
    /// A box two metres in front of the spawn point, a 2 s untie and a
    /// half-second underwater poll.
    fn new() -> Self {
        Self::with_config(UntieConfig {
            precondition_poll_interval: 0.5,
            poll_jitter: 0.05,
            ..UntieConfig::default().with_commit_delay(2.0)
        })
    }

    fn with_config(config: UntieConfig) -> Self {
        let mut world = SimWorld::new();
        let target = world.spawn_target(
            TargetBody::tied(Vec3::new(0.0, -10.0, 2.0)).with_freed_effect(EFFECT),
        );
        Self {
            registry: MonitorRegistry::new(config, MessageCatalog::new(), 11).unwrap(),
            world,
            grants: Grants(HashSet::new()),
            chat: Vec::new(),
            tick: 0,
            target,
        }
    }

    fn now(&self) -> f64 {
        self.tick as f64 * DT
    }

    fn connect(&mut self, actor: ActorId, submerged: bool) {
        let mut state = ActorState::new(Pose::from_position(Vec3::new(0.0, -10.0, 0.0)));
        state.water_factor = if submerged { 1.0 } else { 0.6 };
        self.world.spawn_actor(actor, state);
        self.grants.0.insert(actor);
        let now = self.now();
        self.registry
            .handle(LifecycleEvent::Connected(actor), now, &self.world, &self.grants);
    }

    fn disconnect(&mut self, actor: ActorId) {
        self.world.despawn_actor(actor);
        let now = self.now();
        self.registry
            .handle(LifecycleEvent::Disconnected(actor), now, &self.world, &self.grants);
    }

    fn hold(&mut self, actor: ActorId, held: bool) {
        assert!(self.world.set_use_held(actor, held));
    }

    /// Step the server clock, checking the pending-commit invariants on
    /// every tick.
    fn advance(&mut self, seconds: f64) {
        let ticks = (seconds / DT).round() as u64;
        for _ in 0..ticks {
            self.tick += 1;
            let now = self.now();
            self.registry
                .run_until(now, &mut self.world, &self.grants, &mut self.chat)
                .unwrap();
            self.assert_invariants();
        }
    }

    fn assert_invariants(&self) {
        let scheduler = self.registry.scheduler();
        for monitor in self.registry.monitors() {
            let actor = monitor.actor();
            let commit_timers = scheduler.count_where(|t| t == Task::Commit(actor));
            assert!(commit_timers <= 1, "{actor} has {commit_timers} commit timers");
            match monitor.state().pending {
                Some(pending) => {
                    assert!(scheduler.is_scheduled(pending.timer));
                    assert_eq!(commit_timers, 1);
                }
                None => assert_eq!(commit_timers, 0),
            }
        }
    }

    fn tied(&self) -> bool {
        self.world.is_eligible(self.target)
    }

    fn chat_for(&self, actor: ActorId) -> Vec<&str> {
        self.chat
            .iter()
            .filter(|(to, _)| *to == actor)
            .map(|(_, text)| text.as_str())
            .collect()
    }
}

#[test]
fn test_dry_actor_never_arms() {
    let mut sim = Sim::new();
    sim.connect(ALICE, false);
    sim.hold(ALICE, true);

    sim.advance(6.0);

    let monitor = sim.registry.monitor(ALICE).unwrap();
    assert!(!monitor.precondition_active());
    assert!(!monitor.is_armed());
    assert!(sim.tied());
    assert!(sim.chat.is_empty());
}

#[test]
fn test_held_key_unties_exactly_once() {
    let mut sim = Sim::new();
    sim.connect(ALICE, true);
    sim.hold(ALICE, true);

    sim.advance(0.1);
    assert_eq!(sim.registry.pending_commits(), vec![(ALICE, sim.target)]);
    assert!(sim.tied());

    sim.advance(2.0);
    assert!(!sim.tied());
    assert!(sim.registry.pending_commits().is_empty());

    // Keep holding well past the untie.
    sim.advance(5.0);
    assert_eq!(sim.world.effects().len(), 1);
    assert_eq!(sim.world.effects()[0].path, EFFECT);
    assert_eq!(sim.world.network_updates(sim.target), 1);

    let body = sim.world.target(sim.target).unwrap();
    assert!(!body.kinematic);
    assert!(body.buoyancy.enabled);
    assert_eq!(body.buoyancy.scale, 1.0);

    let lines = sim.chat_for(ALICE);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("The box will untie in 2 seconds."));
}

#[test]
fn test_release_at_half_delay_cancels() {
    let mut sim = Sim::new();
    sim.connect(ALICE, true);
    sim.hold(ALICE, true);

    sim.advance(0.1);
    assert!(sim.registry.monitor(ALICE).unwrap().is_armed());

    sim.advance(0.9);
    sim.hold(ALICE, false);
    sim.advance(0.1);
    assert!(!sim.registry.monitor(ALICE).unwrap().is_armed());

    sim.advance(5.0);
    assert!(sim.tied());
    assert!(sim.world.effects().is_empty());

    let lines = sim.chat_for(ALICE);
    assert_eq!(lines.len(), 2);
    assert!(lines[1].contains("You have canceled untying the box."));
}

#[test]
fn test_second_committer_is_a_no_op() {
    let mut sim = Sim::new();
    sim.connect(ALICE, true);
    sim.hold(ALICE, true);
    sim.advance(0.5);

    sim.connect(BOB, true);
    sim.hold(BOB, true);
    sim.advance(0.5);
    assert_eq!(
        sim.registry.pending_commits(),
        vec![(ALICE, sim.target), (BOB, sim.target)]
    );

    sim.advance(1.1);
    assert!(!sim.tied());
    let after_alice = sim.world.target(sim.target).cloned();
    assert!(sim.registry.monitor(BOB).unwrap().is_armed());

    sim.advance(1.0);
    assert!(sim.registry.pending_commits().is_empty());
    assert_eq!(sim.world.target(sim.target).cloned(), after_alice);
    assert_eq!(sim.world.effects().len(), 1);
    assert_eq!(sim.world.network_updates(sim.target), 1);
}

#[test]
fn test_disconnect_while_armed_never_commits() {
    let mut sim = Sim::new();
    sim.connect(ALICE, true);
    sim.hold(ALICE, true);
    sim.advance(1.0);
    assert!(sim.registry.monitor(ALICE).unwrap().is_armed());

    sim.disconnect(ALICE);
    assert!(sim.registry.is_empty());
    assert!(sim.registry.scheduler().is_empty());

    sim.advance(5.0);
    assert!(sim.tied());
    assert!(sim.world.effects().is_empty());
}

#[test]
fn test_vanished_actor_does_not_commit() {
    let mut sim = Sim::new();
    sim.connect(ALICE, true);
    sim.hold(ALICE, true);
    sim.advance(1.0);

    // Gone from the world without a disconnect event.
    sim.world.despawn_actor(ALICE);
    sim.advance(5.0);

    assert!(sim.registry.is_empty());
    assert!(sim.registry.scheduler().is_empty());
    assert!(sim.tied());
}

#[test]
fn test_surfacing_mid_hold_still_commits() {
    let mut sim = Sim::new();
    sim.connect(ALICE, true);
    sim.hold(ALICE, true);
    sim.advance(0.1);
    assert!(sim.registry.monitor(ALICE).unwrap().is_armed());

    sim.world.set_water_factor(ALICE, 0.2);
    sim.advance(0.6);
    let monitor = sim.registry.monitor(ALICE).unwrap();
    assert!(!monitor.precondition_active());
    assert!(monitor.is_armed());

    // Releasing is not seen without the detection tick.
    sim.hold(ALICE, false);
    sim.advance(2.0);
    assert!(!sim.tied());
}

#[test]
fn test_zero_delay_unties_on_first_look() {
    let mut sim = Sim::with_config(UntieConfig {
        precondition_poll_interval: 0.5,
        show_started_notification: false,
        ..UntieConfig::default()
    });
    sim.connect(ALICE, true);
    sim.hold(ALICE, true);

    sim.advance(DT);
    assert!(!sim.tied());
    assert!(sim.chat.is_empty());
}

#[test]
fn test_release_seen_on_tick_due_with_commit_cancels() {
    // Detection ticks and the commit deadline both land on exact quarter
    // seconds, so the last tick and the commit are due together.
    let mut sim = Sim::with_config(UntieConfig {
        precondition_poll_interval: 0.5,
        poll_jitter: 0.0,
        detection_interval: 0.25,
        ..UntieConfig::default().with_commit_delay(1.0)
    });
    sim.connect(ALICE, true);
    sim.hold(ALICE, true);

    sim.advance(0.3);
    assert_eq!(sim.registry.pending_commits(), vec![(ALICE, sim.target)]);

    sim.advance(0.8);
    sim.hold(ALICE, false);
    sim.advance(1.0);

    assert!(sim.tied());
    assert!(sim.registry.pending_commits().is_empty());
    let lines = sim.chat_for(ALICE);
    assert_eq!(lines.len(), 2);
    assert!(lines[1].contains("You have canceled untying the box."));
}

#[test]
fn test_permission_revoked_while_armed_cancels_commit() {
    let mut sim = Sim::new();
    sim.connect(ALICE, true);
    sim.hold(ALICE, true);
    sim.advance(0.5);

    sim.grants.0.remove(&ALICE);
    let now = sim.now();
    sim.registry.handle(
        LifecycleEvent::UserPermissionRevoked {
            actor: ALICE,
            permission: USE_PERMISSION.to_string(),
        },
        now,
        &sim.world,
        &sim.grants,
    );
    assert!(sim.registry.monitor(ALICE).is_some());

    sim.advance(DT);
    assert!(sim.registry.monitor(ALICE).is_none());
    sim.advance(3.0);
    assert!(sim.tied());
}
