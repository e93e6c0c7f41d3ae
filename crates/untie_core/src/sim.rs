//! In-memory world used by the demo host and the tests.
//!
//! [`SimWorld`] holds connected actors, tied targets with sphere colliders,
//! and obstacles that block probes. It records every effect and network
//! update so callers can observe what a commit did.

use std::collections::HashMap;

use untie_math::{Ray, Sphere, Vec3};

use crate::ids::{ActorId, TargetAllocator, TargetId};
use crate::world::{ActorState, TargetBody, World};

/// Default collider radius for targets.
pub const DEFAULT_TARGET_RADIUS: f32 = 0.5;

/// An effect that was run.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectRecord {
    /// Effect resource path.
    pub path: String,
    /// Where it was played.
    pub position: Vec3,
    /// Surface normal it was played with.
    pub normal: Vec3,
}

#[derive(Debug, Clone)]
struct SimTarget {
    body: TargetBody,
    radius: f32,
}

/// The in-memory world.
#[derive(Debug, Default)]
pub struct SimWorld {
    actors: HashMap<ActorId, ActorState>,
    targets: HashMap<TargetId, SimTarget>,
    obstacles: Vec<Sphere>,
    allocator: TargetAllocator,
    effects: Vec<EffectRecord>,
    network_updates: HashMap<TargetId, u32>,
}

impl SimWorld {
    /// Create an empty world.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Put an actor into the world (connect). Returns the previous state if
    /// the actor was already present.
    pub fn spawn_actor(&mut self, id: ActorId, state: ActorState) -> Option<ActorState> {
        self.actors.insert(id, state)
    }

    /// Remove an actor (disconnect). Returns `true` if it was present.
    pub fn despawn_actor(&mut self, id: ActorId) -> bool {
        self.actors.remove(&id).is_some()
    }

    /// Mutable access to an actor.
    pub fn actor_mut(&mut self, id: ActorId) -> Option<&mut ActorState> {
        self.actors.get_mut(&id)
    }

    /// Press or release the actor's use key. Returns `false` if the actor is
    /// not present.
    pub fn set_use_held(&mut self, id: ActorId, held: bool) -> bool {
        self.actor_mut(id).map(|a| a.use_held = held).is_some()
    }

    /// Set how submerged the actor is. Returns `false` if the actor is not
    /// present.
    pub fn set_water_factor(&mut self, id: ActorId, factor: f32) -> bool {
        self.actor_mut(id)
            .map(|a| a.water_factor = factor.clamp(0.0, 1.0))
            .is_some()
    }

    /// Turn the actor's eyes towards `point`. Returns `false` if the actor is
    /// not present.
    pub fn look_at(&mut self, id: ActorId, point: Vec3) -> bool {
        self.actor_mut(id)
            .map(|a| a.eyes = a.eyes.turned_towards(point))
            .is_some()
    }

    /// Add a target with a freshly allocated ID.
    pub fn spawn_target(&mut self, body: TargetBody) -> TargetId {
        let id = self.allocator.allocate();
        self.insert_target(id, body, DEFAULT_TARGET_RADIUS);
        id
    }

    /// Add a target under a caller-chosen ID and collider radius.
    pub fn insert_target(&mut self, id: TargetId, body: TargetBody, radius: f32) {
        self.allocator.reserve(id);
        self.targets.insert(id, SimTarget { body, radius });
    }

    /// Remove a target. Returns `true` if it existed.
    pub fn despawn_target(&mut self, id: TargetId) -> bool {
        self.targets.remove(&id).is_some()
    }

    /// Add something that blocks probes but is not a target.
    pub fn add_obstacle(&mut self, obstacle: Sphere) {
        self.obstacles.push(obstacle);
    }

    /// Effects run so far, oldest first.
    #[must_use]
    pub fn effects(&self) -> &[EffectRecord] {
        &self.effects
    }

    /// How many network updates were sent for `id`.
    #[must_use]
    pub fn network_updates(&self, id: TargetId) -> u32 {
        self.network_updates.get(&id).copied().unwrap_or(0)
    }

    /// Number of connected actors.
    #[must_use]
    pub fn actor_count(&self) -> usize {
        self.actors.len()
    }
}

impl World for SimWorld {
    fn actor(&self, id: ActorId) -> Option<&ActorState> {
        self.actors.get(&id)
    }

    fn active_actors(&self) -> Vec<ActorId> {
        let mut ids: Vec<ActorId> = self.actors.keys().copied().collect();
        ids.sort();
        ids
    }

    fn raycast(&self, ray: &Ray, max_distance: f32) -> Option<TargetId> {
        let nearest_obstacle = self
            .obstacles
            .iter()
            .filter_map(|o| o.intersect(ray))
            .fold(f32::INFINITY, f32::min);

        self.targets
            .iter()
            .filter_map(|(id, t)| {
                Sphere::new(t.body.position, t.radius)
                    .intersect(ray)
                    .map(|dist| (dist, *id))
            })
            .filter(|(dist, _)| *dist <= max_distance && *dist < nearest_obstacle)
            .min_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)))
            .map(|(_, id)| id)
    }

    fn target(&self, id: TargetId) -> Option<&TargetBody> {
        self.targets.get(&id).map(|t| &t.body)
    }

    fn target_mut(&mut self, id: TargetId) -> Option<&mut TargetBody> {
        self.targets.get_mut(&id).map(|t| &mut t.body)
    }

    fn send_network_update(&mut self, id: TargetId) {
        *self.network_updates.entry(id).or_insert(0) += 1;
    }

    fn run_effect(&mut self, path: &str, position: Vec3, normal: Vec3) {
        self.effects.push(EffectRecord {
            path: path.to_string(),
            position,
            normal,
        });
    }
}

#[cfg(test)]
mod tests {
    use untie_math::Pose;

    use super::*;

    fn world_with_box(distance: f32) -> (SimWorld, TargetId) {
        let mut world = SimWorld::new();
        let id = world.spawn_target(TargetBody::tied(Vec3::new(0.0, -10.0, distance)));
        (world, id)
    }

    fn ray_from_origin() -> Ray {
        Ray::new(Vec3::new(0.0, -10.0, 0.0), Vec3::Z)
    }

    #[test]
    fn test_raycast_hits_target_in_range() {
        let (world, id) = world_with_box(2.0);
        assert_eq!(world.raycast(&ray_from_origin(), 3.0), Some(id));
    }

    #[test]
    fn test_raycast_misses_target_out_of_range() {
        let (world, _) = world_with_box(5.0);
        assert_eq!(world.raycast(&ray_from_origin(), 3.0), None);
    }

    #[test]
    fn test_obstacle_blocks_raycast() {
        let (mut world, _) = world_with_box(2.5);
        world.add_obstacle(Sphere::new(Vec3::new(0.0, -10.0, 1.0), 0.3));
        assert_eq!(world.raycast(&ray_from_origin(), 3.0), None);
    }

    #[test]
    fn test_nearest_target_wins() {
        let (mut world, near) = world_with_box(1.5);
        let _far = world.spawn_target(TargetBody::tied(Vec3::new(0.0, -10.0, 2.5)));
        assert_eq!(world.raycast(&ray_from_origin(), 3.0), Some(near));
    }

    #[test]
    fn test_actor_controls() {
        let mut world = SimWorld::new();
        let actor = ActorId(1);
        assert!(!world.set_use_held(actor, true));

        world.spawn_actor(actor, ActorState::new(Pose::IDENTITY));
        assert!(world.set_use_held(actor, true));
        assert!(world.set_water_factor(actor, 3.0));
        assert!(world.look_at(actor, Vec3::X));

        let state = world.actor(actor).unwrap();
        assert!(state.use_held);
        assert!(state.is_submerged());
        assert!((state.eyes.forward() - Vec3::X).length() < 1e-5);

        assert!(world.despawn_actor(actor));
        assert!(world.active_actors().is_empty());
    }

    #[test]
    fn test_insert_target_reserves_id() {
        let mut world = SimWorld::new();
        world.insert_target(TargetId(5), TargetBody::tied(Vec3::ZERO), 1.0);
        assert_eq!(world.spawn_target(TargetBody::tied(Vec3::ONE)), TargetId(6));
    }
}
