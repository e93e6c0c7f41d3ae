//! The view of the game world the state machine reads and writes.
//!
//! The core never owns actors or targets. It reaches them through the
//! [`World`] trait: read-only queries for actors, a directional probe, and
//! mutable access to target bodies for the commit. [`SimWorld`] is an
//! in-memory implementation.
//!
//! [`SimWorld`]: crate::sim::SimWorld

use serde::{Deserialize, Serialize};
use untie_math::{Pose, Ray, Vec3};

use crate::ids::{ActorId, TargetId};

/// What the state machine needs to know about an actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorState {
    /// Eye position and facing.
    pub eyes: Pose,
    /// How much of the actor is under water, `0.0..=1.0`.
    pub water_factor: f32,
    /// Whether the use key is currently held.
    pub use_held: bool,
    /// Preferred language for notifications.
    #[serde(default)]
    pub language: Option<String>,
}

impl ActorState {
    /// A dry actor at `eyes` with the use key up.
    #[must_use]
    pub fn new(eyes: Pose) -> Self {
        Self {
            eyes,
            water_factor: 0.0,
            use_held: false,
            language: None,
        }
    }

    /// Fully under water.
    #[must_use]
    pub fn is_submerged(&self) -> bool {
        self.water_factor >= 1.0
    }

    /// The probe ray from the eyes.
    #[must_use]
    pub fn head_ray(&self) -> Ray {
        self.eyes.head_ray()
    }
}

/// Buoyancy response of a target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Buoyancy {
    /// Whether buoyancy is simulated.
    pub enabled: bool,
    /// Strength multiplier.
    pub scale: f32,
}

impl Default for Buoyancy {
    fn default() -> Self {
        Self {
            enabled: false,
            scale: 1.0,
        }
    }
}

/// Mutable state of a target that can be untied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetBody {
    /// World-space position.
    pub position: Vec3,
    /// Still tied down. This is the eligibility gate: once cleared it is
    /// never set again by the core.
    pub tied_down: bool,
    /// Rigid body ignores physics while kinematic.
    pub kinematic: bool,
    /// Passive buoyancy response.
    pub buoyancy: Buoyancy,
    /// Effect to run when freed, if the prefab has one.
    #[serde(default)]
    pub freed_effect: Option<String>,
}

impl TargetBody {
    /// A tied-down, kinematic body at `position` with buoyancy off.
    #[must_use]
    pub fn tied(position: Vec3) -> Self {
        Self {
            position,
            tied_down: true,
            kinematic: true,
            buoyancy: Buoyancy::default(),
            freed_effect: None,
        }
    }

    /// Attach a freed effect.
    #[must_use]
    pub fn with_freed_effect(mut self, path: impl Into<String>) -> Self {
        self.freed_effect = Some(path.into());
        self
    }

    /// Eligible for untie.
    #[must_use]
    pub fn is_tied_down(&self) -> bool {
        self.tied_down
    }

    /// The freed effect, if it names a resource.
    #[must_use]
    pub fn valid_freed_effect(&self) -> Option<&str> {
        self.freed_effect.as_deref().filter(|path| !path.is_empty())
    }
}

/// Access to actors and targets.
pub trait World {
    /// The actor's current state, or `None` if it is gone.
    fn actor(&self, id: ActorId) -> Option<&ActorState>;

    /// All actors currently connected.
    fn active_actors(&self) -> Vec<ActorId>;

    /// First object hit by `ray` within `max_distance`, if it is a target.
    /// Anything else in the way yields `None`.
    fn raycast(&self, ray: &Ray, max_distance: f32) -> Option<TargetId>;

    /// Read a target.
    fn target(&self, id: TargetId) -> Option<&TargetBody>;

    /// Mutate a target.
    fn target_mut(&mut self, id: TargetId) -> Option<&mut TargetBody>;

    /// Push the target's changed state to clients.
    fn send_network_update(&mut self, id: TargetId);

    /// Play an effect at a point.
    fn run_effect(&mut self, path: &str, position: Vec3, normal: Vec3);

    /// Whether the target is still eligible. Missing targets are not.
    fn is_eligible(&self, id: TargetId) -> bool {
        self.target(id).is_some_and(TargetBody::is_tied_down)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submerged_threshold() {
        let mut actor = ActorState::new(Pose::IDENTITY);
        actor.water_factor = 0.99;
        assert!(!actor.is_submerged());
        actor.water_factor = 1.0;
        assert!(actor.is_submerged());
    }

    #[test]
    fn test_tied_body_defaults() {
        let body = TargetBody::tied(Vec3::ZERO);
        assert!(body.is_tied_down());
        assert!(body.kinematic);
        assert!(!body.buoyancy.enabled);
        assert!(body.valid_freed_effect().is_none());
    }

    #[test]
    fn test_empty_effect_is_not_valid() {
        let body = TargetBody::tied(Vec3::ZERO).with_freed_effect("");
        assert!(body.valid_freed_effect().is_none());
        let body = body.with_freed_effect("assets/fx/box_freed.prefab");
        assert_eq!(body.valid_freed_effect(), Some("assets/fx/box_freed.prefab"));
    }
}
