//! Eye pose of an actor.
//!
//! [`Pose`] is a position plus orientation. Forward is `+Z` and up is `+Y`,
//! the same convention the game server uses for player eyes.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::ray::Ray;

/// Position and rotation of an actor's view.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Pose {
    /// World-space position of the eyes.
    pub position: Vec3,
    /// Rotation as a unit quaternion.
    pub rotation: Quat,
}

impl Pose {
    /// Local forward axis.
    pub const FORWARD: Vec3 = Vec3::Z;

    /// Origin, facing `+Z`.
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    /// Create a pose at `position` with the default orientation.
    #[must_use]
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    /// Create a pose at `position` facing `point`.
    ///
    /// If `point` coincides with `position` the orientation is left at
    /// identity.
    #[must_use]
    pub fn looking_at(position: Vec3, point: Vec3) -> Self {
        let Some(dir) = (point - position).try_normalize() else {
            return Self::from_position(position);
        };
        Self {
            position,
            rotation: Quat::from_rotation_arc(Self::FORWARD, dir),
        }
    }

    /// Unit vector the pose is facing.
    #[must_use]
    pub fn forward(&self) -> Vec3 {
        self.rotation * Self::FORWARD
    }

    /// The ray from the eyes along the facing direction.
    #[must_use]
    pub fn head_ray(&self) -> Ray {
        Ray::new(self.position, self.forward())
    }

    /// Turn the pose to face `point`, keeping its position.
    #[must_use]
    pub fn turned_towards(self, point: Vec3) -> Self {
        Self::looking_at(self.position, point)
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_faces_plus_z() {
        assert_eq!(Pose::IDENTITY.forward(), Vec3::Z);
    }

    #[test]
    fn test_looking_at_points_forward_at_target() {
        let pose = Pose::looking_at(Vec3::new(1.0, -5.0, 0.0), Vec3::new(1.0, -5.0, -4.0));
        let forward = pose.forward();
        assert!((forward - Vec3::NEG_Z).length() < 1e-5);
    }

    #[test]
    fn test_looking_at_same_point_keeps_identity() {
        let p = Vec3::new(2.0, 2.0, 2.0);
        let pose = Pose::looking_at(p, p);
        assert_eq!(pose.rotation, Quat::IDENTITY);
        assert_eq!(pose.position, p);
    }

    #[test]
    fn test_head_ray_starts_at_eyes() {
        let pose = Pose::looking_at(Vec3::ZERO, Vec3::X);
        let ray = pose.head_ray();
        assert_eq!(ray.origin, Vec3::ZERO);
        assert!((ray.direction - Vec3::X).length() < 1e-5);
    }

    #[test]
    fn test_pose_deserializes_from_arrays() {
        let pose: Pose =
            serde_json::from_str(r#"{"position":[1.0,2.0,3.0],"rotation":[0.0,0.0,0.0,1.0]}"#)
                .unwrap();
        assert_eq!(pose.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(pose.rotation, Quat::IDENTITY);
    }
}
