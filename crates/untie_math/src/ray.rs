//! Rays and sphere colliders.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// A half-line with a unit direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// Start point.
    pub origin: Vec3,
    /// Unit direction.
    pub direction: Vec3,
}

impl Ray {
    /// Create a ray. `direction` is normalised; a zero direction falls back
    /// to `+Z`.
    #[must_use]
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.try_normalize().unwrap_or(Vec3::Z),
        }
    }

    /// The point at distance `t` along the ray.
    #[must_use]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// A sphere collider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Sphere {
    /// World-space centre.
    pub center: Vec3,
    /// Radius in world units.
    pub radius: f32,
}

impl Sphere {
    /// Create a sphere collider.
    #[must_use]
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Distance along `ray` to the first surface hit, if any.
    ///
    /// A ray starting inside the sphere hits at distance `0`.
    #[must_use]
    pub fn intersect(&self, ray: &Ray) -> Option<f32> {
        let to_center = self.center - ray.origin;
        let r2 = self.radius * self.radius;
        if to_center.length_squared() <= r2 {
            return Some(0.0);
        }

        let along = to_center.dot(ray.direction);
        if along < 0.0 {
            return None;
        }

        let closest_sq = to_center.length_squared() - along * along;
        if closest_sq > r2 {
            return None;
        }

        Some(along - (r2 - closest_sq).sqrt())
    }
}
