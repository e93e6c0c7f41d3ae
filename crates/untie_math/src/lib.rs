//! # untie_math
//!
//! Math types for the untie simulation. Re-exports [`glam`] for linear
//! algebra and defines the spatial types the probe needs: an eye [`Pose`],
//! a [`Ray`] cast from it, and [`Sphere`] colliders to hit.

pub mod pose;
pub mod ray;

// Re-export glam types for convenience.
pub use glam::{Quat, Vec3};

pub use pose::Pose;
pub use ray::{Ray, Sphere};
