//! # void_math - Agent Math
//!
//! Small, allocation-free math primitives used by the agent crates:
//! vectors, poses, rays, boxes and the occlusion queries that back
//! line-of-sight checks.

pub mod bounds;
pub mod intersect;
pub mod occlusion;
pub mod pose;
pub mod ray;
pub mod vector;

pub use bounds::*;
pub use intersect::*;
pub use occlusion::*;
pub use pose::*;
pub use ray::*;
pub use vector::*;

/// Common math constants
pub mod consts {
    pub const PI: f32 = core::f32::consts::PI;
    pub const TAU: f32 = PI * 2.0;
    pub const FRAC_PI_2: f32 = PI / 2.0;
    pub const DEG_TO_RAD: f32 = PI / 180.0;
    pub const RAD_TO_DEG: f32 = 180.0 / PI;
    pub const EPSILON: f32 = 1e-6;
    /// Golden angle in radians, used for scattered layouts
    pub const GOLDEN_ANGLE: f32 = 2.399_963;
}

/// Convert degrees to radians
#[inline]
pub fn radians(degrees: f32) -> f32 {
    degrees * consts::DEG_TO_RAD
}

/// Convert radians to degrees
#[inline]
pub fn degrees(radians: f32) -> f32 {
    radians * consts::RAD_TO_DEG
}

/// Linear interpolation
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Clamp value between min and max
#[inline]
pub fn clamp(value: f32, min: f32, max: f32) -> f32 {
    if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}

/// Move `current` toward `target` by at most `max_delta`, never overshooting
#[inline]
pub fn move_towards(current: f32, target: f32, max_delta: f32) -> f32 {
    if (target - current).abs() <= max_delta {
        target
    } else {
        current + (target - current).signum() * max_delta
    }
}

/// Height of a symmetric jump arc at normalized time `t` for apex `height`.
///
/// `4·h·t·(1−t)` is zero at both ends and peaks at `h` when `t = 0.5`.
#[inline]
pub fn parabolic_arc(height: f32, t: f32) -> f32 {
    let t = clamp(t, 0.0, 1.0);
    4.0 * height * t * (1.0 - t)
}

pub mod prelude {
    pub use crate::bounds::AABB;
    pub use crate::intersect::{ray_aabb, ray_aabb_with_normal, ray_sphere_at, segment_sphere};
    pub use crate::occlusion::{LineOfSight, ObstacleField, OpenField, TraceHit};
    pub use crate::pose::Pose;
    pub use crate::ray::Ray;
    pub use crate::vector::Vec3;
    pub use crate::{clamp, degrees, lerp, move_towards, parabolic_arc, radians};
}
