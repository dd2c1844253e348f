//! Axis-aligned boxes for obstacles and arena bounds

use crate::vector::Vec3;

/// Axis-Aligned Bounding Box
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AABB {
    pub min: Vec3,
    pub max: Vec3,
}

impl AABB {
    /// Create from min and max points
    #[inline]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create from center and half-extents
    #[inline]
    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// Box standing on the ground at `center` with footprint `width x depth`
    pub fn pillar(center: Vec3, width: f32, depth: f32, height: f32) -> Self {
        Self::new(
            Vec3::new(center.x - width * 0.5, center.y, center.z - depth * 0.5),
            Vec3::new(center.x + width * 0.5, center.y + height, center.z + depth * 0.5),
        )
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    #[inline]
    pub fn contains_point(&self, point: Vec3) -> bool {
        point.x >= self.min.x && point.x <= self.max.x
            && point.y >= self.min.y && point.y <= self.max.y
            && point.z >= self.min.z && point.z <= self.max.z
    }

    /// Footprint test ignoring height
    #[inline]
    pub fn contains_xz(&self, point: Vec3) -> bool {
        point.x >= self.min.x && point.x <= self.max.x
            && point.z >= self.min.z && point.z <= self.max.z
    }

    #[inline]
    pub fn intersects(&self, other: &AABB) -> bool {
        self.min.x <= other.max.x && self.max.x >= other.min.x
            && self.min.y <= other.max.y && self.max.y >= other.min.y
            && self.min.z <= other.max.z && self.max.z >= other.min.z
    }

    #[inline]
    pub fn closest_point(&self, point: Vec3) -> Vec3 {
        point.max(self.min).min(self.max)
    }

    /// Grow by `amount` on every side
    pub fn expand(&self, amount: f32) -> Self {
        Self::new(self.min - Vec3::splat(amount), self.max + Vec3::splat(amount))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pillar_stands_on_ground() {
        let b = AABB::pillar(Vec3::new(2.0, 0.0, 2.0), 1.0, 1.0, 3.0);
        assert_eq!(b.min.y, 0.0);
        assert_eq!(b.max.y, 3.0);
        assert!(b.contains_point(Vec3::new(2.0, 1.5, 2.0)));
        assert!(!b.contains_point(Vec3::new(2.0, 3.5, 2.0)));
    }

    #[test]
    fn test_closest_point_clamps() {
        let b = AABB::new(Vec3::ZERO, Vec3::ONE);
        assert_eq!(b.closest_point(Vec3::new(2.0, 0.5, -1.0)), Vec3::new(1.0, 0.5, 0.0));
    }

    #[test]
    fn test_intersects() {
        let a = AABB::new(Vec3::ZERO, Vec3::ONE);
        assert!(a.intersects(&AABB::new(Vec3::splat(0.5), Vec3::splat(2.0))));
        assert!(!a.intersects(&AABB::new(Vec3::splat(1.5), Vec3::splat(2.0))));
    }
}
