//! Line-of-sight queries.
//!
//! Perception and hitscan only need one question answered: is anything
//! solid between two points? `LineOfSight` is that seam; the world
//! implementation decides what "solid" means.

use crate::bounds::AABB;
use crate::intersect::ray_aabb_with_normal;
use crate::ray::Ray;
use crate::vector::Vec3;

/// First blocking hit along a trace
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TraceHit {
    pub point: Vec3,
    pub normal: Vec3,
    pub distance: f32,
}

/// Static occlusion query
pub trait LineOfSight: Send + Sync {
    /// First obstruction on the segment `from -> to`, if any
    fn trace(&self, from: Vec3, to: Vec3) -> Option<TraceHit>;

    /// True if nothing blocks the segment
    fn is_clear(&self, from: Vec3, to: Vec3) -> bool {
        self.trace(from, to).is_none()
    }
}

/// Empty world, nothing ever blocks
#[derive(Clone, Copy, Debug, Default)]
pub struct OpenField;

impl LineOfSight for OpenField {
    fn trace(&self, _from: Vec3, _to: Vec3) -> Option<TraceHit> {
        None
    }
}

/// World made of solid boxes
#[derive(Clone, Debug, Default)]
pub struct ObstacleField {
    obstacles: Vec<AABB>,
}

impl ObstacleField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_obstacle(mut self, obstacle: AABB) -> Self {
        self.obstacles.push(obstacle);
        self
    }

    pub fn add(&mut self, obstacle: AABB) {
        self.obstacles.push(obstacle);
    }

    pub fn obstacles(&self) -> &[AABB] {
        &self.obstacles
    }

    /// Is `point` inside any obstacle?
    pub fn is_solid(&self, point: Vec3) -> bool {
        self.obstacles.iter().any(|o| o.contains_point(point))
    }
}

impl LineOfSight for ObstacleField {
    fn trace(&self, from: Vec3, to: Vec3) -> Option<TraceHit> {
        let length = from.distance(to);
        if length <= f32::EPSILON {
            return None;
        }
        let ray = Ray::from_points(from, to);
        self.obstacles
            .iter()
            .filter_map(|o| ray_aabb_with_normal(&ray, o))
            .filter(|(t, _)| *t <= length)
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(distance, normal)| TraceHit {
                point: ray.at(distance),
                normal,
                distance,
            })
    }
}

impl<T: LineOfSight + ?Sized> LineOfSight for std::sync::Arc<T> {
    fn trace(&self, from: Vec3, to: Vec3) -> Option<TraceHit> {
        (**self).trace(from, to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wall() -> ObstacleField {
        ObstacleField::new().with_obstacle(AABB::pillar(Vec3::new(0.0, 0.0, 5.0), 4.0, 1.0, 3.0))
    }

    #[test]
    fn test_open_field_never_blocks() {
        assert!(OpenField.is_clear(Vec3::ZERO, Vec3::new(0.0, 0.0, 100.0)));
    }

    #[test]
    fn test_wall_blocks_trace() {
        let hit = wall().trace(Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, 1.0, 10.0)).unwrap();
        assert!((hit.distance - 4.5).abs() < 1e-3);
        assert_eq!(hit.normal, Vec3::NEG_Z);
    }

    #[test]
    fn test_trace_stops_at_segment_end() {
        assert!(wall().is_clear(Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, 1.0, 4.0)));
    }

    #[test]
    fn test_trace_over_wall() {
        assert!(wall().is_clear(Vec3::new(0.0, 4.0, 0.0), Vec3::new(0.0, 4.0, 10.0)));
    }
}
