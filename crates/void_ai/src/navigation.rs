//! Navigation service port
//!
//! Agents never pathfind themselves. They ask a [`NavigationPort`] to move
//! them, read back progress, and hand control over to scripted motion when
//! the service reports a traversal link under them.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use void_math::Vec3;

/// Navigation failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NavError {
    #[error("navigation is disabled")]
    Disabled,

    #[error("position {0:?} is not on the navigable surface")]
    OffMesh(Vec3),

    #[error("no path to {0:?}")]
    NoPath(Vec3),
}

pub type Result<T> = std::result::Result<T, NavError>;

/// Special segment that needs scripted movement (a jump)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TraversalLink {
    pub start: Vec3,
    pub end: Vec3,
}

impl TraversalLink {
    pub fn length(&self) -> f32 {
        self.start.distance(self.end)
    }
}

/// Outcome of a path query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathStatus {
    /// The path reaches the requested point
    Complete,
    /// The path ends short of the requested point
    Partial,
    /// No path at all
    #[default]
    Invalid,
}

/// Result of [`NavigationPort::calculate_path`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathQuery {
    pub status: PathStatus,
    pub corners: Vec<Vec3>,
}

impl PathQuery {
    pub fn invalid() -> Self {
        Self::default()
    }

    /// Last corner of the path
    pub fn end(&self) -> Option<Vec3> {
        self.corners.last().copied()
    }

    /// Does the path get within `tolerance` of `target`?
    ///
    /// Complete paths always do; partial paths only when their terminal
    /// corner is close enough.
    pub fn reaches(&self, target: Vec3, tolerance: f32) -> bool {
        match self.status {
            PathStatus::Complete => true,
            PathStatus::Partial => self
                .end()
                .is_some_and(|end| end.distance(target) <= tolerance),
            PathStatus::Invalid => false,
        }
    }
}

/// Pathfinding service consumed by agents.
///
/// Implementations own the agent's navigable position; the agent reads it
/// back every tick. All commands are idempotent.
pub trait NavigationPort: Send + Sync {
    /// Current position on the navigable surface
    fn position(&self) -> Vec3;

    /// Current movement velocity
    fn velocity(&self) -> Vec3 {
        Vec3::ZERO
    }

    /// Plan and follow a path to `target`
    fn set_destination(&mut self, target: Vec3) -> Result<()>;

    /// Halt movement, keeping the path
    fn stop(&mut self);

    /// Continue along the current path
    fn resume(&mut self);

    fn is_stopped(&self) -> bool;

    fn set_speed(&mut self, speed: f32);

    fn speed(&self) -> f32;

    /// Distance left along the current path (0 without a path)
    fn remaining_distance(&self) -> f32;

    /// Distance at which the destination counts as reached
    fn stopping_distance(&self) -> f32 {
        0.5
    }

    /// True while a path request has not been answered yet
    fn path_pending(&self) -> bool;

    fn has_path(&self) -> bool;

    fn is_on_traversal_link(&self) -> bool;

    /// The link under the agent, if any
    fn current_link(&self) -> Option<TraversalLink>;

    /// Mark the current link consumed. No-op when not on a link.
    fn complete_link(&mut self);

    /// Query a path without following it
    fn calculate_path(&self, target: Vec3) -> PathQuery;

    /// Teleport onto the navigable surface
    fn warp(&mut self, position: Vec3) -> Result<()>;

    fn set_enabled(&mut self, enabled: bool);

    fn is_enabled(&self) -> bool;

    /// Drop the current path without stopping
    fn reset_path(&mut self);

    /// Advance the service by `delta` seconds
    fn tick(&mut self, _delta: f32) {}
}

/// Reachability query: a complete path, or a partial path ending within `tolerance` of `target`
pub fn is_reachable(nav: &dyn NavigationPort, target: Vec3, tolerance: f32) -> bool {
    nav.calculate_path(target).reaches(target, tolerance)
}

/// Destination reached: no pending request and within stopping distance
pub fn has_arrived(nav: &dyn NavigationPort) -> bool {
    !nav.path_pending() && nav.remaining_distance() <= nav.stopping_distance()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_path_reaches_within_tolerance() {
        let target = Vec3::new(10.0, 4.0, 0.0);
        let near = PathQuery {
            status: PathStatus::Partial,
            corners: vec![Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0)],
        };
        let far = PathQuery {
            status: PathStatus::Partial,
            corners: vec![Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0)],
        };
        assert!(near.reaches(target, 5.0));
        assert!(!far.reaches(target, 5.0));
        assert!(!PathQuery::invalid().reaches(target, 100.0));
    }

    #[test]
    fn test_complete_path_always_reaches() {
        let q = PathQuery {
            status: PathStatus::Complete,
            corners: vec![Vec3::ZERO],
        };
        assert!(q.reaches(Vec3::new(100.0, 0.0, 0.0), 0.0));
    }

    #[test]
    fn test_nav_error_display() {
        let e = NavError::NoPath(Vec3::new(1.0, 2.0, 3.0));
        assert!(e.to_string().starts_with("no path"));
    }
}
