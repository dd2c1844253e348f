//! Mesh-backed navigation agent

use std::sync::Arc;
use void_math::Vec3;

use crate::navigation::{NavError, NavigationPort, PathQuery, PathStatus, Result, TraversalLink};
use crate::navmesh::{NavMesh, NavPath};

/// [`NavigationPort`] over a shared [`NavMesh`].
///
/// Paths are computed synchronously, so `path_pending` is always false.
/// Movement is integrated in [`NavigationPort::tick`]; reaching the start
/// of a traversal link halts the agent until `complete_link` is called.
#[derive(Debug, Clone)]
pub struct MeshNavigator {
    mesh: Arc<NavMesh>,
    position: Vec3,
    velocity: Vec3,
    speed: f32,
    stopping_distance: f32,
    /// Distance at which an intermediate corner counts as passed
    arrival_threshold: f32,
    path: Option<NavPath>,
    /// Index of the corner currently being walked toward
    corner: usize,
    destination: Option<Vec3>,
    link: Option<TraversalLink>,
    stopped: bool,
    enabled: bool,
}

impl MeshNavigator {
    /// Create a navigator standing at `position` (snapped onto the mesh when possible)
    pub fn new(mesh: Arc<NavMesh>, position: Vec3) -> Self {
        let position = mesh.snap(position).unwrap_or(position);
        Self {
            mesh,
            position,
            velocity: Vec3::ZERO,
            speed: 3.5,
            stopping_distance: 0.5,
            arrival_threshold: 0.1,
            path: None,
            corner: 0,
            destination: None,
            link: None,
            stopped: false,
            enabled: true,
        }
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_stopping_distance(mut self, distance: f32) -> Self {
        self.stopping_distance = distance;
        self
    }

    pub fn mesh(&self) -> &Arc<NavMesh> {
        &self.mesh
    }

    pub fn destination(&self) -> Option<Vec3> {
        self.destination
    }

    fn clear_path(&mut self) {
        self.path = None;
        self.corner = 0;
        self.link = None;
        self.velocity = Vec3::ZERO;
    }

    fn plan(&mut self, target: Vec3) -> Result<()> {
        let path = self.mesh.find_path(self.position, target);
        match path.status {
            PathStatus::Invalid => {
                self.clear_path();
                self.destination = None;
                if self.mesh.find_polygon(self.position).is_none() {
                    Err(NavError::OffMesh(self.position))
                } else {
                    Err(NavError::NoPath(target))
                }
            }
            PathStatus::Complete | PathStatus::Partial => {
                self.path = Some(path);
                // Corner 0 is the current position
                self.corner = 1;
                self.link = None;
                self.destination = Some(target);
                Ok(())
            }
        }
    }

    /// Walk along the path for `budget` distance
    fn advance(&mut self, mut budget: f32) -> Vec3 {
        let start = self.position;
        let Some(path) = self.path.as_ref() else {
            return start;
        };

        while budget > 0.0 {
            let Some(corner) = path.corners.get(self.corner).copied() else {
                break;
            };
            let to = corner.point - self.position;
            let distance = to.length();

            if distance <= budget || distance < self.arrival_threshold {
                budget -= distance;
                self.position = corner.point;
                self.corner += 1;
                if let Some(link) = corner.link {
                    self.link = Some(link);
                    break;
                }
            } else {
                self.position += to * (budget / distance);
                budget = 0.0;
            }
        }
        self.position - start
    }
}

impl NavigationPort for MeshNavigator {
    fn position(&self) -> Vec3 {
        self.position
    }

    fn velocity(&self) -> Vec3 {
        self.velocity
    }

    fn set_destination(&mut self, target: Vec3) -> Result<()> {
        if !self.enabled {
            return Err(NavError::Disabled);
        }
        if self.link.is_some() {
            // Replanning mid-link would strand the agent between layers
            self.destination = Some(target);
            return Ok(());
        }
        self.plan(target)
    }

    fn stop(&mut self) {
        self.stopped = true;
        self.velocity = Vec3::ZERO;
    }

    fn resume(&mut self) {
        self.stopped = false;
    }

    fn is_stopped(&self) -> bool {
        self.stopped
    }

    fn set_speed(&mut self, speed: f32) {
        self.speed = speed.max(0.0);
    }

    fn speed(&self) -> f32 {
        self.speed
    }

    fn remaining_distance(&self) -> f32 {
        let Some(path) = self.path.as_ref() else {
            return 0.0;
        };
        match path.corners.get(self.corner) {
            Some(next) => self.position.distance(next.point) + path.length_from(self.corner),
            None => 0.0,
        }
    }

    fn stopping_distance(&self) -> f32 {
        self.stopping_distance
    }

    fn path_pending(&self) -> bool {
        false
    }

    fn has_path(&self) -> bool {
        self.path.is_some()
    }

    fn is_on_traversal_link(&self) -> bool {
        self.link.is_some()
    }

    fn current_link(&self) -> Option<TraversalLink> {
        self.link
    }

    fn complete_link(&mut self) {
        let Some(link) = self.link.take() else {
            return;
        };
        self.position = link.end;
        if let Some(path) = self.path.as_ref() {
            // Skip the landing corner
            if path.corners.get(self.corner).is_some_and(|c| c.point == link.end) {
                self.corner += 1;
            }
        }
        // The destination may have moved while we were on the link
        if let Some(destination) = self.destination {
            if self.path.as_ref().and_then(|p| p.destination()) != Some(destination) {
                if let Err(err) = self.plan(destination) {
                    log::debug!("replan after link failed: {err}");
                }
            }
        }
    }

    fn calculate_path(&self, target: Vec3) -> PathQuery {
        self.mesh.find_path(self.position, target).to_query()
    }

    fn warp(&mut self, position: Vec3) -> Result<()> {
        let snapped = self.mesh.snap(position).ok_or(NavError::OffMesh(position))?;
        self.position = snapped;
        self.clear_path();
        if let Some(destination) = self.destination {
            if self.enabled {
                self.plan(destination)?;
            }
        }
        Ok(())
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.clear_path();
            self.destination = None;
        }
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn reset_path(&mut self) {
        self.clear_path();
        self.destination = None;
    }

    fn tick(&mut self, delta: f32) {
        if !self.enabled || self.stopped || self.link.is_some() || delta <= 0.0 {
            self.velocity = Vec3::ZERO;
            return;
        }
        let moved = self.advance(self.speed * delta);
        self.velocity = moved / delta;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigation::{has_arrived, is_reachable};

    fn arena() -> Arc<NavMesh> {
        let mut mesh = NavMesh::create_grid(20.0, 20.0, 5.0);
        mesh.add_grid(Vec3::new(30.0, 4.0, 0.0), 10.0, 10.0, 5.0);
        mesh.add_link(Vec3::new(19.5, 0.0, 2.5), Vec3::new(30.5, 4.0, 2.5), true);
        Arc::new(mesh)
    }

    fn run(nav: &mut MeshNavigator, seconds: f32) {
        let steps = (seconds / 0.1).round() as usize;
        for _ in 0..steps {
            nav.tick(0.1);
        }
    }

    #[test]
    fn test_walks_to_destination() {
        let mut nav = MeshNavigator::new(arena(), Vec3::new(2.5, 0.0, 2.5)).with_speed(5.0);
        nav.set_destination(Vec3::new(12.5, 0.0, 2.5)).unwrap();
        assert!(nav.has_path());
        assert!(nav.remaining_distance() > 9.0);

        run(&mut nav, 5.0);
        assert!(has_arrived(&nav));
        assert!(nav.position().distance(Vec3::new(12.5, 0.0, 2.5)) < 0.01);
    }

    #[test]
    fn test_stop_and_resume() {
        let mut nav = MeshNavigator::new(arena(), Vec3::new(2.5, 0.0, 2.5)).with_speed(5.0);
        nav.set_destination(Vec3::new(12.5, 0.0, 2.5)).unwrap();
        nav.stop();
        run(&mut nav, 1.0);
        assert_eq!(nav.position(), Vec3::new(2.5, 0.0, 2.5));
        assert_eq!(nav.velocity(), Vec3::ZERO);

        nav.resume();
        nav.tick(0.1);
        assert!(nav.velocity().length() > 0.0);
    }

    #[test]
    fn test_halts_on_link_until_completed() {
        let mut nav = MeshNavigator::new(arena(), Vec3::new(12.5, 0.0, 2.5)).with_speed(10.0);
        nav.set_destination(Vec3::new(35.0, 4.0, 2.5)).unwrap();
        run(&mut nav, 3.0);

        assert!(nav.is_on_traversal_link());
        let link = nav.current_link().unwrap();
        assert_eq!(nav.position(), link.start);

        nav.complete_link();
        assert!(!nav.is_on_traversal_link());
        assert_eq!(nav.position(), link.end);
        // Idempotent
        nav.complete_link();
        assert_eq!(nav.position(), link.end);

        run(&mut nav, 2.0);
        assert!(has_arrived(&nav));
        assert!((nav.position().y - 4.0).abs() < 1e-4);
    }

    #[test]
    fn test_reachability() {
        let nav = MeshNavigator::new(arena(), Vec3::new(2.5, 0.0, 2.5));
        assert!(is_reachable(&nav, Vec3::new(35.0, 4.0, 2.5), 5.0));

        let mut mesh = NavMesh::create_grid(20.0, 20.0, 5.0);
        mesh.add_grid(Vec3::new(30.0, 4.0, 0.0), 10.0, 10.0, 5.0);
        let isolated = MeshNavigator::new(Arc::new(mesh), Vec3::new(2.5, 0.0, 2.5));
        assert!(!is_reachable(&isolated, Vec3::new(35.0, 4.0, 2.5), 5.0));
    }

    #[test]
    fn test_disabled_rejects_destination() {
        let mut nav = MeshNavigator::new(arena(), Vec3::new(2.5, 0.0, 2.5));
        nav.set_enabled(false);
        assert_eq!(nav.set_destination(Vec3::new(5.0, 0.0, 5.0)), Err(NavError::Disabled));
        assert!(!nav.has_path());
    }

    #[test]
    fn test_warp_off_mesh_fails() {
        let mut nav = MeshNavigator::new(arena(), Vec3::new(2.5, 0.0, 2.5));
        assert!(matches!(nav.warp(Vec3::new(-50.0, 0.0, 0.0)), Err(NavError::OffMesh(_))));
        assert_eq!(nav.position(), Vec3::new(2.5, 0.0, 2.5));
        nav.warp(Vec3::new(7.0, 0.3, 7.0)).unwrap();
        assert_eq!(nav.position(), Vec3::new(7.0, 0.0, 7.0));
    }

    #[test]
    fn test_warp_keeps_destination() {
        let mut nav = MeshNavigator::new(arena(), Vec3::new(2.5, 0.0, 2.5)).with_speed(5.0);
        nav.set_destination(Vec3::new(17.5, 0.0, 17.5)).unwrap();
        nav.warp(Vec3::new(4.0, 0.0, 4.0)).unwrap();
        assert!(nav.has_path());
        run(&mut nav, 8.0);
        assert!(has_arrived(&nav));
    }
}
