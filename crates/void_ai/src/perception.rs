//! Target perception
//!
//! A single observer/target check run on a throttled cadence. Direct sight
//! needs range, a small height gap, the field-of-view cone and a clear
//! eye-to-eye trace. When any of the later checks fail the target can still
//! be *sensed* (known about but not seen) if the navigation service can
//! reach it.

use serde::{Deserialize, Serialize};
use void_math::{LineOfSight, Pose, Vec3};

use crate::navigation::{is_reachable, NavigationPort};

/// Perception tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerceptionConfig {
    /// Maximum distance at which anything is perceived
    pub detection_range: f32,
    /// Height gap beyond which only reachability counts
    pub detection_height: f32,
    /// Full cone angle in degrees
    pub field_of_view: f32,
    /// Height of the eyes above the feet
    pub eye_height: f32,
    /// How close a partial path must end to the target to count as reachable
    pub reach_tolerance: f32,
    /// Radius of indirect awareness for targets outside the cone or behind cover
    pub awareness_radius: f32,
    /// Seconds between perception cycles
    pub interval: f32,
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            detection_range: 15.0,
            detection_height: 2.0,
            field_of_view: 120.0,
            eye_height: 1.6,
            reach_tolerance: 5.0,
            awareness_radius: 4.0,
            interval: 0.3,
        }
    }
}

impl PerceptionConfig {
    pub fn with_range(mut self, range: f32) -> Self {
        self.detection_range = range;
        self
    }

    pub fn with_field_of_view(mut self, degrees: f32) -> Self {
        self.field_of_view = degrees;
        self
    }

    pub fn with_awareness_radius(mut self, radius: f32) -> Self {
        self.awareness_radius = radius;
        self
    }

    pub fn with_interval(mut self, interval: f32) -> Self {
        self.interval = interval;
        self
    }
}

/// Outcome of one perception cycle.
///
/// Fields are read-only outside this module; `can_see_target` always
/// implies `has_target`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PerceptionResult {
    has_target: bool,
    can_see_target: bool,
    last_known_position: Option<Vec3>,
    distance: f32,
}

impl PerceptionResult {
    /// Nothing perceived
    pub fn none() -> Self {
        Self::default()
    }

    fn sensed(distance: f32) -> Self {
        Self {
            has_target: true,
            can_see_target: false,
            last_known_position: None,
            distance,
        }
    }

    fn seen(position: Vec3, distance: f32) -> Self {
        Self {
            has_target: true,
            can_see_target: true,
            last_known_position: Some(position),
            distance,
        }
    }

    /// A target exists, possibly only through indirect evidence
    pub fn has_target(&self) -> bool {
        self.has_target
    }

    /// Unobstructed direct sight this cycle
    pub fn can_see_target(&self) -> bool {
        self.can_see_target
    }

    /// Where the target was last directly seen
    pub fn last_known_position(&self) -> Option<Vec3> {
        self.last_known_position
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }
}

/// The perceiving agent
pub struct Observer<'a> {
    pub pose: Pose,
    pub eye_height: f32,
    pub nav: &'a dyn NavigationPort,
    pub sight: &'a dyn LineOfSight,
}

/// What is known about a candidate target's body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observed {
    /// Feet position
    pub position: Vec3,
    /// Point to look at
    pub aim_point: Vec3,
}

/// Run the detection checks in order, short-circuiting on the first failure
pub fn detect(observer: &Observer<'_>, target: &Observed, config: &PerceptionConfig) -> PerceptionResult {
    let origin = observer.pose.position;
    let distance = origin.distance(target.position);

    if distance > config.detection_range {
        return PerceptionResult::none();
    }

    let reachable = || is_reachable(observer.nav, target.position, config.reach_tolerance);
    let indirect = || {
        if distance <= config.awareness_radius && reachable() {
            PerceptionResult::sensed(distance)
        } else {
            PerceptionResult::none()
        }
    };

    let height_gap = (target.position.y - origin.y).abs();
    if height_gap > config.detection_height {
        return if reachable() {
            PerceptionResult::sensed(distance)
        } else {
            PerceptionResult::none()
        };
    }

    if observer.pose.angle_to(target.position) > config.field_of_view * 0.5 {
        return indirect();
    }

    let eye = observer.pose.eye(observer.eye_height);
    if !observer.sight.is_clear(eye, target.aim_point) {
        return indirect();
    }

    PerceptionResult::seen(target.position, distance)
}

/// Throttled perception with memory of the last sighting
#[derive(Debug, Clone)]
pub struct PerceptionModule {
    config: PerceptionConfig,
    result: PerceptionResult,
    /// Seconds until the next cycle
    countdown: f32,
}

impl PerceptionModule {
    pub fn new(config: PerceptionConfig) -> Self {
        Self {
            config,
            result: PerceptionResult::none(),
            countdown: 0.0,
        }
    }

    pub fn config(&self) -> &PerceptionConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: PerceptionConfig) {
        self.config = config;
    }

    pub fn result(&self) -> &PerceptionResult {
        &self.result
    }

    /// Advance the cadence timer; true when a cycle is due
    pub fn tick(&mut self, delta: f32) -> bool {
        self.countdown = (self.countdown - delta).max(0.0);
        // Tolerate accumulated float error from fixed steps
        if self.countdown <= 1e-4 {
            self.countdown = self.config.interval.max(0.0);
            true
        } else {
            false
        }
    }

    /// Make the next `tick` run a cycle
    pub fn force_next(&mut self) {
        self.countdown = 0.0;
    }

    /// Run one cycle against `target` (or nothing) and store the result
    pub fn perceive(&mut self, observer: &Observer<'_>, target: Option<&Observed>) -> &PerceptionResult {
        let previous = self.result.last_known_position;
        let mut result = match target {
            Some(target) => detect(observer, target, &self.config),
            None => PerceptionResult::none(),
        };
        if result.last_known_position.is_none() {
            result.last_known_position = previous;
        }
        if result.has_target && !self.result.has_target {
            log::debug!(
                "perception acquired target at {:.1} (seen: {})",
                result.distance,
                result.can_see_target
            );
        }
        self.result = result;
        &self.result
    }

    /// Forget everything, including the last sighting
    pub fn clear(&mut self) {
        self.result = PerceptionResult::none();
        self.countdown = 0.0;
    }
}

impl Default for PerceptionModule {
    fn default() -> Self {
        Self::new(PerceptionConfig::default())
    }
}
