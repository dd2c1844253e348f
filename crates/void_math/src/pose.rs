//! Position + facing of an agent on the ground plane.

use crate::vector::Vec3;

/// Where an agent stands and which way it faces.
///
/// `forward` is kept horizontal and unit length; yaw zero faces `+Z`.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Pose {
    pub position: Vec3,
    pub forward: Vec3,
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            forward: Vec3::Z,
        }
    }
}

impl Pose {
    pub fn new(position: Vec3, forward: Vec3) -> Self {
        Self {
            position,
            forward: forward.horizontal().normalize_or(Vec3::Z),
        }
    }

    pub fn at(position: Vec3) -> Self {
        Self::new(position, Vec3::Z)
    }

    /// Pose facing `yaw` degrees from `+Z` toward `+X`
    pub fn from_yaw(position: Vec3, yaw: f32) -> Self {
        Self::new(position, Vec3::Z.rotate_y(yaw))
    }

    /// Heading in degrees, `atan2(x, z)`
    pub fn yaw(&self) -> f32 {
        self.forward.x.atan2(self.forward.z).to_degrees()
    }

    /// Right-hand side vector on the ground plane
    pub fn right(&self) -> Vec3 {
        Vec3::Y.cross(self.forward).normalize_or(Vec3::X)
    }

    /// Eye point `height` above the feet
    pub fn eye(&self, height: f32) -> Vec3 {
        self.position + Vec3::Y * height
    }

    /// Turn to face `target` horizontally. No-op when `target` is directly above or below.
    pub fn look_at(&mut self, target: Vec3) {
        let dir = (target - self.position).horizontal();
        if dir.length_squared() > 1e-8 {
            self.forward = dir.normalize();
        }
    }

    /// Rotate toward `target` by at most `max_degrees`
    pub fn turn_towards(&mut self, target: Vec3, max_degrees: f32) {
        let dir = (target - self.position).horizontal();
        if dir.length_squared() <= 1e-8 {
            return;
        }
        let dir = dir.normalize();
        let angle = self.forward.angle_between(dir);
        if angle <= max_degrees {
            self.forward = dir;
            return;
        }
        let sign = if self.forward.cross(dir).y >= 0.0 { 1.0 } else { -1.0 };
        self.forward = self.forward.rotate_y(sign * max_degrees).horizontal().normalize_or(dir);
    }

    /// Horizontal angle in degrees between `forward` and the direction to `target`
    pub fn angle_to(&self, target: Vec3) -> f32 {
        self.forward.angle_between((target - self.position).horizontal())
    }

    /// Offset expressed in this pose's local frame (`x` right, `z` forward)
    pub fn local_to_world(&self, local: Vec3) -> Vec3 {
        self.position + self.right() * local.x + Vec3::Y * local.y + self.forward * local.z
    }
}
