//! 3D vector used for agent positions, headings and aim directions.
//!
//! World convention: `Y` is up, agents move on the `XZ` plane and
//! face along their forward vector (`+Z` at yaw zero).

use core::ops::{Add, AddAssign, Div, Mul, MulAssign, Neg, Sub, SubAssign};

/// 3D vector
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);
    pub const ONE: Self = Self::new(1.0, 1.0, 1.0);
    pub const X: Self = Self::new(1.0, 0.0, 0.0);
    pub const Y: Self = Self::new(0.0, 1.0, 0.0);
    pub const Z: Self = Self::new(0.0, 0.0, 1.0);
    pub const NEG_X: Self = Self::new(-1.0, 0.0, 0.0);
    pub const NEG_Y: Self = Self::new(0.0, -1.0, 0.0);
    pub const NEG_Z: Self = Self::new(0.0, 0.0, -1.0);

    #[inline]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub fn splat(v: f32) -> Self {
        Self::new(v, v, v)
    }

    #[inline]
    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    #[inline]
    pub fn cross(self, other: Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    #[inline]
    pub fn length_squared(self) -> f32 {
        self.dot(self)
    }

    #[inline]
    pub fn length(self) -> f32 {
        self.length_squared().sqrt()
    }

    #[inline]
    pub fn distance(self, other: Self) -> f32 {
        (other - self).length()
    }

    #[inline]
    pub fn distance_squared(self, other: Self) -> f32 {
        (other - self).length_squared()
    }

    /// Distance ignoring the vertical axis
    #[inline]
    pub fn horizontal_distance(self, other: Self) -> f32 {
        (other - self).horizontal().length()
    }

    #[inline]
    pub fn normalize(self) -> Self {
        let len = self.length();
        if len > 0.0 { self / len } else { Self::ZERO }
    }

    #[inline]
    pub fn normalize_or_zero(self) -> Self {
        let len_sq = self.length_squared();
        if len_sq > 1e-10 {
            self / len_sq.sqrt()
        } else {
            Self::ZERO
        }
    }

    /// Normalize, or fall back to `fallback` for degenerate vectors
    #[inline]
    pub fn normalize_or(self, fallback: Self) -> Self {
        let n = self.normalize_or_zero();
        if n == Self::ZERO { fallback } else { n }
    }

    /// Projection onto the ground plane (`y = 0`)
    #[inline]
    pub fn horizontal(self) -> Self {
        Self::new(self.x, 0.0, self.z)
    }

    #[inline]
    pub fn with_y(self, y: f32) -> Self {
        Self::new(self.x, y, self.z)
    }

    #[inline]
    pub fn lerp(self, other: Self, t: f32) -> Self {
        self + (other - self) * t
    }

    /// Unsigned angle between two vectors in degrees.
    ///
    /// Returns 0 when either vector is degenerate.
    pub fn angle_between(self, other: Self) -> f32 {
        let a = self.normalize_or_zero();
        let b = other.normalize_or_zero();
        if a == Self::ZERO || b == Self::ZERO {
            return 0.0;
        }
        a.dot(b).clamp(-1.0, 1.0).acos().to_degrees()
    }

    /// Rotate around the world up axis by `degrees` (counter-clockwise seen from above)
    pub fn rotate_y(self, degrees: f32) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Self::new(
            self.x * cos + self.z * sin,
            self.y,
            -self.x * sin + self.z * cos,
        )
    }

    /// Rotate around an arbitrary axis by `degrees` (Rodrigues' formula)
    pub fn rotate_around(self, axis: Self, degrees: f32) -> Self {
        let k = axis.normalize_or_zero();
        if k == Self::ZERO {
            return self;
        }
        let (sin, cos) = degrees.to_radians().sin_cos();
        self * cos + k.cross(self) * sin + k * (k.dot(self) * (1.0 - cos))
    }

    /// Any unit vector perpendicular to `self`
    pub fn any_orthogonal(self) -> Self {
        let helper = if self.y.abs() < 0.9 { Self::Y } else { Self::X };
        self.cross(helper).normalize_or_zero()
    }

    #[inline]
    pub fn min(self, other: Self) -> Self {
        Self::new(self.x.min(other.x), self.y.min(other.y), self.z.min(other.z))
    }

    #[inline]
    pub fn max(self, other: Self) -> Self {
        Self::new(self.x.max(other.x), self.y.max(other.y), self.z.max(other.z))
    }

    #[inline]
    pub fn abs(self) -> Self {
        Self::new(self.x.abs(), self.y.abs(), self.z.abs())
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    #[inline]
    pub fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

impl From<[f32; 3]> for Vec3 {
    fn from(a: [f32; 3]) -> Self {
        Self::new(a[0], a[1], a[2])
    }
}

impl Add for Vec3 {
    type Output = Self;
    #[inline] fn add(self, rhs: Self) -> Self { Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z) }
}
impl Sub for Vec3 {
    type Output = Self;
    #[inline] fn sub(self, rhs: Self) -> Self { Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z) }
}
impl Mul<f32> for Vec3 {
    type Output = Self;
    #[inline] fn mul(self, rhs: f32) -> Self { Self::new(self.x * rhs, self.y * rhs, self.z * rhs) }
}
impl Mul<Vec3> for f32 {
    type Output = Vec3;
    #[inline] fn mul(self, rhs: Vec3) -> Vec3 { Vec3::new(self * rhs.x, self * rhs.y, self * rhs.z) }
}
impl Div<f32> for Vec3 {
    type Output = Self;
    #[inline] fn div(self, rhs: f32) -> Self { Self::new(self.x / rhs, self.y / rhs, self.z / rhs) }
}
impl Neg for Vec3 {
    type Output = Self;
    #[inline] fn neg(self) -> Self { Self::new(-self.x, -self.y, -self.z) }
}
impl AddAssign for Vec3 {
    #[inline] fn add_assign(&mut self, rhs: Self) { *self = *self + rhs; }
}
impl SubAssign for Vec3 {
    #[inline] fn sub_assign(&mut self, rhs: Self) { *self = *self - rhs; }
}
impl MulAssign<f32> for Vec3 {
    #[inline] fn mul_assign(&mut self, rhs: f32) { *self = *self * rhs; }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_vec3_dot() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 5.0, 6.0);
        assert_eq!(a.dot(b), 32.0);
    }

    #[test]
    fn test_vec3_cross() {
        let z = Vec3::X.cross(Vec3::Y);
        assert!((z - Vec3::Z).length() < 1e-6);
    }

    #[test]
    fn test_angle_between() {
        assert_abs_diff_eq!(Vec3::Z.angle_between(Vec3::X), 90.0, epsilon = 1e-3);
        assert_abs_diff_eq!(Vec3::Z.angle_between(Vec3::NEG_Z), 180.0, epsilon = 1e-3);
        assert_eq!(Vec3::ZERO.angle_between(Vec3::X), 0.0);
    }

    #[test]
    fn test_rotate_y_quarter_turn() {
        let r = Vec3::Z.rotate_y(90.0);
        assert_abs_diff_eq!(r.x, 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(r.z, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_rotate_around_matches_rotate_y() {
        let v = Vec3::new(0.3, 0.2, 1.0);
        let a = v.rotate_y(37.0);
        let b = v.rotate_around(Vec3::Y, 37.0);
        assert_abs_diff_eq!(a.x, b.x, epsilon = 1e-5);
        assert_abs_diff_eq!(a.y, b.y, epsilon = 1e-5);
        assert_abs_diff_eq!(a.z, b.z, epsilon = 1e-5);
    }

    #[test]
    fn test_horizontal_distance_ignores_height() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(3.0, 10.0, 4.0);
        assert_abs_diff_eq!(a.horizontal_distance(b), 5.0);
    }

    #[test]
    fn test_any_orthogonal() {
        for v in [Vec3::X, Vec3::Y, Vec3::new(1.0, 2.0, 3.0)] {
            assert_abs_diff_eq!(v.dot(v.any_orthogonal()), 0.0, epsilon = 1e-5);
        }
    }
}
