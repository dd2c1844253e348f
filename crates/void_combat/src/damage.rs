//! Damage types and information

use serde::{Deserialize, Serialize};
use void_math::Vec3;

use crate::entity::EntityId;

/// How the damage was delivered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DamageType {
    /// Close range strike
    #[default]
    Melee,
    /// Bullet or projectile
    Ranged,
    /// Body collision (charges)
    Impact,
    /// Area burst (stomps)
    Area,
}

/// Information about a damage instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageInfo {
    /// Base damage amount
    pub amount: f32,
    /// Type of damage
    pub damage_type: DamageType,
    /// Entity that caused the damage (if any)
    pub source: Option<EntityId>,
    /// World position where damage was applied
    pub hit_point: Vec3,
    /// Surface normal at hit point
    pub hit_normal: Vec3,
    /// Knockback impulse applied with the hit
    pub knockback: Vec3,
}

impl DamageInfo {
    /// Create new damage info
    pub fn new(amount: f32, damage_type: DamageType) -> Self {
        Self {
            amount,
            damage_type,
            source: None,
            hit_point: Vec3::ZERO,
            hit_normal: Vec3::Y,
            knockback: Vec3::ZERO,
        }
    }

    /// Set the source entity
    pub fn with_source(mut self, entity: EntityId) -> Self {
        self.source = Some(entity);
        self
    }

    /// Set hit point and normal
    pub fn with_hit(mut self, point: Vec3, normal: Vec3) -> Self {
        self.hit_point = point;
        self.hit_normal = normal.normalize_or(Vec3::Y);
        self
    }

    /// Set knockback impulse
    pub fn with_knockback(mut self, impulse: Vec3) -> Self {
        self.knockback = impulse;
        self
    }

    /// Scale the amount (damage modifiers)
    pub fn scaled(mut self, multiplier: f32) -> Self {
        self.amount *= multiplier.max(0.0);
        self
    }

    pub fn causes_knockback(&self) -> bool {
        self.knockback.length_squared() > 1e-8
    }
}

impl Default for DamageInfo {
    fn default() -> Self {
        Self::new(0.0, DamageType::Melee)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_damage_info() {
        let damage = DamageInfo::new(50.0, DamageType::Ranged)
            .with_source(EntityId(123))
            .with_hit(Vec3::new(1.0, 1.0, 0.0), Vec3::new(0.0, 0.0, -2.0))
            .scaled(1.5);

        assert_eq!(damage.amount, 75.0);
        assert_eq!(damage.source, Some(EntityId(123)));
        assert_eq!(damage.hit_normal, Vec3::NEG_Z);
        assert!(!damage.causes_knockback());
    }

    #[test]
    fn test_negative_scale_is_clamped() {
        let damage = DamageInfo::new(10.0, DamageType::Melee).scaled(-1.0);
        assert_eq!(damage.amount, 0.0);
    }
}
