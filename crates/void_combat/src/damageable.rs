//! The contract every hittable entity implements

use std::sync::Arc;
use void_event::{EventChannel, SubscriberId};
use void_math::{Pose, Vec3};

use crate::damage::DamageInfo;
use crate::entity::{EntityId, Faction};
use crate::health::HealthEvent;

/// Health mutation plus a damage/death notification channel
pub trait Damageable {
    /// Apply damage; returns the amount actually taken
    fn take_damage(&mut self, damage: &DamageInfo) -> f32;

    /// Restore health; returns the amount actually healed
    fn heal(&mut self, amount: f32) -> f32;

    fn is_alive(&self) -> bool;

    fn current_health(&self) -> f32;

    fn max_health(&self) -> f32;

    fn health_fraction(&self) -> f32 {
        let max = self.max_health();
        if max <= 0.0 {
            0.0
        } else {
            self.current_health() / max
        }
    }

    /// Receive damage/heal/death events in `channel`
    fn subscribe(&mut self, channel: &Arc<EventChannel<HealthEvent>>) -> SubscriberId;

    fn unsubscribe(&mut self, id: SubscriberId) -> bool;
}

/// A damageable entity agents can perceive, aim at and push around
pub trait Targetable: Damageable + Send + Sync {
    fn id(&self) -> EntityId;

    fn faction(&self) -> Faction;

    /// Feet position and facing
    fn pose(&self) -> Pose;

    /// Point to aim at (chest height)
    fn aim_point(&self) -> Vec3;

    /// False while pooled or disabled
    fn is_active(&self) -> bool;

    /// Radius of the hit sphere around `aim_point`
    fn hit_radius(&self) -> f32 {
        0.5
    }

    /// Receive a knockback impulse; the default ignores it
    fn apply_knockback(&mut self, _impulse: Vec3) {}
}
