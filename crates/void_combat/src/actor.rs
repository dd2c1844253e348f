//! Physical body of a combatant

use std::sync::Arc;
use void_event::{EventChannel, SubscriberId};
use void_math::{Pose, Vec3};

use crate::damage::DamageInfo;
use crate::damageable::{Damageable, Targetable};
use crate::entity::{EntityId, Faction};
use crate::health::{HealthComponent, HealthEvent};

/// A body in the world: pose, health and hit volume.
///
/// Agents and the player are both `Actor`s; agents sync their pose into it
/// every tick and read knockback back out.
#[derive(Debug)]
pub struct Actor {
    id: EntityId,
    faction: Faction,
    pub pose: Pose,
    pub health: HealthComponent,
    active: bool,
    /// Height of the aim point above the feet
    pub aim_height: f32,
    pub hit_radius: f32,
    pending_knockback: Vec3,
    /// Accepts knockback at all
    pub pushable: bool,
}

impl Actor {
    pub fn new(id: EntityId, faction: Faction, max_health: f32) -> Self {
        Self {
            id,
            faction,
            pose: Pose::default(),
            health: HealthComponent::new(max_health).with_owner(id),
            active: true,
            aim_height: 1.0,
            hit_radius: 0.5,
            pending_knockback: Vec3::ZERO,
            pushable: true,
        }
    }

    pub fn at(mut self, position: Vec3) -> Self {
        self.pose.position = position;
        self
    }

    pub fn with_pose(mut self, pose: Pose) -> Self {
        self.pose = pose;
        self
    }

    pub fn with_hit_radius(mut self, radius: f32) -> Self {
        self.hit_radius = radius;
        self
    }

    pub fn with_aim_height(mut self, height: f32) -> Self {
        self.aim_height = height;
        self
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Take the knockback accumulated since the last call
    pub fn take_knockback(&mut self) -> Vec3 {
        std::mem::replace(&mut self.pending_knockback, Vec3::ZERO)
    }

    /// Refill health, clear knockback and reactivate (pooling)
    pub fn revive(&mut self) {
        self.health.revive();
        self.pending_knockback = Vec3::ZERO;
        self.active = true;
    }
}

impl Damageable for Actor {
    fn take_damage(&mut self, damage: &DamageInfo) -> f32 {
        if !self.active {
            return 0.0;
        }
        let (dealt, _) = self.health.apply_damage(damage);
        if dealt > 0.0 && damage.causes_knockback() {
            self.apply_knockback(damage.knockback);
        }
        dealt
    }

    fn heal(&mut self, amount: f32) -> f32 {
        self.health.heal(amount)
    }

    fn is_alive(&self) -> bool {
        self.health.is_alive()
    }

    fn current_health(&self) -> f32 {
        self.health.current
    }

    fn max_health(&self) -> f32 {
        self.health.max
    }

    fn health_fraction(&self) -> f32 {
        self.health.fraction()
    }

    fn subscribe(&mut self, channel: &Arc<EventChannel<HealthEvent>>) -> SubscriberId {
        self.health.subscribe(channel)
    }

    fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        self.health.unsubscribe(id)
    }
}

impl Targetable for Actor {
    fn id(&self) -> EntityId {
        self.id
    }

    fn faction(&self) -> Faction {
        self.faction
    }

    fn pose(&self) -> Pose {
        self.pose
    }

    fn aim_point(&self) -> Vec3 {
        self.pose.position + Vec3::Y * self.aim_height
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn hit_radius(&self) -> f32 {
        self.hit_radius
    }

    fn apply_knockback(&mut self, impulse: Vec3) {
        if self.pushable && self.health.is_alive() {
            self.pending_knockback += impulse;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::damage::DamageType;

    #[test]
    fn test_knockback_accumulates_and_drains() {
        let mut actor = Actor::new(EntityId(1), Faction::Ally, 100.0);
        actor.take_damage(&DamageInfo::new(5.0, DamageType::Area).with_knockback(Vec3::X * 2.0));
        actor.apply_knockback(Vec3::Z);

        assert_eq!(actor.take_knockback(), Vec3::new(2.0, 0.0, 1.0));
        assert_eq!(actor.take_knockback(), Vec3::ZERO);
    }

    #[test]
    fn test_inactive_actor_ignores_damage() {
        let mut actor = Actor::new(EntityId(1), Faction::Ally, 100.0);
        actor.set_active(false);
        assert_eq!(actor.take_damage(&DamageInfo::new(50.0, DamageType::Melee)), 0.0);
        assert_eq!(actor.current_health(), 100.0);
    }

    #[test]
    fn test_revive() {
        let mut actor = Actor::new(EntityId(1), Faction::Hostile, 10.0);
        actor.take_damage(&DamageInfo::new(50.0, DamageType::Melee));
        assert!(!actor.is_alive());
        actor.revive();
        assert!(actor.is_alive());
        assert_eq!(actor.health_fraction(), 1.0);
    }
}
