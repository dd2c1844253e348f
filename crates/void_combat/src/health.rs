//! Health component and management

use crate::damage::DamageInfo;
use crate::entity::EntityId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use void_event::{EventChannel, SubscriberId, Subscribers};
use void_math::Vec3;

/// Events emitted by the health system
#[derive(Debug, Clone, PartialEq)]
pub enum HealthEvent {
    /// Damage was taken
    Damaged {
        entity: EntityId,
        amount: f32,
        source: Option<EntityId>,
        hit_point: Vec3,
        new_health: f32,
    },
    /// Entity was healed
    Healed {
        entity: EntityId,
        amount: f32,
        new_health: f32,
    },
    /// Entity died
    Died {
        entity: EntityId,
        killer: Option<EntityId>,
    },
}

impl HealthEvent {
    pub fn entity(&self) -> EntityId {
        match self {
            HealthEvent::Damaged { entity, .. }
            | HealthEvent::Healed { entity, .. }
            | HealthEvent::Died { entity, .. } => *entity,
        }
    }
}

/// Health component for entities
#[derive(Serialize, Deserialize)]
pub struct HealthComponent {
    /// Entity reported in events
    #[serde(skip, default = "default_owner")]
    pub owner: EntityId,
    /// Current health
    pub current: f32,
    /// Maximum health
    pub max: f32,
    /// Health regeneration per second (0 = no regen)
    pub regeneration: f32,
    /// Delay before regeneration starts (after taking damage)
    pub regen_delay: f32,
    /// Time since last damage (for regen delay)
    #[serde(skip)]
    pub time_since_damage: f32,
    /// Remaining invulnerability time
    #[serde(skip)]
    pub invulnerability_timer: f32,
    /// Invulnerability duration after taking damage (i-frames)
    pub invulnerability_on_hit: f32,
    /// Whether this entity is dead
    #[serde(skip)]
    pub is_dead: bool,
    #[serde(skip)]
    subscribers: Subscribers<HealthEvent>,
}

fn default_owner() -> EntityId {
    EntityId(0)
}

impl HealthComponent {
    /// Create a new health component
    pub fn new(max_health: f32) -> Self {
        let max = max_health.max(0.0);
        Self {
            owner: default_owner(),
            current: max,
            max,
            regeneration: 0.0,
            regen_delay: 0.0,
            time_since_damage: f32::MAX,
            invulnerability_timer: 0.0,
            invulnerability_on_hit: 0.0,
            is_dead: max <= 0.0,
            subscribers: Subscribers::new(),
        }
    }

    /// Set the entity reported in events
    pub fn with_owner(mut self, owner: EntityId) -> Self {
        self.owner = owner;
        self
    }

    /// Set regeneration rate
    pub fn with_regeneration(mut self, rate: f32) -> Self {
        self.regeneration = rate;
        self
    }

    /// Set regeneration delay
    pub fn with_regen_delay(mut self, delay: f32) -> Self {
        self.regen_delay = delay;
        self
    }

    /// Set invulnerability time after hit
    pub fn with_invulnerability_on_hit(mut self, duration: f32) -> Self {
        self.invulnerability_on_hit = duration;
        self
    }

    pub fn is_invulnerable(&self) -> bool {
        self.invulnerability_timer > 0.0
    }

    /// Apply damage to this health component.
    ///
    /// Returns the actual damage dealt and whether the entity died from it.
    pub fn apply_damage(&mut self, damage: &DamageInfo) -> (f32, bool) {
        if self.is_dead || self.is_invulnerable() || damage.amount <= 0.0 {
            return (0.0, false);
        }

        let before = self.current;
        self.current = (self.current - damage.amount).max(0.0);
        let dealt = before - self.current;
        self.time_since_damage = 0.0;

        // Apply i-frames
        if self.invulnerability_on_hit > 0.0 {
            self.invulnerability_timer = self.invulnerability_on_hit;
        }

        self.subscribers.publish(&HealthEvent::Damaged {
            entity: self.owner,
            amount: dealt,
            source: damage.source,
            hit_point: damage.hit_point,
            new_health: self.current,
        });

        let died = self.current <= 0.0;
        if died {
            self.is_dead = true;
            log::info!("{} died", self.owner);
            self.subscribers.publish(&HealthEvent::Died {
                entity: self.owner,
                killer: damage.source,
            });
        }

        (dealt, died)
    }

    /// Heal the entity.
    ///
    /// Returns the actual amount healed; the dead cannot be healed.
    pub fn heal(&mut self, amount: f32) -> f32 {
        let healed = self.restore(amount);
        if healed > 0.0 {
            self.subscribers.publish(&HealthEvent::Healed {
                entity: self.owner,
                amount: healed,
                new_health: self.current,
            });
        }
        healed
    }

    fn restore(&mut self, amount: f32) -> f32 {
        if self.is_dead || amount <= 0.0 {
            return 0.0;
        }
        let old_health = self.current;
        self.current = (self.current + amount).min(self.max);
        self.current - old_health
    }

    /// Update timers and regeneration (call once per tick)
    pub fn update(&mut self, delta_time: f32) {
        if self.invulnerability_timer > 0.0 {
            self.invulnerability_timer = (self.invulnerability_timer - delta_time).max(0.0);
        }

        if !self.is_dead && self.regeneration > 0.0 && self.current < self.max {
            self.time_since_damage += delta_time;
            if self.time_since_damage >= self.regen_delay {
                self.restore(self.regeneration * delta_time);
            }
        }
    }

    /// Refill and revive (pooling)
    pub fn revive(&mut self) {
        self.is_dead = self.max <= 0.0;
        self.current = self.max;
        self.invulnerability_timer = 0.0;
        self.time_since_damage = f32::MAX;
    }

    /// Change the maximum, refilling to it
    pub fn set_max(&mut self, max: f32) {
        self.max = max.max(0.0);
        self.revive();
    }

    /// Get health as a fraction (0.0 - 1.0)
    pub fn fraction(&self) -> f32 {
        if self.max <= 0.0 {
            return 0.0;
        }
        self.current / self.max
    }

    /// Check if at full health
    pub fn is_full(&self) -> bool {
        self.current >= self.max
    }

    /// Check if alive
    pub fn is_alive(&self) -> bool {
        !self.is_dead
    }

    /// Deliver future events into `channel`
    pub fn subscribe(&mut self, channel: &Arc<EventChannel<HealthEvent>>) -> SubscriberId {
        self.subscribers.subscribe(channel)
    }

    /// Call `handler` for every future event
    pub fn subscribe_fn<F>(&mut self, handler: F) -> SubscriberId
    where
        F: Fn(&HealthEvent) + Send + Sync + 'static,
    {
        self.subscribers.subscribe_fn(handler)
    }

    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        self.subscribers.unsubscribe(id)
    }
}

impl Default for HealthComponent {
    fn default() -> Self {
        Self::new(100.0)
    }
}

impl std::fmt::Debug for HealthComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthComponent")
            .field("owner", &self.owner)
            .field("current", &self.current)
            .field("max", &self.max)
            .field("is_dead", &self.is_dead)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::damage::DamageType;
    use approx::assert_relative_eq;

    #[test]
    fn test_health_component() {
        let mut health = HealthComponent::new(100.0);

        assert_eq!(health.current, 100.0);
        assert!(health.is_alive());

        let (dealt, died) = health.apply_damage(&DamageInfo::new(30.0, DamageType::Melee));
        assert_eq!(dealt, 30.0);
        assert!(!died);
        assert_eq!(health.current, 70.0);
        assert_relative_eq!(health.fraction(), 0.7);
    }

    #[test]
    fn test_death_is_latched() {
        let mut health = HealthComponent::new(50.0);
        let channel = EventChannel::shared();
        health.subscribe(&channel);

        let (dealt, died) = health.apply_damage(&DamageInfo::new(100.0, DamageType::Melee));
        assert_eq!(dealt, 50.0);
        assert!(died);
        assert!(health.is_dead);

        // Further damage and healing are ignored
        assert_eq!(health.apply_damage(&DamageInfo::new(10.0, DamageType::Melee)), (0.0, false));
        assert_eq!(health.heal(10.0), 0.0);

        let events = channel.drain();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], HealthEvent::Died { .. }));
    }

    #[test]
    fn test_healing() {
        let mut health = HealthComponent::new(100.0);
        health.apply_damage(&DamageInfo::new(50.0, DamageType::Melee));

        assert_eq!(health.heal(30.0), 30.0);
        assert_eq!(health.current, 80.0);

        // Can't overheal
        assert_eq!(health.heal(50.0), 20.0);
        assert_eq!(health.current, 100.0);
        assert_eq!(health.heal(5.0), 0.0);
    }

    #[test]
    fn test_invulnerability_window() {
        let mut health = HealthComponent::new(100.0).with_invulnerability_on_hit(0.5);
        health.apply_damage(&DamageInfo::new(10.0, DamageType::Melee));
        assert_eq!(health.apply_damage(&DamageInfo::new(10.0, DamageType::Melee)).0, 0.0);

        health.update(0.6);
        assert_eq!(health.apply_damage(&DamageInfo::new(10.0, DamageType::Melee)).0, 10.0);
    }

    #[test]
    fn test_regeneration_after_delay() {
        let mut health = HealthComponent::new(100.0).with_regeneration(10.0).with_regen_delay(1.0);
        health.apply_damage(&DamageInfo::new(50.0, DamageType::Melee));

        health.update(0.5);
        assert_eq!(health.current, 50.0);
        health.update(0.5);
        health.update(1.0);
        assert!(health.current > 50.0);
    }

    #[test]
    fn test_events_carry_owner_and_source() {
        let mut health = HealthComponent::new(100.0).with_owner(EntityId(7));
        let channel = EventChannel::shared();
        let id = health.subscribe(&channel);

        health.apply_damage(&DamageInfo::new(5.0, DamageType::Ranged).with_source(EntityId(3)));
        match channel.receive() {
            Some(HealthEvent::Damaged { entity, source, .. }) => {
                assert_eq!(entity, EntityId(7));
                assert_eq!(source, Some(EntityId(3)));
            }
            other => panic!("unexpected event {other:?}"),
        }

        assert!(health.unsubscribe(id));
        health.heal(5.0);
        assert!(channel.is_empty());
    }
}
