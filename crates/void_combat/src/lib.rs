//! Void Combat - Health, Damage, Targeting and Attacks
//!
//! This crate provides the combat layer agents fight with.
//!
//! # Features
//!
//! - Health component with regeneration, invulnerability and a death latch
//! - Damageable / targetable contracts with damage and death notifications
//! - Weak target handles and an injected target pool
//! - Attack resolution (melee arc, hitscan, projectile)
//! - Fire-mode cadence and dynamic spread
//! - Fire-and-forget effect triggers
//!
//! # Example
//!
//! ```ignore
//! use void_combat::prelude::*;
//!
//! let pool = TargetPool::new();
//! let player: SharedTarget = Arc::new(RwLock::new(Actor::new(EntityId(1), Faction::Ally, 100.0)));
//! let handle = pool.register(&player);
//!
//! let mut combat = CombatModule::new(AttackProfile::ranged(8.0, 25.0, FireMode::Burst), 42);
//! combat.attack(&handle, &ctx);
//! combat.update(dt, &ctx);
//! ```

pub mod actor;
pub mod combat;
pub mod damage;
pub mod damageable;
pub mod effects;
pub mod entity;
pub mod health;
pub mod target;

pub mod prelude {
    pub use crate::actor::Actor;
    pub use crate::combat::{
        AttackContext, AttackProfile, CombatModule, CombatStats, Delivery, FireMode, Projectile,
    };
    pub use crate::damage::{DamageInfo, DamageType};
    pub use crate::damageable::{Damageable, Targetable};
    pub use crate::effects::{EffectEvent, EffectKind, EffectLog, EffectSpawner, NoEffects};
    pub use crate::entity::{EntityId, Faction};
    pub use crate::health::{HealthComponent, HealthEvent};
    pub use crate::target::{Candidate, SharedTarget, TargetHandle, TargetPool};
}

pub use prelude::*;
