//! Stat blocks and the catalog that provides them
//!
//! Agents never read configuration on their own. A [`StatProvider`] hands
//! each one an immutable stat block at `initialize`; [`AgentCatalog`] is the
//! TOML-backed provider.
//!
//! ```toml
//! [hostile.grunt]
//! max_health = 60.0
//! run_speed = 4.5
//!
//! [hostile.grunt.attack]
//! damage = 8.0
//! range = 1.8
//!
//! [elite.brute]
//! max_health = 400.0
//!
//! [elite.brute.rage]
//! health_threshold = 0.3
//!
//! [ally.rifleman.attack]
//! delivery = "hitscan"
//! fire_mode = "burst"
//!
//! [squad]
//! formation = "wedge"
//! radius = 3.0
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use void_ai::PerceptionConfig;
use void_combat::{AttackProfile, Delivery, FireMode};

use crate::squad::FormationType;

/// Errors from loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid {field}: {reason}")]
    Invalid { field: String, reason: String },

    #[error("unknown profile: {0}")]
    UnknownProfile(String),
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field: field.into(),
        reason: reason.into(),
    }
}

fn positive(field: &str, value: f32) -> Result<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(invalid(field, format!("must be positive, got {value}")))
    }
}

fn non_negative(field: &str, value: f32) -> Result<()> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(invalid(field, format!("must not be negative, got {value}")))
    }
}

fn fraction(field: &str, value: f32) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(field, format!("must be within [0, 1], got {value}")))
    }
}

/// Stat block shared by every agent family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentStats {
    pub max_health: f32,
    /// Patrol / return speed
    pub walk_speed: f32,
    /// Chase speed
    pub run_speed: f32,
    /// Degrees per second
    pub turn_speed: f32,
    pub hit_radius: f32,
    /// Aim point height above the feet
    pub body_height: f32,
    pub perception: PerceptionConfig,
    pub attack: AttackProfile,
    /// Largest vertical gap an attack may span
    pub attack_height_tolerance: f32,
    /// Attack -> Chase once the target is this many attack ranges away
    pub attack_hysteresis: f32,
    /// Give up when this far from spawn
    pub max_chase_distance: f32,
    /// Give up after the target stays unseen this long
    pub lose_target_time: f32,
    pub patrol_wait_time: f32,
    /// Pick patrol waypoints at random instead of in order
    pub random_patrol: bool,
    pub stunnable: bool,
    pub hit_stun_duration: f32,
    pub jump_duration: f32,
    pub jump_height: f32,
    /// Seconds between chase re-paths toward a moving target
    pub repath_interval: f32,
}

impl Default for AgentStats {
    fn default() -> Self {
        Self {
            max_health: 100.0,
            walk_speed: 2.0,
            run_speed: 4.0,
            turn_speed: 360.0,
            hit_radius: 0.5,
            body_height: 1.0,
            perception: PerceptionConfig::default(),
            attack: AttackProfile::default(),
            attack_height_tolerance: 1.5,
            attack_hysteresis: 1.2,
            max_chase_distance: 30.0,
            lose_target_time: 5.0,
            patrol_wait_time: 2.0,
            random_patrol: false,
            stunnable: true,
            hit_stun_duration: 0.3,
            jump_duration: 0.8,
            jump_height: 2.0,
            repath_interval: 0.25,
        }
    }
}

impl AgentStats {
    pub fn validate(&self) -> Result<()> {
        positive("max_health", self.max_health)?;
        positive("walk_speed", self.walk_speed)?;
        positive("run_speed", self.run_speed)?;
        positive("turn_speed", self.turn_speed)?;
        positive("hit_radius", self.hit_radius)?;
        positive("perception.detection_range", self.perception.detection_range)?;
        positive("perception.field_of_view", self.perception.field_of_view)?;
        non_negative("perception.awareness_radius", self.perception.awareness_radius)?;
        non_negative("perception.interval", self.perception.interval)?;
        validate_attack(&self.attack)?;
        non_negative("attack_height_tolerance", self.attack_height_tolerance)?;
        if self.attack_hysteresis < 1.0 {
            return Err(invalid("attack_hysteresis", "must be at least 1.0"));
        }
        positive("max_chase_distance", self.max_chase_distance)?;
        non_negative("lose_target_time", self.lose_target_time)?;
        non_negative("patrol_wait_time", self.patrol_wait_time)?;
        non_negative("hit_stun_duration", self.hit_stun_duration)?;
        positive("jump_duration", self.jump_duration)?;
        non_negative("jump_height", self.jump_height)?;
        non_negative("repath_interval", self.repath_interval)
    }
}

fn validate_attack(attack: &AttackProfile) -> Result<()> {
    non_negative("attack.damage", attack.damage)?;
    positive("attack.range", attack.range)?;
    non_negative("attack.cooldown", attack.cooldown)?;
    non_negative("attack.base_spread", attack.base_spread)?;
    non_negative("attack.spread_increment", attack.spread_increment)?;
    non_negative("attack.spread_recovery", attack.spread_recovery)?;
    if attack.max_spread < attack.base_spread {
        return Err(invalid(
            "attack.max_spread",
            format!("{} is below base_spread {}", attack.max_spread, attack.base_spread),
        ));
    }
    fraction("attack.aim_accuracy", attack.aim_accuracy)?;
    positive("attack.melee_angle", attack.melee_angle)?;
    if attack.is_ranged() {
        positive("attack.fire_interval", attack.fire_interval)?;
        if attack.fire_mode == FireMode::Burst && attack.burst_count == 0 {
            return Err(invalid("attack.burst_count", "must be at least 1"));
        }
    }
    if attack.delivery == Delivery::Projectile {
        positive("attack.projectile_speed", attack.projectile_speed)?;
        positive("attack.projectile_lifetime", attack.projectile_lifetime)?;
    }
    Ok(())
}

/// One-time announcement on first detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub enabled: bool,
    pub duration: f32,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            duration: 1.0,
        }
    }
}

/// Windup then a straight rush
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChargeConfig {
    pub enabled: bool,
    /// Distance band in which a charge may be rolled
    pub min_distance: f32,
    pub max_distance: f32,
    /// Chance per decision roll
    pub chance: f32,
    pub cooldown: f32,
    pub windup: f32,
    pub speed: f32,
    /// Longest rush before it ends on its own
    pub max_duration: f32,
    pub damage: f32,
    pub knockback: f32,
    /// Distance at which the rush connects
    pub contact_radius: f32,
}

impl Default for ChargeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_distance: 5.0,
            max_distance: 12.0,
            chance: 0.4,
            cooldown: 6.0,
            windup: 0.6,
            speed: 14.0,
            max_duration: 1.0,
            damage: 25.0,
            knockback: 3.0,
            contact_radius: 1.2,
        }
    }
}

/// Telegraphed area attack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StompConfig {
    pub enabled: bool,
    /// Rolled only when the target is at least this close
    pub trigger_distance: f32,
    pub chance: f32,
    pub cooldown: f32,
    /// Warning time before the impact
    pub windup: f32,
    /// Pause after the impact
    pub recovery: f32,
    pub radius: f32,
    pub damage: f32,
    pub knockback: f32,
}

impl Default for StompConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            trigger_distance: 3.5,
            chance: 0.6,
            cooldown: 5.0,
            windup: 1.0,
            recovery: 0.5,
            radius: 4.0,
            damage: 30.0,
            knockback: 2.5,
        }
    }
}

/// Low-health frenzy followed by a healing pause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RageConfig {
    pub enabled: bool,
    /// Health fraction below which rage triggers (once)
    pub health_threshold: f32,
    /// Length of the rage roar
    pub duration: f32,
    pub damage_multiplier: f32,
    pub speed_multiplier: f32,
    /// How long the multipliers last
    pub boost_duration: f32,
    pub recover_duration: f32,
    /// Fraction of max health restored by Recover
    pub heal_fraction: f32,
}

impl Default for RageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            health_threshold: 0.3,
            duration: 1.5,
            damage_multiplier: 1.5,
            speed_multiplier: 1.3,
            boost_duration: 12.0,
            recover_duration: 2.0,
            heal_fraction: 0.15,
        }
    }
}

/// Stat block of an elite hostile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EliteStats {
    #[serde(flatten)]
    pub base: AgentStats,
    pub alert: AlertConfig,
    pub charge: ChargeConfig,
    pub stomp: StompConfig,
    pub rage: RageConfig,
    /// Seconds between charge / stomp rolls
    pub decision_interval: f32,
}

impl Default for EliteStats {
    fn default() -> Self {
        Self {
            base: AgentStats {
                max_health: 400.0,
                run_speed: 3.5,
                hit_stun_duration: 0.2,
                attack: AttackProfile::melee(20.0, 2.5, 1.5),
                ..AgentStats::default()
            },
            alert: AlertConfig::default(),
            charge: ChargeConfig::default(),
            stomp: StompConfig::default(),
            rage: RageConfig::default(),
            decision_interval: 0.5,
        }
    }
}

impl EliteStats {
    pub fn validate(&self) -> Result<()> {
        self.base.validate()?;
        non_negative("alert.duration", self.alert.duration)?;

        let charge = &self.charge;
        fraction("charge.chance", charge.chance)?;
        if charge.max_distance < charge.min_distance {
            return Err(invalid("charge.max_distance", "is below min_distance"));
        }
        positive("charge.speed", charge.speed)?;
        positive("charge.max_duration", charge.max_duration)?;
        non_negative("charge.cooldown", charge.cooldown)?;
        non_negative("charge.windup", charge.windup)?;
        positive("charge.contact_radius", charge.contact_radius)?;

        let stomp = &self.stomp;
        fraction("stomp.chance", stomp.chance)?;
        positive("stomp.radius", stomp.radius)?;
        non_negative("stomp.windup", stomp.windup)?;
        non_negative("stomp.recovery", stomp.recovery)?;
        non_negative("stomp.cooldown", stomp.cooldown)?;

        let rage = &self.rage;
        fraction("rage.health_threshold", rage.health_threshold)?;
        fraction("rage.heal_fraction", rage.heal_fraction)?;
        positive("rage.damage_multiplier", rage.damage_multiplier)?;
        positive("rage.speed_multiplier", rage.speed_multiplier)?;
        non_negative("rage.duration", rage.duration)?;
        non_negative("rage.recover_duration", rage.recover_duration)?;

        positive("decision_interval", self.decision_interval)
    }
}

/// Stat block of a squad member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllyStats {
    #[serde(flatten)]
    pub base: AgentStats,
    pub follow_speed: f32,
    pub regroup_speed: f32,
    /// Hard ceiling on distance from the squad anchor
    pub leash_distance: f32,
    /// Fraction of the leash at which combat is abandoned
    pub combat_leash_fraction: f32,
    /// Distance at which a formation slot counts as reached
    pub formation_tolerance: f32,
}

impl Default for AllyStats {
    fn default() -> Self {
        Self {
            base: AgentStats {
                run_speed: 5.0,
                stunnable: false,
                attack: AttackProfile::ranged(6.0, 18.0, FireMode::Burst),
                ..AgentStats::default()
            },
            follow_speed: 4.5,
            regroup_speed: 7.0,
            leash_distance: 20.0,
            combat_leash_fraction: 0.8,
            formation_tolerance: 0.75,
        }
    }
}

impl AllyStats {
    pub fn validate(&self) -> Result<()> {
        self.base.validate()?;
        positive("follow_speed", self.follow_speed)?;
        positive("regroup_speed", self.regroup_speed)?;
        positive("leash_distance", self.leash_distance)?;
        fraction("combat_leash_fraction", self.combat_leash_fraction)?;
        positive("formation_tolerance", self.formation_tolerance)
    }
}

/// Formation parameters of a squad
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SquadConfig {
    pub formation: FormationType,
    pub radius: f32,
    pub spacing: f32,
}

impl Default for SquadConfig {
    fn default() -> Self {
        Self {
            formation: FormationType::Ring,
            radius: 3.0,
            spacing: 2.0,
        }
    }
}

impl SquadConfig {
    pub fn validate(&self) -> Result<()> {
        positive("squad.radius", self.radius)?;
        positive("squad.spacing", self.spacing)
    }
}

/// Source of immutable stat blocks, queried by profile name
pub trait StatProvider {
    fn hostile_stats(&self, profile: &str) -> Result<AgentStats>;

    fn elite_stats(&self, profile: &str) -> Result<EliteStats>;

    fn ally_stats(&self, profile: &str) -> Result<AllyStats>;

    fn squad_config(&self) -> SquadConfig;
}

/// Named stat blocks loaded from TOML
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentCatalog {
    pub hostile: BTreeMap<String, AgentStats>,
    pub elite: BTreeMap<String, EliteStats>,
    pub ally: BTreeMap<String, AllyStats>,
    pub squad: SquadConfig,
}

impl AgentCatalog {
    /// Parse and validate a catalog
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let catalog: Self = toml::from_str(content)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Load and validate a catalog file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Validate every profile, naming the offending one on failure
    pub fn validate(&self) -> Result<()> {
        fn scoped<T>(kind: &str, name: &str, result: Result<T>) -> Result<T> {
            result.map_err(|err| match err {
                ConfigError::Invalid { field, reason } => ConfigError::Invalid {
                    field: format!("{kind}.{name}.{field}"),
                    reason,
                },
                other => other,
            })
        }

        for (name, stats) in &self.hostile {
            scoped("hostile", name, stats.validate())?;
        }
        for (name, stats) in &self.elite {
            scoped("elite", name, stats.validate())?;
        }
        for (name, stats) in &self.ally {
            scoped("ally", name, stats.validate())?;
        }
        self.squad.validate()
    }

    /// Catalog used when no file is given
    pub fn builtin() -> Self {
        let mut catalog = Self::default();

        catalog.hostile.insert(
            "grunt".into(),
            AgentStats {
                max_health: 60.0,
                run_speed: 4.5,
                attack: AttackProfile::melee(8.0, 1.8, 1.0),
                ..AgentStats::default()
            },
        );
        catalog.hostile.insert(
            "gunner".into(),
            AgentStats {
                max_health: 50.0,
                attack: AttackProfile::ranged(4.0, 14.0, FireMode::FullAuto)
                    .with_fire_interval(0.15)
                    .with_spread(1.5, 0.75, 5.0, 9.0),
                ..AgentStats::default()
            },
        );
        catalog.elite.insert("brute".into(), EliteStats::default());
        catalog.ally.insert("rifleman".into(), AllyStats::default());
        catalog
    }

    fn lookup<T: Clone>(map: &BTreeMap<String, T>, kind: &str, profile: &str) -> Result<T> {
        map.get(profile)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownProfile(format!("{kind}.{profile}")))
    }
}

impl StatProvider for AgentCatalog {
    fn hostile_stats(&self, profile: &str) -> Result<AgentStats> {
        Self::lookup(&self.hostile, "hostile", profile)
    }

    fn elite_stats(&self, profile: &str) -> Result<EliteStats> {
        Self::lookup(&self.elite, "elite", profile)
    }

    fn ally_stats(&self, profile: &str) -> Result<AllyStats> {
        Self::lookup(&self.ally, "ally", profile)
    }

    fn squad_config(&self) -> SquadConfig {
        self.squad.clone()
    }
}
