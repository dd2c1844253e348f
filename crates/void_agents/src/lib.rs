//! Void Agents - Agent Controllers
//!
//! Concrete agents built from the perception, navigation, state machine and
//! combat layers.
//!
//! # Features
//!
//! - Baseline hostile controller (patrol, chase, attack, hit stun, jump links)
//! - Elite hostile with alert, charge, stomp and a one-shot rage
//! - Squad-mate controller with formation following and command overrides
//! - Squad roster with ring, line, wedge and spread formations
//! - TOML stat catalog
//!
//! # Example
//!
//! ```ignore
//! use void_agents::prelude::*;
//!
//! let env = AgentEnvironment::new(pool.clone()).with_sight(walls.clone());
//! let mut grunt = HostileAgent::new(EntityId(10), Box::new(nav), env);
//! grunt.initialize(catalog.hostile_stats("grunt")?);
//! grunt.start();
//!
//! loop {
//!     grunt.tick(dt);
//! }
//! ```

pub mod ally;
pub mod config;
pub mod core;
pub mod elite;
pub mod hostile;
pub mod squad;

pub mod prelude {
    pub use crate::ally::{AllyAgent, AllyBrain, AllyState, Order};
    pub use crate::config::{
        AgentCatalog, AgentStats, AlertConfig, AllyStats, ChargeConfig, ConfigError, EliteStats, RageConfig,
        SquadConfig, StatProvider, StompConfig,
    };
    pub use crate::core::{AgentController, AgentCore, AgentEnvironment, DerivedStats, HealthSignals, Timer};
    pub use crate::elite::{EliteHostileAgent, EliteKit};
    pub use crate::hostile::{Extension, HostileAgent, HostileBrain, HostileState};
    pub use crate::squad::{formation_position, FormationType, SquadCommand, SquadCoordinator};
}

pub use prelude::*;
