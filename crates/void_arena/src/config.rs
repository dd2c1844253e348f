//! Arena Configuration
//!
//! One TOML file describes the level layout, who spawns where, and (flattened
//! into the same file) the stat catalog the agents are initialized from.
//!
//! # Example Config File
//!
//! ```toml
//! [arena]
//! width = 60.0
//! depth = 60.0
//! tick_rate = 30.0
//! duration = 45.0
//! player = [30.0, 0.0, 12.0]
//! player_route = [[30.0, 0.0, 12.0], [30.0, 0.0, 30.0]]
//!
//! [[walls]]
//! center = [26.0, 0.0, 34.0]
//! width = 4.0
//! depth = 1.0
//!
//! [[spawns]]
//! kind = "hostile"
//! profile = "grunt"
//! position = [20.0, 0.0, 44.0]
//!
//! [[allies]]
//! profile = "rifleman"
//! position = [28.0, 0.0, 9.0]
//!
//! [hostile.grunt]
//! max_health = 60.0
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use void_agents::{AgentCatalog, ConfigError};

/// Errors from loading or validating an arena
#[derive(Debug, Error)]
pub enum ArenaError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{what} at {position:?} is off the nav mesh")]
    OffMesh { what: String, position: [f32; 3] },

    #[error("invalid arena: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ArenaError>;

/// Level layout and run length
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaSettings {
    pub width: f32,
    pub depth: f32,
    pub cell_size: f32,
    /// Simulation ticks per second
    pub tick_rate: f32,
    /// Seconds to simulate
    pub duration: f32,
    pub player: [f32; 3],
    pub player_health: f32,
    pub player_speed: f32,
    /// Waypoints the player dummy walks, looping
    pub player_route: Vec<[f32; 3]>,
}

impl Default for ArenaSettings {
    fn default() -> Self {
        Self {
            width: 60.0,
            depth: 60.0,
            cell_size: 2.0,
            tick_rate: 30.0,
            duration: 45.0,
            player: [30.0, 0.0, 10.0],
            player_health: 400.0,
            player_speed: 1.5,
            player_route: Vec::new(),
        }
    }
}

/// Solid box; blocks sight and carves the nav mesh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WallSpec {
    pub center: [f32; 3],
    pub width: f32,
    pub depth: f32,
    #[serde(default = "default_wall_height")]
    pub height: f32,
}

fn default_wall_height() -> f32 {
    3.0
}

/// Raised walkable layer, reached through links
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformSpec {
    /// Minimum corner
    pub origin: [f32; 3],
    pub width: f32,
    pub depth: f32,
}

/// Traversal link between two points on the mesh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkSpec {
    pub start: [f32; 3],
    pub end: [f32; 3],
    #[serde(default = "default_true")]
    pub bidirectional: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpawnKind {
    Hostile,
    Elite,
}

/// A hostile or elite spawn point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnSpec {
    pub kind: SpawnKind,
    pub profile: String,
    pub position: [f32; 3],
    #[serde(default)]
    pub patrol: Vec<[f32; 3]>,
}

/// A squad member spawn point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllySpec {
    pub profile: String,
    pub position: [f32; 3],
}

/// Complete arena description
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    pub arena: ArenaSettings,
    pub walls: Vec<WallSpec>,
    pub platforms: Vec<PlatformSpec>,
    pub links: Vec<LinkSpec>,
    pub spawns: Vec<SpawnSpec>,
    pub allies: Vec<AllySpec>,
    #[serde(flatten)]
    pub catalog: AgentCatalog,
}

impl ArenaConfig {
    /// Parse and validate an arena
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate an arena file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        let a = &self.arena;
        if a.width <= 0.0 || a.depth <= 0.0 || a.cell_size <= 0.0 {
            return Err(ArenaError::Invalid("arena size and cell size must be positive".into()));
        }
        if a.tick_rate <= 0.0 || a.duration < 0.0 {
            return Err(ArenaError::Invalid("tick_rate must be positive and duration not negative".into()));
        }
        self.catalog.validate()?;
        Ok(())
    }

    /// Seconds per tick
    pub fn tick_delta(&self) -> f32 {
        1.0 / self.arena.tick_rate
    }

    pub fn tick_count(&self) -> usize {
        (self.arena.duration * self.arena.tick_rate).round() as usize
    }

    /// Small skirmish used when no file is given
    pub fn builtin() -> Self {
        Self {
            arena: ArenaSettings {
                player_route: vec![[30.0, 0.0, 10.0], [30.0, 0.0, 26.0], [22.0, 0.0, 26.0]],
                ..ArenaSettings::default()
            },
            walls: vec![
                WallSpec {
                    center: [25.0, 0.0, 34.0],
                    width: 6.0,
                    depth: 1.0,
                    height: 3.0,
                },
                WallSpec {
                    center: [38.0, 0.0, 30.0],
                    width: 1.0,
                    depth: 6.0,
                    height: 3.0,
                },
            ],
            platforms: Vec::new(),
            links: Vec::new(),
            spawns: vec![
                SpawnSpec {
                    kind: SpawnKind::Hostile,
                    profile: "grunt".into(),
                    position: [20.0, 0.0, 44.0],
                    patrol: vec![[20.0, 0.0, 44.0], [40.0, 0.0, 44.0]],
                },
                SpawnSpec {
                    kind: SpawnKind::Hostile,
                    profile: "gunner".into(),
                    position: [44.0, 0.0, 38.0],
                    patrol: Vec::new(),
                },
                SpawnSpec {
                    kind: SpawnKind::Elite,
                    profile: "brute".into(),
                    position: [30.0, 0.0, 52.0],
                    patrol: Vec::new(),
                },
            ],
            allies: vec![
                AllySpec {
                    profile: "rifleman".into(),
                    position: [27.0, 0.0, 7.0],
                },
                AllySpec {
                    profile: "rifleman".into(),
                    position: [33.0, 0.0, 7.0],
                },
                AllySpec {
                    profile: "rifleman".into(),
                    position: [30.0, 0.0, 5.0],
                },
            ],
            catalog: AgentCatalog::builtin(),
        }
    }
}
