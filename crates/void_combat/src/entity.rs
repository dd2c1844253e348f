//! Entity identity and allegiance

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a combat entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Side an entity fights for. The player counts as `Ally`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Faction {
    #[default]
    Hostile,
    Ally,
}

impl Faction {
    pub fn is_hostile_to(self, other: Faction) -> bool {
        self != other
    }

    pub fn opponent(self) -> Faction {
        match self {
            Faction::Hostile => Faction::Ally,
            Faction::Ally => Faction::Hostile,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_faction_hostility() {
        assert!(Faction::Hostile.is_hostile_to(Faction::Ally));
        assert!(!Faction::Ally.is_hostile_to(Faction::Ally));
        assert_eq!(Faction::Ally.opponent(), Faction::Hostile);
    }
}
