//! Unit types and their stat blocks.

use serde::{Deserialize, Serialize};

use super::Cost;

/// Trainable unit type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitKind {
    /// Worker: gathers, builds, fights badly.
    Peasant,
    /// Melee infantry.
    Footman,
    /// Ranged infantry.
    Archer,
}

/// Stat block for a unit type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitStats {
    /// Maximum and starting hit points.
    pub max_hp: u32,
    /// Damage per attack.
    pub damage: u32,
    /// Attack reach in tiles (Chebyshev).
    pub range: u32,
    /// Speed in tenths of a tile per second. One tick adds this many
    /// hundredths of a tile to movement progress.
    pub speed_tenths: u32,
    /// Ticks between attacks.
    pub attack_cooldown: u32,
    /// Training price.
    pub cost: Cost,
    /// Ticks to train.
    pub train_ticks: u32,
    /// Vision radius in tiles.
    pub sight: u32,
}

const PEASANT: UnitStats = UnitStats {
    max_hp: 30,
    damage: 3,
    range: 1,
    speed_tenths: 25,
    attack_cooldown: 10,
    cost: Cost::new(50, 0),
    train_ticks: 120,
    sight: 5,
};

const FOOTMAN: UnitStats = UnitStats {
    max_hp: 60,
    damage: 8,
    range: 1,
    speed_tenths: 20,
    attack_cooldown: 10,
    cost: Cost::new(100, 0),
    train_ticks: 180,
    sight: 5,
};

const ARCHER: UnitStats = UnitStats {
    max_hp: 40,
    damage: 6,
    range: 4,
    speed_tenths: 22,
    attack_cooldown: 15,
    cost: Cost::new(80, 20),
    train_ticks: 200,
    sight: 7,
};

impl UnitKind {
    /// All unit kinds.
    pub const ALL: [Self; 3] = [Self::Peasant, Self::Footman, Self::Archer];

    /// Stat block for this kind.
    #[must_use]
    pub const fn stats(self) -> &'static UnitStats {
        match self {
            Self::Peasant => &PEASANT,
            Self::Footman => &FOOTMAN,
            Self::Archer => &ARCHER,
        }
    }

    /// Whether this is a combat unit (counts against the AI's military cap).
    #[must_use]
    pub const fn is_military(self) -> bool {
        matches!(self, Self::Footman | Self::Archer)
    }
}
