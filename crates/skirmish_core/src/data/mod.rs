//! Static balance data for unit and building types.
//!
//! Every type carries a fixed stat block. The tables are plain data with no
//! behavior beyond lookups.

mod building_data;
mod unit_data;

use serde::{Deserialize, Serialize};

pub use building_data::{BuildingKind, BuildingStats};
pub use unit_data::{UnitKind, UnitStats};

/// Population cap before any farm is completed.
pub const STARTING_POP_CAP: u32 = 5;

/// Pop cap added by each completed farm.
pub const POP_PER_FARM: u32 = 4;

/// Resource extracted per gather action.
pub const GATHER_RATE: u32 = 2;

/// Ticks between gather actions.
pub const GATHER_TICKS: u32 = 5;

/// Maximum resource a peasant can carry.
pub const CARRY_CAPACITY: u32 = 10;

/// Chebyshev distance to a town hall footprint at which cargo is deposited.
pub const DEPOSIT_RANGE: u32 = 2;

/// Chebyshev distance to a footprint at which a peasant can build.
pub const BUILD_RANGE: u32 = 2;

/// Gold at match start.
pub const STARTING_GOLD: u32 = 400;

/// Wood at match start.
pub const STARTING_WOOD: u32 = 200;

/// Peasants spawned next to each starting town hall.
pub const STARTING_PEASANTS: u32 = 3;

/// Gold and wood price of a unit or building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Cost {
    /// Gold required.
    pub gold: u32,
    /// Wood required.
    pub wood: u32,
}

impl Cost {
    /// Create a new cost.
    #[must_use]
    pub const fn new(gold: u32, wood: u32) -> Self {
        Self { gold, wood }
    }
}

/// Kind of harvestable resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceKind {
    /// Mined from gold mines.
    Gold,
    /// Chopped from trees.
    Wood,
}

impl ResourceKind {
    /// The other resource kind.
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::Gold => Self::Wood,
            Self::Wood => Self::Gold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_kind_other() {
        assert_eq!(ResourceKind::Gold.other(), ResourceKind::Wood);
        assert_eq!(ResourceKind::Wood.other(), ResourceKind::Gold);
    }

    #[test]
    fn test_every_producer_trains_affordable_units() {
        for building in BuildingKind::ALL {
            for unit in building.stats().produces {
                assert!(building.can_produce(*unit));
                assert!(unit.stats().train_ticks > 0);
            }
        }
    }

    #[test]
    fn test_construction_hp_rises_every_tick() {
        // hp = floor(progress / build_ticks * max_hp) only strictly increases
        // when max_hp >= build_ticks.
        for building in BuildingKind::ALL {
            let stats = building.stats();
            assert!(stats.max_hp >= stats.build_ticks, "{building:?}");
        }
    }
}
