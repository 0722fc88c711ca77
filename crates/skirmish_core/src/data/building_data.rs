//! Building types and their stat blocks.

use serde::{Deserialize, Serialize};

use super::{Cost, UnitKind};

/// Placeable building type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildingKind {
    /// Resource drop-off; trains peasants.
    TownHall,
    /// Trains footmen and archers.
    Barracks,
    /// Raises the pop cap.
    Farm,
}

/// Stat block for a building type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildingStats {
    /// Hit points once complete.
    pub max_hp: u32,
    /// Placement price.
    pub cost: Cost,
    /// Footprint width in tiles.
    pub width: u32,
    /// Footprint height in tiles.
    pub height: u32,
    /// Ticks of builder work to complete.
    pub build_ticks: u32,
    /// Vision radius in tiles, measured from the footprint center.
    pub sight: u32,
    /// Units this building can train.
    pub produces: &'static [UnitKind],
}

const TOWN_HALL: BuildingStats = BuildingStats {
    max_hp: 1200,
    cost: Cost::new(400, 200),
    width: 3,
    height: 3,
    build_ticks: 600,
    sight: 8,
    produces: &[UnitKind::Peasant],
};

const BARRACKS: BuildingStats = BuildingStats {
    max_hp: 800,
    cost: Cost::new(160, 60),
    width: 3,
    height: 3,
    build_ticks: 400,
    sight: 6,
    produces: &[UnitKind::Footman, UnitKind::Archer],
};

const FARM: BuildingStats = BuildingStats {
    max_hp: 400,
    cost: Cost::new(80, 20),
    width: 2,
    height: 2,
    build_ticks: 200,
    sight: 4,
    produces: &[],
};

impl BuildingKind {
    /// All building kinds.
    pub const ALL: [Self; 3] = [Self::TownHall, Self::Barracks, Self::Farm];

    /// Stat block for this kind.
    #[must_use]
    pub const fn stats(self) -> &'static BuildingStats {
        match self {
            Self::TownHall => &TOWN_HALL,
            Self::Barracks => &BARRACKS,
            Self::Farm => &FARM,
        }
    }

    /// Whether this building trains `unit`.
    #[must_use]
    pub fn can_produce(self, unit: UnitKind) -> bool {
        self.stats().produces.contains(&unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_table() {
        assert!(BuildingKind::TownHall.can_produce(UnitKind::Peasant));
        assert!(!BuildingKind::TownHall.can_produce(UnitKind::Footman));
        assert!(BuildingKind::Barracks.can_produce(UnitKind::Footman));
        assert!(BuildingKind::Barracks.can_produce(UnitKind::Archer));
        assert!(!BuildingKind::Farm.can_produce(UnitKind::Peasant));
    }

    #[test]
    fn test_footprints() {
        assert_eq!(BuildingKind::TownHall.stats().width, 3);
        assert_eq!(BuildingKind::Farm.stats().height, 2);
    }
}
