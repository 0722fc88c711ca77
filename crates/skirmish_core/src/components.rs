//! Entity definitions: units, buildings and players.
//!
//! These are pure data with small helpers. The state machines that drive
//! them live in [`crate::units`] and [`crate::buildings`].

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::arena::ArenaKey;
use crate::data::{BuildingKind, BuildingStats, Cost, ResourceKind, UnitKind, UnitStats};
use crate::math::{Coord, Rect};

/// Player identifier (index into the player list).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u8);

impl PlayerId {
    /// Index into the player list.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Stable id of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(pub ArenaKey);

/// Stable id of a building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildingId(pub ArenaKey);

macro_rules! arena_id {
    ($id:ty) => {
        impl From<ArenaKey> for $id {
            fn from(key: ArenaKey) -> Self {
                Self(key)
            }
        }

        impl From<$id> for ArenaKey {
            fn from(id: $id) -> Self {
                id.0
            }
        }

        impl From<u64> for $id {
            fn from(raw: u64) -> Self {
                Self(ArenaKey::from(raw))
            }
        }

        impl std::fmt::Display for $id {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                std::fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

arena_id!(UnitId);
arena_id!(BuildingId);

/// Reference to either kind of entity, used for attack targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum EntityId {
    /// A unit.
    Unit(UnitId),
    /// A building.
    Building(BuildingId),
}

impl From<UnitId> for EntityId {
    fn from(id: UnitId) -> Self {
        Self::Unit(id)
    }
}

impl From<BuildingId> for EntityId {
    fn from(id: BuildingId) -> Self {
        Self::Building(id)
    }
}

/// What a unit is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitState {
    /// No orders.
    #[default]
    Idle,
    /// Following a path, either to a destination or toward an attack target.
    Moving,
    /// In range of its target and swinging.
    Attacking,
    /// Walking to or harvesting a resource node.
    Gathering,
    /// Carrying cargo back to a town hall.
    Returning,
    /// Walking to or working on a construction site.
    Building,
}

/// A live unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Unit {
    /// Owning player.
    pub owner: PlayerId,
    /// Unit type.
    pub kind: UnitKind,
    /// Current tile.
    pub position: Coord,
    /// Hit points; the unit is removed at the end of the tick it reaches 0.
    pub hp: u32,
    /// State machine state.
    pub state: UnitState,
    /// Remaining waypoints, excluding the current tile.
    pub path: VecDeque<Coord>,
    /// Accumulated movement in hundredths of a tile.
    pub move_progress: u32,
    /// Unit or building being attacked.
    pub attack_target: Option<EntityId>,
    /// Ticks spent in range since the last hit.
    pub attack_timer: u32,
    /// Resource tile being harvested.
    pub gather_target: Option<Coord>,
    /// Ticks spent harvesting since the last extraction.
    pub gather_ticks: u32,
    /// Construction site being worked on.
    pub build_target: Option<BuildingId>,
    /// Cargo amount.
    pub carry_amount: u32,
    /// Cargo type, if carrying anything.
    pub carry_kind: Option<ResourceKind>,
}

impl Unit {
    /// Create a new idle unit at full health.
    #[must_use]
    pub fn new(owner: PlayerId, kind: UnitKind, position: Coord) -> Self {
        Self {
            owner,
            kind,
            position,
            hp: kind.stats().max_hp,
            state: UnitState::Idle,
            path: VecDeque::new(),
            move_progress: 0,
            attack_target: None,
            attack_timer: 0,
            gather_target: None,
            gather_ticks: 0,
            build_target: None,
            carry_amount: 0,
            carry_kind: None,
        }
    }

    /// Stat block for this unit's type.
    #[must_use]
    pub const fn stats(&self) -> &'static UnitStats {
        self.kind.stats()
    }

    /// Whether the unit still has hit points.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.hp > 0
    }

    /// Apply damage, saturating at zero.
    pub fn take_damage(&mut self, amount: u32) {
        self.hp = self.hp.saturating_sub(amount);
    }

    /// Replace the path with `waypoints`, dropping the current tile if the
    /// path starts on it.
    pub fn set_path(&mut self, waypoints: Vec<Coord>) {
        self.path = waypoints.into();
        if self.path.front() == Some(&self.position) {
            self.path.pop_front();
        }
        self.move_progress = 0;
    }

    /// Drop the current path.
    pub fn clear_path(&mut self) {
        self.path.clear();
        self.move_progress = 0;
    }

    /// Drop every order and go idle. Cargo is kept.
    pub fn go_idle(&mut self) {
        self.state = UnitState::Idle;
        self.clear_path();
        self.attack_target = None;
        self.attack_timer = 0;
        self.gather_target = None;
        self.gather_ticks = 0;
        self.build_target = None;
    }
}

/// A placed building, complete or under construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Building {
    /// Owning player.
    pub owner: PlayerId,
    /// Building type.
    pub kind: BuildingKind,
    /// Top-left tile of the footprint.
    pub origin: Coord,
    /// Hit points.
    pub hp: u32,
    /// Whether construction has finished.
    pub complete: bool,
    /// Builder-ticks of work done.
    pub build_progress: u32,
    /// Pending units, head first.
    pub queue: VecDeque<UnitKind>,
    /// Ticks spent on the queue head.
    pub production_progress: u32,
    /// Where trained units appear.
    pub rally_point: Coord,
}

impl Building {
    /// Create a construction site at 1 hp.
    #[must_use]
    pub fn new_site(owner: PlayerId, kind: BuildingKind, origin: Coord) -> Self {
        Self {
            owner,
            kind,
            origin,
            hp: 1,
            complete: false,
            build_progress: 0,
            queue: VecDeque::new(),
            production_progress: 0,
            rally_point: default_rally_point(kind, origin),
        }
    }

    /// Create a fully built building at max hp.
    #[must_use]
    pub fn new_complete(owner: PlayerId, kind: BuildingKind, origin: Coord) -> Self {
        let stats = kind.stats();
        Self {
            hp: stats.max_hp,
            complete: true,
            build_progress: stats.build_ticks,
            ..Self::new_site(owner, kind, origin)
        }
    }

    /// Stat block for this building's type.
    #[must_use]
    pub const fn stats(&self) -> &'static BuildingStats {
        self.kind.stats()
    }

    /// Tiles covered by this building.
    #[must_use]
    pub const fn footprint(&self) -> Rect {
        footprint(self.kind, self.origin)
    }

    /// Whether the building still has hit points.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.hp > 0
    }

    /// Apply damage, saturating at zero.
    pub fn take_damage(&mut self, amount: u32) {
        self.hp = self.hp.saturating_sub(amount);
    }

    /// Add one builder-tick of work.
    ///
    /// Hit points track progress as `floor(progress / build_ticks * max_hp)`
    /// and reach max exactly on completion. Returns `true` if construction
    /// just completed.
    pub fn advance_construction(&mut self) -> bool {
        if self.complete {
            return false;
        }

        let stats = self.stats();
        self.build_progress += 1;

        if self.build_progress >= stats.build_ticks {
            self.build_progress = stats.build_ticks;
            self.complete = true;
            self.hp = stats.max_hp;
            return true;
        }

        let hp = u64::from(self.build_progress) * u64::from(stats.max_hp)
            / u64::from(stats.build_ticks);
        self.hp = (hp as u32).max(1);
        false
    }
}

/// Footprint of a `kind` building placed at `origin`.
#[must_use]
pub const fn footprint(kind: BuildingKind, origin: Coord) -> Rect {
    let stats = kind.stats();
    Rect::new(origin, stats.width, stats.height)
}

/// Tile just below the footprint's horizontal center.
fn default_rally_point(kind: BuildingKind, origin: Coord) -> Coord {
    let stats = kind.stats();
    origin.offset(stats.width as i32 / 2, stats.height as i32)
}

/// A player's stockpile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Player {
    /// Player id.
    pub id: PlayerId,
    /// Gold on hand.
    pub gold: u32,
    /// Wood on hand.
    pub wood: u32,
}

impl Player {
    /// Create a player with a starting stockpile.
    #[must_use]
    pub const fn new(id: PlayerId, gold: u32, wood: u32) -> Self {
        Self { id, gold, wood }
    }

    /// Check if the player can pay `cost`.
    #[must_use]
    pub const fn can_afford(&self, cost: Cost) -> bool {
        self.gold >= cost.gold && self.wood >= cost.wood
    }

    /// Pay `cost` if affordable. Returns true if the transaction succeeded.
    pub fn spend(&mut self, cost: Cost) -> bool {
        if self.can_afford(cost) {
            self.gold -= cost.gold;
            self.wood -= cost.wood;
            true
        } else {
            false
        }
    }

    /// Add `amount` to the counter matching `kind`.
    pub fn deposit(&mut self, kind: ResourceKind, amount: u32) {
        match kind {
            ResourceKind::Gold => self.gold += amount,
            ResourceKind::Wood => self.wood += amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction_hp_tracks_progress() {
        let mut farm = Building::new_site(PlayerId(0), BuildingKind::Farm, Coord::new(0, 0));
        assert_eq!(farm.hp, 1);

        let stats = BuildingKind::Farm.stats();
        let mut last_hp = farm.hp;
        for _ in 1..stats.build_ticks {
            assert!(!farm.advance_construction());
            assert!(farm.hp > last_hp);
            assert_eq!(
                farm.hp,
                farm.build_progress * stats.max_hp / stats.build_ticks
            );
            last_hp = farm.hp;
        }

        assert!(farm.advance_construction());
        assert!(farm.complete);
        assert_eq!(farm.build_progress, stats.build_ticks);
        assert_eq!(farm.hp, stats.max_hp);
        assert!(!farm.advance_construction());
    }

    #[test]
    fn test_town_hall_created_complete() {
        let hall = Building::new_complete(PlayerId(1), BuildingKind::TownHall, Coord::new(4, 4));
        assert!(hall.complete);
        assert_eq!(hall.hp, 1200);
        assert_eq!(hall.rally_point, Coord::new(5, 7));
        assert!(hall.footprint().contains(Coord::new(6, 6)));
    }

    #[test]
    fn test_player_spend_is_all_or_nothing() {
        let mut player = Player::new(PlayerId(0), 100, 10);
        assert!(!player.spend(Cost::new(80, 20)));
        assert_eq!((player.gold, player.wood), (100, 10));
        assert!(player.spend(Cost::new(80, 10)));
        assert_eq!((player.gold, player.wood), (20, 0));
    }

    #[test]
    fn test_unit_set_path_skips_current_tile() {
        let mut unit = Unit::new(PlayerId(0), UnitKind::Peasant, Coord::new(1, 1));
        unit.set_path(vec![Coord::new(1, 1), Coord::new(2, 1), Coord::new(3, 1)]);
        assert_eq!(unit.path.len(), 2);
        assert_eq!(unit.path.front(), Some(&Coord::new(2, 1)));
    }

    #[test]
    fn test_entity_id_wire_format() {
        let id = EntityId::Unit(UnitId::from(5u64));
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, r#"{"kind":"unit","id":5}"#);
        let back: EntityId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
