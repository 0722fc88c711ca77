//! The authoritative match state.
//!
//! [`WorldState`] owns every tile, resource node, unit, building and player.
//! It has no per-tick behavior of its own; the simulators borrow it mutably
//! one phase at a time.

use crate::arena::Arena;
use crate::components::{Building, BuildingId, EntityId, Player, Unit, UnitId};
use crate::data::{
    BuildingKind, ResourceKind, UnitKind, POP_PER_FARM, STARTING_GOLD, STARTING_POP_CAP,
    STARTING_WOOD,
};
use crate::map::{ResourceField, TileGrid};
use crate::math::{Coord, Rect};

pub use crate::components::PlayerId;

/// Unit storage.
pub type Units = Arena<UnitId, Unit>;

/// Building storage.
pub type Buildings = Arena<BuildingId, Building>;

/// How far [`WorldState::find_free_tile`] searches before giving up.
const FREE_TILE_SEARCH_RADIUS: i32 = 12;

/// Everything that exists in a match.
#[derive(Debug, Clone)]
pub struct WorldState {
    /// Ticks completed so far.
    pub tick: u64,
    /// Terrain.
    pub tiles: TileGrid,
    /// Remaining resource nodes.
    pub resources: ResourceField,
    /// Live units.
    pub units: Units,
    /// Live buildings.
    pub buildings: Buildings,
    /// Players, indexed by [`PlayerId`].
    pub players: Vec<Player>,
}

impl WorldState {
    /// Create a world with `player_count` players holding the starting
    /// stockpile and no entities.
    #[must_use]
    pub fn new(tiles: TileGrid, resources: ResourceField, player_count: u8) -> Self {
        let players = (0..player_count)
            .map(|id| Player::new(PlayerId(id), STARTING_GOLD, STARTING_WOOD))
            .collect();

        Self {
            tick: 0,
            tiles,
            resources,
            units: Arena::new(),
            buildings: Arena::new(),
            players,
        }
    }

    /// Look up a player.
    #[must_use]
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(id.index())
    }

    /// Look up a player mutably.
    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(id.index())
    }

    /// Player ids in order.
    pub fn player_ids(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.players.iter().map(|p| p.id)
    }

    /// Whether a tile blocks movement: impassable terrain, out of bounds,
    /// or covered by a building footprint.
    #[must_use]
    pub fn is_blocked(&self, c: Coord) -> bool {
        is_blocked(&self.tiles, &self.buildings, c)
    }

    /// Whether a footprint is in bounds, all grass and clear of buildings.
    #[must_use]
    pub fn footprint_is_clear(&self, rect: &Rect) -> bool {
        rect.tiles().all(|c| self.tiles.is_walkable(c))
            && !self
                .buildings
                .values()
                .any(|b| b.footprint().intersects(rect))
    }

    /// Live unit count for `player`.
    #[must_use]
    pub fn population(&self, player: PlayerId) -> u32 {
        self.units
            .values()
            .filter(|u| u.owner == player && u.is_alive())
            .count() as u32
    }

    /// Population limit for `player`.
    #[must_use]
    pub fn pop_cap(&self, player: PlayerId) -> u32 {
        let farms = self
            .buildings
            .values()
            .filter(|b| b.owner == player && b.kind == BuildingKind::Farm && b.complete)
            .count() as u32;
        STARTING_POP_CAP + farms * POP_PER_FARM
    }

    /// Add a unit.
    pub fn spawn_unit(&mut self, owner: PlayerId, kind: UnitKind, position: Coord) -> UnitId {
        self.units.insert(Unit::new(owner, kind, position))
    }

    /// Add a building, either pre-built or as a construction site.
    pub fn place_building(
        &mut self,
        owner: PlayerId,
        kind: BuildingKind,
        origin: Coord,
        complete: bool,
    ) -> BuildingId {
        let building = if complete {
            Building::new_complete(owner, kind, origin)
        } else {
            Building::new_site(owner, kind, origin)
        };
        self.buildings.insert(building)
    }

    /// Owner of a unit or building, if it exists.
    #[must_use]
    pub fn owner_of(&self, id: EntityId) -> Option<PlayerId> {
        match id {
            EntityId::Unit(id) => self.units.get(id).map(|u| u.owner),
            EntityId::Building(id) => self.buildings.get(id).map(|b| b.owner),
        }
    }

    /// Hit points of a unit or building, if it exists.
    #[must_use]
    pub fn hp_of(&self, id: EntityId) -> Option<u32> {
        match id {
            EntityId::Unit(id) => self.units.get(id).map(|u| u.hp),
            EntityId::Building(id) => self.buildings.get(id).map(|b| b.hp),
        }
    }

    /// Nearest complete town hall owned by `owner`, measured to the footprint.
    #[must_use]
    pub fn nearest_town_hall(&self, owner: PlayerId, from: Coord) -> Option<BuildingId> {
        self.buildings
            .iter()
            .filter(|(_, b)| {
                b.owner == owner && b.kind == BuildingKind::TownHall && b.complete && b.is_alive()
            })
            .min_by_key(|(_, b)| from.distance_squared(b.footprint().clamp(from)))
            .map(|(id, _)| id)
    }

    /// Nearest resource node of `kind` to `from`.
    #[must_use]
    pub fn nearest_resource(&self, kind: ResourceKind, from: Coord) -> Option<Coord> {
        self.resources.nearest(kind, from)
    }

    /// Closest unblocked tile to `around`, searching outward in square rings.
    ///
    /// Used to spawn trained units and to push units off new footprints.
    #[must_use]
    pub fn find_free_tile(&self, around: Coord) -> Option<Coord> {
        if !self.is_blocked(around) {
            return Some(around);
        }

        for radius in 1..=FREE_TILE_SEARCH_RADIUS {
            let best = ring(around, radius)
                .filter(|c| !self.is_blocked(*c))
                .min_by_key(|c| (around.distance_squared(*c), *c));
            if best.is_some() {
                return best;
            }
        }
        None
    }

    /// Units owned by `owner`.
    pub fn units_of(&self, owner: PlayerId) -> impl Iterator<Item = (UnitId, &Unit)> {
        self.units.iter().filter(move |(_, u)| u.owner == owner)
    }

    /// Buildings owned by `owner`.
    pub fn buildings_of(&self, owner: PlayerId) -> impl Iterator<Item = (BuildingId, &Building)> {
        self.buildings.iter().filter(move |(_, b)| b.owner == owner)
    }
}

/// Blocked-tile test shared by the world and the pathfinder.
#[must_use]
pub fn is_blocked(tiles: &TileGrid, buildings: &Buildings, c: Coord) -> bool {
    !tiles.is_walkable(c) || buildings.values().any(|b| b.footprint().contains(c))
}

/// Tiles at exactly Chebyshev distance `radius` from `center`.
pub fn ring(center: Coord, radius: i32) -> impl Iterator<Item = Coord> {
    (-radius..=radius).flat_map(move |dy| {
        (-radius..=radius)
            .filter(move |dx| dx.abs() == radius || dy.abs() == radius)
            .map(move |dx| center.offset(dx, dy))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{ResourceNode, Tile};

    fn world() -> WorldState {
        WorldState::new(TileGrid::new(20, 20), ResourceField::new(), 2)
    }

    #[test]
    fn test_new_world_players() {
        let world = world();
        assert_eq!(world.players.len(), 2);
        assert_eq!(world.player(PlayerId(1)).unwrap().gold, STARTING_GOLD);
        assert!(world.player(PlayerId(2)).is_none());
    }

    #[test]
    fn test_buildings_block_tiles() {
        let mut world = world();
        world.place_building(PlayerId(0), BuildingKind::Farm, Coord::new(5, 5), false);
        assert!(world.is_blocked(Coord::new(6, 6)));
        assert!(!world.is_blocked(Coord::new(7, 6)));
        assert!(world.is_blocked(Coord::new(-1, 0)));
    }

    #[test]
    fn test_pop_cap_counts_completed_farms_only() {
        let mut world = world();
        let p = PlayerId(0);
        assert_eq!(world.pop_cap(p), STARTING_POP_CAP);
        world.place_building(p, BuildingKind::Farm, Coord::new(0, 0), false);
        assert_eq!(world.pop_cap(p), STARTING_POP_CAP);
        world.place_building(p, BuildingKind::Farm, Coord::new(3, 0), true);
        assert_eq!(world.pop_cap(p), STARTING_POP_CAP + POP_PER_FARM);
        assert_eq!(world.pop_cap(PlayerId(1)), STARTING_POP_CAP);
    }

    #[test]
    fn test_footprint_clear() {
        let mut world = world();
        world.tiles.set(Coord::new(10, 10), Tile::Rock);
        world.place_building(PlayerId(0), BuildingKind::Farm, Coord::new(2, 2), true);

        let farm = |x, y| crate::components::footprint(BuildingKind::Farm, Coord::new(x, y));
        assert!(world.footprint_is_clear(&farm(5, 5)));
        assert!(!world.footprint_is_clear(&farm(9, 9)));
        assert!(!world.footprint_is_clear(&farm(3, 3)));
        assert!(!world.footprint_is_clear(&farm(19, 5)));
    }

    #[test]
    fn test_find_free_tile_skips_footprint() {
        let mut world = world();
        world.place_building(PlayerId(0), BuildingKind::TownHall, Coord::new(5, 5), true);
        let free = world.find_free_tile(Coord::new(6, 6)).unwrap();
        assert!(!world.is_blocked(free));
        assert_eq!(Coord::new(6, 6).chebyshev(free), 2);
    }

    #[test]
    fn test_nearest_town_hall_ignores_sites_and_enemies() {
        let mut world = world();
        let own = world.place_building(PlayerId(0), BuildingKind::TownHall, Coord::new(15, 15), true);
        world.place_building(PlayerId(0), BuildingKind::TownHall, Coord::new(0, 0), false);
        world.place_building(PlayerId(1), BuildingKind::TownHall, Coord::new(4, 0), true);
        assert_eq!(world.nearest_town_hall(PlayerId(0), Coord::new(1, 5)), Some(own));
    }

    #[test]
    fn test_ring_size() {
        assert_eq!(ring(Coord::new(0, 0), 1).count(), 8);
        assert_eq!(ring(Coord::new(0, 0), 3).count(), 24);
    }

    #[test]
    fn test_nearest_resource_delegates() {
        let mut world = world();
        world
            .resources
            .insert(Coord::new(3, 3), ResourceNode::new(ResourceKind::Wood, 50));
        assert_eq!(
            world.nearest_resource(ResourceKind::Wood, Coord::new(0, 0)),
            Some(Coord::new(3, 3))
        );
        assert_eq!(world.nearest_resource(ResourceKind::Gold, Coord::new(0, 0)), None);
    }
}
