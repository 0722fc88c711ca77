//! Per-player filtered views of the world.
//!
//! A snapshot is what a client is allowed to know: the whole map, its own
//! entities, and enemy entities standing in revealed tiles. Enemy production
//! queues are never included.

use serde::{Deserialize, Serialize};

use crate::components::{Building, BuildingId, PlayerId, Unit, UnitId, UnitState};
use crate::data::{BuildingKind, ResourceKind, UnitKind};
use crate::map::Tile;
use crate::math::{Coord, Rect};
use crate::visibility::{building_visible, compute_visibility, unit_visible};
use crate::world::WorldState;

/// A resource node as seen by clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceView {
    /// Tile of the node.
    pub position: Coord,
    /// Resource type.
    pub kind: ResourceKind,
    /// Amount remaining.
    pub amount: u32,
}

/// A unit as seen by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitView {
    /// Unit id.
    pub id: UnitId,
    /// Unit type.
    pub kind: UnitKind,
    /// Owner.
    pub owner: PlayerId,
    /// Current tile.
    pub position: Coord,
    /// Hit points.
    pub hp: u32,
    /// Maximum hit points.
    pub max_hp: u32,
    /// State machine state.
    pub state: UnitState,
    /// Carried resource type, if any.
    pub carry_kind: Option<ResourceKind>,
    /// Carried amount.
    pub carry_amount: u32,
}

impl UnitView {
    fn new(id: UnitId, unit: &Unit) -> Self {
        Self {
            id,
            kind: unit.kind,
            owner: unit.owner,
            position: unit.position,
            hp: unit.hp,
            max_hp: unit.stats().max_hp,
            state: unit.state,
            carry_kind: unit.carry_kind,
            carry_amount: unit.carry_amount,
        }
    }
}

/// Production details, only sent to the owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductionView {
    /// Pending units, head first.
    pub queue: Vec<UnitKind>,
    /// Ticks spent on the head.
    pub progress: u32,
    /// Where trained units appear.
    pub rally_point: Coord,
}

/// A building as seen by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildingView {
    /// Building id.
    pub id: BuildingId,
    /// Building type.
    pub kind: BuildingKind,
    /// Owner.
    pub owner: PlayerId,
    /// Covered tiles.
    pub footprint: Rect,
    /// Hit points.
    pub hp: u32,
    /// Maximum hit points.
    pub max_hp: u32,
    /// Whether construction has finished.
    pub complete: bool,
    /// Builder-ticks done.
    pub build_progress: u32,
    /// Queue state, present only in the owner's snapshot.
    pub production: Option<ProductionView>,
}

impl BuildingView {
    fn new(id: BuildingId, building: &Building, viewer: PlayerId) -> Self {
        let production = (building.owner == viewer).then(|| ProductionView {
            queue: building.queue.iter().copied().collect(),
            progress: building.production_progress,
            rally_point: building.rally_point,
        });

        Self {
            id,
            kind: building.kind,
            owner: building.owner,
            footprint: building.footprint(),
            hp: building.hp,
            max_hp: building.stats().max_hp,
            complete: building.complete,
            build_progress: building.build_progress,
            production,
        }
    }
}

/// The requesting player's economy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    /// Player id.
    pub id: PlayerId,
    /// Gold on hand.
    pub gold: u32,
    /// Wood on hand.
    pub wood: u32,
    /// Live units.
    pub population: u32,
    /// Population limit.
    pub pop_cap: u32,
}

/// Everything one player is allowed to see after a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    /// Ticks completed.
    pub tick: u64,
    /// Map width in tiles.
    pub width: u32,
    /// Map height in tiles.
    pub height: u32,
    /// Terrain rows, top to bottom.
    pub tiles: Vec<Vec<Tile>>,
    /// Remaining resource nodes.
    pub resources: Vec<ResourceView>,
    /// Own units and revealed enemy units.
    pub units: Vec<UnitView>,
    /// Own buildings and revealed enemy buildings.
    pub buildings: Vec<BuildingView>,
    /// The requesting player's economy.
    pub player: PlayerView,
    /// Revealed flags, rows top to bottom.
    pub visibility: Vec<Vec<bool>>,
}

impl PlayerSnapshot {
    /// Build the snapshot for `viewer`. Returns `None` for an unknown player.
    #[must_use]
    pub fn capture(world: &WorldState, viewer: PlayerId) -> Option<Self> {
        let player = world.player(viewer)?;
        let grid = compute_visibility(world, viewer);

        let units = world
            .units
            .iter()
            .filter(|(_, u)| u.is_alive() && unit_visible(&grid, viewer, u))
            .map(|(id, u)| UnitView::new(id, u))
            .collect();

        let buildings = world
            .buildings
            .iter()
            .filter(|(_, b)| b.is_alive() && building_visible(&grid, viewer, b))
            .map(|(id, b)| BuildingView::new(id, b, viewer))
            .collect();

        let resources = world
            .resources
            .iter()
            .filter(|(_, node)| !node.is_depleted())
            .map(|(position, node)| ResourceView {
                position,
                kind: node.kind,
                amount: node.amount,
            })
            .collect();

        Some(Self {
            tick: world.tick,
            width: world.tiles.width(),
            height: world.tiles.height(),
            tiles: world.tiles.rows().map(<[Tile]>::to_vec).collect(),
            resources,
            units,
            buildings,
            player: PlayerView {
                id: viewer,
                gold: player.gold,
                wood: player.wood,
                population: world.population(viewer),
                pop_cap: world.pop_cap(viewer),
            },
            visibility: grid.rows().map(<[bool]>::to_vec).collect(),
        })
    }

    /// Look up a visible unit by id.
    #[must_use]
    pub fn unit(&self, id: UnitId) -> Option<&UnitView> {
        self.units.iter().find(|u| u.id == id)
    }

    /// Look up a visible building by id.
    #[must_use]
    pub fn building(&self, id: BuildingId) -> Option<&BuildingView> {
        self.buildings.iter().find(|b| b.id == id)
    }
}
