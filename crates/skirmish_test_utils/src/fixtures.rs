//! Test fixtures and helpers.
//!
//! Hand-built worlds with known layouts, for tests that need exact
//! positions rather than a generated map.

use skirmish_core::ai::{AiController, Difficulty};
use skirmish_core::commands::Command;
use skirmish_core::components::{BuildingId, EntityId, PlayerId, UnitId};
use skirmish_core::config::MatchConfig;
use skirmish_core::data::{BuildingKind, ResourceKind, UnitKind};
use skirmish_core::map::{ResourceField, ResourceNode, Tile, TileGrid};
use skirmish_core::math::Coord;
use skirmish_core::simulation::Simulation;
use skirmish_core::world::WorldState;

/// First player in every fixture.
pub const BLUE: PlayerId = PlayerId(0);

/// Second player in every fixture.
pub const RED: PlayerId = PlayerId(1);

/// Town hall origin for [`BLUE`] in [`duel_world`].
pub const BLUE_HALL: Coord = Coord::new(2, 2);

/// Town hall origin for [`RED`] in [`duel_world`].
pub const RED_HALL: Coord = Coord::new(35, 35);

/// An all-grass two-player world with no entities.
#[must_use]
pub fn open_world(width: u32, height: u32) -> WorldState {
    WorldState::new(TileGrid::new(width, height), ResourceField::new(), 2)
}

/// A 40x40 world with a complete town hall in opposite corners.
#[must_use]
pub fn duel_world() -> WorldState {
    let mut world = open_world(40, 40);
    world.place_building(BLUE, BuildingKind::TownHall, BLUE_HALL, true);
    world.place_building(RED, BuildingKind::TownHall, RED_HALL, true);
    world
}

/// The town hall owned by `player`, if any.
#[must_use]
pub fn town_hall(world: &WorldState, player: PlayerId) -> Option<BuildingId> {
    world
        .buildings_of(player)
        .find(|(_, b)| b.kind == BuildingKind::TownHall)
        .map(|(id, _)| id)
}

/// Place a resource node and the matching tile.
pub fn add_resource(world: &mut WorldState, at: Coord, kind: ResourceKind, amount: u32) {
    let tile = match kind {
        ResourceKind::Gold => Tile::GoldMine,
        ResourceKind::Wood => Tile::Tree,
    };
    world.tiles.set(at, tile);
    world.resources.insert(at, ResourceNode::new(kind, amount));
}

/// Fill a vertical run of tiles with rock.
pub fn rock_wall(world: &mut WorldState, x: i32, ys: std::ops::Range<i32>) {
    for y in ys {
        world.tiles.set(Coord::new(x, y), Tile::Rock);
    }
}

/// A duel world with one blue peasant next to the hall and a gold mine
/// holding 800 a few tiles away.
#[must_use]
pub fn gather_scenario() -> (WorldState, UnitId, Coord) {
    let mut world = duel_world();
    let mine = Coord::new(9, 3);
    add_resource(&mut world, mine, ResourceKind::Gold, 800);
    let peasant = world.spawn_unit(BLUE, UnitKind::Peasant, Coord::new(6, 3));
    (world, peasant, mine)
}

/// Two squads of footmen and archers ordered to attack each other.
#[must_use]
pub fn battle_scenario() -> Simulation {
    let mut world = duel_world();
    let blue = spawn_squad(&mut world, BLUE, 15, 13);
    let red = spawn_squad(&mut world, RED, 22, 24);

    let mut sim = Simulation::from_world(world);
    sim.submit(
        BLUE,
        Command::Attack {
            unit_ids: blue.clone(),
            target_id: EntityId::Unit(red[0]),
        },
    );
    sim.submit(
        RED,
        Command::Attack {
            unit_ids: red,
            target_id: EntityId::Unit(blue[0]),
        },
    );
    sim
}

/// Four footmen in column `front` and two archers in column `back`.
fn spawn_squad(world: &mut WorldState, owner: PlayerId, front: i32, back: i32) -> Vec<UnitId> {
    let mut squad: Vec<UnitId> = (0..4)
        .map(|i| world.spawn_unit(owner, UnitKind::Footman, Coord::new(front, 15 + i)))
        .collect();
    squad.extend((0..2).map(|i| world.spawn_unit(owner, UnitKind::Archer, Coord::new(back, 16 + i))));
    squad
}

/// A duel world where both players are computer controlled.
#[must_use]
pub fn ai_duel(seed: u64) -> Simulation {
    let mut sim = Simulation::from_world(duel_world());
    sim.add_ai(AiController::new(BLUE, Difficulty::Hard.profile(), seed));
    sim.add_ai(AiController::new(RED, Difficulty::Medium.profile(), seed));
    sim
}

/// A generated AI-vs-AI match.
///
/// # Panics
///
/// Panics if the default map cannot be generated for `seed`.
#[must_use]
pub fn generated_match(seed: u64) -> Simulation {
    let config = MatchConfig::ai_vs_ai(Difficulty::Hard, Difficulty::Hard).with_seed(seed);
    Simulation::new(&config).expect("default match config generates")
}
