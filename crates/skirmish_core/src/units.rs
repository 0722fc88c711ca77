//! Per-tick unit state machines: movement, gathering and combat.
//!
//! Each phase walks units in slot order and mutates the world in place.
//! Nothing here returns errors: a vanished target, a drained node or a
//! destroyed town hall simply demotes the unit to [`UnitState::Idle`].

use serde::{Deserialize, Serialize};

use crate::components::{BuildingId, EntityId, PlayerId, Unit, UnitId, UnitState};
use crate::data::{
    ResourceKind, UnitKind, CARRY_CAPACITY, DEPOSIT_RANGE, GATHER_RATE, GATHER_TICKS,
};
use crate::math::Coord;
use crate::pathfinding::{find_path, DEFAULT_MAX_STEPS};
use crate::world::{is_blocked, WorldState};

/// Movement progress needed to advance one tile, in hundredths.
pub const PROGRESS_PER_TILE: u32 = 100;

/// Compute a walking route from `from` toward `to`.
///
/// The returned path starts at `from`. A final tile that is itself blocked
/// (a resource or a footprint tile) is dropped so the unit stops next to it.
/// Returns an empty vector when no progress is possible.
#[must_use]
pub fn route(world: &WorldState, from: Coord, to: Coord) -> Vec<Coord> {
    let Some(mut path) = find_path(&world.tiles, &world.buildings, from, to, DEFAULT_MAX_STEPS)
    else {
        return Vec::new();
    };

    if path.len() > 1 && path.last().is_some_and(|&end| world.is_blocked(end)) {
        path.pop();
    }
    path
}

/// Emitted when a returning peasant drops off its cargo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deposit {
    /// The peasant.
    pub unit: UnitId,
    /// The player credited.
    pub player: PlayerId,
    /// Resource deposited.
    pub kind: ResourceKind,
    /// Amount deposited.
    pub amount: u32,
}

/// Emitted when an attack lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hit {
    /// The attacking unit.
    pub attacker: UnitId,
    /// What was hit.
    pub target: EntityId,
    /// Damage dealt.
    pub damage: u32,
    /// Target hit points after the hit.
    pub remaining_hp: u32,
}

// ============================================================================
// Movement
// ============================================================================

/// Advance every unit with a path.
///
/// Each tick adds `speed_tenths` hundredths of a tile, so a unit with speed
/// 2.5 tiles/s covers 0.25 tiles per tick. Whole tiles are consumed from the
/// path as progress crosses [`PROGRESS_PER_TILE`]. A waypoint that became
/// blocked ends the path; a plain move order then goes idle.
pub fn advance_movement(world: &mut WorldState) {
    let WorldState {
        tiles,
        buildings,
        units,
        ..
    } = world;

    for (id, unit) in units.iter_mut() {
        if unit.path.is_empty() {
            finish_move(unit);
            continue;
        }

        unit.move_progress += unit.stats().speed_tenths;

        while unit.move_progress >= PROGRESS_PER_TILE {
            let Some(&next) = unit.path.front() else {
                break;
            };

            if is_blocked(tiles, buildings, next) {
                tracing::debug!(unit = %id, waypoint = %next, "path blocked, abandoning");
                unit.clear_path();
                if unit.state == UnitState::Moving {
                    unit.state = UnitState::Idle;
                }
                break;
            }

            unit.position = next;
            unit.path.pop_front();
            unit.move_progress -= PROGRESS_PER_TILE;
        }

        if unit.path.is_empty() {
            finish_move(unit);
        }
    }
}

/// A plain move order that ran out of path is done.
fn finish_move(unit: &mut Unit) {
    unit.move_progress = 0;
    if unit.state == UnitState::Moving && unit.attack_target.is_none() {
        unit.state = UnitState::Idle;
    }
}

// ============================================================================
// Gathering
// ============================================================================

/// Advance gathering and returning peasants.
pub fn advance_gathering(world: &mut WorldState) -> Vec<Deposit> {
    let mut deposits = Vec::new();

    for id in world.units.ids() {
        let Some(state) = world.units.get(id).map(|u| u.state) else {
            continue;
        };

        match state {
            UnitState::Gathering => gather_step(world, id),
            UnitState::Returning => {
                if let Some(deposit) = return_step(world, id) {
                    deposits.push(deposit);
                }
            }
            _ => {}
        }
    }

    deposits
}

fn gather_step(world: &mut WorldState, id: UnitId) {
    let Some(unit) = world.units.get(id) else {
        return;
    };
    if unit.kind != UnitKind::Peasant {
        if let Some(unit) = world.units.get_mut(id) {
            unit.go_idle();
        }
        return;
    }

    let position = unit.position;
    let carried = unit.carry_amount;
    let Some(target) = unit.gather_target else {
        if let Some(unit) = world.units.get_mut(id) {
            unit.go_idle();
        }
        return;
    };

    let node = world
        .resources
        .get(target)
        .copied()
        .filter(|node| !node.is_depleted());

    let Some(node) = node else {
        // Node gone: bring home what we have, otherwise stop.
        if carried > 0 {
            start_return(world, id);
        } else if let Some(unit) = world.units.get_mut(id) {
            unit.go_idle();
        }
        return;
    };

    if position.chebyshev(target) > 1 {
        let needs_path = unit.path.is_empty();
        if needs_path {
            let path = route(world, position, target);
            let Some(unit) = world.units.get_mut(id) else {
                return;
            };
            if path.len() > 1 {
                unit.set_path(path);
            } else {
                tracing::debug!(unit = %id, %target, "resource unreachable");
                unit.go_idle();
            }
        }
        return;
    }

    let Some(unit) = world.units.get_mut(id) else {
        return;
    };

    unit.clear_path();

    if unit.carry_kind.is_some_and(|kind| kind != node.kind) {
        unit.carry_amount = 0;
        unit.carry_kind = None;
    }

    unit.gather_ticks += 1;
    if unit.gather_ticks < GATHER_TICKS {
        return;
    }
    unit.gather_ticks = 0;

    let room = CARRY_CAPACITY - unit.carry_amount;
    let extracted = world
        .resources
        .get_mut(target)
        .map_or(0, |node| node.extract(GATHER_RATE.min(room)));

    unit.carry_amount += extracted;
    unit.carry_kind = Some(node.kind);

    let full = unit.carry_amount >= CARRY_CAPACITY;
    let exhausted = world
        .resources
        .get(target)
        .map_or(true, |node| node.is_depleted());

    if full || exhausted {
        start_return(world, id);
    }
}

/// Head for the nearest town hall with the current cargo.
fn start_return(world: &mut WorldState, id: UnitId) {
    let Some(unit) = world.units.get(id) else {
        return;
    };
    let (owner, position) = (unit.owner, unit.position);

    let Some(hall) = world.nearest_town_hall(owner, position) else {
        if let Some(unit) = world.units.get_mut(id) {
            unit.go_idle();
        }
        return;
    };

    let path = hall_route(world, hall, position);
    if let Some(unit) = world.units.get_mut(id) {
        unit.state = UnitState::Returning;
        unit.gather_ticks = 0;
        unit.set_path(path);
    }
}

fn hall_route(world: &WorldState, hall: BuildingId, from: Coord) -> Vec<Coord> {
    world
        .buildings
        .get(hall)
        .map(|b| route(world, from, b.footprint().clamp(from)))
        .unwrap_or_default()
}

fn return_step(world: &mut WorldState, id: UnitId) -> Option<Deposit> {
    let unit = world.units.get(id)?;
    let (owner, position) = (unit.owner, unit.position);

    let Some(hall) = world.nearest_town_hall(owner, position) else {
        world.units.get_mut(id)?.go_idle();
        return None;
    };
    let footprint = world.buildings.get(hall)?.footprint();

    if footprint.chebyshev_to(position) > DEPOSIT_RANGE {
        if unit.path.is_empty() {
            let path = hall_route(world, hall, position);
            let unit = world.units.get_mut(id)?;
            if path.len() > 1 {
                unit.set_path(path);
            } else {
                unit.go_idle();
            }
        }
        return None;
    }

    let unit = world.units.get_mut(id)?;
    let amount = std::mem::take(&mut unit.carry_amount);
    let kind = unit.carry_kind.take();
    let resume = unit.gather_target;
    unit.clear_path();

    let deposit = kind.filter(|_| amount > 0).map(|kind| Deposit {
        unit: id,
        player: owner,
        kind,
        amount,
    });

    if let Some(deposit) = deposit {
        if let Some(player) = world.player_mut(owner) {
            player.deposit(deposit.kind, deposit.amount);
        }
        tracing::trace!(unit = %id, kind = ?deposit.kind, amount, "cargo deposited");
    }

    let node_remains = resume
        .and_then(|c| world.resources.get(c))
        .is_some_and(|node| !node.is_depleted());

    match resume {
        Some(target) if node_remains => {
            let path = route(world, position, target);
            let unit = world.units.get_mut(id)?;
            unit.state = UnitState::Gathering;
            unit.gather_ticks = 0;
            unit.set_path(path);
        }
        _ => world.units.get_mut(id)?.go_idle(),
    }

    deposit
}

// ============================================================================
// Combat
// ============================================================================

/// Where `attacker` should aim at `target`: the unit's tile, or the nearest
/// footprint tile of a building. `None` if the target is gone or dead.
fn aim_point(world: &WorldState, target: EntityId, attacker: Coord) -> Option<Coord> {
    match target {
        EntityId::Unit(id) => world
            .units
            .get(id)
            .filter(|u| u.is_alive())
            .map(|u| u.position),
        EntityId::Building(id) => world
            .buildings
            .get(id)
            .filter(|b| b.is_alive())
            .map(|b| b.footprint().clamp(attacker)),
    }
}

/// Resolve combat for every unit holding an attack target.
///
/// In range, the attack timer counts up and damage lands when it reaches the
/// unit's cooldown, so the first hit comes `attack_cooldown` ticks after the
/// unit arrives. Out of range, the unit paths toward the target.
pub fn resolve_combat(world: &mut WorldState) -> Vec<Hit> {
    let mut hits = Vec::new();

    for id in world.units.ids() {
        let Some(unit) = world.units.get(id) else {
            continue;
        };
        let Some(target) = unit.attack_target else {
            continue;
        };
        if !unit.is_alive()
            || matches!(
                unit.state,
                UnitState::Gathering | UnitState::Building | UnitState::Returning
            )
        {
            continue;
        }

        let stats = unit.stats();
        let position = unit.position;

        let Some(aim) = aim_point(world, target, position) else {
            if let Some(unit) = world.units.get_mut(id) {
                unit.go_idle();
            }
            continue;
        };

        if position.chebyshev(aim) > stats.range {
            let path_reaches = unit
                .path
                .back()
                .is_some_and(|end| end.chebyshev(aim) <= stats.range);
            let path = if path_reaches {
                None
            } else {
                Some(route(world, position, aim))
            };

            let Some(unit) = world.units.get_mut(id) else {
                continue;
            };
            match path {
                Some(path) if path.len() <= 1 => {
                    tracing::debug!(unit = %id, target = ?target, "target unreachable");
                    unit.go_idle();
                }
                path => {
                    unit.state = UnitState::Moving;
                    unit.attack_timer = 0;
                    if let Some(path) = path {
                        unit.set_path(path);
                    }
                }
            }
            continue;
        }

        let Some(unit) = world.units.get_mut(id) else {
            continue;
        };
        unit.clear_path();
        unit.state = UnitState::Attacking;
        unit.attack_timer += 1;
        if unit.attack_timer < stats.attack_cooldown {
            continue;
        }
        unit.attack_timer = 0;

        let remaining_hp = match target {
            EntityId::Unit(target_id) => world.units.get_mut(target_id).map(|t| {
                t.take_damage(stats.damage);
                t.hp
            }),
            EntityId::Building(target_id) => world.buildings.get_mut(target_id).map(|t| {
                t.take_damage(stats.damage);
                t.hp
            }),
        };

        let Some(remaining_hp) = remaining_hp else {
            continue;
        };

        hits.push(Hit {
            attacker: id,
            target,
            damage: stats.damage,
            remaining_hp,
        });

        if remaining_hp == 0 {
            tracing::debug!(attacker = %id, target = ?target, "target destroyed");
            if let Some(unit) = world.units.get_mut(id) {
                unit.go_idle();
            }
        }
    }

    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::PlayerId;
    use crate::data::{BuildingKind, ResourceKind};
    use crate::map::{ResourceField, ResourceNode, Tile, TileGrid};

    fn world() -> WorldState {
        WorldState::new(TileGrid::new(30, 30), ResourceField::new(), 2)
    }

    fn c(x: i32, y: i32) -> Coord {
        Coord::new(x, y)
    }

    #[test]
    fn test_route_trims_blocked_destination() {
        let mut world = world();
        world.tiles.set(c(8, 2), Tile::Tree);
        let path = route(&world, c(2, 2), c(8, 2));
        assert_eq!(path.last(), Some(&c(7, 2)));
    }

    #[test]
    fn test_peasant_moves_quarter_tile_per_tick() {
        let mut world = world();
        let id = world.spawn_unit(PlayerId(0), UnitKind::Peasant, c(0, 0));
        let path = route(&world, c(0, 0), c(5, 0));
        let unit = world.units.get_mut(id).unwrap();
        unit.state = UnitState::Moving;
        unit.set_path(path);

        for _ in 0..3 {
            advance_movement(&mut world);
        }
        assert_eq!(world.units.get(id).unwrap().position, c(0, 0));

        advance_movement(&mut world);
        assert_eq!(world.units.get(id).unwrap().position, c(1, 0));

        for _ in 0..16 {
            advance_movement(&mut world);
        }
        let unit = world.units.get(id).unwrap();
        assert_eq!(unit.position, c(5, 0));
        assert_eq!(unit.state, UnitState::Idle);
    }

    #[test]
    fn test_blocked_waypoint_abandons_path() {
        let mut world = world();
        let id = world.spawn_unit(PlayerId(0), UnitKind::Footman, c(0, 5));
        let path = route(&world, c(0, 5), c(10, 5));
        let unit = world.units.get_mut(id).unwrap();
        unit.state = UnitState::Moving;
        unit.set_path(path);

        world.place_building(PlayerId(1), BuildingKind::Farm, c(1, 4), false);

        for _ in 0..10 {
            advance_movement(&mut world);
        }
        let unit = world.units.get(id).unwrap();
        assert_eq!(unit.position, c(0, 5));
        assert_eq!(unit.state, UnitState::Idle);
        assert!(unit.path.is_empty());
    }

    #[test]
    fn test_gather_and_return_deposits_carried_amount() {
        let mut world = world();
        world.place_building(PlayerId(0), BuildingKind::TownHall, c(10, 10), true);
        world.tiles.set(c(15, 11), Tile::GoldMine);
        world
            .resources
            .insert(c(15, 11), ResourceNode::new(ResourceKind::Gold, 800));

        let id = world.spawn_unit(PlayerId(0), UnitKind::Peasant, c(14, 11));
        let unit = world.units.get_mut(id).unwrap();
        unit.state = UnitState::Gathering;
        unit.gather_target = Some(c(15, 11));

        let gold_before = world.players[0].gold;

        for tick in 1..=25 {
            assert!(advance_gathering(&mut world).is_empty());
            let carried = world.units.get(id).unwrap().carry_amount;
            assert_eq!(carried, (tick / GATHER_TICKS) * GATHER_RATE);
        }

        let unit = world.units.get(id).unwrap();
        assert_eq!(unit.state, UnitState::Returning);
        assert_eq!(world.resources.get(c(15, 11)).unwrap().amount, 790);

        // (14, 11) is already within deposit range of the hall.
        let deposits = advance_gathering(&mut world);
        assert_eq!(deposits.len(), 1);
        assert_eq!(deposits[0].amount, 10);
        assert_eq!(world.players[0].gold, gold_before + 10);

        let unit = world.units.get(id).unwrap();
        assert_eq!(unit.state, UnitState::Gathering);
        assert_eq!(unit.carry_amount, 0);
    }

    #[test]
    fn test_gathering_without_node_goes_idle() {
        let mut world = world();
        let id = world.spawn_unit(PlayerId(0), UnitKind::Peasant, c(4, 4));
        let unit = world.units.get_mut(id).unwrap();
        unit.state = UnitState::Gathering;
        unit.gather_target = Some(c(5, 4));

        advance_gathering(&mut world);
        assert_eq!(world.units.get(id).unwrap().state, UnitState::Idle);
    }

    #[test]
    fn test_returning_without_town_hall_goes_idle() {
        let mut world = world();
        let id = world.spawn_unit(PlayerId(0), UnitKind::Peasant, c(4, 4));
        let unit = world.units.get_mut(id).unwrap();
        unit.state = UnitState::Returning;
        unit.carry_amount = 6;
        unit.carry_kind = Some(ResourceKind::Wood);

        advance_gathering(&mut world);
        let unit = world.units.get(id).unwrap();
        assert_eq!(unit.state, UnitState::Idle);
        assert_eq!(unit.carry_amount, 6);
    }

    #[test]
    fn test_footman_hits_after_full_cooldown() {
        let mut world = world();
        let attacker = world.spawn_unit(PlayerId(0), UnitKind::Footman, c(5, 5));
        let target = world.spawn_unit(PlayerId(1), UnitKind::Footman, c(6, 5));
        world.units.get_mut(attacker).unwrap().attack_target = Some(target.into());

        for _ in 0..9 {
            assert!(resolve_combat(&mut world).is_empty());
            assert_eq!(world.units.get(target).unwrap().hp, 60);
        }

        let hits = resolve_combat(&mut world);
        assert_eq!(hits.len(), 1);
        assert_eq!(world.units.get(target).unwrap().hp, 52);
        assert_eq!(
            world.units.get(attacker).unwrap().state,
            UnitState::Attacking
        );
    }

    #[test]
    fn test_out_of_range_attacker_chases() {
        let mut world = world();
        let attacker = world.spawn_unit(PlayerId(0), UnitKind::Footman, c(2, 2));
        let target = world.spawn_unit(PlayerId(1), UnitKind::Peasant, c(9, 2));
        world.units.get_mut(attacker).unwrap().attack_target = Some(target.into());

        resolve_combat(&mut world);
        let unit = world.units.get(attacker).unwrap();
        assert_eq!(unit.state, UnitState::Moving);
        assert!(!unit.path.is_empty());
    }

    #[test]
    fn test_archer_attacks_building_from_range() {
        let mut world = world();
        let farm = world.place_building(PlayerId(1), BuildingKind::Farm, c(10, 10), true);
        let archer = world.spawn_unit(PlayerId(0), UnitKind::Archer, c(15, 11));
        world.units.get_mut(archer).unwrap().attack_target = Some(farm.into());

        let stats = UnitKind::Archer.stats();
        for _ in 0..stats.attack_cooldown {
            resolve_combat(&mut world);
        }
        assert_eq!(
            world.buildings.get(farm).unwrap().hp,
            BuildingKind::Farm.stats().max_hp - stats.damage
        );
        assert_eq!(world.units.get(archer).unwrap().position, c(15, 11));
    }

    #[test]
    fn test_dead_target_clears_attacker() {
        let mut world = world();
        let attacker = world.spawn_unit(PlayerId(0), UnitKind::Footman, c(5, 5));
        let target = world.spawn_unit(PlayerId(1), UnitKind::Peasant, c(5, 6));
        world.units.get_mut(attacker).unwrap().attack_target = Some(target.into());
        world.units.get_mut(target).unwrap().hp = 0;

        resolve_combat(&mut world);
        let unit = world.units.get(attacker).unwrap();
        assert_eq!(unit.state, UnitState::Idle);
        assert_eq!(unit.attack_target, None);
    }

    #[test]
    fn test_unreachable_target_drops_attacker_to_idle() {
        let mut world = world();
        for dy in -1..=1 {
            for dx in -1..=1 {
                if dx != 0 || dy != 0 {
                    world.tiles.set(c(1 + dx, 1 + dy), Tile::Rock);
                }
            }
        }
        let attacker = world.spawn_unit(PlayerId(0), UnitKind::Footman, c(1, 1));
        let target = world.spawn_unit(PlayerId(1), UnitKind::Footman, c(20, 20));
        world.units.get_mut(attacker).unwrap().attack_target = Some(target.into());

        resolve_combat(&mut world);
        advance_movement(&mut world);

        let unit = world.units.get(attacker).unwrap();
        assert_eq!(unit.state, UnitState::Idle);
        assert_eq!(unit.attack_target, None);
        assert!(unit.path.is_empty());
        assert_eq!(unit.position, c(1, 1));
    }
}
