//! Building placement, construction and production.
//!
//! Construction is driven by peasants in [`UnitState::Building`]: every
//! builder within [`BUILD_RANGE`] of the footprint adds one tick of progress.
//! Production runs a FIFO queue per building and freezes while the owner is
//! at the population cap.

use serde::{Deserialize, Serialize};

use crate::components::{footprint, BuildingId, PlayerId, UnitId, UnitState};
use crate::data::{BuildingKind, UnitKind, BUILD_RANGE};
use crate::error::CommandError;
use crate::math::{Coord, Rect};
use crate::units::route;
use crate::world::WorldState;

// ============================================================================
// Construction
// ============================================================================

/// Events generated by the construction phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstructionEvent {
    /// A construction site received work this tick.
    Progress {
        /// The site.
        building: BuildingId,
        /// Builder-ticks done so far.
        progress: u32,
        /// Builder-ticks required.
        total: u32,
    },
    /// Construction has completed.
    Complete {
        /// The finished building.
        building: BuildingId,
        /// Its owner.
        owner: PlayerId,
        /// Its type.
        kind: BuildingKind,
    },
}

/// Advance construction for every peasant in the building state.
///
/// Builders out of range walk toward the footprint; builders whose site is
/// gone or already finished go idle.
pub fn advance_construction(world: &mut WorldState) -> Vec<ConstructionEvent> {
    let mut events = Vec::new();

    for id in world.units.ids() {
        let Some(unit) = world.units.get(id) else {
            continue;
        };
        if unit.state != UnitState::Building {
            continue;
        }

        let (owner, position) = (unit.owner, unit.position);
        let site = unit.build_target.and_then(|building_id| {
            world
                .buildings
                .get(building_id)
                .filter(|b| b.owner == owner && !b.complete && b.is_alive())
                .map(|b| (building_id, b.footprint()))
        });

        let Some((site_id, site_rect)) = site else {
            if let Some(unit) = world.units.get_mut(id) {
                unit.go_idle();
            }
            continue;
        };

        if site_rect.chebyshev_to(position) > BUILD_RANGE {
            if unit.path.is_empty() {
                walk_to_site(world, id, &site_rect);
            }
            continue;
        }

        if let Some(unit) = world.units.get_mut(id) {
            unit.clear_path();
        }

        let Some(building) = world.buildings.get_mut(site_id) else {
            continue;
        };

        if building.advance_construction() {
            tracing::info!(
                building = %site_id,
                owner = owner.0,
                kind = ?building.kind,
                "construction complete"
            );
            events.push(ConstructionEvent::Complete {
                building: site_id,
                owner,
                kind: building.kind,
            });
            if let Some(unit) = world.units.get_mut(id) {
                unit.go_idle();
            }
        } else {
            events.push(ConstructionEvent::Progress {
                building: site_id,
                progress: building.build_progress,
                total: building.stats().build_ticks,
            });
        }
    }

    events
}

fn walk_to_site(world: &mut WorldState, id: UnitId, site: &Rect) {
    let Some(position) = world.units.get(id).map(|u| u.position) else {
        return;
    };
    let path = route(world, position, site.clamp(position));
    let Some(unit) = world.units.get_mut(id) else {
        return;
    };
    if path.len() > 1 {
        unit.set_path(path);
    } else {
        tracing::debug!(unit = %id, "construction site unreachable");
        unit.go_idle();
    }
}

// ============================================================================
// Production
// ============================================================================

/// Events generated by the production phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionEvent {
    /// The producing building.
    pub building: BuildingId,
    /// The new unit.
    pub unit: UnitId,
    /// Its type.
    pub kind: UnitKind,
    /// Its owner.
    pub owner: PlayerId,
}

/// Advance every production queue by one tick.
///
/// A finished unit appears on the free tile nearest the rally point. If no
/// free tile exists the head stays finished and spawns on a later tick.
pub fn advance_production(world: &mut WorldState) -> Vec<ProductionEvent> {
    let mut events = Vec::new();

    for building_id in world.buildings.ids() {
        let Some(building) = world.buildings.get(building_id) else {
            continue;
        };
        if !building.complete || !building.is_alive() {
            continue;
        }
        let Some(&head) = building.queue.front() else {
            continue;
        };

        let owner = building.owner;
        if world.population(owner) >= world.pop_cap(owner) {
            continue;
        }

        let rally_point = building.rally_point;
        let Some(building) = world.buildings.get_mut(building_id) else {
            continue;
        };
        building.production_progress += 1;
        if building.production_progress < head.stats().train_ticks {
            continue;
        }

        let Some(spawn_at) = world.find_free_tile(rally_point) else {
            tracing::debug!(building = %building_id, "no free tile to spawn unit");
            continue;
        };

        if let Some(building) = world.buildings.get_mut(building_id) {
            building.queue.pop_front();
            building.production_progress = 0;
        }

        let unit = world.spawn_unit(owner, head, spawn_at);
        tracing::debug!(building = %building_id, unit = %unit, kind = ?head, "unit trained");
        events.push(ProductionEvent {
            building: building_id,
            unit,
            kind: head,
            owner,
        });
    }

    events
}

/// Queue `kind` at `building_id` for its owner.
///
/// Rejected without any state change if the building cannot train the type,
/// is still under construction, or the owner cannot pay. On success the
/// cost is deducted immediately.
pub fn queue_unit(
    world: &mut WorldState,
    building_id: BuildingId,
    kind: UnitKind,
) -> Result<(), CommandError> {
    let building = world
        .buildings
        .get(building_id)
        .ok_or(CommandError::BuildingNotFound)?;

    if !building.kind.can_produce(kind) {
        return Err(CommandError::CannotProduce {
            building: building.kind,
            unit: kind,
        });
    }
    if !building.complete {
        return Err(CommandError::BuildingIncomplete);
    }

    let owner = building.owner;
    let cost = kind.stats().cost;
    let player = world
        .player_mut(owner)
        .ok_or(CommandError::UnknownPlayer)?;
    if !player.spend(cost) {
        return Err(CommandError::InsufficientResources {
            gold: cost.gold,
            wood: cost.wood,
        });
    }

    if let Some(building) = world.buildings.get_mut(building_id) {
        building.queue.push_back(kind);
    }
    Ok(())
}

// ============================================================================
// Placement
// ============================================================================

/// Check whether `owner` may place a `kind` building at `origin`.
///
/// Returns the footprint on success.
pub fn check_placement(
    world: &WorldState,
    owner: PlayerId,
    kind: BuildingKind,
    origin: Coord,
) -> Result<Rect, CommandError> {
    let player = world.player(owner).ok_or(CommandError::UnknownPlayer)?;
    let cost = kind.stats().cost;
    if !player.can_afford(cost) {
        return Err(CommandError::InsufficientResources {
            gold: cost.gold,
            wood: cost.wood,
        });
    }

    let rect = footprint(kind, origin);
    if !world.footprint_is_clear(&rect) {
        return Err(CommandError::Unbuildable(kind));
    }
    Ok(rect)
}

/// Pay for and place a construction site.
///
/// Units standing on the new footprint are moved to the nearest free tile.
pub fn place_site(
    world: &mut WorldState,
    owner: PlayerId,
    kind: BuildingKind,
    origin: Coord,
) -> Result<BuildingId, CommandError> {
    let rect = check_placement(world, owner, kind, origin)?;

    let player = world
        .player_mut(owner)
        .ok_or(CommandError::UnknownPlayer)?;
    let cost = kind.stats().cost;
    if !player.spend(cost) {
        return Err(CommandError::InsufficientResources {
            gold: cost.gold,
            wood: cost.wood,
        });
    }

    let id = world.place_building(owner, kind, origin, false);
    evict_units(world, &rect);
    tracing::debug!(building = %id, owner = owner.0, ?kind, %origin, "construction site placed");
    Ok(id)
}

/// Push every unit inside `rect` to the nearest unblocked tile.
fn evict_units(world: &mut WorldState, rect: &Rect) {
    let trapped: Vec<UnitId> = world
        .units
        .iter()
        .filter(|(_, u)| rect.contains(u.position))
        .map(|(id, _)| id)
        .collect();

    for id in trapped {
        let Some(position) = world.units.get(id).map(|u| u.position) else {
            continue;
        };
        let free = world.find_free_tile(position);
        if let Some(unit) = world.units.get_mut(id) {
            if let Some(free) = free {
                unit.position = free;
            }
            unit.clear_path();
        }
    }
}
