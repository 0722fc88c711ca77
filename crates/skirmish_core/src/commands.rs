//! Client commands and the router that validates and applies them.
//!
//! Commands come from untrusted and possibly stale clients. Every command is
//! validated before it touches the world; a rejected command (or the
//! rejected part of a multi-unit command) changes nothing and is only logged.
//!
//! The AI issues commands through the same path via [`CommandPort`], so it
//! never needs to know how they are applied.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::buildings::{place_site, queue_unit};
use crate::components::{BuildingId, EntityId, PlayerId, Unit, UnitId, UnitState};
use crate::data::{BuildingKind, UnitKind};
use crate::error::CommandError;
use crate::math::Coord;
use crate::units::route;
use crate::world::WorldState;

/// A command as delivered by the transport layer.
///
/// Serialized internally tagged by `type` with camelCase fields, e.g.
/// `{"type":"move","unitIds":[0],"x":4,"y":7}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Command {
    /// Walk units to a tile.
    #[serde(rename_all = "camelCase")]
    Move {
        /// Units to move.
        unit_ids: Vec<UnitId>,
        /// Destination x.
        x: i32,
        /// Destination y.
        y: i32,
    },
    /// Attack a unit or building.
    #[serde(rename_all = "camelCase")]
    Attack {
        /// Attacking units.
        unit_ids: Vec<UnitId>,
        /// Target entity.
        target_id: EntityId,
    },
    /// Harvest the resource node at a tile.
    #[serde(rename_all = "camelCase")]
    Gather {
        /// Peasants to send.
        unit_ids: Vec<UnitId>,
        /// Resource x.
        x: i32,
        /// Resource y.
        y: i32,
    },
    /// Place a construction site and assign a peasant to it.
    #[serde(rename_all = "camelCase")]
    Build {
        /// The builder.
        unit_id: UnitId,
        /// What to build.
        building_type: BuildingKind,
        /// Footprint origin x.
        x: i32,
        /// Footprint origin y.
        y: i32,
    },
    /// Queue a unit at a building.
    #[serde(rename_all = "camelCase")]
    TrainUnit {
        /// Producing building.
        building_id: BuildingId,
        /// Unit to train.
        unit_type: UnitKind,
    },
}

impl Command {
    /// Short name for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Move { .. } => "move",
            Self::Attack { .. } => "attack",
            Self::Gather { .. } => "gather",
            Self::Build { .. } => "build",
            Self::TrainUnit { .. } => "trainUnit",
        }
    }
}

/// Sink for commands. Implemented by the simulation's pending queue so the
/// AI can issue commands without depending on how they are applied.
pub trait CommandPort {
    /// Submit a command on behalf of `player`.
    fn submit(&mut self, player: PlayerId, command: Command);
}

/// Commands waiting for the next tick, in arrival order.
#[derive(Debug, Clone, Default)]
pub struct CommandQueue {
    pending: VecDeque<(PlayerId, Command)>,
}

impl CommandQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pending commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Check if no commands are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Pending commands, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &(PlayerId, Command)> {
        self.pending.iter()
    }

    /// Take every pending command, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = (PlayerId, Command)> + '_ {
        self.pending.drain(..)
    }
}

impl CommandPort for CommandQueue {
    fn submit(&mut self, player: PlayerId, command: Command) {
        self.pending.push_back((player, command));
    }
}

/// Apply a command for `player`. Returns whether anything changed.
pub fn apply(world: &mut WorldState, player: PlayerId, command: &Command) -> bool {
    match command {
        Command::Move { unit_ids, x, y } => {
            move_units(world, player, unit_ids, Coord::new(*x, *y))
        }
        Command::Attack {
            unit_ids,
            target_id,
        } => attack(world, player, unit_ids, *target_id),
        Command::Gather { unit_ids, x, y } => {
            gather(world, player, unit_ids, Coord::new(*x, *y))
        }
        Command::Build {
            unit_id,
            building_type,
            x,
            y,
        } => build(world, player, *unit_id, *building_type, Coord::new(*x, *y)),
        Command::TrainUnit {
            building_id,
            unit_type,
        } => train_unit(world, player, *building_id, *unit_type),
    }
}

fn owned_unit(world: &WorldState, player: PlayerId, id: UnitId) -> Result<&Unit, CommandError> {
    let unit = world
        .units
        .get(id)
        .filter(|u| u.is_alive())
        .ok_or(CommandError::UnitNotFound)?;
    if unit.owner != player {
        return Err(CommandError::NotOwner { owner: unit.owner });
    }
    Ok(unit)
}

fn reject(player: PlayerId, command: &'static str, err: CommandError) {
    tracing::debug!(player = player.0, command, %err, "command rejected");
}

/// Send units to `target`. Each owned live unit drops its current orders and
/// gets a fresh path.
pub fn move_units(
    world: &mut WorldState,
    player: PlayerId,
    unit_ids: &[UnitId],
    target: Coord,
) -> bool {
    let mut applied = false;

    for &id in unit_ids {
        let position = match owned_unit(world, player, id) {
            Ok(unit) => unit.position,
            Err(err) => {
                reject(player, "move", err);
                continue;
            }
        };

        let path = route(world, position, target);
        if let Some(unit) = world.units.get_mut(id) {
            unit.go_idle();
            unit.state = UnitState::Moving;
            unit.set_path(path);
            applied = true;
        }
    }

    applied
}

/// Order units to attack `target`, which must be a live enemy entity.
///
/// Movement toward the target is left to the combat phase.
pub fn attack(
    world: &mut WorldState,
    player: PlayerId,
    unit_ids: &[UnitId],
    target: EntityId,
) -> bool {
    match world.owner_of(target) {
        None => {
            reject(player, "attack", CommandError::TargetNotFound);
            return false;
        }
        Some(owner) if owner == player => {
            reject(player, "attack", CommandError::FriendlyTarget);
            return false;
        }
        Some(_) if world.hp_of(target) == Some(0) => {
            reject(player, "attack", CommandError::TargetNotFound);
            return false;
        }
        Some(_) => {}
    }

    let mut applied = false;
    for &id in unit_ids {
        if let Err(err) = owned_unit(world, player, id) {
            reject(player, "attack", err);
            continue;
        }
        if let Some(unit) = world.units.get_mut(id) {
            unit.go_idle();
            unit.attack_target = Some(target);
            applied = true;
        }
    }

    applied
}

/// Send peasants to harvest the node at `target`. Other unit kinds are
/// skipped.
pub fn gather(
    world: &mut WorldState,
    player: PlayerId,
    unit_ids: &[UnitId],
    target: Coord,
) -> bool {
    if world
        .resources
        .get(target)
        .map_or(true, |node| node.is_depleted())
    {
        reject(player, "gather", CommandError::NoResource);
        return false;
    }

    let mut applied = false;
    for &id in unit_ids {
        let position = match owned_unit(world, player, id) {
            Ok(unit) if unit.kind == UnitKind::Peasant => unit.position,
            Ok(unit) => {
                reject(player, "gather", CommandError::WrongUnitKind(unit.kind));
                continue;
            }
            Err(err) => {
                reject(player, "gather", err);
                continue;
            }
        };

        let path = route(world, position, target);
        if let Some(unit) = world.units.get_mut(id) {
            unit.go_idle();
            unit.state = UnitState::Gathering;
            unit.gather_target = Some(target);
            unit.gather_ticks = 0;
            unit.set_path(path);
            applied = true;
        }
    }

    applied
}

/// Place a `kind` site at `origin` and put the peasant `unit_id` to work on
/// it. Returns whether the site was placed.
pub fn build(
    world: &mut WorldState,
    player: PlayerId,
    unit_id: UnitId,
    kind: BuildingKind,
    origin: Coord,
) -> bool {
    match try_build(world, player, unit_id, kind, origin) {
        Ok(site) => {
            tracing::debug!(player = player.0, building = %site, ?kind, "build accepted");
            true
        }
        Err(err) => {
            reject(player, "build", err);
            false
        }
    }
}

fn try_build(
    world: &mut WorldState,
    player: PlayerId,
    unit_id: UnitId,
    kind: BuildingKind,
    origin: Coord,
) -> Result<BuildingId, CommandError> {
    let builder = owned_unit(world, player, unit_id)?;
    if builder.kind != UnitKind::Peasant {
        return Err(CommandError::WrongUnitKind(builder.kind));
    }

    let site = place_site(world, player, kind, origin)?;

    // The builder may have been pushed off the footprint.
    let Some(position) = world.units.get(unit_id).map(|u| u.position) else {
        return Ok(site);
    };
    let footprint = crate::components::footprint(kind, origin);
    let path = route(world, position, footprint.clamp(position));

    if let Some(unit) = world.units.get_mut(unit_id) {
        unit.go_idle();
        unit.state = UnitState::Building;
        unit.build_target = Some(site);
        unit.set_path(path);
    }
    Ok(site)
}

/// Queue `kind` at one of the player's buildings.
pub fn train_unit(
    world: &mut WorldState,
    player: PlayerId,
    building_id: BuildingId,
    kind: UnitKind,
) -> bool {
    let result = match world.buildings.get(building_id) {
        None => Err(CommandError::BuildingNotFound),
        Some(b) if b.owner != player => Err(CommandError::NotOwner { owner: b.owner }),
        Some(_) => queue_unit(world, building_id, kind),
    };

    match result {
        Ok(()) => true,
        Err(err) => {
            reject(player, "trainUnit", err);
            false
        }
    }
}
