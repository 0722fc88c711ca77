//! # Skirmish Core
//!
//! Authoritative simulation for a two-player real-time strategy match.
//!
//! This crate contains **only** match logic:
//! - No rendering
//! - No IO beyond loading RON configs
//! - No threads
//! - Seeded randomness only (map generation and AI personality)
//!
//! A host drives a [`simulation::Simulation`] at [`simulation::TICK_RATE`],
//! feeds it client [`commands::Command`]s and publishes per-player
//! [`snapshot::PlayerSnapshot`]s.
//!
//! ## Crate Structure
//!
//! - [`world`] - Authoritative state container
//! - [`pathfinding`] - Grid A*
//! - [`units`] - Movement, gathering and combat state machines
//! - [`buildings`] - Construction and production
//! - [`visibility`] - Fog of war
//! - [`commands`] - Command validation and the [`commands::CommandPort`] seam
//! - [`ai`] - Computer opponent
//! - [`simulation`] - Tick loop and win condition

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod ai;
pub mod arena;
pub mod buildings;
pub mod commands;
pub mod components;
pub mod config;
pub mod data;
pub mod error;
pub mod map;
pub mod map_generation;
pub mod math;
pub mod pathfinding;
pub mod simulation;
pub mod snapshot;
pub mod units;
pub mod visibility;
pub mod world;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::ai::{AiController, Difficulty, DifficultyProfile};
    pub use crate::commands::{Command, CommandPort, CommandQueue};
    pub use crate::components::{
        Building, BuildingId, EntityId, Player, PlayerId, Unit, UnitId, UnitState,
    };
    pub use crate::config::MatchConfig;
    pub use crate::data::{BuildingKind, Cost, ResourceKind, UnitKind};
    pub use crate::error::{GameError, Result};
    pub use crate::map::{ResourceField, ResourceNode, Tile, TileGrid};
    pub use crate::map_generation::{generate_map, MapConfig};
    pub use crate::math::{Coord, Fixed, Rect};
    pub use crate::simulation::{MatchOutcome, Simulation, TickEvents};
    pub use crate::snapshot::PlayerSnapshot;
    pub use crate::world::WorldState;
}
