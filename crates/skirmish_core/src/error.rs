//! Error types for the match simulation.
//!
//! Commands from clients never surface errors (see [`CommandError`]); these
//! types cover setup paths such as loading configuration data.

use thiserror::Error;

use crate::data::{BuildingKind, UnitKind};
use crate::world::PlayerId;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for fallible setup operations.
#[derive(Debug, Error)]
pub enum GameError {
    /// Data file parsing error.
    #[error("Failed to parse {what}: {message}")]
    DataParseError {
        /// What was being parsed.
        what: &'static str,
        /// Error message.
        message: String,
    },

    /// Configuration is structurally invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A map could not be generated for the requested configuration.
    #[error("Map generation failed: {0}")]
    MapGeneration(String),
}

impl GameError {
    pub(crate) fn parse(what: &'static str, err: impl std::fmt::Display) -> Self {
        Self::DataParseError {
            what,
            message: err.to_string(),
        }
    }
}

/// Why a command was rejected.
///
/// Rejections are logged and otherwise swallowed: the router only reports
/// success as a `bool` where a call site asks for one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CommandError {
    /// The unit id does not refer to a live unit.
    #[error("unit not found")]
    UnitNotFound,
    /// The building id does not refer to a live building.
    #[error("building not found")]
    BuildingNotFound,
    /// The attack target does not exist.
    #[error("target not found")]
    TargetNotFound,
    /// The target belongs to the commanding player.
    #[error("cannot attack own entity")]
    FriendlyTarget,
    /// The entity belongs to another player.
    #[error("entity is owned by player {owner:?}")]
    NotOwner {
        /// Actual owner.
        owner: PlayerId,
    },
    /// The player id is unknown.
    #[error("unknown player")]
    UnknownPlayer,
    /// The unit type cannot perform this action.
    #[error("{0:?} cannot do that")]
    WrongUnitKind(UnitKind),
    /// There is no resource at the requested tile.
    #[error("no resource at target tile")]
    NoResource,
    /// The player cannot pay for it.
    #[error("insufficient resources: need {gold} gold and {wood} wood")]
    InsufficientResources {
        /// Gold required.
        gold: u32,
        /// Wood required.
        wood: u32,
    },
    /// The footprint is out of bounds, not grass, or overlaps a building.
    #[error("cannot place {0:?} there")]
    Unbuildable(BuildingKind),
    /// The building type does not train this unit.
    #[error("{building:?} cannot train {unit:?}")]
    CannotProduce {
        /// Building type.
        building: BuildingKind,
        /// Requested unit type.
        unit: UnitKind,
    },
    /// The building is still under construction.
    #[error("building is not complete")]
    BuildingIncomplete,
}
