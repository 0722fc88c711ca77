//! Match setup.
//!
//! A [`MatchConfig`] names the seed, the map and which players the computer
//! controls. It round-trips through RON so scenarios can live in data files:
//!
//! ```ron
//! (
//!     seed: 7,
//!     map: (width: 48, height: 48),
//!     ai: [(player: 1, difficulty: hard)],
//! )
//! ```

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ai::{Difficulty, DifficultyProfile};
use crate::components::PlayerId;
use crate::error::{GameError, Result};
use crate::map_generation::MapConfig;

/// Players in a generated match.
pub const PLAYER_COUNT: u8 = 2;

/// A computer-controlled seat.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AiSlot {
    /// Controlled player.
    pub player: PlayerId,
    /// Built-in tier.
    #[serde(default)]
    pub difficulty: Difficulty,
    /// Full profile overriding the tier.
    #[serde(default)]
    pub profile: Option<DifficultyProfile>,
}

impl AiSlot {
    /// The profile this seat plays with.
    #[must_use]
    pub fn resolved_profile(&self) -> DifficultyProfile {
        self.profile.unwrap_or_else(|| self.difficulty.profile())
    }
}

/// Everything needed to start a match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Seed for AI decisions.
    pub seed: u64,
    /// Map generation settings.
    pub map: MapConfig,
    /// Computer-controlled players.
    pub ai: Vec<AiSlot>,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            map: MapConfig::default(),
            ai: vec![AiSlot {
                player: PlayerId(1),
                difficulty: Difficulty::Medium,
                profile: None,
            }],
        }
    }
}

impl MatchConfig {
    /// A match with no AI players.
    #[must_use]
    pub fn human_vs_human() -> Self {
        Self {
            ai: Vec::new(),
            ..Self::default()
        }
    }

    /// Both players controlled by the computer.
    #[must_use]
    pub fn ai_vs_ai(first: Difficulty, second: Difficulty) -> Self {
        Self::human_vs_human()
            .with_ai(PlayerId(0), first)
            .with_ai(PlayerId(1), second)
    }

    /// Parse and validate a config from RON text.
    pub fn from_ron(text: &str) -> Result<Self> {
        let config: Self = ron::from_str(text).map_err(|e| GameError::parse("match config", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            GameError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_ron(&text)
    }

    /// Check the map and every AI seat.
    pub fn validate(&self) -> Result<()> {
        self.map.validate()?;

        let mut seats = BTreeSet::new();
        for slot in &self.ai {
            if slot.player.0 >= PLAYER_COUNT {
                return Err(GameError::InvalidConfig(format!(
                    "AI player {} does not exist",
                    slot.player.0
                )));
            }
            if !seats.insert(slot.player) {
                return Err(GameError::InvalidConfig(format!(
                    "AI player {} listed twice",
                    slot.player.0
                )));
            }
            slot.resolved_profile().validate()?;
        }
        Ok(())
    }

    /// Set the match seed. The map seed follows it.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self.map.seed = seed;
        self
    }

    /// Replace the map settings.
    #[must_use]
    pub fn with_map(mut self, map: MapConfig) -> Self {
        self.map = map;
        self
    }

    /// Hand `player` to the computer at `difficulty`, replacing any existing
    /// seat for that player.
    #[must_use]
    pub fn with_ai(mut self, player: PlayerId, difficulty: Difficulty) -> Self {
        self.ai.retain(|slot| slot.player != player);
        self.ai.push(AiSlot {
            player,
            difficulty,
            profile: None,
        });
        self
    }

    /// Hand `player` to the computer with a custom profile.
    #[must_use]
    pub fn with_profile(mut self, player: PlayerId, profile: DifficultyProfile) -> Self {
        self.ai.retain(|slot| slot.player != player);
        self.ai.push(AiSlot {
            player,
            difficulty: Difficulty::default(),
            profile: Some(profile),
        });
        self
    }
}
