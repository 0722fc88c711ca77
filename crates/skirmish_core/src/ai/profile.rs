//! Difficulty profiles for the AI opponent.
//!
//! The numbers are tuned heuristics, not balance guarantees. Any of them can
//! be overridden by loading a profile from RON.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{GameError, Result};

/// Named difficulty tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    /// Slow decisions, small army.
    Easy,
    /// The default opponent.
    #[default]
    Medium,
    /// Fast decisions, goes straight for the town hall.
    Hard,
}

impl Difficulty {
    /// Built-in profile for this tier.
    #[must_use]
    pub const fn profile(self) -> DifficultyProfile {
        match self {
            Self::Easy => EASY,
            Self::Medium => MEDIUM,
            Self::Hard => HARD,
        }
    }
}

impl std::str::FromStr for Difficulty {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            other => Err(GameError::InvalidConfig(format!(
                "unknown difficulty '{other}'"
            ))),
        }
    }
}

/// Knobs that shape one AI player's behavior.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DifficultyProfile {
    /// Ticks between decision cycles.
    pub decision_interval: u64,
    /// Stop training peasants at this many.
    pub max_peasants: u32,
    /// Stop training military at this many.
    pub max_military: u32,
    /// Idle-or-moving military needed to launch an attack.
    pub attack_threshold: u32,
    /// Barracks limit.
    pub max_barracks: u32,
    /// Build a farm when population is within this many of the cap.
    pub farm_ahead: u32,
    /// Chance an idle peasant is put to work each cycle.
    pub gather_efficiency: f64,
    /// Ticks before the first building is placed.
    pub build_delay: u64,
    /// Attack the enemy town hall directly instead of the nearest building.
    pub target_town_hall: bool,
    /// Share of military training that is footmen; the rest are archers.
    pub footman_share: f64,
    /// Enemy units within this many tiles of a building trigger defense.
    pub defense_alert_radius: u32,
    /// Idle military within this many tiles of a threatened building respond.
    pub defense_rally_radius: u32,
}

const EASY: DifficultyProfile = DifficultyProfile {
    decision_interval: 30,
    max_peasants: 6,
    max_military: 6,
    attack_threshold: 6,
    max_barracks: 1,
    farm_ahead: 1,
    gather_efficiency: 0.6,
    build_delay: 600,
    target_town_hall: false,
    footman_share: 0.8,
    defense_alert_radius: 8,
    defense_rally_radius: 15,
};

const MEDIUM: DifficultyProfile = DifficultyProfile {
    decision_interval: 20,
    max_peasants: 10,
    max_military: 12,
    attack_threshold: 5,
    max_barracks: 2,
    farm_ahead: 2,
    gather_efficiency: 0.85,
    build_delay: 300,
    target_town_hall: false,
    footman_share: 0.6,
    defense_alert_radius: 8,
    defense_rally_radius: 15,
};

const HARD: DifficultyProfile = DifficultyProfile {
    decision_interval: 10,
    max_peasants: 14,
    max_military: 20,
    attack_threshold: 3,
    max_barracks: 3,
    farm_ahead: 3,
    gather_efficiency: 1.0,
    build_delay: 100,
    target_town_hall: true,
    footman_share: 0.5,
    defense_alert_radius: 8,
    defense_rally_radius: 15,
};

impl Default for DifficultyProfile {
    fn default() -> Self {
        Difficulty::default().profile()
    }
}

impl DifficultyProfile {
    /// Parse a profile from RON text and validate it.
    pub fn from_ron(text: &str) -> Result<Self> {
        let profile: Self =
            ron::from_str(text).map_err(|e| GameError::parse("difficulty profile", e))?;
        profile.validate()?;
        Ok(profile)
    }

    /// Load a profile from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            GameError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_ron(&text)
    }

    /// Reject profiles the controller cannot run.
    pub fn validate(&self) -> Result<()> {
        if self.decision_interval == 0 {
            return Err(GameError::InvalidConfig(
                "decision_interval must be positive".into(),
            ));
        }
        for (name, p) in [
            ("gather_efficiency", self.gather_efficiency),
            ("footman_share", self.footman_share),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(GameError::InvalidConfig(format!(
                    "{name} must be within 0..=1, got {p}"
                )));
            }
        }
        Ok(())
    }

    /// Set the decision interval.
    #[must_use]
    pub const fn with_decision_interval(mut self, ticks: u64) -> Self {
        self.decision_interval = ticks;
        self
    }

    /// Set the build delay.
    #[must_use]
    pub const fn with_build_delay(mut self, ticks: u64) -> Self {
        self.build_delay = ticks;
        self
    }

    /// Set the attack threshold.
    #[must_use]
    pub const fn with_attack_threshold(mut self, units: u32) -> Self {
        self.attack_threshold = units;
        self
    }
}
