//! Ledger configuration.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::rating::elo::EloConfig;

/// Smallest difference between a replayed and a stored gain that triggers
/// a rewrite of the stored gain.
pub const RESYNC_TOLERANCE: f64 = 0.01;

/// Experience fed to the engine while replaying 1v1 history.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayExperience {
    /// Every replayed match counts as both players' first (K = 40).
    /// Matches how stored ratings have always been rebuilt.
    #[default]
    Ignored,
    /// Use the match count each player had reached at that point in the
    /// replay, the same way live validation does.
    Historical,
}

impl FromStr for ReplayExperience {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ignored" | "zero" => Ok(ReplayExperience::Ignored),
            "historical" => Ok(ReplayExperience::Historical),
            other => Err(format!("unknown replay experience mode: {other}")),
        }
    }
}

/// Ledger configuration.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Rating engine parameters.
    pub elo: EloConfig,
    /// Experience handling during resynchronization.
    pub replay_experience: ReplayExperience,
    /// Gain difference above which resync rewrites a stored gain.
    pub resync_tolerance: f64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            elo: EloConfig::default(),
            replay_experience: ReplayExperience::default(),
            resync_tolerance: RESYNC_TOLERANCE,
        }
    }
}

impl LedgerConfig {
    /// Create config from environment variables.
    ///
    /// - `LEDGER_INITIAL_RATING`
    /// - `LEDGER_REPLAY_EXPERIENCE` (`ignored` | `historical`)
    /// - `LEDGER_RESYNC_TOLERANCE`
    ///
    /// Unset or unparsable values fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup<L>(lookup: L) -> Self
    where
        L: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup("LEDGER_INITIAL_RATING") {
            match raw.trim().parse::<i64>() {
                Ok(v) => config.elo.initial_rating = v,
                Err(e) => warn!(value = %raw, error = %e, "Ignoring LEDGER_INITIAL_RATING"),
            }
        }

        if let Some(raw) = lookup("LEDGER_REPLAY_EXPERIENCE") {
            match raw.parse::<ReplayExperience>() {
                Ok(v) => config.replay_experience = v,
                Err(e) => warn!(error = %e, "Ignoring LEDGER_REPLAY_EXPERIENCE"),
            }
        }

        if let Some(raw) = lookup("LEDGER_RESYNC_TOLERANCE") {
            match raw.trim().parse::<f64>() {
                Ok(v) if v >= 0.0 => config.resync_tolerance = v,
                _ => warn!(value = %raw, "Ignoring LEDGER_RESYNC_TOLERANCE"),
            }
        }

        config
    }
}
