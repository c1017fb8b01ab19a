//! Elo Rating Engine
//!
//! Pure computation of a single pairwise rating update. No I/O, no state.
//!
//! ## Algorithm
//!
//! ```text
//! E     = 1 / (1 + 10^((loser - winner) / 400))
//! K     = tier(winner_experience)          40 / 20 / 10
//! delta = round_half_up(K * (1 - E))
//! winner' = winner + delta
//! loser'  = loser  - delta
//! ```
//!
//! Only the winner's experience picks the K-factor. The transfer is
//! zero-sum, so a stored delta can later be reversed exactly.

use serde::{Deserialize, Serialize};

/// Rating assigned to every player before their first match.
pub const INITIAL_RATING: i64 = 1000;

/// Divisor of the rating difference in the expected-score exponent.
pub const RATING_SCALE_DIVISOR: f64 = 400.0;

/// K-factor tier boundaries and values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KFactorTiers {
    /// Highest experience that still counts as a novice.
    pub novice_max: i64,
    /// K-factor for novices.
    pub novice_k: i64,
    /// Highest experience that still counts as intermediate.
    pub intermediate_max: i64,
    /// K-factor for intermediate players.
    pub intermediate_k: i64,
    /// K-factor for everyone above `intermediate_max`.
    pub veteran_k: i64,
}

impl Default for KFactorTiers {
    fn default() -> Self {
        Self {
            novice_max: 10,
            novice_k: 40,
            intermediate_max: 30,
            intermediate_k: 20,
            veteran_k: 10,
        }
    }
}

impl KFactorTiers {
    /// Select the K-factor for a given number of matches played.
    ///
    /// No validation: negative experience lands in the novice tier.
    #[inline]
    pub fn k_factor(&self, experience: i64) -> i64 {
        if experience <= self.novice_max {
            self.novice_k
        } else if experience <= self.intermediate_max {
            self.intermediate_k
        } else {
            self.veteran_k
        }
    }
}

/// Engine configuration.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EloConfig {
    /// Starting rating, also the default for a missing 2v2 rating.
    pub initial_rating: i64,
    /// Divisor in the expected-score exponent.
    pub scale_divisor: f64,
    /// K-factor tiers.
    pub k_tiers: KFactorTiers,
}

impl Default for EloConfig {
    fn default() -> Self {
        Self {
            initial_rating: INITIAL_RATING,
            scale_divisor: RATING_SCALE_DIVISOR,
            k_tiers: KFactorTiers::default(),
        }
    }
}

/// Result of one pairwise update.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RatingUpdate {
    /// Winner's rating after the match.
    pub new_winner_rating: f64,
    /// Loser's rating after the match.
    pub new_loser_rating: f64,
    /// Points moved from loser to winner. Never negative.
    pub delta: i64,
}

/// Round to the nearest integer, halves going up (`2.5 -> 3`, `3.5 -> 4`).
#[inline]
pub fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

/// The rating engine.
#[derive(Clone, Copy, Debug, Default)]
pub struct EloEngine {
    config: EloConfig,
}

impl EloEngine {
    /// Create an engine with an explicit configuration.
    pub const fn new(config: EloConfig) -> Self {
        Self { config }
    }

    /// Engine configuration.
    pub fn config(&self) -> &EloConfig {
        &self.config
    }

    /// Probability that `winner_rating` beats `loser_rating`.
    #[inline]
    pub fn expected_score(&self, winner_rating: f64, loser_rating: f64) -> f64 {
        let exponent = (loser_rating - winner_rating) / self.config.scale_divisor;
        1.0 / (1.0 + 10f64.powf(exponent))
    }

    /// K-factor for a player with `experience` matches played.
    #[inline]
    pub fn k_factor(&self, experience: i64) -> i64 {
        self.config.k_tiers.k_factor(experience)
    }

    /// Compute the update for one finished match.
    ///
    /// `loser_experience` is accepted for symmetry with the call sites but
    /// does not affect the result.
    pub fn compute_new_ratings(
        &self,
        winner_rating: f64,
        loser_rating: f64,
        winner_experience: i64,
        _loser_experience: i64,
    ) -> RatingUpdate {
        let expected = self.expected_score(winner_rating, loser_rating);
        let k = self.k_factor(winner_experience);
        let delta = round_half_up(k as f64 * (1.0 - expected));

        RatingUpdate {
            new_winner_rating: winner_rating + delta as f64,
            new_loser_rating: loser_rating - delta as f64,
            delta,
        }
    }
}

/// K-factor using the default tiers.
pub fn get_k_factor(experience: i64) -> i64 {
    KFactorTiers::default().k_factor(experience)
}

/// Rating update using the default configuration.
pub fn compute_new_ratings(
    winner_rating: f64,
    loser_rating: f64,
    winner_experience: i64,
    loser_experience: i64,
) -> RatingUpdate {
    EloEngine::default().compute_new_ratings(
        winner_rating,
        loser_rating,
        winner_experience,
        loser_experience,
    )
}

// =============================================================================
// TESTS
// =============================================================================
