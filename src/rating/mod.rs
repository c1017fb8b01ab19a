//! Rating Engine
//!
//! Pure functions only. The ledger calls into this module exactly once per
//! validated match and once per replayed match during resynchronization.
//!
//! ## Module Structure
//!
//! - `elo`: expected score, K-factor tiers, pairwise update
//! - `team`: team averaging for 2v2

pub mod elo;
pub mod team;

// Re-export key types
pub use elo::{
    compute_new_ratings, get_k_factor, round_half_up, EloConfig, EloEngine, KFactorTiers,
    RatingUpdate, INITIAL_RATING, RATING_SCALE_DIVISOR,
};
pub use team::team_average;
