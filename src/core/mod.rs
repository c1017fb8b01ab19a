//! Core primitives.
//!
//! Identifiers shared by every layer and the standings digest used to
//! verify that a resynchronization is deterministic.

pub mod hash;
pub mod ids;

// Re-export core types
pub use hash::{compute_standings_digest, StandingsDigest, StandingsHasher};
pub use ids::{MatchId, PlayerId};
