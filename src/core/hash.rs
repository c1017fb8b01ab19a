//! Standings Hashing
//!
//! Deterministic digest of every player's rating and match-count fields.
//! Two resynchronizations over the same history must produce the same digest,
//! which makes drift between runs visible in a single hex string.

use std::fmt;

use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::core::ids::PlayerId;
use crate::store::records::PlayerRecord;

/// Hash output type (256 bits / 32 bytes)
pub type StandingsHash = [u8; 32];

/// Deterministic hasher for player standings.
///
/// Wraps SHA-256 with helpers for record fields.
/// Order of updates is critical for determinism.
pub struct StandingsHasher {
    hasher: Sha256,
}

impl StandingsHasher {
    /// Create a new hasher with domain separator.
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self { hasher }
    }

    /// Create hasher for the player table.
    pub fn for_standings() -> Self {
        Self::new(b"ELO_LEDGER_STANDINGS_V1")
    }

    /// Update with a u32 value (little-endian).
    #[inline]
    pub fn update_u32(&mut self, value: u32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with an i64 value (little-endian).
    #[inline]
    pub fn update_i64(&mut self, value: i64) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with an optional i64; absence hashes differently from any value.
    #[inline]
    pub fn update_opt_i64(&mut self, value: Option<i64>) {
        match value {
            Some(v) => {
                self.hasher.update([1u8]);
                self.update_i64(v);
            }
            None => self.hasher.update([0u8]),
        }
    }

    /// Update with a player identifier (16 bytes).
    #[inline]
    pub fn update_player_id(&mut self, id: &PlayerId) {
        self.hasher.update(id.as_bytes());
    }

    /// Finalize and return the hash.
    pub fn finalize(self) -> StandingsHash {
        self.hasher.finalize().into()
    }
}

/// Digest of a player table, printable as hex.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StandingsDigest(pub StandingsHash);

impl fmt::Display for StandingsDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl Serialize for StandingsDigest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Compute the standings digest.
///
/// Players are hashed in identifier order regardless of input order.
/// Display names and visibility flags are not part of the digest.
pub fn compute_standings_digest(players: &[PlayerRecord]) -> StandingsDigest {
    let mut sorted: Vec<&PlayerRecord> = players.iter().collect();
    sorted.sort_by_key(|p| p.id);

    let mut hasher = StandingsHasher::for_standings();
    hasher.update_u32(sorted.len() as u32);
    for player in sorted {
        hasher.update_player_id(&player.id);
        hasher.update_i64(player.rating_1v1);
        hasher.update_u32(player.matches_1v1);
        hasher.update_opt_i64(player.rating_2v2);
        hasher.update_u32(player.matches_2v2);
    }
    StandingsDigest(hasher.finalize())
}

// =============================================================================
// TESTS
// =============================================================================
