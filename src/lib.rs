//! # Elo Ledger
//!
//! Pairwise Elo rating engine and match confirmation ledger for 1v1 and
//! 2v2 leagues.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        ELO LEDGER                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Shared primitives                         │
//! │  ├── ids.rs      - Player and match identifiers              │
//! │  └── hash.rs     - Standings digest for resync checks        │
//! │                                                              │
//! │  rating/         - Rating engine (pure)                      │
//! │  ├── elo.rs      - Expected score, K-factor, update          │
//! │  └── team.rs     - 2v2 team averaging                        │
//! │                                                              │
//! │  store/          - Persistence contract                      │
//! │  ├── records.rs  - Player and match rows, filters            │
//! │  └── memory.rs   - Transactional in-memory store             │
//! │                                                              │
//! │  ledger/         - Match lifecycle                           │
//! │  ├── lifecycle.rs- Status machine and roles                  │
//! │  ├── manager.rs  - Declarations and transitions              │
//! │  ├── resync.rs   - Rebuild standings from history            │
//! │  ├── queries.rs  - Read-only views                           │
//! │  ├── config.rs   - Ledger configuration                      │
//! │  └── error.rs    - Errors and outcomes                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Rating Guarantee
//!
//! A match changes ratings exactly once, when it becomes validated, and a
//! revocation subtracts exactly the stored gain. Every transition runs as a
//! single store transaction, so a failure part-way leaves nothing behind.
//! Resynchronization over the same history always produces the same
//! standings and the same digest.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod ledger;
pub mod rating;
pub mod store;

// Re-export commonly used types
pub use crate::core::hash::{compute_standings_digest, StandingsDigest};
pub use crate::core::ids::{MatchId, PlayerId};
pub use ledger::{
    Actor, ErrorKind, LedgerConfig, LedgerError, MatchLedger, Outcome, ReplayExperience,
    ResyncReport, Transition,
};
pub use rating::elo::{compute_new_ratings, get_k_factor, EloEngine, RatingUpdate};
pub use store::{MatchMode, MatchStatus, MemoryStore, Participants, PlayerRecord, RecordStore};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
