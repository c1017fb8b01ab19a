//! Match Lifecycle Manager
//!
//! Declared matches move through confirmation, rejection, dispute and
//! administrative review. Ratings change only when a match becomes
//! validated and are reversed exactly when it is revoked.
//!
//! ## Module Structure
//!
//! - `lifecycle`: status machine, events, roles
//! - `manager`: declarations and transitions against a record store
//! - `resync`: rebuild standings from validated history
//! - `queries`: read-only views
//! - `config`: ledger configuration
//! - `error`: error types and the `(success, message)` outcome

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod manager;
pub mod queries;
pub mod resync;

// Re-export key types
pub use config::{LedgerConfig, ReplayExperience, RESYNC_TOLERANCE};
pub use error::{ErrorKind, LedgerError, Outcome, Summary};
pub use lifecycle::{Actor, LifecycleEvent, RatingEffect, Role, Step};
pub use manager::{MatchLedger, Transition};
pub use queries::LeaderboardEntry;
pub use resync::{replay_history, ResyncReport};
