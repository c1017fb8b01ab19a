//! Record Store
//!
//! The contract the ledger consumes. The ledger never owns persistence: it
//! asks a [`RecordStore`] for a transaction and performs its reads and writes
//! through the [`Tables`] view that transaction hands out.
//!
//! A transaction commits every write made through `Tables` when its closure
//! returns `Ok`, and none of them when it returns `Err`. Implementations must
//! serialize conflicting transactions so that a status check and the writes
//! that depend on it cannot interleave with another transition on the same
//! match.

use std::future::Future;

use thiserror::Error;

use crate::core::ids::{MatchId, PlayerId};

pub mod memory;
pub mod records;

pub use memory::{MemoryStore, StoreSnapshot};
pub use records::{
    MatchFilter, MatchMode, MatchRecord, MatchStatus, MatchUpdate, NewMatch, Participants,
    PlayerRecord, PlayerUpdate, SortOrder,
};

/// Store errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// No player with this id.
    #[error("player {0} not found")]
    PlayerNotFound(PlayerId),

    /// No match with this id.
    #[error("match {0} not found")]
    MatchNotFound(MatchId),

    /// Display name already taken.
    #[error("display name already taken: {0}")]
    DuplicateName(String),

    /// Identity already present.
    #[error("duplicate record id: {0}")]
    DuplicateId(String),

    /// The store rejected the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Read/write view of both tables inside one transaction.
pub trait Tables {
    /// Fetch one player.
    fn fetch_player(&self, id: PlayerId) -> Result<PlayerRecord, StoreError>;

    /// Fetch several players in one lookup. Unknown ids are skipped, so the
    /// result may be shorter than `ids`.
    fn fetch_players(&self, ids: &[PlayerId]) -> Result<Vec<PlayerRecord>, StoreError>;

    /// Every player, in id order.
    fn list_players(&self) -> Result<Vec<PlayerRecord>, StoreError>;

    /// Insert a player row. Fails on a duplicate id or display name.
    fn insert_player(&mut self, player: PlayerRecord) -> Result<PlayerRecord, StoreError>;

    /// Apply a partial update to a player row.
    fn update_player(&mut self, id: PlayerId, update: &PlayerUpdate) -> Result<(), StoreError>;

    /// Fetch one match.
    fn fetch_match(&self, id: MatchId) -> Result<MatchRecord, StoreError>;

    /// Matches satisfying `filter`, ordered by creation time. Rows created at
    /// the same instant keep insertion order.
    fn fetch_matches(&self, filter: &MatchFilter) -> Result<Vec<MatchRecord>, StoreError>;

    /// Insert a match row; the store assigns id and creation time.
    fn insert_match(&mut self, new: NewMatch) -> Result<MatchRecord, StoreError>;

    /// Apply a partial update to a match row.
    fn update_match(&mut self, id: MatchId, update: &MatchUpdate) -> Result<(), StoreError>;
}

/// A transactional record store.
pub trait RecordStore: Send + Sync {
    /// Run `work` against one consistent view of the tables.
    ///
    /// Writes become visible only if `work` returns `Ok`. Errors raised by
    /// the store itself while opening or committing are converted into `E`.
    fn transaction<T, E, F>(&self, work: F) -> impl Future<Output = Result<T, E>> + Send
    where
        T: Send,
        E: From<StoreError> + Send,
        F: FnOnce(&mut dyn Tables) -> Result<T, E> + Send;
}
