//! In-Memory Record Store
//!
//! Tables live behind a single tokio `RwLock`. A transaction takes the write
//! guard, works on a copy of the tables and swaps the copy in on success, so
//! a failed transaction leaves nothing behind and no two transactions ever
//! interleave.

use std::collections::BTreeMap;
use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::core::ids::{MatchId, PlayerId};
use crate::store::records::{
    MatchFilter, MatchRecord, MatchStatus, MatchUpdate, NewMatch, PlayerRecord, PlayerUpdate,
    SortOrder,
};
use crate::store::{RecordStore, StoreError, Tables};

/// Serializable copy of both tables.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    /// Player rows.
    pub players: Vec<PlayerRecord>,
    /// Match rows, in insertion order.
    pub matches: Vec<MatchRecord>,
}

#[derive(Clone, Debug, Default)]
struct MemoryTables {
    players: BTreeMap<PlayerId, PlayerRecord>,
    /// Insertion order.
    matches: Vec<MatchRecord>,
    last_created_at: Option<DateTime<Utc>>,
    /// Writes left before the next one is refused.
    writes_until_failure: Option<u32>,
    unavailable: bool,
}

impl MemoryTables {
    fn charge_write(&mut self) -> Result<(), StoreError> {
        match self.writes_until_failure.as_mut() {
            Some(0) => Err(StoreError::Unavailable("write refused".into())),
            Some(remaining) => {
                *remaining -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn match_index(&self, id: MatchId) -> Result<usize, StoreError> {
        self.matches
            .iter()
            .position(|m| m.id == id)
            .ok_or(StoreError::MatchNotFound(id))
    }

    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let stamp = match self.last_created_at {
            Some(last) if last > now => last,
            _ => now,
        };
        self.last_created_at = Some(stamp);
        stamp
    }
}

impl Tables for MemoryTables {
    fn fetch_player(&self, id: PlayerId) -> Result<PlayerRecord, StoreError> {
        self.players
            .get(&id)
            .cloned()
            .ok_or(StoreError::PlayerNotFound(id))
    }

    fn fetch_players(&self, ids: &[PlayerId]) -> Result<Vec<PlayerRecord>, StoreError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.players.get(id).cloned())
            .collect())
    }

    fn list_players(&self) -> Result<Vec<PlayerRecord>, StoreError> {
        Ok(self.players.values().cloned().collect())
    }

    fn insert_player(&mut self, player: PlayerRecord) -> Result<PlayerRecord, StoreError> {
        if self.players.contains_key(&player.id) {
            return Err(StoreError::DuplicateId(player.id.to_string()));
        }
        if self.players.values().any(|p| p.username == player.username) {
            return Err(StoreError::DuplicateName(player.username));
        }
        self.charge_write()?;
        self.players.insert(player.id, player.clone());
        Ok(player)
    }

    fn update_player(&mut self, id: PlayerId, update: &PlayerUpdate) -> Result<(), StoreError> {
        if !self.players.contains_key(&id) {
            return Err(StoreError::PlayerNotFound(id));
        }
        self.charge_write()?;
        if let Some(player) = self.players.get_mut(&id) {
            update.apply_to(player);
        }
        Ok(())
    }

    fn fetch_match(&self, id: MatchId) -> Result<MatchRecord, StoreError> {
        let idx = self.match_index(id)?;
        Ok(self.matches[idx].clone())
    }

    fn fetch_matches(&self, filter: &MatchFilter) -> Result<Vec<MatchRecord>, StoreError> {
        let mut selected: Vec<MatchRecord> = self
            .matches
            .iter()
            .filter(|m| filter.accepts(m))
            .cloned()
            .collect();

        // Stable: equal timestamps keep insertion order.
        selected.sort_by_key(|m| m.created_at);
        if filter.order == SortOrder::Descending {
            selected.reverse();
        }
        if let Some(limit) = filter.limit {
            selected.truncate(limit);
        }
        Ok(selected)
    }

    fn insert_match(&mut self, new: NewMatch) -> Result<MatchRecord, StoreError> {
        self.charge_write()?;
        let record = MatchRecord {
            id: MatchId::random(),
            created_at: self.next_timestamp(),
            created_by: new.created_by,
            participants: new.participants,
            status: MatchStatus::Pending,
            elo_gain: 0,
        };
        self.matches.push(record.clone());
        Ok(record)
    }

    fn update_match(&mut self, id: MatchId, update: &MatchUpdate) -> Result<(), StoreError> {
        let idx = self.match_index(id)?;
        self.charge_write()?;
        update.apply_to(&mut self.matches[idx]);
        Ok(())
    }
}

/// Transactional in-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<MemoryTables>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a store from a snapshot, checking id and name uniqueness.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Result<Self, StoreError> {
        let mut tables = MemoryTables::default();
        for player in snapshot.players {
            tables.insert_player(player)?;
        }
        for record in snapshot.matches {
            if tables.matches.iter().any(|m| m.id == record.id) {
                return Err(StoreError::DuplicateId(record.id.to_string()));
            }
            if tables.last_created_at.map_or(true, |t| record.created_at > t) {
                tables.last_created_at = Some(record.created_at);
            }
            tables.matches.push(record);
        }
        debug!(
            players = tables.players.len(),
            matches = tables.matches.len(),
            "Loaded store snapshot"
        );
        Ok(Self {
            tables: RwLock::new(tables),
        })
    }

    /// Copy both tables out.
    pub async fn snapshot(&self) -> StoreSnapshot {
        let tables = self.tables.read().await;
        StoreSnapshot {
            players: tables.players.values().cloned().collect(),
            matches: tables.matches.clone(),
        }
    }

    /// Let the next `writes` writes succeed and refuse every one after that,
    /// until [`MemoryStore::clear_faults`].
    pub async fn fail_after_writes(&self, writes: u32) {
        warn!(writes, "Injecting write failure");
        self.tables.write().await.writes_until_failure = Some(writes);
    }

    /// Refuse to open transactions at all.
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.tables.write().await.unavailable = unavailable;
    }

    /// Remove injected faults.
    pub async fn clear_faults(&self) {
        let mut tables = self.tables.write().await;
        tables.writes_until_failure = None;
        tables.unavailable = false;
    }
}

impl RecordStore for MemoryStore {
    fn transaction<T, E, F>(&self, work: F) -> impl Future<Output = Result<T, E>> + Send
    where
        T: Send,
        E: From<StoreError> + Send,
        F: FnOnce(&mut dyn Tables) -> Result<T, E> + Send,
    {
        async move {
            let mut tables = self.tables.write().await;
            if tables.unavailable {
                return Err(StoreError::Unavailable("store offline".into()).into());
            }

            let mut working = tables.clone();
            let out = work(&mut working as &mut dyn Tables)?;
            *tables = working;
            Ok(out)
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::records::Participants;

    fn rating(value: i64) -> PlayerUpdate {
        PlayerUpdate {
            rating_1v1: Some(value),
            ..PlayerUpdate::default()
        }
    }

    async fn seeded() -> (MemoryStore, PlayerId, PlayerId) {
        let store = MemoryStore::new();
        let a = PlayerId::random();
        let b = PlayerId::random();
        store
            .transaction(|t| -> Result<(), StoreError> {
                t.insert_player(PlayerRecord::new(a, "ana", 1000))?;
                t.insert_player(PlayerRecord::new(b, "bob", 1000))?;
                Ok(())
            })
            .await
            .unwrap();
        (store, a, b)
    }

    #[tokio::test]
    async fn test_commit_on_ok() {
        let (store, a, _) = seeded().await;
        store
            .transaction(|t| t.update_player(a, &rating(1100)))
            .await
            .unwrap();

        let player = store.transaction(|t| t.fetch_player(a)).await.unwrap();
        assert_eq!(player.rating_1v1, 1100);
    }

    #[tokio::test]
    async fn test_rollback_on_err() {
        let (store, a, b) = seeded().await;
        let result: Result<(), StoreError> = store
            .transaction(|t| {
                t.update_player(a, &rating(1100))?;
                t.fetch_player(PlayerId::random())?;
                t.update_player(b, &rating(900))
            })
            .await;
        assert!(matches!(result, Err(StoreError::PlayerNotFound(_))));

        let players = store.transaction(|t| t.fetch_players(&[a, b])).await.unwrap();
        assert!(players.iter().all(|p| p.rating_1v1 == 1000));
    }

    #[tokio::test]
    async fn test_duplicate_name_rejected() {
        let (store, _, _) = seeded().await;
        let result = store
            .transaction(|t| t.insert_player(PlayerRecord::new(PlayerId::random(), "ana", 1000)))
            .await;
        assert_eq!(result, Err(StoreError::DuplicateName("ana".into())));
    }

    #[tokio::test]
    async fn test_batch_fetch_skips_unknown() {
        let (store, a, b) = seeded().await;
        let players = store
            .transaction(|t| t.fetch_players(&[a, PlayerId::random(), b]))
            .await
            .unwrap();
        assert_eq!(players.len(), 2);
    }

    #[tokio::test]
    async fn test_matches_keep_insertion_order() {
        let (store, a, b) = seeded().await;
        let ids: Vec<MatchId> = store
            .transaction(|t| -> Result<Vec<MatchId>, StoreError> {
                (0..5)
                    .map(|_| {
                        t.insert_match(NewMatch {
                            participants: Participants::one_v_one(a, b),
                            created_by: a,
                        })
                        .map(|m| m.id)
                    })
                    .collect()
            })
            .await
            .unwrap();

        let ascending = store
            .transaction(|t| t.fetch_matches(&MatchFilter::default()))
            .await
            .unwrap();
        assert_eq!(ascending.iter().map(|m| m.id).collect::<Vec<_>>(), ids);

        let newest = store
            .transaction(|t| t.fetch_matches(&MatchFilter::default().newest_first().limit(2)))
            .await
            .unwrap();
        assert_eq!(newest.len(), 2);
        assert_eq!(newest[0].id, ids[4]);
        assert_eq!(newest[1].id, ids[3]);
    }

    #[tokio::test]
    async fn test_injected_write_failure() {
        let (store, a, b) = seeded().await;
        store.fail_after_writes(1).await;

        let result: Result<(), StoreError> = store
            .transaction(|t| {
                t.update_player(a, &rating(1100))?;
                t.update_player(b, &rating(900))
            })
            .await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));

        store.clear_faults().await;
        let player = store.transaction(|t| t.fetch_player(a)).await.unwrap();
        assert_eq!(player.rating_1v1, 1000);
    }

    #[tokio::test]
    async fn test_unavailable_store() {
        let (store, a, _) = seeded().await;
        store.set_unavailable(true).await;
        let result = store.transaction(|t| t.fetch_player(a)).await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_snapshot_roundtrip_through_json() {
        let (store, a, b) = seeded().await;
        store
            .transaction(|t| {
                t.insert_match(NewMatch {
                    participants: Participants::one_v_one(a, b),
                    created_by: a,
                })
            })
            .await
            .unwrap();

        let snapshot = store.snapshot().await;
        let json = serde_json::to_string(&snapshot).unwrap();
        let restored = MemoryStore::from_snapshot(serde_json::from_str(&json).unwrap()).unwrap();

        assert_eq!(restored.snapshot().await, snapshot);
    }

    #[test]
    fn test_snapshot_rejects_duplicate_names() {
        let snapshot = StoreSnapshot {
            players: vec![
                PlayerRecord::new(PlayerId::random(), "ana", 1000),
                PlayerRecord::new(PlayerId::random(), "ana", 1000),
            ],
            matches: Vec::new(),
        };
        assert!(matches!(
            MemoryStore::from_snapshot(snapshot),
            Err(StoreError::DuplicateName(_))
        ));
    }
}
