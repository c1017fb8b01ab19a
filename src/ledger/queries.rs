//! Read queries behind the player and administrator views.
//!
//! Nothing here writes. Each query still runs inside a store transaction so
//! it sees one consistent snapshot of both tables.

use serde::Serialize;

use crate::core::ids::PlayerId;
use crate::ledger::error::LedgerError;
use crate::ledger::lifecycle::Actor;
use crate::ledger::manager::MatchLedger;
use crate::store::records::{MatchFilter, MatchMode, MatchRecord, MatchStatus, PlayerRecord};
use crate::store::RecordStore;

/// One leaderboard row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    /// 1-based position.
    pub rank: usize,
    /// Player.
    pub player_id: PlayerId,
    /// Display name.
    pub username: String,
    /// Rating on the requested track.
    pub rating: i64,
    /// Matches validated on the requested track.
    pub matches: u32,
}

impl<S: RecordStore> MatchLedger<S> {
    /// Pending matches `player` lost and has yet to confirm or reject,
    /// oldest first.
    pub async fn pending_confirmations(
        &self,
        player: PlayerId,
    ) -> Result<Vec<MatchRecord>, LedgerError> {
        let filter = MatchFilter::with_status(MatchStatus::Pending).lost_by(player);
        self.store()
            .transaction(move |tables| -> Result<_, LedgerError> {
                Ok(tables.fetch_matches(&filter)?)
            })
            .await
    }

    /// The latest `limit` matches declared by `player`, newest first.
    pub async fn recent_declarations(
        &self,
        player: PlayerId,
        limit: usize,
    ) -> Result<Vec<MatchRecord>, LedgerError> {
        let filter = MatchFilter::default()
            .created_by(player)
            .newest_first()
            .limit(limit);
        self.store()
            .transaction(move |tables| -> Result<_, LedgerError> {
                Ok(tables.fetch_matches(&filter)?)
            })
            .await
    }

    /// Every match in one of `statuses`, newest first. An empty set lists
    /// every match. Administrators only.
    pub async fn admin_queue(
        &self,
        actor: &Actor,
        statuses: &[MatchStatus],
    ) -> Result<Vec<MatchRecord>, LedgerError> {
        if !actor.is_admin {
            return Err(LedgerError::Forbidden {
                actor: actor.id,
                action: "view the administrator queue",
            });
        }
        let filter = MatchFilter::default()
            .statuses(statuses.iter().copied())
            .newest_first();
        self.store()
            .transaction(move |tables| -> Result<_, LedgerError> {
                Ok(tables.fetch_matches(&filter)?)
            })
            .await
    }

    /// Ranking on one track, highest rating first. Players who opted out
    /// are left off; ties are broken by display name.
    pub async fn leaderboard(&self, mode: MatchMode) -> Result<Vec<LeaderboardEntry>, LedgerError> {
        let initial = self.config().elo.initial_rating;
        let mut players: Vec<PlayerRecord> = self
            .store()
            .transaction(|tables| -> Result<_, LedgerError> { Ok(tables.list_players()?) })
            .await?;

        players.retain(|p| !p.hide_from_leaderboard);
        players.sort_by(|a, b| {
            b.rating(mode, initial)
                .cmp(&a.rating(mode, initial))
                .then_with(|| a.username.cmp(&b.username))
        });

        Ok(players
            .into_iter()
            .enumerate()
            .map(|(i, p)| LeaderboardEntry {
                rank: i + 1,
                player_id: p.id,
                rating: p.rating(mode, initial),
                matches: p.matches(mode),
                username: p.username,
            })
            .collect())
    }

    /// Look a player up by display name.
    ///
    /// A hidden profile is visible only to its owner and administrators.
    pub async fn player_profile(
        &self,
        viewer: &Actor,
        username: &str,
    ) -> Result<PlayerRecord, LedgerError> {
        let wanted = username.trim().to_string();
        let players = self
            .store()
            .transaction(|tables| -> Result<_, LedgerError> { Ok(tables.list_players()?) })
            .await?;

        let profile = players
            .into_iter()
            .find(|p| p.username == wanted)
            .ok_or(LedgerError::UnknownUsername(wanted))?;

        if profile.hide_profile && !viewer.is_admin && viewer.id != profile.id {
            return Err(LedgerError::Forbidden {
                actor: viewer.id,
                action: "view this profile",
            });
        }
        Ok(profile)
    }
}
