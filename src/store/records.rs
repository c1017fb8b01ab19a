//! Record Definitions
//!
//! Typed rows for the two tables the ledger reads and writes, plus the
//! partial updates and filters used against them.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::ids::{MatchId, PlayerId};

// =============================================================================
// MATCH MODE
// =============================================================================

/// Match format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MatchMode {
    /// Individual match.
    #[serde(rename = "1v1")]
    OneVOne,
    /// Team match, two players per side.
    #[serde(rename = "2v2")]
    TwoVTwo,
}

impl MatchMode {
    /// Wire name of the mode.
    pub fn as_str(self) -> &'static str {
        match self {
            MatchMode::OneVOne => "1v1",
            MatchMode::TwoVTwo => "2v2",
        }
    }
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// PARTICIPANTS
// =============================================================================

/// Who played, and on which side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode")]
pub enum Participants {
    /// One winner, one loser.
    #[serde(rename = "1v1")]
    OneVOne {
        /// Winning player.
        winner: PlayerId,
        /// Losing player.
        loser: PlayerId,
    },
    /// Two winners, two losers.
    #[serde(rename = "2v2")]
    TwoVTwo {
        /// Winning player (usually the declaring one).
        winner: PlayerId,
        /// Winner's teammate.
        winner2: PlayerId,
        /// Losing player.
        loser: PlayerId,
        /// Loser's teammate.
        loser2: PlayerId,
    },
}

impl Participants {
    /// Individual match.
    pub fn one_v_one(winner: PlayerId, loser: PlayerId) -> Self {
        Participants::OneVOne { winner, loser }
    }

    /// Team match.
    pub fn two_v_two(winners: [PlayerId; 2], losers: [PlayerId; 2]) -> Self {
        Participants::TwoVTwo {
            winner: winners[0],
            winner2: winners[1],
            loser: losers[0],
            loser2: losers[1],
        }
    }

    /// Format of the match.
    pub fn mode(&self) -> MatchMode {
        match self {
            Participants::OneVOne { .. } => MatchMode::OneVOne,
            Participants::TwoVTwo { .. } => MatchMode::TwoVTwo,
        }
    }

    /// Members of the winning side.
    pub fn winners(&self) -> Vec<PlayerId> {
        match *self {
            Participants::OneVOne { winner, .. } => vec![winner],
            Participants::TwoVTwo { winner, winner2, .. } => vec![winner, winner2],
        }
    }

    /// Members of the losing side.
    pub fn losers(&self) -> Vec<PlayerId> {
        match *self {
            Participants::OneVOne { loser, .. } => vec![loser],
            Participants::TwoVTwo { loser, loser2, .. } => vec![loser, loser2],
        }
    }

    /// Every participant, winners first.
    pub fn all(&self) -> Vec<PlayerId> {
        let mut all = self.winners();
        all.extend(self.losers());
        all
    }

    /// Is `player` on the winning side.
    pub fn is_winner(&self, player: PlayerId) -> bool {
        self.winners().contains(&player)
    }

    /// Is `player` on the losing side.
    pub fn is_loser(&self, player: PlayerId) -> bool {
        self.losers().contains(&player)
    }

    /// Did `player` take part at all.
    pub fn involves(&self, player: PlayerId) -> bool {
        self.all().contains(&player)
    }

    /// True if the same player appears twice.
    pub fn has_duplicates(&self) -> bool {
        let all = self.all();
        all.iter()
            .enumerate()
            .any(|(i, id)| all[i + 1..].contains(id))
    }
}

// =============================================================================
// MATCH STATUS
// =============================================================================

/// Lifecycle status of a match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    /// Declared, awaiting the counterparty.
    Pending,
    /// Confirmed; ratings have been applied.
    Validated,
    /// Refused by the counterparty.
    Rejected,
    /// Declarer contests the refusal; awaiting an administrator.
    Disputed,
    /// Declarer accepted the refusal.
    RejectedConfirmed,
    /// Validated, then reversed by an administrator.
    Revoked,
}

impl MatchStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [MatchStatus; 6] = [
        MatchStatus::Pending,
        MatchStatus::Validated,
        MatchStatus::Rejected,
        MatchStatus::Disputed,
        MatchStatus::RejectedConfirmed,
        MatchStatus::Revoked,
    ];

    /// Stored name of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            MatchStatus::Pending => "pending",
            MatchStatus::Validated => "validated",
            MatchStatus::Rejected => "rejected",
            MatchStatus::Disputed => "disputed",
            MatchStatus::RejectedConfirmed => "rejected_confirmed",
            MatchStatus::Revoked => "revoked",
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// PLAYER RECORD
// =============================================================================

/// A player row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    /// Stable identity.
    pub id: PlayerId,
    /// Unique display name.
    pub username: String,
    /// Individual rating.
    pub rating_1v1: i64,
    /// Individual matches validated.
    #[serde(default)]
    pub matches_1v1: u32,
    /// Team rating. Absent on rows that predate team play.
    #[serde(default)]
    pub rating_2v2: Option<i64>,
    /// Team matches validated.
    #[serde(default)]
    pub matches_2v2: u32,
    /// Leave out of leaderboards.
    #[serde(default)]
    pub hide_from_leaderboard: bool,
    /// Keep the profile private.
    #[serde(default)]
    pub hide_profile: bool,
    /// May force validations, confirm rejections, revoke and resync.
    #[serde(default)]
    pub is_admin: bool,
}

impl PlayerRecord {
    /// A fresh player with both ratings at `initial_rating`.
    pub fn new(id: PlayerId, username: impl Into<String>, initial_rating: i64) -> Self {
        Self {
            id,
            username: username.into(),
            rating_1v1: initial_rating,
            matches_1v1: 0,
            rating_2v2: Some(initial_rating),
            matches_2v2: 0,
            hide_from_leaderboard: false,
            hide_profile: false,
            is_admin: false,
        }
    }

    /// Rating on the given track, `default` standing in for a missing 2v2 rating.
    pub fn rating(&self, mode: MatchMode, default: i64) -> i64 {
        match mode {
            MatchMode::OneVOne => self.rating_1v1,
            MatchMode::TwoVTwo => self.rating_2v2.unwrap_or(default),
        }
    }

    /// Matches played on the given track.
    pub fn matches(&self, mode: MatchMode) -> u32 {
        match mode {
            MatchMode::OneVOne => self.matches_1v1,
            MatchMode::TwoVTwo => self.matches_2v2,
        }
    }
}

/// Partial update of a player row. `None` leaves a field untouched.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlayerUpdate {
    /// New individual rating.
    pub rating_1v1: Option<i64>,
    /// New individual match count.
    pub matches_1v1: Option<u32>,
    /// New team rating.
    pub rating_2v2: Option<i64>,
    /// New team match count.
    pub matches_2v2: Option<u32>,
    /// New leaderboard visibility.
    pub hide_from_leaderboard: Option<bool>,
    /// New profile visibility.
    pub hide_profile: Option<bool>,
}

impl PlayerUpdate {
    /// Set rating and match count on one track.
    pub fn standing(mode: MatchMode, rating: i64, matches: u32) -> Self {
        match mode {
            MatchMode::OneVOne => Self {
                rating_1v1: Some(rating),
                matches_1v1: Some(matches),
                ..Self::default()
            },
            MatchMode::TwoVTwo => Self {
                rating_2v2: Some(rating),
                matches_2v2: Some(matches),
                ..Self::default()
            },
        }
    }

    /// Apply onto a record.
    pub fn apply_to(&self, player: &mut PlayerRecord) {
        if let Some(v) = self.rating_1v1 {
            player.rating_1v1 = v;
        }
        if let Some(v) = self.matches_1v1 {
            player.matches_1v1 = v;
        }
        if let Some(v) = self.rating_2v2 {
            player.rating_2v2 = Some(v);
        }
        if let Some(v) = self.matches_2v2 {
            player.matches_2v2 = v;
        }
        if let Some(v) = self.hide_from_leaderboard {
            player.hide_from_leaderboard = v;
        }
        if let Some(v) = self.hide_profile {
            player.hide_profile = v;
        }
    }
}

// =============================================================================
// MATCH RECORD
// =============================================================================

/// A match row. Only `status` and `elo_gain` change after insertion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    /// Stable identity.
    pub id: MatchId,
    /// Insertion time; replay order.
    pub created_at: DateTime<Utc>,
    /// Declaring player.
    pub created_by: PlayerId,
    /// Sides.
    pub participants: Participants,
    /// Lifecycle status.
    pub status: MatchStatus,
    /// Points moved at validation; 0 until then.
    #[serde(default)]
    pub elo_gain: i64,
}

impl MatchRecord {
    /// Format of the match.
    pub fn mode(&self) -> MatchMode {
        self.participants.mode()
    }
}

/// Fields for a new match row. The store assigns id and timestamp.
#[derive(Clone, Debug, PartialEq)]
pub struct NewMatch {
    /// Sides.
    pub participants: Participants,
    /// Declaring player.
    pub created_by: PlayerId,
}

/// Partial update of a match row.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MatchUpdate {
    /// New status.
    pub status: Option<MatchStatus>,
    /// New stored gain.
    pub elo_gain: Option<i64>,
}

impl MatchUpdate {
    /// Change status only.
    pub fn status(status: MatchStatus) -> Self {
        Self {
            status: Some(status),
            elo_gain: None,
        }
    }

    /// Change stored gain only.
    pub fn elo_gain(elo_gain: i64) -> Self {
        Self {
            status: None,
            elo_gain: Some(elo_gain),
        }
    }

    /// Apply onto a record.
    pub fn apply_to(&self, record: &mut MatchRecord) {
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(gain) = self.elo_gain {
            record.elo_gain = gain;
        }
    }
}

// =============================================================================
// MATCH FILTER
// =============================================================================

/// Creation-time ordering.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Oldest first (replay order).
    #[default]
    Ascending,
    /// Newest first (history views).
    Descending,
}

/// Selection of match rows. Empty criteria match everything.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MatchFilter {
    /// Accepted statuses; empty accepts any.
    pub statuses: Vec<MatchStatus>,
    /// Player on either side.
    pub involving: Option<PlayerId>,
    /// Player on the losing side.
    pub lost_by: Option<PlayerId>,
    /// Declaring player.
    pub created_by: Option<PlayerId>,
    /// Format.
    pub mode: Option<MatchMode>,
    /// Ordering by creation time.
    pub order: SortOrder,
    /// Maximum rows returned, after ordering.
    pub limit: Option<usize>,
}

impl MatchFilter {
    /// Matches in one status.
    pub fn with_status(status: MatchStatus) -> Self {
        Self {
            statuses: vec![status],
            ..Self::default()
        }
    }

    /// Restrict to a set of statuses.
    pub fn statuses(mut self, statuses: impl IntoIterator<Item = MatchStatus>) -> Self {
        self.statuses = statuses.into_iter().collect();
        self
    }

    /// Restrict to matches `player` took part in.
    pub fn involving(mut self, player: PlayerId) -> Self {
        self.involving = Some(player);
        self
    }

    /// Restrict to matches `player` lost.
    pub fn lost_by(mut self, player: PlayerId) -> Self {
        self.lost_by = Some(player);
        self
    }

    /// Restrict to matches declared by `player`.
    pub fn created_by(mut self, player: PlayerId) -> Self {
        self.created_by = Some(player);
        self
    }

    /// Restrict to one format.
    pub fn mode(mut self, mode: MatchMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Newest first.
    pub fn newest_first(mut self) -> Self {
        self.order = SortOrder::Descending;
        self
    }

    /// Cap the number of rows.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Does `record` satisfy every criterion (ordering and limit aside).
    pub fn accepts(&self, record: &MatchRecord) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&record.status) {
            return false;
        }
        if let Some(player) = self.involving {
            if !record.participants.involves(player) {
                return false;
            }
        }
        if let Some(player) = self.lost_by {
            if !record.participants.is_loser(player) {
                return false;
            }
        }
        if let Some(player) = self.created_by {
            if record.created_by != player {
                return false;
            }
        }
        if let Some(mode) = self.mode {
            if record.mode() != mode {
                return false;
            }
        }
        true
    }
}

// =============================================================================
// TESTS
// =============================================================================
