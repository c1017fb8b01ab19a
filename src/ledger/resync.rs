//! Resynchronization
//!
//! Rebuilds every player's standings from the validated match history.
//! Stored ratings are ignored: each player starts from the initial rating
//! with zero matches, validated matches are replayed oldest first, and the
//! results overwrite the player rows. Stored gains that disagree with the
//! replay are rewritten too.
//!
//! The whole replay is one store transaction, so no validation or
//! revocation can interleave with it and a failure part-way leaves the
//! stored standings untouched.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::core::hash::{compute_standings_digest, StandingsDigest};
use crate::core::ids::{MatchId, PlayerId};
use crate::ledger::config::{LedgerConfig, ReplayExperience};
use crate::ledger::error::{LedgerError, Summary};
use crate::ledger::lifecycle::Actor;
use crate::ledger::manager::MatchLedger;
use crate::rating::elo::EloEngine;
use crate::rating::team::team_average;
use crate::store::records::{
    MatchFilter, MatchRecord, MatchStatus, MatchUpdate, Participants, PlayerRecord, PlayerUpdate,
};
use crate::store::{RecordStore, Tables};

/// Summary of a resynchronization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ResyncReport {
    /// Validated matches replayed.
    pub matches_replayed: usize,
    /// Stored gains rewritten.
    pub gains_corrected: usize,
    /// Players whose stored standings changed.
    pub players_changed: usize,
    /// Digest of the rebuilt player table.
    pub digest: StandingsDigest,
}

impl Summary for ResyncReport {
    fn summary(&self) -> String {
        format!(
            "Resynchronized {} matches: {} gains corrected, {} players updated.",
            self.matches_replayed, self.gains_corrected, self.players_changed
        )
    }
}

/// Scratch standings for one player during replay.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Standing {
    rating_1v1: i64,
    matches_1v1: u32,
    rating_2v2: i64,
    matches_2v2: u32,
}

impl Standing {
    fn fresh(initial: i64) -> Self {
        Self {
            rating_1v1: initial,
            matches_1v1: 0,
            rating_2v2: initial,
            matches_2v2: 0,
        }
    }

    fn as_update(&self) -> PlayerUpdate {
        PlayerUpdate {
            rating_1v1: Some(self.rating_1v1),
            matches_1v1: Some(self.matches_1v1),
            rating_2v2: Some(self.rating_2v2),
            matches_2v2: Some(self.matches_2v2),
            ..PlayerUpdate::default()
        }
    }
}

type Scratch = BTreeMap<PlayerId, Standing>;

fn standing_mut<'a>(
    scratch: &'a mut Scratch,
    match_id: MatchId,
    player: PlayerId,
) -> Result<&'a mut Standing, LedgerError> {
    scratch
        .get_mut(&player)
        .ok_or(LedgerError::UnresolvedParticipant { match_id, player })
}

impl<S: RecordStore> MatchLedger<S> {
    /// Rebuild all standings from the validated history. Administrators only.
    ///
    /// Idempotent: running it twice with no new matches in between produces
    /// the same standings and the same digest.
    #[instrument(skip(self, actor), fields(actor = %actor.id.short()))]
    pub async fn resync(&self, actor: &Actor) -> Result<ResyncReport, LedgerError> {
        if !actor.is_admin {
            return Err(LedgerError::Forbidden {
                actor: actor.id,
                action: "resynchronize ratings",
            });
        }

        let engine = *self.engine();
        let config = *self.config();
        let result = self
            .store()
            .transaction(move |tables| replay_history(tables, &engine, &config))
            .await;

        match &result {
            Ok(report) => info!(
                "Resync replayed {} matches, corrected {} gains, updated {} players; digest {}",
                report.matches_replayed,
                report.gains_corrected,
                report.players_changed,
                report.digest
            ),
            Err(e) => warn!("Resync aborted: {}", e),
        }
        result
    }
}

/// Replay the validated history inside an open transaction.
pub fn replay_history(
    tables: &mut dyn Tables,
    engine: &EloEngine,
    config: &LedgerConfig,
) -> Result<ResyncReport, LedgerError> {
    let initial = engine.config().initial_rating;
    let players = tables.list_players()?;
    let mut scratch: Scratch = players
        .iter()
        .map(|p| (p.id, Standing::fresh(initial)))
        .collect();

    let history = tables.fetch_matches(&MatchFilter::with_status(MatchStatus::Validated))?;
    let mut gains_corrected = 0;
    for record in &history {
        let gain = replay_match(&mut scratch, engine, config.replay_experience, record)?;
        if ((gain - record.elo_gain) as f64).abs() > config.resync_tolerance {
            tables.update_match(record.id, &MatchUpdate::elo_gain(gain))?;
            gains_corrected += 1;
        }
    }

    let mut players_changed = 0;
    let mut rebuilt: Vec<PlayerRecord> = Vec::with_capacity(players.len());
    for player in players {
        let update = scratch
            .get(&player.id)
            .map(Standing::as_update)
            .unwrap_or_default();
        let mut after = player.clone();
        update.apply_to(&mut after);
        if after != player {
            players_changed += 1;
        }
        tables.update_player(player.id, &update)?;
        rebuilt.push(after);
    }

    Ok(ResyncReport {
        matches_replayed: history.len(),
        gains_corrected,
        players_changed,
        digest: compute_standings_digest(&rebuilt),
    })
}

/// Replay one match on the scratch standings and return its delta.
fn replay_match(
    scratch: &mut Scratch,
    engine: &EloEngine,
    experience: ReplayExperience,
    record: &MatchRecord,
) -> Result<i64, LedgerError> {
    let initial = engine.config().initial_rating;

    match record.participants {
        Participants::OneVOne { winner, loser } => {
            let w = *standing_mut(scratch, record.id, winner)?;
            let l = *standing_mut(scratch, record.id, loser)?;
            let (w_exp, l_exp) = match experience {
                ReplayExperience::Ignored => (0, 0),
                ReplayExperience::Historical => {
                    (i64::from(w.matches_1v1), i64::from(l.matches_1v1))
                }
            };
            let delta = engine
                .compute_new_ratings(w.rating_1v1 as f64, l.rating_1v1 as f64, w_exp, l_exp)
                .delta;

            let w = standing_mut(scratch, record.id, winner)?;
            w.rating_1v1 += delta;
            w.matches_1v1 += 1;
            let l = standing_mut(scratch, record.id, loser)?;
            l.rating_1v1 -= delta;
            l.matches_1v1 += 1;
            Ok(delta)
        }
        Participants::TwoVTwo { .. } => {
            let mut side_average = |ids: &[PlayerId]| -> Result<f64, LedgerError> {
                let mut ratings = Vec::with_capacity(ids.len());
                for id in ids {
                    ratings.push(Some(standing_mut(scratch, record.id, *id)?.rating_2v2));
                }
                Ok(team_average(&ratings, initial))
            };
            let winners = record.participants.winners();
            let losers = record.participants.losers();
            let winner_avg = side_average(&winners)?;
            let loser_avg = side_average(&losers)?;

            // Team matches never use experience, live or replayed.
            let delta = engine.compute_new_ratings(winner_avg, loser_avg, 0, 0).delta;

            for id in &winners {
                let s = standing_mut(scratch, record.id, *id)?;
                s.rating_2v2 += delta;
                s.matches_2v2 += 1;
            }
            for id in &losers {
                let s = standing_mut(scratch, record.id, *id)?;
                s.rating_2v2 -= delta;
                s.matches_2v2 += 1;
            }
            Ok(delta)
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
