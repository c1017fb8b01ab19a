//! Match Ledger
//!
//! Drives matches through the lifecycle against a record store. Every
//! operation runs as one store transaction: the match is read, the event is
//! authorized and checked against the transition table, ratings are applied
//! or reversed, and the new status is written, all committed together or not
//! at all. Because the status check happens inside that transaction, a match
//! has its rating effect applied at most once no matter how many callers
//! race on it.

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::core::ids::{MatchId, PlayerId};
use crate::ledger::config::LedgerConfig;
use crate::ledger::error::{LedgerError, Summary};
use crate::ledger::lifecycle::{authorize, plan, Actor, LifecycleEvent, RatingEffect, Step};
use crate::rating::elo::EloEngine;
use crate::rating::team::team_average;
use crate::store::records::{
    MatchMode, MatchRecord, MatchStatus, MatchUpdate, NewMatch, Participants, PlayerRecord,
    PlayerUpdate,
};
use crate::store::{RecordStore, StoreError, Tables};

/// What a lifecycle operation did.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Transition {
    /// Match concerned.
    pub match_id: MatchId,
    /// Status before.
    pub from: MatchStatus,
    /// Status after.
    pub to: MatchStatus,
    /// Stored gain after the operation.
    pub elo_gain: i64,
    /// Whether ratings were touched.
    pub ratings_changed: bool,
}

impl Transition {
    fn unchanged(record: &MatchRecord) -> Self {
        Self {
            match_id: record.id,
            from: record.status,
            to: record.status,
            elo_gain: record.elo_gain,
            ratings_changed: false,
        }
    }

    /// Whether the status moved.
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

impl Summary for Transition {
    fn summary(&self) -> String {
        match (self.from, self.to) {
            (MatchStatus::Validated, MatchStatus::Validated) => {
                "Match already validated.".to_string()
            }
            (_, MatchStatus::Validated) => format!(
                "Match validated, {} points transferred and standings updated.",
                self.elo_gain
            ),
            (_, MatchStatus::Revoked) => format!(
                "Match revoked, {} points returned to the loser.",
                self.elo_gain
            ),
            (MatchStatus::Disputed, MatchStatus::Rejected) => {
                "Rejection confirmed by an administrator.".to_string()
            }
            (_, MatchStatus::Rejected) => "Match rejected.".to_string(),
            (_, MatchStatus::Disputed) => "Dispute sent to an administrator.".to_string(),
            (_, MatchStatus::RejectedConfirmed) => "Rejection accepted; match closed.".to_string(),
            (_, MatchStatus::Pending) => "Match pending.".to_string(),
        }
    }
}

impl Summary for MatchRecord {
    fn summary(&self) -> String {
        format!("{} match declared; awaiting confirmation.", self.mode())
    }
}

/// The match lifecycle manager.
#[derive(Debug)]
pub struct MatchLedger<S> {
    store: S,
    engine: EloEngine,
    config: LedgerConfig,
}

impl<S: RecordStore> MatchLedger<S> {
    /// Create a ledger over `store`.
    pub fn new(store: S, config: LedgerConfig) -> Self {
        Self {
            store,
            engine: EloEngine::new(config.elo),
            config,
        }
    }

    /// Underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Rating engine in use.
    pub fn engine(&self) -> &EloEngine {
        &self.engine
    }

    /// Ledger configuration.
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Register a player with default ratings.
    #[instrument(skip(self))]
    pub async fn register_player(&self, username: &str) -> Result<PlayerRecord, LedgerError> {
        let username = username.trim().to_string();
        if username.is_empty() {
            return Err(LedgerError::InvalidDeclaration("display name is empty".into()));
        }
        let player = PlayerRecord::new(PlayerId::random(), username, self.config.elo.initial_rating);
        let player = self
            .store
            .transaction(move |tables| -> Result<PlayerRecord, LedgerError> {
                Ok(tables.insert_player(player)?)
            })
            .await?;
        info!("Registered player {} ({})", player.username, player.id.short());
        Ok(player)
    }

    /// Declare a result. The match starts `pending`.
    ///
    /// The actor must be on the winning side unless an administrator.
    #[instrument(skip(self, actor), fields(actor = %actor.id.short()))]
    pub async fn declare_match(
        &self,
        actor: &Actor,
        participants: Participants,
    ) -> Result<MatchRecord, LedgerError> {
        if participants.has_duplicates() {
            return Err(LedgerError::InvalidDeclaration(
                "a player cannot appear twice in one match".into(),
            ));
        }
        if !actor.is_admin && !participants.is_winner(actor.id) {
            return Err(LedgerError::Forbidden {
                actor: actor.id,
                action: "declare a win for another side",
            });
        }

        let created_by = actor.id;
        let record = self
            .store
            .transaction(move |tables| -> Result<MatchRecord, LedgerError> {
                let ids = participants.all();
                let found = tables.fetch_players(&ids)?;
                if let Some(missing) = ids.iter().find(|id| !found.iter().any(|p| p.id == **id)) {
                    return Err(LedgerError::PlayerNotFound(*missing));
                }
                Ok(tables.insert_match(NewMatch {
                    participants,
                    created_by,
                })?)
            })
            .await?;

        info!(
            "Declared {} match {} by {}",
            record.mode(),
            record.id.short(),
            created_by.short()
        );
        Ok(record)
    }

    /// Counterparty confirms the loss; ratings are applied.
    pub async fn confirm_loss(
        &self,
        actor: &Actor,
        match_id: MatchId,
    ) -> Result<Transition, LedgerError> {
        self.apply_event(actor, match_id, LifecycleEvent::ConfirmLoss).await
    }

    /// Counterparty refuses the declared result.
    pub async fn reject(&self, actor: &Actor, match_id: MatchId) -> Result<Transition, LedgerError> {
        self.apply_event(actor, match_id, LifecycleEvent::Reject).await
    }

    /// Administrator validates a pending or disputed match.
    pub async fn force_validate(
        &self,
        actor: &Actor,
        match_id: MatchId,
    ) -> Result<Transition, LedgerError> {
        self.apply_event(actor, match_id, LifecycleEvent::ForceValidate).await
    }

    /// Declarer accepts the refusal and closes the match.
    pub async fn accept_rejection(
        &self,
        actor: &Actor,
        match_id: MatchId,
    ) -> Result<Transition, LedgerError> {
        self.apply_event(actor, match_id, LifecycleEvent::AcceptRejection).await
    }

    /// Declarer contests the refusal.
    pub async fn dispute(&self, actor: &Actor, match_id: MatchId) -> Result<Transition, LedgerError> {
        self.apply_event(actor, match_id, LifecycleEvent::Dispute).await
    }

    /// Administrator upholds the refusal of a disputed match.
    pub async fn confirm_rejection(
        &self,
        actor: &Actor,
        match_id: MatchId,
    ) -> Result<Transition, LedgerError> {
        self.apply_event(actor, match_id, LifecycleEvent::ConfirmRejection).await
    }

    /// Administrator reverses a validated match using its stored gain.
    pub async fn revoke(&self, actor: &Actor, match_id: MatchId) -> Result<Transition, LedgerError> {
        self.apply_event(actor, match_id, LifecycleEvent::Revoke).await
    }

    /// Raise `event` on a match.
    #[instrument(skip(self, actor), fields(actor = %actor.id.short(), match_id = %match_id.short()))]
    pub async fn apply_event(
        &self,
        actor: &Actor,
        match_id: MatchId,
        event: LifecycleEvent,
    ) -> Result<Transition, LedgerError> {
        let engine = self.engine;
        let actor = *actor;

        let result = self
            .store
            .transaction(move |tables| -> Result<Transition, LedgerError> {
                let record = tables.fetch_match(match_id)?;
                authorize(&actor, &record, event)?;

                let to = match plan(record.status, event) {
                    Some(Step::Advance(to)) => to,
                    Some(Step::Unchanged) => {
                        debug!("Match already {}, nothing to do", record.status);
                        return Ok(Transition::unchanged(&record));
                    }
                    None => {
                        return Err(LedgerError::InvalidState {
                            match_id,
                            status: record.status,
                            action: event.action(),
                        })
                    }
                };

                let effect = event.rating_effect();
                let elo_gain = match effect {
                    RatingEffect::Apply => apply_result(tables, &engine, &record)?,
                    RatingEffect::Reverse => {
                        reverse_result(tables, &engine, &record)?;
                        record.elo_gain
                    }
                    RatingEffect::None => record.elo_gain,
                };

                tables.update_match(
                    match_id,
                    &MatchUpdate {
                        status: Some(to),
                        elo_gain: (effect == RatingEffect::Apply).then_some(elo_gain),
                    },
                )?;

                Ok(Transition {
                    match_id,
                    from: record.status,
                    to,
                    elo_gain,
                    ratings_changed: effect != RatingEffect::None,
                })
            })
            .await;

        match &result {
            Ok(t) if t.changed() => info!(
                "Match {}: {} -> {} (gain {})",
                match_id.short(),
                t.from,
                t.to,
                t.elo_gain
            ),
            Ok(_) => {}
            Err(e) => warn!("Could not {} on match {}: {}", event.action(), match_id.short(), e),
        }
        result
    }
}

// =============================================================================
// RATING APPLICATION
// =============================================================================

/// Both sides of a match, resolved to player rows.
struct Sides {
    winners: Vec<PlayerRecord>,
    losers: Vec<PlayerRecord>,
}

/// Fetch every participant. 1v1 reads the two rows one by one; 2v2 reads all
/// four in a single batch.
fn resolve_sides(tables: &dyn Tables, record: &MatchRecord) -> Result<Sides, LedgerError> {
    let ids = record.participants.all();
    let found = match record.participants {
        Participants::OneVOne { .. } => {
            let mut found = Vec::with_capacity(ids.len());
            for id in &ids {
                match tables.fetch_player(*id) {
                    Ok(player) => found.push(player),
                    Err(StoreError::PlayerNotFound(_)) => {}
                    Err(e) => return Err(e.into()),
                }
            }
            found
        }
        Participants::TwoVTwo { .. } => tables.fetch_players(&ids)?,
    };

    let pick = |side: Vec<PlayerId>| -> Result<Vec<PlayerRecord>, LedgerError> {
        side.into_iter()
            .map(|id| {
                found
                    .iter()
                    .find(|p| p.id == id)
                    .cloned()
                    .ok_or(LedgerError::UnresolvedParticipant {
                        match_id: record.id,
                        player: id,
                    })
            })
            .collect()
    };

    Ok(Sides {
        winners: pick(record.participants.winners())?,
        losers: pick(record.participants.losers())?,
    })
}

/// Compute the delta for a match from current standings and write it to
/// every participant. Returns the delta.
///
/// 1v1 feeds individual ratings and match counts to the engine. 2v2 feeds
/// the team averages with zero experience on both sides, and every member
/// of a side receives the full delta.
fn apply_result(
    tables: &mut dyn Tables,
    engine: &EloEngine,
    record: &MatchRecord,
) -> Result<i64, LedgerError> {
    let mode = record.mode();
    let initial = engine.config().initial_rating;
    let sides = resolve_sides(tables, record)?;

    let update = match mode {
        MatchMode::OneVOne => {
            let winner = &sides.winners[0];
            let loser = &sides.losers[0];
            engine.compute_new_ratings(
                winner.rating_1v1 as f64,
                loser.rating_1v1 as f64,
                i64::from(winner.matches_1v1),
                i64::from(loser.matches_1v1),
            )
        }
        MatchMode::TwoVTwo => {
            let average = |side: &[PlayerRecord]| {
                let ratings: Vec<Option<i64>> = side.iter().map(|p| p.rating_2v2).collect();
                team_average(&ratings, initial)
            };
            engine.compute_new_ratings(average(&sides.winners), average(&sides.losers), 0, 0)
        }
    };

    let delta = update.delta;
    for player in &sides.winners {
        let standing = PlayerUpdate::standing(
            mode,
            player.rating(mode, initial) + delta,
            player.matches(mode) + 1,
        );
        tables.update_player(player.id, &standing)?;
    }
    for player in &sides.losers {
        let standing = PlayerUpdate::standing(
            mode,
            player.rating(mode, initial) - delta,
            player.matches(mode) + 1,
        );
        tables.update_player(player.id, &standing)?;
    }

    debug!("Applied {} delta {} for match {}", mode, delta, record.id.short());
    Ok(delta)
}

/// Undo a validated match with its stored gain. Match counts floor at zero.
fn reverse_result(
    tables: &mut dyn Tables,
    engine: &EloEngine,
    record: &MatchRecord,
) -> Result<(), LedgerError> {
    let mode = record.mode();
    let initial = engine.config().initial_rating;
    let gain = record.elo_gain;
    let sides = resolve_sides(tables, record)?;

    for player in &sides.winners {
        let standing = PlayerUpdate::standing(
            mode,
            player.rating(mode, initial) - gain,
            player.matches(mode).saturating_sub(1),
        );
        tables.update_player(player.id, &standing)?;
    }
    for player in &sides.losers {
        let standing = PlayerUpdate::standing(
            mode,
            player.rating(mode, initial) + gain,
            player.matches(mode).saturating_sub(1),
        );
        tables.update_player(player.id, &standing)?;
    }

    debug!("Reversed {} gain {} for match {}", mode, gain, record.id.short());
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::error::{ErrorKind, Outcome};
    use crate::store::memory::MemoryStore;
    use crate::store::records::MatchFilter;
    use std::sync::Arc;

    type Ledger = MatchLedger<MemoryStore>;

    fn create_test_ledger() -> Ledger {
        MatchLedger::new(MemoryStore::new(), LedgerConfig::default())
    }

    async fn player(ledger: &Ledger, id: PlayerId) -> PlayerRecord {
        ledger
            .store()
            .transaction(|t| t.fetch_player(id))
            .await
            .unwrap()
    }

    async fn stored_match(ledger: &Ledger, id: MatchId) -> MatchRecord {
        ledger
            .store()
            .transaction(|t| t.fetch_match(id))
            .await
            .unwrap()
    }

    async fn set_player(ledger: &Ledger, id: PlayerId, update: PlayerUpdate) {
        ledger
            .store()
            .transaction(|t| t.update_player(id, &update))
            .await
            .unwrap();
    }

    async fn legacy_player(ledger: &Ledger, name: &str) -> Actor {
        let record = PlayerRecord {
            rating_2v2: None,
            ..PlayerRecord::new(PlayerId::random(), name, 1000)
        };
        let record = ledger
            .store()
            .transaction(move |t| t.insert_player(record))
            .await
            .unwrap();
        Actor::player(record.id)
    }

    async fn duel(ledger: &Ledger) -> (Actor, Actor, Actor) {
        let a = ledger.register_player("ana").await.unwrap();
        let b = ledger.register_player("bob").await.unwrap();
        let admin = Actor::admin(PlayerId::random());
        (Actor::player(a.id), Actor::player(b.id), admin)
    }

    async fn teams(ledger: &Ledger) -> [Actor; 4] {
        let mut actors = Vec::new();
        for name in ["ana", "bea", "cal", "dan"] {
            actors.push(Actor::player(ledger.register_player(name).await.unwrap().id));
        }
        [actors[0], actors[1], actors[2], actors[3]]
    }

    #[tokio::test]
    async fn test_declare_starts_pending() {
        let ledger = create_test_ledger();
        let (a, b, _) = duel(&ledger).await;

        let m = ledger
            .declare_match(&a, Participants::one_v_one(a.id, b.id))
            .await
            .unwrap();

        assert_eq!(m.status, MatchStatus::Pending);
        assert_eq!(m.elo_gain, 0);
        assert_eq!(m.created_by, a.id);
    }

    #[tokio::test]
    async fn test_declare_rejects_bad_participants() {
        let ledger = create_test_ledger();
        let (a, b, _) = duel(&ledger).await;

        let same = ledger.declare_match(&a, Participants::one_v_one(a.id, a.id)).await;
        assert_eq!(same.unwrap_err().kind(), ErrorKind::InvalidInput);

        let ghost = PlayerId::random();
        let missing = ledger.declare_match(&a, Participants::one_v_one(a.id, ghost)).await;
        assert_eq!(missing, Err(LedgerError::PlayerNotFound(ghost)));

        let for_other = ledger.declare_match(&a, Participants::one_v_one(b.id, a.id)).await;
        assert_eq!(for_other.unwrap_err().kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn test_confirm_loss_applies_ratings() {
        let ledger = create_test_ledger();
        let (a, b, _) = duel(&ledger).await;
        let m = ledger.declare_match(&a, Participants::one_v_one(a.id, b.id)).await.unwrap();

        let t = ledger.confirm_loss(&b, m.id).await.unwrap();
        assert_eq!(t.to, MatchStatus::Validated);
        assert_eq!(t.elo_gain, 20);

        let winner = player(&ledger, a.id).await;
        let loser = player(&ledger, b.id).await;
        assert_eq!((winner.rating_1v1, winner.matches_1v1), (1020, 1));
        assert_eq!((loser.rating_1v1, loser.matches_1v1), (980, 1));
        assert_eq!(winner.rating_2v2, Some(1000));
        assert_eq!(stored_match(&ledger, m.id).await.elo_gain, 20);
    }

    #[tokio::test]
    async fn test_winner_experience_drives_k() {
        let ledger = create_test_ledger();
        let (a, b, _) = duel(&ledger).await;
        set_player(&ledger, a.id, PlayerUpdate::standing(MatchMode::OneVOne, 1000, 31)).await;

        let m = ledger.declare_match(&a, Participants::one_v_one(a.id, b.id)).await.unwrap();
        let t = ledger.confirm_loss(&b, m.id).await.unwrap();

        assert_eq!(t.elo_gain, 5);
        assert_eq!(player(&ledger, a.id).await.matches_1v1, 32);
    }

    #[tokio::test]
    async fn test_only_counterparty_confirms() {
        let ledger = create_test_ledger();
        let (a, b, _) = duel(&ledger).await;
        let m = ledger.declare_match(&a, Participants::one_v_one(a.id, b.id)).await.unwrap();

        let err = ledger.confirm_loss(&a, m.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        assert_eq!(stored_match(&ledger, m.id).await.status, MatchStatus::Pending);
    }

    #[tokio::test]
    async fn test_revalidation_is_noop() {
        let ledger = create_test_ledger();
        let (a, b, admin) = duel(&ledger).await;
        let m = ledger.declare_match(&a, Participants::one_v_one(a.id, b.id)).await.unwrap();

        ledger.confirm_loss(&b, m.id).await.unwrap();
        let second = ledger.confirm_loss(&b, m.id).await.unwrap();
        let forced = ledger.force_validate(&admin, m.id).await.unwrap();

        assert!(!second.changed());
        assert!(!second.ratings_changed);
        assert!(!forced.changed());
        assert_eq!(player(&ledger, a.id).await.rating_1v1, 1020);
        assert_eq!(player(&ledger, a.id).await.matches_1v1, 1);

        let outcome: Outcome = Ok::<_, LedgerError>(second).into();
        assert!(outcome.success);
        assert_eq!(outcome.message, "Match already validated.");
    }

    #[tokio::test]
    async fn test_revoke_restores_exact_standings() {
        let ledger = create_test_ledger();
        let (a, b, admin) = duel(&ledger).await;
        set_player(&ledger, a.id, PlayerUpdate::standing(MatchMode::OneVOne, 937, 12)).await;
        set_player(&ledger, b.id, PlayerUpdate::standing(MatchMode::OneVOne, 1113, 40)).await;
        let before_a = player(&ledger, a.id).await;
        let before_b = player(&ledger, b.id).await;

        let m = ledger.declare_match(&a, Participants::one_v_one(a.id, b.id)).await.unwrap();
        ledger.confirm_loss(&b, m.id).await.unwrap();
        let t = ledger.revoke(&admin, m.id).await.unwrap();

        assert_eq!(t.to, MatchStatus::Revoked);
        assert_eq!(player(&ledger, a.id).await, before_a);
        assert_eq!(player(&ledger, b.id).await, before_b);
    }

    #[tokio::test]
    async fn test_revoke_requires_validated() {
        let ledger = create_test_ledger();
        let (a, b, admin) = duel(&ledger).await;
        let m = ledger.declare_match(&a, Participants::one_v_one(a.id, b.id)).await.unwrap();

        let err = ledger.revoke(&admin, m.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);

        ledger.confirm_loss(&b, m.id).await.unwrap();
        ledger.revoke(&admin, m.id).await.unwrap();
        let again = ledger.revoke(&admin, m.id).await.unwrap_err();
        assert_eq!(again.kind(), ErrorKind::InvalidStateTransition);
        assert_eq!(player(&ledger, a.id).await.rating_1v1, 1000);
    }

    #[tokio::test]
    async fn test_revoke_floors_match_count() {
        let ledger = create_test_ledger();
        let (a, b, admin) = duel(&ledger).await;
        let m = ledger.declare_match(&a, Participants::one_v_one(a.id, b.id)).await.unwrap();
        ledger.confirm_loss(&b, m.id).await.unwrap();

        set_player(&ledger, b.id, PlayerUpdate::standing(MatchMode::OneVOne, 980, 0)).await;
        ledger.revoke(&admin, m.id).await.unwrap();

        let loser = player(&ledger, b.id).await;
        assert_eq!(loser.matches_1v1, 0);
        assert_eq!(loser.rating_1v1, 1000);
    }

    #[tokio::test]
    async fn test_rejection_paths() {
        let ledger = create_test_ledger();
        let (a, b, admin) = duel(&ledger).await;

        let closed = ledger.declare_match(&a, Participants::one_v_one(a.id, b.id)).await.unwrap();
        ledger.reject(&b, closed.id).await.unwrap();
        let t = ledger.accept_rejection(&a, closed.id).await.unwrap();
        assert_eq!(t.to, MatchStatus::RejectedConfirmed);

        let contested = ledger.declare_match(&a, Participants::one_v_one(a.id, b.id)).await.unwrap();
        ledger.reject(&b, contested.id).await.unwrap();
        ledger.dispute(&a, contested.id).await.unwrap();
        let upheld = ledger.confirm_rejection(&admin, contested.id).await.unwrap();
        assert_eq!(upheld.to, MatchStatus::Rejected);
        assert_eq!(
            Outcome::from(Ok::<_, LedgerError>(upheld)).message,
            "Rejection confirmed by an administrator."
        );

        assert_eq!(player(&ledger, a.id).await.rating_1v1, 1000);
        assert_eq!(player(&ledger, b.id).await.matches_1v1, 0);
    }

    #[tokio::test]
    async fn test_dispute_resolved_by_force_validation() {
        let ledger = create_test_ledger();
        let (a, b, admin) = duel(&ledger).await;
        let m = ledger.declare_match(&a, Participants::one_v_one(a.id, b.id)).await.unwrap();

        ledger.reject(&b, m.id).await.unwrap();
        ledger.dispute(&a, m.id).await.unwrap();

        let denied = ledger.force_validate(&a, m.id).await.unwrap_err();
        assert_eq!(denied.kind(), ErrorKind::Forbidden);

        let t = ledger.force_validate(&admin, m.id).await.unwrap();
        assert_eq!((t.from, t.to), (MatchStatus::Disputed, MatchStatus::Validated));
        assert_eq!(player(&ledger, a.id).await.rating_1v1, 1020);
    }

    #[tokio::test]
    async fn test_missing_match() {
        let ledger = create_test_ledger();
        let (_, b, _) = duel(&ledger).await;
        let id = MatchId::random();

        let err = ledger.confirm_loss(&b, id).await.unwrap_err();
        assert_eq!(err, LedgerError::MatchNotFound(id));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_two_v_two_team_averages() {
        let ledger = create_test_ledger();
        let [a, b, c, d] = teams(&ledger).await;
        set_player(&ledger, a.id, PlayerUpdate::standing(MatchMode::TwoVTwo, 1100, 3)).await;
        set_player(&ledger, b.id, PlayerUpdate::standing(MatchMode::TwoVTwo, 1000, 40)).await;

        let m = ledger
            .declare_match(&a, Participants::two_v_two([a.id, b.id], [c.id, d.id]))
            .await
            .unwrap();
        let t = ledger.confirm_loss(&d, m.id).await.unwrap();

        // Team 1050 vs 1000, K fixed at 40 regardless of experience.
        let expected = crate::rating::elo::compute_new_ratings(1050.0, 1000.0, 0, 0).delta;
        assert_eq!(t.elo_gain, expected);

        let a_after = player(&ledger, a.id).await;
        let b_after = player(&ledger, b.id).await;
        let c_after = player(&ledger, c.id).await;
        assert_eq!(a_after.rating_2v2, Some(1100 + expected));
        assert_eq!(b_after.rating_2v2, Some(1000 + expected));
        assert_eq!(c_after.rating_2v2, Some(1000 - expected));
        assert_eq!((a_after.matches_2v2, b_after.matches_2v2, c_after.matches_2v2), (4, 41, 1));
        assert_eq!(a_after.rating_1v1, 1000);
        assert_eq!(a_after.matches_1v1, 0);
    }

    #[tokio::test]
    async fn test_two_v_two_missing_rating_defaults() {
        let ledger = create_test_ledger();
        let [a, b, c, _] = teams(&ledger).await;
        let legacy = legacy_player(&ledger, "eve").await;
        set_player(&ledger, c.id, PlayerUpdate::standing(MatchMode::TwoVTwo, 1200, 0)).await;

        let m = ledger
            .declare_match(&a, Participants::two_v_two([a.id, legacy.id], [b.id, c.id]))
            .await
            .unwrap();
        let t = ledger.confirm_loss(&c, m.id).await.unwrap();

        // Absent team rating counts as 1000: 1000 vs 1100.
        let expected = crate::rating::elo::compute_new_ratings(1000.0, 1100.0, 0, 0).delta;
        assert_eq!(t.elo_gain, expected);
        assert_eq!(player(&ledger, legacy.id).await.rating_2v2, Some(1000 + expected));

        let mut total = 0;
        for actor in [a, legacy, b, c] {
            total += player(&ledger, actor.id).await.rating_2v2.unwrap_or(1000);
        }
        assert_eq!(total, 1000 + 1000 + 1000 + 1200);
    }

    #[tokio::test]
    async fn test_two_v_two_revoke_roundtrip() {
        let ledger = create_test_ledger();
        let [a, b, c, d] = teams(&ledger).await;
        let admin = Actor::admin(PlayerId::random());
        set_player(&ledger, d.id, PlayerUpdate::standing(MatchMode::TwoVTwo, 1240, 9)).await;

        let mut before = Vec::new();
        for actor in [a, b, c, d] {
            before.push(player(&ledger, actor.id).await);
        }

        let m = ledger
            .declare_match(&a, Participants::two_v_two([a.id, b.id], [c.id, d.id]))
            .await
            .unwrap();
        ledger.force_validate(&admin, m.id).await.unwrap();
        ledger.revoke(&admin, m.id).await.unwrap();

        for (actor, expected) in [a, b, c, d].iter().zip(before) {
            assert_eq!(player(&ledger, actor.id).await, expected);
        }
    }

    #[tokio::test]
    async fn test_teammate_may_dispute() {
        let ledger = create_test_ledger();
        let [a, b, c, d] = teams(&ledger).await;
        let m = ledger
            .declare_match(&a, Participants::two_v_two([a.id, b.id], [c.id, d.id]))
            .await
            .unwrap();

        ledger.reject(&d, m.id).await.unwrap();
        let t = ledger.dispute(&b, m.id).await.unwrap();
        assert_eq!(t.to, MatchStatus::Disputed);
    }

    #[tokio::test]
    async fn test_store_failure_rolls_back() {
        let ledger = create_test_ledger();
        let (a, b, _) = duel(&ledger).await;
        let m = ledger.declare_match(&a, Participants::one_v_one(a.id, b.id)).await.unwrap();

        // Winner write succeeds, loser write fails.
        ledger.store().fail_after_writes(1).await;
        let err = ledger.confirm_loss(&b, m.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StoreFailure);

        ledger.store().clear_faults().await;
        assert_eq!(player(&ledger, a.id).await.rating_1v1, 1000);
        assert_eq!(player(&ledger, b.id).await.rating_1v1, 1000);
        assert_eq!(stored_match(&ledger, m.id).await.status, MatchStatus::Pending);

        let outcome: Outcome = ledger.confirm_loss(&b, m.id).await.into();
        assert!(outcome.success, "{}", outcome.message);
    }

    #[tokio::test]
    async fn test_unresolved_participant() {
        let ledger = create_test_ledger();
        let (a, _, admin) = duel(&ledger).await;
        let ghost = PlayerId::random();
        let m = ledger
            .store()
            .transaction(|t| {
                t.insert_match(NewMatch {
                    participants: Participants::one_v_one(a.id, ghost),
                    created_by: a.id,
                })
            })
            .await
            .unwrap();

        let err = ledger.force_validate(&admin, m.id).await.unwrap_err();
        assert_eq!(
            err,
            LedgerError::UnresolvedParticipant { match_id: m.id, player: ghost }
        );
        assert_eq!(player(&ledger, a.id).await.rating_1v1, 1000);
    }

    #[tokio::test]
    async fn test_concurrent_validation_applies_once() {
        let ledger = Arc::new(create_test_ledger());
        let (a, b, admin) = duel(&ledger).await;
        let m = ledger.declare_match(&a, Participants::one_v_one(a.id, b.id)).await.unwrap();
        let match_id = m.id;

        let mut handles = Vec::new();
        for i in 0..8 {
            let ledger = ledger.clone();
            let actor = if i % 2 == 0 { admin } else { b };
            handles.push(tokio::spawn(async move {
                if actor.is_admin {
                    ledger.force_validate(&actor, match_id).await
                } else {
                    ledger.confirm_loss(&actor, match_id).await
                }
            }));
        }

        let mut advanced = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap().changed() {
                advanced += 1;
            }
        }

        assert_eq!(advanced, 1);
        assert_eq!(player(&ledger, a.id).await.rating_1v1, 1020);
        assert_eq!(player(&ledger, b.id).await.matches_1v1, 1);
        let validated = ledger
            .store()
            .transaction(|t| t.fetch_matches(&MatchFilter::with_status(MatchStatus::Validated)))
            .await
            .unwrap();
        assert_eq!(validated.len(), 1);
    }
}
