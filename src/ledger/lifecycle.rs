//! Match Lifecycle
//!
//! The status machine on its own: which event moves which status where,
//! who may raise it, and what it does to ratings. No store access here.
//!
//! ```text
//!            confirm loss / force validate           revoke
//!  pending ─────────────────────────────────▶ validated ──────▶ revoked
//!     │                                          ▲
//!     │ reject                    force validate │
//!     ▼              dispute                     │
//!  rejected ─────────────────────────────▶ disputed
//!     │      ◀─────────────────────────────
//!     │           confirm rejection
//!     │ accept rejection
//!     ▼
//!  rejected_confirmed
//! ```

use serde::{Deserialize, Serialize};

use crate::core::ids::PlayerId;
use crate::ledger::error::LedgerError;
use crate::store::records::{MatchRecord, MatchStatus, PlayerRecord};

// =============================================================================
// ACTOR
// =============================================================================

/// Who is performing an operation. Passed explicitly, never read from
/// ambient session state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Acting player.
    pub id: PlayerId,
    /// Administrator privilege.
    pub is_admin: bool,
}

impl Actor {
    /// A regular player.
    pub const fn player(id: PlayerId) -> Self {
        Self { id, is_admin: false }
    }

    /// An administrator.
    pub const fn admin(id: PlayerId) -> Self {
        Self { id, is_admin: true }
    }

    /// Maintenance identity for operator tooling.
    pub const fn system() -> Self {
        Self::admin(PlayerId::nil())
    }

    /// Actor for a stored player, privilege taken from the record.
    pub fn from_record(player: &PlayerRecord) -> Self {
        Self {
            id: player.id,
            is_admin: player.is_admin,
        }
    }
}

// =============================================================================
// EVENTS
// =============================================================================

/// Something that happens to a declared match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// Counterparty confirms the loss.
    ConfirmLoss,
    /// Counterparty refuses the declared result.
    Reject,
    /// Administrator validates a pending or disputed match.
    ForceValidate,
    /// Declarer accepts the refusal.
    AcceptRejection,
    /// Declarer contests the refusal.
    Dispute,
    /// Administrator upholds the refusal of a disputed match.
    ConfirmRejection,
    /// Administrator reverses a validated match.
    Revoke,
}

/// Role an event requires.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// A member of the losing side.
    Counterparty,
    /// The declaring player or a member of the winning side.
    Declarer,
    /// An administrator.
    Administrator,
}

/// What an event does to ratings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RatingEffect {
    /// Nothing.
    None,
    /// Compute and apply a fresh delta.
    Apply,
    /// Reverse the stored delta.
    Reverse,
}

/// Result of looking an event up in the transition table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// Move to a new status.
    Advance(MatchStatus),
    /// Already where the event would lead; nothing to do.
    Unchanged,
}

impl LifecycleEvent {
    /// Verb phrase used in messages.
    pub fn action(self) -> &'static str {
        match self {
            LifecycleEvent::ConfirmLoss => "confirm the loss",
            LifecycleEvent::Reject => "reject the match",
            LifecycleEvent::ForceValidate => "force validation",
            LifecycleEvent::AcceptRejection => "accept the rejection",
            LifecycleEvent::Dispute => "dispute the rejection",
            LifecycleEvent::ConfirmRejection => "confirm the rejection",
            LifecycleEvent::Revoke => "revoke the match",
        }
    }

    /// Role required to raise the event.
    pub fn required_role(self) -> Role {
        match self {
            LifecycleEvent::ConfirmLoss | LifecycleEvent::Reject => Role::Counterparty,
            LifecycleEvent::AcceptRejection | LifecycleEvent::Dispute => Role::Declarer,
            LifecycleEvent::ForceValidate
            | LifecycleEvent::ConfirmRejection
            | LifecycleEvent::Revoke => Role::Administrator,
        }
    }

    /// Rating effect when the event advances the match.
    pub fn rating_effect(self) -> RatingEffect {
        match self {
            LifecycleEvent::ConfirmLoss | LifecycleEvent::ForceValidate => RatingEffect::Apply,
            LifecycleEvent::Revoke => RatingEffect::Reverse,
            _ => RatingEffect::None,
        }
    }
}

/// Look up `event` from `status`. `None` means the event is not allowed.
///
/// Validating an already validated match is `Unchanged` so retries and
/// double clicks apply ratings once.
pub fn plan(status: MatchStatus, event: LifecycleEvent) -> Option<Step> {
    use LifecycleEvent as E;
    use MatchStatus as S;

    let next = match (status, event) {
        (S::Validated, E::ConfirmLoss | E::ForceValidate) => return Some(Step::Unchanged),
        (S::Pending, E::ConfirmLoss) => S::Validated,
        (S::Pending, E::Reject) => S::Rejected,
        (S::Pending | S::Disputed, E::ForceValidate) => S::Validated,
        (S::Rejected, E::AcceptRejection) => S::RejectedConfirmed,
        (S::Rejected, E::Dispute) => S::Disputed,
        (S::Disputed, E::ConfirmRejection) => S::Rejected,
        (S::Validated, E::Revoke) => S::Revoked,
        _ => return None,
    };
    Some(Step::Advance(next))
}

/// Statuses no event leads out of.
pub fn is_terminal(status: MatchStatus) -> bool {
    matches!(status, MatchStatus::RejectedConfirmed | MatchStatus::Revoked)
}

/// Check that `actor` holds the role `event` needs on `record`.
pub fn authorize(
    actor: &Actor,
    record: &MatchRecord,
    event: LifecycleEvent,
) -> Result<(), LedgerError> {
    let allowed = match event.required_role() {
        Role::Counterparty => record.participants.is_loser(actor.id),
        Role::Declarer => {
            record.created_by == actor.id || record.participants.is_winner(actor.id)
        }
        Role::Administrator => actor.is_admin,
    };

    if allowed {
        Ok(())
    } else {
        Err(LedgerError::Forbidden {
            actor: actor.id,
            action: event.action(),
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
