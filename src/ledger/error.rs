//! Ledger errors and the `(success, message)` boundary type.

use thiserror::Error;

use crate::core::ids::{MatchId, PlayerId};
use crate::store::records::MatchStatus;
use crate::store::StoreError;

/// Coarse classification of a [`LedgerError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// A referenced match or player does not exist.
    NotFound,
    /// The match is not in a state that allows the operation.
    InvalidStateTransition,
    /// The actor lacks the role the operation needs.
    Forbidden,
    /// The request itself is malformed.
    InvalidInput,
    /// The record store refused a read or write.
    StoreFailure,
}

/// Ledger errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    /// No match with this id.
    #[error("match {0} not found")]
    MatchNotFound(MatchId),

    /// No player with this id.
    #[error("player {0} not found")]
    PlayerNotFound(PlayerId),

    /// No player with this display name.
    #[error("no player named {0}")]
    UnknownUsername(String),

    /// The match status does not allow the requested event.
    #[error("match {match_id} is {status}; cannot {action}")]
    InvalidState {
        /// Match concerned.
        match_id: MatchId,
        /// Its current status.
        status: MatchStatus,
        /// What was attempted.
        action: &'static str,
    },

    /// A participant of an existing match no longer resolves to a player.
    #[error("participant {player} of match {match_id} can no longer be resolved")]
    UnresolvedParticipant {
        /// Match concerned.
        match_id: MatchId,
        /// Missing player.
        player: PlayerId,
    },

    /// The actor is not allowed to perform the action.
    #[error("player {actor} may not {action}")]
    Forbidden {
        /// Acting player.
        actor: PlayerId,
        /// What was attempted.
        action: &'static str,
    },

    /// The declared match is malformed.
    #[error("invalid match declaration: {0}")]
    InvalidDeclaration(String),

    /// The record store failed.
    #[error("record store failure: {0}")]
    Store(StoreError),
}

impl LedgerError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::MatchNotFound(_)
            | LedgerError::PlayerNotFound(_)
            | LedgerError::UnknownUsername(_) => ErrorKind::NotFound,
            LedgerError::InvalidState { .. } | LedgerError::UnresolvedParticipant { .. } => {
                ErrorKind::InvalidStateTransition
            }
            LedgerError::Forbidden { .. } => ErrorKind::Forbidden,
            LedgerError::InvalidDeclaration(_) => ErrorKind::InvalidInput,
            LedgerError::Store(StoreError::DuplicateName(_) | StoreError::DuplicateId(_)) => {
                ErrorKind::InvalidInput
            }
            LedgerError::Store(_) => ErrorKind::StoreFailure,
        }
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::PlayerNotFound(id) => LedgerError::PlayerNotFound(id),
            StoreError::MatchNotFound(id) => LedgerError::MatchNotFound(id),
            other => LedgerError::Store(other),
        }
    }
}

// =============================================================================
// OUTCOME
// =============================================================================

/// Human-readable description of a successful operation.
pub trait Summary {
    /// One-line message for the caller.
    fn summary(&self) -> String;
}

/// Result of an operation flattened for a view layer: never an error,
/// always a message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outcome {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Message to display.
    pub message: String,
}

impl Outcome {
    /// Failed outcome carrying the error text.
    pub fn failure(err: &LedgerError) -> Self {
        Self {
            success: false,
            message: err.to_string(),
        }
    }
}

impl<T: Summary> From<Result<T, LedgerError>> for Outcome {
    fn from(result: Result<T, LedgerError>) -> Self {
        match result {
            Ok(value) => Self {
                success: true,
                message: value.summary(),
            },
            Err(err) => Self::failure(&err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Done;

    impl Summary for Done {
        fn summary(&self) -> String {
            "done".into()
        }
    }

    #[test]
    fn test_store_not_found_maps_to_ledger_not_found() {
        let id = PlayerId::random();
        let err: LedgerError = StoreError::PlayerNotFound(id).into();
        assert_eq!(err, LedgerError::PlayerNotFound(id));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_store_failure_kind() {
        let err: LedgerError = StoreError::Unavailable("down".into()).into();
        assert_eq!(err.kind(), ErrorKind::StoreFailure);
    }

    #[test]
    fn test_outcome_from_result() {
        let ok: Outcome = Ok::<_, LedgerError>(Done).into();
        assert_eq!(ok, Outcome { success: true, message: "done".into() });

        let id = MatchId::random();
        let failed: Outcome = Err::<Done, _>(LedgerError::InvalidState {
            match_id: id,
            status: MatchStatus::Pending,
            action: "revoke",
        })
        .into();
        assert!(!failed.success);
        assert!(failed.message.contains("is pending; cannot revoke"));
    }
}
