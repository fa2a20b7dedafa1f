use crate::*;

use thiserror::Error;
use uuid::Uuid;

/// Error types
///
/// Every variant maps to a stable machine-readable code (see [`Error::code`]).
/// Only [`Error::Unavailable`] is safe to retry without changing the request.
#[derive(Debug, Error)]
pub enum Error {
    #[error("irisvote: voter {0} not found")]
    VoterNotFound(String),

    #[error("irisvote: no registered identity for public key hash {0}")]
    IdentityNotFound(String),

    #[error("irisvote: election {0} not found")]
    ElectionNotFound(Uuid),

    #[error("irisvote: vote {0} not found")]
    VoteNotFound(Uuid),

    #[error("irisvote: voter already registered")]
    DuplicateVoter,

    #[error("irisvote: voter already cast a vote for this election")]
    DuplicateVote,

    #[error("irisvote: no active session: {0}")]
    NoSession(&'static str),

    #[error("irisvote: verification failed: {0}")]
    Verification(&'static str),

    #[error("irisvote: candidate {0} is not on the ballot")]
    InvalidCandidate(String),

    #[error("irisvote: election is not open: {0}")]
    ElectionNotOpen(&'static str),

    #[error("irisvote: invalid election status transition from {from} to {to}")]
    InvalidTransition {
        from: ElectionStatus,
        to: ElectionStatus,
    },

    #[error("irisvote: vote already attached to transaction {0}")]
    Conflict(String),

    #[error("irisvote: service unavailable: {0}")]
    Unavailable(String),

    #[error("irisvote: invalid request: {0}")]
    InvalidRequest(String),
}

impl Error {
    /// Stable error code surfaced to API callers
    pub fn code(&self) -> &'static str {
        match self {
            Error::VoterNotFound(_)
            | Error::IdentityNotFound(_)
            | Error::ElectionNotFound(_)
            | Error::VoteNotFound(_) => "not_found",
            Error::DuplicateVoter | Error::DuplicateVote => "duplicate",
            Error::NoSession(_) => "no_session",
            Error::Verification(_) => "verification_failed",
            Error::InvalidCandidate(_) => "invalid_candidate",
            Error::ElectionNotOpen(_) => "election_not_open",
            Error::InvalidTransition { .. } => "invalid_transition",
            Error::Conflict(_) => "conflict",
            Error::Unavailable(_) => "unavailable",
            Error::InvalidRequest(_) => "invalid_request",
        }
    }

    /// Transient storage or verifier failures can be retried as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Unavailable(_))
    }

    pub fn is_not_found(&self) -> bool {
        self.code() == "not_found"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(Error::DuplicateVoter.code(), "duplicate");
        assert_eq!(Error::DuplicateVote.code(), "duplicate");
        assert_eq!(Error::VoteNotFound(Uuid::nil()).code(), "not_found");
        assert_eq!(Error::NoSession("none").code(), "no_session");
        assert_eq!(
            Error::InvalidTransition {
                from: ElectionStatus::Closed,
                to: ElectionStatus::Active
            }
            .code(),
            "invalid_transition"
        );

        assert!(Error::Unavailable("timeout".into()).is_retryable());
        assert!(!Error::DuplicateVote.is_retryable());
        assert!(!Error::Verification("bad signature").is_retryable());
    }
}
