//! Governance module for coopvote
//!
//! Time-boxed resolutions voted on by the members of a cooperative, either
//! directly or through a proxy. The pieces, leaf first:
//!
//! - [`store`]: persistent, scope-isolated resolution records
//! - [`lifecycle`]: derives Open/Closed from creation time and duration
//! - [`delegation`]: validates proxy targets against the member directory
//! - [`ballots`]: applies a direct or proxy vote to a ballot book
//! - [`tally`]: counts per option and per-member detail
//! - [`service`]: the operation boundary tying them together

use serde::Serialize;
use thiserror::Error;

use coopvote_identity::IdentityError;
use coopvote_storage::StorageError;

pub mod ballots;
pub mod delegation;
pub mod lifecycle;
pub mod resolution;
pub mod service;
pub mod store;
pub mod tally;

pub use lifecycle::{ResolutionListing, Status};
pub use resolution::{Ballot, BallotBook, BallotKey, Resolution, ResolutionId, VoteOption};
pub use service::{ResolutionDraft, VoteRequest, VotingService};
pub use store::ResolutionStore;
pub use tally::{DetailEntry, DetailOption, Tally};

/// Error types for governance operations
#[derive(Error, Debug)]
pub enum GovernanceError {
    /// Missing or malformed input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Caller lacks the role or scope for the operation
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Resolution absent, or owned by another scope
    #[error("Resolution not found: {0}")]
    ResolutionNotFound(String),

    /// Operation not allowed in the resolution's current state
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Conditional update kept losing to concurrent writers
    #[error("Concurrent update: {0}")]
    Concurrency(String),

    /// Error with storage
    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    /// Error with the identity system
    #[error("Identity error: {0}")]
    IdentityError(#[from] IdentityError),

    /// Unexpected failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GovernanceError {
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        GovernanceError::Validation(msg.into())
    }

    pub fn permission_denied<S: Into<String>>(msg: S) -> Self {
        GovernanceError::PermissionDenied(msg.into())
    }

    pub fn not_found<S: Into<String>>(id: S) -> Self {
        GovernanceError::ResolutionNotFound(id.into())
    }

    pub fn conflict<S: Into<String>>(msg: S) -> Self {
        GovernanceError::Conflict(msg.into())
    }

    /// Category reported to callers
    pub fn kind(&self) -> ErrorKind {
        match self {
            GovernanceError::Validation(_) => ErrorKind::Validation,
            GovernanceError::PermissionDenied(_) => ErrorKind::Authorization,
            GovernanceError::ResolutionNotFound(_) => ErrorKind::NotFound,
            GovernanceError::Conflict(_) => ErrorKind::Conflict,
            GovernanceError::Concurrency(_) => ErrorKind::Concurrency,
            GovernanceError::IdentityError(IdentityError::Unauthorized(_)) => ErrorKind::Authorization,
            GovernanceError::IdentityError(IdentityError::InvalidIdentity(_)) => ErrorKind::Validation,
            GovernanceError::IdentityError(_)
            | GovernanceError::StorageError(_)
            | GovernanceError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Structured form for transport. Internal details stay in the logs.
    pub fn report(&self) -> ErrorReport {
        let message = match self.kind() {
            ErrorKind::Internal => "Internal error".to_string(),
            _ => self.to_string(),
        };
        ErrorReport {
            kind: self.kind(),
            message,
        }
    }
}

impl From<coopvote_common::Error> for GovernanceError {
    fn from(err: coopvote_common::Error) -> Self {
        match err {
            coopvote_common::Error::Validation(msg) => GovernanceError::Validation(msg),
            other => GovernanceError::Internal(other.to_string()),
        }
    }
}

/// Result type for governance operations
pub type GovernanceResult<T> = Result<T, GovernanceError>;

/// Error taxonomy exposed at the operation boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Authorization,
    NotFound,
    Conflict,
    Concurrency,
    Internal,
}

/// A failed operation as returned to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(GovernanceError::validation("x").kind(), ErrorKind::Validation);
        assert_eq!(GovernanceError::not_found("x").kind(), ErrorKind::NotFound);
        assert_eq!(
            GovernanceError::from(IdentityError::Unauthorized("x".into())).kind(),
            ErrorKind::Authorization
        );
        assert_eq!(
            GovernanceError::from(StorageError::IoError("disk".into())).kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn test_internal_report_hides_details() {
        let report = GovernanceError::from(StorageError::IoError("/var/lib/secret".into())).report();
        assert_eq!(report.kind, ErrorKind::Internal);
        assert!(!report.message.contains("secret"));

        let report = GovernanceError::conflict("Resolution is closed").report();
        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            serde_json::json!({"kind": "conflict", "message": "Conflict: Resolution is closed"})
        );
    }
}
