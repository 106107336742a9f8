//! Identity for coopvote
//!
//! Everything the voting core needs to know about *who* is calling: the
//! explicit caller context handed to every operation, the role model with its
//! single capability predicate, the member directory of each cooperative,
//! and the token gate that builds a caller context at the request boundary.

use thiserror::Error;

use coopvote_storage::StorageError;

pub mod context;
pub mod directory;
pub mod gate;

pub use context::{can_manage_resolutions, CallerContext, Role};
pub use directory::{Member, MemberDirectory, MemberRegistry};
pub use gate::{AccessGate, AccessRequest};

/// Error types for identity operations
#[derive(Error, Debug)]
pub enum IdentityError {
    /// Caller could not be authenticated
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Malformed identity field
    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),

    /// Stored member record could not be decoded
    #[error("Invalid member data: {0}")]
    InvalidMemberData(String),

    /// Error with storage
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<coopvote_common::Error> for IdentityError {
    fn from(err: coopvote_common::Error) -> Self {
        match err {
            coopvote_common::Error::Validation(msg) => IdentityError::InvalidIdentity(msg),
            other => IdentityError::InvalidIdentity(other.to_string()),
        }
    }
}

/// Result type for identity operations
pub type IdentityResult<T> = Result<T, IdentityError>;
