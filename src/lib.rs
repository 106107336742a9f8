//! Coopvote
//!
//! Time-boxed resolutions for housing cooperatives: direct and proxy
//! ballots, live tallies and per-member detail, isolated per cooperative.

/// Module version information
pub mod version {
    /// The current version of the coopvote library
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
}

/// Shared building blocks
pub mod core {
    pub use coopvote_common as common;
    pub use coopvote_storage as storage;
}

/// Identity and voting
pub mod systems {
    pub use coopvote_governance as governance;
    pub use coopvote_identity as identity;
}

pub use coopvote_governance::{
    ErrorKind, ErrorReport, GovernanceError, ResolutionDraft, Tally, VoteRequest, VotingService,
};
pub use coopvote_identity::{CallerContext, Role};
