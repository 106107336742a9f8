//! Common utilities and types for coopvote
//!
//! Shared by every crate in the workspace: the base error type, identifier
//! newtypes, the clock abstraction, configuration loading and logging setup.

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod types;
pub mod validation;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Configuration, VotingConfig};
pub use error::{Error, Result};
pub use types::{MemberId, ScopeId};
