//! Open/closed status of resolutions
//!
//! Status is never stored. It is derived from `createdAt + durationMinutes`
//! against the current time, and every caller goes through [`status`].

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::{GovernanceError, GovernanceResult, Resolution};

/// Derived lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Open,
    Closed,
}

/// Instant at which the resolution stops accepting changes
pub fn closes_at(resolution: &Resolution) -> DateTime<Utc> {
    resolution.created_at + Duration::minutes(i64::from(resolution.duration_minutes))
}

pub fn status(resolution: &Resolution, now: DateTime<Utc>) -> Status {
    if now < closes_at(resolution) {
        Status::Open
    } else {
        Status::Closed
    }
}

pub fn is_open(resolution: &Resolution, now: DateTime<Utc>) -> bool {
    status(resolution, now) == Status::Open
}

/// Time left before closing, zero once closed
pub fn remaining(resolution: &Resolution, now: DateTime<Utc>) -> Duration {
    let left = closes_at(resolution) - now;
    if left > Duration::zero() {
        left
    } else {
        Duration::zero()
    }
}

/// Gate for mutating operations
pub fn ensure_open(resolution: &Resolution, now: DateTime<Utc>) -> GovernanceResult<()> {
    match status(resolution, now) {
        Status::Open => Ok(()),
        Status::Closed => Err(GovernanceError::conflict(format!(
            "resolution {} closed at {}",
            resolution.id,
            closes_at(resolution).to_rfc3339()
        ))),
    }
}

/// Resolutions of one scope split by status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionListing {
    pub active: Vec<Resolution>,
    pub past: Vec<Resolution>,
}

impl ResolutionListing {
    /// Split `resolutions` by status at `now`, keeping their relative order
    pub fn partition(resolutions: Vec<Resolution>, now: DateTime<Utc>) -> Self {
        let (active, past) = resolutions.into_iter().partition(|r| is_open(r, now));
        Self { active, past }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BallotBook, ResolutionId};
    use chrono::TimeZone;
    use coopvote_common::ScopeId;

    fn resolution(created_at: DateTime<Utc>, minutes: u32) -> Resolution {
        Resolution {
            id: ResolutionId::new(),
            title: "Adopt budget".to_string(),
            details: String::new(),
            proposer: None,
            scope_id: ScopeId::parse("coop1").unwrap(),
            created_at,
            duration_minutes: minutes,
            ballots: BallotBook::new(),
        }
    }

    #[test]
    fn test_status_boundary() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let r = resolution(t0, 60);

        assert_eq!(status(&r, t0), Status::Open);
        assert_eq!(status(&r, t0 + Duration::minutes(59)), Status::Open);
        // Closed exactly at the deadline
        assert_eq!(status(&r, t0 + Duration::minutes(60)), Status::Closed);
        assert_eq!(status(&r, t0 + Duration::minutes(61)), Status::Closed);
    }

    #[test]
    fn test_remaining_and_gate() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let r = resolution(t0, 60);

        assert_eq!(remaining(&r, t0 + Duration::minutes(45)), Duration::minutes(15));
        assert_eq!(remaining(&r, t0 + Duration::minutes(90)), Duration::zero());

        assert!(ensure_open(&r, t0).is_ok());
        assert!(matches!(
            ensure_open(&r, t0 + Duration::minutes(61)),
            Err(GovernanceError::Conflict(_))
        ));
    }

    #[test]
    fn test_partition_keeps_order() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let now = t0 + Duration::minutes(30);
        let newest = resolution(t0 + Duration::minutes(20), 5);
        let open = resolution(t0 + Duration::minutes(10), 60);
        let oldest = resolution(t0, 10);

        let listing = ResolutionListing::partition(vec![newest.clone(), open.clone(), oldest.clone()], now);
        assert_eq!(listing.active, vec![open]);
        assert_eq!(listing.past, vec![newest, oldest]);
    }
}
