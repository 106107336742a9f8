//! Wall-clock abstraction
//!
//! Lifecycle decisions depend on the current time, so it is injected rather
//! than read ad hoc.

use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};

/// Source of the current time
pub trait Clock: Send + Sync {
    /// The current instant in UTC
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }

    /// Jump to an absolute instant
    pub fn set(&self, at: DateTime<Utc>) {
        let mut now = self.now.write().unwrap_or_else(|e| e.into_inner());
        *now = at;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let start = Utc::now();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance(Duration::minutes(61));
        assert_eq!(clock.now(), start + Duration::minutes(61));

        clock.set(start);
        assert_eq!(clock.now(), start);
    }
}
