//! Time source for timestamps and cooldowns

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

/// Monotonic wall-clock source
pub trait Clock: Send + Sync {
    /// Current instant
    fn now(&self) -> DateTime<Utc>;
}

/// System wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Hand-driven clock that only moves forward
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Start at `start`
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move forward by `by`; negative durations and overflow are ignored
    pub fn advance(&self, by: Duration) {
        if by > Duration::zero() {
            let mut now = self.now.lock();
            if let Some(next) = now.checked_add_signed(by) {
                *now = next;
            }
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_never_goes_back() {
        let start = Utc::now();
        let clock = ManualClock::new(start);

        clock.advance(Duration::hours(2));
        clock.advance(Duration::hours(-5));

        assert_eq!(clock.now(), start + Duration::hours(2));
    }
}
