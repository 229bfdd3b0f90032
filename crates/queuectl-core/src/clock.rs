//! Monotonic "now" abstraction, injectable for tests (component F).

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

/// Something that can tell the time. Persisted timestamps are UTC wall time
/// (§4.2), so `now()` returns `DateTime<Utc>` even though the default
/// implementation is backed by a monotonic source where available.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

/// The real clock: `chrono::Utc::now()`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that can be advanced explicitly, for deterministic tests of
/// scheduling, backoff, and timeout behavior.
#[derive(Debug)]
pub struct TestClock {
    micros_since_epoch: AtomicI64,
}

impl TestClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            micros_since_epoch: AtomicI64::new(
                start.timestamp_micros(),
            ),
        }
    }

    pub fn advance(&self, delta: chrono::Duration) {
        self.micros_since_epoch
            .fetch_add(delta.num_microseconds().unwrap_or(0), Ordering::SeqCst);
    }

    pub fn set(&self, when: DateTime<Utc>) {
        self.micros_since_epoch
            .store(when.timestamp_micros(), Ordering::SeqCst);
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        let micros = self.micros_since_epoch.load(Ordering::SeqCst);
        DateTime::from_timestamp_micros(micros).expect("valid timestamp")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_advances_deterministically() {
        let start = Utc::now();
        let clock = TestClock::new(start);
        assert_eq!(clock.now(), start);
        clock.advance(chrono::Duration::seconds(5));
        assert_eq!(clock.now(), start + chrono::Duration::seconds(5));
    }
}
