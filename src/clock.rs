use std::sync::atomic::{AtomicI64, Ordering};

use time::OffsetDateTime;

/// Time source injected into every component that makes expiry decisions.
///
/// Production code uses [`SystemClock`]; tests inject a [`ManualClock`] so
/// TTL and expiry behaviour can be driven deterministically.
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Manually advanced clock for deterministic tests.
///
/// Stores nanoseconds since the Unix epoch so `advance` needs no lock.
#[derive(Debug)]
pub struct ManualClock {
    nanos: AtomicI64,
}

impl ManualClock {
    pub fn new(start: OffsetDateTime) -> Self {
        Self {
            nanos: AtomicI64::new(start.unix_timestamp_nanos() as i64),
        }
    }

    /// Move the clock forward (or backward, with a negative duration).
    pub fn advance(&self, by: time::Duration) {
        self.nanos
            .fetch_add(by.whole_nanoseconds() as i64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        let nanos = self.nanos.load(Ordering::SeqCst);
        OffsetDateTime::from_unix_timestamp_nanos(i128::from(nanos))
            .unwrap_or(OffsetDateTime::UNIX_EPOCH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(datetime!(2024-05-01 12:00 UTC));
        let before = clock.now();
        clock.advance(time::Duration::minutes(5));
        assert_eq!(clock.now() - before, time::Duration::minutes(5));
    }

    #[test]
    fn system_clock_is_utc() {
        let now = SystemClock.now();
        assert_eq!(now.offset(), time::UtcOffset::UTC);
    }
}
