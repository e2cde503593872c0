/// Sync timestamps.
///
/// `newer` is the only ordering rule used when two versions of a record
/// meet; every merge point goes through it.
use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::Timestamp;

/// Last-writer-wins comparator: `a` replaces `b` only when strictly later.
pub fn newer(a: Timestamp, b: Timestamp) -> bool {
    a > b
}

/// Wall clock in milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

/// Per-client timestamp source. Successive stamps strictly increase even if
/// the wall clock stalls or steps back, and stay ahead of every timestamp
/// this client has observed from others.
#[derive(Debug, Default)]
pub struct SyncClock {
    last: AtomicU64,
}

impl SyncClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp for a new write: `max(now, last + 1)`.
    pub fn next(&self) -> Timestamp {
        let now = now_ms();
        let mut current = self.last.load(Ordering::Acquire);
        loop {
            let candidate = now.max(current.saturating_add(1));
            match self.last.compare_exchange_weak(
                current,
                candidate,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Timestamp(candidate),
                Err(actual) => current = actual,
            }
        }
    }

    /// Advance past a timestamp seen on a remote record.
    pub fn observe(&self, seen: Timestamp) {
        self.last.fetch_max(seen.as_millis(), Ordering::AcqRel);
    }

    pub fn last(&self) -> Timestamp {
        Timestamp(self.last.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newer_is_strict() {
        assert!(newer(Timestamp(2), Timestamp(1)));
        assert!(!newer(Timestamp(1), Timestamp(1)));
        assert!(!newer(Timestamp(0), Timestamp(1)));
    }

    #[test]
    fn test_stamps_strictly_increase() {
        let clock = SyncClock::new();
        let mut previous = clock.next();
        for _ in 0..1000 {
            let stamp = clock.next();
            assert!(newer(stamp, previous));
            previous = stamp;
        }
    }

    #[test]
    fn test_observe_moves_past_future_stamp() {
        let clock = SyncClock::new();
        let far = Timestamp(now_ms() + 60_000);
        clock.observe(far);
        assert_eq!(clock.next(), Timestamp(far.as_millis() + 1));

        // Observing an older stamp never moves the clock back.
        clock.observe(Timestamp(5));
        assert!(newer(clock.last(), far));
    }
}
