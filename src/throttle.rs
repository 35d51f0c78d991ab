//! Timestamp-based rate limiting for verdict re-evaluation.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch according to the system clock.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis().min(u128::from(u64::MAX)) as u64)
        .unwrap_or(0)
}

/// Admits at most one commit per interval.
///
/// Only the timestamp of the last admitted call is kept. Rejected calls leave no
/// trace: nothing is queued and nothing is replayed later.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    min_interval_ms: u64,
    last_committed: Option<u64>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval_ms: min_interval.as_millis().min(u128::from(u64::MAX)) as u64,
            last_committed: None,
        }
    }

    pub fn last_committed(&self) -> Option<u64> {
        self.last_committed
    }

    /// Checks whether a commit at `now` is allowed, without recording anything.
    ///
    /// A clock that went backwards reopens the interval.
    pub fn is_open(&self, now: u64) -> bool {
        match self.last_committed {
            None => true,
            Some(last) if now < last => true,
            Some(last) => now - last >= self.min_interval_ms,
        }
    }

    /// Records a commit at `now` if the interval is open.
    pub fn try_acquire(&mut self, now: u64) -> bool {
        if !self.is_open(now) {
            return false;
        }
        self.last_committed = Some(now);
        true
    }

    /// Time left until the interval reopens.
    pub fn remaining(&self, now: u64) -> Duration {
        match self.last_committed {
            Some(last) if now >= last => {
                Duration::from_millis(self.min_interval_ms.saturating_sub(now - last))
            }
            _ => Duration::ZERO,
        }
    }
}
