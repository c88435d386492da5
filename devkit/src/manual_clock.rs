/*!
Clock that only moves when told to
*/

use educafric_connectivity::Clock;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

/// Starts at a fixed epoch (2024-01-01T00:00:00Z) unless given another start
#[derive(Debug)]
pub struct ManualClock {
    now_ms: AtomicI64,
}

pub const DEFAULT_START_MS: i64 = 1_704_067_200_000;

impl ManualClock {
    pub fn new() -> Self {
        Self::starting_at(DEFAULT_START_MS)
    }

    pub fn starting_at(now_ms: i64) -> Self {
        Self {
            now_ms: AtomicI64::new(now_ms),
        }
    }

    pub fn advance(&self, by: Duration) -> i64 {
        self.now_ms.fetch_add(by.as_millis() as i64, Ordering::SeqCst) + by.as_millis() as i64
    }

    pub fn advance_ms(&self, ms: i64) -> i64 {
        self.now_ms.fetch_add(ms, Ordering::SeqCst) + ms
    }

    pub fn set(&self, now_ms: i64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}
