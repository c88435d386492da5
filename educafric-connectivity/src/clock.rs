//! Wall-clock source in epoch milliseconds.
//!
//! Every timestamp the subsystem stores (result timestamps, rate-limit windows,
//! offline durations) comes from a [`Clock`] so hosts and tests can control time.

use chrono::Utc;
use std::sync::Arc;

pub trait Clock: Send + Sync {
    /// Current time in milliseconds since the Unix epoch.
    fn now_ms(&self) -> i64;
}

/// Clock backed by the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

pub type SharedClock = Arc<dyn Clock>;

pub fn system_clock() -> SharedClock {
    Arc::new(SystemClock)
}
