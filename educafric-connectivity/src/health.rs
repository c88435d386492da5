//! Health signal data model: probe results, telemetry, adaptive interval and
//! the two-layer probe rate limiter.
//!
//! These types hold no timers and do no I/O; the scheduler owns one of each
//! and mutates them after every completed probe.

use crate::device::DeviceClass;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Minimum spacing between two scheduled probes
pub const MIN_PROBE_SPACING_MS: i64 = 5 * 60 * 1000;
/// Completed probes allowed per rolling hour
pub const HOURLY_PROBE_BUDGET: u32 = 10;
pub const RATE_WINDOW_MS: i64 = 60 * 60 * 1000;
/// Backoff multiplier ceiling
pub const MAX_BACKOFF_FACTOR: f64 = 2.5;

/// Outcome of one probe attempt; failures are values, never errors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckResult {
    pub is_healthy: bool,
    pub response_time_ms: u64,
    pub timestamp_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub from_cache: bool,
}

impl HealthCheckResult {
    pub fn healthy(response_time_ms: u64, timestamp_ms: i64) -> Self {
        Self {
            is_healthy: true,
            response_time_ms,
            timestamp_ms,
            error: None,
            from_cache: false,
        }
    }

    pub fn unhealthy(error: impl Into<String>, response_time_ms: u64, timestamp_ms: i64) -> Self {
        Self {
            is_healthy: false,
            response_time_ms,
            timestamp_ms,
            error: Some(error.into()),
            from_cache: false,
        }
    }

    /// Copy of this result tagged as served from cache
    pub fn cached(&self) -> Self {
        Self {
            from_cache: true,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Telemetry {
    pub total_checks: u64,
    pub average_response_time_ms: f64,
    pub last_check_time_ms: Option<i64>,
    pub checks_per_minute: f64,
    pub failure_count: u64,
}

/// Accumulates telemetry; the rate is derived from real elapsed time between
/// the first and the latest completed check.
#[derive(Debug, Clone, Default)]
pub struct TelemetryTracker {
    snapshot: Telemetry,
    first_check_ms: Option<i64>,
}

impl TelemetryTracker {
    pub fn record(&mut self, result: &HealthCheckResult) {
        let t = &mut self.snapshot;
        t.total_checks += 1;
        let n = t.total_checks as f64;
        t.average_response_time_ms += (result.response_time_ms as f64 - t.average_response_time_ms) / n;
        if !result.is_healthy {
            t.failure_count += 1;
        }
        t.last_check_time_ms = Some(result.timestamp_ms);

        let first = *self.first_check_ms.get_or_insert(result.timestamp_ms);
        let elapsed_ms = result.timestamp_ms - first;
        t.checks_per_minute = if t.total_checks > 1 && elapsed_ms > 0 {
            (t.total_checks - 1) as f64 / (elapsed_ms as f64 / 60_000.0)
        } else {
            0.0
        };
    }

    pub fn snapshot(&self) -> Telemetry {
        self.snapshot.clone()
    }
}

/// Probe cadence. Invariant: `base_interval <= current_interval <= max_interval`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdaptiveConfig {
    pub base_interval: Duration,
    pub max_interval: Duration,
    pub current_interval: Duration,
    pub consecutive_failures: u32,
    pub device_class: DeviceClass,
}

impl AdaptiveConfig {
    pub fn new(base_interval: Duration, max_interval: Duration, device_class: DeviceClass) -> Self {
        let max_interval = max_interval.max(base_interval);
        Self {
            base_interval,
            max_interval,
            current_interval: base_interval,
            consecutive_failures: 0,
            device_class,
        }
    }

    /// `current = min(base * min(failures, 2.5), max)`
    pub fn record_failure(&mut self) -> Duration {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        let factor = (self.consecutive_failures as f64).min(MAX_BACKOFF_FACTOR);
        let scaled = self.base_interval.mul_f64(factor);
        self.current_interval = scaled.min(self.max_interval).max(self.base_interval);
        self.current_interval
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.current_interval = self.base_interval;
    }
}

/// Why a scheduled probe was not executed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Hidden,
    Inactive,
    TooSoon,
    HourlyBudgetExhausted,
    Destroyed,
}

/// Two independent layers, both must pass: minimum spacing since the last
/// issued probe and a budget of completed probes per hourly window.
#[derive(Debug, Clone)]
pub struct ProbeRateLimiter {
    min_spacing_ms: i64,
    hourly_budget: u32,
    window_ms: i64,
    last_check_ms: Option<i64>,
    window_start_ms: Option<i64>,
    completed_in_window: u32,
}

impl ProbeRateLimiter {
    pub fn new(min_spacing_ms: i64, hourly_budget: u32, window_ms: i64) -> Self {
        Self {
            min_spacing_ms,
            hourly_budget,
            window_ms,
            last_check_ms: None,
            window_start_ms: None,
            completed_in_window: 0,
        }
    }

    pub fn admit(&mut self, now_ms: i64) -> Result<(), SkipReason> {
        if let Some(last) = self.last_check_ms {
            if now_ms - last < self.min_spacing_ms {
                return Err(SkipReason::TooSoon);
            }
        }

        self.roll_window(now_ms);
        if self.completed_in_window >= self.hourly_budget {
            return Err(SkipReason::HourlyBudgetExhausted);
        }
        Ok(())
    }

    /// A probe was issued (or a fresh peer result adopted) at `now_ms`
    pub fn mark_checked(&mut self, now_ms: i64) {
        self.last_check_ms = Some(now_ms);
    }

    pub fn record_completion(&mut self, now_ms: i64) {
        self.roll_window(now_ms);
        if self.window_start_ms.is_none() {
            self.window_start_ms = Some(now_ms);
        }
        self.completed_in_window += 1;
    }

    pub fn last_check_ms(&self) -> Option<i64> {
        self.last_check_ms
    }

    pub fn completed_in_window(&self) -> u32 {
        self.completed_in_window
    }

    fn roll_window(&mut self, now_ms: i64) {
        if let Some(start) = self.window_start_ms {
            if now_ms - start >= self.window_ms {
                self.window_start_ms = None;
                self.completed_in_window = 0;
            }
        }
    }
}

impl Default for ProbeRateLimiter {
    fn default() -> Self {
        Self::new(MIN_PROBE_SPACING_MS, HOURLY_PROBE_BUDGET, RATE_WINDOW_MS)
    }
}
