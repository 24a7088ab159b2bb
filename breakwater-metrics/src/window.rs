//! Per-command metrics window.
//!
//! One [`MetricsWindow`] is exclusively owned by one command key and shared
//! by every concurrent invocation of it. It combines the rolling outcome
//! counters (statistical window) with the rolling latency samples
//! (percentile window, independently sized) and aggregates both into a
//! [`HealthSnapshot`], the sole input to circuit-breaker decisions and to
//! observability exports.
//!
//! # Example
//!
//! ```
//! use breakwater_core::{CommandOutcome, CommandOptions, CommandProperties};
//! use breakwater_metrics::MetricsWindow;
//! use std::time::Duration;
//!
//! let properties = CommandProperties::resolve("Ping", CommandOptions::default()).unwrap();
//! let window = MetricsWindow::from_properties(&properties);
//!
//! window.record(CommandOutcome::Success, Duration::from_millis(12));
//! window.record(CommandOutcome::Failure, Duration::from_millis(40));
//!
//! let snapshot = window.snapshot();
//! assert_eq!(snapshot.total, 2);
//! assert_eq!(snapshot.error_percentage, 50.0);
//! ```

use std::time::{Duration, Instant};

use breakwater_core::{CommandOutcome, CommandProperties};
use serde::{Deserialize, Serialize};

use crate::rolling_number::{OutcomeCounts, RollingNumber};
use crate::rolling_percentile::{LatencySummary, RollingPercentile};

/// Aggregated view of a command's live window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthSnapshot {
    pub total: u64,
    pub successes: u64,
    pub failures: u64,
    pub timeouts: u64,
    pub rejected: u64,
    pub short_circuited: u64,
    /// Errors (failures + timeouts + short-circuits) over total, 0–100.
    pub error_percentage: f64,
    pub latency: LatencySummary,
}

impl HealthSnapshot {
    fn from_parts(counts: OutcomeCounts, latency: LatencySummary) -> Self {
        let total = counts.total();
        let error_percentage = if total == 0 {
            0.0
        } else {
            counts.errors() as f64 / total as f64 * 100.0
        };
        Self {
            total,
            successes: counts.successes,
            failures: counts.failures,
            timeouts: counts.timeouts,
            rejected: counts.rejected,
            short_circuited: counts.short_circuited,
            error_percentage,
            latency,
        }
    }
}

/// Rolling outcome and latency statistics for one command key.
pub struct MetricsWindow {
    counts: RollingNumber,
    latencies: RollingPercentile,
}

impl MetricsWindow {
    pub fn new(
        statistical_window: Duration,
        statistical_buckets: usize,
        percentile_window: Duration,
        percentile_buckets: usize,
    ) -> Self {
        Self::anchored(
            Instant::now(),
            statistical_window,
            statistical_buckets,
            percentile_window,
            percentile_buckets,
        )
    }

    /// Window anchored at an explicit epoch, for deterministic reads.
    pub fn anchored(
        epoch: Instant,
        statistical_window: Duration,
        statistical_buckets: usize,
        percentile_window: Duration,
        percentile_buckets: usize,
    ) -> Self {
        Self {
            counts: RollingNumber::anchored(epoch, statistical_window, statistical_buckets),
            latencies: RollingPercentile::anchored(epoch, percentile_window, percentile_buckets),
        }
    }

    pub fn from_properties(properties: &CommandProperties) -> Self {
        Self::new(
            properties.statistical_window,
            properties.statistical_window_buckets,
            properties.percentile_window,
            properties.percentile_window_buckets,
        )
    }

    /// Records one invocation outcome. The executor guarantees exactly one
    /// call per invocation; the window guarantees the increment is neither
    /// lost nor double-counted under concurrent recording.
    ///
    /// Latency samples are kept only for outcomes where the underlying
    /// logic actually ran; rejections and short-circuits contribute counts
    /// alone.
    pub fn record(&self, outcome: CommandOutcome, latency: Duration) {
        self.record_at(Instant::now(), outcome, latency);
    }

    pub fn record_at(&self, now: Instant, outcome: CommandOutcome, latency: Duration) {
        self.counts.increment_at(now, outcome);
        if outcome.executed() {
            self.latencies.record_at(now, latency);
        }
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        self.snapshot_at(Instant::now())
    }

    pub fn snapshot_at(&self, now: Instant) -> HealthSnapshot {
        HealthSnapshot::from_parts(self.counts.totals_at(now), self.latencies.summary_at(now))
    }

    /// Clears both rings. Used when the breaker closes after a successful
    /// probe so the fresh Closed period starts from a clean evaluation
    /// window.
    pub fn reset(&self) {
        self.counts.reset();
        self.latencies.reset();
    }
}
