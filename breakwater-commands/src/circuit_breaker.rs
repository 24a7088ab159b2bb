//! Circuit Breaker implementation for preventing cascading failures.
//!
//! One breaker is exclusively owned by one command key and consumes that
//! key's metrics-window snapshots to gate admission.
//!
//! # States
//!
//! - **Closed**: Normal operation, requests pass through
//! - **Open**: Error rate over the live window crossed the threshold,
//!   requests are short-circuited for the sleep window
//! - **HalfOpen**: Exactly one probe is admitted to test recovery; every
//!   other concurrent caller is treated as Open
//!
//! Open→HalfOpen is evaluated lazily on the next admission check once the
//! sleep window has elapsed; probe admission is a compare-and-swap, so
//! racing callers can never admit more than one probe. Closed→Open is
//! evaluated on every completed execution and lazily on admission checks.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use breakwater_core::{CommandKey, CommandOutcome, CommandProperties};
use breakwater_metrics::MetricsWindow;
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Circuit breaker states
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation, requests pass through
    Closed,
    /// Short-circuiting: requests are rejected without running
    Open,
    /// Testing recovery with a single probe
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "Closed"),
            CircuitState::Open => write!(f, "Open"),
            CircuitState::HalfOpen => write!(f, "HalfOpen"),
        }
    }
}

const CLOSED: u8 = 0;
const OPEN: u8 = 1;
const HALF_OPEN: u8 = 2;

fn decode(state: u8) -> CircuitState {
    match state {
        OPEN => CircuitState::Open,
        HALF_OPEN => CircuitState::HalfOpen,
        _ => CircuitState::Closed,
    }
}

/// Per-command-key circuit breaker.
///
/// Mutated only through the [`allow`](CircuitBreaker::allow) /
/// [`mark_outcome`](CircuitBreaker::mark_outcome) protocol; state lives in
/// atomics so admission checks never block.
pub struct CircuitBreaker {
    properties: Arc<CommandProperties>,
    window: Arc<MetricsWindow>,
    state: AtomicU8,
    /// Milliseconds since `epoch` at which the circuit last opened.
    opened_at_ms: AtomicU64,
    epoch: Instant,
}

impl CircuitBreaker {
    pub fn new(properties: Arc<CommandProperties>, window: Arc<MetricsWindow>) -> Self {
        Self {
            properties,
            window,
            state: AtomicU8::new(CLOSED),
            opened_at_ms: AtomicU64::new(0),
            epoch: Instant::now(),
        }
    }

    pub fn key(&self) -> &CommandKey {
        &self.properties.command_key
    }

    pub fn properties(&self) -> &Arc<CommandProperties> {
        &self.properties
    }

    pub fn window(&self) -> &Arc<MetricsWindow> {
        &self.window
    }

    /// Current state of the state machine.
    pub fn state(&self) -> CircuitState {
        decode(self.state.load(Ordering::Acquire))
    }

    /// Whether this invocation may run its underlying logic.
    ///
    /// Returns true for Closed and for the single admitted HalfOpen probe.
    /// A false return means the caller must record the outcome as
    /// short-circuited.
    pub fn allow(&self) -> bool {
        self.allow_at(Instant::now())
    }

    pub fn allow_at(&self, now: Instant) -> bool {
        if !self.properties.circuit_enabled {
            return true;
        }
        if self.properties.force_open {
            return false;
        }
        if self.properties.force_closed {
            return true;
        }

        match decode(self.state.load(Ordering::Acquire)) {
            CircuitState::Closed => {
                if self.should_trip(now) {
                    self.trip(now);
                    false
                } else {
                    true
                }
            }
            CircuitState::Open => {
                if self.sleep_window_elapsed(now)
                    && self
                        .state
                        .compare_exchange(OPEN, HALF_OPEN, Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                {
                    info!(command = %self.key(), "circuit breaker admitting half-open probe");
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => false,
        }
    }

    /// Records the invocation's outcome into the metrics window and
    /// re-evaluates transitions.
    pub fn mark_outcome(&self, outcome: CommandOutcome, latency: Duration) {
        self.mark_outcome_at(Instant::now(), outcome, latency);
    }

    pub fn mark_outcome_at(&self, now: Instant, outcome: CommandOutcome, latency: Duration) {
        self.window.record_at(now, outcome, latency);
        // A disabled or pinned circuit records history but never moves.
        if !self.properties.circuit_enabled
            || self.properties.force_open
            || self.properties.force_closed
        {
            return;
        }

        match decode(self.state.load(Ordering::Acquire)) {
            CircuitState::HalfOpen => match outcome {
                CommandOutcome::Success => self.close_after_probe(),
                CommandOutcome::Failure | CommandOutcome::Timeout | CommandOutcome::Rejected => {
                    self.reopen_after_probe(now)
                }
                // Short-circuited recordings are the callers the probe
                // displaced; they never drive transitions.
                CommandOutcome::ShortCircuited => {}
            },
            CircuitState::Closed => {
                if outcome != CommandOutcome::ShortCircuited && self.should_trip(now) {
                    self.trip(now);
                }
            }
            CircuitState::Open => {}
        }
    }

    fn should_trip(&self, now: Instant) -> bool {
        let snapshot = self.window.snapshot_at(now);
        snapshot.total >= self.properties.request_volume_threshold
            && snapshot.error_percentage >= self.properties.error_threshold_percentage as f64
    }

    fn trip(&self, now: Instant) {
        // opened_at must be visible before the state flips, or a racing
        // admission check could read a stale open timestamp and probe early.
        self.opened_at_ms.store(self.millis_since_epoch(now), Ordering::Release);
        if self
            .state
            .compare_exchange(CLOSED, OPEN, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            warn!(command = %self.key(), "circuit breaker opened");
            self.count_transition("open");
        }
    }

    fn reopen_after_probe(&self, now: Instant) {
        self.opened_at_ms.store(self.millis_since_epoch(now), Ordering::Release);
        self.state.store(OPEN, Ordering::Release);
        warn!(command = %self.key(), "circuit breaker re-opened after failed probe");
        self.count_transition("open");
    }

    fn close_after_probe(&self) {
        // Fresh Closed period starts from a clean evaluation window.
        self.window.reset();
        self.state.store(CLOSED, Ordering::Release);
        info!(command = %self.key(), "circuit breaker closed after successful probe");
        self.count_transition("closed");
    }

    fn sleep_window_elapsed(&self, now: Instant) -> bool {
        let opened_at = self.opened_at_ms.load(Ordering::Acquire);
        let now_ms = self.millis_since_epoch(now);
        now_ms.saturating_sub(opened_at) >= self.properties.sleep_window.as_millis() as u64
    }

    fn millis_since_epoch(&self, now: Instant) -> u64 {
        now.saturating_duration_since(self.epoch).as_millis() as u64
    }

    fn count_transition(&self, to: &'static str) {
        counter!(
            "circuit_breaker_transitions_total",
            &[
                ("command", self.key().to_string()),
                ("to", to.to_string()),
            ]
        )
        .increment(1);
    }
}
