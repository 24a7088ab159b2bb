//! Bulkhead-style concurrency isolation per command key.
//!
//! A [`ConcurrencyGate`] bounds the in-flight work of one command with two
//! independent pools: primary executions and fallback executions. Admission
//! is non-blocking: `try_acquire` answers immediately and never queues a
//! caller, so a saturated dependency sheds load instead of piling up
//! waiting requests.
//!
//! # Example
//!
//! ```
//! use breakwater_commands::ConcurrencyGate;
//! use breakwater_core::IsolationPool;
//!
//! let gate = ConcurrencyGate::new("database".into(), 2, 2);
//!
//! let first = gate.try_acquire(IsolationPool::Primary);
//! assert!(first.is_some());
//! drop(first); // the permit releases its slot exactly once
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};

use breakwater_core::{CommandKey, IsolationPool};
use metrics::{counter, gauge};
use tracing::debug;

struct BoundedPool {
    limit: usize,
    in_flight: AtomicUsize,
}

impl BoundedPool {
    fn new(limit: usize) -> Self {
        Self {
            limit,
            in_flight: AtomicUsize::new(0),
        }
    }

    fn try_acquire(&self) -> bool {
        let mut current = self.in_flight.load(Ordering::Relaxed);
        loop {
            if current >= self.limit {
                return false;
            }
            match self.in_flight.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    fn release(&self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }

    fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }
}

/// Non-blocking admission control shared by every concurrent invocation of
/// one command key.
pub struct ConcurrencyGate {
    key: CommandKey,
    primary: BoundedPool,
    fallback: BoundedPool,
}

impl ConcurrencyGate {
    pub fn new(key: CommandKey, max_primary: usize, max_fallback: usize) -> Self {
        Self {
            key,
            primary: BoundedPool::new(max_primary),
            fallback: BoundedPool::new(max_fallback),
        }
    }

    pub fn key(&self) -> &CommandKey {
        &self.key
    }

    /// Grants a slot in the requested pool, or answers immediately that the
    /// pool is exhausted. The returned permit releases the slot on drop.
    pub fn try_acquire(&self, pool: IsolationPool) -> Option<GatePermit<'_>> {
        if self.pool(pool).try_acquire() {
            self.record_gauge(pool);
            Some(GatePermit { gate: self, pool })
        } else {
            debug!(command = %self.key, pool = %pool, "concurrency gate rejected execution");
            counter!(
                "isolation_gate_rejections_total",
                &[
                    ("command", self.key.to_string()),
                    ("pool", pool.as_str().to_string()),
                ]
            )
            .increment(1);
            None
        }
    }

    /// Currently granted slots in a pool.
    pub fn in_flight(&self, pool: IsolationPool) -> usize {
        self.pool(pool).in_flight()
    }

    /// Remaining capacity of a pool.
    pub fn available(&self, pool: IsolationPool) -> usize {
        let pool = self.pool(pool);
        pool.limit.saturating_sub(pool.in_flight())
    }

    fn pool(&self, pool: IsolationPool) -> &BoundedPool {
        match pool {
            IsolationPool::Primary => &self.primary,
            IsolationPool::Fallback => &self.fallback,
        }
    }

    fn record_gauge(&self, pool: IsolationPool) {
        gauge!(
            "isolation_gate_in_flight",
            &[
                ("command", self.key.to_string()),
                ("pool", pool.as_str().to_string()),
            ]
        )
        .set(self.pool(pool).in_flight() as f64);
    }
}

/// A granted slot. Dropping it releases the slot back to its pool exactly
/// once, on every exit path.
pub struct GatePermit<'a> {
    gate: &'a ConcurrencyGate,
    pool: IsolationPool,
}

impl GatePermit<'_> {
    pub fn pool(&self) -> IsolationPool {
        self.pool
    }
}

impl Drop for GatePermit<'_> {
    fn drop(&mut self) {
        self.gate.pool(self.pool).release();
        self.gate.record_gauge(self.pool);
    }
}
