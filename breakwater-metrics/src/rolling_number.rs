//! Rolling bucketed outcome counters.
//!
//! A [`RollingNumber`] splits a fixed statistical window into equal time
//! buckets arranged as a ring. Incrementing lands in the bucket owning the
//! current instant; buckets passed over while the command was idle are
//! zeroed before they are reused, so a read always reflects exactly the
//! last window's worth of outcomes and nothing older.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use breakwater_core::CommandOutcome;
use serde::{Deserialize, Serialize};

/// Outcome counters for one bucket, or an aggregate over the live window.
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutcomeCounts {
    pub successes: u64,
    pub failures: u64,
    pub timeouts: u64,
    pub rejected: u64,
    pub short_circuited: u64,
}

impl OutcomeCounts {
    pub fn total(&self) -> u64 {
        self.successes + self.failures + self.timeouts + self.rejected + self.short_circuited
    }

    /// Outcomes counting against the error threshold.
    pub fn errors(&self) -> u64 {
        self.failures + self.timeouts + self.short_circuited
    }

    fn increment(&mut self, outcome: CommandOutcome) {
        match outcome {
            CommandOutcome::Success => self.successes += 1,
            CommandOutcome::Failure => self.failures += 1,
            CommandOutcome::Timeout => self.timeouts += 1,
            CommandOutcome::Rejected => self.rejected += 1,
            CommandOutcome::ShortCircuited => self.short_circuited += 1,
        }
    }

    fn accumulate(&mut self, other: &OutcomeCounts) {
        self.successes += other.successes;
        self.failures += other.failures;
        self.timeouts += other.timeouts;
        self.rejected += other.rejected;
        self.short_circuited += other.short_circuited;
    }

    fn clear(&mut self) {
        *self = OutcomeCounts::default();
    }
}

struct CountRing {
    buckets: Vec<OutcomeCounts>,
    /// Absolute slot number (elapsed / bucket width) the ring has advanced to.
    slot: u64,
}

/// Ring of outcome-count buckets over a fixed window.
pub struct RollingNumber {
    epoch: Instant,
    bucket_width: Duration,
    ring: Mutex<CountRing>,
}

impl RollingNumber {
    /// Window length and bucket count are validated at registration; the
    /// width must divide the window evenly.
    pub fn new(window: Duration, buckets: usize) -> Self {
        Self::anchored(Instant::now(), window, buckets)
    }

    /// Ring anchored at an explicit epoch, for deterministic reads.
    pub fn anchored(epoch: Instant, window: Duration, buckets: usize) -> Self {
        debug_assert!(buckets > 0);
        debug_assert!(window.as_millis() % buckets as u128 == 0);
        Self {
            epoch,
            bucket_width: window / buckets as u32,
            ring: Mutex::new(CountRing {
                buckets: vec![OutcomeCounts::default(); buckets],
                slot: 0,
            }),
        }
    }

    pub fn increment(&self, outcome: CommandOutcome) {
        self.increment_at(Instant::now(), outcome);
    }

    pub fn increment_at(&self, now: Instant, outcome: CommandOutcome) {
        let slot = self.slot_for(now);
        let mut ring = lock(&self.ring);
        advance(&mut ring, slot);
        let len = ring.buckets.len();
        let index = (slot % len as u64) as usize;
        ring.buckets[index].increment(outcome);
    }

    pub fn totals(&self) -> OutcomeCounts {
        self.totals_at(Instant::now())
    }

    pub fn totals_at(&self, now: Instant) -> OutcomeCounts {
        let slot = self.slot_for(now);
        let mut ring = lock(&self.ring);
        advance(&mut ring, slot);
        let mut aggregate = OutcomeCounts::default();
        for bucket in &ring.buckets {
            aggregate.accumulate(bucket);
        }
        aggregate
    }

    pub fn reset(&self) {
        let mut ring = lock(&self.ring);
        for bucket in &mut ring.buckets {
            bucket.clear();
        }
    }

    fn slot_for(&self, now: Instant) -> u64 {
        let elapsed = now.saturating_duration_since(self.epoch);
        (elapsed.as_nanos() / self.bucket_width.as_nanos()) as u64
    }
}

fn lock(ring: &Mutex<CountRing>) -> std::sync::MutexGuard<'_, CountRing> {
    ring.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Zeroes every bucket between the ring's last slot and `slot`, capped at a
/// full revolution, then moves the cursor. Reads and writes both advance, so
/// an idle command still reads as an empty window.
fn advance(ring: &mut CountRing, slot: u64) {
    if slot <= ring.slot {
        return;
    }
    let len = ring.buckets.len() as u64;
    let stale = (slot - ring.slot).min(len);
    for step in 1..=stale {
        let index = ((ring.slot + step) % len) as usize;
        ring.buckets[index].clear();
    }
    ring.slot = slot;
}
