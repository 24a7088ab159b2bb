//! Rolling latency percentiles.
//!
//! A [`RollingPercentile`] keeps a ring of time buckets over the percentile
//! window, each holding a bounded set of latency samples. Once a bucket is
//! full the oldest sample is overwritten, so a hot command keeps a stable
//! memory footprint. Aggregation sorts the live samples and reports the
//! usual service percentiles.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Latency samples kept per bucket before the oldest is overwritten.
pub const BUCKET_SAMPLE_SIZE: usize = 100;

/// Aggregated latency distribution over the live percentile window, in
/// milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LatencySummary {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

impl LatencySummary {
    pub fn from_samples(samples: &[u64]) -> Self {
        if samples.is_empty() {
            return Self::empty();
        }

        let mut sorted = samples.to_vec();
        sorted.sort_unstable();

        let min = sorted[0] as f64;
        let max = sorted[sorted.len() - 1] as f64;
        let mean = sorted.iter().sum::<u64>() as f64 / sorted.len() as f64;

        Self {
            count: sorted.len(),
            min,
            max,
            mean,
            p50: percentile(&sorted, 50.0),
            p90: percentile(&sorted, 90.0),
            p95: percentile(&sorted, 95.0),
            p99: percentile(&sorted, 99.0),
        }
    }

    pub fn empty() -> Self {
        Self {
            count: 0,
            min: 0.0,
            max: 0.0,
            mean: 0.0,
            p50: 0.0,
            p90: 0.0,
            p95: 0.0,
            p99: 0.0,
        }
    }
}

fn percentile(sorted_values: &[u64], percentile: f64) -> f64 {
    if sorted_values.is_empty() {
        return 0.0;
    }
    let index = (percentile / 100.0 * (sorted_values.len() - 1) as f64).round() as usize;
    sorted_values[index.min(sorted_values.len() - 1)] as f64
}

#[derive(Default, Clone)]
struct SampleBucket {
    samples: Vec<u64>,
    inserted: usize,
}

impl SampleBucket {
    fn push(&mut self, value: u64) {
        if self.samples.len() < BUCKET_SAMPLE_SIZE {
            self.samples.push(value);
        } else {
            self.samples[self.inserted % BUCKET_SAMPLE_SIZE] = value;
        }
        self.inserted += 1;
    }

    fn clear(&mut self) {
        self.samples.clear();
        self.inserted = 0;
    }
}

struct SampleRing {
    buckets: Vec<SampleBucket>,
    slot: u64,
}

/// Ring of bounded latency-sample buckets over a fixed window.
pub struct RollingPercentile {
    epoch: Instant,
    bucket_width: Duration,
    ring: Mutex<SampleRing>,
}

impl RollingPercentile {
    pub fn new(window: Duration, buckets: usize) -> Self {
        Self::anchored(Instant::now(), window, buckets)
    }

    pub fn anchored(epoch: Instant, window: Duration, buckets: usize) -> Self {
        debug_assert!(buckets > 0);
        debug_assert!(window.as_millis() % buckets as u128 == 0);
        Self {
            epoch,
            bucket_width: window / buckets as u32,
            ring: Mutex::new(SampleRing {
                buckets: vec![SampleBucket::default(); buckets],
                slot: 0,
            }),
        }
    }

    pub fn record(&self, latency: Duration) {
        self.record_at(Instant::now(), latency);
    }

    pub fn record_at(&self, now: Instant, latency: Duration) {
        let slot = self.slot_for(now);
        let mut ring = lock(&self.ring);
        advance(&mut ring, slot);
        let len = ring.buckets.len();
        let index = (slot % len as u64) as usize;
        ring.buckets[index].push(latency.as_millis().min(u64::MAX as u128) as u64);
    }

    pub fn summary(&self) -> LatencySummary {
        self.summary_at(Instant::now())
    }

    pub fn summary_at(&self, now: Instant) -> LatencySummary {
        let slot = self.slot_for(now);
        let mut ring = lock(&self.ring);
        advance(&mut ring, slot);
        let samples: Vec<u64> = ring
            .buckets
            .iter()
            .flat_map(|bucket| bucket.samples.iter().copied())
            .collect();
        LatencySummary::from_samples(&samples)
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

fn lock(ring: &Mutex<SampleRing>) -> std::sync::MutexGuard<'_, SampleRing> {
    ring.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn advance(ring: &mut SampleRing, slot: u64) {
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
