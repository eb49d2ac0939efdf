//! Bucketed histogram of integer observations

use std::sync::atomic::{AtomicU64, Ordering};

/// Upper bounds for gas observations
pub const DEFAULT_GAS_BUCKETS: [u64; 7] = [
    1_000, 10_000, 50_000, 100_000, 500_000, 1_000_000, 5_000_000,
];

/// Histogram of `u64` observations (gas, sizes)
pub struct Histogram {
    bounds: Vec<u64>,
    /// One per bound plus an overflow bucket
    counts: Vec<AtomicU64>,
    sum: AtomicU64,
    count: AtomicU64,
    max: AtomicU64,
}

impl Histogram {
    /// Histogram with [`DEFAULT_GAS_BUCKETS`]
    pub fn new() -> Self {
        Self::with_bounds(DEFAULT_GAS_BUCKETS.to_vec())
    }

    /// Histogram with custom upper bounds; unsorted input is sorted
    pub fn with_bounds(mut bounds: Vec<u64>) -> Self {
        bounds.sort_unstable();
        bounds.dedup();
        let counts = (0..=bounds.len()).map(|_| AtomicU64::new(0)).collect();
        Self {
            bounds,
            counts,
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
            max: AtomicU64::new(0),
        }
    }

    /// Record a value
    pub fn observe(&self, value: u64) {
        // saturate instead of wrapping the running sum
        let _ = self
            .sum
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |s| {
                Some(s.saturating_add(value))
            });
        self.count.fetch_add(1, Ordering::Relaxed);
        self.max.fetch_max(value, Ordering::Relaxed);

        let bucket = self
            .bounds
            .iter()
            .position(|bound| value <= *bound)
            .unwrap_or(self.bounds.len());
        self.counts[bucket].fetch_add(1, Ordering::Relaxed);
    }

    /// Mean value, zero when empty
    pub fn mean(&self) -> f64 {
        let count = self.count.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        self.sum.load(Ordering::Relaxed) as f64 / count as f64
    }

    /// Number of observations
    pub fn total_count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Sum of observations
    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    /// Largest observation
    pub fn max(&self) -> u64 {
        self.max.load(Ordering::Relaxed)
    }

    /// `(upper bound, count)` per bucket; the overflow bucket has bound `u64::MAX`
    pub fn buckets(&self) -> Vec<(u64, u64)> {
        self.bounds
            .iter()
            .copied()
            .chain(std::iter::once(u64::MAX))
            .zip(self.counts.iter().map(|c| c.load(Ordering::Relaxed)))
            .collect()
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}
