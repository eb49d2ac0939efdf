//! Metric registry

use crate::Histogram;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Thread-safe registry; metrics are created on first use
#[derive(Default)]
pub struct Metrics {
    histograms: RwLock<BTreeMap<String, Arc<Histogram>>>,
    counters: RwLock<BTreeMap<String, Arc<AtomicU64>>>,
}

/// Fetch `name` under the read lock, inserting under the write lock if absent
fn entry<T>(map: &RwLock<BTreeMap<String, Arc<T>>>, name: &str, make: impl FnOnce() -> T) -> Arc<T> {
    if let Some(existing) = map.read().get(name) {
        return Arc::clone(existing);
    }
    Arc::clone(
        map.write()
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(make())),
    )
}

impl Metrics {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a histogram observation
    pub fn histogram(&self, name: &str, value: u64) {
        entry(&self.histograms, name, Histogram::new).observe(value);
    }

    /// Increment a counter
    pub fn counter(&self, name: &str, delta: u64) {
        entry(&self.counters, name, || AtomicU64::new(0)).fetch_add(delta, Ordering::Relaxed);
    }

    /// Increment a counter by one
    pub fn incr(&self, name: &str) {
        self.counter(name, 1);
    }

    /// Histogram by name
    pub fn get_histogram(&self, name: &str) -> Option<Arc<Histogram>> {
        self.histograms.read().get(name).cloned()
    }

    /// Counter value
    pub fn get_counter(&self, name: &str) -> Option<u64> {
        self.counters
            .read()
            .get(name)
            .map(|c| c.load(Ordering::Relaxed))
    }

    /// All counters in name order
    pub fn all_counters(&self) -> Vec<(String, u64)> {
        self.counters
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.load(Ordering::Relaxed)))
            .collect()
    }

    /// All histograms in name order
    pub fn all_histograms(&self) -> Vec<(String, Arc<Histogram>)> {
        self.histograms
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), Arc::clone(v)))
            .collect()
    }
}
