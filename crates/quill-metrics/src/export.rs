//! Snapshots and JSON export

use crate::Metrics;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Copy of every metric at one point in time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Counter values
    pub counters: BTreeMap<String, u64>,
    /// Histogram summaries
    pub histograms: BTreeMap<String, HistogramSummary>,
}

/// Summary of one histogram
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistogramSummary {
    /// Observations
    pub count: u64,
    /// Sum of observations
    pub sum: u64,
    /// Mean value
    pub mean: f64,
    /// Largest observation
    pub max: u64,
    /// `(upper bound, count)` pairs
    pub buckets: Vec<(u64, u64)>,
}

impl MetricsSnapshot {
    /// Capture `metrics`
    pub fn from_metrics(metrics: &Metrics) -> Self {
        let histograms = metrics
            .all_histograms()
            .into_iter()
            .map(|(name, h)| {
                let summary = HistogramSummary {
                    count: h.total_count(),
                    sum: h.sum(),
                    mean: h.mean(),
                    max: h.max(),
                    buckets: h.buckets(),
                };
                (name, summary)
            })
            .collect();

        Self {
            counters: metrics.all_counters().into_iter().collect(),
            histograms,
        }
    }

    /// Pretty JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Compact JSON
    pub fn to_json_compact(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Counter value, zero when never incremented
    pub fn counter(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }
}
