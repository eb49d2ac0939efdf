//! # quill-metrics
//!
//! In-process metrics for the Quill execution engine.
//!
//! - [`Metrics`] - named counters and gas histograms
//! - [`MetricsSnapshot`] - point-in-time copy, exportable as JSON
//!
//! Names are ordered in snapshots so two snapshots of equal metrics
//! serialize identically.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod collector;
mod export;
mod histogram;

pub use collector::Metrics;
pub use export::{HistogramSummary, MetricsSnapshot};
pub use histogram::{Histogram, DEFAULT_GAS_BUCKETS};
