//! Latency histogram and run-level aggregation of sample outcomes.
mod histogram;
mod summary;


pub use histogram::LatencyHistogram;
pub use summary::{RunSummary, SummaryCollector};
