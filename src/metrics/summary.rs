use std::time::Duration;

use serde::Serialize;

use crate::error::MetricsError;
use crate::registration::{OutcomeKind, RegistrationOutcome};

use super::LatencyHistogram;

/// Aggregate view of one load run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub duration_ms: u64,
    pub total: u64,
    pub successful: u64,
    pub rejected: u64,
    pub transport_errors: u64,
    pub timeouts: u64,
    pub configuration_errors: u64,
    pub min_latency_ms: u64,
    pub avg_latency_ms: u64,
    pub max_latency_ms: u64,
    pub p50_latency_ms: u64,
    pub p90_latency_ms: u64,
    pub p99_latency_ms: u64,
}

impl RunSummary {
    #[must_use]
    pub const fn failed(&self) -> u64 {
        self.total.saturating_sub(self.successful)
    }

    /// Success rate in hundredths of a percent (`9950` = 99.50%).
    #[must_use]
    pub fn success_rate_x100(&self) -> u64 {
        scaled_ratio(self.successful, 10_000, self.total)
    }

    /// Completed samples per second, in hundredths.
    #[must_use]
    pub fn throughput_x100(&self) -> u64 {
        scaled_ratio(self.total, 100_000, self.duration_ms.max(1))
    }
}

fn scaled_ratio(numerator: u64, scale: u128, denominator: u64) -> u64 {
    let scaled = u128::from(numerator)
        .saturating_mul(scale)
        .checked_div(u128::from(denominator))
        .unwrap_or(0);
    u64::try_from(scaled).unwrap_or(u64::MAX)
}

/// Folds outcomes into a [`RunSummary`].
#[derive(Debug)]
pub struct SummaryCollector {
    histogram: LatencyHistogram,
    summary: RunSummary,
    latency_sum_ms: u128,
}

impl SummaryCollector {
    /// # Errors
    ///
    /// Returns an error if the latency histogram cannot be created.
    pub fn new() -> Result<Self, MetricsError> {
        Ok(Self {
            histogram: LatencyHistogram::new()?,
            summary: RunSummary::default(),
            latency_sum_ms: 0,
        })
    }

    /// Counts the outcome and records its latency.
    ///
    /// # Errors
    ///
    /// Returns an error if the latency cannot be recorded.
    pub fn record(&mut self, outcome: &RegistrationOutcome) -> Result<(), MetricsError> {
        let summary = &mut self.summary;
        let counter = match outcome.kind() {
            OutcomeKind::Success => &mut summary.successful,
            OutcomeKind::Rejected => &mut summary.rejected,
            OutcomeKind::TransportError => &mut summary.transport_errors,
            OutcomeKind::Timeout => &mut summary.timeouts,
            OutcomeKind::ConfigurationError => &mut summary.configuration_errors,
        };
        *counter = counter.saturating_add(1);

        let latency_ms = outcome.elapsed_ms();
        summary.min_latency_ms = if summary.total == 0 {
            latency_ms
        } else {
            summary.min_latency_ms.min(latency_ms)
        };
        summary.max_latency_ms = summary.max_latency_ms.max(latency_ms);
        summary.total = summary.total.saturating_add(1);
        self.latency_sum_ms = self.latency_sum_ms.saturating_add(u128::from(latency_ms));
        self.histogram.record(latency_ms)
    }

    #[must_use]
    pub const fn total(&self) -> u64 {
        self.summary.total
    }

    #[must_use]
    pub fn finish(self, duration: Duration) -> RunSummary {
        let mut summary = self.summary;
        summary.duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        summary.avg_latency_ms = u64::try_from(
            self.latency_sum_ms
                .checked_div(u128::from(summary.total))
                .unwrap_or(0),
        )
        .unwrap_or(u64::MAX);
        let (p50, p90, p99) = self.histogram.percentiles();
        summary.p50_latency_ms = p50;
        summary.p90_latency_ms = p90;
        summary.p99_latency_ms = p99;
        summary
    }
}
