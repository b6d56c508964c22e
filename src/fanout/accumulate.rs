use std::collections::BTreeMap;

use crate::time::{Timedelta, Timestamp};

/// Ordered samples of one metric plus the gaps between consecutive arrivals.
/// The first sample never contributes a gap.
#[derive(Debug, Default)]
pub struct MetricSeries {
    timestamps: Vec<Timestamp>,
    values: Vec<f64>,
    intervals: Vec<Timedelta>,
    last_timestamp: Option<Timestamp>,
}

impl MetricSeries {
    fn record(&mut self, timestamp: Timestamp, value: f64) {
        if let Some(last) = self.last_timestamp {
            self.intervals.push(timestamp - last);
        }
        self.last_timestamp = Some(timestamp);
        self.timestamps.push(timestamp);
        self.values.push(value);
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    #[must_use]
    pub fn timestamps(&self) -> &[Timestamp] {
        &self.timestamps
    }

    #[must_use]
    pub fn intervals(&self) -> &[Timedelta] {
        &self.intervals
    }
}

/// Live-stream accumulator for the inspection and summary tools. Appends are
/// O(1) amortized so the data dispatch task is never blocked.
#[derive(Debug, Default)]
pub struct MetricAccumulator {
    series: BTreeMap<String, MetricSeries>,
    sender_counts: BTreeMap<String, u64>,
    chunk_sizes: Vec<u64>,
}

impl MetricAccumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracks `metrics` from the start so metrics that never deliver data
    /// still show up in the report.
    #[must_use]
    pub fn with_metrics<'a>(metrics: impl IntoIterator<Item = &'a str>) -> Self {
        let mut accumulator = Self::default();
        for metric in metrics {
            accumulator.series.entry(metric.to_owned()).or_default();
        }
        accumulator
    }

    pub fn record(&mut self, metric: &str, timestamp: Timestamp, value: f64) {
        match self.series.get_mut(metric) {
            Some(series) => series.record(timestamp, value),
            None => {
                let mut series = MetricSeries::default();
                series.record(timestamp, value);
                self.series.insert(metric.to_owned(), series);
            }
        }
    }

    pub fn record_sender(&mut self, token: Option<&str>) {
        let token = token.unwrap_or("<unknown>");
        *self.sender_counts.entry(token.to_owned()).or_insert(0) += 1;
    }

    pub fn record_chunk_size(&mut self, size: u64) {
        self.chunk_sizes.push(size);
    }

    #[must_use]
    pub fn series(&self, metric: &str) -> Option<&MetricSeries> {
        self.series.get(metric)
    }

    pub fn iter_series(&self) -> impl Iterator<Item = (&String, &MetricSeries)> {
        self.series.iter()
    }

    #[must_use]
    pub const fn sender_counts(&self) -> &BTreeMap<String, u64> {
        &self.sender_counts
    }

    #[must_use]
    pub fn chunk_sizes(&self) -> &[u64] {
        &self.chunk_sizes
    }
}
