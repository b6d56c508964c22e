//! Historic-data operations and metric metadata lookups.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::{ClientError, HistoryError};
use crate::time::{Timedelta, Timestamp};

use super::Client;

pub type MetricMetadata = BTreeMap<String, Value>;

/// Aggregate over one metric and time range, as reported by a database.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TimeAggregate {
    pub minimum: f64,
    pub maximum: f64,
    pub sum: f64,
    pub count: u64,
    /// Time integral of the value in value-seconds (joule for watts).
    pub integral_s: f64,
}

impl TimeAggregate {
    #[must_use]
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            f64::NAN
        } else {
            self.sum / self.count as f64
        }
    }
}

impl std::fmt::Display for TimeAggregate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "minimum={} maximum={} count={}",
            self.minimum, self.maximum, self.count
        )
    }
}

/// One historic sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeValue {
    pub timestamp: Timestamp,
    pub value: f64,
}

#[derive(Debug, Deserialize)]
struct RawTimeline {
    timestamps_ns: Vec<i64>,
    values: Vec<f64>,
}

fn history_error(error: ClientError) -> HistoryError {
    match error {
        ClientError::Rpc { message, .. } => HistoryError::Remote { message },
        ClientError::ConnectionClosed => HistoryError::ChannelClosed,
        other => HistoryError::MalformedResponse {
            detail: other.to_string(),
        },
    }
}

impl Client {
    /// Lists metric names starting with `prefix`, without metadata.
    ///
    /// # Errors
    ///
    /// Fatal: a failing listing aborts the run.
    pub async fn get_metric_names(
        &self,
        prefix: &str,
        limit: u64,
    ) -> Result<Vec<String>, ClientError> {
        let body = self
            .rpc(
                "get_metrics",
                json!({ "prefix": prefix, "metadata": false, "limit": limit }),
            )
            .await?;
        let names = body
            .get("metrics")
            .and_then(Value::as_array)
            .ok_or(ClientError::UnexpectedResponse {
                function: "get_metrics",
                detail: "missing 'metrics' array".to_owned(),
            })?
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_owned)
            .collect();
        Ok(names)
    }

    /// Resolves metadata for all metrics matching `selector`.
    ///
    /// # Errors
    ///
    /// Fatal: a failing lookup aborts the run.
    pub async fn get_metrics_metadata(
        &self,
        selector: &str,
    ) -> Result<BTreeMap<String, MetricMetadata>, ClientError> {
        let body = self
            .rpc(
                "get_metrics",
                json!({ "selector": selector, "metadata": true }),
            )
            .await?;
        let metrics = body
            .get("metrics")
            .and_then(Value::as_object)
            .ok_or(ClientError::UnexpectedResponse {
                function: "get_metrics",
                detail: "missing 'metrics' object".to_owned(),
            })?;
        let mut result = BTreeMap::new();
        for (metric, metadata) in metrics {
            let metadata = match metadata.as_object() {
                Some(object) => object
                    .iter()
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect(),
                None => MetricMetadata::new(),
            };
            result.insert(metric.clone(), metadata);
        }
        Ok(result)
    }

    /// Requests the aggregate of `metric` between `start` and `end`.
    ///
    /// # Errors
    ///
    /// Per-metric: recorded as an outcome by the fan-out engine, never fatal.
    pub async fn history_aggregate(
        &self,
        metric: &str,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<TimeAggregate, HistoryError> {
        self.history_aggregate_from(metric, start, end, None)
            .await
            .map(|(_, aggregate)| aggregate)
    }

    /// Like [`Client::history_aggregate`], additionally reporting which
    /// database answered and bounding the covered interval.
    ///
    /// # Errors
    ///
    /// Per-metric: recorded as an outcome by the fan-out engine, never fatal.
    pub async fn history_aggregate_from(
        &self,
        metric: &str,
        start: Timestamp,
        end: Timestamp,
        interval_max: Option<Timedelta>,
    ) -> Result<(Option<String>, TimeAggregate), HistoryError> {
        let mut args = json!({
            "metric": metric,
            "start_time_ns": start.posix_nanos(),
            "end_time_ns": end.posix_nanos(),
        });
        if let (Some(object), Some(interval)) = (args.as_object_mut(), interval_max) {
            object.insert("interval_max_ns".to_owned(), json!(interval.nanos()));
        }
        let (from, body) = self
            .rpc_from_unbounded("history.aggregate", args)
            .await
            .map_err(history_error)?;
        if body.is_null() {
            return Err(HistoryError::NoData);
        }
        let aggregate: TimeAggregate =
            serde_json::from_value(body).map_err(|error| HistoryError::MalformedResponse {
                detail: error.to_string(),
            })?;
        Ok((from, aggregate))
    }

    /// Fetches the full raw timeline of `metric` between `start` and `end`.
    ///
    /// # Errors
    ///
    /// Fatal: the csv tool reads a single metric, so a failing fetch aborts
    /// the run.
    pub async fn history_raw_timeline(
        &self,
        metric: &str,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<TimeValue>, ClientError> {
        let body = self
            .rpc_unbounded(
                "history.raw_timeline",
                json!({
                    "metric": metric,
                    "start_time_ns": start.posix_nanos(),
                    "end_time_ns": end.posix_nanos(),
                }),
            )
            .await?;
        let timeline: RawTimeline =
            serde_json::from_value(body).map_err(|_| ClientError::UnexpectedResponse {
                function: "history.raw_timeline",
                detail: "expected 'timestamps_ns' and 'values' arrays".to_owned(),
            })?;
        Ok(timeline
            .timestamps_ns
            .iter()
            .zip(timeline.values.iter())
            .map(|(&timestamp_ns, &value)| TimeValue {
                timestamp: Timestamp::from_posix_nanos(timestamp_ns),
                value,
            })
            .collect())
    }
}
