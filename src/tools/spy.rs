//! Looks up metadata for a set of metrics and, for historic ones, which
//! database actually stores them.

use std::collections::BTreeMap;
use std::time::Duration;

use crossterm::style::Color;
use serde_json::{Value, json};
use tokio::time::timeout;
use tracing::debug;

use crate::args::{OutputFormat, SpyArgs};
use crate::client::{Client, MetricMetadata};
use crate::error::AppResult;
use crate::output::styled;
use crate::time::Timedelta;

use super::ToolContext;

/// Databases that hold the metric answer quickly; anything slower is treated
/// as "nobody stores this".
const LOCATION_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
/// Keeps the probe cheap even for densely sampled metrics.
const LOCATION_PROBE_INTERVAL_MAX: Timedelta = Timedelta::from_seconds(60);

pub async fn run(context: &ToolContext, args: &SpyArgs) -> AppResult<()> {
    let client = super::connect(context).await?;

    let mut report = BTreeMap::new();
    for pattern in &args.metrics {
        let metadata = client.get_metrics_metadata(pattern).await?;
        if metadata.is_empty() {
            debug!(pattern = %pattern, "no metrics matched");
        }
        for (metric, metadata) in metadata {
            let location = if is_historic(&metadata) {
                probe_location(&client, &metric).await
            } else {
                None
            };
            report.insert(metric, (location, metadata));
        }
    }
    client.close().await;

    match args.format {
        OutputFormat::Json => {
            let report: BTreeMap<&str, Value> = report
                .iter()
                .map(|(metric, (location, metadata))| {
                    (
                        metric.as_str(),
                        json!({
                            "location": location,
                            "metadata": visible_metadata(metadata),
                        }),
                    )
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Pretty => {
            for (metric, (location, metadata)) in &report {
                println!("{}", styled(metric, Color::Cyan));
                if let Some(location) = location {
                    println!("    stored on {}", styled(location, Color::Red));
                }
                for (key, value) in visible_metadata(metadata) {
                    println!("    {}: {}", key, value);
                }
            }
        }
    }
    Ok(())
}

fn is_historic(metadata: &MetricMetadata) -> bool {
    metadata
        .get("historic")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Internal metadata keys carry a `_` prefix and are not shown.
fn visible_metadata(metadata: &MetricMetadata) -> BTreeMap<&str, &Value> {
    metadata
        .iter()
        .filter(|(key, _)| !key.starts_with('_'))
        .map(|(key, value)| (key.as_str(), value))
        .collect()
}

/// Issues a cheap aggregate request and reports which database replied.
async fn probe_location(client: &Client, metric: &str) -> Option<String> {
    let end = crate::time::Timestamp::now();
    let start = end - LOCATION_PROBE_INTERVAL_MAX;
    let probe = client.history_aggregate_from(metric, start, end, Some(LOCATION_PROBE_INTERVAL_MAX));
    match timeout(LOCATION_PROBE_TIMEOUT, probe).await {
        Ok(Ok((from, _))) => from,
        Ok(Err(error)) => {
            debug!(metric = %metric, %error, "location probe failed");
            None
        }
        Err(_) => {
            debug!(metric = %metric, "location probe timed out");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn historic_flag_is_read_from_metadata() {
        let metadata = MetricMetadata::from([("historic".to_owned(), json!(true))]);
        assert!(is_historic(&metadata));
        assert!(!is_historic(&MetricMetadata::new()));
        let metadata = MetricMetadata::from([("historic".to_owned(), json!("yes"))]);
        assert!(!is_historic(&metadata));
    }

    #[test]
    fn underscore_keys_are_hidden() {
        let metadata = MetricMetadata::from([
            ("unit".to_owned(), json!("W")),
            ("_id".to_owned(), json!(7)),
        ]);
        let visible = visible_metadata(&metadata);
        assert!(visible.contains_key("unit"));
        assert!(!visible.contains_key("_id"));
    }
}
