//! Network discovery: broadcast an RPC to every connected client and render
//! the replies that arrive within the collection window.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::args::{DiscoverArgs, IgnoredEvent, OutputFormat};
use crate::error::AppResult;
use crate::fanout::collect_until_deadline;
use crate::output::{Status, echo_status};
use crate::time::Timedelta;

use super::ToolContext;

/// How long to wait for replies when no --timeout is given.
const DEFAULT_COLLECTION_WINDOW: Duration = Duration::from_secs(30);

/// A discovery reply body. Clients of different ages report different subsets
/// of these fields, so everything is optional and unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct DiscoverReply {
    alive: Option<bool>,
    error: Option<String>,
    current_time: Option<String>,
    starting_time: Option<String>,
    uptime: Option<f64>,
    metricq_version: Option<String>,
    // Older clients report their own version as plain "version".
    #[serde(alias = "version")]
    client_version: Option<String>,
    hostname: Option<String>,
}

impl DiscoverReply {
    fn parse(body: &Value) -> Self {
        serde_json::from_value(body.clone()).unwrap_or_default()
    }

    /// Prefers the explicit uptime field. Some clients report it in seconds,
    /// some in nanoseconds; values below 1e9 are taken as seconds. Clients
    /// without the field get the difference of their reported clocks instead.
    fn uptime(&self) -> Option<Duration> {
        if let Some(uptime) = self.uptime {
            if !uptime.is_finite() || uptime < 0.0 {
                return None;
            }
            let seconds = if uptime < 1e9 { uptime } else { uptime / 1e9 };
            return Some(Duration::from_secs_f64(seconds));
        }
        let current = parse_reply_time(self.current_time.as_deref()?)?;
        let starting = parse_reply_time(self.starting_time.as_deref()?)?;
        (current - starting).to_std().ok()
    }

    fn describe(&self) -> (Status, String) {
        if let Some(error) = &self.error {
            return (Status::Error, format!("error: {}", error));
        }

        let mut message = String::from("client is alive");
        if let Some(uptime) = self.uptime() {
            // Sub-second noise only obscures the rendered uptime.
            let uptime = Duration::from_secs(uptime.as_secs());
            message.push_str(&format!(", up for {}", humantime::format_duration(uptime)));
        }
        if let Some(starting_time) = &self.starting_time {
            message.push_str(&format!(" (started {})", starting_time));
        }
        if let Some(version) = &self.client_version {
            message.push_str(&format!(", version {}", version));
        }
        if let Some(metricq_version) = &self.metricq_version {
            message.push_str(&format!(", running metricq {}", metricq_version));
        }
        if let Some(hostname) = &self.hostname {
            message.push_str(&format!(" on {}", hostname));
        }

        if self.alive == Some(false) {
            (Status::Warning, format!("possibly unresponsive: {}", message))
        } else {
            (Status::Ok, message)
        }
    }
}

fn parse_reply_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|datetime| datetime.with_timezone(&Utc))
}

pub async fn run(context: &ToolContext, args: &DiscoverArgs) -> AppResult<()> {
    let mut client = super::connect(context).await?;
    let Some(mut replies) = client.take_replies() else {
        return Ok(());
    };

    let window = args
        .timeout
        .map_or(DEFAULT_COLLECTION_WINDOW, Timedelta::to_duration);
    client.broadcast("discover").await?;
    debug!(?window, "collecting discovery replies");
    let collected = collect_until_deadline(&mut replies, Some(window)).await;
    client.close().await;

    match &args.diff {
        Some(previous) => render_diff(previous, &collected, args.format),
        None => {
            render_replies(&collected, args.format, &args.ignore)?;
            Ok(())
        }
    }
}

fn render_replies(
    collected: &[(String, Value)],
    format: OutputFormat,
    ignore: &[IgnoredEvent],
) -> AppResult<()> {
    match format {
        OutputFormat::Json => {
            let replies: BTreeMap<&str, &Value> = collected
                .iter()
                .map(|(token, body)| (token.as_str(), body))
                .collect();
            println!("{}", serde_json::to_string_pretty(&replies)?);
        }
        OutputFormat::Pretty => {
            let ignore_errors = ignore.contains(&IgnoredEvent::ErrorResponses);
            for (token, body) in collected {
                let reply = DiscoverReply::parse(body);
                if ignore_errors && reply.error.is_some() {
                    continue;
                }
                let (status, message) = reply.describe();
                echo_status(status, token, &message);
            }
            eprintln!("{} clients responded", collected.len());
        }
    }
    Ok(())
}

/// Compares the current replies against a previously saved `--format=json`
/// dump and reports which clients went missing or newly appeared.
fn render_diff(
    previous: &std::path::Path,
    collected: &[(String, Value)],
    format: OutputFormat,
) -> AppResult<()> {
    let content = std::fs::read_to_string(previous)?;
    let previous: BTreeMap<String, Value> = serde_json::from_str(&content)?;
    let current: BTreeMap<&str, &Value> = collected
        .iter()
        .map(|(token, body)| (token.as_str(), body))
        .collect();

    let missing: BTreeMap<&str, &Value> = previous
        .iter()
        .filter(|(token, _)| !current.contains_key(token.as_str()))
        .map(|(token, body)| (token.as_str(), body))
        .collect();
    let additional: BTreeMap<&str, &Value> = current
        .iter()
        .filter(|(token, _)| !previous.contains_key(**token))
        .map(|(token, body)| (*token, *body))
        .collect();

    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "missing": missing,
                    "additional": additional,
                }))?
            );
        }
        OutputFormat::Pretty => {
            for token in missing.keys() {
                echo_status(Status::Error, token, "missing");
            }
            for token in additional.keys() {
                echo_status(Status::Ok, token, "newly discovered");
            }
            eprintln!(
                "{} clients missing, {} newly discovered",
                missing.len(),
                additional.len()
            );
        }
    }
    Ok(())
}
