//! Computes the energy consumed by finished SLURM jobs from a per-host power
//! metric. Job data comes from `sacct`, energy from one aggregate request per
//! host, fanned out concurrently.

use chrono::{Local, NaiveDateTime, Utc};
use tracing::{debug, error, warn};

use crate::args::SlurmArgs;
use crate::client::TimeAggregate;
use crate::error::{AppError, AppResult, HistoryError, ValidationError};
use crate::fanout::{self, NoProgress, Outcome};
use crate::output::render_table;
use crate::time::Timestamp;

use super::ToolContext;

/// One `sacct --parsable2` row, job steps like `.batch` already filtered out.
#[derive(Debug, Clone, PartialEq)]
struct SlurmJob {
    job_id: String,
    job_name: String,
    start: Option<Timestamp>,
    end: Option<Timestamp>,
    hosts: Vec<String>,
}

pub async fn run(context: &ToolContext, args: &SlurmArgs) -> AppResult<()> {
    let jobs = query_sacct(&args.jobs).await?;
    if jobs.is_empty() {
        warn!(jobs = %args.jobs, "sacct returned no finished jobs");
        return Ok(());
    }

    let client = super::connect(context).await?;
    let mut rows = Vec::new();
    for job in &jobs {
        let energy = job_energy(&client, job, &args.metric).await;
        let energy = match energy {
            Some(energy) if energy.is_finite() => format!("{:.1} J", energy),
            _ => "N/A".to_owned(),
        };
        rows.push(vec![job.job_id.clone(), job.job_name.clone(), energy]);
    }
    client.close().await;

    print!("{}", render_table(&["JobID", "JobName", "Energy"], &rows));
    Ok(())
}

/// Sums per-host energy over the job runtime. Any host without usable data
/// poisons the total, which the caller renders as N/A.
async fn job_energy(client: &crate::client::Client, job: &SlurmJob, metric: &str) -> Option<f64> {
    let (Some(start), Some(end)) = (job.start, job.end) else {
        warn!(job = %job.job_id, "job has not finished, skipping");
        return None;
    };

    let client_ref = &client;
    let metric_by_host: std::collections::BTreeMap<String, String> = job
        .hosts
        .iter()
        .map(|host| {
            (
                host.clone(),
                metric.replace("${HOST}", host).replace("$HOST", host),
            )
        })
        .collect();
    let metrics = &metric_by_host;
    let outcomes = fanout::run(
        job.hosts.iter().cloned(),
        |host| async move {
            let metric = metrics
                .get(&host)
                .map_or_else(|| host.clone(), Clone::clone);
            client_ref.history_aggregate(&metric, start, end).await
        },
        None,
        &mut NoProgress,
    )
    .await;

    let mut total = 0.0;
    for (host, outcome) in &outcomes {
        match outcome {
            Outcome::Success(aggregate) => match host_energy(aggregate) {
                Some(energy) => total += energy,
                None => {
                    error!(job = %job.job_id, host = %host, "no power data for host");
                    return None;
                }
            },
            Outcome::Error(HistoryError::NoData) => {
                error!(job = %job.job_id, host = %host, "no power data for host");
                return None;
            }
            Outcome::Error(history_error) => {
                error!(job = %job.job_id, host = %host, error = %history_error, "energy query failed");
                return None;
            }
            Outcome::Timeout => return None,
        }
    }
    Some(total)
}

fn host_energy(aggregate: &TimeAggregate) -> Option<f64> {
    if aggregate.count == 0 {
        return None;
    }
    if aggregate.count < 10 {
        warn!(count = aggregate.count, "very few power samples, energy value will be inaccurate");
    }
    if aggregate.minimum < 0.0 {
        warn!(minimum = aggregate.minimum, "negative power values in range");
    }
    Some(aggregate.integral_s)
}

async fn query_sacct(jobs: &str) -> AppResult<Vec<SlurmJob>> {
    let output = tokio::process::Command::new("sacct")
        .args([
            "--parsable2",
            "--noheader",
            "--format=JobID,JobName,Start,End,NodeList",
            "--jobs",
            jobs,
        ])
        .output()
        .await?;
    if !output.stderr.is_empty() {
        error!("sacct: {}", String::from_utf8_lossy(&output.stderr).trim_end());
    }
    parse_sacct(&String::from_utf8_lossy(&output.stdout))
}

fn parse_sacct(output: &str) -> AppResult<Vec<SlurmJob>> {
    let mut jobs = Vec::new();
    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split('|').collect();
        let [job_id, job_name, start, end, node_list] = fields.as_slice() else {
            return Err(AppError::validation(ValidationError::MalformedSacctRow {
                row: line.to_owned(),
            }));
        };
        // Job steps repeat the accounting data of their parent job.
        if job_id.ends_with(".batch") || job_id.ends_with(".extern") {
            debug!(job = %job_id, "skipping job step");
            continue;
        }
        jobs.push(SlurmJob {
            job_id: (*job_id).to_owned(),
            job_name: (*job_name).to_owned(),
            start: parse_sacct_time(start),
            end: parse_sacct_time(end),
            hosts: expand_hostlist(node_list)?,
        });
    }
    Ok(jobs)
}

/// `sacct` reports local time without an offset; `Unknown` and `None` mark
/// jobs that have not reached that state yet.
fn parse_sacct_time(value: &str) -> Option<Timestamp> {
    if value.is_empty() || value == "Unknown" || value == "None" {
        return None;
    }
    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S").ok()?;
    let local = naive.and_local_timezone(Local).single()?;
    let nanos = local.with_timezone(&Utc).timestamp_nanos_opt()?;
    Some(Timestamp::from_posix_nanos(nanos))
}

/// Expands a SLURM hostlist such as `node[01-03,07],head` into individual
/// host names, preserving zero padding.
fn expand_hostlist(hostlist: &str) -> Result<Vec<String>, ValidationError> {
    let mut hosts = Vec::new();
    let mut rest = hostlist.trim();
    while !rest.is_empty() {
        let (entry, remainder) = split_hostlist_entry(rest)?;
        expand_hostlist_entry(entry, &mut hosts)?;
        rest = remainder.trim_start_matches(',').trim();
    }
    if hosts.is_empty() && !hostlist.trim().is_empty() {
        return Err(ValidationError::InvalidHostlist {
            value: hostlist.to_owned(),
        });
    }
    Ok(hosts)
}

/// Splits off the first entry, respecting brackets: `a[1-2],b` -> (`a[1-2]`, `b`).
fn split_hostlist_entry(hostlist: &str) -> Result<(&str, &str), ValidationError> {
    let mut depth = 0usize;
    for (index, ch) in hostlist.char_indices() {
        match ch {
            '[' => depth += 1,
            ']' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| ValidationError::InvalidHostlist {
                        value: hostlist.to_owned(),
                    })?;
            }
            ',' if depth == 0 => {
                let (entry, rest) = hostlist.split_at(index);
                return Ok((entry, rest));
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(ValidationError::InvalidHostlist {
            value: hostlist.to_owned(),
        });
    }
    Ok((hostlist, ""))
}

fn expand_hostlist_entry(entry: &str, hosts: &mut Vec<String>) -> Result<(), ValidationError> {
    let Some((prefix, rest)) = entry.split_once('[') else {
        if !entry.is_empty() {
            hosts.push(entry.to_owned());
        }
        return Ok(());
    };
    let Some((ranges, suffix)) = rest.split_once(']') else {
        return Err(ValidationError::InvalidHostlist {
            value: entry.to_owned(),
        });
    };

    for range in ranges.split(',') {
        let (low, high) = match range.split_once('-') {
            Some((low, high)) => (low, high),
            None => (range, range),
        };
        let width = low.len();
        let low_value = parse_hostlist_number(low)?;
        let high_value = parse_hostlist_number(high)?;
        for number in low_value..=high_value {
            hosts.push(format!("{}{:0width$}{}", prefix, number, suffix));
        }
    }
    Ok(())
}

fn parse_hostlist_number(value: &str) -> Result<u64, ValidationError> {
    value
        .parse()
        .map_err(|source| ValidationError::InvalidHostlistRange {
            value: value.to_owned(),
            source,
        })
}
