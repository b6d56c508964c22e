//! Collects a set of metrics while a companion command runs, then prints
//! per-metric statistics. A metric that never delivers data is still listed.

use std::time::Duration;

use crossterm::style::Color;
use tracing::warn;

use crate::args::SummaryArgs;
use crate::client::DataChunk;
use crate::error::AppResult;
use crate::fanout::{MetricAccumulator, MetricSeries, collect_until_deadline};
use crate::output::{Statistics, format_sig, interval_percentiles, render_histogram, styled};
use crate::subprocess::run_command;

use super::ToolContext;

/// Grace period after the command exits, so chunks already sent by the agents
/// still make it into the summary.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

pub async fn run(context: &ToolContext, args: &SummaryArgs) -> AppResult<Option<i32>> {
    let mut client = super::connect(context).await?;
    let Some(mut data) = client.take_data() else {
        return Ok(None);
    };
    client.subscribe(&args.metric, None).await?;

    let mut accumulator =
        MetricAccumulator::with_metrics(args.metric.iter().map(String::as_str));

    let command = run_command(&args.command);
    tokio::pin!(command);
    let exit_code;
    loop {
        tokio::select! {
            result = &mut command => {
                exit_code = result?;
                break;
            }
            chunk = data.recv() => match chunk {
                Some(chunk) => record_chunk(&mut accumulator, &chunk, args.print_data_points),
                None => {
                    warn!("data connection closed while the command was running");
                    exit_code = command.await?;
                    break;
                }
            },
        }
    }

    for chunk in collect_until_deadline(&mut data, Some(DRAIN_GRACE)).await {
        record_chunk(&mut accumulator, &chunk, args.print_data_points);
    }
    client.close().await;

    report(&accumulator, args);
    Ok(exit_code)
}

fn record_chunk(accumulator: &mut MetricAccumulator, chunk: &DataChunk, print: bool) {
    accumulator.record_sender(chunk.from.as_deref());
    accumulator.record_chunk_size(chunk.points.len() as u64);
    for point in &chunk.points {
        if print {
            println!("{} {} {}", chunk.metric, point.timestamp, point.value);
        }
        accumulator.record(&chunk.metric, point.timestamp, point.value);
    }
}

fn report(accumulator: &MetricAccumulator, args: &SummaryArgs) {
    for (metric, series) in accumulator.iter_series() {
        println!();
        if series.count() == 0 {
            println!(
                "{}",
                styled(format!("No data for metric '{}' received!", metric), Color::Red)
            );
            continue;
        }
        println!(
            "{}",
            styled(format!("Statistics for metric '{}':", metric), Color::Green)
        );

        if args.intervals_histogram {
            let intervals: Vec<f64> = series
                .intervals()
                .iter()
                .map(|interval| interval.as_secs_f64())
                .collect();
            println!("Intervals between data points (s):");
            for line in render_histogram(&intervals) {
                println!("{}", line);
            }
            if let Some(line) = interval_percentiles(series.intervals()) {
                println!("{}", line);
            }
        }
        if args.values_histogram {
            println!("Values:");
            for line in render_histogram(series.values()) {
                println!("{}", line);
            }
        }
        if !args.no_print_statistics {
            print_statistics(series);
        }
    }
}

fn print_statistics(series: &MetricSeries) {
    let Some(stats) = Statistics::from_values(series.values()) else {
        return;
    };
    println!("    count:   {}", stats.count);
    println!("    minimum: {}", format_sig(stats.minimum, 6));
    println!("    maximum: {}", format_sig(stats.maximum, 6));
    println!("    mean:    {}", format_sig(stats.mean, 6));
    println!("    median:  {}", format_sig(stats.median, 6));
    println!("    stddev:  {}", format_sig(stats.standard_deviation, 6));
    println!("    variance: {}", format_sig(stats.variance, 6));
}
