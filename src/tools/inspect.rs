//! Follows one metric live until Ctrl+C, then reports who sent it, how it was
//! chunked, and how timestamps and values were distributed.

use crossterm::style::Color;
use tracing::warn;

use crate::args::InspectArgs;
use crate::error::AppResult;
use crate::fanout::MetricAccumulator;
use crate::output::{interval_percentiles, render_histogram, styled};
use crate::shutdown::{setup_signal_shutdown_handler, shutdown_channel};

use super::ToolContext;

pub async fn run(context: &ToolContext, args: &InspectArgs) -> AppResult<()> {
    let mut client = super::connect(context).await?;
    let Some(mut data) = client.take_data() else {
        return Ok(());
    };
    client
        .subscribe(std::slice::from_ref(&args.metric), None)
        .await?;

    println!(
        "{}",
        styled(
            format!(
                "Inspecting the metric '{}'. Hit Ctrl+C to stop.",
                args.metric
            ),
            Color::Green
        )
    );

    let (shutdown_tx, mut shutdown_rx) = shutdown_channel();
    let signal_task = setup_signal_shutdown_handler(&shutdown_tx);

    let mut accumulator = MetricAccumulator::with_metrics([args.metric.as_str()]);
    loop {
        tokio::select! {
            chunk = data.recv() => match chunk {
                Some(chunk) => {
                    accumulator.record_sender(chunk.from.as_deref());
                    accumulator.record_chunk_size(chunk.points.len() as u64);
                    for point in &chunk.points {
                        if args.print_data_points {
                            println!(
                                "{} {}",
                                point.timestamp,
                                styled(point.value, Color::Blue)
                            );
                        }
                        accumulator.record(&chunk.metric, point.timestamp, point.value);
                    }
                }
                None => {
                    warn!("data connection closed before Ctrl+C");
                    break;
                }
            },
            _ = shutdown_rx.recv() => break,
        }
    }
    signal_task.abort();
    client.close().await;

    report(&accumulator, args);
    Ok(())
}

fn report(accumulator: &MetricAccumulator, args: &InspectArgs) {
    println!();
    println!("Received messages from:");
    for (token, count) in accumulator.sender_counts() {
        println!("    {}: {}", styled(token, Color::Cyan), count);
    }

    let Some(series) = accumulator.series(&args.metric) else {
        return;
    };
    if series.count() == 0 {
        println!(
            "{}",
            styled(
                format!("No data received for metric '{}'.", args.metric),
                Color::Red
            )
        );
        return;
    }
    println!("Received {} data points.", series.count());

    if args.chunk_sizes_histogram {
        let sizes: Vec<f64> = accumulator
            .chunk_sizes()
            .iter()
            .map(|&size| size as f64)
            .collect();
        print_section("Chunk sizes", &render_histogram(&sizes));
    }
    if !args.no_intervals_histogram {
        let intervals: Vec<f64> = series
            .intervals()
            .iter()
            .map(|interval| interval.as_secs_f64())
            .collect();
        print_section("Intervals between data points (s)", &render_histogram(&intervals));
        if let Some(line) = interval_percentiles(series.intervals()) {
            println!("{}", line);
        }
    }
    if !args.no_values_histogram {
        print_section("Values", &render_histogram(series.values()));
    }
}

fn print_section(title: &str, lines: &[String]) {
    println!();
    println!("{}", styled(title, Color::Green));
    for line in lines {
        println!("{}", line);
    }
}
