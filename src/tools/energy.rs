//! Integrates a power metric over the runtime of a companion command.
//!
//! The subscription channel is drained continuously while the command runs,
//! so the data dispatch task is never parked on a full channel no matter how
//! long the command takes. The window is cut to the command's start and end
//! times afterwards, so startup and drain slack never distort the integral.

use std::future::Future;

use crossterm::style::Color;
use tokio::sync::mpsc;
use tracing::{error, warn};

use crate::args::EnergyArgs;
use crate::client::{DataChunk, DataPoint};
use crate::error::{AppError, AppResult, ValidationError};
use crate::output::styled;
use crate::subprocess::run_command;
use crate::time::Timestamp;

use super::ToolContext;

/// Below this sample count the integral is too coarse to trust.
const MINIMUM_SAMPLES: usize = 10;

pub async fn run(context: &ToolContext, args: &EnergyArgs) -> AppResult<Option<i32>> {
    if args.expires == 0 {
        return Err(AppError::validation(ValidationError::ExpiresZero));
    }

    let mut client = super::connect(context).await?;
    let Some(mut data) = client.take_data() else {
        return Ok(None);
    };
    client
        .subscribe(std::slice::from_ref(&args.metric), Some(args.expires))
        .await?;

    let start = Timestamp::now();
    let (exit_code, points) = collect_during(&mut data, run_command(&args.command)).await?;
    let end = Timestamp::now();
    client.close().await;

    report(&points, start, end);
    Ok(exit_code)
}

/// Runs `command` while continuously draining the subscription channel, then
/// empties whatever is still buffered once the command has exited.
async fn collect_during(
    data: &mut mpsc::Receiver<DataChunk>,
    command: impl Future<Output = AppResult<Option<i32>>>,
) -> AppResult<(Option<i32>, Vec<DataPoint>)> {
    tokio::pin!(command);
    let mut points = Vec::new();
    let exit_code;
    loop {
        tokio::select! {
            result = &mut command => {
                exit_code = result?;
                break;
            }
            chunk = data.recv() => match chunk {
                Some(chunk) => points.extend(chunk.points),
                None => {
                    warn!("data connection closed while the command was running");
                    exit_code = command.await?;
                    break;
                }
            },
        }
    }
    // Backlog that piled up between the last poll and the command's exit
    // still belongs to the measurement; drain until the channel is empty.
    while let Ok(chunk) = data.try_recv() {
        points.extend(chunk.points);
    }
    Ok((exit_code, points))
}

fn report(points: &[DataPoint], start: Timestamp, end: Timestamp) {
    let values = in_window(points, start, end);
    let duration_s = (end - start).as_secs_f64();
    println!(
        "[metricq-energy] duration: {:.1} s, number of values: {}",
        duration_s,
        values.len()
    );

    if values.is_empty() {
        error!("no data points within the command runtime, cannot compute energy");
        eprintln!(
            "{}",
            styled(
                "[metricq-energy] no data received within the command runtime",
                Color::Red
            )
        );
        return;
    }
    if values.len() < MINIMUM_SAMPLES {
        warn!(
            count = values.len(),
            "very few data points within the command runtime, energy value will be inaccurate"
        );
    }

    let mean_power = values.iter().sum::<f64>() / values.len() as f64;
    println!("[metricq-energy] Mean Power: {:.1} W", mean_power);
    println!(
        "[metricq-energy] Energy Consumption: {:.1} J",
        mean_power * duration_s
    );
}

/// Values of the samples with `start <= t <= end`.
fn in_window(points: &[DataPoint], start: Timestamp, end: Timestamp) -> Vec<f64> {
    points
        .iter()
        .filter(|point| point.timestamp >= start && point.timestamp <= end)
        .map(|point| point.value)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(points: &[(i64, f64)]) -> DataChunk {
        DataChunk {
            metric: "elab.node.power".to_owned(),
            from: None,
            points: points
                .iter()
                .map(|&(seconds, value)| DataPoint {
                    timestamp: Timestamp::from_posix_nanos(seconds * 1_000_000_000),
                    value,
                })
                .collect(),
        }
    }

    #[test]
    fn samples_outside_the_window_are_ignored() {
        let points = chunk(&[(5, 1_000_000.0), (15, 100.0), (25, 1_000_000.0)]).points;
        let start = Timestamp::from_posix_nanos(10 * 1_000_000_000);
        let end = Timestamp::from_posix_nanos(20 * 1_000_000_000);
        assert_eq!(in_window(&points, start, end), vec![100.0]);
    }

    #[test]
    fn empty_windows_have_no_values() {
        let start = Timestamp::from_posix_nanos(0);
        let end = Timestamp::from_posix_nanos(1_000_000_000);
        assert!(in_window(&[], start, end).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn backlog_beyond_channel_capacity_is_not_lost() {
        // The producer sends far more chunks than the channel holds; only the
        // concurrent drain keeps it from parking while the command runs.
        let (tx, mut rx) = mpsc::channel(4);
        let producer = tokio::spawn(async move {
            for second in 0..64i64 {
                tx.send(chunk(&[(second, 200.0)])).await.unwrap();
            }
        });
        let command = async {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            Ok(Some(0))
        };

        let (exit_code, points) = collect_during(&mut rx, command).await.unwrap();
        producer.await.unwrap();
        assert_eq!(exit_code, Some(0));
        assert_eq!(points.len(), 64);
    }

    #[tokio::test]
    async fn chunks_buffered_at_command_exit_are_drained() {
        let (tx, mut rx) = mpsc::channel(16);
        tx.send(chunk(&[(1, 100.0)])).await.unwrap();
        tx.send(chunk(&[(2, 110.0), (3, 120.0)])).await.unwrap();

        let (_, points) = collect_during(&mut rx, async { Ok(Some(0)) })
            .await
            .unwrap();
        assert_eq!(points.len(), 3);
    }

    #[test]
    fn constant_power_over_the_window_integrates_linearly() {
        let points = chunk(&[
            (10, 200.0),
            (11, 200.0),
            (12, 200.0),
            (13, 200.0),
            (14, 200.0),
            (15, 200.0),
            (16, 200.0),
            (17, 200.0),
            (18, 200.0),
            (19, 200.0),
        ])
        .points;
        let start = Timestamp::from_posix_nanos(10 * 1_000_000_000);
        let end = Timestamp::from_posix_nanos(20 * 1_000_000_000);
        let values = in_window(&points, start, end);
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        assert_eq!(mean, 200.0);
        assert_eq!(mean * (end - start).as_secs_f64(), 2000.0);
    }
}
