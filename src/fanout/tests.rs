use std::time::Duration;

use tokio::sync::mpsc;

use super::*;
use crate::time::Timestamp;

/// Progress sink that records every advancement it sees.
#[derive(Debug, Default)]
struct RecordingProgress {
    total: usize,
    advancements: Vec<usize>,
    finished: bool,
}

impl ProgressSink for RecordingProgress {
    fn begin(&mut self, total: usize) {
        self.total = total;
    }

    fn advance(&mut self, completed: usize) {
        self.advancements.push(completed);
    }

    fn finish(&mut self) {
        self.finished = true;
    }
}

#[tokio::test]
async fn empty_input_yields_empty_outcome_set() {
    let mut progress = RecordingProgress::default();
    let outcomes: OutcomeSet<u64, String> = run(
        Vec::new(),
        |_id| async { Ok(0) },
        Some(Duration::from_millis(100)),
        &mut progress,
    )
    .await;

    assert!(outcomes.is_empty());
    assert_eq!(progress.total, 0);
    assert!(progress.advancements.is_empty());
    assert!(progress.finished);
}

#[tokio::test(start_paused = true)]
async fn mixed_outcomes_are_isolated_per_query() {
    // 5 queries: one sleeps past the 100ms timeout, one fails, three succeed.
    let identifiers = ["a", "b", "c", "d", "e"].map(str::to_owned).to_vec();
    let mut progress = RecordingProgress::default();

    let outcomes = run(
        identifiers,
        |id| async move {
            match id.as_str() {
                "c" => {
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    Ok(0u64)
                }
                "d" => Err("no data".to_owned()),
                _ => Ok(1u64),
            }
        },
        Some(Duration::from_millis(100)),
        &mut progress,
    )
    .await;

    assert_eq!(outcomes.len(), 5);
    assert_eq!(outcomes.get("a"), Some(&Outcome::Success(1)));
    assert_eq!(outcomes.get("b"), Some(&Outcome::Success(1)));
    assert_eq!(outcomes.get("c"), Some(&Outcome::Timeout));
    assert_eq!(outcomes.get("d"), Some(&Outcome::Error("no data".to_owned())));
    assert_eq!(outcomes.get("e"), Some(&Outcome::Success(1)));

    assert_eq!(progress.total, 5);
    assert_eq!(progress.advancements, vec![1, 2, 3, 4, 5]);
    assert!(progress.finished);
}

#[tokio::test(start_paused = true)]
async fn unconfigured_timeout_never_synthesizes_timeout_outcomes() {
    let outcomes: OutcomeSet<(), String> = run(
        vec!["slow".to_owned()],
        |_id| async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        },
        None,
        &mut NoProgress,
    )
    .await;

    assert_eq!(outcomes.get("slow"), Some(&Outcome::Success(())));
}

#[tokio::test(start_paused = true)]
async fn slow_queries_do_not_delay_fast_completions() {
    // Completion order is settlement order, observable via the progress sink.
    let mut progress = RecordingProgress::default();
    let outcomes: OutcomeSet<&'static str, String> = run(
        vec!["slow".to_owned(), "fast".to_owned()],
        |id| async move {
            if id == "slow" {
                tokio::time::sleep(Duration::from_millis(90)).await;
                Ok("late")
            } else {
                Ok("early")
            }
        },
        Some(Duration::from_millis(100)),
        &mut progress,
    )
    .await;

    assert_eq!(outcomes.len(), 2);
    assert_eq!(progress.advancements, vec![1, 2]);
}

#[tokio::test]
async fn outcome_set_orders_identifiers_deterministically() {
    let outcomes: OutcomeSet<u32, String> = run(
        vec!["zeta".to_owned(), "alpha".to_owned(), "mid".to_owned()],
        |_id| async { Ok(7) },
        None,
        &mut NoProgress,
    )
    .await;

    let keys: Vec<&String> = outcomes.keys().collect();
    assert_eq!(keys, ["alpha", "mid", "zeta"]);
}

#[tokio::test(start_paused = true)]
async fn broadcast_collection_honors_the_shared_deadline() {
    let (tx, mut rx) = mpsc::channel(16);

    tokio::spawn(async move {
        for (delay_ms, token) in [(10u64, "early"), (50, "mid"), (500, "late")] {
            let tx = tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                drop(tx.send(token).await);
            });
        }
    });

    let collected = collect_until_deadline(&mut rx, Some(Duration::from_millis(200))).await;
    assert_eq!(collected, vec!["early", "mid"]);
}

#[tokio::test]
async fn broadcast_collection_drains_buffered_items_on_expiry() {
    let (tx, mut rx) = mpsc::channel(16);
    tx.send("queued-1").await.unwrap();
    tx.send("queued-2").await.unwrap();

    let collected = collect_until_deadline(&mut rx, Some(Duration::ZERO)).await;
    assert_eq!(collected.len(), 2);
}

#[tokio::test]
async fn broadcast_collection_without_deadline_ends_on_close() {
    let (tx, mut rx) = mpsc::channel(4);
    tx.send(1u32).await.unwrap();
    drop(tx);

    let collected = collect_until_deadline(&mut rx, None).await;
    assert_eq!(collected, vec![1]);
}

#[test]
fn accumulator_tracks_intervals_without_a_leading_gap() {
    let mut accumulator = MetricAccumulator::new();
    for (seconds, value) in [(0i64, 1.0), (1, 2.0), (3, 3.0), (6, 4.0)] {
        accumulator.record(
            "power",
            Timestamp::from_posix_nanos(seconds * 1_000_000_000),
            value,
        );
    }

    let series = accumulator.series("power").unwrap();
    assert_eq!(series.count(), 4);
    let gaps: Vec<f64> = series
        .intervals()
        .iter()
        .map(|interval| interval.as_secs_f64())
        .collect();
    assert_eq!(gaps, vec![1.0, 2.0, 3.0]);
}

#[test]
fn accumulator_counts_senders_and_chunks() {
    let mut accumulator = MetricAccumulator::with_metrics(["idle"]);
    accumulator.record_sender(Some("source-a"));
    accumulator.record_sender(Some("source-a"));
    accumulator.record_sender(None);
    accumulator.record_chunk_size(3);

    assert_eq!(accumulator.sender_counts().get("source-a"), Some(&2));
    assert_eq!(accumulator.sender_counts().get("<unknown>"), Some(&1));
    assert_eq!(accumulator.chunk_sizes(), [3]);
    assert_eq!(accumulator.series("idle").map(MetricSeries::count), Some(0));
}
