//! End-to-end tests driving a real [`Client`] against an in-process broker
//! speaking the newline-delimited JSON protocol, with the fan-out engine on
//! top.

use std::net::SocketAddr;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::net::tcp::OwnedWriteHalf;

use metricq_tools::client::Client;
use metricq_tools::error::HistoryError;
use metricq_tools::fanout::{self, MetricAccumulator, NoProgress, Outcome, collect_until_deadline};
use metricq_tools::time::Timestamp;

async fn send(writer: &mut OwnedWriteHalf, frame: Value) {
    let mut line = frame.to_string();
    line.push('\n');
    writer.write_all(line.as_bytes()).await.unwrap();
}

/// Accepts a single connection and scripts broker-side behavior:
/// `elab.power` aggregates answer, `elab.broken` fails, `elab.silent` never
/// answers; a discovery broadcast yields two replies; a subscription delivers
/// two data chunks.
async fn spawn_broker() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let Ok(frame) = serde_json::from_str::<Value>(&line) else {
                break;
            };
            match frame.get("type").and_then(Value::as_str) {
                Some("hello") => {
                    send(&mut write_half, json!({ "type": "welcome", "token": "broker" })).await;
                }
                Some("request") => {
                    let id = frame["id"].as_u64().unwrap();
                    match frame["args"]["metric"].as_str().unwrap_or("") {
                        "elab.power" => {
                            send(
                                &mut write_half,
                                json!({
                                    "type": "response",
                                    "id": id,
                                    "from": "db-archive",
                                    "body": {
                                        "minimum": 100.0,
                                        "maximum": 300.0,
                                        "sum": 800.0,
                                        "count": 4,
                                        "integral_s": 7200.0,
                                    },
                                }),
                            )
                            .await;
                        }
                        "elab.broken" => {
                            send(
                                &mut write_half,
                                json!({
                                    "type": "error",
                                    "id": id,
                                    "message": "metric is not historic",
                                }),
                            )
                            .await;
                        }
                        _ => {}
                    }
                }
                Some("broadcast") => {
                    for token in ["source-a", "db-archive"] {
                        send(
                            &mut write_half,
                            json!({
                                "type": "reply",
                                "from": token,
                                "body": { "alive": true, "uptime": 120.0 },
                            }),
                        )
                        .await;
                    }
                }
                Some("subscribe") => {
                    send(
                        &mut write_half,
                        json!({
                            "type": "data",
                            "metric": "elab.power",
                            "from": "source-a",
                            "timestamps_ns": [1_000_000_000u64, 2_000_000_000u64],
                            "values": [200.0, 210.0],
                        }),
                    )
                    .await;
                    send(
                        &mut write_half,
                        json!({
                            "type": "data",
                            "metric": "elab.power",
                            "from": "source-a",
                            "timestamps_ns": [4_000_000_000u64],
                            "values": [190.0],
                        }),
                    )
                    .await;
                }
                Some("close") => break,
                _ => {}
            }
        }
    });
    addr
}

async fn connect(addr: SocketAddr) -> Client {
    Client::connect(&format!("tcp://{}", addr), "tool-test")
        .await
        .unwrap()
}

#[tokio::test]
async fn fanned_out_history_queries_settle_independently() {
    let addr = spawn_broker().await;
    let client = connect(addr).await;

    let start = Timestamp::from_posix_nanos(0);
    let end = Timestamp::from_posix_nanos(3_600_000_000_000);
    let client_ref = &client;
    let outcomes = fanout::run(
        ["elab.power", "elab.broken", "elab.silent"].map(str::to_owned),
        |metric| async move { client_ref.history_aggregate(&metric, start, end).await },
        Some(Duration::from_millis(500)),
        &mut NoProgress,
    )
    .await;
    client.close().await;

    assert_eq!(outcomes.len(), 3);
    match outcomes.get("elab.power").unwrap() {
        Outcome::Success(aggregate) => {
            assert_eq!(aggregate.mean(), 200.0);
            assert_eq!(aggregate.integral_s, 7200.0);
        }
        other => panic!("expected success, got {:?}", other),
    }
    assert!(matches!(
        outcomes.get("elab.broken").unwrap(),
        Outcome::Error(HistoryError::Remote { message }) if message.contains("not historic")
    ));
    assert!(matches!(
        outcomes.get("elab.silent").unwrap(),
        Outcome::Timeout
    ));
}

#[tokio::test]
async fn discovery_replies_are_collected_until_the_deadline() {
    let addr = spawn_broker().await;
    let mut client = connect(addr).await;
    let mut replies = client.take_replies().unwrap();

    client.broadcast("discover").await.unwrap();
    let collected = collect_until_deadline(&mut replies, Some(Duration::from_millis(500))).await;
    client.close().await;

    let tokens: Vec<&str> = collected.iter().map(|(token, _)| token.as_str()).collect();
    assert_eq!(tokens, ["source-a", "db-archive"]);
    assert_eq!(collected[0].1["alive"], json!(true));
}

#[tokio::test]
async fn subscribed_data_accumulates_per_metric() {
    let addr = spawn_broker().await;
    let mut client = connect(addr).await;
    let mut data = client.take_data().unwrap();

    client
        .subscribe(&["elab.power".to_owned()], None)
        .await
        .unwrap();
    let chunks = collect_until_deadline(&mut data, Some(Duration::from_millis(500))).await;
    client.close().await;

    let mut accumulator = MetricAccumulator::with_metrics(["elab.power"]);
    for chunk in &chunks {
        accumulator.record_sender(chunk.from.as_deref());
        accumulator.record_chunk_size(chunk.points.len() as u64);
        for point in &chunk.points {
            accumulator.record(&chunk.metric, point.timestamp, point.value);
        }
    }

    let series = accumulator.series("elab.power").unwrap();
    assert_eq!(series.count(), 3);
    let gaps: Vec<f64> = series
        .intervals()
        .iter()
        .map(|interval| interval.as_secs_f64())
        .collect();
    assert_eq!(gaps, vec![1.0, 2.0]);
    assert_eq!(accumulator.sender_counts().get("source-a"), Some(&2));
    assert_eq!(accumulator.chunk_sizes(), [2, 1]);
}
