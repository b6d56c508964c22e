//! Management-connection client: one TCP session to the broker carrying RPC
//! requests, broadcasts, subscriptions and live data.
//!
//! Failures to establish or keep this connection are fatal and unwind the
//! whole tool run; per-metric request failures are surfaced as values so the
//! fan-out engine can record them without aborting siblings.

mod history;
mod wire;

pub use history::{MetricMetadata, TimeAggregate, TimeValue};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};
use url::Url;

use crate::error::ClientError;
use crate::time::Timestamp;
use wire::{
    BroadcastFrame, Frame, HelloFrame, PublishFrame, RequestFrame, SubscribeFrame, read_frame,
    write_frame,
};

/// Default port of the broker's management endpoint.
const DEFAULT_PORT: u16 = 40_011;
/// Control RPCs that take longer than this indicate a broken session.
const RPC_TIMEOUT: Duration = Duration::from_secs(60);
const OUTGOING_CHANNEL_CAPACITY: usize = 64;
const REPLY_CHANNEL_CAPACITY: usize = 256;
/// Data chunks buffer here while a companion command runs; the dispatch task
/// must never block the reader for long.
const DATA_CHANNEL_CAPACITY: usize = 16_384;

/// One live sample delivered by a subscription.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataPoint {
    pub timestamp: Timestamp,
    pub value: f64,
}

/// A batch of samples for one metric, as framed by the sending agent.
#[derive(Debug, Clone)]
pub struct DataChunk {
    pub metric: String,
    pub from: Option<String>,
    pub points: Vec<DataPoint>,
}

#[derive(Debug)]
struct RpcReply {
    from: Option<String>,
    body: Value,
}

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<RpcReply, ClientError>>>>>;

pub struct Client {
    token: String,
    outgoing: mpsc::Sender<Frame>,
    pending: PendingMap,
    next_request_id: AtomicU64,
    replies: Option<mpsc::Receiver<(String, Value)>>,
    data: Option<mpsc::Receiver<DataChunk>>,
    reader_task: JoinHandle<()>,
    writer_task: JoinHandle<()>,
}

impl Client {
    /// Connects to the broker's management endpoint and performs the token
    /// handshake.
    ///
    /// # Errors
    ///
    /// Returns an error when the URL is invalid, the TCP connection cannot be
    /// established, or the broker rejects the handshake. All of these abort
    /// the run.
    pub async fn connect(server: &str, token: &str) -> Result<Self, ClientError> {
        let (host, port) = parse_server_url(server)?;
        let addr = format!("{}:{}", host, port);
        debug!(addr = %addr, token = %token, "connecting to broker");
        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|source| ClientError::Connect {
                addr: addr.clone(),
                source,
            })?;
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        write_frame(
            &mut write_half,
            &Frame::Hello(HelloFrame {
                token: token.to_owned(),
            }),
        )
        .await?;
        match read_frame(&mut reader).await? {
            Frame::Welcome(welcome) => {
                if let Some(message) = welcome.error {
                    return Err(ClientError::HandshakeRejected { message });
                }
            }
            _ => {
                return Err(ClientError::HandshakeRejected {
                    message: "expected a welcome frame".to_owned(),
                });
            }
        }

        let (outgoing_tx, mut outgoing_rx) = mpsc::channel::<Frame>(OUTGOING_CHANNEL_CAPACITY);
        let (replies_tx, replies_rx) = mpsc::channel(REPLY_CHANNEL_CAPACITY);
        let (data_tx, data_rx) = mpsc::channel(DATA_CHANNEL_CAPACITY);
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));

        let writer_task = tokio::spawn(async move {
            while let Some(frame) = outgoing_rx.recv().await {
                if let Err(error) = write_frame(&mut write_half, &frame).await {
                    warn!(%error, "management connection write failed");
                    break;
                }
            }
        });

        let pending_for_reader = Arc::clone(&pending);
        let reader_task = tokio::spawn(async move {
            loop {
                let frame = match read_frame(&mut reader).await {
                    Ok(frame) => frame,
                    Err(ClientError::ConnectionClosed) => break,
                    Err(error) => {
                        warn!(%error, "management connection read failed");
                        break;
                    }
                };
                dispatch_frame(frame, &pending_for_reader, &replies_tx, &data_tx).await;
            }
            // Unresolved RPCs observe the hangup when their oneshot drops.
            if let Ok(mut pending) = pending_for_reader.lock() {
                pending.clear();
            }
        });

        Ok(Self {
            token: token.to_owned(),
            outgoing: outgoing_tx,
            pending,
            next_request_id: AtomicU64::new(1),
            replies: Some(replies_rx),
            data: Some(data_rx),
            reader_task,
            writer_task,
        })
    }

    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Issues a management RPC and waits for the matching response.
    ///
    /// # Errors
    ///
    /// Returns an error when the broker reports a failure, the response does
    /// not arrive within the control timeout, or the connection drops.
    pub async fn rpc(&self, function: &'static str, args: Value) -> Result<Value, ClientError> {
        self.rpc_with_sender(function, args, Some(RPC_TIMEOUT))
            .await
            .map(|reply| reply.body)
    }

    /// Management RPC without the control timeout; the caller owns the
    /// deadline (the fan-out engine bounds each history query itself).
    ///
    /// # Errors
    ///
    /// Returns an error when the broker reports a failure or the connection
    /// drops.
    pub(crate) async fn rpc_unbounded(
        &self,
        function: &'static str,
        args: Value,
    ) -> Result<Value, ClientError> {
        self.rpc_with_sender(function, args, None)
            .await
            .map(|reply| reply.body)
    }

    /// Like [`Client::rpc_unbounded`], additionally reporting which agent
    /// answered.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Client::rpc_unbounded`].
    pub(crate) async fn rpc_from_unbounded(
        &self,
        function: &'static str,
        args: Value,
    ) -> Result<(Option<String>, Value), ClientError> {
        self.rpc_with_sender(function, args, None)
            .await
            .map(|reply| (reply.from, reply.body))
    }

    async fn rpc_with_sender(
        &self,
        function: &'static str,
        args: Value,
        limit: Option<Duration>,
    ) -> Result<RpcReply, ClientError> {
        let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let (reply_tx, reply_rx) = oneshot::channel();
        if let Ok(mut pending) = self.pending.lock() {
            pending.insert(id, reply_tx);
        }

        let frame = Frame::Request(RequestFrame {
            id,
            function: function.to_owned(),
            args,
        });
        if self.outgoing.send(frame).await.is_err() {
            if let Ok(mut pending) = self.pending.lock() {
                pending.remove(&id);
            }
            return Err(ClientError::ConnectionClosed);
        }

        match limit {
            Some(limit) => match timeout(limit, reply_rx).await {
                Ok(Ok(reply)) => reply,
                Ok(Err(_)) => Err(ClientError::ConnectionClosed),
                Err(_) => {
                    if let Ok(mut pending) = self.pending.lock() {
                        pending.remove(&id);
                    }
                    Err(ClientError::RpcTimeout { function })
                }
            },
            None => match reply_rx.await {
                Ok(reply) => reply,
                Err(_) => Err(ClientError::ConnectionClosed),
            },
        }
    }

    /// Publishes an RPC to every connected client. Replies stream into the
    /// receiver obtained from [`Client::take_replies`].
    ///
    /// # Errors
    ///
    /// Returns an error when the connection has already closed.
    pub async fn broadcast(&self, function: &str) -> Result<(), ClientError> {
        let frame = Frame::Broadcast(BroadcastFrame {
            function: function.to_owned(),
            args: Value::Null,
        });
        self.outgoing
            .send(frame)
            .await
            .map_err(|_| ClientError::ConnectionClosed)
    }

    /// Subscribes to live data for `metrics`.
    ///
    /// # Errors
    ///
    /// Returns an error when the connection has already closed.
    pub async fn subscribe(
        &self,
        metrics: &[String],
        expires_s: Option<u64>,
    ) -> Result<(), ClientError> {
        let frame = Frame::Subscribe(SubscribeFrame {
            metrics: metrics.to_vec(),
            expires_s,
        });
        self.outgoing
            .send(frame)
            .await
            .map_err(|_| ClientError::ConnectionClosed)
    }

    /// Publishes a single time-value pair for `metric`.
    ///
    /// # Errors
    ///
    /// Returns an error when the connection has already closed.
    pub async fn publish(
        &self,
        metric: &str,
        timestamp: Timestamp,
        value: f64,
    ) -> Result<(), ClientError> {
        let frame = Frame::Publish(PublishFrame {
            metric: metric.to_owned(),
            timestamp_ns: timestamp.posix_nanos(),
            value,
        });
        self.outgoing
            .send(frame)
            .await
            .map_err(|_| ClientError::ConnectionClosed)
    }

    /// Takes the broadcast-reply receiver. Yields `(sender token, body)`
    /// pairs; `None` on the second call.
    pub fn take_replies(&mut self) -> Option<mpsc::Receiver<(String, Value)>> {
        self.replies.take()
    }

    /// Takes the live-data receiver; `None` on the second call.
    pub fn take_data(&mut self) -> Option<mpsc::Receiver<DataChunk>> {
        self.data.take()
    }

    /// Announces the close to the broker and tears the session down.
    pub async fn close(self) {
        drop(self.outgoing.send(Frame::Close).await);
        drop(self.outgoing);
        drop(self.writer_task.await);
        self.reader_task.abort();
    }
}

async fn dispatch_frame(
    frame: Frame,
    pending: &PendingMap,
    replies_tx: &mpsc::Sender<(String, Value)>,
    data_tx: &mpsc::Sender<DataChunk>,
) {
    match frame {
        Frame::Response(response) => {
            let waiter = pending
                .lock()
                .ok()
                .and_then(|mut pending| pending.remove(&response.id));
            match waiter {
                Some(waiter) => {
                    drop(waiter.send(Ok(RpcReply {
                        from: response.from,
                        body: response.body,
                    })));
                }
                None => debug!(id = response.id, "response for unknown request id"),
            }
        }
        Frame::Error(error) => {
            let waiter = pending
                .lock()
                .ok()
                .and_then(|mut pending| pending.remove(&error.id));
            if let Some(waiter) = waiter {
                drop(waiter.send(Err(ClientError::Rpc {
                    function: format!("#{}", error.id),
                    message: error.message,
                })));
            }
        }
        Frame::Reply(reply) => {
            drop(replies_tx.send((reply.from, reply.body)).await);
        }
        Frame::Data(data) => {
            let points: Vec<DataPoint> = data
                .timestamps_ns
                .iter()
                .zip(data.values.iter())
                .map(|(&timestamp_ns, &value)| DataPoint {
                    timestamp: Timestamp::from_posix_nanos(timestamp_ns),
                    value,
                })
                .collect();
            if data.timestamps_ns.len() != data.values.len() {
                warn!(
                    metric = %data.metric,
                    "data chunk with mismatched timestamp/value lengths, truncated"
                );
            }
            drop(
                data_tx
                    .send(DataChunk {
                        metric: data.metric,
                        from: data.from,
                        points,
                    })
                    .await,
            );
        }
        Frame::Close => debug!("broker closed the session"),
        Frame::Hello(_)
        | Frame::Welcome(_)
        | Frame::Request(_)
        | Frame::Broadcast(_)
        | Frame::Subscribe(_)
        | Frame::Publish(_) => {
            debug!("ignoring client-only frame from broker");
        }
    }
}

fn parse_server_url(server: &str) -> Result<(String, u16), ClientError> {
    let url = Url::parse(server).map_err(|error| ClientError::InvalidUrl {
        url: server.to_owned(),
        reason: error.to_string(),
    })?;
    match url.scheme() {
        "metricq" | "tcp" => {}
        other => {
            return Err(ClientError::InvalidUrl {
                url: server.to_owned(),
                reason: format!("unsupported scheme '{}'", other),
            });
        }
    }
    let host = url
        .host_str()
        .ok_or_else(|| ClientError::InvalidUrl {
            url: server.to_owned(),
            reason: "missing host".to_owned(),
        })?
        .to_owned();
    let port = url.port().unwrap_or(DEFAULT_PORT);
    Ok((host, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_server_urls_with_and_without_port() -> Result<(), ClientError> {
        assert_eq!(
            parse_server_url("metricq://broker.example.com")?,
            ("broker.example.com".to_owned(), DEFAULT_PORT)
        );
        assert_eq!(
            parse_server_url("tcp://localhost:1234")?,
            ("localhost".to_owned(), 1234)
        );
        Ok(())
    }

    #[test]
    fn rejects_unsupported_schemes() {
        assert!(parse_server_url("amqps://broker").is_err());
        assert!(parse_server_url("not a url").is_err());
    }
}
