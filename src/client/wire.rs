//! Wire frames on the management connection: newline-delimited JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt};

use crate::error::ClientError;

/// Upper bound on a single frame; anything larger is a broken peer.
const MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum Frame {
    /// First frame in both directions; identifies the client by token.
    Hello(HelloFrame),
    Welcome(WelcomeFrame),
    /// Management RPC request, answered by a `Response` or `Error` frame
    /// carrying the same id.
    Request(RequestFrame),
    Response(ResponseFrame),
    Error(ErrorFrame),
    /// RPC published to every connected client; replies stream back as
    /// `Reply` frames tagged with the responder's token.
    Broadcast(BroadcastFrame),
    Reply(ReplyFrame),
    Subscribe(SubscribeFrame),
    Publish(PublishFrame),
    /// Chunk of live data points for one metric.
    Data(DataFrame),
    Close,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct HelloFrame {
    pub(crate) token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct WelcomeFrame {
    pub(crate) token: String,
    #[serde(default)]
    pub(crate) error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct RequestFrame {
    pub(crate) id: u64,
    pub(crate) function: String,
    #[serde(default)]
    pub(crate) args: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ResponseFrame {
    pub(crate) id: u64,
    /// Token of the agent that produced the response, when the broker
    /// forwarded the request (e.g. which database answered a history request).
    #[serde(default)]
    pub(crate) from: Option<String>,
    #[serde(default)]
    pub(crate) body: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ErrorFrame {
    pub(crate) id: u64,
    pub(crate) message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct BroadcastFrame {
    pub(crate) function: String,
    #[serde(default)]
    pub(crate) args: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ReplyFrame {
    pub(crate) from: String,
    #[serde(default)]
    pub(crate) body: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct SubscribeFrame {
    pub(crate) metrics: Vec<String>,
    #[serde(default)]
    pub(crate) expires_s: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct PublishFrame {
    pub(crate) metric: String,
    pub(crate) timestamp_ns: i64,
    pub(crate) value: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct DataFrame {
    pub(crate) metric: String,
    #[serde(default)]
    pub(crate) from: Option<String>,
    pub(crate) timestamps_ns: Vec<i64>,
    pub(crate) values: Vec<f64>,
}

pub(crate) async fn read_frame<R>(reader: &mut R) -> Result<Frame, ClientError>
where
    R: AsyncBufRead + Unpin,
{
    let mut buffer: Vec<u8> = Vec::with_capacity(1024);
    // Cap the read itself: a peer that never sends a newline must not grow
    // the buffer past the frame limit before the length check runs.
    let mut limited = (&mut *reader).take(MAX_FRAME_BYTES as u64 + 1);
    let bytes = limited
        .read_until(b'\n', &mut buffer)
        .await
        .map_err(|source| ClientError::Io {
            context: "frame read",
            source,
        })?;
    if bytes == 0 {
        return Err(ClientError::ConnectionClosed);
    }
    if buffer.len() > MAX_FRAME_BYTES {
        return Err(ClientError::Io {
            context: "frame read",
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("frame exceeded {} bytes", MAX_FRAME_BYTES),
            ),
        });
    }
    if buffer.ends_with(b"\n") {
        buffer.pop();
        if buffer.ends_with(b"\r") {
            buffer.pop();
        }
    }
    serde_json::from_slice::<Frame>(&buffer).map_err(|source| ClientError::MalformedFrame { source })
}

pub(crate) async fn write_frame(
    writer: &mut tokio::net::tcp::OwnedWriteHalf,
    frame: &Frame,
) -> Result<(), ClientError> {
    let mut payload = serde_json::to_string(frame).map_err(|source| ClientError::MalformedFrame {
        source,
    })?;
    payload.push('\n');
    writer
        .write_all(payload.as_bytes())
        .await
        .map_err(|source| ClientError::Io {
            context: "frame write",
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_round_trip_through_json() -> Result<(), serde_json::Error> {
        let frame = Frame::Request(RequestFrame {
            id: 7,
            function: "get_metrics".to_owned(),
            args: serde_json::json!({ "selector": "elab.*" }),
        });
        let encoded = serde_json::to_string(&frame)?;
        assert!(encoded.contains("\"type\":\"request\""));
        let decoded: Frame = serde_json::from_str(&encoded)?;
        assert!(matches!(decoded, Frame::Request(request) if request.id == 7));
        Ok(())
    }

    #[test]
    fn data_frames_tolerate_missing_sender() -> Result<(), serde_json::Error> {
        let decoded: Frame = serde_json::from_str(
            r#"{"type":"data","metric":"elab.power","timestamps_ns":[1,2],"values":[0.5,0.7]}"#,
        )?;
        match decoded {
            Frame::Data(data) => {
                assert_eq!(data.from, None);
                assert_eq!(data.timestamps_ns.len(), 2);
            }
            _ => panic!("expected a data frame"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn frames_parse_through_the_read_limit() {
        let mut reader: &[u8] = b"{\"type\":\"close\"}\n";
        let frame = read_frame(&mut reader).await.unwrap();
        assert!(matches!(frame, Frame::Close));
    }

    #[tokio::test]
    async fn unterminated_input_stops_at_the_frame_limit() {
        // No newline at all: the read must stop at the cap instead of
        // buffering the peer's output indefinitely.
        let payload = vec![b'a'; MAX_FRAME_BYTES + 16];
        let mut reader: &[u8] = &payload;
        let error = read_frame(&mut reader).await.unwrap_err();
        assert!(matches!(error, ClientError::Io { .. }));
        assert!(error.to_string().contains("exceeded"));
    }
}
