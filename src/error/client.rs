use thiserror::Error;

/// Failures on the management connection itself. These are fatal: they abort
/// the whole run instead of being recorded as per-query outcomes.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid server URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("I/O error during {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("Connection closed by the broker.")]
    ConnectionClosed,
    #[error("Broker rejected handshake: {message}")]
    HandshakeRejected { message: String },
    #[error("Malformed frame from the broker: {source}")]
    MalformedFrame {
        #[source]
        source: serde_json::Error,
    },
    #[error("RPC '{function}' failed: {message}")]
    Rpc { function: String, message: String },
    #[error("RPC '{function}' timed out.")]
    RpcTimeout { function: &'static str },
    #[error("Unexpected RPC response shape for '{function}': {detail}")]
    UnexpectedResponse {
        function: &'static str,
        detail: String,
    },
}

/// Per-metric failures of historic-data requests. Recorded as outcomes by the
/// fan-out engine, never propagated across sibling queries.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("no data")]
    NoData,
    #[error("{message}")]
    Remote { message: String },
    #[error("malformed response: {detail}")]
    MalformedResponse { detail: String },
    #[error("request channel closed")]
    ChannelClosed,
}
