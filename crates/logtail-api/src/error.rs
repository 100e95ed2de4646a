use thiserror::Error;

use crate::protocol::DecodeError;
use crate::websocket::ConnectionId;

/// Top-level error type for the `logtail-api` crate.
///
/// Covers endpoint validation, the WebSocket transport, and frame decoding.
/// `logtail-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Endpoint ────────────────────────────────────────────────────
    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Only `ws` and `wss` endpoints can carry the log stream.
    #[error("Unsupported URL scheme '{0}' (expected 'ws' or 'wss')")]
    UnsupportedScheme(String),

    // ── WebSocket ───────────────────────────────────────────────────
    /// WebSocket handshake or stream failure.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// Writing a frame to an open socket failed.
    #[error("WebSocket send failed: {0}")]
    WebSocketSend(String),

    /// The task owning this connection has already exited.
    #[error("Connection {0} is no longer running")]
    ConnectionGone(ConnectionId),

    // ── Data ────────────────────────────────────────────────────────
    /// An inbound frame could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// An outbound frame could not be serialized.
    #[error("Failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
}

impl Error {
    /// Returns `true` if reconnecting might resolve this error.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::WebSocketConnect(_) | Self::WebSocketSend(_) | Self::ConnectionGone(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_failures_are_transient() {
        assert!(Error::WebSocketConnect("refused".into()).is_transient());
        assert!(Error::ConnectionGone(ConnectionId::new(3)).is_transient());
        assert!(!Error::UnsupportedScheme("http".into()).is_transient());
    }

    #[test]
    fn connection_gone_names_the_attempt() {
        let err = Error::ConnectionGone(ConnectionId::new(7));
        assert_eq!(err.to_string(), "Connection #7 is no longer running");
    }
}
