//! WebSocket transport for one connection attempt.
//!
//! [`WsConnection::connect`] spawns a task that owns the socket and reports
//! everything that happens to it as [`TransportNotice`]s, each tagged with
//! the attempt's [`ConnectionId`]. Exactly one terminal notice
//! ([`TransportEvent::Closed`] or [`TransportEvent::Failed`]) is emitted per
//! attempt. There is no reconnection here -- that policy belongs to the
//! lifecycle manager in `logtail-core`.
//!
//! # Example
//!
//! ```rust,ignore
//! use logtail_api::websocket::{endpoint_url, CloseCode, ConnectionId, WsConnection};
//! use tokio::sync::mpsc;
//!
//! let (tx, mut rx) = mpsc::unbounded_channel();
//! let url = endpoint_url("wss", "logs.example.org", 8043, "/")?;
//! let mut conn = WsConnection::connect(url, ConnectionId::new(1), tx);
//!
//! while let Some(notice) = rx.recv().await {
//!     println!("{}: {:?}", notice.id, notice.event);
//! }
//!
//! conn.close(CloseCode::NORMAL);
//! ```

use std::fmt;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::{
    self,
    protocol::{CloseFrame, frame::coding::CloseCode as FrameCloseCode},
};
use url::Url;

use crate::error::Error;

// ── Tuning ───────────────────────────────────────────────────────────

/// How long to wait for the server to answer our close frame.
const CLOSE_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

// ── Identifiers ──────────────────────────────────────────────────────

/// Identity of one connection attempt. Every reconnect gets a fresh id, so
/// notices from a superseded socket can be told apart from the live one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// WebSocket close status code (RFC 6455 §7.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CloseCode(u16);

impl CloseCode {
    /// Normal closure. Reserved by this client for deliberate shutdown:
    /// a close carrying this code never triggers a reconnect.
    pub const NORMAL: Self = Self(1000);
    /// Endpoint going away (server restart, page unload).
    pub const GOING_AWAY: Self = Self(1001);
    /// Close frame without a status code.
    pub const NO_STATUS: Self = Self(1005);
    /// Connection dropped without a close frame. Never sent on the wire.
    pub const ABNORMAL: Self = Self(1006);

    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    pub const fn as_u16(self) -> u16 {
        self.0
    }

    pub const fn is_normal(self) -> bool {
        self.0 == Self::NORMAL.0
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Notices ──────────────────────────────────────────────────────────

/// Something that happened to a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Handshake completed; frames can now be sent.
    Opened,
    /// A text frame arrived.
    Message(String),
    /// The socket closed with a close code (ours if we initiated it).
    Closed { code: CloseCode, reason: String },
    /// The handshake or the stream failed.
    Failed { reason: String },
}

impl TransportEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed { .. } | Self::Failed { .. })
    }
}

/// A [`TransportEvent`] tagged with the attempt it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportNotice {
    pub id: ConnectionId,
    pub event: TransportEvent,
}

// ── Endpoint ─────────────────────────────────────────────────────────

/// Build the endpoint URL from its configured parts.
pub fn endpoint_url(scheme: &str, host: &str, port: u16, path: &str) -> Result<Url, Error> {
    if !matches!(scheme, "ws" | "wss") {
        return Err(Error::UnsupportedScheme(scheme.to_owned()));
    }
    let path = if path.starts_with('/') {
        path.to_owned()
    } else {
        format!("/{path}")
    };
    Ok(Url::parse(&format!("{scheme}://{host}:{port}{path}"))?)
}

// ── WsConnection ─────────────────────────────────────────────────────

enum Outgoing {
    Text(String),
    Close(CloseCode),
}

/// Write handle for one connection attempt.
///
/// Dropping the handle closes the socket with [`CloseCode::NORMAL`].
#[derive(Debug)]
pub struct WsConnection {
    id: ConnectionId,
    outgoing: mpsc::UnboundedSender<Outgoing>,
    closed: bool,
}

impl fmt::Debug for Outgoing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(&text.len()).finish(),
            Self::Close(code) => f.debug_tuple("Close").field(code).finish(),
        }
    }
}

impl WsConnection {
    /// Start a connection attempt in the background and return immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(
        url: Url,
        id: ConnectionId,
        notices: mpsc::UnboundedSender<TransportNotice>,
    ) -> Self {
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let event = match run_connection(&url, id, outgoing_rx, &notices).await {
                Ok((code, reason)) => TransportEvent::Closed { code, reason },
                Err(e) => {
                    tracing::warn!(connection = %id, error = %e, "WebSocket connection failed");
                    TransportEvent::Failed {
                        reason: e.to_string(),
                    }
                }
            };
            // The receiver is gone only when the client is shutting down.
            let _ = notices.send(TransportNotice { id, event });
        });

        Self {
            id,
            outgoing,
            closed: false,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue a text frame for sending.
    pub fn send_text(&self, text: String) -> Result<(), Error> {
        self.outgoing
            .send(Outgoing::Text(text))
            .map_err(|_| Error::ConnectionGone(self.id))
    }

    /// Start the close handshake. Only the first call has any effect.
    pub fn close(&mut self, code: CloseCode) {
        if self.closed {
            return;
        }
        self.closed = true;
        if self.outgoing.send(Outgoing::Close(code)).is_err() {
            tracing::debug!(connection = %self.id, "close requested after the socket task exited");
        }
    }
}

impl Drop for WsConnection {
    fn drop(&mut self) {
        self.close(CloseCode::NORMAL);
    }
}

// ── Connection task ──────────────────────────────────────────────────

type Closure = (CloseCode, String);

/// Drive one socket from handshake to close.
///
/// Returns the close code and reason on an orderly close, or an error if
/// the handshake or stream failed.
async fn run_connection(
    url: &Url,
    id: ConnectionId,
    mut outgoing: mpsc::UnboundedReceiver<Outgoing>,
    notices: &mpsc::UnboundedSender<TransportNotice>,
) -> Result<Closure, Error> {
    tracing::info!(url = %url, connection = %id, "Connecting to WebSocket");

    let handshake = tokio_tungstenite::connect_async(url.as_str());
    tokio::pin!(handshake);

    let ws_stream = loop {
        tokio::select! {
            result = &mut handshake => {
                let (stream, _response) =
                    result.map_err(|e| Error::WebSocketConnect(e.to_string()))?;
                break stream;
            }
            command = outgoing.recv() => match command {
                Some(Outgoing::Text(_)) => {
                    tracing::warn!(connection = %id, "Dropping frame queued before the socket opened");
                }
                Some(Outgoing::Close(code)) => {
                    return Ok((code, "closed before the handshake completed".into()));
                }
                None => {
                    return Ok((CloseCode::NORMAL, "handle dropped before the handshake completed".into()));
                }
            },
        }
    };

    tracing::info!(connection = %id, "WebSocket connected");
    if notices
        .send(TransportNotice {
            id,
            event: TransportEvent::Opened,
        })
        .is_err()
    {
        return Ok((CloseCode::NORMAL, "client gone".into()));
    }

    let (mut write, mut read) = ws_stream.split();
    let mut local_close: Option<CloseCode> = None;
    let mut close_deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            command = outgoing.recv(), if local_close.is_none() => {
                let code = match command {
                    Some(Outgoing::Text(text)) => {
                        write
                            .send(tungstenite::Message::text(text))
                            .await
                            .map_err(|e| Error::WebSocketSend(e.to_string()))?;
                        continue;
                    }
                    Some(Outgoing::Close(code)) => code,
                    None => CloseCode::NORMAL,
                };
                tracing::debug!(connection = %id, code = %code, "Sending close frame");
                let frame = CloseFrame {
                    code: FrameCloseCode::from(code.as_u16()),
                    reason: String::new().into(),
                };
                if let Err(e) = write.send(tungstenite::Message::Close(Some(frame))).await {
                    tracing::debug!(connection = %id, error = %e, "Close frame not sent");
                    return Ok((code, "socket already closing".into()));
                }
                local_close = Some(code);
                close_deadline = Some(Instant::now() + CLOSE_HANDSHAKE_TIMEOUT);
            }
            () = tokio::time::sleep_until(close_deadline.unwrap_or_else(Instant::now)),
                if close_deadline.is_some() =>
            {
                tracing::debug!(connection = %id, "Close handshake timed out");
                return Ok((local_close.unwrap_or(CloseCode::NORMAL), "close handshake timed out".into()));
            }
            frame = read.next() => match frame {
                Some(Ok(tungstenite::Message::Text(text))) => {
                    // Frames racing our own close are not delivered.
                    if local_close.is_none()
                        && notices
                            .send(TransportNotice {
                                id,
                                event: TransportEvent::Message(text.as_str().to_owned()),
                            })
                            .is_err()
                    {
                        return Ok((CloseCode::NORMAL, "client gone".into()));
                    }
                }
                Some(Ok(tungstenite::Message::Ping(_))) => {
                    // tungstenite handles pong replies automatically
                    tracing::trace!(connection = %id, "WebSocket ping");
                }
                Some(Ok(tungstenite::Message::Close(frame))) => {
                    let (remote_code, reason) = frame.map_or_else(
                        || (CloseCode::NO_STATUS, String::new()),
                        |cf| (CloseCode::new(u16::from(cf.code)), cf.reason.to_string()),
                    );
                    tracing::info!(
                        connection = %id,
                        code = %remote_code,
                        reason = %reason,
                        "WebSocket close frame received"
                    );
                    return Ok((local_close.unwrap_or(remote_code), reason));
                }
                Some(Err(e)) => {
                    if let Some(code) = local_close {
                        tracing::debug!(connection = %id, error = %e, "Stream error while closing");
                        return Ok((code, "closed by client".into()));
                    }
                    return Err(Error::WebSocketConnect(e.to_string()));
                }
                None => {
                    tracing::info!(connection = %id, "WebSocket stream ended");
                    return Ok((local_close.unwrap_or(CloseCode::ABNORMAL), "stream ended".into()));
                }
                _ => {
                    // Binary, Pong, Frame -- ignore
                }
            },
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_url_from_parts() {
        let url = endpoint_url("wss", "logs.example.org", 8043, "/").unwrap();
        assert_eq!(url.as_str(), "wss://logs.example.org:8043/");

        let url = endpoint_url("ws", "localhost", 9000, "stream").unwrap();
        assert_eq!(url.as_str(), "ws://localhost:9000/stream");
    }

    #[test]
    fn endpoint_url_rejects_other_schemes() {
        let err = endpoint_url("https", "logs.example.org", 443, "/").unwrap_err();
        assert!(matches!(err, Error::UnsupportedScheme(s) if s == "https"));
    }

    #[test]
    fn endpoint_url_rejects_bad_host() {
        assert!(matches!(
            endpoint_url("wss", "bad host", 8043, "/"),
            Err(Error::InvalidUrl(_))
        ));
    }

    #[test]
    fn connection_ids_are_sequential() {
        let first = ConnectionId::new(1);
        assert_eq!(first.next().get(), 2);
        assert_eq!(first.next().to_string(), "#2");
    }

    #[test]
    fn only_1000_is_normal() {
        assert!(CloseCode::NORMAL.is_normal());
        assert!(CloseCode::new(1000).is_normal());
        assert!(!CloseCode::GOING_AWAY.is_normal());
        assert!(!CloseCode::ABNORMAL.is_normal());
    }

    #[test]
    fn terminal_events() {
        assert!(!TransportEvent::Opened.is_terminal());
        assert!(!TransportEvent::Message(String::new()).is_terminal());
        assert!(
            TransportEvent::Failed {
                reason: "refused".into()
            }
            .is_terminal()
        );
    }
}
