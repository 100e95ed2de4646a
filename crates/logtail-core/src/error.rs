// ── Core error types ──
//
// Errors that cross from the lifecycle layer into a front end. Transport
// details stay in logtail-api; the `From<logtail_api::Error>` impl folds
// them into the handful of cases a CLI or TUI actually distinguishes.

use thiserror::Error;

/// Placeholder when the failing endpoint is not known at the conversion site.
const UNKNOWN_URL: &str = "<unknown>";

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to log server at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    /// Terminal: automatic reconnection has given up.
    #[error("Connection lost and {attempts} reconnect attempts failed")]
    RetryExhausted { attempts: u32 },

    #[error("Log client is no longer running")]
    ClientStopped,

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Could not decode server frame: {0}")]
    Decode(#[from] logtail_api::DecodeError),

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<logtail_api::Error> for CoreError {
    fn from(err: logtail_api::Error) -> Self {
        match err {
            logtail_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            logtail_api::Error::UnsupportedScheme(scheme) => CoreError::Config {
                message: format!("Unsupported scheme '{scheme}' (expected 'ws' or 'wss')"),
            },
            logtail_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                url: UNKNOWN_URL.into(),
                reason: format!("WebSocket connection failed: {reason}"),
            },
            logtail_api::Error::WebSocketSend(reason) => CoreError::ConnectionFailed {
                url: UNKNOWN_URL.into(),
                reason: format!("WebSocket send failed: {reason}"),
            },
            logtail_api::Error::ConnectionGone(id) => CoreError::ConnectionFailed {
                url: UNKNOWN_URL.into(),
                reason: format!("connection {id} is no longer running"),
            },
            logtail_api::Error::Decode(e) => CoreError::Decode(e),
            logtail_api::Error::Encode(e) => CoreError::Internal(format!("Encode error: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logtail_api::{ConnectionId, DecodeError};

    #[test]
    fn scheme_errors_become_config_errors() {
        let err = CoreError::from(logtail_api::Error::UnsupportedScheme("http".into()));
        assert!(matches!(err, CoreError::Config { ref message } if message.contains("'http'")));
    }

    #[test]
    fn transport_errors_become_connection_failures() {
        let err = CoreError::from(logtail_api::Error::ConnectionGone(ConnectionId::new(4)));
        assert_eq!(
            err.to_string(),
            "Cannot connect to log server at <unknown>: connection #4 is no longer running"
        );
    }

    #[test]
    fn decode_errors_pass_through() {
        let err = CoreError::from(logtail_api::Error::Decode(DecodeError::Malformed(
            "eof".into(),
        )));
        assert!(matches!(err, CoreError::Decode(DecodeError::Malformed(_))));
    }

    #[test]
    fn retry_exhausted_reports_attempts() {
        let err = CoreError::RetryExhausted { attempts: 3 };
        assert_eq!(
            err.to_string(),
            "Connection lost and 3 reconnect attempts failed"
        );
    }
}
