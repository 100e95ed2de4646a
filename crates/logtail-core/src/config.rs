// ── Runtime client configuration ──
//
// Describes *where* to connect and how hard to try. Never touches disk:
// the CLI/TUI builds a `ClientConfig` (usually via logtail-config) and
// hands it in.

use std::collections::BTreeSet;
use std::time::Duration;

use url::Url;

use crate::retry::RetryPolicy;

/// How long a deliberate shutdown waits for the close handshake.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(6);

/// Configuration for one log-stream client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// WebSocket endpoint (e.g., `wss://logs.example.org:8043/`).
    pub url: Url,
    /// Reconnect backoff.
    pub retry: RetryPolicy,
    /// Channels to subscribe to as soon as the connection opens.
    pub channels: BTreeSet<String>,
    /// Upper bound on waiting for the close handshake at shutdown.
    pub shutdown_grace: Duration,
}

impl ClientConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            retry: RetryPolicy::default(),
            channels: BTreeSet::new(),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }

    #[must_use]
    pub fn with_channels<I, S>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.channels = channels.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}
