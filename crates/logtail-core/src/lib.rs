// logtail-core: Connection lifecycle between logtail-api and consumers (CLI/TUI).

pub mod client;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod retry;
pub mod sink;
pub mod subscription;

// ── Primary re-exports ──────────────────────────────────────────────
pub use client::{LogClient, WsConnector};
pub use config::ClientConfig;
pub use error::CoreError;
pub use lifecycle::{Connection, ConnectionState, Connector, LifecycleManager};
pub use retry::{RetryPolicy, RetryScheduler, RetryTicket, ScheduledRetry, TokioRetryScheduler};
pub use sink::{EventSink, ProtocolNotification};
pub use subscription::{ChannelOptions, SubscriptionSynchronizer};

// Wire types consumers handle directly.
pub use logtail_api::{CloseCode, DecodeError, EventFields, endpoint_url};
