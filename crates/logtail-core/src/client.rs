//! Async driver for [`LifecycleManager`].
//!
//! [`LogClient::spawn`] moves a manager into one background task that
//! multiplexes three queues: user commands, transport notices, and due
//! retries. Every handler runs to completion before the next message is
//! taken, so the manager needs no locking.

use std::collections::BTreeSet;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use url::Url;

use logtail_api::{ConnectionId, TransportNotice, WsConnection};

use crate::config::ClientConfig;
use crate::error::CoreError;
use crate::lifecycle::{ConnectionState, Connector, LifecycleManager};
use crate::retry::{RetryTicket, TokioRetryScheduler};
use crate::sink::EventSink;

// ── WsConnector ──────────────────────────────────────────────────

/// Opens real WebSocket connections that report into a notice queue.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: Url,
    notices: mpsc::UnboundedSender<TransportNotice>,
}

impl WsConnector {
    pub fn new(url: Url, notices: mpsc::UnboundedSender<TransportNotice>) -> Self {
        Self { url, notices }
    }
}

impl Connector for WsConnector {
    type Connection = WsConnection;

    fn connect(&mut self, id: ConnectionId) -> WsConnection {
        WsConnection::connect(self.url.clone(), id, self.notices.clone())
    }
}

// ── LogClient ────────────────────────────────────────────────────

#[derive(Debug)]
enum ClientCommand {
    SelectChannels(BTreeSet<String>),
    Reconnect,
    Shutdown,
}

type Manager<S> = LifecycleManager<WsConnector, TokioRetryScheduler, S>;

struct Queues {
    commands: mpsc::UnboundedReceiver<ClientCommand>,
    notices: mpsc::UnboundedReceiver<TransportNotice>,
    retries: mpsc::UnboundedReceiver<RetryTicket>,
}

/// Handle to a running log-stream client.
///
/// Dropping the handle shuts the client down (close code 1000) without
/// waiting for it; call [`shutdown()`](Self::shutdown) to wait.
#[derive(Debug)]
pub struct LogClient {
    commands: mpsc::UnboundedSender<ClientCommand>,
    state: watch::Receiver<ConnectionState>,
    task: JoinHandle<()>,
}

impl LogClient {
    /// Start connecting in the background. Must be called within a tokio
    /// runtime.
    pub fn spawn<S>(config: ClientConfig, sink: S) -> Self
    where
        S: EventSink + Send + 'static,
    {
        let (command_tx, commands) = mpsc::unbounded_channel();
        let (notice_tx, notices) = mpsc::unbounded_channel();
        let (retry_tx, retries) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(ConnectionState::Idle);

        tracing::info!(url = %config.url, channels = config.channels.len(), "starting log client");

        let manager = LifecycleManager::new(
            WsConnector::new(config.url.clone(), notice_tx),
            TokioRetryScheduler::new(retry_tx),
            sink,
            config.retry,
            config.channels,
        );
        let queues = Queues {
            commands,
            notices,
            retries,
        };
        let task = tokio::spawn(drive(manager, queues, state_tx, config.shutdown_grace));

        Self {
            commands: command_tx,
            state,
            task,
        }
    }

    /// Replace the subscribed channel set.
    pub fn select_channels<I, S>(&self, channels: I) -> Result<(), CoreError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let channels = channels.into_iter().map(Into::into).collect();
        self.send(ClientCommand::SelectChannels(channels))
    }

    /// Try to connect again, e.g. after retries were exhausted.
    pub fn reconnect(&self) -> Result<(), CoreError> {
        self.send(ClientCommand::Reconnect)
    }

    /// Subscribe to connection state changes.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Close with the normal code and wait for the client task to finish.
    pub async fn shutdown(self) -> Result<(), CoreError> {
        if self.commands.send(ClientCommand::Shutdown).is_err() {
            debug!("log client already stopped");
        }
        self.task
            .await
            .map_err(|e| CoreError::Internal(format!("log client task failed: {e}")))
    }

    fn send(&self, command: ClientCommand) -> Result<(), CoreError> {
        self.commands
            .send(command)
            .map_err(|_| CoreError::ClientStopped)
    }
}

// ── Driver ───────────────────────────────────────────────────────

async fn drive<S: EventSink + Send>(
    mut manager: Manager<S>,
    mut queues: Queues,
    state: watch::Sender<ConnectionState>,
    shutdown_grace: Duration,
) {
    manager.start();
    publish(&state, &manager);

    loop {
        tokio::select! {
            command = queues.commands.recv() => match command {
                Some(ClientCommand::SelectChannels(channels)) => {
                    manager.on_selection_changed(channels);
                }
                Some(ClientCommand::Reconnect) => {
                    manager.start();
                }
                Some(ClientCommand::Shutdown) | None => break,
            },
            Some(notice) = queues.notices.recv() => manager.handle_transport(notice),
            Some(ticket) = queues.retries.recv() => manager.handle_retry_due(ticket),
        }
        publish(&state, &manager);
    }

    manager.shutdown();
    publish(&state, &manager);

    let deadline = tokio::time::sleep(shutdown_grace);
    tokio::pin!(deadline);
    while manager.has_live_connection() {
        tokio::select! {
            Some(notice) = queues.notices.recv() => manager.handle_transport(notice),
            () = &mut deadline => {
                warn!("close handshake did not finish in time");
                break;
            }
        }
    }
    publish(&state, &manager);
    debug!("log client stopped");
}

fn publish<S: EventSink>(state: &watch::Sender<ConnectionState>, manager: &Manager<S>) {
    state.send_if_modified(|current| {
        if current == manager.state() {
            false
        } else {
            current.clone_from(manager.state());
            true
        }
    });
}
