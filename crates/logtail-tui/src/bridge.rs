//! Bridges the log client's sink callbacks into the TUI action queue.

use tokio::sync::mpsc;
use tracing::debug;

use logtail_core::{
    ChannelOptions, ConnectionState, CoreError, DecodeError, EventFields, EventSink,
    ProtocolNotification,
};

use crate::action::Action;

/// Forwards everything the client produces as [`Action`]s.
///
/// Sends fail only after the app loop has exited; those are dropped.
pub struct ActionSink {
    tx: mpsc::UnboundedSender<Action>,
}

impl ActionSink {
    pub fn new(tx: mpsc::UnboundedSender<Action>) -> Self {
        Self { tx }
    }

    fn forward(&self, action: Action) {
        if self.tx.send(action).is_err() {
            debug!("action channel closed, dropping client update");
        }
    }
}

impl EventSink for ActionSink {
    fn render_event(&mut self, fields: &EventFields) {
        self.forward(Action::LogEvent(fields.clone()));
    }

    fn refresh_channel_options(&mut self, options: &ChannelOptions) {
        self.forward(Action::ChannelsUpdated(options.clone()));
    }

    fn notify_connection_status(&mut self, state: &ConnectionState) {
        self.forward(Action::ConnectionChanged(state.clone()));
    }

    fn on_notification(&mut self, notification: &ProtocolNotification) {
        self.forward(Action::Notification(notification.clone()));
    }

    fn report_error(&mut self, error: &CoreError) {
        self.forward(Action::ClientError(error.to_string()));
    }

    fn on_decode_error(&mut self, error: &DecodeError) {
        self.forward(Action::ClientError(format!("unreadable frame: {error}")));
    }
}
