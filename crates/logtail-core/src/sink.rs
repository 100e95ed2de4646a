//! The presentation-side interface of the lifecycle manager.
//!
//! Front ends implement [`EventSink`] to receive log events, channel list
//! updates, state changes, and server notifications. Every method is called
//! from the task driving the manager, one at a time.

use std::fmt;

use logtail_api::{DecodeError, EventFields, InboundMessage};

use crate::error::CoreError;
use crate::lifecycle::ConnectionState;
use crate::subscription::ChannelOptions;

/// A frame whose `_status` was anything but `"ok"`.
///
/// Notifications are observability data. They never reach
/// [`EventSink::render_event`] or the channel picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolNotification {
    /// Raw `_status`, `None` when the frame had none.
    pub status: Option<String>,
    /// The frame's `_type` as received.
    pub type_tag: String,
    /// Server-supplied explanation (`errorMsg`), if any.
    pub detail: Option<String>,
}

impl ProtocolNotification {
    pub fn from_message(message: &InboundMessage) -> Self {
        Self {
            status: message.status.as_str().map(str::to_owned),
            type_tag: message.type_tag().to_owned(),
            detail: message.detail.clone(),
        }
    }
}

impl fmt::Display for ProtocolNotification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = self.status.as_deref().unwrap_or("no status");
        match &self.detail {
            Some(detail) => write!(f, "server {status} ({}): {detail}", self.type_tag),
            None => write!(f, "server {status} ({})", self.type_tag),
        }
    }
}

/// Receives everything the lifecycle manager produces for display.
pub trait EventSink {
    /// One decoded log event, control keys already stripped.
    fn render_event(&mut self, fields: &EventFields);

    /// The server advertised a new channel list.
    fn refresh_channel_options(&mut self, options: &ChannelOptions);

    /// The connection moved to a new state.
    fn notify_connection_status(&mut self, state: &ConnectionState);

    /// A non-ok frame arrived.
    fn on_notification(&mut self, notification: &ProtocolNotification);

    /// Errors the user must see. Receives [`CoreError::RetryExhausted`].
    fn report_error(&mut self, error: &CoreError);

    /// A frame of a kind this client does not handle.
    fn on_unhandled(&mut self, _type_tag: Option<&str>) {}

    /// A frame that could not be decoded at all.
    fn on_decode_error(&mut self, _error: &DecodeError) {}
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn notification_from_error_frame() {
        let message =
            logtail_api::decode(r#"{"_status":"error","_type":"unknown","errorMsg":"bad channel"}"#)
                .unwrap();
        let notification = ProtocolNotification::from_message(&message);

        assert_eq!(notification.status.as_deref(), Some("error"));
        assert_eq!(notification.type_tag, "unknown");
        assert_eq!(
            notification.to_string(),
            "server error (unknown): bad channel"
        );
    }

    #[test]
    fn notification_without_status() {
        let message = logtail_api::decode(r#"{"_type":"event","msg":"x"}"#).unwrap();
        let notification = ProtocolNotification::from_message(&message);
        assert_eq!(notification.to_string(), "server no status (event)");
    }
}
