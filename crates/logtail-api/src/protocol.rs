//! Wire protocol for the log-streaming server.
//!
//! Every frame is a single JSON object. Two control keys travel with each
//! inbound frame: `_type` names the message kind and `_status` is `"ok"` for
//! data, anything else for a notification. The client only ever sends one
//! kind of frame, a `listen_request` carrying the complete channel set it
//! wants to receive.
//!
//! ```rust,ignore
//! use logtail_api::protocol::{decode, encode, InboundBody, OutboundMessage};
//!
//! let frame = encode(&OutboundMessage::listen_request(["#rust"]))?;
//! assert_eq!(frame, r##"{"_type":"listen_request","channels":["#rust"]}"##);
//!
//! let msg = decode(r#"{"_status":"ok","_type":"channel_list","channels":["#rust"]}"#)?;
//! assert!(matches!(msg.body, InboundBody::ChannelList { .. }));
//! ```

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

// ── Control keys ─────────────────────────────────────────────────────

/// Keys starting with this character are control metadata, never payload.
pub const CONTROL_PREFIX: char = '_';

const TYPE_KEY: &str = "_type";
const STATUS_KEY: &str = "_status";
const STATUS_OK: &str = "ok";
const CHANNELS_KEY: &str = "channels";
/// Error frames from the server explain themselves under this key.
const ERROR_MESSAGE_KEY: &str = "errorMsg";

/// Payload fields of an `event` frame, in the order the server sent them.
pub type EventFields = IndexMap<String, String>;

// ── DecodeError ──────────────────────────────────────────────────────

/// Why an inbound frame could not be turned into an [`InboundMessage`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Not a JSON object, or an `ok` frame of a known kind with an invalid body.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// The `_type` tag is missing or names a kind this client does not know.
    ///
    /// [`decode`] maps this onto [`InboundBody::Unknown`] instead of failing,
    /// so newer servers can add message kinds without breaking old clients.
    #[error("unknown message type: {}", .0.as_deref().unwrap_or("<missing>"))]
    UnknownType(Option<String>),
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

// ── Outbound ─────────────────────────────────────────────────────────

/// A frame sent from the client to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "_type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Replace the server-side subscription with exactly these channels.
    ListenRequest { channels: Vec<String> },
}

impl OutboundMessage {
    pub fn listen_request<I, S>(channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::ListenRequest {
            channels: channels.into_iter().map(Into::into).collect(),
        }
    }
}

/// Serialize an outbound message into a text frame.
pub fn encode(message: &OutboundMessage) -> Result<String, serde_json::Error> {
    serde_json::to_string(message)
}

// ── Inbound ──────────────────────────────────────────────────────────

/// The `_status` of an inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    /// `"ok"`: the frame carries data.
    Ok,
    /// Any other value, or no `_status` at all (`None`).
    Notification(Option<String>),
}

impl Status {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    /// The raw status text, `None` when the frame had no `_status`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Ok => Some(STATUS_OK),
            Self::Notification(raw) => raw.as_deref(),
        }
    }

    fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::String(s)) if s == STATUS_OK => Self::Ok,
            Some(Value::String(s)) => Self::Notification(Some(s.clone())),
            Some(other) => Self::Notification(Some(other.to_string())),
            None => Self::Notification(None),
        }
    }
}

/// The kind-specific part of an inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundBody {
    /// The complete set of channels the server can stream.
    ChannelList { channels: Vec<String> },
    /// One log event, with control keys already stripped.
    Event { fields: EventFields },
    /// A kind this client does not handle. `type_tag` is `None` if absent.
    Unknown { type_tag: Option<String> },
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub status: Status,
    pub body: InboundBody,
    /// Human-readable explanation carried by server error frames.
    pub detail: Option<String>,
}

impl InboundMessage {
    /// The message kind as it appears on the wire, for logging.
    pub fn type_tag(&self) -> &str {
        match &self.body {
            InboundBody::ChannelList { .. } => "channel_list",
            InboundBody::Event { .. } => "event",
            InboundBody::Unknown { type_tag } => type_tag.as_deref().unwrap_or("<missing>"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MessageKind {
    ChannelList,
    Event,
    Unknown,
}

/// Match a `_type` tag the way the server spells it, ignoring ASCII case.
fn classify(tag: Option<&str>) -> Result<MessageKind, DecodeError> {
    let Some(tag) = tag else {
        return Err(DecodeError::UnknownType(None));
    };
    [
        ("channel_list", MessageKind::ChannelList),
        ("event", MessageKind::Event),
        ("unknown", MessageKind::Unknown),
    ]
    .into_iter()
    .find(|(name, _)| tag.eq_ignore_ascii_case(name))
    .map(|(_, kind)| kind)
    .ok_or_else(|| DecodeError::UnknownType(Some(tag.to_owned())))
}

/// Parse a text frame from the server.
pub fn decode(text: &str) -> Result<InboundMessage, DecodeError> {
    let object: IndexMap<String, Value> = serde_json::from_str(text)?;

    let status = Status::from_value(object.get(STATUS_KEY));
    let detail = object
        .get(ERROR_MESSAGE_KEY)
        .and_then(Value::as_str)
        .map(str::to_owned);
    let type_tag = object.get(TYPE_KEY).and_then(Value::as_str);

    let body = match classify(type_tag) {
        Ok(MessageKind::ChannelList) => match channel_names(&object) {
            Ok(channels) => InboundBody::ChannelList { channels },
            // Notifications decode regardless of their body.
            Err(_) if !status.is_ok() => InboundBody::Unknown {
                type_tag: type_tag.map(str::to_owned),
            },
            Err(err) => return Err(err),
        },
        Ok(MessageKind::Event) => InboundBody::Event {
            fields: event_fields(&object),
        },
        Ok(MessageKind::Unknown) => InboundBody::Unknown {
            type_tag: type_tag.map(str::to_owned),
        },
        Err(DecodeError::UnknownType(tag)) => {
            tracing::debug!(
                type_tag = tag.as_deref().unwrap_or("<missing>"),
                "Unrecognized message type, treating as unknown"
            );
            InboundBody::Unknown { type_tag: tag }
        }
        Err(err) => return Err(err),
    };

    Ok(InboundMessage {
        status,
        body,
        detail,
    })
}

fn channel_names(object: &IndexMap<String, Value>) -> Result<Vec<String>, DecodeError> {
    let Some(Value::Array(items)) = object.get(CHANNELS_KEY) else {
        return Err(DecodeError::Malformed(
            "channel_list without a `channels` array".into(),
        ));
    };
    items
        .iter()
        .map(|item| {
            item.as_str().map(str::to_owned).ok_or_else(|| {
                DecodeError::Malformed(format!("channel name is not a string: {item}"))
            })
        })
        .collect()
}

/// Everything that is not a control key, rendered as text.
fn event_fields(object: &IndexMap<String, Value>) -> EventFields {
    object
        .iter()
        .filter(|(key, _)| !key.starts_with(CONTROL_PREFIX))
        .map(|(key, value)| {
            let text = match value {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            (key.clone(), text)
        })
        .collect()
}

// ── Tests ────────────────────────────────────────────────────────────
