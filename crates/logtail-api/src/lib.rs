// logtail-api: wire protocol codec and WebSocket transport for logtail

pub mod error;
pub mod protocol;
pub mod websocket;

pub use error::Error;
pub use protocol::{
    DecodeError, EventFields, InboundBody, InboundMessage, OutboundMessage, Status, decode, encode,
};
pub use websocket::{
    CloseCode, ConnectionId, TransportEvent, TransportNotice, WsConnection, endpoint_url,
};
