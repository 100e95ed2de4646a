//! All possible UI actions. Actions are the sole mechanism for state mutation.

use logtail_core::{ChannelOptions, ConnectionState, EventFields, ProtocolNotification};

/// Which pane receives navigation keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    Channels,
    #[default]
    Log,
}

impl Focus {
    pub fn toggle(self) -> Self {
        match self {
            Self::Channels => Self::Log,
            Self::Log => Self::Channels,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Action {
    // ── Lifecycle ──
    Quit,
    Resize(u16, u16),

    // ── Navigation ──
    ToggleHelp,
    FocusNext,
    MoveUp,
    MoveDown,
    PageUp,
    PageDown,
    JumpTop,
    JumpBottom,

    // ── Commands ──
    ToggleChannel,
    TogglePause,
    ClearLog,
    Reconnect,

    // ── From the log client ──
    LogEvent(EventFields),
    ChannelsUpdated(ChannelOptions),
    ConnectionChanged(ConnectionState),
    Notification(ProtocolNotification),
    ClientError(String),
}
