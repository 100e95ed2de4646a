//! Application core: event loop, key mapping, action dispatch.

use std::time::Duration;

use chrono::Local;
use color_eyre::eyre::Result;
use crossterm::event::{
    Event as TerminalEvent, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers,
};
use futures::StreamExt;
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Paragraph},
};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use logtail_core::{ClientConfig, ConnectionState, LogClient, RetryPolicy};

use crate::action::{Action, Focus};
use crate::bridge::ActionSink;
use crate::theme;
use crate::tui::Tui;
use crate::widgets::channel_picker::{self, ChannelPicker};
use crate::widgets::log_view::{self, LogLine, LogView};

const CHANNEL_PANE_WIDTH: u16 = 30;
/// Upper bound on redraws, roughly 30 per second.
const FRAME_INTERVAL: Duration = Duration::from_millis(33);

/// Top-level application state and event loop.
pub struct App {
    config: ClientConfig,
    client: Option<LogClient>,
    running: bool,
    focus: Focus,
    help_visible: bool,
    terminal_size: (u16, u16),
    connection: ConnectionState,
    retry: RetryPolicy,
    /// Last server notification or client error, shown in the status bar.
    notice: Option<String>,
    log: LogView,
    picker: ChannelPicker,
    action_tx: mpsc::UnboundedSender<Action>,
    action_rx: mpsc::UnboundedReceiver<Action>,
}

impl App {
    pub fn new(config: ClientConfig, scrollback: usize) -> Self {
        let (action_tx, action_rx) = mpsc::unbounded_channel();
        Self {
            retry: config.retry,
            picker: ChannelPicker::new(config.channels.clone()),
            config,
            client: None,
            running: true,
            focus: Focus::default(),
            help_visible: false,
            terminal_size: (80, 24),
            connection: ConnectionState::Idle,
            notice: None,
            log: LogView::new(scrollback),
            action_tx,
            action_rx,
        }
    }

    /// Run the main event loop until the user quits.
    ///
    /// Terminal input and client updates are applied as they arrive; the
    /// screen is redrawn on the next frame tick after any change.
    pub async fn run(&mut self) -> Result<()> {
        let mut tui = Tui::new()?;
        tui.enter()?;
        self.terminal_size = tui.size().unwrap_or((80, 24));

        self.client = Some(LogClient::spawn(
            self.config.clone(),
            ActionSink::new(self.action_tx.clone()),
        ));

        let mut input = EventStream::new();
        let mut frames = tokio::time::interval(FRAME_INTERVAL);
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut dirty = true;

        info!(url = %self.config.url, "TUI event loop started");

        while self.running {
            tokio::select! {
                _ = frames.tick() => {
                    if dirty {
                        tui.draw(|frame| self.render(frame))?;
                        dirty = false;
                    }
                }
                Some(action) = self.action_rx.recv() => {
                    self.process_action(action);
                    dirty = true;
                }
                event = input.next() => match event {
                    Some(Ok(event)) => {
                        if let Some(action) = self.map_terminal_event(&event) {
                            self.process_action(action);
                            dirty = true;
                        }
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "terminal input failed");
                        self.running = false;
                    }
                    None => self.running = false,
                },
            }
        }

        drop(tui);
        info!("TUI event loop ended");

        if let Some(client) = self.client.take() {
            client.shutdown().await?;
        }
        Ok(())
    }

    /// Key presses and resizes become actions; everything else is ignored.
    fn map_terminal_event(&self, event: &TerminalEvent) -> Option<Action> {
        match event {
            TerminalEvent::Key(key) if key.kind == KeyEventKind::Press => {
                self.handle_key_event(*key)
            }
            TerminalEvent::Resize(w, h) => Some(Action::Resize(*w, *h)),
            _ => None,
        }
    }

    /// Map a key event to an action.
    fn handle_key_event(&self, key: KeyEvent) -> Option<Action> {
        if self.help_visible {
            return match key.code {
                KeyCode::Esc | KeyCode::Char('?') => Some(Action::ToggleHelp),
                _ => None,
            };
        }

        if key.modifiers.contains(KeyModifiers::CONTROL) {
            return match key.code {
                KeyCode::Char('c') => Some(Action::Quit),
                KeyCode::Char('d') => Some(Action::PageDown),
                KeyCode::Char('u') => Some(Action::PageUp),
                _ => None,
            };
        }

        match key.code {
            KeyCode::Char('q') => Some(Action::Quit),
            KeyCode::Char('?') => Some(Action::ToggleHelp),
            KeyCode::Tab | KeyCode::BackTab => Some(Action::FocusNext),
            KeyCode::Char('j') | KeyCode::Down => Some(Action::MoveDown),
            KeyCode::Char('k') | KeyCode::Up => Some(Action::MoveUp),
            KeyCode::PageDown => Some(Action::PageDown),
            KeyCode::PageUp => Some(Action::PageUp),
            KeyCode::Char('g') | KeyCode::Home => Some(Action::JumpTop),
            KeyCode::Char('G') | KeyCode::End => Some(Action::JumpBottom),
            KeyCode::Char(' ') | KeyCode::Enter if self.focus == Focus::Channels => {
                Some(Action::ToggleChannel)
            }
            KeyCode::Char('p' | ' ') => Some(Action::TogglePause),
            KeyCode::Char('c') => Some(Action::ClearLog),
            KeyCode::Char('r') => Some(Action::Reconnect),
            _ => None,
        }
    }

    fn page_size(&self) -> usize {
        // Borders plus status bar.
        usize::from(self.terminal_size.1.saturating_sub(3)).max(1)
    }

    /// Apply one action to the app state.
    fn process_action(&mut self, action: Action) {
        match action {
            Action::Quit => self.running = false,
            Action::Resize(w, h) => self.terminal_size = (w, h),
            Action::ToggleHelp => self.help_visible = !self.help_visible,
            Action::FocusNext => self.focus = self.focus.toggle(),

            Action::MoveUp => match self.focus {
                Focus::Channels => self.picker.move_up(),
                Focus::Log => self.log.scroll_up(1),
            },
            Action::MoveDown => match self.focus {
                Focus::Channels => self.picker.move_down(),
                Focus::Log => self.log.scroll_down(1),
            },
            Action::PageUp => self.log.scroll_up(self.page_size()),
            Action::PageDown => self.log.scroll_down(self.page_size()),
            Action::JumpTop => self.log.jump_top(),
            Action::JumpBottom => self.log.jump_bottom(),

            Action::ToggleChannel => {
                if let Some(desired) = self.picker.toggle() {
                    debug!(channels = desired.len(), "selection changed");
                    self.send_to_client(|client| client.select_channels(desired));
                }
            }
            Action::TogglePause => self.log.toggle_pause(),
            Action::ClearLog => self.log.clear(),
            Action::Reconnect => {
                self.notice = None;
                self.send_to_client(LogClient::reconnect);
            }

            Action::LogEvent(fields) => self.log.push(LogLine {
                received: Local::now(),
                fields,
            }),
            Action::ChannelsUpdated(options) => self.picker.set_options(&options),
            Action::ConnectionChanged(state) => {
                if state.is_open() {
                    self.notice = None;
                }
                self.connection = state;
            }
            Action::Notification(notification) => self.notice = Some(notification.to_string()),
            Action::ClientError(message) => self.notice = Some(message),

        }
    }

    fn send_to_client(
        &mut self,
        command: impl FnOnce(&LogClient) -> Result<(), logtail_core::CoreError>,
    ) {
        let Some(client) = self.client.as_ref() else {
            return;
        };
        if let Err(e) = command(client) {
            warn!(error = %e, "log client command failed");
            self.notice = Some(e.to_string());
        }
    }

    // ── Rendering ────────────────────────────────────────────────────

    fn render(&self, frame: &mut Frame) {
        let area = frame.area();

        let [body, status] = Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).areas(area);
        let [channels, log] = Layout::horizontal([
            Constraint::Length(CHANNEL_PANE_WIDTH),
            Constraint::Min(1),
        ])
        .areas(body);

        channel_picker::render(frame, channels, &self.picker, self.focus == Focus::Channels);
        log_view::render(frame, log, &self.log, self.focus == Focus::Log);
        self.render_status_bar(frame, status);

        if self.help_visible {
            render_help_overlay(frame, area);
        }
    }

    fn connection_indicator(&self) -> Span<'static> {
        match &self.connection {
            ConnectionState::Open => {
                Span::styled("● connected", Style::default().fg(theme::SUCCESS_GREEN))
            }
            ConnectionState::Connecting => {
                Span::styled("◐ connecting", Style::default().fg(theme::ELECTRIC_YELLOW))
            }
            ConnectionState::Retrying { attempt } => Span::styled(
                format!(
                    "◐ retrying in {} ({attempt}/{})",
                    humantime::format_duration(self.retry.delay_for(*attempt)),
                    self.retry.max_retries
                ),
                Style::default().fg(theme::ELECTRIC_YELLOW),
            ),
            ConnectionState::Failed => Span::styled(
                "✖ disconnected, press r to reconnect",
                Style::default().fg(theme::ERROR_RED),
            ),
            other => Span::styled(format!("○ {other}"), theme::key_hint()),
        }
    }

    fn render_status_bar(&self, frame: &mut Frame, area: Rect) {
        let mut spans = vec![Span::raw(" "), self.connection_indicator()];

        if self.log.is_paused() {
            spans.push(Span::styled(
                format!("  ⏸ paused (+{})", self.log.unseen()),
                Style::default().fg(theme::ELECTRIC_YELLOW),
            ));
        }
        if let Some(notice) = &self.notice {
            spans.push(Span::styled(format!("  {notice}"), theme::notification()));
        }
        spans.push(Span::styled(
            " │ ? help  tab focus  p pause  r reconnect  q quit",
            theme::key_hint(),
        ));

        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let width = 50u16.min(area.width.saturating_sub(4));
    let height = 16u16.min(area.height.saturating_sub(4));
    let help_area = Rect::new(
        area.x + area.width.saturating_sub(width) / 2,
        area.y + area.height.saturating_sub(height) / 2,
        width,
        height,
    );

    let block = Block::default()
        .title(" Keyboard Shortcuts ")
        .title_style(theme::title_style())
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(theme::border_focused())
        .style(Style::default().bg(theme::BG_DARK));

    let rows = [
        ("Tab", "Switch pane"),
        ("j/k ↑/↓", "Move / scroll"),
        ("Ctrl+d/u", "Page down / up"),
        ("g/G", "Oldest / newest"),
        ("Space", "Toggle channel (channel pane)"),
        ("p", "Pause / follow"),
        ("c", "Clear log"),
        ("r", "Reconnect"),
        ("q", "Quit"),
    ];
    let mut lines = vec![Line::from("")];
    lines.extend(rows.iter().map(|(key, what)| {
        Line::from(vec![
            Span::styled(format!("  {key:<10}"), theme::key_hint_key()),
            Span::styled(*what, theme::key_hint()),
        ])
    }));
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled("  Esc or ? to close", theme::key_hint())));

    frame.render_widget(Clear, help_area);
    frame.render_widget(Paragraph::new(lines).block(block), help_area);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use logtail_core::ChannelOptions;

    use super::*;

    fn app() -> App {
        let config =
            ClientConfig::new("ws://localhost:8043/".parse().unwrap()).with_channels(["#ops"]);
        App::new(config, 100)
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn space_depends_on_focus() {
        let mut app = app();
        assert!(matches!(
            app.handle_key_event(key(KeyCode::Char(' '))),
            Some(Action::TogglePause)
        ));

        app.process_action(Action::FocusNext);
        assert!(matches!(
            app.handle_key_event(key(KeyCode::Char(' '))),
            Some(Action::ToggleChannel)
        ));
    }

    #[test]
    fn help_swallows_other_keys() {
        let mut app = app();
        app.process_action(Action::ToggleHelp);
        assert!(app.handle_key_event(key(KeyCode::Char('q'))).is_none());
        assert!(matches!(
            app.handle_key_event(key(KeyCode::Esc)),
            Some(Action::ToggleHelp)
        ));
    }

    #[test]
    fn terminal_events_map_to_actions() {
        let mut app = app();

        let mut release = key(KeyCode::Char('q'));
        release.kind = KeyEventKind::Release;
        assert!(app.map_terminal_event(&TerminalEvent::Key(release)).is_none());
        assert!(matches!(
            app.map_terminal_event(&TerminalEvent::Key(key(KeyCode::Char('q')))),
            Some(Action::Quit)
        ));
        assert!(app.map_terminal_event(&TerminalEvent::FocusGained).is_none());

        let resize = app.map_terminal_event(&TerminalEvent::Resize(120, 40)).unwrap();
        app.process_action(resize);
        assert_eq!(app.terminal_size, (120, 40));
        assert_eq!(app.page_size(), 37);
    }

    #[test]
    fn toggling_without_client_updates_picker() {
        let mut app = app();
        app.process_action(Action::ChannelsUpdated(ChannelOptions {
            available: vec!["#dev".into(), "#ops".into()],
            ..ChannelOptions::default()
        }));
        app.process_action(Action::FocusNext);
        app.process_action(Action::ToggleChannel);

        assert_eq!(
            app.picker.desired().iter().collect::<Vec<_>>(),
            vec!["#dev", "#ops"]
        );
    }

    #[test]
    fn open_clears_stale_notice() {
        let mut app = app();
        app.process_action(Action::ClientError("boom".into()));
        app.process_action(Action::ConnectionChanged(ConnectionState::Retrying {
            attempt: 1,
        }));
        assert_eq!(app.notice.as_deref(), Some("boom"));

        app.process_action(Action::ConnectionChanged(ConnectionState::Open));
        assert!(app.notice.is_none());
        assert!(app.connection.is_open());
    }

    #[test]
    fn events_land_in_the_log() {
        let mut app = app();
        app.process_action(Action::LogEvent(
            [("message".to_owned(), "hi".to_owned())].into_iter().collect(),
        ));
        assert_eq!(app.log.len(), 1);
        app.process_action(Action::ClearLog);
        assert_eq!(app.log.len(), 0);
    }
}
