//! Channel picker pane: the advertised channels with a toggle per channel.

use std::collections::BTreeSet;

use ratatui::{
    Frame,
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, List, ListItem, ListState},
};

use logtail_core::ChannelOptions;

use crate::theme;

#[derive(Debug, Default)]
pub struct ChannelPicker {
    available: Vec<String>,
    desired: BTreeSet<String>,
    cursor: usize,
}

impl ChannelPicker {
    pub fn new(desired: BTreeSet<String>) -> Self {
        Self {
            available: Vec::new(),
            desired,
            cursor: 0,
        }
    }

    pub fn available(&self) -> &[String] {
        &self.available
    }

    pub fn desired(&self) -> &BTreeSet<String> {
        &self.desired
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Replace the advertised list, keeping the cursor on the same channel
    /// when it is still present.
    pub fn set_options(&mut self, options: &ChannelOptions) {
        let current = self.available.get(self.cursor).cloned();
        self.available.clone_from(&options.available);
        self.cursor = current
            .and_then(|name| self.available.iter().position(|c| *c == name))
            .unwrap_or(0)
            .min(self.available.len().saturating_sub(1));
    }

    pub fn move_up(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_down(&mut self) {
        if self.cursor + 1 < self.available.len() {
            self.cursor += 1;
        }
    }

    /// Flip the channel under the cursor. Returns the new desired set, or
    /// `None` when the list is empty.
    pub fn toggle(&mut self) -> Option<BTreeSet<String>> {
        let name = self.available.get(self.cursor)?;
        if !self.desired.remove(name) {
            self.desired.insert(name.clone());
        }
        Some(self.desired.clone())
    }

    /// Desired channels the server does not currently advertise.
    pub fn missing(&self) -> impl Iterator<Item = &String> {
        self.desired
            .iter()
            .filter(|name| !self.available.contains(*name))
    }
}

pub fn render(frame: &mut Frame, area: Rect, picker: &ChannelPicker, focused: bool) {
    let block = Block::default()
        .title(format!(
            " Channels ({}/{}) ",
            picker.desired().len(),
            picker.available().len()
        ))
        .title_style(theme::title_style())
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(if focused {
            theme::border_focused()
        } else {
            theme::border_default()
        });

    let mut items: Vec<ListItem> = picker
        .available()
        .iter()
        .map(|name| {
            let mark = if picker.desired().contains(name) { "[x] " } else { "[ ] " };
            ListItem::new(Line::from(vec![
                Span::styled(mark, theme::key_hint_key()),
                Span::styled(name.as_str(), theme::list_row()),
            ]))
        })
        .collect();
    items.extend(picker.missing().map(|name| {
        ListItem::new(Line::from(Span::styled(
            format!("[x] {name} (not advertised)"),
            theme::key_hint(),
        )))
    }));

    let list = List::new(items)
        .block(block)
        .highlight_style(theme::list_selected());
    let mut state = ListState::default();
    if focused && !picker.available().is_empty() {
        state.select(Some(picker.cursor()));
    }
    frame.render_stateful_widget(list, area, &mut state);
}
