//! Scrollback buffer for the log pane.
//!
//! Bounded: the oldest lines fall off once `capacity` is reached. The view
//! is anchored by an offset from the newest line, so while paused or
//! scrolled back new lines arrive below the visible window instead of
//! moving it.

use std::collections::VecDeque;

use chrono::{DateTime, Local};
use ratatui::{
    Frame,
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph},
};

use logtail_core::EventFields;

use crate::theme;

pub const DEFAULT_CAPACITY: usize = 5_000;

const STANDARD_FIELDS: [&str; 4] = ["time", "channel", "prefix", "message"];

#[derive(Debug, Clone)]
pub struct LogLine {
    pub received: DateTime<Local>,
    pub fields: EventFields,
}

#[derive(Debug)]
pub struct LogView {
    lines: VecDeque<LogLine>,
    capacity: usize,
    paused: bool,
    /// Lines between the newest line and the bottom of the view.
    offset: usize,
    /// Lines that arrived while not following.
    unseen: usize,
}

impl LogView {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
            paused: false,
            offset: 0,
            unseen: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn unseen(&self) -> usize {
        self.unseen
    }

    /// Following means new lines scroll into view.
    pub fn is_following(&self) -> bool {
        !self.paused && self.offset == 0
    }

    pub fn push(&mut self, line: LogLine) {
        let following = self.is_following();
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);

        if !following {
            self.offset += 1;
            self.unseen += 1;
            self.clamp();
        }
    }

    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
        if !self.paused {
            self.jump_bottom();
        }
    }

    pub fn scroll_up(&mut self, n: usize) {
        self.offset = self.offset.saturating_add(n);
        self.clamp();
    }

    pub fn scroll_down(&mut self, n: usize) {
        self.offset = self.offset.saturating_sub(n);
        if self.offset == 0 {
            self.unseen = 0;
        }
    }

    pub fn jump_top(&mut self) {
        self.offset = self.lines.len().saturating_sub(1);
    }

    pub fn jump_bottom(&mut self) {
        self.offset = 0;
        self.unseen = 0;
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.offset = 0;
        self.unseen = 0;
    }

    /// The `height` lines ending at the current scroll position, oldest first.
    pub fn visible(&self, height: usize) -> impl Iterator<Item = &LogLine> {
        let end = self.lines.len() - self.offset;
        let start = end.saturating_sub(height);
        self.lines.range(start..end)
    }

    fn clamp(&mut self) {
        self.offset = self.offset.min(self.lines.len().saturating_sub(1));
    }
}

fn line_spans(line: &LogLine) -> Line<'_> {
    let mut spans = Vec::with_capacity(line.fields.len() * 2 + 2);
    if !line.fields.contains_key("time") {
        spans.push(Span::styled(
            line.received.format("%H:%M:%S").to_string(),
            theme::log_time(),
        ));
        spans.push(Span::raw(" "));
    }
    for key in STANDARD_FIELDS {
        let Some(value) = line.fields.get(key) else {
            continue;
        };
        let style = match key {
            "time" => theme::log_time(),
            "channel" => theme::log_channel(),
            "prefix" => theme::log_prefix(),
            _ => theme::log_message(),
        };
        spans.push(Span::styled(value.as_str(), style));
        spans.push(Span::raw(" "));
    }
    for (key, value) in &line.fields {
        if !STANDARD_FIELDS.contains(&key.as_str()) {
            spans.push(Span::styled(format!("{key}={value} "), theme::key_hint()));
        }
    }
    Line::from(spans)
}

pub fn render(frame: &mut Frame, area: Rect, view: &LogView, focused: bool) {
    let title = if view.is_following() {
        format!(" Log ({}) ", view.len())
    } else {
        format!(" Log ({}) · {} new ", view.len(), view.unseen())
    };
    let block = Block::default()
        .title(title)
        .title_style(theme::title_style())
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(if focused {
            theme::border_focused()
        } else {
            theme::border_default()
        });

    let inner = block.inner(area);
    let lines: Vec<Line> = view
        .visible(usize::from(inner.height))
        .map(line_spans)
        .collect();

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn line(message: &str) -> LogLine {
        LogLine {
            received: Local::now(),
            fields: [("message".to_owned(), message.to_owned())]
                .into_iter()
                .collect(),
        }
    }

    fn messages(view: &LogView, height: usize) -> Vec<&str> {
        view.visible(height)
            .map(|l| l.fields["message"].as_str())
            .collect()
    }

    #[test]
    fn follows_newest_lines() {
        let mut view = LogView::new(10);
        for m in ["a", "b", "c"] {
            view.push(line(m));
        }
        assert_eq!(messages(&view, 2), vec!["b", "c"]);
        assert!(view.is_following());
    }

    #[test]
    fn drops_oldest_beyond_capacity() {
        let mut view = LogView::new(2);
        for m in ["a", "b", "c"] {
            view.push(line(m));
        }
        assert_eq!(view.len(), 2);
        assert_eq!(messages(&view, 10), vec!["b", "c"]);
    }

    #[test]
    fn pause_anchors_the_view() {
        let mut view = LogView::new(10);
        view.push(line("a"));
        view.push(line("b"));
        view.toggle_pause();

        view.push(line("c"));
        view.push(line("d"));
        assert_eq!(messages(&view, 2), vec!["a", "b"]);
        assert_eq!(view.unseen(), 2);

        view.toggle_pause();
        assert_eq!(messages(&view, 2), vec!["c", "d"]);
        assert_eq!(view.unseen(), 0);
    }

    #[test]
    fn scrolling_is_clamped() {
        let mut view = LogView::new(10);
        for m in ["a", "b", "c"] {
            view.push(line(m));
        }
        view.scroll_up(100);
        assert_eq!(messages(&view, 1), vec!["a"]);

        view.scroll_down(1);
        assert_eq!(messages(&view, 1), vec!["b"]);
        assert!(!view.is_following());

        view.scroll_down(5);
        assert!(view.is_following());
    }

    #[test]
    fn clear_resets_scroll() {
        let mut view = LogView::new(10);
        view.push(line("a"));
        view.scroll_up(1);
        view.clear();
        assert_eq!(view.len(), 0);
        assert_eq!(view.visible(5).count(), 0);
    }
}
