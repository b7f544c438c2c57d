//! Chat view: message pane with a scroll viewport, suggestion row, status
//! badge, and error banner.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};

use crate::api::LoadOutcome;
use crate::clipboard::message_copy_text;
use crate::history::{ScrollAnchor, ScrollIntent, restore_anchor};
use crate::message::{Message, Sender};

/// Scroll state of the message pane, measured in wrapped display lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct Viewport {
    pub scroll_top: usize,
    pub content_height: usize,
    pub view_height: usize,
}

impl Viewport {
    /// Snapshot taken before a prepend so the merge can restore it.
    pub fn anchor(&self) -> ScrollAnchor {
        ScrollAnchor {
            scroll_top: self.scroll_top,
            scroll_height: self.content_height,
        }
    }

    pub fn max_scroll(&self) -> usize {
        self.content_height.saturating_sub(self.view_height)
    }

    pub fn at_top(&self) -> bool {
        self.scroll_top == 0
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll_top = self.max_scroll();
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll_top = self.scroll_top.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.scroll_top = (self.scroll_top + lines).min(self.max_scroll());
    }

    /// Apply a merge's scroll request once the new content height is known.
    pub fn apply_intent(&mut self, intent: ScrollIntent, new_content_height: usize) {
        self.content_height = new_content_height;
        match intent {
            ScrollIntent::Bottom => self.scroll_to_bottom(),
            ScrollIntent::PreserveAnchor(anchor) => {
                self.scroll_top = restore_anchor(anchor, new_content_height).min(self.max_scroll());
            }
            ScrollIntent::Unchanged => {
                self.scroll_top = self.scroll_top.min(self.max_scroll());
            }
        }
    }
}

/// Immutable render snapshot of the conversation.
pub struct ChatView<'a> {
    pub messages: &'a [Message],
    pub suggestions: &'a [String],
    pub badge: LoadOutcome,
    pub error: Option<&'a str>,
    pub is_loading: bool,
    pub input: &'a str,
    pub viewport: Viewport,
}

impl ChatView<'_> {
    /// Total display height of the message pane content at the given width.
    pub fn content_height(messages: &[Message], width: u16) -> usize {
        messages
            .iter()
            .map(|m| message_lines(m, width).len() + 1)
            .sum()
    }

    fn badge_symbol(&self) -> Span<'static> {
        match self.badge {
            LoadOutcome::Success => Span::styled("● up to date", Style::default().fg(Color::Green)),
            LoadOutcome::Failed => Span::styled("● stale", Style::default().fg(Color::Yellow)),
            LoadOutcome::Error => Span::styled("● unknown", Style::default().fg(Color::Red)),
        }
    }
}

/// Wrap one message into prefixed display lines.
fn message_lines(message: &Message, width: u16) -> Vec<String> {
    let text = message_copy_text(message);
    let prefix = match message.sender {
        Sender::User => "you",
        Sender::Chatbot => "bot",
    };
    let marker = if message.copied { " [copied]" } else { "" };
    let width = width.saturating_sub(2) as usize;

    let mut lines = vec![format!("{prefix}{marker}:")];
    for raw_line in text.lines() {
        if raw_line.is_empty() {
            lines.push(String::new());
            continue;
        }
        lines.extend(wrap_line(raw_line, width));
    }
    lines
}

fn wrap_line(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    let mut current = String::new();
    // Width is in columns, so count chars; byte length over-counts
    // multi-byte text and wraps it early.
    let mut current_width = 0;
    for word in text.split_whitespace() {
        let word_width = word.chars().count();
        if current_width > 0 && current_width + word_width + 1 > width {
            lines.push(std::mem::take(&mut current));
            current_width = 0;
        }
        if current_width > 0 {
            current.push(' ');
            current_width += 1;
        }
        current.push_str(word);
        current_width += word_width;
    }
    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

impl Widget for ChatView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(Line::from(vec![Span::raw("parley "), self.badge_symbol()]));
        let inner = block.inner(area);
        block.render(area, buf);

        if inner.height < 4 {
            return;
        }

        // Bottom rows: input line, suggestion row, optional error banner.
        let mut reserved = 2u16;
        if self.error.is_some() {
            reserved += 1;
        }
        let pane_height = inner.height.saturating_sub(reserved);

        let mut all_lines: Vec<Line> = Vec::new();
        for message in self.messages {
            let style = match message.sender {
                Sender::User => Style::default().fg(Color::Blue),
                Sender::Chatbot => Style::default().fg(Color::Green),
            };
            for text in message_lines(message, inner.width) {
                all_lines.push(Line::from(Span::styled(text, style)));
            }
            all_lines.push(Line::from(Span::raw("")));
        }

        let top = self.viewport.scroll_top.min(all_lines.len());
        let visible = all_lines
            .iter()
            .skip(top)
            .take(pane_height as usize);
        for (i, line) in visible.enumerate() {
            buf.set_line(inner.x, inner.y + i as u16, line, inner.width);
        }

        let mut y = inner.y + pane_height;
        if let Some(error) = self.error {
            let banner = Line::from(Span::styled(error, Style::default().fg(Color::Red)));
            buf.set_line(inner.x, y, &banner, inner.width);
            y += 1;
        }

        let suggestion_row = if self.suggestions.is_empty() {
            Line::from(Span::raw(""))
        } else {
            let joined = self
                .suggestions
                .iter()
                .enumerate()
                .map(|(i, s)| format!("[{}] {}", i + 1, s))
                .collect::<Vec<_>>()
                .join("  ");
            Line::from(Span::styled(joined, Style::default().fg(Color::DarkGray)))
        };
        buf.set_line(inner.x, y, &suggestion_row, inner.width);
        y += 1;

        let prompt = if self.is_loading {
            Line::from(Span::styled("... waiting for reply", Style::default().fg(Color::DarkGray)))
        } else {
            Line::from(vec![Span::raw("> "), Span::raw(self.input.to_string())])
        };
        buf.set_line(inner.x, y, &prompt, inner.width);
    }
}
