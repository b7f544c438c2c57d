//! Paginated message history: merge policy, scroll anchoring, and the
//! page-1 versus later-page error distinction.

use uuid::Uuid;

use crate::api::WireMessage;
use crate::message::{Message, Sender};

/// How long a self-clearing "load more" error stays visible.
pub const ERROR_CLEAR_MS: u64 = 5000;

pub const HISTORY_LOAD_ERROR: &str = "Failed to retrieve message history.";
pub const OLDER_LOAD_ERROR: &str = "Failed to load older messages. Scroll up to retry.";

/// Scroll position captured immediately before a prepend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrollAnchor {
    pub scroll_top: usize,
    pub scroll_height: usize,
}

/// Where the view should move after a page merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollIntent {
    /// Initial load: anchor to the newest message.
    Bottom,
    /// Older page prepended: restore the anchor once the new height is known.
    PreserveAnchor(ScrollAnchor),
    /// Nothing moved.
    Unchanged,
}

/// Keep the message that was on screen before a prepend visually stationary:
/// shift the captured offset down by however much the content grew.
pub fn restore_anchor(before: ScrollAnchor, new_scroll_height: usize) -> usize {
    if new_scroll_height > before.scroll_height {
        before.scroll_top + (new_scroll_height - before.scroll_height)
    } else {
        before.scroll_top
    }
}

/// In-memory ordered message list fed by paginated backend fetches.
///
/// Page 1 replaces the list (cold load); later pages are prepended as the
/// user scrolls up through older history.
pub struct HistoryLoader {
    messages: Vec<Message>,
    current_page: u32,
    all_older_loaded: bool,
    is_loading_older: bool,
    transient_error: Option<String>,
    error_epoch: u64,
}

impl HistoryLoader {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            current_page: 1,
            all_older_loaded: false,
            is_loading_older: false,
            transient_error: None,
            error_epoch: 0,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn message_mut(&mut self, id: Uuid) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn all_older_loaded(&self) -> bool {
        self.all_older_loaded
    }

    pub fn is_loading_older(&self) -> bool {
        self.is_loading_older
    }

    pub fn transient_error(&self) -> Option<&str> {
        self.transient_error.as_deref()
    }

    /// Append a message produced locally (user input, assistant reply,
    /// synthetic error text).
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Whether a "load older" request may be issued right now. Guards against
    /// duplicate concurrent page fetches from rapid scroll events.
    pub fn can_load_older(&self, send_pending: bool) -> bool {
        !self.is_loading_older && !self.all_older_loaded && !send_pending
    }

    /// Mark an older-page fetch as in flight. Returns the page to request,
    /// or `None` when the guard refuses.
    pub fn begin_load_older(&mut self, send_pending: bool) -> Option<u32> {
        if !self.can_load_older(send_pending) {
            return None;
        }
        self.is_loading_older = true;
        Some(self.current_page + 1)
    }

    /// Merge a successfully fetched page.
    ///
    /// The batch is sorted by timestamp ascending first; source order is not
    /// guaranteed. Assistant messages get display markup, and every loaded
    /// message starts with the copied indicator off.
    pub fn apply_page(&mut self, page: u32, batch: Vec<WireMessage>, anchor: ScrollAnchor) -> ScrollIntent {
        self.is_loading_older = false;
        self.clear_error();

        if batch.is_empty() {
            self.all_older_loaded = true;
            return ScrollIntent::Unchanged;
        }

        let mut incoming: Vec<Message> = batch
            .into_iter()
            .filter_map(|wire| match wire.into_message() {
                Ok(message) => Some(message),
                Err(e) => {
                    tracing::warn!("dropping malformed history message: {e}");
                    None
                }
            })
            .collect();
        incoming.sort_by_key(|m| m.timestamp);
        for message in &mut incoming {
            message.copied = false;
        }

        if page == 1 {
            self.messages = incoming;
            self.current_page = 1;
            ScrollIntent::Bottom
        } else {
            incoming.append(&mut self.messages);
            self.messages = incoming;
            self.current_page = page;
            ScrollIntent::PreserveAnchor(anchor)
        }
    }

    /// Record a failed page fetch.
    ///
    /// A failed initial load leaves a persistent error; a failed "load more"
    /// leaves the list untouched and returns the epoch for a self-clearing
    /// timer, so the fetch stays retryable.
    pub fn apply_page_failure(&mut self, page: u32) -> Option<u64> {
        self.is_loading_older = false;

        if page == 1 || self.messages.is_empty() {
            self.transient_error = Some(HISTORY_LOAD_ERROR.to_string());
            self.error_epoch += 1;
            None
        } else {
            self.transient_error = Some(OLDER_LOAD_ERROR.to_string());
            self.error_epoch += 1;
            Some(self.error_epoch)
        }
    }

    /// Clear the transient error if the given timer epoch is still current.
    pub fn clear_error_if_current(&mut self, epoch: u64) {
        if self.error_epoch == epoch {
            self.transient_error = None;
        }
    }

    fn clear_error(&mut self) {
        self.transient_error = None;
        self.error_epoch += 1;
    }

    /// Most recent message timestamp, if any. Input for the recency-based
    /// suggestion trigger.
    pub fn last_message_timestamp(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.messages.last().map(|m| m.timestamp)
    }

    /// Last question/answer pair, for restoring suggestion context after a
    /// cold load.
    pub fn last_exchange(&self) -> (Option<&Message>, Option<&Message>) {
        let question = self.messages.iter().rev().find(|m| m.sender == Sender::User);
        let answer = self.messages.iter().rev().find(|m| m.sender == Sender::Chatbot);
        (question, answer)
    }
}

impl Default for HistoryLoader {
    fn default() -> Self {
        Self::new()
    }
}
