//! Clipboard copy support for messages and code snippets.
//!
//! Copying is plain-text only: markup produced by the formatter is stripped
//! back down to visible text before it reaches the system clipboard.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::sync::Mutex;
use tokio::time::Duration;

use crate::format::COPY_ICON_TOKEN;
use crate::message::Message;

/// How long the "copied" indicator stays on after a copy.
pub const COPIED_RESET_MS: u64 = 1000;

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static LONG_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{10,}").unwrap());

/// Destination for copied text. The system clipboard in the app, a recording
/// buffer in tests.
pub trait ClipboardSink: Send {
    fn set_text(&mut self, text: &str) -> Result<()>;
}

/// System clipboard backed by `arboard`.
pub struct SystemClipboard {
    clipboard: arboard::Clipboard,
}

impl SystemClipboard {
    pub fn new() -> Result<Self> {
        let clipboard = arboard::Clipboard::new()
            .map_err(|e| anyhow::anyhow!("clipboard unavailable: {e}"))?;
        Ok(Self { clipboard })
    }
}

impl ClipboardSink for SystemClipboard {
    fn set_text(&mut self, text: &str) -> Result<()> {
        self.clipboard
            .set_text(text.to_string())
            .map_err(|e| anyhow::anyhow!("failed to write clipboard: {e}"))
            .context("copy failed")
    }
}

/// Extract the plain-text clipboard payload for a message.
///
/// Prefers the sanitized markup when present, converts `<br>` back to
/// newlines, strips all tags, removes any leaked copy-icon token, and
/// collapses long whitespace runs left behind by structural markup.
pub fn message_copy_text(message: &Message) -> String {
    let source = message
        .sanitized_content
        .as_ref()
        .map_or(message.content.as_str(), |html| html.as_str());
    let text = source.replace("<br>", "\n");
    let text = TAG.replace_all(&text, "");
    let text = text.replace(COPY_ICON_TOKEN, "");
    LONG_WHITESPACE.replace_all(&text, "\n\n\n").into_owned()
}

/// Transient "copied" indicators for snippet copy affordances, keyed by
/// affordance handle. Each copy arms its own reset timer; timers on
/// different handles never interfere.
#[derive(Clone, Default)]
pub struct SnippetFlags {
    inner: Arc<Mutex<HashMap<String, u64>>>,
}

impl SnippetFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn is_copied(&self, handle: &str) -> bool {
        self.inner.lock().await.contains_key(handle)
    }

    /// Copy raw snippet code verbatim and flash the indicator for the handle.
    pub async fn copy_snippet(
        &self,
        sink: &mut dyn ClipboardSink,
        code: &str,
        handle: &str,
    ) -> Result<()> {
        sink.set_text(code)?;

        let epoch = {
            let mut flags = self.inner.lock().await;
            let entry = flags.entry(handle.to_string()).or_insert(0);
            *entry += 1;
            *entry
        };

        let inner = Arc::clone(&self.inner);
        let handle = handle.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(COPIED_RESET_MS)).await;
            let mut flags = inner.lock().await;
            if flags.get(&handle) == Some(&epoch) {
                flags.remove(&handle);
            }
        });

        Ok(())
    }
}

#[cfg(test)]
pub(crate) struct RecordingClipboard {
    pub copied: Vec<String>,
}

#[cfg(test)]
impl RecordingClipboard {
    pub fn new() -> Self {
        Self { copied: Vec::new() }
    }
}

#[cfg(test)]
impl ClipboardSink for RecordingClipboard {
    fn set_text(&mut self, text: &str) -> Result<()> {
        self.copied.push(text.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;
    use tokio::time::advance;

    #[test]
    fn copy_text_prefers_sanitized_content_and_strips_tags() {
        let message = Message::assistant("**bold** line\nplain line");
        let text = message_copy_text(&message);
        assert_eq!(text, "bold line\nplain line");
    }

    #[test]
    fn copy_text_falls_back_to_raw_content() {
        let message = Message::user("just typed text");
        assert_eq!(message_copy_text(&message), "just typed text");
    }

    #[test]
    fn copy_icon_token_never_reaches_the_payload() {
        let message = Message::assistant("```\nlet x = 1;\n```");
        let text = message_copy_text(&message);
        assert!(!text.contains(COPY_ICON_TOKEN));
        assert!(text.contains("let x = 1;"));
    }

    #[test]
    fn long_whitespace_runs_collapse_to_triple_newline() {
        let message = Message::user(format!("a{}b", " ".repeat(12)));
        assert_eq!(message_copy_text(&message), "a\n\n\nb");
    }

    #[test]
    fn short_whitespace_runs_are_untouched() {
        let message = Message::user("a    b");
        assert_eq!(message_copy_text(&message), "a    b");
    }

    #[tokio::test(start_paused = true)]
    async fn snippet_indicator_resets_after_the_configured_interval() {
        let flags = SnippetFlags::new();
        let mut sink = RecordingClipboard::new();

        flags.copy_snippet(&mut sink, "let x = 1;", "snippet-0").await.unwrap();
        assert_eq!(sink.copied, vec!["let x = 1;".to_string()]);
        assert!(flags.is_copied("snippet-0").await);

        // The reset task must register its sleep before the clock moves.
        tokio::task::yield_now().await;
        advance(Duration::from_millis(COPIED_RESET_MS + 10)).await;
        tokio::task::yield_now().await;
        assert!(!flags.is_copied("snippet-0").await);
    }

    #[tokio::test(start_paused = true)]
    async fn snippet_timers_are_independent_per_handle() {
        let flags = SnippetFlags::new();
        let mut sink = RecordingClipboard::new();

        flags.copy_snippet(&mut sink, "a", "first").await.unwrap();
        tokio::task::yield_now().await;
        advance(Duration::from_millis(600)).await;
        flags.copy_snippet(&mut sink, "b", "second").await.unwrap();
        tokio::task::yield_now().await;

        advance(Duration::from_millis(500)).await;
        tokio::task::yield_now().await;
        assert!(!flags.is_copied("first").await);
        assert!(flags.is_copied("second").await);
    }

    #[tokio::test(start_paused = true)]
    async fn recopying_restarts_the_reset_timer() {
        let flags = SnippetFlags::new();
        let mut sink = RecordingClipboard::new();

        flags.copy_snippet(&mut sink, "a", "only").await.unwrap();
        tokio::task::yield_now().await;
        advance(Duration::from_millis(800)).await;
        flags.copy_snippet(&mut sink, "a", "only").await.unwrap();
        tokio::task::yield_now().await;

        advance(Duration::from_millis(400)).await;
        tokio::task::yield_now().await;
        assert!(flags.is_copied("only").await);

        advance(Duration::from_millis(700)).await;
        tokio::task::yield_now().await;
        assert!(!flags.is_copied("only").await);
    }
}
