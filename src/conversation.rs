//! Conversation controller: accepts user input, drives backend calls, and
//! feeds results into history, suggestions, and the outcome badge.
//!
//! The controller is the single owner of conversation state. Async work is
//! spawned rather than awaited inline; each response re-locks the controller
//! and applies its result atomically.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::time::Duration;
use uuid::Uuid;

use crate::api::{Backend, KnowledgeSource, WireMessage};
use crate::clipboard::{COPIED_RESET_MS, ClipboardSink, SnippetFlags, message_copy_text};
use crate::config::Config;
use crate::history::{ERROR_CLEAR_MS, HistoryLoader, ScrollAnchor, ScrollIntent};
use crate::message::Message;
use crate::outcome::OutcomeBadge;
use crate::suggestions::{FetchTicket, SuggestionController, SuggestionTrigger};

/// Synthetic assistant reply shown (and persisted) when a send fails.
pub const SEND_ERROR_TEXT: &str = "There was an error!";

pub struct ConversationController {
    backend: Arc<dyn Backend>,
    clipboard: Box<dyn ClipboardSink>,
    pub history: HistoryLoader,
    pub suggestions: SuggestionController,
    snippet_flags: SnippetFlags,
    badge: OutcomeBadge,
    is_loading: bool,
    last_user_question: String,
    last_assistant_answer: String,
    last_message_at: Option<DateTime<Utc>>,
    /// Last scroll position reported by the view, read at merge time so a
    /// prepend can keep the on-screen message stationary.
    viewport_anchor: ScrollAnchor,
    pending_scroll: Option<ScrollIntent>,
    page_size: usize,
    trigger: SuggestionTrigger,
    initial_suggestions: Vec<String>,
}

impl ConversationController {
    pub fn new(backend: Arc<dyn Backend>, clipboard: Box<dyn ClipboardSink>, config: &Config) -> Self {
        Self {
            backend,
            clipboard,
            history: HistoryLoader::new(),
            suggestions: SuggestionController::new(config.suggestion_quantity),
            snippet_flags: SnippetFlags::new(),
            badge: OutcomeBadge::new(),
            is_loading: false,
            last_user_question: String::new(),
            last_assistant_answer: String::new(),
            last_message_at: None,
            viewport_anchor: ScrollAnchor::default(),
            pending_scroll: None,
            page_size: config.page_size,
            trigger: config.suggestion_trigger,
            initial_suggestions: config.initial_suggestions.clone(),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn badge(&self) -> &OutcomeBadge {
        &self.badge
    }

    pub fn snippet_flags(&self) -> SnippetFlags {
        self.snippet_flags.clone()
    }

    pub fn last_message_at(&self) -> Option<DateTime<Utc>> {
        self.last_message_at
    }

    /// Called by the view on every frame so merges see a fresh anchor.
    pub fn set_viewport_anchor(&mut self, anchor: ScrollAnchor) {
        self.viewport_anchor = anchor;
    }

    /// Scroll adjustment requested by the latest state change, if any.
    pub fn take_scroll_intent(&mut self) -> Option<ScrollIntent> {
        self.pending_scroll.take()
    }

    /// Send user text to the assistant.
    ///
    /// The user message is appended synchronously before the backend call is
    /// issued; the reply (or a synthetic error message) is applied when the
    /// spawned request resolves. Blank input is silently ignored.
    pub async fn send_message(this: &Arc<Mutex<Self>>, text: &str) {
        let text = text.trim().to_string();
        if text.is_empty() {
            return;
        }

        let backend = {
            let mut guard = this.lock().await;
            if guard.is_loading {
                return;
            }
            let message = Message::user(text.clone());
            guard.last_message_at = Some(message.timestamp);
            guard.last_user_question = text.clone();
            Self::persist(guard.backend.clone(), WireMessage::from_message(&message));
            guard.history.append(message);
            guard.pending_scroll = Some(ScrollIntent::Bottom);
            guard.is_loading = true;
            guard.suggestions.set_hidden(true);
            guard.backend.clone()
        };

        let this = Arc::clone(this);
        tokio::spawn(async move {
            let result = backend.send_message(&text).await;
            let mut guard = this.lock().await;

            let reply = match result {
                Ok(response) => {
                    guard.last_assistant_answer = response.clone();
                    Message::assistant(response)
                }
                Err(e) => {
                    tracing::warn!("send_message failed: {e}");
                    Message::assistant(SEND_ERROR_TEXT)
                }
            };
            Self::persist(guard.backend.clone(), WireMessage::from_message(&reply));
            guard.last_message_at = Some(reply.timestamp);
            guard.history.append(reply);
            guard.pending_scroll = Some(ScrollIntent::Bottom);
            guard.is_loading = false;
            guard.suggestions.set_hidden(false);

            if guard.trigger == SuggestionTrigger::Context {
                let question = guard.last_user_question.clone();
                let answer = guard.last_assistant_answer.clone();
                if let Some(ticket) = guard.suggestions.set_context(&question, &answer) {
                    let backend = guard.backend.clone();
                    drop(guard);
                    tokio::spawn(Self::fetch_suggestions(this.clone(), backend, ticket));
                }
            }
        });
    }

    /// A clicked suggestion goes through the normal send path, verbatim.
    pub async fn on_suggestion_click(this: &Arc<Mutex<Self>>, text: &str) {
        Self::send_message(this, text).await;
    }

    /// Cold-load the newest history page, replacing whatever is in memory.
    pub async fn load_initial(this: &Arc<Mutex<Self>>) {
        let (backend, page_size) = {
            let guard = this.lock().await;
            (guard.backend.clone(), guard.page_size)
        };

        let result = backend.get_messages(page_size, None).await;
        let handle = Arc::clone(this);
        let mut guard = this.lock().await;
        match result {
            Ok(batch) => {
                let anchor = guard.viewport_anchor;
                let intent = guard.history.apply_page(1, batch, anchor);
                guard.pending_scroll = Some(intent);
                guard.after_initial_load(&handle);
            }
            Err(e) => {
                tracing::warn!("initial history load failed: {e}");
                guard.history.apply_page_failure(1);
            }
        }
    }

    /// Restore suggestion context from the loaded history and run the
    /// configured startup trigger.
    fn after_initial_load(&mut self, this: &Arc<Mutex<Self>>) {
        let (question, answer) = {
            let (q, a) = self.history.last_exchange();
            (
                q.map(|m| m.content.clone()).unwrap_or_default(),
                a.map(|m| m.content.clone()).unwrap_or_default(),
            )
        };
        self.last_user_question = question.clone();
        self.last_assistant_answer = answer.clone();
        self.last_message_at = self.history.last_message_timestamp();

        let ticket = match self.trigger {
            SuggestionTrigger::Context => self.suggestions.set_context(&question, &answer),
            SuggestionTrigger::Recency => {
                self.suggestions.seed_context(&question, &answer);
                let initial = self.initial_suggestions.clone();
                self.suggestions
                    .decide_on_startup(self.last_message_at, Utc::now(), &initial)
            }
        };
        if let Some(ticket) = ticket {
            tokio::spawn(Self::fetch_suggestions(this.clone(), self.backend.clone(), ticket));
        }
    }

    /// Issue a ticketed suggestion fetch and apply the result under the
    /// stale-epoch guard.
    async fn fetch_suggestions(this: Arc<Mutex<Self>>, backend: Arc<dyn Backend>, ticket: FetchTicket) {
        let result = backend
            .next_possible_questions(&ticket.question, &ticket.answer, ticket.quantity)
            .await;
        this.lock().await.suggestions.apply_result(ticket.epoch, result);
    }

    /// Fetch the next older page. A no-op while any fetch or send is already
    /// in flight, or once all older history has been loaded.
    pub async fn load_more_older(this: &Arc<Mutex<Self>>) {
        let (backend, page_size, page) = {
            let mut guard = this.lock().await;
            let send_pending = guard.is_loading;
            let Some(page) = guard.history.begin_load_older(send_pending) else {
                return;
            };
            (guard.backend.clone(), guard.page_size, page)
        };

        let this = Arc::clone(this);
        tokio::spawn(async move {
            let result = backend.get_messages(page_size, Some(page)).await;
            let mut guard = this.lock().await;
            match result {
                Ok(batch) => {
                    let anchor = guard.viewport_anchor;
                    let intent = guard.history.apply_page(page, batch, anchor);
                    guard.pending_scroll = Some(intent);
                }
                Err(e) => {
                    tracing::warn!("older history load failed (page {page}): {e}");
                    if let Some(epoch) = guard.history.apply_page_failure(page) {
                        drop(guard);
                        let this = this.clone();
                        tokio::spawn(async move {
                            tokio::time::sleep(Duration::from_millis(ERROR_CLEAR_MS)).await;
                            this.lock().await.history.clear_error_if_current(epoch);
                        });
                    }
                }
            }
        });
    }

    /// Re-index one knowledge source and surface the outcome as an assistant
    /// message, then refresh the status badge.
    pub async fn refresh_source(this: &Arc<Mutex<Self>>, source: KnowledgeSource) {
        let backend = {
            let mut guard = this.lock().await;
            if guard.is_loading {
                return;
            }
            guard.is_loading = true;
            guard.backend.clone()
        };

        let result = backend.refresh_source(source).await;
        let outcome = backend.last_load_outcome().await;

        let mut guard = this.lock().await;
        let content = match result {
            Ok(response) => format!("{}: {}", source.display_name(), response),
            Err(e) => {
                tracing::warn!("refresh of {source} failed: {e}");
                format!("Error refreshing {}!", source.display_name())
            }
        };
        guard.history.append(Message::assistant(content));
        guard.pending_scroll = Some(ScrollIntent::Bottom);
        guard.is_loading = false;
        guard.badge.publish(outcome);
    }

    /// Refresh the status badge from the backend's last-load outcome.
    pub async fn check_last_load_outcome(this: &Arc<Mutex<Self>>) {
        let backend = this.lock().await.backend.clone();
        let outcome = backend.last_load_outcome().await;
        this.lock().await.badge.publish(outcome);
    }

    /// Copy a message's visible text and flash its copied indicator for one
    /// second. Timers on different messages are independent.
    pub async fn copy_message(this: &Arc<Mutex<Self>>, id: Uuid) -> anyhow::Result<()> {
        let epoch = {
            let mut guard = this.lock().await;
            let (payload, epoch) = {
                let Some(message) = guard.history.message_mut(id) else {
                    return Ok(());
                };
                let payload = message_copy_text(message);
                message.copied = true;
                message.copied_epoch += 1;
                (payload, message.copied_epoch)
            };
            guard.clipboard.set_text(&payload)?;
            epoch
        };

        let this = Arc::clone(this);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(COPIED_RESET_MS)).await;
            let mut guard = this.lock().await;
            if let Some(message) = guard.history.message_mut(id) {
                if message.copied_epoch == epoch {
                    message.copied = false;
                }
            }
        });
        Ok(())
    }

    /// Copy raw snippet code verbatim, flashing the snippet's affordance.
    pub async fn copy_snippet(this: &Arc<Mutex<Self>>, code: &str, handle: &str) -> anyhow::Result<()> {
        let mut guard = this.lock().await;
        let flags = guard.snippet_flags.clone();
        flags.copy_snippet(guard.clipboard.as_mut(), code, handle).await
    }

    /// Fire-and-forget persistence; failures are logged, never surfaced.
    fn persist(backend: Arc<dyn Backend>, message: WireMessage) {
        tokio::spawn(async move {
            match backend.save_message(&message).await {
                Ok(outcome) if !outcome.success => {
                    tracing::warn!("save_message rejected: {}", outcome.message);
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("save_message failed: {e}"),
            }
        });
    }
}
