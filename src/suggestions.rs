//! Follow-up question suggestions.
//!
//! Two trigger models are supported, selected by configuration: context
//! triggered (fetch whenever the latest question/answer pair changes) and
//! recency triggered (decide once at startup from how fresh the conversation
//! is).

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};

pub const SUGGESTION_LOAD_ERROR: &str = "Could not load follow-up suggestions.";

/// Conversations idle longer than this get the initial suggestions instead
/// of continuation ones.
pub const RECENCY_THRESHOLD_MINUTES: i64 = 5;

/// Which event prompts a suggestion fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionTrigger {
    /// Fetch on every change to the question/answer pair.
    #[default]
    Context,
    /// Decide once at startup from the last message's age.
    Recency,
}

/// Holds the current suggestion list and the context that produced it.
pub struct SuggestionController {
    question: String,
    answer: String,
    hidden: bool,
    quantity: usize,
    suggestions: Vec<String>,
    load_error: bool,
    error_message: Option<String>,
    /// Bumped whenever the context changes or suggestions are suppressed, so
    /// responses to superseded requests are discarded rather than applied.
    epoch: u64,
}

impl SuggestionController {
    pub fn new(quantity: usize) -> Self {
        Self {
            question: String::new(),
            answer: String::new(),
            hidden: false,
            quantity,
            suggestions: Vec::new(),
            load_error: false,
            error_message: None,
            epoch: 0,
        }
    }

    pub fn suggestions(&self) -> &[String] {
        &self.suggestions
    }

    pub fn load_error(&self) -> bool {
        self.load_error
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    fn can_load(&self) -> bool {
        !self.question.trim().is_empty() && !self.answer.trim().is_empty()
    }

    /// Record a new question/answer pair. Returns a fetch ticket when a
    /// continuation request should go out.
    pub fn set_context(&mut self, question: &str, answer: &str) -> Option<FetchTicket> {
        if question == self.question && answer == self.answer {
            return None;
        }
        self.question = question.to_string();
        self.answer = answer.to_string();
        self.epoch += 1;

        if self.can_load() && !self.hidden {
            Some(FetchTicket {
                epoch: self.epoch,
                question: self.question.clone(),
                answer: self.answer.clone(),
                quantity: self.quantity,
            })
        } else {
            None
        }
    }

    /// Record a question/answer pair without prompting a fetch. Used when
    /// restoring context from a cold history load under the recency trigger.
    pub fn seed_context(&mut self, question: &str, answer: &str) {
        self.question = question.to_string();
        self.answer = answer.to_string();
    }

    /// Suppress or unsuppress suggestions. Suppression clears the list
    /// immediately; it never waits on an in-flight request.
    pub fn set_hidden(&mut self, hidden: bool) {
        self.hidden = hidden;
        if hidden {
            self.suggestions.clear();
            self.load_error = false;
            self.error_message = None;
            self.epoch += 1;
        }
    }

    /// Apply a fetch result, unless the ticket went stale in the meantime.
    pub fn apply_result(&mut self, epoch: u64, result: anyhow::Result<Vec<String>>) {
        if epoch != self.epoch || self.hidden {
            return;
        }
        match result {
            Ok(values) => {
                self.suggestions = values;
                self.load_error = false;
                self.error_message = None;
            }
            Err(e) => {
                tracing::warn!("suggestion fetch failed: {e}");
                self.load_error = true;
                self.error_message = Some(SUGGESTION_LOAD_ERROR.to_string());
            }
        }
    }

    /// Replace the list outright with the fixed initial suggestions.
    pub fn show_initial(&mut self, initial: &[String]) {
        self.epoch += 1;
        self.suggestions = initial.to_vec();
        self.load_error = false;
        self.error_message = None;
    }

    /// Recency-triggered startup decision: stale conversations get the
    /// initial suggestions without a request, fresh ones a continuation
    /// fetch ticket.
    pub fn decide_on_startup(
        &mut self,
        last_message_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        initial: &[String],
    ) -> Option<FetchTicket> {
        let threshold = ChronoDuration::minutes(RECENCY_THRESHOLD_MINUTES);
        let stale = last_message_at.is_none_or(|at| now - at > threshold);
        if stale {
            self.show_initial(initial);
            None
        } else {
            self.epoch += 1;
            Some(FetchTicket {
                epoch: self.epoch,
                question: self.question.clone(),
                answer: self.answer.clone(),
                quantity: self.quantity,
            })
        }
    }
}

/// A pending continuation-suggestion fetch, valid only while its epoch is
/// still current.
#[derive(Debug, Clone)]
pub struct FetchTicket {
    pub epoch: u64,
    pub question: String,
    pub answer: String,
    pub quantity: usize,
}
