//! Terminal chat client: conversation state, response formatting, paginated
//! history, follow-up suggestions, and clipboard copy against an HTTP backend.

pub mod api;
pub mod clipboard;
pub mod config;
pub mod conversation;
pub mod format;
pub mod history;
pub mod message;
pub mod outcome;
pub mod suggestions;
pub mod ui;

pub use api::{Backend, HttpBackend, KnowledgeSource, LoadOutcome};
pub use conversation::ConversationController;
pub use message::{Message, Sender};
