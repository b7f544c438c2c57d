use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::format::SanitizedHtml;

/// Who authored a message. Matches the backend's sender labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Sender {
    User,
    Chatbot,
}

/// A single message in the conversation.
///
/// `sanitized_content` is derived from `content` and is only populated for
/// assistant messages that need rich formatting; it is never authoritative.
#[derive(Debug, Clone)]
pub struct Message {
    pub id: Uuid,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub sender: Sender,
    pub sanitized_content: Option<SanitizedHtml>,
    pub copied: bool,
    /// Generation counter for the copied-indicator reset timer. A stale timer
    /// firing after a newer copy must not clear the newer indicator.
    pub copied_epoch: u64,
}

impl Message {
    pub fn new(sender: Sender, content: String, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            content,
            timestamp,
            sender,
            sanitized_content: None,
            copied: false,
            copied_epoch: 0,
        }
    }

    /// A message the user just typed.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Sender::User, content.into(), Utc::now())
    }

    /// An assistant reply, with display markup derived from the raw text.
    pub fn assistant(content: impl Into<String>) -> Self {
        let content = content.into();
        let mut message = Self::new(Sender::Chatbot, content.clone(), Utc::now());
        message.sanitized_content = Some(crate::format::format_response(&content));
        message
    }
}

/// Wire timestamp format used by the backend: `2024-01-31T12:00:00.000Z`.
const WIRE_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

pub fn format_wire_timestamp(timestamp: DateTime<Utc>) -> String {
    format!("{}Z", timestamp.format(WIRE_TIMESTAMP_FORMAT))
}

pub fn parse_wire_timestamp(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    let trimmed = raw.trim_end_matches('Z');
    let naive = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .map_err(|e| anyhow::anyhow!("invalid timestamp '{}': {}", raw, e))?;
    Ok(naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_timestamp_round_trips() {
        let parsed = parse_wire_timestamp("2024-01-31T12:30:45.123Z").unwrap();
        assert_eq!(format_wire_timestamp(parsed), "2024-01-31T12:30:45.123Z");
    }

    #[test]
    fn wire_timestamp_accepts_long_fractions() {
        let parsed = parse_wire_timestamp("2024-01-31T12:30:45.123456Z").unwrap();
        assert_eq!(format_wire_timestamp(parsed), "2024-01-31T12:30:45.123Z");
    }

    #[test]
    fn sender_serializes_to_backend_labels() {
        assert_eq!(serde_json::to_string(&Sender::User).unwrap(), "\"USER\"");
        assert_eq!(serde_json::to_string(&Sender::Chatbot).unwrap(), "\"CHATBOT\"");
    }

    #[test]
    fn assistant_message_carries_sanitized_content() {
        let message = Message::assistant("hello\nworld");
        assert!(message.sanitized_content.is_some());
        assert_eq!(message.sender, Sender::Chatbot);
        assert!(!message.copied);
    }
}
