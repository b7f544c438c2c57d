//! Logical backend contract and its HTTP implementation.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::Duration;

use crate::config::Config;
use crate::message::{Message, Sender, format_wire_timestamp, parse_wire_timestamp};

/// Tri-state result of the most recent background data refresh.
///
/// The backend reports `"True"` or `"False"`; anything else, including a
/// transport failure, is an error. Collapsing `Failed` into `Error` would
/// lose information the status badge depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum LoadOutcome {
    Success,
    Failed,
    Error,
}

impl LoadOutcome {
    pub fn from_wire(raw: &str) -> Self {
        match raw.trim().trim_matches('"') {
            "True" => LoadOutcome::Success,
            "False" => LoadOutcome::Failed,
            _ => LoadOutcome::Error,
        }
    }
}

/// External data source the backend can re-index on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, clap::ValueEnum)]
#[strum(serialize_all = "lowercase")]
pub enum KnowledgeSource {
    Jira,
    Github,
    Confluence,
}

impl KnowledgeSource {
    pub fn display_name(&self) -> &'static str {
        match self {
            KnowledgeSource::Jira => "Jira",
            KnowledgeSource::Github => "GitHub",
            KnowledgeSource::Confluence => "Confluence",
        }
    }
}

/// Message as it travels over the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMessage {
    pub content: String,
    pub sender: Sender,
    pub timestamp: String,
}

impl WireMessage {
    pub fn from_message(message: &Message) -> Self {
        Self {
            content: message.content.clone(),
            sender: message.sender,
            timestamp: format_wire_timestamp(message.timestamp),
        }
    }

    /// Convert to the in-memory model. Assistant messages get their display
    /// markup recomputed here; it is never read off the wire.
    pub fn into_message(self) -> Result<Message> {
        let timestamp = parse_wire_timestamp(&self.timestamp)?;
        let mut message = Message::new(self.sender, self.content, timestamp);
        if message.sender == Sender::Chatbot {
            message.sanitized_content = Some(crate::format::format_response(&message.content));
        }
        Ok(message)
    }
}

#[derive(Debug, Deserialize)]
pub struct SaveOutcome {
    pub success: bool,
    pub message: String,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    message: &'a str,
}

#[derive(Deserialize)]
struct SendResponse {
    response: String,
}

#[derive(Serialize)]
struct GetMessagesRequest {
    quantity: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    page: Option<u32>,
}

#[derive(Serialize)]
struct SuggestionsRequest<'a> {
    question: &'a str,
    answer: &'a str,
    quantity: usize,
}

/// The backend operations the client consumes. Implemented over HTTP in the
/// app and by in-memory fakes in tests.
#[async_trait]
pub trait Backend: Send + Sync {
    /// POST /api/chat
    async fn send_message(&self, message: &str) -> Result<String>;

    /// POST /api/get_messages
    async fn get_messages(&self, quantity: usize, page: Option<u32>) -> Result<Vec<WireMessage>>;

    /// POST /api/save_message
    async fn save_message(&self, message: &WireMessage) -> Result<SaveOutcome>;

    /// POST /api/get_next_possible_questions. Values are returned in the
    /// order the backend produced them.
    async fn next_possible_questions(
        &self,
        question: &str,
        answer: &str,
        quantity: usize,
    ) -> Result<Vec<String>>;

    /// POST /api/get_last_load_outcome. Transport failures fold into
    /// `LoadOutcome::Error` rather than surfacing as errors.
    async fn last_load_outcome(&self) -> LoadOutcome;

    /// POST /api/load_{source}
    async fn refresh_source(&self, source: KnowledgeSource) -> Result<String>;
}

/// HTTP backend client.
#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.backend_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn send_message(&self, message: &str) -> Result<String> {
        let response = self
            .client
            .post(self.url("/api/chat"))
            .json(&SendRequest { message })
            .send()
            .await
            .context("send_message request failed")?
            .error_for_status()
            .context("send_message returned an error status")?;

        let body: SendResponse = response
            .json()
            .await
            .context("send_message response was not valid JSON")?;
        Ok(body.response)
    }

    async fn get_messages(&self, quantity: usize, page: Option<u32>) -> Result<Vec<WireMessage>> {
        let response = self
            .client
            .post(self.url("/api/get_messages"))
            .json(&GetMessagesRequest { quantity, page })
            .send()
            .await
            .context("get_messages request failed")?
            .error_for_status()
            .context("get_messages returned an error status")?;

        response
            .json()
            .await
            .context("get_messages response was not valid JSON")
    }

    async fn save_message(&self, message: &WireMessage) -> Result<SaveOutcome> {
        let response = self
            .client
            .post(self.url("/api/save_message"))
            .json(message)
            .send()
            .await
            .context("save_message request failed")?
            .error_for_status()
            .context("save_message returned an error status")?;

        response
            .json()
            .await
            .context("save_message response was not valid JSON")
    }

    async fn next_possible_questions(
        &self,
        question: &str,
        answer: &str,
        quantity: usize,
    ) -> Result<Vec<String>> {
        let response = self
            .client
            .post(self.url("/api/get_next_possible_questions"))
            .json(&SuggestionsRequest { question, answer, quantity })
            .send()
            .await
            .context("suggestion request failed")?
            .error_for_status()
            .context("suggestion request returned an error status")?;

        // The response is a map of label -> question text; only the values
        // matter, in the order the backend returned them.
        let body: serde_json::Map<String, serde_json::Value> = response
            .json()
            .await
            .context("suggestion response was not valid JSON")?;
        Ok(body
            .values()
            .filter_map(|value| value.as_str().map(str::to_string))
            .collect())
    }

    async fn last_load_outcome(&self) -> LoadOutcome {
        let result = async {
            let response = self
                .client
                .post(self.url("/api/get_last_load_outcome"))
                .json(&serde_json::json!({}))
                .send()
                .await?
                .error_for_status()?;
            response.text().await
        }
        .await;

        match result {
            Ok(raw) => LoadOutcome::from_wire(&raw),
            Err(e) => {
                tracing::warn!("last_load_outcome request failed: {e}");
                LoadOutcome::Error
            }
        }
    }

    async fn refresh_source(&self, source: KnowledgeSource) -> Result<String> {
        let response = self
            .client
            .post(self.url(&format!("/api/load_{source}")))
            .json(&serde_json::json!({}))
            .send()
            .await
            .with_context(|| format!("refresh of {source} failed"))?
            .error_for_status()
            .with_context(|| format!("refresh of {source} returned an error status"))?;

        let body: SendResponse = response
            .json()
            .await
            .context("refresh response was not valid JSON")?;
        Ok(body.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_outcome_mapping_is_three_valued() {
        assert_eq!(LoadOutcome::from_wire("True"), LoadOutcome::Success);
        assert_eq!(LoadOutcome::from_wire("False"), LoadOutcome::Failed);
        assert_eq!(LoadOutcome::from_wire("weird"), LoadOutcome::Error);
        assert_eq!(LoadOutcome::from_wire(""), LoadOutcome::Error);
    }

    #[test]
    fn load_outcome_tolerates_quoted_bodies() {
        assert_eq!(LoadOutcome::from_wire("\"True\""), LoadOutcome::Success);
        assert_eq!(LoadOutcome::from_wire("\"False\"\n"), LoadOutcome::Failed);
    }

    #[test]
    fn knowledge_source_paths_are_lowercase() {
        assert_eq!(KnowledgeSource::Jira.to_string(), "jira");
        assert_eq!(KnowledgeSource::Github.to_string(), "github");
        assert_eq!(KnowledgeSource::Confluence.to_string(), "confluence");
    }

    #[test]
    fn wire_message_round_trips_through_the_model() {
        let wire = WireMessage {
            content: "**hi**".to_string(),
            sender: Sender::Chatbot,
            timestamp: "2024-01-31T12:00:00.000Z".to_string(),
        };
        let message = wire.into_message().unwrap();
        assert!(message.sanitized_content.is_some());

        let back = WireMessage::from_message(&message);
        assert_eq!(back.content, "**hi**");
        assert_eq!(back.timestamp, "2024-01-31T12:00:00.000Z");
    }

    #[test]
    fn user_wire_messages_get_no_markup() {
        let wire = WireMessage {
            content: "**hi**".to_string(),
            sender: Sender::User,
            timestamp: "2024-01-31T12:00:00.000Z".to_string(),
        };
        let message = wire.into_message().unwrap();
        assert!(message.sanitized_content.is_none());
    }
}
