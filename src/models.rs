//! Request and response shapes produced and consumed by the adapters.
//!
//! Everything here lives for a single invocation. The wire shapes of the
//! Bedrock APIs themselves are in [`crate::bedrock`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{HrKbError, HrKbResult};

/// One chat turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }

    /// Read one raw turn leniently. A missing or non-string `role` or
    /// `content` becomes an empty string; non-object turns become empty.
    pub fn from_turn(turn: &Value) -> Self {
        let field = |key: &str| {
            turn.get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        Self {
            role: field("role"),
            content: field("content"),
        }
    }
}

/// A conversation whose final turn is a user question.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
}

impl ChatRequest {
    /// Validate a raw `{ "messages": [...] }` body.
    ///
    /// Fails with [`HrKbError::InvalidInput`] when `messages` is missing,
    /// not an array, or empty, or when its final turn is not a `user` turn
    /// with text content. Earlier turns are not inspected.
    pub fn from_value(body: &Value) -> HrKbResult<Self> {
        let raw = body
            .get("messages")
            .and_then(Value::as_array)
            .filter(|m| !m.is_empty())
            .ok_or_else(|| HrKbError::InvalidInput("messages array is required".to_string()))?;

        let request = Self {
            messages: raw.iter().map(ChatMessage::from_turn).collect(),
        };
        request.question()?;
        Ok(request)
    }

    /// The text of the final turn, provided it comes from the user.
    pub fn question(&self) -> HrKbResult<&str> {
        let last = self
            .messages
            .last()
            .ok_or_else(|| HrKbError::InvalidInput("messages array is required".to_string()))?;
        if last.role != "user" {
            return Err(HrKbError::InvalidInput(
                "last message must be from the user".to_string(),
            ));
        }
        if last.content.trim().is_empty() {
            return Err(HrKbError::InvalidInput(
                "last message must have text content".to_string(),
            ));
        }
        Ok(&last.content)
    }
}

/// Body of a successful `POST /api/chat`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatResponse {
    pub answer: String,
    /// Passed through untouched from the remote service.
    pub citations: Vec<Value>,
}

/// One retrieved chunk, ranked by its position in the remote response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankedResult {
    pub rank: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Structured output of the retrieval tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalReport {
    pub query: String,
    pub hit_count: usize,
    pub results: Vec<RankedResult>,
}

/// Job id and state reported by the remote service after starting ingestion.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IngestionJobStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingestion_job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// What the ingestion trigger hands back to its scheduler.
///
/// `body` is itself a JSON document, encoded as a string.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TriggerResponse {
    pub status_code: u16,
    pub body: String,
}

impl TriggerResponse {
    /// Decode `body` back into JSON.
    pub fn body_json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}
