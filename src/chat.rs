//! Chat adapter: a conversation in, a grounded answer with citations out.
//!
//! Only the final user turn is sent to the knowledge service; earlier
//! turns are validated but otherwise ignored.

use serde_json::Value;

use crate::bedrock::RetrieveAndGenerateRequest;
use crate::config::Config;
use crate::error::{HrKbError, HrKbResult};
use crate::models::{ChatRequest, ChatResponse};
use crate::traits::KnowledgeService;

/// Answer text used when the service returns no generated output.
pub const NO_ANSWER: &str = "(No answer returned)";

/// Message used when a remote failure carries no message of its own.
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// Validate a raw request body and answer it.
pub async fn handle_chat(
    service: &dyn KnowledgeService,
    config: &Config,
    body: &Value,
) -> HrKbResult<ChatResponse> {
    let request = ChatRequest::from_value(body)?;
    answer_chat(service, config, &request).await
}

/// Send the last user turn to retrieve-and-generate and shape the reply.
///
/// # Errors
///
/// - [`HrKbError::InvalidInput`] if the conversation does not end with a
///   user turn carrying text. The service is not called.
/// - [`HrKbError::Config`] if no knowledge-base id is configured.
/// - [`HrKbError::Remote`] if the service call fails. An empty message
///   is replaced by [`UNKNOWN_ERROR`].
pub async fn answer_chat(
    service: &dyn KnowledgeService,
    config: &Config,
    request: &ChatRequest,
) -> HrKbResult<ChatResponse> {
    let question = request.question()?;
    let knowledge_base_id = config.require_knowledge_base_id()?;

    let response = service
        .retrieve_and_generate(RetrieveAndGenerateRequest::knowledge_base(
            question,
            knowledge_base_id,
            &config.chat.model_arn,
        ))
        .await
        .map_err(|e| match e {
            HrKbError::Remote(msg) if msg.trim().is_empty() => {
                HrKbError::Remote(UNKNOWN_ERROR.to_string())
            }
            other => other,
        })?;

    let answer = response
        .output
        .and_then(|o| o.text)
        .unwrap_or_else(|| NO_ANSWER.to_string());

    Ok(ChatResponse {
        answer,
        citations: response.citations.unwrap_or_default(),
    })
}
