//! OpenAI text generator

use super::client::OpenAIClient;
use super::types::{CompletionRequest, CompletionResponse, Message, MessageContent};
use crate::providers::invalid_response;
use crate::TextGenerator;
use askdb_core::{AskResult, ContentPart, LlmResponse};
use async_trait::async_trait;

/// Text generator backed by the Chat Completions endpoint.
pub struct OpenAIGenerator {
    client: OpenAIClient,
    model: String,
    temperature: f32,
}

impl OpenAIGenerator {
    /// # Arguments
    /// * `client` - Configured API client
    /// * `model` - Model name (e.g., "gpt-4o-mini", "gpt-4o")
    pub fn new(client: OpenAIClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            temperature: 0.0,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn request_for(&self, prompt: &str) -> CompletionRequest {
        CompletionRequest {
            model: self.model.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens: None,
            temperature: Some(self.temperature),
        }
    }
}

/// Fold the first choice into the provider-agnostic response shape.
pub(crate) fn into_llm_response(response: CompletionResponse) -> AskResult<LlmResponse> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| invalid_response("openai", "No completion in response"))?;

    Ok(match choice.message.content {
        Some(MessageContent::Text(text)) => LlmResponse::Text(text),
        Some(MessageContent::Parts(parts)) => LlmResponse::Parts(
            parts
                .into_iter()
                .map(|part| match part.get("text").and_then(|t| t.as_str()) {
                    Some(text) => ContentPart::Text(text.to_string()),
                    None => ContentPart::Other(part),
                })
                .collect(),
        ),
        None => LlmResponse::Parts(Vec::new()),
    })
}

#[async_trait]
impl TextGenerator for OpenAIGenerator {
    async fn generate(&self, prompt: &str) -> AskResult<LlmResponse> {
        let response: CompletionResponse = self
            .client
            .request("chat/completions", self.request_for(prompt))
            .await?;
        into_llm_response(response)
    }

    fn provider_id(&self) -> &str {
        "openai"
    }
}

impl std::fmt::Debug for OpenAIGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIGenerator")
            .field("model", &self.model)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use askdb_core::{AskError, LlmError, NO_RESPONSE_FALLBACK};

    fn parse(json: &str) -> AskResult<LlmResponse> {
        into_llm_response(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn test_string_content() {
        let response = parse(r#"{"choices":[{"message":{"role":"assistant","content":"SELECT 1;"},"finish_reason":"stop"}]}"#)
            .unwrap();
        assert_eq!(response.normalize(), "SELECT 1;");
    }

    #[test]
    fn test_part_list_content() {
        let response = parse(
            r#"{"choices":[{"message":{"content":[{"type":"image_url","image_url":{}},{"type":"text","text":"hello"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(response.normalize(), "hello");
    }

    #[test]
    fn test_null_content_falls_back() {
        let response = parse(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert_eq!(response.normalize(), NO_RESPONSE_FALLBACK);
    }

    #[test]
    fn test_no_choices_is_invalid() {
        assert!(matches!(
            parse(r#"{"choices":[]}"#),
            Err(AskError::Llm(LlmError::InvalidResponse { .. }))
        ));
    }

    #[test]
    fn test_request_shape() {
        let gen = OpenAIGenerator::new(OpenAIClient::new("k", 60), "gpt-4o-mini");
        let body = serde_json::to_value(gen.request_for("hi")).unwrap();
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["content"], "hi");
        assert!(body.get("max_tokens").is_none());
    }
}
