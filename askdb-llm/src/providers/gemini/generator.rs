//! Gemini text generator

use super::client::GeminiClient;
use super::types::{Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, RequestPart};
use crate::providers::invalid_response;
use crate::TextGenerator;
use askdb_core::{AskResult, ContentPart, LlmResponse};
use async_trait::async_trait;

pub struct GeminiGenerator {
    client: GeminiClient,
    model: String,
    temperature: f32,
}

impl GeminiGenerator {
    /// # Arguments
    /// * `client` - Configured API client
    /// * `model` - Model name (e.g., "gemini-2.0-flash")
    pub fn new(client: GeminiClient, model: impl Into<String>) -> Self {
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

    fn request_for(&self, prompt: &str) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![RequestPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: Some(GenerationConfig {
                temperature: self.temperature,
            }),
        }
    }
}

/// First candidate's parts; text parts become [`ContentPart::Text`].
pub(crate) fn into_llm_response(response: GenerateContentResponse) -> AskResult<LlmResponse> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| invalid_response("gemini", "No candidates in response"))?;

    let parts = candidate
        .content
        .map(|c| c.parts)
        .unwrap_or_default()
        .into_iter()
        .map(|part| match part.get("text").and_then(|t| t.as_str()) {
            Some(text) => ContentPart::Text(text.to_string()),
            None => ContentPart::Other(part),
        })
        .collect();

    Ok(LlmResponse::Parts(parts))
}

#[async_trait]
impl TextGenerator for GeminiGenerator {
    async fn generate(&self, prompt: &str) -> AskResult<LlmResponse> {
        let response: GenerateContentResponse = self
            .client
            .call(&self.model, "generateContent", self.request_for(prompt))
            .await?;
        into_llm_response(response)
    }

    fn provider_id(&self) -> &str {
        "gemini"
    }
}

impl std::fmt::Debug for GeminiGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiGenerator")
            .field("model", &self.model)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use askdb_core::NO_RESPONSE_FALLBACK;

    fn parse(json: &str) -> AskResult<LlmResponse> {
        into_llm_response(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn test_text_part() {
        let response = parse(
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"SELECT COUNT(*) FROM contacts;"}]},"finishReason":"STOP"}]}"#,
        )
        .unwrap();
        assert_eq!(response.normalize(), "SELECT COUNT(*) FROM contacts;");
    }

    #[test]
    fn test_function_call_part_is_kept_raw() {
        let response = parse(
            r#"{"candidates":[{"content":{"parts":[{"functionCall":{"name":"f","args":{}}}]}}]}"#,
        )
        .unwrap();
        assert!(response.normalize().contains("functionCall"));
    }

    #[test]
    fn test_blocked_candidate_without_content() {
        let response = parse(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#).unwrap();
        assert_eq!(response.normalize(), NO_RESPONSE_FALLBACK);
    }

    #[test]
    fn test_no_candidates_is_invalid() {
        assert!(parse(r#"{"promptFeedback":{"blockReason":"OTHER"}}"#).is_err());
    }

    #[test]
    fn test_request_shape() {
        let gen = GeminiGenerator::new(GeminiClient::new("k", 60), "gemini-2.0-flash");
        let body = serde_json::to_value(gen.request_for("hi")).unwrap();
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(body["generationConfig"]["temperature"], 0.0);
    }
}
