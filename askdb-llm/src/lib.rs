//! askdb LLM - Text Generator Layer
//!
//! Provider-agnostic text generation. The pipeline only ever asks one
//! question of a model: given a prompt, return text. Everything
//! provider-specific (HTTP envelopes, rate-limit signalling, response
//! shapes) stays behind [`TextGenerator`].
//!
//! Retry is a wrapper, not a provider concern: [`RetryingGenerator`]
//! re-issues rate-limited and timed-out calls with exponential backoff.

use askdb_core::{AskResult, LlmResponse};
use async_trait::async_trait;
use std::sync::Arc;

pub mod mock;
pub mod providers;
pub mod retry;

pub use mock::MockTextGenerator;
pub use providers::{build_generator, GeminiClient, GeminiGenerator, OpenAIClient, OpenAIGenerator};
pub use retry::RetryingGenerator;

// ============================================================================
// TEXT GENERATOR TRAIT
// ============================================================================

/// A stateless "prompt in, text out" capability.
///
/// Implementations must be thread-safe (Send + Sync) and must report
/// rate limiting as [`askdb_core::LlmError::RateLimited`] so callers can
/// tell it apart from fatal failures.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Send one prompt and return the provider's raw response shape.
    async fn generate(&self, prompt: &str) -> AskResult<LlmResponse>;

    /// Identifier used in logs and error messages (e.g. "gemini").
    fn provider_id(&self) -> &str;

    /// Generate and flatten the response to a string.
    async fn generate_text(&self, prompt: &str) -> AskResult<String> {
        Ok(self.generate(prompt).await?.normalize())
    }
}

#[async_trait]
impl<T: TextGenerator + ?Sized> TextGenerator for Arc<T> {
    async fn generate(&self, prompt: &str) -> AskResult<LlmResponse> {
        (**self).generate(prompt).await
    }

    fn provider_id(&self) -> &str {
        (**self).provider_id()
    }
}

#[async_trait]
impl<T: TextGenerator + ?Sized> TextGenerator for Box<T> {
    async fn generate(&self, prompt: &str) -> AskResult<LlmResponse> {
        (**self).generate(prompt).await
    }

    fn provider_id(&self) -> &str {
        (**self).provider_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use askdb_core::{ContentPart, NO_RESPONSE_FALLBACK};

    #[tokio::test]
    async fn test_generate_text_normalizes() {
        let mock = MockTextGenerator::new();
        mock.push_response(LlmResponse::Parts(vec![ContentPart::Text("SELECT 1;".into())]));
        mock.push_response(LlmResponse::Parts(vec![]));

        assert_eq!(mock.generate_text("p").await.unwrap(), "SELECT 1;");
        assert_eq!(mock.generate_text("p").await.unwrap(), NO_RESPONSE_FALLBACK);
    }

    #[tokio::test]
    async fn test_trait_objects_delegate() {
        let shared: Arc<dyn TextGenerator> = Arc::new(MockTextGenerator::with_default("hi"));
        let boxed: Box<dyn TextGenerator> = Box::new(shared.clone());

        assert_eq!(boxed.provider_id(), "mock");
        assert_eq!(boxed.generate_text("anything").await.unwrap(), "hi");
    }
}
