//! LLM provider implementations
//!
//! Concrete [`TextGenerator`](crate::TextGenerator) implementations for
//! hosted model APIs, plus the error constructors and header parsing they
//! share.

pub mod gemini;
pub mod openai;
mod pacer;

use crate::{RetryingGenerator, TextGenerator};
use askdb_core::{
    AskError, AskResult, ConfigError, LlmError, ProviderConfig, ProviderKind, RetryConfig,
};
use std::sync::Arc;
use std::time::Duration;

pub use gemini::{GeminiClient, GeminiGenerator};
pub use openai::{OpenAIClient, OpenAIGenerator};
pub(crate) use pacer::RequestPacer;

pub(crate) fn request_failed(provider: &str, status: i32, message: impl Into<String>) -> AskError {
    LlmError::RequestFailed {
        provider: provider.to_string(),
        status,
        message: message.into(),
    }
    .into()
}

pub(crate) fn rate_limited(provider: &str, retry_after_ms: i64) -> AskError {
    LlmError::RateLimited {
        provider: provider.to_string(),
        retry_after_ms,
    }
    .into()
}

pub(crate) fn invalid_response(provider: &str, reason: impl Into<String>) -> AskError {
    LlmError::InvalidResponse {
        provider: provider.to_string(),
        reason: reason.into(),
    }
    .into()
}

/// Map a transport failure. Client-side timeouts stay retryable.
pub(crate) fn transport_failed(provider: &str, error: reqwest::Error) -> AskError {
    if error.is_timeout() {
        LlmError::Timeout {
            provider: provider.to_string(),
            elapsed_ms: 0,
        }
        .into()
    } else {
        request_failed(provider, 0, format!("HTTP request failed: {}", error))
    }
}

/// `Retry-After` in seconds (fractional allowed), as milliseconds.
pub(crate) fn parse_retry_after_ms(headers: &reqwest::header::HeaderMap) -> Option<i64> {
    headers
        .get("retry-after")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|seconds| seconds.is_finite() && *seconds >= 0.0)
        .map(|seconds| (seconds * 1000.0) as i64)
}

/// Build the configured provider wrapped in the retry policy.
pub fn build_generator(
    config: &ProviderConfig,
    retry: RetryConfig,
    call_timeout: Duration,
) -> AskResult<Arc<dyn TextGenerator>> {
    config.validate()?;
    let api_key = config.api_key.clone().ok_or_else(|| ConfigError::MissingRequired {
        field: "ASKDB_LLM_API_KEY".to_string(),
    })?;

    let generator: Arc<dyn TextGenerator> = match config.kind {
        ProviderKind::OpenAi => {
            let mut client = OpenAIClient::new(api_key, config.requests_per_minute);
            if let Some(endpoint) = &config.endpoint {
                client = client.with_base_url(endpoint);
            }
            Arc::new(RetryingGenerator::new(
                OpenAIGenerator::new(client, &config.model),
                retry,
                call_timeout,
            ))
        }
        ProviderKind::Gemini => {
            let mut client = GeminiClient::new(api_key, config.requests_per_minute);
            if let Some(endpoint) = &config.endpoint {
                client = client.with_base_url(endpoint);
            }
            Arc::new(RetryingGenerator::new(
                GeminiGenerator::new(client, &config.model),
                retry,
                call_timeout,
            ))
        }
    };

    Ok(generator)
}
