//! Gemini HTTP client

use super::types::ApiError;
use crate::providers::{
    invalid_response, parse_retry_after_ms, rate_limited, request_failed, transport_failed,
    RequestPacer,
};
use askdb_core::AskResult;
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

const PROVIDER: &str = "gemini";

/// Generative Language API client. The key travels in a header, never the URL.
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    pacer: RequestPacer,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, requests_per_minute: u32) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            pacer: RequestPacer::new(requests_per_minute),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST `{base_url}/models/{model}:{method}`.
    pub async fn call<Req: Serialize, Res: DeserializeOwned>(
        &self,
        model: &str,
        method: &str,
        body: Req,
    ) -> AskResult<Res> {
        let _permit = self
            .pacer
            .acquire()
            .await
            .map_err(|e| request_failed(PROVIDER, 0, e))?;

        let url = format!("{}/models/{}:{}", self.base_url, model, method);
        debug!(%url, "gemini request");
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_failed(PROVIDER, e))?;

        let status = response.status();
        let retry_after_ms = parse_retry_after_ms(response.headers()).unwrap_or(0);

        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| invalid_response(PROVIDER, format!("Failed to parse response: {}", e)));
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        let parsed = serde_json::from_str::<ApiError>(&error_text).ok();
        let exhausted = parsed
            .as_ref()
            .and_then(|e| e.error.status.as_deref())
            .map(|s| s == "RESOURCE_EXHAUSTED")
            .unwrap_or(false);
        let error_msg = parsed.map(|e| e.error.message).unwrap_or(error_text);

        Err(if status == StatusCode::TOO_MANY_REQUESTS || exhausted {
            rate_limited(PROVIDER, retry_after_ms)
        } else {
            request_failed(PROVIDER, status.as_u16() as i32, error_msg)
        })
    }
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}
