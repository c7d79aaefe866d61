//! Bounded exponential backoff around a text generator.

use crate::TextGenerator;
use askdb_core::{AskError, AskResult, LlmError, LlmResponse, RetryConfig};
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Retries rate-limited and timed-out calls; everything else fails fast.
///
/// Each attempt runs under a per-call deadline. When the attempt cap is
/// reached on rate limiting the caller gets
/// [`LlmError::RetriesExhausted`]; a final timeout is surfaced as the
/// timeout itself so callers can still recognise it.
#[derive(Debug)]
pub struct RetryingGenerator<G> {
    inner: G,
    policy: RetryConfig,
    call_timeout: Duration,
}

impl<G: TextGenerator> RetryingGenerator<G> {
    pub fn new(inner: G, policy: RetryConfig, call_timeout: Duration) -> Self {
        Self {
            inner,
            policy,
            call_timeout,
        }
    }

    pub fn policy(&self) -> &RetryConfig {
        &self.policy
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }

    async fn attempt(&self, prompt: &str) -> AskResult<LlmResponse> {
        let started = Instant::now();
        match tokio::time::timeout(self.call_timeout, self.inner.generate(prompt)).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout {
                provider: self.inner.provider_id().to_string(),
                elapsed_ms: started.elapsed().as_millis() as u64,
            }
            .into()),
        }
    }
}

#[async_trait]
impl<G: TextGenerator> TextGenerator for RetryingGenerator<G> {
    async fn generate(&self, prompt: &str) -> AskResult<LlmResponse> {
        let max_attempts = self.policy.max_attempts();
        let mut attempt = 1;

        loop {
            let error = match self.attempt(prompt).await {
                Ok(response) => {
                    if attempt > 1 {
                        debug!(provider = self.provider_id(), attempt, "generation succeeded after retry");
                    }
                    return Ok(response);
                }
                Err(AskError::Llm(e)) if e.is_retryable() => e,
                Err(e) => return Err(e),
            };

            if attempt >= max_attempts {
                warn!(
                    provider = self.provider_id(),
                    attempts = attempt,
                    error = %error,
                    "giving up on text generation"
                );
                return Err(match error {
                    LlmError::Timeout { .. } => error.into(),
                    other => LlmError::RetriesExhausted {
                        provider: self.provider_id().to_string(),
                        attempts: attempt,
                        last_error: other.to_string(),
                    }
                    .into(),
                });
            }

            let mut delay = self.policy.backoff_for(attempt - 1);
            if let LlmError::RateLimited { retry_after_ms, .. } = &error {
                let hinted = Duration::from_millis((*retry_after_ms).max(0) as u64);
                delay = delay.max(hinted.min(self.policy.max_backoff));
            }

            warn!(
                provider = self.provider_id(),
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "retryable generation failure"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    fn provider_id(&self) -> &str {
        self.inner.provider_id()
    }
}
