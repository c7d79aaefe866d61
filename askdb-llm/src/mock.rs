//! Scripted text generator for tests.

use crate::TextGenerator;
use askdb_core::{AskResult, LlmResponse};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct MockState {
    rules: Vec<(String, AskResult<LlmResponse>)>,
    script: VecDeque<AskResult<LlmResponse>>,
    prompts: Vec<String>,
}

/// Replays canned replies and records every prompt it sees.
///
/// Reply lookup order:
/// 1. the first rule whose needle occurs in the prompt (rules are reusable)
/// 2. the next scripted reply (consumed)
/// 3. the default reply, if any
///
/// With nothing left to reply, `generate` returns an invalid-response error.
#[derive(Debug, Default)]
pub struct MockTextGenerator {
    state: Mutex<MockState>,
    default_reply: Option<String>,
}

impl MockTextGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mock that answers every unmatched prompt with `reply`.
    pub fn with_default(reply: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            default_reply: Some(reply.into()),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Builder form of [`MockTextGenerator::on`].
    pub fn when(self, needle: impl Into<String>, reply: impl Into<String>) -> Self {
        self.on(needle, reply);
        self
    }

    /// Reply with `reply` whenever the prompt contains `needle`.
    pub fn on(&self, needle: impl Into<String>, reply: impl Into<String>) {
        self.state()
            .rules
            .push((needle.into(), Ok(LlmResponse::PlainText(reply.into()))));
    }

    /// Fail with `error` whenever the prompt contains `needle`.
    pub fn on_error(&self, needle: impl Into<String>, error: impl Into<askdb_core::AskError>) {
        self.state().rules.push((needle.into(), Err(error.into())));
    }

    pub fn push_text(&self, reply: impl Into<String>) {
        self.push_response(LlmResponse::PlainText(reply.into()));
    }

    pub fn push_response(&self, response: LlmResponse) {
        self.state().script.push_back(Ok(response));
    }

    pub fn push_error(&self, error: impl Into<askdb_core::AskError>) {
        self.state().script.push_back(Err(error.into()));
    }

    /// Prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.state().prompts.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state().prompts.len()
    }

    /// Prompts containing `needle`.
    pub fn prompts_containing(&self, needle: &str) -> Vec<String> {
        self.state()
            .prompts
            .iter()
            .filter(|p| p.contains(needle))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl TextGenerator for MockTextGenerator {
    async fn generate(&self, prompt: &str) -> AskResult<LlmResponse> {
        let mut state = self.state();
        state.prompts.push(prompt.to_string());

        if let Some((_, reply)) = state.rules.iter().find(|(needle, _)| prompt.contains(needle)) {
            return reply.clone();
        }
        if let Some(reply) = state.script.pop_front() {
            return reply;
        }
        match &self.default_reply {
            Some(text) => Ok(LlmResponse::PlainText(text.clone())),
            None => Err(askdb_core::LlmError::InvalidResponse {
                provider: "mock".to_string(),
                reason: "no scripted reply left".to_string(),
            }
            .into()),
        }
    }

    fn provider_id(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use askdb_core::{AskError, LlmError};

    #[tokio::test]
    async fn test_rules_then_script_then_default() {
        let mock = MockTextGenerator::with_default("fallback").when("answer", "ruled");
        mock.push_text("scripted");

        assert_eq!(mock.generate_text("please answer").await.unwrap(), "ruled");
        assert_eq!(mock.generate_text("sql").await.unwrap(), "scripted");
        assert_eq!(mock.generate_text("sql").await.unwrap(), "fallback");
        assert_eq!(mock.call_count(), 3);
        assert_eq!(mock.prompts_containing("answer").len(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_script_is_an_error() {
        let mock = MockTextGenerator::new();
        mock.push_error(LlmError::ProviderNotConfigured);

        assert_eq!(
            mock.generate("x").await.unwrap_err(),
            AskError::Llm(LlmError::ProviderNotConfigured)
        );
        assert!(matches!(
            mock.generate("x").await,
            Err(AskError::Llm(LlmError::InvalidResponse { .. }))
        ));
    }
}
