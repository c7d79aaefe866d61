//! Answer Composer.

use crate::prompts::{PromptSet, NO_DATA_SENTINEL};
use askdb_core::{format_rows, AskError, CompositionError, LlmError, Row};
use askdb_llm::TextGenerator;
use std::sync::Arc;
use tracing::warn;

/// Textual rendering of rows for the answer prompt.
pub fn result_text(rows: &[Row]) -> String {
    if rows.is_empty() {
        NO_DATA_SENTINEL.to_string()
    } else {
        format_rows(rows)
    }
}

fn is_timeout(error: &AskError) -> bool {
    match error {
        AskError::Llm(LlmError::Timeout { .. }) => true,
        AskError::Llm(LlmError::RequestFailed { status: 504, .. }) => true,
        other => {
            let message = other.to_string();
            message.contains("DEADLINE_EXCEEDED") || message.to_lowercase().contains("timeout")
        }
    }
}

/// Degraded answer used when the model call fails.
fn fallback_answer(error: &AskError, result: &str) -> String {
    if is_timeout(error) {
        format!(
            "The query took too long to process. The database query returned: {}. Please try rephrasing your question or breaking it into smaller parts.",
            result
        )
    } else {
        format!("Here is what the database returned: {}", result)
    }
}

/// Turns rows into a natural-language answer with one model call.
#[derive(Clone)]
pub struct AnswerComposer {
    llm: Arc<dyn TextGenerator>,
    prompts: Arc<PromptSet>,
}

impl AnswerComposer {
    pub fn new(llm: Arc<dyn TextGenerator>, prompts: Arc<PromptSet>) -> Self {
        Self { llm, prompts }
    }

    /// Always returns text. A failed call degrades to a fallback that
    /// embeds the raw result.
    pub async fn compose(&self, question: &str, rows: &[Row]) -> String {
        let result = result_text(rows);
        let prompt = self.prompts.answer_prompt(question, &result);

        match self.llm.generate_text(&prompt).await {
            Ok(answer) => answer,
            Err(e) => {
                let failure = CompositionError::AnswerFailed {
                    reason: e.to_string(),
                };
                warn!(error = %failure, "answer generation failed, returning raw result");
                fallback_answer(&e, &result)
            }
        }
    }
}

impl std::fmt::Debug for AnswerComposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerComposer")
            .field("provider", &self.llm.provider_id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use askdb_core::{CellValue, ContentPart, LlmResponse, NO_RESPONSE_FALLBACK};
    use askdb_llm::MockTextGenerator;

    fn composer(llm: Arc<MockTextGenerator>) -> AnswerComposer {
        AnswerComposer::new(llm, Arc::new(PromptSet::default()))
    }

    #[tokio::test]
    async fn test_no_data_sentinel() {
        let llm = Arc::new(MockTextGenerator::with_default("There are no matching rows."));
        let answer = composer(llm.clone()).compose("Any cases today?", &[]).await;

        assert_eq!(answer, "There are no matching rows.");
        assert!(llm.prompts()[0].contains("Database Query Result: No data returned from the database query."));
    }

    #[tokio::test]
    async fn test_rows_rendered_into_prompt() {
        let llm = Arc::new(MockTextGenerator::with_default("There are 42 contacts."));
        composer(llm.clone())
            .compose("How many contacts are there?", &[vec![CellValue::Int(42)]])
            .await;
        assert!(llm.prompts()[0].contains("Database Query Result: [(42)]"));
    }

    #[tokio::test]
    async fn test_structured_response_flattened() {
        let llm = Arc::new(MockTextGenerator::new());
        llm.push_response(LlmResponse::Parts(vec![
            ContentPart::Other(serde_json::json!({"inline_data": {}})),
            ContentPart::Text("Two states.".to_string()),
        ]));
        llm.push_response(LlmResponse::Parts(vec![]));

        let composer = composer(llm);
        assert_eq!(composer.compose("q", &[]).await, "Two states.");
        assert_eq!(composer.compose("q", &[]).await, NO_RESPONSE_FALLBACK);
    }

    #[tokio::test]
    async fn test_timeout_fallback() {
        let llm = Arc::new(MockTextGenerator::new());
        llm.push_error(LlmError::Timeout {
            provider: "mock".to_string(),
            elapsed_ms: 60_000,
        });
        let answer = composer(llm).compose("q", &[vec![CellValue::Int(7)]]).await;
        assert_eq!(
            answer,
            "The query took too long to process. The database query returned: [(7)]. Please try rephrasing your question or breaking it into smaller parts."
        );
    }

    #[tokio::test]
    async fn test_other_failure_fallback() {
        let llm = Arc::new(MockTextGenerator::new());
        llm.push_error(LlmError::ProviderNotConfigured);
        let answer = composer(llm).compose("q", &[]).await;
        assert_eq!(
            answer,
            "Here is what the database returned: No data returned from the database query."
        );
    }
}
