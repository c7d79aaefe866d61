//! SQL Generator: one prompt, one model call, one cleaned statement.

use crate::prompts::PromptSet;
use askdb_core::AskResult;
use askdb_llm::TextGenerator;
use askdb_sql::extract_sql;
use std::sync::Arc;
use tracing::debug;

/// Turns a question plus schema text into SQL.
///
/// Stateless; never retries on its own. Rate-limit retries happen inside
/// the text generator, schema and execution retries in the stages that
/// call this.
#[derive(Clone)]
pub struct SqlGenerator {
    llm: Arc<dyn TextGenerator>,
    prompts: Arc<PromptSet>,
}

impl SqlGenerator {
    pub fn new(llm: Arc<dyn TextGenerator>, prompts: Arc<PromptSet>) -> Self {
        Self { llm, prompts }
    }

    pub fn prompts(&self) -> &PromptSet {
        &self.prompts
    }

    /// Generate SQL. The result may be empty when the model produced nothing
    /// usable; execution reports that downstream.
    pub async fn generate(&self, question: &str, table_details: &str, context: &str) -> AskResult<String> {
        let prompt = self.prompts.generation_prompt(question, table_details, context);
        let raw = self.llm.generate_text(&prompt).await?;
        let sql = extract_sql(&raw);
        debug!(provider = self.llm.provider_id(), sql = %sql, "generated SQL");
        Ok(sql)
    }
}

impl std::fmt::Debug for SqlGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlGenerator")
            .field("provider", &self.llm.provider_id())
            .finish()
    }
}
