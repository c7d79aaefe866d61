//! Orchestrator: runs one question through every stage.
//!
//! Stages run strictly in sequence. The pipeline holds no per-conversation
//! state; the caller passes the history in and must not run two questions
//! against the same history at once.

use crate::composer::AnswerComposer;
use crate::correction::SelfCorrectionLoop;
use crate::errors::to_failure;
use crate::executor::SqlExecutor;
use crate::generator::SqlGenerator;
use crate::prompts::PromptSet;
use crate::selector::TableSelector;
use crate::suggestions::{ColumnSuggestionRequest, SuggestionGenerator, SuggestionRequest};
use crate::validator::SchemaValidator;
use askdb_context::{summarize_rows, ContextBuilder, ConversationHistory, SessionStore};
use askdb_core::{
    AskError, AskResult, ErrorCategory, PipelineConfig, PipelineFailure, PipelinePath,
    PipelineResponse, SchemaCatalog, SessionId, SqlAttempt, Turn,
};
use askdb_llm::TextGenerator;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, info_span, warn, Instrument};

/// Keywords that send a question down the fast path.
///
/// Plain substring match: "show" or "all" inside a complex question still
/// selects the fast path and skips table selection.
pub const SIMPLE_QUESTION_KEYWORDS: [&str; 6] = ["count", "total", "how many", "show", "list", "all"];

pub fn is_simple_question(question: &str) -> bool {
    let q = question.to_lowercase();
    SIMPLE_QUESTION_KEYWORDS.iter().any(|k| q.contains(k))
}

/// Every stage wired together over one text generator, one executor and
/// one catalog.
pub struct Pipeline {
    catalog: Arc<SchemaCatalog>,
    executor: Arc<dyn SqlExecutor>,
    config: PipelineConfig,
    context: ContextBuilder,
    selector: TableSelector,
    generator: SqlGenerator,
    validator: SchemaValidator,
    correction: SelfCorrectionLoop,
    composer: AnswerComposer,
    suggestions: SuggestionGenerator,
}

impl Pipeline {
    /// Validates `config` and `prompts` before wiring the stages.
    pub fn new(
        llm: Arc<dyn TextGenerator>,
        executor: Arc<dyn SqlExecutor>,
        catalog: Arc<SchemaCatalog>,
        prompts: PromptSet,
        config: PipelineConfig,
    ) -> AskResult<Self> {
        config.validate()?;
        prompts.validate()?;
        let prompts = Arc::new(prompts);
        let generator = SqlGenerator::new(llm.clone(), prompts.clone());

        Ok(Self {
            context: ContextBuilder::new(catalog.clone(), config.context_turns),
            selector: TableSelector::new(llm.clone(), prompts.clone()),
            validator: SchemaValidator::new(
                generator.clone(),
                catalog.clone(),
                config.max_schema_regenerations,
            ),
            correction: SelfCorrectionLoop::new(
                llm.clone(),
                prompts.clone(),
                config.max_correction_retries,
            ),
            composer: AnswerComposer::new(llm.clone(), prompts),
            suggestions: SuggestionGenerator::new(llm),
            generator,
            catalog,
            executor,
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    /// Answer `question`, appending a turn to `history` whether it succeeds
    /// or fails.
    pub async fn answer(
        &self,
        question: &str,
        history: &mut ConversationHistory,
    ) -> Result<PipelineResponse, PipelineFailure> {
        let span = info_span!("ask", history_len = history.len());
        self.run(question.trim(), history).instrument(span).await
    }

    /// [`Pipeline::answer`] against a session's history.
    pub async fn answer_in_session(
        &self,
        store: &mut SessionStore,
        session_id: SessionId,
        question: &str,
    ) -> Result<PipelineResponse, PipelineFailure> {
        self.answer(question, store.history(session_id)).await
    }

    async fn run(
        &self,
        question: &str,
        history: &mut ConversationHistory,
    ) -> Result<PipelineResponse, PipelineFailure> {
        if question.is_empty() {
            return Err(PipelineFailure {
                error: "No question provided".to_string(),
                category: ErrorCategory::Unknown,
                sql_attempted: String::new(),
                technical: None,
                attempts: Vec::new(),
            });
        }

        let started = Instant::now();
        let path = if is_simple_question(question) {
            PipelinePath::Fast
        } else {
            PipelinePath::Full
        };
        info!(?path, "answering question");

        let context = self.context.build(history, question);
        if let Some(table) = &context.anchor_table {
            info!(anchor_table = %table, pronoun_followup = context.pronoun_followup, "anchoring to previous table");
        }

        let table_details = match path {
            PipelinePath::Fast => self.catalog.table_details_text().to_string(),
            PipelinePath::Full => {
                let tables = self.selector.select(&self.catalog, question).await;
                self.catalog.restrict(&tables)
            }
        };

        let sql = match self
            .generator
            .generate(question, &table_details, &context.text)
            .await
        {
            Ok(sql) => sql,
            Err(e) => return Err(self.fail(history, question, &e, "", Vec::new())),
        };

        let validated = self
            .validator
            .validate(&sql, question, &table_details, &context.text)
            .await;

        let outcome = match self
            .correction
            .run(self.executor.as_ref(), &validated.sql, question, &table_details)
            .await
        {
            Ok(outcome) => outcome,
            Err(failure) => {
                return Err(self.fail(history, question, &failure.error, &failure.sql, failure.attempts))
            }
        };

        let rows = &outcome.result.rows;
        let answer = self.composer.compose(question, rows).await;
        history.push(Turn::new(question, &outcome.sql, summarize_rows(rows), &answer));
        history.set_last_sql(&outcome.sql);

        let (suggestions, column_suggestions) = if self.config.suggestions_enabled {
            let rows_summary = if rows.is_empty() {
                "No results".to_string()
            } else {
                format!("{} results", rows.len())
            };
            let questions = self
                .suggestions
                .suggest(SuggestionRequest {
                    question,
                    sql: &outcome.sql,
                    answer: &answer,
                    rows_summary: &rows_summary,
                    table_details: &table_details,
                })
                .await;
            let columns = self
                .suggestions
                .suggest_columns(ColumnSuggestionRequest {
                    question,
                    table_details: &table_details,
                    result_columns: &outcome.result.columns,
                })
                .await;
            (questions, columns)
        } else {
            (Vec::new(), Vec::new())
        };

        let result = outcome.result.truncated(self.config.display_row_cap);
        info!(
            ?path,
            total_rows = result.total_row_count,
            rows_shown = result.rows_shown(),
            corrections = outcome.attempts.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "question answered"
        );

        Ok(PipelineResponse {
            sql: outcome.sql,
            total_rows: result.total_row_count,
            rows_shown: result.rows_shown(),
            has_more: result.has_more(),
            execution_time: result.execution_time_seconds,
            columns: result.columns,
            rows: result.rows,
            answer,
            path,
            attempts: outcome.attempts,
            suggestions,
            column_suggestions,
        })
    }

    /// Record the failed exchange and build the caller-facing failure.
    fn fail(
        &self,
        history: &mut ConversationHistory,
        question: &str,
        error: &AskError,
        sql: &str,
        attempts: Vec<SqlAttempt>,
    ) -> PipelineFailure {
        let failure = to_failure(error, sql, attempts, self.config.debug_errors);
        warn!(category = ?failure.category, error = %error, sql = %sql, "question failed");
        history.push(Turn::new(question, sql, "", format!("Error: {}", failure.error)));
        failure
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("tables", &self.catalog.len())
            .field("config", &self.config)
            .finish()
    }
}
