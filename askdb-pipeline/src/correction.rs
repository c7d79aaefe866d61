//! Self-Correction Loop: execute, feed errors back to the model, retry.
//!
//! ```text
//! Pending -> Executing -> Success
//!                 |
//!                 v
//!              Failed --(retries left)--> Correcting -> Executing
//!                 |
//!                 +--(none left / correction failed)--> Terminal
//! ```
//!
//! Only statement errors are corrected. Connectivity errors leave the loop
//! immediately with their own error.

use crate::executor::SqlExecutor;
use crate::prompts::PromptSet;
use askdb_core::{AskError, QueryError, QueryResult, SqlAttempt};
use askdb_llm::TextGenerator;
use askdb_sql::extract_sql;
use std::sync::Arc;
use tracing::{info, warn};

/// Rows from the first successful execution.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectionOutcome {
    pub result: QueryResult,
    /// The statement that produced `result`
    pub sql: String,
    /// Failed executions before the successful one
    pub attempts: Vec<SqlAttempt>,
}

/// Why the loop gave up, with the last statement it executed.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectionFailure {
    /// `QueryError::Terminal` after statement failures, otherwise the
    /// uncorrectable error as raised
    pub error: AskError,
    pub sql: String,
    pub attempts: Vec<SqlAttempt>,
}

#[derive(Clone)]
pub struct SelfCorrectionLoop {
    llm: Arc<dyn TextGenerator>,
    prompts: Arc<PromptSet>,
    max_retries: u32,
}

impl SelfCorrectionLoop {
    pub fn new(llm: Arc<dyn TextGenerator>, prompts: Arc<PromptSet>, max_retries: u32) -> Self {
        Self {
            llm,
            prompts,
            max_retries,
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Run `sql`, correcting it up to `max_retries` times.
    pub async fn run(
        &self,
        executor: &dyn SqlExecutor,
        sql: &str,
        question: &str,
        table_details: &str,
    ) -> Result<CorrectionOutcome, CorrectionFailure> {
        let total_attempts = self.max_retries + 1;
        let mut current = sql.to_string();
        let mut attempts: Vec<SqlAttempt> = Vec::new();

        for attempt in 1..=total_attempts {
            info!(attempt, total_attempts, sql = %current, "executing SQL");
            let error = match executor.execute(&current).await {
                Ok(result) => {
                    if attempt > 1 {
                        info!(attempt, "corrected SQL succeeded");
                    }
                    return Ok(CorrectionOutcome {
                        result,
                        sql: current,
                        attempts,
                    });
                }
                Err(AskError::Query(error)) if error.is_correctable() => error,
                Err(error) => {
                    warn!(attempt, error = %error, "uncorrectable execution failure");
                    return Err(CorrectionFailure {
                        error,
                        sql: current,
                        attempts,
                    });
                }
            };

            let message = error.to_string();
            warn!(attempt, error = %message, "SQL execution failed");
            attempts.push(SqlAttempt::failed(attempt, &current, &message));

            if attempt == total_attempts {
                break;
            }

            let prompt = self
                .prompts
                .correction_prompt(question, &current, &message, table_details);
            match self.llm.generate_text(&prompt).await {
                Ok(raw) => {
                    current = extract_sql(&raw);
                    info!(attempt, sql = %current, "received corrected SQL");
                }
                Err(e) => {
                    warn!(attempt, error = %e, "correction request failed, giving up");
                    break;
                }
            }
        }

        let last_error = attempts
            .last()
            .and_then(|a| a.error.clone())
            .unwrap_or_default();
        let error = QueryError::Terminal {
            attempts_made: attempts.len() as u32,
            last_error,
            attempts: attempts.clone(),
        };
        Err(CorrectionFailure {
            error: error.into(),
            sql: current,
            attempts,
        })
    }
}

impl std::fmt::Debug for SelfCorrectionLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelfCorrectionLoop")
            .field("provider", &self.llm.provider_id())
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::MockExecutor;
    use askdb_core::{CellValue, LlmError};
    use askdb_llm::MockTextGenerator;

    fn correction_loop(llm: Arc<MockTextGenerator>, max_retries: u32) -> SelfCorrectionLoop {
        SelfCorrectionLoop::new(llm, Arc::new(PromptSet::default()), max_retries)
    }

    #[tokio::test]
    async fn test_bounded_retries() {
        let llm = Arc::new(MockTextGenerator::with_default("```sql\nSELECT id FROM t;\n```"));
        let executor = MockExecutor::always_failing("column \"nme\" does not exist");

        let failure = correction_loop(llm.clone(), 2)
            .run(&executor, "SELECT nme FROM t;", "names?", "Table Name: t")
            .await
            .unwrap_err();

        assert_eq!(executor.call_count(), 3);
        assert_eq!(llm.call_count(), 2);
        assert_eq!(failure.attempts.len(), 3);
        assert_eq!(failure.attempts[0].sql_text, "SELECT nme FROM t;");
        assert_eq!(failure.attempts[1].sql_text, "SELECT id FROM t;");
        match failure.error {
            AskError::Query(QueryError::Terminal {
                attempts_made,
                last_error,
                attempts,
            }) => {
                assert_eq!(attempts_made, 3);
                assert_eq!(last_error, "column \"nme\" does not exist");
                assert_eq!(attempts.len(), 3);
            }
            other => panic!("expected terminal error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_correction_succeeds() {
        let llm = Arc::new(MockTextGenerator::new());
        llm.push_text("SELECT COUNT(*) FROM contacts;");
        let executor = MockExecutor::new();
        executor.push_failure("relation \"contact\" does not exist");
        executor.push_rows(vec![vec![CellValue::Int(42)]]);

        let outcome = correction_loop(llm.clone(), 2)
            .run(&executor, "SELECT COUNT(*) FROM contact;", "how many contacts?", "T")
            .await
            .unwrap();

        assert_eq!(outcome.sql, "SELECT COUNT(*) FROM contacts;");
        assert_eq!(outcome.attempts.len(), 1);
        assert_eq!(outcome.result.rows, vec![vec![CellValue::Int(42)]]);

        let prompt = &llm.prompts()[0];
        assert!(prompt.contains("Failed SQL Query:\nSELECT COUNT(*) FROM contact;"));
        assert!(prompt.contains("Error Message:\nrelation \"contact\" does not exist"));
    }

    #[tokio::test]
    async fn test_connectivity_not_retried() {
        let llm = Arc::new(MockTextGenerator::with_default("SELECT 1;"));
        let executor = MockExecutor::new();
        executor.push_error(QueryError::Connectivity {
            reason: "could not connect to server".to_string(),
        });

        let failure = correction_loop(llm.clone(), 2)
            .run(&executor, "SELECT 1;", "q", "T")
            .await
            .unwrap_err();

        assert!(matches!(failure.error, AskError::Query(QueryError::Connectivity { .. })));
        assert!(failure.attempts.is_empty());
        assert_eq!(executor.call_count(), 1);
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_correction_failure_aborts() {
        let llm = Arc::new(MockTextGenerator::new());
        llm.push_error(LlmError::ProviderNotConfigured);
        let executor = MockExecutor::always_failing("syntax error at or near \"FORM\"");

        let failure = correction_loop(llm, 2)
            .run(&executor, "SELECT * FORM t;", "q", "T")
            .await
            .unwrap_err();

        assert_eq!(executor.call_count(), 1);
        assert_eq!(failure.sql, "SELECT * FORM t;");
        assert!(matches!(
            failure.error,
            AskError::Query(QueryError::Terminal { attempts_made: 1, .. })
        ));
    }

    #[tokio::test]
    async fn test_zero_retries() {
        let llm = Arc::new(MockTextGenerator::with_default("SELECT 1;"));
        let executor = MockExecutor::always_failing("boom");

        let failure = correction_loop(llm.clone(), 0)
            .run(&executor, "SELECT 0;", "q", "T")
            .await
            .unwrap_err();

        assert_eq!(failure.attempts.len(), 1);
        assert_eq!(llm.call_count(), 0);
    }
}
