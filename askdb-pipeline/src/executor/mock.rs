//! Scripted executor for tests.

use super::SqlExecutor;
use askdb_core::{AskError, AskResult, CellValue, QueryError, QueryResult, Row};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct MockState {
    rules: Vec<(String, AskResult<QueryResult>)>,
    script: VecDeque<AskResult<QueryResult>>,
    executed: Vec<String>,
}

/// Replays canned outcomes and records every statement it receives.
///
/// Lookup order mirrors `MockTextGenerator`: the first rule whose needle
/// occurs in the SQL, then the next scripted outcome, then the fallback.
/// Without a fallback an unmatched statement fails with an execution error.
#[derive(Debug, Default)]
pub struct MockExecutor {
    state: Mutex<MockState>,
    fallback: Option<AskResult<QueryResult>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Executor on which every statement fails with `message`.
    pub fn always_failing(message: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            fallback: Some(Err(QueryError::Execution {
                message: message.into(),
                sqlstate: None,
            }
            .into())),
        }
    }

    /// Executor on which every unmatched statement returns `result`.
    pub fn always(result: QueryResult) -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            fallback: Some(Ok(result)),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Return `result` whenever the SQL contains `needle`.
    pub fn on(&self, needle: impl Into<String>, result: QueryResult) {
        self.state().rules.push((needle.into(), Ok(result)));
    }

    /// Fail with `error` whenever the SQL contains `needle`.
    pub fn on_error(&self, needle: impl Into<String>, error: impl Into<AskError>) {
        self.state().rules.push((needle.into(), Err(error.into())));
    }

    pub fn push_result(&self, result: QueryResult) {
        self.state().script.push_back(Ok(result));
    }

    /// Queue a rows-only result with generated column names.
    pub fn push_rows(&self, rows: Vec<Row>) {
        let width = rows.first().map(|r| r.len()).unwrap_or(0);
        let columns = (0..width).map(|i| format!("column_{}", i + 1)).collect();
        self.push_result(QueryResult::new(columns, rows, 0.01));
    }

    pub fn push_error(&self, error: impl Into<AskError>) {
        self.state().script.push_back(Err(error.into()));
    }

    /// Queue an execution error with the given database message.
    pub fn push_failure(&self, message: impl Into<String>) {
        self.push_error(QueryError::Execution {
            message: message.into(),
            sqlstate: None,
        });
    }

    /// Statements received so far, oldest first.
    pub fn executed(&self) -> Vec<String> {
        self.state().executed.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state().executed.len()
    }
}

/// Single-cell result, e.g. for `COUNT(*)`.
pub fn scalar_result(column: &str, value: CellValue) -> QueryResult {
    QueryResult::new(vec![column.to_string()], vec![vec![value]], 0.01)
}

#[async_trait]
impl SqlExecutor for MockExecutor {
    async fn execute(&self, sql: &str) -> AskResult<QueryResult> {
        let mut state = self.state();
        state.executed.push(sql.to_string());

        if let Some((_, outcome)) = state.rules.iter().find(|(needle, _)| sql.contains(needle.as_str())) {
            return outcome.clone();
        }
        if let Some(outcome) = state.script.pop_front() {
            return outcome;
        }
        match &self.fallback {
            Some(outcome) => outcome.clone(),
            None => Err(QueryError::Execution {
                message: format!("no scripted result for: {}", sql),
                sqlstate: None,
            }
            .into()),
        }
    }
}
