//! askdb Core - Pipeline Data Types
//!
//! Pure data structures shared by every askdb crate. All other crates depend on this.
//! Behavior lives elsewhere: SQL heuristics in askdb-sql, LLM access in askdb-llm,
//! context assembly in askdb-context and orchestration in askdb-pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub mod catalog;
pub mod config;
pub mod error;
pub mod llm;

pub use catalog::SchemaCatalog;
pub use config::{PipelineConfig, ProviderConfig, ProviderKind, RetryConfig};
pub use error::{
    AskError, AskResult, CompositionError, ConfigError, ErrorCategory, LlmError, QueryError,
    SchemaError,
};
pub use llm::{ContentPart, LlmResponse, NO_RESPONSE_FALLBACK};

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Session identifier using UUIDv7 for timestamp-sortable IDs.
pub type SessionId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Generate a new UUIDv7 session id.
pub fn new_session_id() -> SessionId {
    Uuid::now_v7()
}

// ============================================================================
// RESULT CELLS AND ROWS
// ============================================================================

/// A single value in a result row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl CellValue {
    /// Convenience constructor for text cells.
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Build a cell from an optional textual value as returned by the database.
    pub fn from_optional_text(value: Option<&str>) -> Self {
        match value {
            Some(v) => Self::Text(v.to_string()),
            None => Self::Null,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => write!(f, "NULL"),
            CellValue::Bool(b) => write!(f, "{}", b),
            CellValue::Int(i) => write!(f, "{}", i),
            CellValue::Float(x) => write!(f, "{}", x),
            CellValue::Text(s) => write!(f, "'{}'", s),
        }
    }
}

/// One result row, in column order.
pub type Row = Vec<CellValue>;

/// Render a row as a tuple: `('Alice', 3)`.
pub fn format_row(row: &[CellValue]) -> String {
    let cells: Vec<String> = row.iter().map(|c| c.to_string()).collect();
    format!("({})", cells.join(", "))
}

/// Render a slice of rows as a bracketed list of tuples.
pub fn format_rows(rows: &[Row]) -> String {
    let rendered: Vec<String> = rows.iter().map(|r| format_row(r)).collect();
    format!("[{}]", rendered.join(", "))
}

// ============================================================================
// CONVERSATION TURN
// ============================================================================

/// One complete question/answer exchange.
///
/// Created at the end of a pipeline run, successful or not. A failed run
/// records the plain-English error in `answer` so later context still shows
/// what was attempted. Turns are never mutated after creation; history
/// containers only hand out shared references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// The user's question, verbatim
    pub question: String,
    /// SQL that was executed (or last attempted); empty when none was produced
    pub generated_sql: String,
    /// Compact rendering of the result rows
    pub result_summary: String,
    /// Final natural-language answer, or the error text for failed runs
    pub answer: String,
    /// When the turn was recorded
    pub created_at: Timestamp,
}

impl Turn {
    pub fn new(
        question: impl Into<String>,
        generated_sql: impl Into<String>,
        result_summary: impl Into<String>,
        answer: impl Into<String>,
    ) -> Self {
        Self {
            question: question.into(),
            generated_sql: generated_sql.into(),
            result_summary: result_summary.into(),
            answer: answer.into(),
            created_at: Utc::now(),
        }
    }

    /// Whether this turn carries SQL.
    pub fn has_sql(&self) -> bool {
        !self.generated_sql.trim().is_empty()
    }
}

// ============================================================================
// SCHEMA ENTRY
// ============================================================================

/// A table known to the schema catalog.
///
/// Names are matched case-insensitively for validation but kept verbatim for
/// prompt text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaEntry {
    pub table_name: String,
    pub description: String,
}

impl SchemaEntry {
    pub fn new(table_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            description: description.into(),
        }
    }
}

// ============================================================================
// SQL ATTEMPT
// ============================================================================

/// One SQL statement tried inside a correction or regeneration loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlAttempt {
    /// 1-based attempt number within its loop
    pub attempt_number: u32,
    pub sql_text: String,
    /// Error raised by this attempt, if any
    pub error: Option<String>,
}

impl SqlAttempt {
    pub fn failed(attempt_number: u32, sql_text: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            attempt_number,
            sql_text: sql_text.into(),
            error: Some(error.into()),
        }
    }
}

// ============================================================================
// QUERY RESULT
// ============================================================================

/// Rows returned by one successful execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column names, in order (empty for synthetic results)
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    /// Wall-clock execution time, connection setup included
    pub execution_time_seconds: f64,
    /// Untruncated row count; survives `truncated`
    pub total_row_count: usize,
}

impl QueryResult {
    pub fn new(columns: Vec<String>, rows: Vec<Row>, execution_time_seconds: f64) -> Self {
        let total_row_count = rows.len();
        Self {
            columns,
            rows,
            execution_time_seconds,
            total_row_count,
        }
    }

    /// Keep at most `cap` rows. `total_row_count` is left untouched.
    pub fn truncated(mut self, cap: usize) -> Self {
        self.rows.truncate(cap);
        self
    }

    /// Number of rows currently held.
    pub fn rows_shown(&self) -> usize {
        self.rows.len()
    }

    /// True when rows were dropped by truncation.
    pub fn has_more(&self) -> bool {
        self.total_row_count > self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ============================================================================
// PIPELINE OUTPUT
// ============================================================================

/// Which orchestration path served a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelinePath {
    /// Keyword-classified simple question: no table selection
    Fast,
    /// Table selection before generation
    Full,
}

/// Successful pipeline answer returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResponse {
    /// Final SQL that produced the rows (post-correction)
    pub sql: String,
    pub columns: Vec<String>,
    /// Rows truncated to the display cap
    pub rows: Vec<Row>,
    pub answer: String,
    pub execution_time: f64,
    pub total_rows: usize,
    pub rows_shown: usize,
    pub has_more: bool,
    pub path: PipelinePath,
    /// Failed attempts that preceded the successful one
    pub attempts: Vec<SqlAttempt>,
    /// Follow-up question suggestions (may be empty)
    pub suggestions: Vec<String>,
    /// Columns worth querying next, e.g. "email (Where to reach them)"
    #[serde(default)]
    pub column_suggestions: Vec<String>,
}

/// Structured failure returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineFailure {
    /// Plain-English message safe to show a user
    pub error: String,
    pub category: ErrorCategory,
    /// Last SQL attempted, empty if generation never produced any
    pub sql_attempted: String,
    /// Raw technical detail, only populated when debug detail is enabled
    pub technical: Option<String>,
    pub attempts: Vec<SqlAttempt>,
}

impl fmt::Display for PipelineFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for PipelineFailure {}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_row_mixed_cells() {
        let row = vec![CellValue::text("Alice"), CellValue::Int(3), CellValue::Null];
        assert_eq!(format_row(&row), "('Alice', 3, NULL)");
    }

    #[test]
    fn test_format_rows_list() {
        let rows = vec![vec![CellValue::Int(1)], vec![CellValue::Int(2)]];
        assert_eq!(format_rows(&rows), "[(1), (2)]");
    }

    #[test]
    fn test_cell_from_optional_text() {
        assert_eq!(CellValue::from_optional_text(None), CellValue::Null);
        assert_eq!(
            CellValue::from_optional_text(Some("x")),
            CellValue::Text("x".to_string())
        );
    }

    #[test]
    fn test_turn_has_sql() {
        let with_sql = Turn::new("q", "SELECT 1;", "Single result: (1)", "one");
        let without = Turn::new("q", "  ", "", "failed");
        assert!(with_sql.has_sql());
        assert!(!without.has_sql());
    }

    #[test]
    fn test_query_result_truncation_keeps_total() {
        let rows: Vec<Row> = (0..237).map(|i| vec![CellValue::Int(i)]).collect();
        let result = QueryResult::new(vec!["id".to_string()], rows, 0.01).truncated(50);
        assert_eq!(result.rows_shown(), 50);
        assert_eq!(result.total_row_count, 237);
        assert!(result.has_more());
    }

    #[test]
    fn test_query_result_truncation_under_cap() {
        let rows: Vec<Row> = (0..3).map(|i| vec![CellValue::Int(i)]).collect();
        let result = QueryResult::new(vec![], rows, 0.0).truncated(50);
        assert_eq!(result.rows_shown(), 3);
        assert!(!result.has_more());
    }

    #[test]
    fn test_pipeline_path_serializes_lowercase() {
        let json = serde_json::to_string(&PipelinePath::Fast).unwrap();
        assert_eq!(json, "\"fast\"");
    }

    #[test]
    fn test_turn_roundtrips_through_json() {
        let turn = Turn::new("list states", "SELECT * FROM states;", "2 results", "Two.");
        let json = serde_json::to_string(&turn).unwrap();
        let back: Turn = serde_json::from_str(&json).unwrap();
        assert_eq!(back, turn);
    }
}

// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Truncation never changes total_row_count and never exceeds the cap.
        #[test]
        fn prop_truncation_invariant(total in 0usize..500, cap in 1usize..120) {
            let rows: Vec<Row> = (0..total).map(|i| vec![CellValue::Int(i as i64)]).collect();
            let result = QueryResult::new(vec!["n".to_string()], rows, 0.0).truncated(cap);

            prop_assert_eq!(result.total_row_count, total);
            prop_assert_eq!(result.rows_shown(), total.min(cap));
            prop_assert_eq!(result.has_more(), total > cap);
        }
    }
}
