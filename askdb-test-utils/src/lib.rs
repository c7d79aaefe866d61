//! askdb Test Utilities
//!
//! Shared test infrastructure for the askdb workspace:
//! - Proptest generators for turns, catalogs and raw model output
//! - Mock text generator and executor, re-exported from their source crates
//! - Fixtures for the catalogs and conversations the tests keep reusing
//! - Assertions for pipeline outcomes

// Re-export mocks from their source crates
pub use askdb_llm::MockTextGenerator;
pub use askdb_pipeline::{scalar_result, MockExecutor};

// Re-export core types for convenience
pub use askdb_context::ConversationHistory;
pub use askdb_core::{
    AskError, AskResult, CellValue, ErrorCategory, LlmError, PipelineConfig, PipelineFailure,
    PipelinePath, PipelineResponse, QueryError, QueryResult, RetryConfig, Row, SchemaCatalog,
    SchemaEntry, SqlAttempt, Timestamp, Turn,
};

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for askdb data.

    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    const RESERVED: [&str; 20] = [
        "select", "from", "join", "where", "on", "as", "group", "order", "by", "limit", "and",
        "or", "not", "in", "is", "null", "inner", "left", "right", "outer",
    ];

    /// Lower-case identifier that is not an SQL keyword.
    pub fn arb_table_name() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_]{0,15}".prop_filter("SQL keyword", |name| !RESERVED.contains(&name.as_str()))
    }

    pub fn arb_column_name() -> impl Strategy<Value = String> {
        arb_table_name()
    }

    /// Between 1 and 8 entries with distinct names.
    pub fn arb_schema_entries() -> impl Strategy<Value = Vec<SchemaEntry>> {
        prop::collection::btree_set(arb_table_name(), 1..8).prop_map(|names| {
            names
                .into_iter()
                .map(|name| {
                    let description = format!("Rows of {}", name);
                    SchemaEntry::new(name, description)
                })
                .collect()
        })
    }

    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        (1_600_000_000i64..1_900_000_000i64)
            .prop_map(|secs| Utc.timestamp_opt(secs, 0).single().unwrap_or_else(Utc::now))
    }

    pub fn arb_cell_value() -> impl Strategy<Value = CellValue> {
        prop_oneof![
            Just(CellValue::Null),
            any::<bool>().prop_map(CellValue::Bool),
            any::<i64>().prop_map(CellValue::Int),
            (-1.0e6f64..1.0e6f64).prop_map(CellValue::Float),
            "[a-zA-Z0-9 ]{0,20}".prop_map(CellValue::Text),
        ]
    }

    pub fn arb_row(width: usize) -> impl Strategy<Value = Row> {
        prop::collection::vec(arb_cell_value(), width)
    }

    /// A clean `SELECT ... FROM t;` statement.
    pub fn arb_select() -> impl Strategy<Value = String> {
        (arb_column_name(), arb_table_name(), prop::option::of(1u32..500)).prop_map(
            |(column, table, limit)| match limit {
                Some(n) => format!("SELECT {} FROM {} LIMIT {};", column, table, n),
                None => format!("SELECT {} FROM {};", column, table),
            },
        )
    }

    /// Raw model output wrapping a SELECT the way models tend to reply:
    /// fenced, labelled, with trailing commentary, or bare.
    pub fn arb_sql_output() -> impl Strategy<Value = String> {
        (arb_select(), 0usize..5, "[a-zA-Z ,.]{0,40}").prop_map(|(sql, shape, note)| match shape {
            0 => format!("```sql\n{}\n```", sql),
            1 => format!("SQLQuery: {}", sql),
            2 => format!("{}\n\n{}", sql, note),
            3 => format!("```\n{}\n```\n{}", sql, note),
            _ => sql,
        })
    }

    /// A completed turn; roughly one in four carries no SQL.
    pub fn arb_turn() -> impl Strategy<Value = Turn> {
        (
            "[a-zA-Z0-9 ?]{1,80}",
            prop_oneof![3 => arb_select(), 1 => Just(String::new())],
            "[a-zA-Z0-9 ,()']{0,60}",
            "[a-zA-Z0-9 .,]{1,120}",
            arb_timestamp(),
        )
            .prop_map(|(question, sql, summary, answer, created_at)| Turn {
                question,
                generated_sql: sql,
                result_summary: summary,
                answer,
                created_at,
            })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built fixtures for common scenarios.

    use super::*;
    use std::time::Duration;

    /// `contacts` and `companies`.
    pub fn contacts_catalog() -> SchemaCatalog {
        SchemaCatalog::new(vec![
            SchemaEntry::new("contacts", "People we talk to: id, name, email, company_id, created_at"),
            SchemaEntry::new("companies", "Organisations: id, name, city"),
        ])
        .unwrap_or_else(|e| panic!("contacts fixture is invalid: {}", e))
    }

    /// `students` and `cases` only.
    pub fn students_cases_catalog() -> SchemaCatalog {
        SchemaCatalog::new(vec![
            SchemaEntry::new("students", "Enrolled students: id, name, grade"),
            SchemaEntry::new("cases", "Support cases: id, student_id, opened_at, status"),
        ])
        .unwrap_or_else(|e| panic!("students fixture is invalid: {}", e))
    }

    /// Pipeline settings with millisecond backoffs and suggestions off.
    pub fn fast_config() -> PipelineConfig {
        PipelineConfig {
            suggestions_enabled: false,
            llm_timeout: Duration::from_secs(5),
            llm_retry: RetryConfig {
                max_retries: 2,
                initial_backoff: Duration::from_millis(1),
                max_backoff: Duration::from_millis(4),
                backoff_multiplier: 2.0,
            },
            ..PipelineConfig::default()
        }
    }

    /// History after "list states" was answered from `states`.
    pub fn states_history() -> ConversationHistory {
        let mut history = ConversationHistory::new(10);
        history.push(Turn::new(
            "list states",
            "SELECT * FROM states;",
            "2 results: [('Ohio'), ('Utah')]",
            "Ohio and Utah.",
        ));
        history.set_last_sql("SELECT * FROM states;");
        history
    }

    pub fn sample_turn() -> Turn {
        Turn::new(
            "How many contacts are there?",
            "SELECT COUNT(*) FROM contacts;",
            "Single result: (42)",
            "There are 42 contacts.",
        )
    }

    /// `n` single-column rows `(0)`, `(1)`, ...
    pub fn numbered_rows(n: usize) -> Vec<Row> {
        (0..n).map(|i| vec![CellValue::Int(i as i64)]).collect()
    }

    pub fn numbered_result(n: usize) -> QueryResult {
        QueryResult::new(vec!["id".to_string()], numbered_rows(n), 0.02)
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for pipeline outcomes.

    use super::*;

    /// Assert a pipeline run succeeded and return the response.
    #[track_caller]
    pub fn assert_answered(outcome: &Result<PipelineResponse, PipelineFailure>) -> &PipelineResponse {
        match outcome {
            Ok(response) => response,
            Err(failure) => panic!("Expected an answer, got failure: {:?}", failure),
        }
    }

    /// Assert a pipeline run failed and return the failure.
    #[track_caller]
    pub fn assert_failed(outcome: &Result<PipelineResponse, PipelineFailure>) -> &PipelineFailure {
        match outcome {
            Err(failure) => failure,
            Ok(response) => panic!("Expected a failure, got answer: {:?}", response),
        }
    }

    #[track_caller]
    pub fn assert_category(failure: &PipelineFailure, expected: ErrorCategory) {
        assert_eq!(
            failure.category, expected,
            "Wrong category for failure: {}",
            failure.error
        );
    }

    /// Attempt numbers are 1..=n in order and every attempt carries an error.
    #[track_caller]
    pub fn assert_attempt_log(attempts: &[SqlAttempt], expected_len: usize) {
        assert_eq!(attempts.len(), expected_len, "attempt log: {:?}", attempts);
        for (i, attempt) in attempts.iter().enumerate() {
            assert_eq!(attempt.attempt_number as usize, i + 1);
            assert!(attempt.error.is_some(), "attempt {} has no error", i + 1);
        }
    }

    #[track_caller]
    pub fn assert_truncated(response: &PipelineResponse, shown: usize, total: usize) {
        assert_eq!(response.rows_shown, shown);
        assert_eq!(response.rows.len(), shown);
        assert_eq!(response.total_rows, total);
        assert_eq!(response.has_more, total > shown);
    }

    /// Statement starts with SELECT/WITH and ends with a semicolon.
    #[track_caller]
    pub fn assert_select_statement(sql: &str) {
        let upper = sql.trim_start().to_uppercase();
        assert!(
            upper.starts_with("SELECT") || upper.starts_with("WITH"),
            "not a SELECT: {}",
            sql
        );
        assert!(sql.trim_end().ends_with(';'), "missing semicolon: {}", sql);
    }
}
