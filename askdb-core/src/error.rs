//! Error types for askdb operations

use crate::SqlAttempt;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Text generator (LLM provider) errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("No LLM provider configured")]
    ProviderNotConfigured,

    #[error("Request to {provider} failed with status {status}: {message}")]
    RequestFailed {
        provider: String,
        status: i32,
        message: String,
    },

    #[error("Rate limited by {provider}, retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: i64,
    },

    #[error("Request to {provider} timed out after {elapsed_ms}ms")]
    Timeout { provider: String, elapsed_ms: u64 },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("API rate limit exceeded on {provider} after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        provider: String,
        attempts: u32,
        last_error: String,
    },
}

impl LlmError {
    /// Rate-limit and timeout failures may be retried; everything else is fatal.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LlmError::RateLimited { .. } | LlmError::Timeout { .. })
    }
}

/// Schema catalog and table-reference errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Failed to load schema catalog: {reason}")]
    CatalogLoadFailed { reason: String },

    #[error("Schema catalog is empty")]
    EmptyCatalog,

    #[error("Invalid table names {invalid:?}; valid tables are {valid:?}")]
    InvalidTableReference {
        invalid: Vec<String>,
        valid: Vec<String>,
    },
}

/// SQL execution errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("No SQL statement to execute")]
    EmptyStatement,

    #[error("{message}")]
    Execution {
        message: String,
        sqlstate: Option<String>,
    },

    #[error("Database connection failed: {reason}")]
    Connectivity { reason: String },

    #[error("Query timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    #[error("Query failed after {attempts_made} attempts. Last error: {last_error}")]
    Terminal {
        attempts_made: u32,
        last_error: String,
        attempts: Vec<SqlAttempt>,
    },
}

impl QueryError {
    /// Errors the self-correction loop may try to fix by rewriting SQL.
    pub fn is_correctable(&self) -> bool {
        matches!(
            self,
            QueryError::Execution { .. } | QueryError::Timeout { .. } | QueryError::EmptyStatement
        )
    }
}

/// Answer composition errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompositionError {
    #[error("Answer generation failed: {reason}")]
    AnswerFailed { reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Provider not supported: {provider}")]
    ProviderNotSupported { provider: String },
}

/// Master error type for all askdb errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AskError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("Composition error: {0}")]
    Composition(#[from] CompositionError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for askdb operations.
pub type AskResult<T> = Result<T, AskError>;

// ============================================================================
// USER-FACING CATEGORIES
// ============================================================================

/// Plain-English error categories shown to end users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    TableNotFound,
    ColumnNotFound,
    SyntaxError,
    ConnectionFailed,
    PermissionDenied,
    Timeout,
    RateLimited,
    Unknown,
}

impl ErrorCategory {
    /// Fixed user-facing message. `Unknown` callers embed the raw error instead.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCategory::TableNotFound => "The table you're trying to query doesn't exist in the database. Please check the table name and try again.",
            ErrorCategory::ColumnNotFound => "One of the columns in your query doesn't exist. The database schema may have changed. Please rephrase your question.",
            ErrorCategory::SyntaxError => "There's a syntax error in the generated SQL query. Please try rephrasing your question.",
            ErrorCategory::ConnectionFailed => "Unable to connect to the database. Please check if the database server is running.",
            ErrorCategory::PermissionDenied => "You don't have permission to perform this operation. Please contact your administrator.",
            ErrorCategory::Timeout => "The query took too long to execute. Try making your question more specific or add filters to reduce the amount of data.",
            ErrorCategory::RateLimited => "The API rate limit has been exceeded. Please wait a moment and try again. This usually happens when too many requests are made in a short time period.",
            ErrorCategory::Unknown => "An unexpected error occurred. Please try again.",
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_error_display_rate_limited() {
        let err = LlmError::RateLimited {
            provider: "gemini".to_string(),
            retry_after_ms: 1500,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Rate limited"));
        assert!(msg.contains("gemini"));
        assert!(msg.contains("1500"));
    }

    #[test]
    fn test_llm_error_retryable_classes() {
        assert!(LlmError::RateLimited {
            provider: "openai".to_string(),
            retry_after_ms: 0
        }
        .is_retryable());
        assert!(LlmError::Timeout {
            provider: "openai".to_string(),
            elapsed_ms: 60_000
        }
        .is_retryable());
        assert!(!LlmError::RequestFailed {
            provider: "openai".to_string(),
            status: 400,
            message: "bad".to_string()
        }
        .is_retryable());
        assert!(!LlmError::RetriesExhausted {
            provider: "openai".to_string(),
            attempts: 4,
            last_error: "429".to_string()
        }
        .is_retryable());
    }

    #[test]
    fn test_query_error_correctable() {
        assert!(QueryError::Execution {
            message: "syntax error".to_string(),
            sqlstate: Some("42601".to_string())
        }
        .is_correctable());
        assert!(!QueryError::Connectivity {
            reason: "refused".to_string()
        }
        .is_correctable());
    }

    #[test]
    fn test_terminal_error_display() {
        let err = QueryError::Terminal {
            attempts_made: 3,
            last_error: "column \"x\" does not exist".to_string(),
            attempts: vec![],
        };
        let msg = err.to_string();
        assert!(msg.contains("after 3 attempts"));
        assert!(msg.contains("column \"x\" does not exist"));
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "display_row_cap".to_string(),
            value: "0".to_string(),
            reason: "must be positive".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("display_row_cap"));
        assert!(msg.contains("must be positive"));
    }

    #[test]
    fn test_ask_error_from_variants() {
        let llm = AskError::from(LlmError::ProviderNotConfigured);
        assert!(matches!(llm, AskError::Llm(_)));

        let schema = AskError::from(SchemaError::EmptyCatalog);
        assert!(matches!(schema, AskError::Schema(_)));

        let query = AskError::from(QueryError::EmptyStatement);
        assert!(matches!(query, AskError::Query(_)));

        let composition = AskError::from(CompositionError::AnswerFailed {
            reason: "boom".to_string(),
        });
        assert!(matches!(composition, AskError::Composition(_)));

        let config = AskError::from(ConfigError::ProviderNotSupported {
            provider: "foo".to_string(),
        });
        assert!(matches!(config, AskError::Config(_)));
    }

    #[test]
    fn test_error_category_serializes_screaming_snake() {
        let json = serde_json::to_string(&ErrorCategory::TableNotFound).unwrap();
        assert_eq!(json, "\"TABLE_NOT_FOUND\"");
    }
}
