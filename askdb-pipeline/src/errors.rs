//! Turn technical errors into plain-English, user-facing failures.

use askdb_core::{AskError, ErrorCategory, LlmError, PipelineFailure, QueryError, SqlAttempt};

/// Category for a raw error message, first match wins.
pub fn classify_message(message: &str) -> ErrorCategory {
    let lower = message.to_lowercase();
    let missing = lower.contains("does not exist");

    if missing && (lower.contains("relation") || (lower.contains("table") && !lower.contains("column"))) {
        ErrorCategory::TableNotFound
    } else if missing && lower.contains("column") {
        ErrorCategory::ColumnNotFound
    } else if lower.contains("syntax error") {
        ErrorCategory::SyntaxError
    } else if lower.contains("connection") || lower.contains("could not connect") {
        ErrorCategory::ConnectionFailed
    } else if lower.contains("permission") || lower.contains("access denied") {
        ErrorCategory::PermissionDenied
    } else if lower.contains("timeout") || lower.contains("timed out") {
        ErrorCategory::Timeout
    } else if lower.contains("rate limit")
        || lower.contains("resource exhausted")
        || lower.contains("resource_exhausted")
        || message.contains("429")
    {
        ErrorCategory::RateLimited
    } else {
        ErrorCategory::Unknown
    }
}

fn classify_sqlstate(code: &str) -> Option<ErrorCategory> {
    match code {
        "42P01" => Some(ErrorCategory::TableNotFound),
        "42703" => Some(ErrorCategory::ColumnNotFound),
        "42601" => Some(ErrorCategory::SyntaxError),
        "42501" => Some(ErrorCategory::PermissionDenied),
        "57014" => Some(ErrorCategory::Timeout),
        _ => None,
    }
}

/// Category for an error, using its variant before falling back to text.
pub fn classify(error: &AskError) -> ErrorCategory {
    match error {
        AskError::Llm(LlmError::RateLimited { .. } | LlmError::RetriesExhausted { .. }) => {
            ErrorCategory::RateLimited
        }
        AskError::Llm(LlmError::Timeout { .. }) | AskError::Query(QueryError::Timeout { .. }) => {
            ErrorCategory::Timeout
        }
        AskError::Query(QueryError::Connectivity { .. }) => ErrorCategory::ConnectionFailed,
        AskError::Query(QueryError::Execution {
            message,
            sqlstate: Some(code),
        }) => classify_sqlstate(code).unwrap_or_else(|| classify_message(message)),
        AskError::Query(QueryError::Terminal { last_error, .. }) => classify_message(last_error),
        other => classify_message(&other.to_string()),
    }
}

fn render(category: ErrorCategory, raw: &str) -> String {
    match category {
        ErrorCategory::Unknown => format!(
            "An error occurred while processing your query: {}. Please try rephrasing your question or contact support if the problem persists.",
            raw
        ),
        known => known.default_message().to_string(),
    }
}

/// Plain-English message for a raw error string.
pub fn plain_english_message(message: &str) -> String {
    render(classify_message(message), message)
}

/// Plain-English message for an error.
pub fn plain_english(error: &AskError) -> String {
    render(classify(error), &error.to_string())
}

/// Build the caller-facing failure. Technical detail is kept only when
/// `debug` is set.
pub fn to_failure(
    error: &AskError,
    sql_attempted: impl Into<String>,
    attempts: Vec<SqlAttempt>,
    debug: bool,
) -> PipelineFailure {
    let category = classify(error);
    PipelineFailure {
        error: render(category, &error.to_string()),
        category,
        sql_attempted: sql_attempted.into(),
        technical: debug.then(|| error.to_string()),
        attempts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_priority() {
        let cases = [
            ("relation \"foo\" does not exist", ErrorCategory::TableNotFound),
            ("column \"nme\" does not exist", ErrorCategory::ColumnNotFound),
            ("column \"table_id\" does not exist", ErrorCategory::ColumnNotFound),
            ("syntax error at or near \"FORM\"", ErrorCategory::SyntaxError),
            ("could not connect to server", ErrorCategory::ConnectionFailed),
            ("permission denied for table salaries", ErrorCategory::PermissionDenied),
            ("canceling statement due to statement timeout", ErrorCategory::Timeout),
            ("429 Resource has been exhausted", ErrorCategory::RateLimited),
            ("division by zero", ErrorCategory::Unknown),
        ];
        for (message, expected) in cases {
            assert_eq!(classify_message(message), expected, "{}", message);
        }
    }

    #[test]
    fn test_variant_classification() {
        let exhausted = AskError::Llm(LlmError::RetriesExhausted {
            provider: "gemini".to_string(),
            attempts: 4,
            last_error: "quota".to_string(),
        });
        assert_eq!(classify(&exhausted), ErrorCategory::RateLimited);

        let sqlstate = AskError::Query(QueryError::Execution {
            message: "whatever the server said".to_string(),
            sqlstate: Some("42P01".to_string()),
        });
        assert_eq!(classify(&sqlstate), ErrorCategory::TableNotFound);

        let terminal = AskError::Query(QueryError::Terminal {
            attempts_made: 3,
            last_error: "column \"x\" does not exist".to_string(),
            attempts: vec![],
        });
        assert_eq!(classify(&terminal), ErrorCategory::ColumnNotFound);
    }

    #[test]
    fn test_unknown_embeds_raw_error() {
        let message = plain_english_message("division by zero");
        assert_eq!(
            message,
            "An error occurred while processing your query: division by zero. Please try rephrasing your question or contact support if the problem persists."
        );
    }

    #[test]
    fn test_failure_debug_detail() {
        let error = AskError::Query(QueryError::Connectivity {
            reason: "refused".to_string(),
        });
        let quiet = to_failure(&error, "SELECT 1;", vec![], false);
        assert_eq!(quiet.category, ErrorCategory::ConnectionFailed);
        assert_eq!(quiet.error, ErrorCategory::ConnectionFailed.default_message());
        assert_eq!(quiet.sql_attempted, "SELECT 1;");
        assert_eq!(quiet.technical, None);

        let verbose = to_failure(&error, "SELECT 1;", vec![], true);
        assert!(verbose.technical.unwrap().contains("refused"));
    }
}
