//! SQL extraction from raw model output.

use once_cell::sync::Lazy;
use regex::Regex;

/// Fenced code block, optionally labeled; captures the body.
static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?:SQLQuery|sql|SQL|mysql|postgresql)?\s*(.*?)\s*```")
        .expect("FENCED_BLOCK is invalid")
});

/// One or more leading label prefixes such as `SQLQuery:`.
static LABEL_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:(?:SQL\s*Query|SQLQuery|MySQL|PostgreSQL|SQL)\s*:\s*)+")
        .expect("LABEL_PREFIX is invalid")
});

/// First `SELECT ... ;` statement, shortest match.
static SELECT_STATEMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)SELECT.*?;").expect("SELECT_STATEMENT is invalid"));

static BACKTICKED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"`([^`]*)`").expect("BACKTICKED is invalid"));

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("WHITESPACE is invalid"));

static STATEMENT_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(?:SELECT|WITH)\b").expect("STATEMENT_START is invalid"));

/// Isolate the SQL statement in a model reply.
///
/// Steps, each applied to the previous output:
/// 1. unwrap fenced code blocks (optionally labeled sql/SQL/SQLQuery/mysql/postgresql)
/// 2. strip leading label prefixes (`SQL Query:`, `SQLQuery:`, `MySQL:`, `PostgreSQL:`, `SQL:`)
/// 3. keep only the first `SELECT ... ;` if one exists
/// 4. unwrap backticked identifiers
/// 5. collapse whitespace runs and trim
///
/// Never fails. Input with no recognizable statement comes back
/// whitespace-normalized; an empty string means nothing usable was found.
pub fn extract_sql(raw: &str) -> String {
    let text = FENCED_BLOCK.replace_all(raw, "${1}");
    let text = LABEL_PREFIX.replace(text.trim_start(), "");

    let text = match SELECT_STATEMENT.find(&text) {
        Some(m) => m.as_str().to_string(),
        None => text.into_owned(),
    };

    let text = BACKTICKED.replace_all(&text, "${1}");
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}

/// True for statements that start with `SELECT` or `WITH`.
pub fn is_select_statement(sql: &str) -> bool {
    STATEMENT_START.is_match(sql)
}
