//! Table references in generated SQL.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// `FROM`/`JOIN` followed by a possibly quoted, possibly schema-qualified name.
static TABLE_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)\b(from|join)\s+((?:"[^"]+"|[a-z_][\w$]*)(?:\s*\.\s*(?:"[^"]+"|[a-z_][\w$]*))*)"#,
    )
    .expect("TABLE_REFERENCE is invalid")
});

/// Last segment of a dotted name with quotes removed.
fn bare_name(qualified: &str) -> String {
    qualified
        .rsplit('.')
        .next()
        .unwrap_or(qualified)
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .to_string()
}

/// Bare lower-cased table names after every `FROM` and `JOIN`, in order of
/// first appearance, without duplicates.
pub fn referenced_tables(sql: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    TABLE_REFERENCE
        .captures_iter(sql)
        .filter_map(|caps| caps.get(2))
        .map(|m| bare_name(m.as_str()).to_lowercase())
        .filter(|name| !name.is_empty() && seen.insert(name.clone()))
        .collect()
}

/// Referenced tables absent from `valid` (which holds lower-cased names).
pub fn unknown_tables(sql: &str, valid: &HashSet<String>) -> Vec<String> {
    referenced_tables(sql)
        .into_iter()
        .filter(|t| !valid.contains(t))
        .collect()
}

/// Table named by the first `FROM`, schema and alias stripped, case preserved.
pub fn primary_table(sql: &str) -> Option<String> {
    TABLE_REFERENCE
        .captures_iter(sql)
        .find(|caps| {
            caps.get(1)
                .map(|kw| kw.as_str().eq_ignore_ascii_case("from"))
                .unwrap_or(false)
        })
        .and_then(|caps| caps.get(2))
        .map(|m| bare_name(m.as_str()))
        .filter(|name| !name.is_empty())
}
