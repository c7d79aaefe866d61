//! Follow-up question suggestions.

use askdb_llm::TextGenerator;
use askdb_sql::{analyze_intent, IntentKind};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, warn};

const MAX_SUGGESTIONS: usize = 5;

const QUESTION_WORDS: [&str; 10] = [
    "what", "how", "show", "list", "find", "get", "which", "where", "when", "who",
];

// Questions with these words already point at specific columns.
const COLUMN_WORDS: [&str; 3] = ["column", "field", "attribute"];

// Result headers that describe a computation rather than stored data.
const COMPUTED_HEADERS: [&str; 6] = ["count", "sum", "avg", "min", "max", "?column?"];

static LIST_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[-*\u{2022}]|\d+[.)])\s*").expect("LIST_MARKER regex is invalid"));

/// Inputs describing the exchange that just completed.
#[derive(Debug, Clone, Copy)]
pub struct SuggestionRequest<'a> {
    pub question: &'a str,
    pub sql: &'a str,
    pub answer: &'a str,
    /// e.g. "5 results" or "No results"
    pub rows_summary: &'a str,
    pub table_details: &'a str,
}

fn suggestion_prompt(req: &SuggestionRequest<'_>) -> String {
    let tables: String = if req.table_details.is_empty() {
        "See the database schema".to_string()
    } else {
        req.table_details.chars().take(500).collect()
    };
    format!(
        "Based on the user's question and the query results, suggest 3-5 related questions they might want to ask next.

User's Question: {}

SQL Query Used: {}

Answer/Result: {}

Results Summary: {}

Available Tables:
{}

Guidelines for suggestions:
1. Suggest questions that explore related aspects of the data
2. If the query returned results, suggest drilling down or filtering further
3. If the query returned no results, suggest alternative approaches
4. Suggest aggregations, comparisons, or different perspectives
5. Keep suggestions concise and actionable
6. Make suggestions specific to the tables listed above

Return only the suggested questions, one per line, no numbering or bullets.
Format: Just the question text, one per line.",
        req.question, req.sql, req.answer, req.rows_summary, tables
    )
}

/// Inputs for suggesting columns worth querying next.
#[derive(Debug, Clone, Copy)]
pub struct ColumnSuggestionRequest<'a> {
    pub question: &'a str,
    pub table_details: &'a str,
    /// Headers of the result that answered the question
    pub result_columns: &'a [String],
}

fn column_prompt(req: &ColumnSuggestionRequest<'_>) -> String {
    let tables: String = req.table_details.chars().take(500).collect();
    format!(
        "Based on the user's question, suggest 3-5 relevant columns they might want to query.

User Question: {}

Available Tables:
{}

Columns Already Returned: {}

For the user's question, suggest specific column names (with descriptions) that would be most relevant.
Format as: \"ColumnName (Description)\"

Return only the suggestions, one per line, no numbering:",
        req.question,
        tables,
        req.result_columns.join(", ")
    )
}

/// True when the question already names a column, either by saying so or by
/// using a stored column's name as a word.
pub fn names_columns(question: &str, result_columns: &[String]) -> bool {
    let lower = question.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|w| !w.is_empty())
        .collect();
    COLUMN_WORDS.iter().any(|w| lower.contains(w))
        || stored_columns(result_columns).any(|column| words.contains(&column.to_lowercase().as_str()))
}

fn stored_columns(columns: &[String]) -> impl Iterator<Item = &String> {
    columns
        .iter()
        .filter(|c| !COMPUTED_HEADERS.contains(&c.to_lowercase().as_str()))
}

/// Non-empty lines of a model reply, list markers stripped, at most five.
pub fn parse_column_suggestions(reply: &str) -> Vec<String> {
    reply
        .lines()
        .map(|line| LIST_MARKER.replace(line.trim(), "").trim().to_string())
        .filter(|line| !line.is_empty())
        .take(MAX_SUGGESTIONS)
        .collect()
}

/// Column suggestions used when the model is unavailable: the stored
/// columns the result returned, in order.
pub fn keyword_column_suggestions(result_columns: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    for column in stored_columns(result_columns) {
        push_unique(&mut out, column);
    }
    out.truncate(MAX_SUGGESTIONS);
    out
}

fn looks_like_question(line: &str) -> bool {
    let lower = line.to_lowercase();
    line.ends_with('?') || QUESTION_WORDS.iter().any(|w| lower.contains(w))
}

/// Question-like lines of a model reply, list markers stripped, at most five.
pub fn parse_suggestions(reply: &str) -> Vec<String> {
    reply
        .lines()
        .map(|line| LIST_MARKER.replace(line.trim(), "").trim().to_string())
        .filter(|line| !line.is_empty() && looks_like_question(line))
        .take(MAX_SUGGESTIONS)
        .collect()
}

fn push_unique(out: &mut Vec<String>, suggestion: &str) {
    if !out.iter().any(|s| s == suggestion) {
        out.push(suggestion.to_string());
    }
}

/// Heuristic suggestions used when the model is unavailable.
pub fn keyword_suggestions(question: &str, sql: &str, answer: &str) -> Vec<String> {
    let intent = analyze_intent(question, sql);
    let answer_lower = answer.to_lowercase();
    let no_data = answer_lower.contains("no results") || answer_lower.contains("no data");
    let mut out = Vec::new();

    if intent.kind == IntentKind::Count {
        push_unique(&mut out, "Show me the breakdown by category");
        push_unique(&mut out, "Show me more details about these results");
    }
    if matches!(intent.kind, IntentKind::Sum | IntentKind::Average) {
        push_unique(&mut out, "How does this compare across groups?");
    }
    if let Some(table) = intent.tables.first() {
        if intent.tables.len() == 1 && !intent.has_joins {
            push_unique(&mut out, &format!("What other information is in {}?", table));
        }
    }

    if no_data {
        push_unique(&mut out, "Try broadening the filters");
        push_unique(&mut out, "Check if the data exists in other tables");
        push_unique(&mut out, "List the available tables");
    } else {
        if !intent.has_grouping {
            push_unique(&mut out, "Group these results by a category");
        }
        if !intent.has_ordering {
            push_unique(&mut out, "Show me the top 10 results");
            push_unique(&mut out, "Sort by the highest values");
        }
    }

    if out.is_empty() {
        out = vec![
            "Show me more details".to_string(),
            "What are the top 10 results?".to_string(),
            "Break this down by category".to_string(),
            "Compare with other groups".to_string(),
        ];
    }
    out.truncate(MAX_SUGGESTIONS);
    out
}

/// Generates follow-up questions after a successful answer.
#[derive(Clone)]
pub struct SuggestionGenerator {
    llm: Arc<dyn TextGenerator>,
}

impl SuggestionGenerator {
    pub fn new(llm: Arc<dyn TextGenerator>) -> Self {
        Self { llm }
    }

    /// Never fails; model errors and unusable replies fall back to
    /// [`keyword_suggestions`].
    pub async fn suggest(&self, req: SuggestionRequest<'_>) -> Vec<String> {
        match self.llm.generate_text(&suggestion_prompt(&req)).await {
            Ok(reply) => {
                let parsed = parse_suggestions(&reply);
                if parsed.is_empty() {
                    debug!("no usable suggestions in reply, using keyword fallback");
                    keyword_suggestions(req.question, req.sql, req.answer)
                } else {
                    parsed
                }
            }
            Err(e) => {
                warn!(error = %e, "suggestion generation failed, using keyword fallback");
                keyword_suggestions(req.question, req.sql, req.answer)
            }
        }
    }
}

impl SuggestionGenerator {
    /// Columns worth asking about next. Empty when the question already
    /// names its columns; otherwise falls back to
    /// [`keyword_column_suggestions`] on model errors or empty replies.
    pub async fn suggest_columns(&self, req: ColumnSuggestionRequest<'_>) -> Vec<String> {
        if names_columns(req.question, req.result_columns) {
            debug!("question names its columns, skipping column suggestions");
            return Vec::new();
        }
        match self.llm.generate_text(&column_prompt(&req)).await {
            Ok(reply) => {
                let parsed = parse_column_suggestions(&reply);
                if parsed.is_empty() {
                    keyword_column_suggestions(req.result_columns)
                } else {
                    parsed
                }
            }
            Err(e) => {
                warn!(error = %e, "column suggestion failed, using result columns");
                keyword_column_suggestions(req.result_columns)
            }
        }
    }
}

impl std::fmt::Debug for SuggestionGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuggestionGenerator")
            .field("provider", &self.llm.provider_id())
            .finish()
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_parsed_suggestions_capped(lines in prop::collection::vec("[a-zA-Z ?*-]{0,40}", 0..20)) {
            let parsed = parse_suggestions(&lines.join("\n"));

            prop_assert!(parsed.len() <= MAX_SUGGESTIONS);
            prop_assert!(parsed.iter().all(|s| !s.is_empty() && s == s.trim()));
        }

        #[test]
        fn prop_keyword_suggestions_capped(question in "[a-z ]{0,60}", answer in "[a-z ]{0,60}") {
            let suggestions = keyword_suggestions(&question, "SELECT * FROM orders;", &answer);
            prop_assert!(!suggestions.is_empty());
            prop_assert!(suggestions.len() <= MAX_SUGGESTIONS);
        }
    }
}
