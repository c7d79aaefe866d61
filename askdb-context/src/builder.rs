//! Context Builder: prior turns plus the anchor-table hint.

use crate::ConversationHistory;
use askdb_core::SchemaCatalog;
use askdb_sql::{distinct_column_hint, primary_table};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Substrings that mark a question as referring back to previous results.
///
/// Matching is plain substring search, so "it" also fires inside words
/// such as "with". Over-triggering only adds an extra hint line.
pub const PRONOUN_MARKERS: [&str; 7] = ["them", "those", "it", "that", "these", "name them", "list them"];

pub fn contains_pronoun_followup(question: &str) -> bool {
    let q = question.to_lowercase();
    PRONOUN_MARKERS.iter().any(|p| q.contains(p))
}

/// Derived, read-only view of recent conversation for one question.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConversationContext {
    /// Block embedded in the generation prompt; empty without history
    pub text: String,
    /// Catalog table used by the last successful query
    pub anchor_table: Option<String>,
    /// The question reads as a pronoun follow-up to previous results
    pub pronoun_followup: bool,
}

impl ConversationContext {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Renders the last `max_turns` turns and resolves the anchor table.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    catalog: Arc<SchemaCatalog>,
    max_turns: usize,
}

impl ContextBuilder {
    pub fn new(catalog: Arc<SchemaCatalog>, max_turns: usize) -> Self {
        Self { catalog, max_turns }
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    /// The anchor table always names a catalog table (verbatim casing) or is absent.
    fn anchor_table(&self, history: &ConversationHistory) -> Option<String> {
        let sql = history.last_sql()?;
        let table = primary_table(sql)?;
        let canonical = self.catalog.canonical_name(&table).map(str::to_string);
        if canonical.is_none() {
            debug!(table = %table, "previous table not in catalog, no anchor");
        }
        canonical
    }

    pub fn build(&self, history: &ConversationHistory, question: &str) -> ConversationContext {
        let mut lines = Vec::new();
        for turn in history.recent(self.max_turns) {
            lines.push(format!("Previous Q: {}", turn.question));
            if turn.has_sql() {
                lines.push(format!("Previous SQL: {}", turn.generated_sql));
                if let Some(hint) = distinct_column_hint(&turn.generated_sql) {
                    lines.push(hint.to_string());
                }
            }
            if !turn.result_summary.is_empty() {
                lines.push(format!("Previous Results: {}", turn.result_summary));
            }
            lines.push(format!("Previous A: {}", turn.answer));
        }
        let mut text = lines.join("\n");

        let anchor_table = self.anchor_table(history);
        let pronoun_followup = history.last_sql().is_some() && contains_pronoun_followup(question);

        if let Some(table) = &anchor_table {
            if !history.is_empty() {
                text = format!(
                    "{}\n\nPrevious query used table: {}. For follow-up questions, continue using this table unless explicitly asked to switch.",
                    text, table
                )
                .trim()
                .to_string();
            }
            if pronoun_followup {
                text = format!(
                    "{}\nIMPORTANT: The user's question uses pronouns ('them', 'those', 'it', etc.) referring to the previous query results. Use the same table ({}) and reference the previous SQL query structure.",
                    text, table
                )
                .trim()
                .to_string();
            }
        }

        ConversationContext {
            text,
            anchor_table,
            pronoun_followup,
        }
    }
}
