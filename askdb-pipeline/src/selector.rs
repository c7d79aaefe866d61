//! Table selection for the full path.

use crate::prompts::PromptSet;
use askdb_core::SchemaCatalog;
use askdb_llm::TextGenerator;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, warn};

/// Asks the model which catalog tables a question needs.
#[derive(Clone)]
pub struct TableSelector {
    llm: Arc<dyn TextGenerator>,
    prompts: Arc<PromptSet>,
}

impl TableSelector {
    pub fn new(llm: Arc<dyn TextGenerator>, prompts: Arc<PromptSet>) -> Self {
        Self { llm, prompts }
    }

    /// Catalog names (verbatim casing) relevant to `question`.
    ///
    /// Never fails: a failed call or a reply naming no known table selects
    /// the whole catalog.
    pub async fn select(&self, catalog: &SchemaCatalog, question: &str) -> Vec<String> {
        let prompt = self
            .prompts
            .table_selection_prompt(catalog.table_details_text(), question);

        let reply = match self.llm.generate_text(&prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "table selection failed, using full catalog");
                return catalog.table_names();
            }
        };

        let selected = parse_table_list(&reply, catalog);
        if selected.is_empty() {
            debug!(reply = %reply, "no known tables in selection reply, using full catalog");
            return catalog.table_names();
        }
        debug!(tables = ?selected, "selected tables");
        selected
    }
}

static LIST_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:[-*\u{2022}]|\d+[.)])\s+").expect("LIST_MARKER regex is invalid"));

fn unquote(token: &str) -> &str {
    token.trim().trim_matches(|c| c == '"' || c == '\'' || c == '`')
}

fn normalize_token(token: &str) -> String {
    let token = LIST_MARKER.replace(token, "");
    let token = unquote(&token);
    let bare = token.rsplit('.').next().unwrap_or(token);
    unquote(bare).to_lowercase()
}

/// Intersect a comma/newline separated reply with the catalog, keeping
/// reply order and dropping duplicates.
pub fn parse_table_list(reply: &str, catalog: &SchemaCatalog) -> Vec<String> {
    let mut selected: Vec<String> = Vec::new();
    for token in reply.split(|c| c == ',' || c == '\n') {
        let name = normalize_token(token);
        if name.is_empty() {
            continue;
        }
        if let Some(canonical) = catalog.canonical_name(&name) {
            if !selected.iter().any(|s| s == canonical) {
                selected.push(canonical.to_string());
            }
        }
    }
    selected
}

impl std::fmt::Debug for TableSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableSelector")
            .field("provider", &self.llm.provider_id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use askdb_core::{LlmError, SchemaEntry};
    use askdb_llm::MockTextGenerator;

    fn catalog() -> SchemaCatalog {
        SchemaCatalog::new(vec![
            SchemaEntry::new("Students", "Enrolled students"),
            SchemaEntry::new("cases", "Support cases"),
            SchemaEntry::new("staff", "Employees"),
        ])
        .unwrap()
    }

    #[test]
    fn test_parse_table_list_normalizes() {
        let reply = "`public`.`students`, \"CASES\"\n- ghosts\n1. cases";
        assert_eq!(parse_table_list(reply, &catalog()), vec!["Students", "cases"]);
    }

    #[test]
    fn test_parse_table_list_nothing_known() {
        assert!(parse_table_list("none of them", &catalog()).is_empty());
    }

    #[tokio::test]
    async fn test_select_falls_back_to_full_catalog() {
        let llm = Arc::new(MockTextGenerator::new());
        llm.push_text("unicorns");
        llm.push_error(LlmError::ProviderNotConfigured);
        let selector = TableSelector::new(llm, Arc::new(PromptSet::default()));
        let catalog = catalog();

        assert_eq!(selector.select(&catalog, "q").await, catalog.table_names());
        assert_eq!(selector.select(&catalog, "q").await, catalog.table_names());
    }

    #[tokio::test]
    async fn test_select_uses_reply() {
        let llm = Arc::new(MockTextGenerator::new());
        llm.push_text("staff");
        let selector = TableSelector::new(llm.clone(), Arc::new(PromptSet::default()));

        let tables = selector.select(&catalog(), "who works here?").await;
        assert_eq!(tables, vec!["staff"]);
        assert!(llm.prompts()[0].contains("Table Name: Students"));
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use askdb_core::SchemaEntry;
    use proptest::prelude::*;
    use std::collections::HashSet;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Whatever the model says, selection only yields catalog tables, once each.
        #[test]
        fn prop_selection_within_catalog(reply in "[a-zA-Z_ ,.`\"\n*-]{0,120}") {
            let catalog = SchemaCatalog::new(vec![
                SchemaEntry::new("orders", "Orders"),
                SchemaEntry::new("Customers", "Customers"),
            ])
            .unwrap();

            let tables = parse_table_list(&reply, &catalog);
            let unique: HashSet<&String> = tables.iter().collect();

            prop_assert_eq!(unique.len(), tables.len());
            for table in &tables {
                prop_assert!(catalog.table_names().contains(table));
            }
        }
    }
}
