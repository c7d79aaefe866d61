//! Schema Validator: catch hallucinated table names before execution.
//!
//! Table detection is regex based (see `askdb_sql::referenced_tables`), so
//! this is a best-effort guard. When regeneration cannot fix the SQL the
//! latest statement is passed on anyway and execution reports the error.

use crate::generator::SqlGenerator;
use askdb_core::{SchemaCatalog, SchemaError, SqlAttempt};
use askdb_sql::unknown_tables;
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of validation. `sql` is what should be executed next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSql {
    pub sql: String,
    /// Regeneration requests that were made
    pub regenerations: u32,
    /// Unknown tables still referenced by `sql`; empty when it validated
    pub unresolved: Vec<String>,
    /// Rejected statements, one per regeneration
    pub attempts: Vec<SqlAttempt>,
}

impl ValidatedSql {
    pub fn is_valid(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// `['a', 'b']` rendering of offending names.
fn render_invalid(tables: &[String]) -> String {
    let quoted: Vec<String> = tables.iter().map(|t| format!("'{}'", t)).collect();
    format!("[{}]", quoted.join(", "))
}

#[derive(Debug, Clone)]
pub struct SchemaValidator {
    generator: SqlGenerator,
    catalog: Arc<SchemaCatalog>,
    max_regenerations: u32,
}

impl SchemaValidator {
    pub fn new(generator: SqlGenerator, catalog: Arc<SchemaCatalog>, max_regenerations: u32) -> Self {
        Self {
            generator,
            catalog,
            max_regenerations,
        }
    }

    /// Corrective table details for regeneration `n` (1-based). The first
    /// keeps conversation context, later ones drop it.
    fn corrective_details(&self, n: u32, table_details: &str, invalid: &[String]) -> String {
        let valid = self.catalog.quoted_table_list();
        let invalid = render_invalid(invalid);
        if n == 1 {
            format!(
                "{}\n\nCRITICAL ERROR: Invalid table names detected in SQL: {}. The database only contains these tables: {}. You MUST use only these table names.\n\nRegenerate the SQL query using ONLY the valid table names listed above.",
                table_details, invalid, valid
            )
        } else {
            format!(
                "{}\n\nSTOP! You are using invalid table names: {}. The ONLY valid tables are: {}. Replace ALL table names in your SQL with these valid names.",
                table_details, invalid, valid
            )
        }
    }

    /// Check `sql` and regenerate up to `max_regenerations` times.
    ///
    /// Generator failures during regeneration end the loop early with the
    /// latest SQL; they are logged, not returned.
    pub async fn validate(
        &self,
        sql: &str,
        question: &str,
        table_details: &str,
        context: &str,
    ) -> ValidatedSql {
        let mut current = sql.to_string();
        let mut unresolved = unknown_tables(&current, self.catalog.valid_table_names());
        let mut attempts = Vec::new();
        let mut regenerations = 0;

        while !unresolved.is_empty() && regenerations < self.max_regenerations {
            regenerations += 1;
            let violation = SchemaError::InvalidTableReference {
                invalid: unresolved.clone(),
                valid: self.catalog.table_names(),
            };
            warn!(regeneration = regenerations, error = %violation, "invalid table names, regenerating");
            attempts.push(SqlAttempt::failed(regenerations, &current, violation.to_string()));

            let details = self.corrective_details(regenerations, table_details, &unresolved);
            let context = if regenerations == 1 { context } else { "" };
            match self.generator.generate(question, &details, context).await {
                Ok(regenerated) => current = regenerated,
                Err(e) => {
                    warn!(error = %e, "regeneration failed, keeping previous SQL");
                    break;
                }
            }
            unresolved = unknown_tables(&current, self.catalog.valid_table_names());
        }

        if unresolved.is_empty() {
            if regenerations > 0 {
                info!(regenerations, "table names fixed by regeneration");
            }
        } else {
            warn!(tables = ?unresolved, "proceeding with unvalidated table names");
        }

        ValidatedSql {
            sql: current,
            regenerations,
            unresolved,
            attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::PromptSet;
    use askdb_core::{LlmError, SchemaEntry};
    use askdb_llm::MockTextGenerator;

    fn validator(llm: Arc<MockTextGenerator>) -> SchemaValidator {
        let catalog = SchemaCatalog::new(vec![
            SchemaEntry::new("students", "Enrolled students"),
            SchemaEntry::new("cases", "Support cases"),
        ])
        .unwrap();
        SchemaValidator::new(
            SqlGenerator::new(llm, Arc::new(PromptSet::default())),
            Arc::new(catalog),
            2,
        )
    }

    #[tokio::test]
    async fn test_valid_sql_untouched() {
        let llm = Arc::new(MockTextGenerator::new());
        let result = validator(llm.clone())
            .validate("SELECT * FROM students s JOIN cases c ON c.sid = s.id;", "q", "T", "ctx")
            .await;

        assert!(result.is_valid());
        assert_eq!(result.regenerations, 0);
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_schema_rejection_regenerates() {
        let llm = Arc::new(MockTextGenerator::new());
        llm.push_text("SELECT COUNT(*) FROM students;");
        let result = validator(llm.clone())
            .validate("SELECT * FROM unknown_table;", "q", "T", "Previous Q: x")
            .await;

        assert!(result.is_valid());
        assert_eq!(result.sql, "SELECT COUNT(*) FROM students;");
        assert_eq!(result.regenerations, 1);
        assert_eq!(result.attempts[0].sql_text, "SELECT * FROM unknown_table;");

        let prompt = &llm.prompts()[0];
        assert!(prompt.contains("CRITICAL ERROR: Invalid table names detected in SQL: ['unknown_table']"));
        assert!(prompt.contains("'students', 'cases'"));
        assert!(prompt.contains("Conversation context (recent):\nPrevious Q: x"));
    }

    #[tokio::test]
    async fn test_stops_after_two_regenerations() {
        let llm = Arc::new(MockTextGenerator::with_default("SELECT * FROM still_wrong;"));
        let result = validator(llm.clone())
            .validate("SELECT * FROM unknown_table;", "q", "T", "Previous Q: x")
            .await;

        assert_eq!(llm.call_count(), 2);
        assert_eq!(result.regenerations, 2);
        assert_eq!(result.sql, "SELECT * FROM still_wrong;");
        assert_eq!(result.unresolved, vec!["still_wrong"]);

        let second = &llm.prompts()[1];
        assert!(second.contains("STOP! You are using invalid table names: ['still_wrong']"));
        assert!(!second.contains("Conversation context"));
    }

    #[tokio::test]
    async fn test_generator_failure_keeps_latest_sql() {
        let llm = Arc::new(MockTextGenerator::new());
        llm.push_error(LlmError::ProviderNotConfigured);
        let result = validator(llm)
            .validate("SELECT * FROM unknown_table;", "q", "T", "")
            .await;

        assert_eq!(result.sql, "SELECT * FROM unknown_table;");
        assert!(!result.is_valid());
        assert_eq!(result.attempts.len(), 1);
    }
}
