//! Prompt templates.
//!
//! Every prompt the pipeline sends is assembled here. The domain-specific
//! parts (generation rules, table-selection guidance, answer tone and the
//! few-shot examples) live in a [`PromptSet`] that can be loaded from TOML;
//! the built-in defaults are deliberately schema-agnostic.

use askdb_core::{AskResult, ConfigError};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::path::Path;

static ANSWER_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{(question|result)\}").expect("ANSWER_PLACEHOLDER regex is invalid"));

/// Result text sent to the answer prompt when a query returned no rows.
pub const NO_DATA_SENTINEL: &str = "No data returned from the database query.";

const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are an expert SQL query generator for PostgreSQL. Generate syntactically correct queries.

DATABASE SCHEMA OVERVIEW:
- Tables are defined in the TABLES section below. Use ONLY the table names provided in that section.
- Column types may be TEXT even when they hold numbers; cast before aggregating.

IMPORTANT RULES:
1. **Always use table aliases** for clarity.
2. **Numeric casting**: cast TEXT columns holding numbers with `NULLIF(col, '')::numeric` so blanks do not break aggregation.
3. **Joins**: join on the documented key columns only; never invent join keys.
4. **Deleted rows**: when a table has a soft-delete flag or timestamp, exclude deleted rows unless the user asks for them.
5. **Use DISTINCT** when necessary to avoid duplicates.
6. **Limit results** to top {top_k} unless user specifies otherwise.
7. **Table anchoring**: For follow-ups referring to \"them/those/it\", stay on the same table unless explicitly told to switch.

QUERY PATTERNS:
- Simple lookup: SELECT * FROM table WHERE condition
- Aggregations: Use GROUP BY with aggregate functions (COUNT, SUM, AVG)

Return a single SQL statement terminated by a semicolon.";

const DEFAULT_TABLE_SELECTION_INSTRUCTION: &str = "You are a database schema expert. Analyze the user's question and return ALL SQL tables that might be relevant.

TABLE SELECTION GUIDELINES:
1. **Direct mentions**: If the user names a table explicitly, include that table.
2. **Related data**: Include lookup tables needed to turn codes or ids into readable names.
3. If uncertain, include extra tables rather than missing required ones.

Return the names of ALL tables that might be needed, separated by commas or newlines, and nothing else.";

const DEFAULT_ANSWER_INSTRUCTION: &str = "You are a helpful database assistant. Answer the user's question based on the query results.

User Question: {question}

Database Query Result: {result}

Provide a clear, concise answer to the user's question. Format the data nicely using markdown (**bold** for important terms, *italic* for emphasis). If the result shows no data, explain that clearly.";

/// One question/SQL pair shown to the model as a style example.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FewShotExample {
    pub input: String,
    pub query: String,
}

impl FewShotExample {
    pub fn new(input: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            query: query.into(),
        }
    }
}

fn default_examples() -> Vec<FewShotExample> {
    vec![
        FewShotExample::new("How many rows are in orders?", "SELECT COUNT(*) FROM orders;"),
        FewShotExample::new("Show the first 5 rows from customers", "SELECT * FROM customers LIMIT 5;"),
        FewShotExample::new(
            "What is the total amount of all orders?",
            "SELECT SUM(NULLIF(o.amount, '')::numeric) AS total FROM orders AS o;",
        ),
        FewShotExample::new(
            "List distinct customer cities",
            "SELECT DISTINCT c.city FROM customers AS c ORDER BY c.city;",
        ),
        FewShotExample::new(
            "Count orders by customer name",
            "SELECT c.name, COUNT(*) AS order_count FROM orders AS o JOIN customers AS c ON o.customer_id = c.id GROUP BY c.name ORDER BY order_count DESC;",
        ),
    ]
}

/// Configurable prompt text.
///
/// `system_instruction` may contain `{top_k}`; `answer_instruction` must
/// contain `{question}` and `{result}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptSet {
    pub system_instruction: String,
    pub table_selection_instruction: String,
    pub answer_instruction: String,
    pub examples: Vec<FewShotExample>,
    pub top_k: usize,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            table_selection_instruction: DEFAULT_TABLE_SELECTION_INSTRUCTION.to_string(),
            answer_instruction: DEFAULT_ANSWER_INSTRUCTION.to_string(),
            examples: default_examples(),
            top_k: 100,
        }
    }
}

fn invalid_prompts(value: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field: "prompts".to_string(),
        value: value.into(),
        reason: reason.into(),
    }
}

impl PromptSet {
    /// Parse a prompt file. Missing keys keep their defaults.
    pub fn from_toml_str(contents: &str) -> AskResult<Self> {
        let prompts: Self =
            toml::from_str(contents).map_err(|e| invalid_prompts("<toml>", e.to_string()))?;
        prompts.validate()?;
        Ok(prompts)
    }

    pub fn from_path(path: impl AsRef<Path>) -> AskResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| invalid_prompts(path.display().to_string(), e.to_string()))?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> AskResult<()> {
        for placeholder in ["{question}", "{result}"] {
            if !self.answer_instruction.contains(placeholder) {
                return Err(invalid_prompts(
                    "answer_instruction",
                    format!("answer_instruction must contain {}", placeholder),
                )
                .into());
            }
        }
        if self.top_k == 0 {
            return Err(invalid_prompts("top_k", "top_k must be greater than 0").into());
        }
        Ok(())
    }

    /// System instruction with `{top_k}` filled in.
    pub fn system_prompt(&self) -> String {
        self.system_instruction
            .replace("{top_k}", &self.top_k.to_string())
    }

    fn examples_text(&self) -> String {
        self.examples
            .iter()
            .map(|ex| format!("Q: {}\nSQLQuery:\n{}", ex.input, ex.query))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Prompt for the SQL generator. The context block is omitted when empty.
    pub fn generation_prompt(&self, question: &str, table_details: &str, context: &str) -> String {
        let mut prompt = format!("{}\n\nTABLES:\n{}", self.system_prompt(), table_details);
        if context.trim().is_empty() {
            prompt.push_str("\n\n");
        } else {
            prompt.push_str("\n\nConversation context (recent):\n");
            prompt.push_str(context);
            prompt.push_str("\n\n");
        }
        prompt.push_str("Examples:\n");
        prompt.push_str(&self.examples_text());
        prompt.push_str("\n\nUser Question: ");
        prompt.push_str(question);
        prompt.push_str("\nSQLQuery:");
        prompt
    }

    pub fn table_selection_prompt(&self, table_details: &str, question: &str) -> String {
        format!(
            "{}\n\nDATABASE TABLES:\n{}\nUser Question: {}\n\nRelevant tables:",
            self.table_selection_instruction, table_details, question
        )
    }

    /// Answer prompt; `result` is the rendered rows or [`NO_DATA_SENTINEL`].
    ///
    /// Placeholders are filled in one pass, so braces inside the question or
    /// the result text are left alone.
    pub fn answer_prompt(&self, question: &str, result: &str) -> String {
        ANSWER_PLACEHOLDER
            .replace_all(&self.answer_instruction, |caps: &Captures<'_>| match &caps[1] {
                "question" => question.to_string(),
                _ => result.to_string(),
            })
            .into_owned()
    }

    /// Prompt asking for a corrected statement after an execution failure.
    pub fn correction_prompt(
        &self,
        question: &str,
        failed_sql: &str,
        error_message: &str,
        table_details: &str,
    ) -> String {
        let table_hint: String = table_details.chars().take(200).collect();
        format!(
            "You are a SQL expert. The following query failed with an error. Analyze the error and provide a CORRECTED query.

Original Question: {question}

Failed SQL Query:
{failed_sql}

Error Message:
{error_message}

Common Issues to Check:
1. Column doesn't exist - verify column names match the schema exactly (case-sensitive, use quotes if needed)
2. Table doesn't exist - check table names are correct (use only tables from: {table_hint})
3. Syntax errors - fix SQL syntax (missing commas, quotes, parentheses)
4. Type mismatches - ensure correct data types (cast TEXT to numeric with NULLIF where needed)
5. JOIN errors - verify JOIN conditions and table aliases
6. Missing quotes - column names with special chars or mixed case need double quotes

Provide ONLY the corrected SQL query, no explanations:"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_prompt_layout() {
        let prompts = PromptSet {
            system_instruction: "SYS top {top_k}".to_string(),
            examples: vec![FewShotExample::new("q1", "SELECT 1;")],
            top_k: 7,
            ..PromptSet::default()
        };

        let without = prompts.generation_prompt("how many?", "Table Name: t\n", "");
        assert_eq!(
            without,
            "SYS top 7\n\nTABLES:\nTable Name: t\n\n\nExamples:\nQ: q1\nSQLQuery:\nSELECT 1;\n\nUser Question: how many?\nSQLQuery:"
        );

        let with = prompts.generation_prompt("and them?", "T", "Previous Q: x");
        assert!(with.contains("\n\nConversation context (recent):\nPrevious Q: x\n\nExamples:"));
        assert!(with.ends_with("User Question: and them?\nSQLQuery:"));
    }

    #[test]
    fn test_answer_prompt_fills_placeholders() {
        let prompt = PromptSet::default().answer_prompt("How many?", NO_DATA_SENTINEL);
        assert!(prompt.contains("User Question: How many?"));
        assert!(prompt.contains("Database Query Result: No data returned from the database query."));
        assert!(!prompt.contains("{result}"));
    }

    #[test]
    fn test_answer_prompt_keeps_literal_braces_in_question() {
        let prompt = PromptSet::default().answer_prompt("what does {result} mean?", "[(1)]");
        assert!(prompt.contains("User Question: what does {result} mean?"));
        assert!(prompt.contains("Database Query Result: [(1)]"));

        let prompt = PromptSet::default().answer_prompt("q", "[('{question}')]");
        assert!(prompt.contains("User Question: q\n"));
        assert!(prompt.contains("Database Query Result: [('{question}')]"));
    }

    #[test]
    fn test_correction_prompt_truncates_table_hint() {
        let details = "x".repeat(500);
        let prompt = PromptSet::default().correction_prompt("q", "SELECT 1;", "boom", &details);
        assert!(prompt.contains(&format!("use only tables from: {})", "x".repeat(200))));
        assert!(!prompt.contains(&"x".repeat(201)));
        assert!(prompt.ends_with("no explanations:"));
    }

    #[test]
    fn test_toml_overrides_and_defaults() {
        let prompts = PromptSet::from_toml_str(
            r#"
top_k = 25

[[examples]]
input = "How many contacts?"
query = "SELECT COUNT(*) FROM contacts;"
"#,
        )
        .unwrap();
        assert_eq!(prompts.top_k, 25);
        assert_eq!(prompts.examples.len(), 1);
        assert_eq!(prompts.answer_instruction, DEFAULT_ANSWER_INSTRUCTION);
        assert!(prompts.system_prompt().contains("top 25"));
    }

    #[test]
    fn test_answer_instruction_requires_placeholders() {
        let err = PromptSet::from_toml_str("answer_instruction = \"just answer\"").unwrap_err();
        assert!(err.to_string().contains("{question}"));
    }

    #[test]
    fn test_malformed_toml() {
        assert!(PromptSet::from_toml_str("top_k = [").is_err());
    }
}
