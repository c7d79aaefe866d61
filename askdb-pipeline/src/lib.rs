//! askdb Pipeline - Natural Language to SQL
//!
//! Wires the stages that answer a question against a relational database:
//!
//! 1. context: previous turns and the anchor table ([`askdb_context`])
//! 2. table selection (full path only)
//! 3. SQL generation and schema validation
//! 4. execution with self-correction
//! 5. answer composition and follow-up suggestions
//!
//! [`Pipeline::answer`] is the entry point. Everything external sits behind
//! a trait: [`askdb_llm::TextGenerator`] for the model,
//! [`SqlExecutor`] and [`ConnectionProvider`] for the database.

pub mod composer;
pub mod correction;
pub mod errors;
pub mod executor;
pub mod generator;
pub mod orchestrator;
pub mod prompts;
pub mod selector;
pub mod suggestions;
pub mod telemetry;
pub mod validator;

pub use composer::{result_text, AnswerComposer};
pub use correction::{CorrectionFailure, CorrectionOutcome, SelfCorrectionLoop};
pub use errors::{classify, classify_message, plain_english, plain_english_message, to_failure};
pub use executor::{
    introspect_catalog, scalar_result, ConnectionProvider, DbConfig, DirectConnector,
    MockExecutor, PgConnection, PooledConnector, PostgresExecutor, SqlExecutor,
};
pub use generator::SqlGenerator;
pub use orchestrator::{is_simple_question, Pipeline, SIMPLE_QUESTION_KEYWORDS};
pub use prompts::{FewShotExample, PromptSet, NO_DATA_SENTINEL};
pub use selector::{parse_table_list, TableSelector};
pub use suggestions::{
    keyword_column_suggestions, keyword_suggestions, parse_suggestions, ColumnSuggestionRequest,
    SuggestionGenerator, SuggestionRequest,
};
pub use telemetry::{init_tracing, LogFormat};
pub use validator::{SchemaValidator, ValidatedSql};
