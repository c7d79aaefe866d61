//! askdb SQL - Text Heuristics
//!
//! Pure functions over SQL-ish text produced by a language model. Nothing in
//! this crate parses SQL properly: table and column detection is regex based
//! and approximate (subqueries, CTE names and `EXTRACT(x FROM col)` can all
//! confuse it). Callers treat every answer as a best-effort hint.

pub mod extract;
pub mod hints;
pub mod intent;
pub mod tables;

pub use extract::{extract_sql, is_select_statement};
pub use hints::{distinct_column_hint, DistinctHint};
pub use intent::{analyze_intent, IntentKind, QueryIntent};
pub use tables::{primary_table, referenced_tables, unknown_tables};
