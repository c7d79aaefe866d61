//! Compact result summaries stored on turns.

use askdb_core::{format_row, format_rows, Row};

/// One-line rendering of a result set for later context.
pub fn summarize_rows(rows: &[Row]) -> String {
    match rows.len() {
        0 => "No results returned".to_string(),
        1 => format!("Single result: {}", format_row(&rows[0])),
        n if n <= 5 => format!("{} results: {}", n, format_rows(rows)),
        n => format!("{} results. First few: {}", n, format_rows(&rows[..3])),
    }
}
