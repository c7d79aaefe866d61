//! Fuzz target for SQL extraction from model replies.
//!
//! Extraction must never panic, and its output is always whitespace-normalized.
//!
//! Run with: cargo +nightly fuzz run extract_fuzz -- -max_total_time=60

#![no_main]

use askdb_sql::{analyze_intent, distinct_column_hint, extract_sql, is_select_statement};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(raw) = std::str::from_utf8(data) {
        let sql = extract_sql(raw);

        assert_eq!(sql, sql.trim(), "extracted SQL should be trimmed");
        assert!(!sql.contains('\n'), "extracted SQL should be on one line");
        assert!(!sql.contains("  "), "whitespace runs should be collapsed");

        // Downstream heuristics run on whatever extraction returns
        let _ = is_select_statement(&sql);
        let _ = distinct_column_hint(&sql);
        let _ = analyze_intent(raw, &sql);
    }
});
