//! Fuzz target for table reference extraction.
//!
//! Run with: cargo +nightly fuzz run tables_fuzz -- -max_total_time=60

#![no_main]

use askdb_sql::{primary_table, referenced_tables, unknown_tables};
use libfuzzer_sys::fuzz_target;
use std::collections::HashSet;

fuzz_target!(|data: &[u8]| {
    if let Ok(sql) = std::str::from_utf8(data) {
        let tables = referenced_tables(sql);

        let unique: HashSet<&String> = tables.iter().collect();
        assert_eq!(unique.len(), tables.len(), "referenced tables should be deduplicated");
        assert!(tables.iter().all(|t| !t.is_empty()));

        // Nothing is known, so every reference is unknown
        assert_eq!(unknown_tables(sql, &HashSet::new()), tables);

        if let Some(primary) = primary_table(sql) {
            assert!(!primary.is_empty());
        }
    }
});
