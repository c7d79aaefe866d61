//! Schema catalog: the read-only registry of queryable tables.
//!
//! Loaded once at startup and shared by every pipeline run. Loading failures
//! are fatal to initialization; nothing can be answered without a schema.

use crate::{AskResult, SchemaEntry, SchemaError};
use serde::Deserialize;
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

/// In-memory table registry.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaCatalog {
    entries: Vec<SchemaEntry>,
    valid_names: HashSet<String>,
    details_text: String,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    tables: Vec<CatalogFileEntry>,
}

#[derive(Debug, Deserialize)]
struct CatalogFileEntry {
    #[serde(alias = "table_name")]
    name: String,
    #[serde(default)]
    description: String,
}

fn load_failed(reason: impl std::fmt::Display) -> SchemaError {
    SchemaError::CatalogLoadFailed {
        reason: reason.to_string(),
    }
}

fn render_details<'a>(entries: impl Iterator<Item = &'a SchemaEntry>) -> String {
    entries
        .map(|e| {
            format!(
                "Table Name: {}\nTable Description: {}\n\n",
                e.table_name, e.description
            )
        })
        .collect()
}

impl SchemaCatalog {
    /// Build a catalog. Blank names are dropped; duplicate names
    /// (case-insensitive) keep their first occurrence.
    pub fn new(entries: impl IntoIterator<Item = SchemaEntry>) -> AskResult<Self> {
        let mut valid_names = HashSet::new();
        let mut kept = Vec::new();

        for entry in entries {
            let name = entry.table_name.trim();
            if name.is_empty() {
                continue;
            }
            if valid_names.insert(name.to_lowercase()) {
                kept.push(SchemaEntry::new(name, entry.description.trim()));
            }
        }

        if kept.is_empty() {
            return Err(SchemaError::EmptyCatalog.into());
        }

        let details_text = render_details(kept.iter());
        Ok(Self {
            entries: kept,
            valid_names,
            details_text,
        })
    }

    /// Load from header-less `table_name,description` CSV. A leading
    /// `table_name` header row is tolerated.
    pub fn from_csv_reader<R: Read>(reader: R) -> AskResult<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut entries = Vec::new();
        for record in rdr.records() {
            let record = record.map_err(load_failed)?;
            let name = record.get(0).unwrap_or_default();
            if name.is_empty() || name.eq_ignore_ascii_case("table_name") {
                continue;
            }
            entries.push(SchemaEntry::new(name, record.get(1).unwrap_or_default()));
        }

        Self::new(entries)
    }

    pub fn from_csv_path(path: impl AsRef<Path>) -> AskResult<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .map_err(|e| load_failed(format!("{}: {}", path.display(), e)))?;
        Self::from_csv_reader(file)
    }

    /// Load from TOML of the form `[[tables]] name = "..." description = "..."`.
    pub fn from_toml_str(contents: &str) -> AskResult<Self> {
        let file: CatalogFile = toml::from_str(contents).map_err(load_failed)?;
        Self::new(
            file.tables
                .into_iter()
                .map(|t| SchemaEntry::new(t.name, t.description)),
        )
    }

    pub fn from_toml_path(path: impl AsRef<Path>) -> AskResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| load_failed(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&contents)
    }

    /// Pick a loader by file extension (`.toml`, anything else is CSV).
    pub fn from_path(path: impl AsRef<Path>) -> AskResult<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::from_toml_path(path),
            _ => Self::from_csv_path(path),
        }
    }

    pub fn entries(&self) -> &[SchemaEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Lower-cased table names.
    pub fn valid_table_names(&self) -> &HashSet<String> {
        &self.valid_names
    }

    /// Case-insensitive membership.
    pub fn contains(&self, table: &str) -> bool {
        self.valid_names.contains(&table.trim().to_lowercase())
    }

    /// Verbatim name as stored in the catalog.
    pub fn canonical_name(&self, table: &str) -> Option<&str> {
        let wanted = table.trim();
        self.entries
            .iter()
            .find(|e| e.table_name.eq_ignore_ascii_case(wanted))
            .map(|e| e.table_name.as_str())
    }

    /// Verbatim table names in load order.
    pub fn table_names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.table_name.clone()).collect()
    }

    /// `'a', 'b', 'c'` rendering used in corrective prompts.
    pub fn quoted_table_list(&self) -> String {
        self.entries
            .iter()
            .map(|e| format!("'{}'", e.table_name))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Schema text embedded in generation prompts.
    pub fn table_details_text(&self) -> &str {
        &self.details_text
    }

    /// Details text limited to `tables`. Falls back to the full text when
    /// none of them are known.
    pub fn restrict<S: AsRef<str>>(&self, tables: &[S]) -> String {
        let wanted: HashSet<String> = tables
            .iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .collect();
        let selected: Vec<&SchemaEntry> = self
            .entries
            .iter()
            .filter(|e| wanted.contains(&e.table_name.to_lowercase()))
            .collect();

        if selected.is_empty() {
            self.details_text.clone()
        } else {
            render_details(selected.into_iter())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AskError;

    fn catalog() -> SchemaCatalog {
        SchemaCatalog::new(vec![
            SchemaEntry::new("Students", "Enrolled students"),
            SchemaEntry::new("cases", "Support cases"),
        ])
        .unwrap()
    }

    #[test]
    fn test_empty_catalog_rejected() {
        let err = SchemaCatalog::new(Vec::new()).unwrap_err();
        assert_eq!(err, AskError::Schema(SchemaError::EmptyCatalog));
    }

    #[test]
    fn test_membership_is_case_insensitive() {
        let catalog = catalog();
        assert!(catalog.contains("students"));
        assert!(catalog.contains("STUDENTS"));
        assert!(!catalog.contains("unknown_table"));
        assert_eq!(catalog.canonical_name("students"), Some("Students"));
    }

    #[test]
    fn test_duplicates_keep_first() {
        let catalog = SchemaCatalog::new(vec![
            SchemaEntry::new("cases", "first"),
            SchemaEntry::new("CASES", "second"),
        ])
        .unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.entries()[0].description, "first");
    }

    #[test]
    fn test_details_text_layout() {
        let catalog = catalog();
        assert_eq!(
            catalog.table_details_text(),
            "Table Name: Students\nTable Description: Enrolled students\n\n\
             Table Name: cases\nTable Description: Support cases\n\n"
        );
        assert_eq!(catalog.quoted_table_list(), "'Students', 'cases'");
    }

    #[test]
    fn test_restrict_to_selection() {
        let catalog = catalog();
        let text = catalog.restrict(&["CASES"]);
        assert!(text.contains("cases"));
        assert!(!text.contains("Students"));

        let fallback = catalog.restrict(&["nope"]);
        assert_eq!(fallback, catalog.table_details_text());
    }

    #[test]
    fn test_csv_loader_skips_header_and_blank_rows() {
        let csv = "table_name,description\ncontacts,People we know\n,\nstates,\"US states, territories\"\n";
        let catalog = SchemaCatalog::from_csv_reader(csv.as_bytes()).unwrap();
        assert_eq!(catalog.table_names(), vec!["contacts", "states"]);
        assert_eq!(catalog.entries()[1].description, "US states, territories");
    }

    #[test]
    fn test_csv_loader_single_column() {
        let catalog = SchemaCatalog::from_csv_reader("contacts\n".as_bytes()).unwrap();
        assert_eq!(catalog.entries()[0].description, "");
    }

    #[test]
    fn test_toml_loader() {
        let toml = r#"
[[tables]]
name = "contacts"
description = "People"

[[tables]]
table_name = "orders"
"#;
        let catalog = SchemaCatalog::from_toml_str(toml).unwrap();
        assert_eq!(catalog.table_names(), vec!["contacts", "orders"]);
    }

    #[test]
    fn test_missing_file_is_load_failure() {
        let err = SchemaCatalog::from_path("/definitely/not/here.csv").unwrap_err();
        assert!(matches!(
            err,
            AskError::Schema(SchemaError::CatalogLoadFailed { .. })
        ));
    }
}
