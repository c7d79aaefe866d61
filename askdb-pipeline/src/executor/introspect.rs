//! Build a schema catalog from `information_schema`.

use super::ConnectionProvider;
use askdb_core::{AskResult, SchemaCatalog, SchemaEntry, SchemaError};
use std::collections::BTreeMap;
use tracing::info;

const TABLES_SQL: &str = "SELECT table_name, table_type FROM information_schema.tables \
     WHERE table_schema = $1 AND table_type IN ('BASE TABLE', 'VIEW') \
     ORDER BY table_name";

const COLUMNS_SQL: &str = "SELECT table_name, column_name FROM information_schema.columns \
     WHERE table_schema = $1 ORDER BY table_name, ordinal_position";

fn load_failed(reason: impl std::fmt::Display) -> SchemaError {
    SchemaError::CatalogLoadFailed {
        reason: reason.to_string(),
    }
}

/// Placeholder description: kind of relation plus its columns.
fn describe(table_type: &str, columns: &[String]) -> String {
    let kind = if table_type == "VIEW" { "View" } else { "Table" };
    if columns.is_empty() {
        kind.to_string()
    } else {
        format!("{}. Columns: {}", kind, columns.join(", "))
    }
}

/// Read tables and views of `schema`. Query failures are
/// `CatalogLoadFailed`; a schema without tables is `EmptyCatalog`.
pub async fn introspect_catalog(provider: &dyn ConnectionProvider, schema: &str) -> AskResult<SchemaCatalog> {
    let conn = provider.connect().await.map_err(load_failed)?;
    let tables = conn
        .query(TABLES_SQL, &[&schema])
        .await
        .map_err(load_failed)?;
    let column_rows = conn
        .query(COLUMNS_SQL, &[&schema])
        .await
        .map_err(load_failed)?;

    let mut columns: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for row in &column_rows {
        let table: String = row.try_get(0).map_err(load_failed)?;
        let column: String = row.try_get(1).map_err(load_failed)?;
        columns.entry(table).or_default().push(column);
    }

    let mut entries = Vec::with_capacity(tables.len());
    for row in &tables {
        let name: String = row.try_get(0).map_err(load_failed)?;
        let table_type: String = row.try_get(1).map_err(load_failed)?;
        let description = describe(&table_type, columns.get(&name).map(Vec::as_slice).unwrap_or(&[]));
        entries.push(SchemaEntry::new(name, description));
    }

    info!(schema, tables = entries.len(), "introspected schema catalog");
    SchemaCatalog::new(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe() {
        assert_eq!(describe("BASE TABLE", &[]), "Table");
        assert_eq!(
            describe("VIEW", &["id".to_string(), "name".to_string()]),
            "View. Columns: id, name"
        );
    }
}
