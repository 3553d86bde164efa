//! Lookup resolver for LOOKUP columns.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::join_all;
use sheetdb_core::lookup::{self, LookupOption};
use sheetdb_core::schema::{ColumnId, TableId, TableSchema};

use crate::source::DataSource;

/// Loads option sets from the tables LOOKUP columns point at.
#[derive(Clone)]
pub struct LookupResolver {
    source: Arc<dyn DataSource>,
}

impl LookupResolver {
    /// Creates a resolver over the given data source.
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        Self { source }
    }

    /// Loads the options offered by a target table.
    ///
    /// The target's schema and rows load concurrently. Any load failure
    /// degrades to an empty option list; an empty target is not an error.
    ///
    /// # Arguments
    /// * `target` - Target table id
    /// * `display` - Preferred label column in the target table
    ///
    /// # Returns
    /// Options sorted ascending by key.
    pub async fn resolve(&self, target: TableId, display: Option<ColumnId>) -> Vec<LookupOption> {
        let (columns, rows) = tokio::join!(
            self.source.fetch_columns(target),
            self.source.fetch_rows(target)
        );
        let columns = match columns {
            Ok(columns) => columns,
            Err(e) => {
                tracing::warn!("Failed to load lookup target {} schema: {}", target, e);
                return Vec::new();
            }
        };
        let rows = match rows {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!("Failed to load lookup target {} rows: {}", target, e);
                return Vec::new();
            }
        };

        let options = lookup::options_from_rows(&TableSchema::new(target, columns), &rows, display);
        tracing::debug!("Resolved {} lookup options from table {}", options.len(), target);
        options
    }

    /// Resolves every LOOKUP column of a schema, keyed by column name.
    ///
    /// Columns without a target table get an empty list.
    pub async fn resolve_for_schema(
        &self,
        schema: &TableSchema,
    ) -> HashMap<String, Vec<LookupOption>> {
        let pending = schema.lookup_columns().map(|column| async move {
            let options = match column.lookup_target_table_id {
                Some(target) => self.resolve(target, column.lookup_target_column_id).await,
                None => Vec::new(),
            };
            (column.name.clone(), options)
        });
        join_all(pending).await.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::InMemoryDataSource;
    use serde_json::json;
    use sheetdb_core::schema::{ColumnSpec, DataType};

    fn vendors(source: &InMemoryDataSource) -> TableId {
        let table = source.create_table(Some("vendors".to_string()));
        source
            .add_column(table, ColumnSpec::new("VendorId", DataType::Integer).primary(false))
            .unwrap();
        source
            .add_column(table, ColumnSpec::new("Name", DataType::Text))
            .unwrap();
        table
    }

    #[tokio::test]
    async fn test_resolve_sorts_and_skips_bad_keys() {
        let source = Arc::new(InMemoryDataSource::new());
        let table = vendors(&source);
        for (key, name) in [(3, "Gamma"), (1, "Alpha"), (2, "Beta")] {
            source
                .insert_record(table, json!({"VendorId": key, "Name": name}).as_object().unwrap())
                .unwrap();
        }
        source
            .insert_raw(table, r#"{"VendorId":"n/a","Name":"Broken"}"#)
            .unwrap();

        let resolver = LookupResolver::new(source);
        let options = resolver.resolve(table, None).await;
        let keys: Vec<f64> = options.iter().map(|o| o.value).collect();
        assert_eq!(keys, vec![1.0, 2.0, 3.0]);
        assert_eq!(options[1].label, "Beta");
    }

    #[tokio::test]
    async fn test_resolve_empty_and_missing_targets() {
        let source = Arc::new(InMemoryDataSource::new());
        let table = vendors(&source);
        let resolver = LookupResolver::new(source.clone());

        assert!(resolver.resolve(table, None).await.is_empty());
        assert!(resolver.resolve(99, None).await.is_empty());

        source.set_unavailable(table, true);
        assert!(resolver.resolve(table, None).await.is_empty());
    }

    #[tokio::test]
    async fn test_resolve_for_schema() {
        let source = Arc::new(InMemoryDataSource::new());
        let target = vendors(&source);
        source
            .insert_record(target, json!({"VendorId": 7, "Name": "Acme"}).as_object().unwrap())
            .unwrap();
        let orders = source.create_table(None);
        source
            .add_column(orders, ColumnSpec::new("Vendor", DataType::Lookup).lookup(target, None))
            .unwrap();
        let schema = TableSchema::new(orders, source.fetch_columns(orders).await.unwrap());

        let options = LookupResolver::new(source).resolve_for_schema(&schema).await;
        assert_eq!(options.len(), 1);
        assert_eq!(options["Vendor"][0].label, "Acme");
    }
}
