//! Loading the primary-key registry for an editing session.

use sheetdb_core::registry::PrimaryKeyRegistry;
use sheetdb_core::schema::TableSchema;

use crate::source::DataSource;

/// Builds the registry when the table's key is assigned manually.
///
/// Returns `None` for tables without a key or with an auto-generated key.
/// A failed row load degrades to an empty registry.
pub async fn build_registry(
    source: &dyn DataSource,
    schema: &TableSchema,
) -> Option<PrimaryKeyRegistry> {
    let key = schema.primary_column().filter(|c| c.is_manual_key())?;

    match source.fetch_rows(schema.table_id).await {
        Ok(rows) => {
            let registry = PrimaryKeyRegistry::from_rows(&key.name, &rows);
            tracing::debug!(
                "Loaded {} existing keys for table {}",
                registry.len(),
                schema.table_id
            );
            Some(registry)
        }
        Err(e) => {
            tracing::warn!(
                "Failed to load rows of table {} for key registry: {}",
                schema.table_id,
                e
            );
            Some(PrimaryKeyRegistry::new(&key.name))
        }
    }
}
