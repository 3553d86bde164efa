//! Table-level operations: schema loading, column creation, grid loading.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use sheetdb_core::codec::{self, Record};
use sheetdb_core::config::EngineConfig;
use sheetdb_core::schema::{self, Column, ColumnSpec, RowId, TableId, TableSchema};

use crate::error::{EngineError, Result};
use crate::source::DataSource;

/// One decoded row ready for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridRow {
    pub id: RowId,
    pub created_at: DateTime<Utc>,
    pub record: Record,
}

/// A table's schema and decoded rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    pub schema: TableSchema,
    pub rows: Vec<GridRow>,
}

/// Schema and row operations over a data source.
#[derive(Clone)]
pub struct TableService {
    source: Arc<dyn DataSource>,
    config: EngineConfig,
}

impl TableService {
    /// Creates a service over the given data source.
    pub fn new(source: Arc<dyn DataSource>, config: EngineConfig) -> Self {
        Self { source, config }
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Loads a fresh schema snapshot.
    ///
    /// # Errors
    /// `SchemaLoad` when the columns cannot be fetched.
    pub async fn load_schema(&self, table: TableId) -> Result<TableSchema> {
        let columns = self
            .source
            .fetch_columns(table)
            .await
            .map_err(|source| EngineError::SchemaLoad { table, source })?;
        Ok(TableSchema::new(table, columns))
    }

    /// Creates a column after checking it against the table's current schema.
    ///
    /// The schema is reloaded on every call so derived facts (column count,
    /// primary key presence) reflect concurrent changes.
    ///
    /// # Arguments
    /// * `table` - Target table
    /// * `spec` - Requested column
    ///
    /// # Returns
    /// The created column as assigned by the backend.
    pub async fn create_column(&self, table: TableId, spec: ColumnSpec) -> Result<Column> {
        let schema = self.load_schema(table).await?;
        schema::validate_new_column(&schema, &spec, &self.config)?;

        let column = self.source.create_column(table, spec).await?;
        tracing::info!(
            "Created column '{}' ({}) in table {}",
            column.name,
            column.data_type,
            table
        );
        Ok(column)
    }

    /// Loads the schema and decoded rows of a table.
    ///
    /// A failed row load degrades to an empty grid; a failed schema load is
    /// reported.
    pub async fn load_grid(&self, table: TableId) -> Result<Grid> {
        let schema = self.load_schema(table).await?;
        let rows = match self.source.fetch_rows(table).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!("Failed to load rows of table {}: {}", table, e);
                Vec::new()
            }
        };
        let rows = rows
            .iter()
            .map(|row| GridRow {
                id: row.id,
                created_at: row.created_at,
                record: codec::decode_row(row),
            })
            .collect();
        Ok(Grid { schema, rows })
    }

    /// Deletes a row.
    pub async fn delete_row(&self, row: RowId) -> Result<()> {
        self.source.delete_row(row).await?;
        tracing::info!("Deleted row {}", row);
        Ok(())
    }
}
