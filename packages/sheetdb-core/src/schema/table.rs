//! Table schema and derived facts.
//!
//! A schema is a snapshot of a table's columns. Derived facts are computed on
//! every call; reload the schema after the column set changes.

use super::column::{Column, ColumnId, DataType, TableId};

/// Column set of one table, in declaration order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableSchema {
    /// Table identifier
    pub table_id: TableId,
    /// Column definitions in declaration order
    pub columns: Vec<Column>,
}

impl TableSchema {
    /// Creates a schema snapshot from loaded columns.
    pub fn new(table_id: TableId, columns: Vec<Column>) -> Self {
        Self { table_id, columns }
    }

    /// Returns `true` if any column is the primary key.
    pub fn has_primary_column(&self) -> bool {
        self.columns.iter().any(|c| c.is_primary)
    }

    /// Returns the primary-key column, if any.
    pub fn primary_column(&self) -> Option<&Column> {
        self.columns.iter().find(|c| c.is_primary)
    }

    /// Number of columns that are not the primary key.
    pub fn non_primary_column_count(&self) -> usize {
        self.columns.iter().filter(|c| !c.is_primary).count()
    }

    /// INTEGER and REAL columns, in declaration order.
    pub fn numeric_columns(&self) -> Vec<&Column> {
        self.columns
            .iter()
            .filter(|c| c.data_type.is_numeric())
            .collect()
    }

    /// Finds a column by exact name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Finds a column by id.
    pub fn column_by_id(&self, id: ColumnId) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == id)
    }

    /// Finds a column whose trimmed name matches case-insensitively.
    pub fn column_named_like(&self, name: &str) -> Option<&Column> {
        let wanted = name.trim().to_lowercase();
        self.columns
            .iter()
            .find(|c| c.name.trim().to_lowercase() == wanted)
    }

    /// LOOKUP columns, in declaration order.
    pub fn lookup_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns
            .iter()
            .filter(|c| c.data_type == DataType::Lookup)
    }

    /// Returns `true` if the primary key exists and is assigned manually.
    pub fn has_manual_key(&self) -> bool {
        self.primary_column().is_some_and(Column::is_manual_key)
    }
}
