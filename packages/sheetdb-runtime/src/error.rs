//! Runtime error types.

use sheetdb_core::error::SchemaError;
use sheetdb_core::schema::{RowId, TableId};
use thiserror::Error;

/// Errors reported by a data source.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    /// Table not found
    #[error("Table {table} not found")]
    TableNotFound { table: TableId },

    /// Row not found
    #[error("Row {row} not found")]
    RowNotFound { row: RowId },

    /// Backend could not be reached
    #[error("Data source unavailable: {0}")]
    Unavailable(String),

    /// Backend refused the operation
    #[error("Rejected by data source: {0}")]
    Rejected(String),
}

/// Record engine operation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Schema of the table being edited could not be loaded
    #[error("Failed to load schema for table {table}: {source}")]
    SchemaLoad {
        table: TableId,
        #[source]
        source: SourceError,
    },

    /// Column creation rule violated
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Backend failure outside of form submission
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Backend rejected the submitted record
    #[error("Submit failed: {0}")]
    Submit(String),

    /// Operation requires an open form
    #[error("No form is open")]
    FormNotOpen,

    /// A form is already open
    #[error("A form is already open for table {table}")]
    FormAlreadyOpen { table: TableId },

    /// Field is not part of the open table
    #[error("Unknown field '{0}'")]
    UnknownField(String),

    /// Form does not accept edits in its current state
    #[error("Form is not editable while {state}")]
    NotEditable { state: &'static str },

    /// Image upload target is not an IMAGE column
    #[error("Field '{0}' is not an IMAGE column")]
    NotAnImageField(String),
}

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, EngineError>;
