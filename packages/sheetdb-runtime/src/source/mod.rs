//! Data-access seam between the record engine and its backend.
//!
//! The engine never reads ambient state such as auth tokens; callers hand it
//! an already-authenticated [`DataSource`].

mod memory;

use async_trait::async_trait;
use sheetdb_core::schema::{Column, ColumnSpec, Row, RowId, TableId};

use crate::error::SourceError;

pub use memory::{Fixture, FixtureTable, InMemoryDataSource};

/// Image file handed to the backend's upload endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageUpload {
    /// Original file name
    pub file_name: String,
    /// MIME type, e.g. `image/png`
    pub content_type: String,
    /// File contents
    pub bytes: Vec<u8>,
}

/// Backend operations the record engine consumes.
///
/// Row payloads are the record codec's encoded blobs; the backend stores them
/// without interpreting them.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Loads a table's columns in declaration order.
    async fn fetch_columns(&self, table: TableId) -> Result<Vec<Column>, SourceError>;

    /// Loads all rows of a table.
    async fn fetch_rows(&self, table: TableId) -> Result<Vec<Row>, SourceError>;

    /// Creates a column and returns it with its assigned id.
    async fn create_column(&self, table: TableId, spec: ColumnSpec)
        -> Result<Column, SourceError>;

    /// Inserts a row.
    async fn create_row(&self, table: TableId, encoded_data: String) -> Result<Row, SourceError>;

    /// Replaces a row's contents.
    async fn update_row(&self, row: RowId, encoded_data: String) -> Result<Row, SourceError>;

    /// Deletes a row.
    async fn delete_row(&self, row: RowId) -> Result<(), SourceError>;

    /// Stores an image and returns its URL. URLs returned here are trusted.
    async fn upload_image(&self, upload: ImageUpload) -> Result<String, SourceError>;
}
