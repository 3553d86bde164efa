//! In-memory data source.
//!
//! Behaves like the relational backend: assigns ids and auto-generated keys,
//! enforces the single-primary-key rule, rejects duplicate keys, and computes
//! FORMULA columns whenever a row is written.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::Value;

use sheetdb_core::codec::{self, Record};
use sheetdb_core::registry;
use sheetdb_core::schema::{Column, ColumnSpec, DataType, Row, RowId, TableId, TableSchema};
use sheetdb_core::value;

use super::{DataSource, ImageUpload};
use crate::error::SourceError;

/// Workspace description used to seed an in-memory source.
#[derive(Debug, Clone, Deserialize)]
pub struct Fixture {
    pub tables: Vec<FixtureTable>,
}

/// One table of a [`Fixture`].
#[derive(Debug, Clone, Deserialize)]
pub struct FixtureTable {
    /// Table id, referenced by LOOKUP columns
    pub id: TableId,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Columns in declaration order
    pub columns: Vec<ColumnSpec>,
    /// Initial records
    #[serde(default)]
    pub rows: Vec<Record>,
}

#[derive(Debug, Default)]
struct MemoryTable {
    name: Option<String>,
    columns: Vec<Column>,
    rows: Vec<Row>,
}

#[derive(Debug, Default)]
struct MemoryState {
    tables: BTreeMap<TableId, MemoryTable>,
    next_column_id: u64,
    next_row_id: u64,
    uploads: Vec<String>,
    unavailable: HashSet<TableId>,
    rejection: Option<String>,
}

/// Data source holding every table in process memory.
#[derive(Debug, Default)]
pub struct InMemoryDataSource {
    state: RwLock<MemoryState>,
}

impl InMemoryDataSource {
    /// Creates an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a source from a fixture, creating columns then rows.
    ///
    /// # Errors
    /// Fails if a column or row is rejected, e.g. a second primary key.
    pub fn from_fixture(fixture: &Fixture) -> Result<Self, SourceError> {
        let source = Self::new();
        for table in &fixture.tables {
            source.create_table_with_id(table.id, table.name.clone());
        }
        for table in &fixture.tables {
            for spec in &table.columns {
                source.add_column(table.id, spec.clone())?;
            }
        }
        for table in &fixture.tables {
            for record in &table.rows {
                source.insert_record(table.id, record)?;
            }
        }
        Ok(source)
    }

    /// Creates an empty table and returns its id.
    pub fn create_table(&self, name: Option<String>) -> TableId {
        let id = {
            let state = self.state.read();
            state.tables.keys().next_back().map_or(1, |last| last + 1)
        };
        self.create_table_with_id(id, name);
        id
    }

    /// Creates an empty table with a caller-chosen id. Existing tables are kept.
    pub fn create_table_with_id(&self, id: TableId, name: Option<String>) {
        let mut state = self.state.write();
        state.tables.entry(id).or_insert_with(|| MemoryTable {
            name,
            ..Default::default()
        });
    }

    /// Lists `(id, name)` of every table.
    pub fn tables(&self) -> Vec<(TableId, Option<String>)> {
        self.state
            .read()
            .tables
            .iter()
            .map(|(id, t)| (*id, t.name.clone()))
            .collect()
    }

    /// Adds a column, enforcing one primary key per table.
    pub fn add_column(&self, table: TableId, spec: ColumnSpec) -> Result<Column, SourceError> {
        let mut state = self.state.write();
        state.next_column_id += 1;
        let id = state.next_column_id;
        let entry = state
            .tables
            .get_mut(&table)
            .ok_or(SourceError::TableNotFound { table })?;

        if spec.is_primary && entry.columns.iter().any(|c| c.is_primary) {
            return Err(SourceError::Rejected(format!(
                "table {} already has a primary key",
                table
            )));
        }
        if entry
            .columns
            .iter()
            .any(|c| c.name.eq_ignore_ascii_case(spec.name.trim()))
        {
            return Err(SourceError::Rejected(format!(
                "column '{}' already exists",
                spec.name.trim()
            )));
        }

        let column = Column::from_spec(id, table, spec);
        entry.columns.push(column.clone());
        Ok(column)
    }

    /// Encodes and inserts a record through the regular write path.
    pub fn insert_record(&self, table: TableId, record: &Record) -> Result<Row, SourceError> {
        self.write_row(table, None, &codec::encode(record))
    }

    /// Inserts a row blob verbatim, bypassing key assignment and formulas.
    pub fn insert_raw(&self, table: TableId, encoded_data: &str) -> Result<Row, SourceError> {
        let mut state = self.state.write();
        state.next_row_id += 1;
        let row = Row {
            id: state.next_row_id,
            table_id: table,
            encoded_data: encoded_data.to_string(),
            created_at: Utc::now(),
        };
        state
            .tables
            .get_mut(&table)
            .ok_or(SourceError::TableNotFound { table })?
            .rows
            .push(row.clone());
        Ok(row)
    }

    /// Decoded records of a table, in insertion order.
    pub fn records(&self, table: TableId) -> Vec<Record> {
        self.state
            .read()
            .tables
            .get(&table)
            .map(|t| t.rows.iter().map(codec::decode_row).collect())
            .unwrap_or_default()
    }

    /// Makes every load and write touching `table` fail as if the network were down.
    pub fn set_unavailable(&self, table: TableId, unavailable: bool) {
        let mut state = self.state.write();
        if unavailable {
            state.unavailable.insert(table);
        } else {
            state.unavailable.remove(&table);
        }
    }

    /// Makes every row write fail with `reason` until cleared with `None`.
    pub fn reject_writes(&self, reason: Option<String>) {
        self.state.write().rejection = reason;
    }

    /// URLs handed out by `upload_image`.
    pub fn uploads(&self) -> Vec<String> {
        self.state.read().uploads.clone()
    }

    fn check_available(state: &MemoryState, table: TableId) -> Result<(), SourceError> {
        if state.unavailable.contains(&table) {
            return Err(SourceError::Unavailable(format!("table {} unreachable", table)));
        }
        Ok(())
    }

    fn write_row(
        &self,
        table: TableId,
        existing: Option<RowId>,
        encoded_data: &str,
    ) -> Result<Row, SourceError> {
        let mut state = self.state.write();
        Self::check_available(&state, table)?;
        if let Some(reason) = &state.rejection {
            return Err(SourceError::Rejected(reason.clone()));
        }

        let entry = state
            .tables
            .get(&table)
            .ok_or(SourceError::TableNotFound { table })?;
        let schema = TableSchema::new(table, entry.columns.clone());
        let mut record = codec::decode(encoded_data);

        if let Some(key_column) = schema.primary_column() {
            let used: HashSet<i64> = entry
                .rows
                .iter()
                .filter(|r| Some(r.id) != existing)
                .filter_map(|r| codec::decode_row(r).get(&key_column.name).and_then(registry::key_of))
                .collect();
            let key = record.get(&key_column.name).and_then(registry::key_of);
            match key {
                None if key_column.is_auto_generated && existing.is_none() => {
                    let next = used.iter().max().map_or(1, |max| max + 1);
                    record.insert(key_column.name.clone(), Value::from(next));
                }
                Some(k) if used.contains(&k) => {
                    return Err(SourceError::Rejected(format!(
                        "duplicate key {} for column '{}'",
                        k, key_column.name
                    )));
                }
                _ => {}
            }
        }

        for column in schema
            .columns
            .iter()
            .filter(|c| c.data_type == DataType::Formula)
        {
            let computed = column
                .formula_definition
                .as_ref()
                .and_then(|ast| ast.evaluate(&record, &schema))
                .map_or(Value::Null, value::number_value);
            record.insert(column.name.clone(), computed);
        }

        let encoded_data = codec::encode(&record);
        let row = match existing {
            Some(id) => {
                let row = state
                    .tables
                    .get_mut(&table)
                    .and_then(|t| t.rows.iter_mut().find(|r| r.id == id))
                    .ok_or(SourceError::RowNotFound { row: id })?;
                row.encoded_data = encoded_data;
                row.clone()
            }
            None => {
                state.next_row_id += 1;
                let row = Row {
                    id: state.next_row_id,
                    table_id: table,
                    encoded_data,
                    created_at: Utc::now(),
                };
                if let Some(t) = state.tables.get_mut(&table) {
                    t.rows.push(row.clone());
                }
                row
            }
        };
        Ok(row)
    }

    fn table_of_row(&self, row: RowId) -> Result<TableId, SourceError> {
        self.state
            .read()
            .tables
            .iter()
            .find(|(_, t)| t.rows.iter().any(|r| r.id == row))
            .map(|(id, _)| *id)
            .ok_or(SourceError::RowNotFound { row })
    }
}

#[async_trait]
impl DataSource for InMemoryDataSource {
    async fn fetch_columns(&self, table: TableId) -> Result<Vec<Column>, SourceError> {
        let state = self.state.read();
        Self::check_available(&state, table)?;
        state
            .tables
            .get(&table)
            .map(|t| t.columns.clone())
            .ok_or(SourceError::TableNotFound { table })
    }

    async fn fetch_rows(&self, table: TableId) -> Result<Vec<Row>, SourceError> {
        let state = self.state.read();
        Self::check_available(&state, table)?;
        state
            .tables
            .get(&table)
            .map(|t| t.rows.clone())
            .ok_or(SourceError::TableNotFound { table })
    }

    async fn create_column(
        &self,
        table: TableId,
        spec: ColumnSpec,
    ) -> Result<Column, SourceError> {
        Self::check_available(&self.state.read(), table)?;
        self.add_column(table, spec)
    }

    async fn create_row(&self, table: TableId, encoded_data: String) -> Result<Row, SourceError> {
        self.write_row(table, None, &encoded_data)
    }

    async fn update_row(&self, row: RowId, encoded_data: String) -> Result<Row, SourceError> {
        let table = self.table_of_row(row)?;
        self.write_row(table, Some(row), &encoded_data)
    }

    async fn delete_row(&self, row: RowId) -> Result<(), SourceError> {
        let table = self.table_of_row(row)?;
        let mut state = self.state.write();
        Self::check_available(&state, table)?;
        if let Some(t) = state.tables.get_mut(&table) {
            t.rows.retain(|r| r.id != row);
        }
        Ok(())
    }

    async fn upload_image(&self, upload: ImageUpload) -> Result<String, SourceError> {
        if !upload.content_type.starts_with("image/") {
            return Err(SourceError::Rejected(format!(
                "'{}' is not an image ({})",
                upload.file_name, upload.content_type
            )));
        }
        let mut state = self.state.write();
        let url = format!(
            "memory://uploads/{}/{}",
            state.uploads.len() + 1,
            upload.file_name
        );
        state.uploads.push(url.clone());
        Ok(url)
    }
}
