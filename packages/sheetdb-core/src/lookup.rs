//! Lookup option derivation for LOOKUP columns.

use serde::Serialize;

use crate::codec;
use crate::schema::{Column, ColumnId, DataType, Row, TableSchema};
use crate::value;

/// One selectable foreign key with its display label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LookupOption {
    /// Primary-key value in the target table
    pub value: f64,
    /// Human-readable label
    pub label: String,
}

impl LookupOption {
    /// Canonical JSON form of the key (integers stay integers).
    pub fn key(&self) -> serde_json::Value {
        value::number_value(self.value)
    }
}

/// Picks the column whose values label the options.
///
/// An explicitly requested column wins when it exists in the target table;
/// otherwise the first TEXT column other than the key, then the key itself.
pub fn display_column<'a>(
    schema: &'a TableSchema,
    preferred: Option<ColumnId>,
) -> Option<&'a Column> {
    if let Some(column) = preferred.and_then(|id| schema.column_by_id(id)) {
        return Some(column);
    }
    schema
        .columns
        .iter()
        .find(|c| !c.is_primary && c.data_type == DataType::Text)
        .or_else(|| schema.primary_column())
}

/// Derives sorted lookup options from a target table's rows.
///
/// Rows whose key is missing or not numeric are dropped. A target table
/// without a primary key yields no options.
///
/// # Arguments
/// * `schema` - Target table schema
/// * `rows` - Target table rows
/// * `preferred_display` - Display column requested by the LOOKUP column
///
/// # Returns
/// Options sorted ascending by key.
pub fn options_from_rows(
    schema: &TableSchema,
    rows: &[Row],
    preferred_display: Option<ColumnId>,
) -> Vec<LookupOption> {
    let Some(key_column) = schema.primary_column() else {
        tracing::warn!(
            "Lookup target table {} has no primary key column",
            schema.table_id
        );
        return Vec::new();
    };
    let label_column = display_column(schema, preferred_display).unwrap_or(key_column);

    let mut options: Vec<LookupOption> = rows
        .iter()
        .filter_map(|row| {
            let record = codec::decode_row(row);
            let key = record.get(&key_column.name).and_then(value::as_number)?;
            let label = record
                .get(&label_column.name)
                .map(value::display_text)
                .filter(|text| !text.is_empty())
                .unwrap_or_else(|| value::display_text(&value::number_value(key)));
            Some(LookupOption { value: key, label })
        })
        .collect();

    options.sort_by(|a, b| a.value.total_cmp(&b.value));
    options
}

/// Returns `true` if `key` is one of the options.
pub fn contains_key(options: &[LookupOption], key: f64) -> bool {
    options.iter().any(|o| o.value == key)
}
