//! Primary-key registry for manually assigned keys.
//!
//! Built per editing session from the table's current rows and discarded
//! when the form closes. Never persisted.

use std::collections::HashSet;

use serde_json::Value;

use crate::codec;
use crate::schema::Row;

/// Set of key values already used by a table's rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrimaryKeyRegistry {
    /// Primary-key column name
    column: String,
    /// Keys present among the rows
    keys: HashSet<i64>,
}

impl PrimaryKeyRegistry {
    /// Creates an empty registry for the given key column.
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            keys: HashSet::new(),
        }
    }

    /// Builds a registry by decoding every row and collecting its key.
    ///
    /// Rows that are malformed or lack an integer key are skipped.
    ///
    /// # Arguments
    /// * `column` - Primary-key column name
    /// * `rows` - Persisted rows of the table
    pub fn from_rows(column: impl Into<String>, rows: &[Row]) -> Self {
        let mut registry = Self::new(column);
        let mut skipped = 0usize;
        for row in rows {
            let record = codec::decode_row(row);
            match record.get(&registry.column).and_then(key_of) {
                Some(key) => {
                    registry.keys.insert(key);
                }
                None => skipped += 1,
            }
        }
        if skipped > 0 {
            tracing::debug!(
                "Primary-key registry for '{}' skipped {} rows without a usable key",
                registry.column,
                skipped
            );
        }
        registry
    }

    /// Returns the key column name.
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Returns `true` if `value` is used by a row other than the one being edited.
    ///
    /// # Arguments
    /// * `value` - Candidate key
    /// * `excluding` - Original key of the record being edited, if any
    pub fn contains(&self, value: i64, excluding: Option<i64>) -> bool {
        excluding != Some(value) && self.keys.contains(&value)
    }

    /// Records a key, e.g. after a successful insert.
    pub fn insert(&mut self, value: i64) -> bool {
        self.keys.insert(value)
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` if no keys are registered.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Reads an integer key from a JSON number or integer string.
pub fn key_of(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
