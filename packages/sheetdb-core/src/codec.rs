//! Record codec.
//!
//! Converts between a decoded record (column name -> value) and the opaque
//! string blob stored in a row. No type coercion happens here.

use serde_json::Value;

use crate::schema::Row;

/// Decoded row contents keyed by column name.
pub type Record = serde_json::Map<String, Value>;

/// Decodes an encoded blob into a record.
///
/// Malformed input, or input that is valid JSON but not an object, decodes to
/// an empty record: it is treated as a row with no data yet.
pub fn decode(encoded: &str) -> Record {
    match serde_json::from_str::<Value>(encoded) {
        Ok(Value::Object(record)) => record,
        Ok(other) => {
            tracing::debug!("Encoded record is not an object ({}), using empty record", kind(&other));
            Record::new()
        }
        Err(e) => {
            tracing::debug!("Malformed encoded record, using empty record: {}", e);
            Record::new()
        }
    }
}

/// Decodes the blob of a persisted row.
pub fn decode_row(row: &Row) -> Record {
    decode(&row.encoded_data)
}

/// Encodes a record into its persisted blob.
pub fn encode(record: &Record) -> String {
    // String-keyed maps always serialize.
    Value::Object(record.clone()).to_string()
}

/// Strict variant of [`decode`] reporting why a blob was rejected.
pub fn try_decode(encoded: &str) -> Result<Record, serde_json::Error> {
    serde_json::from_str(encoded)
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
