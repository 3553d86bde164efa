//! Field validators and coercion.
//!
//! One rule per declared column type. A rule either rejects the value with a
//! [`FieldError`] or returns the value normalized to its canonical in-memory
//! form (integer, float, boolean or string), ready for the record codec.

use std::collections::HashMap;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use serde_json::Value;

use crate::codec::Record;
use crate::error::{FieldError, ValidationErrors};
use crate::lookup::{self, LookupOption};
use crate::registry::{self, PrimaryKeyRegistry};
use crate::schema::{Column, DataType, TableSchema};
use crate::value;

fn date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid date pattern"))
}

/// Per-field view of the editing session.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldContext<'a> {
    /// Whether the record is being created rather than edited
    pub is_new_record: bool,
    /// Loaded options when the column is a LOOKUP
    pub lookup_options: Option<&'a [LookupOption]>,
    /// Existing keys when the table's key is assigned manually
    pub registry: Option<&'a PrimaryKeyRegistry>,
    /// Key of the record being edited
    pub original_key: Option<i64>,
}

/// Facts about one editing session needed to validate a whole record.
#[derive(Debug, Clone, Default)]
pub struct RecordContext {
    /// Whether the record is being created rather than edited
    pub is_new_record: bool,
    /// Loaded lookup options keyed by LOOKUP column name
    pub lookup_options: HashMap<String, Vec<LookupOption>>,
    /// Existing keys when the table's key is assigned manually
    pub registry: Option<PrimaryKeyRegistry>,
    /// Primary-key value of the record being edited, as stored
    pub original_key: Option<Value>,
}

impl RecordContext {
    /// Context for a record that does not exist yet.
    pub fn create() -> Self {
        Self {
            is_new_record: true,
            ..Default::default()
        }
    }

    /// Context for editing a record whose key is `original_key`.
    pub fn edit(original_key: Option<Value>) -> Self {
        Self {
            is_new_record: false,
            original_key,
            ..Default::default()
        }
    }

    /// Narrows the session to what `column`'s validator may consult.
    pub fn field(&self, column: &Column) -> FieldContext<'_> {
        FieldContext {
            is_new_record: self.is_new_record,
            lookup_options: self.lookup_options.get(&column.name).map(Vec::as_slice),
            registry: self.registry.as_ref(),
            original_key: self.original_key.as_ref().and_then(registry::key_of),
        }
    }

    /// Returns `true` if `column` is a key whose value is pinned to the original.
    pub fn is_pinned(&self, column: &Column) -> bool {
        column.is_primary && !self.is_new_record
    }
}

/// Initial form value of an unset field.
pub fn default_value(column: &Column) -> Value {
    match column.data_type {
        DataType::Boolean => Value::Bool(false),
        DataType::Lookup => Value::Null,
        _ => Value::String(String::new()),
    }
}

/// Validates and coerces one field value.
///
/// FORMULA columns are server-computed and always pass. An empty value on a
/// new record's auto-generated key passes as `null`. Manually assigned
/// INTEGER keys are checked against the registry, ignoring the record's own
/// original key.
///
/// # Arguments
/// * `column` - Column definition
/// * `value` - Raw value from the form
/// * `cx` - Session facts for this field
///
/// # Returns
/// The coerced value, or the field error.
pub fn validate_field(
    column: &Column,
    value: &Value,
    cx: &FieldContext<'_>,
) -> Result<Value, FieldError> {
    if column.data_type == DataType::Formula {
        return Ok(value.clone());
    }

    if value::is_empty(value) {
        if column.is_primary && column.is_auto_generated && cx.is_new_record {
            return Ok(Value::Null);
        }
        if !column.is_nullable {
            return Err(FieldError::Required {
                field: column.name.clone(),
            });
        }
        return Ok(empty_value(column.data_type));
    }

    let coerced = coerce(column, value, cx)?;

    if column.is_manual_key() && column.data_type == DataType::Integer {
        if let (Some(registry), Some(key)) = (cx.registry, registry::key_of(&coerced)) {
            if registry.contains(key, cx.original_key) {
                return Err(FieldError::DuplicateKey {
                    field: column.name.clone(),
                    value: key,
                });
            }
        }
    }

    Ok(coerced)
}

/// Validates every column of a record and returns the coerced record.
///
/// FORMULA columns are left out of the result, as is the key of a new record
/// when the backend assigns it. When editing, the primary key is pinned to
/// its original value regardless of `record`. Keys not in the schema are
/// dropped.
pub fn validate_record(
    schema: &TableSchema,
    record: &Record,
    cx: &RecordContext,
) -> Result<Record, ValidationErrors> {
    let mut coerced = Record::new();
    let mut errors = ValidationErrors::new();

    for column in &schema.columns {
        if column.data_type == DataType::Formula {
            continue;
        }
        let raw = if cx.is_pinned(column) {
            cx.original_key.clone().unwrap_or(Value::Null)
        } else {
            record.get(&column.name).cloned().unwrap_or(Value::Null)
        };

        match validate_field(column, &raw, &cx.field(column)) {
            Ok(Value::Null) if column.is_primary && column.is_auto_generated && cx.is_new_record => {}
            Ok(value) => {
                coerced.insert(column.name.clone(), value);
            }
            Err(e) => errors.push(e),
        }
    }

    if errors.is_empty() {
        Ok(coerced)
    } else {
        Err(errors)
    }
}

fn empty_value(data_type: DataType) -> Value {
    if data_type.is_textual() {
        Value::String(String::new())
    } else {
        Value::Null
    }
}

fn mismatch(column: &Column, expected: &str, value: &Value) -> FieldError {
    FieldError::TypeMismatch {
        field: column.name.clone(),
        expected: expected.to_string(),
        got: value::describe(value),
    }
}

fn coerce(column: &Column, value: &Value, cx: &FieldContext<'_>) -> Result<Value, FieldError> {
    match column.data_type {
        DataType::Text | DataType::String | DataType::Image => coerce_text(column, value),
        DataType::Integer => coerce_integer(column, value),
        DataType::Real => coerce_real(column, value),
        DataType::Boolean => coerce_boolean(column, value),
        DataType::Date => coerce_date(column, value),
        DataType::Lookup => coerce_lookup(column, value, cx),
        DataType::Formula => Ok(value.clone()),
    }
}

fn coerce_text(column: &Column, value: &Value) -> Result<Value, FieldError> {
    match value {
        Value::Array(_) | Value::Object(_) => Err(mismatch(column, "text", value)),
        other => Ok(Value::String(value::display_text(other))),
    }
}

fn coerce_integer(column: &Column, value: &Value) -> Result<Value, FieldError> {
    let parsed = match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed
        .map(Value::from)
        .ok_or_else(|| mismatch(column, "integer", value))
}

fn coerce_real(column: &Column, value: &Value) -> Result<Value, FieldError> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => value::parse_decimal(s.trim()),
        _ => None,
    };
    parsed
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| mismatch(column, "number", value))
}

fn coerce_boolean(column: &Column, value: &Value) -> Result<Value, FieldError> {
    let parsed = match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f == 0.0 => Some(false),
            Some(f) if f == 1.0 => Some(true),
            _ => None,
        },
        Value::String(s) => match s.as_str() {
            "1" | "true" => Some(true),
            "0" | "false" => Some(false),
            _ => None,
        },
        _ => None,
    };
    parsed
        .map(Value::Bool)
        .ok_or_else(|| mismatch(column, "boolean", value))
}

fn coerce_date(column: &Column, value: &Value) -> Result<Value, FieldError> {
    let parsed = value
        .as_str()
        .map(str::trim)
        .filter(|s| date_pattern().is_match(s))
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok());
    parsed
        .map(|date| Value::String(date.format("%Y-%m-%d").to_string()))
        .ok_or_else(|| mismatch(column, "date (yyyy-mm-dd)", value))
}

fn coerce_lookup(column: &Column, value: &Value, cx: &FieldContext<'_>) -> Result<Value, FieldError> {
    let options = cx.lookup_options.unwrap_or(&[]);
    match value::as_number(value) {
        Some(key) if lookup::contains_key(options, key) => Ok(value::number_value(key)),
        _ => Err(FieldError::ReferentialIntegrity {
            field: column.name.clone(),
            value: value::display_text(value),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnSpec;
    use chrono::Utc;
    use serde_json::json;

    fn column(spec: ColumnSpec) -> Column {
        Column::from_spec(1, 1, spec)
    }

    fn check(spec: ColumnSpec, value: Value) -> Result<Value, FieldError> {
        validate_field(&column(spec), &value, &FieldContext::default())
    }

    fn is_mismatch(result: Result<Value, FieldError>) -> bool {
        matches!(result, Err(FieldError::TypeMismatch { .. }))
    }

    #[test]
    fn test_required_for_every_type_but_formula() {
        let types = [
            DataType::Text,
            DataType::String,
            DataType::Image,
            DataType::Integer,
            DataType::Real,
            DataType::Boolean,
            DataType::Date,
            DataType::Lookup,
        ];
        for ty in types {
            for empty in [Value::Null, json!("")] {
                let result = check(ColumnSpec::new("F", ty).required(), empty);
                assert!(
                    matches!(result, Err(FieldError::Required { .. })),
                    "{} should be required",
                    ty
                );
            }
        }
        assert!(check(ColumnSpec::new("F", DataType::Formula).required(), Value::Null).is_ok());
    }

    #[test]
    fn test_auto_generated_key_exempt_on_create_only() {
        let key = column(ColumnSpec::new("Id", DataType::Integer).primary(true));
        let create = FieldContext {
            is_new_record: true,
            ..Default::default()
        };
        assert_eq!(validate_field(&key, &Value::Null, &create), Ok(Value::Null));
        assert!(matches!(
            validate_field(&key, &Value::Null, &FieldContext::default()),
            Err(FieldError::Required { .. })
        ));

        let manual = column(ColumnSpec::new("Id", DataType::Integer).primary(false));
        assert!(matches!(
            validate_field(&manual, &json!(""), &create),
            Err(FieldError::Required { .. })
        ));
    }

    #[test]
    fn test_nullable_empty_values() {
        assert_eq!(check(ColumnSpec::new("F", DataType::Text), json!("")), Ok(json!("")));
        assert_eq!(check(ColumnSpec::new("F", DataType::Integer), json!("")), Ok(Value::Null));
        assert_eq!(check(ColumnSpec::new("F", DataType::Date), Value::Null), Ok(Value::Null));
        assert_eq!(check(ColumnSpec::new("F", DataType::Lookup), json!("")), Ok(Value::Null));
    }

    #[test]
    fn test_integer() {
        let int = || ColumnSpec::new("Qty", DataType::Integer);
        assert_eq!(check(int(), json!("12")), Ok(json!(12)));
        assert_eq!(check(int(), json!("-4")), Ok(json!(-4)));
        assert_eq!(check(int(), json!(7)), Ok(json!(7)));
        assert_eq!(check(int(), json!(7.0)), Ok(json!(7)));
        assert!(is_mismatch(check(int(), json!("12.5"))));
        assert!(is_mismatch(check(int(), json!("abc"))));
        assert!(is_mismatch(check(int(), json!("12abc"))));
        assert!(is_mismatch(check(int(), json!(12.5))));
        assert!(is_mismatch(check(int(), json!(true))));
    }

    #[test]
    fn test_real() {
        let real = || ColumnSpec::new("Price", DataType::Real);
        assert_eq!(check(real(), json!("12.5")), Ok(json!(12.5)));
        assert_eq!(check(real(), json!("-3")), Ok(json!(-3.0)));
        assert_eq!(check(real(), json!(2)), Ok(json!(2.0)));
        assert!(is_mismatch(check(real(), json!("1e5"))));
        assert!(is_mismatch(check(real(), json!("12.5.1"))));
        assert!(is_mismatch(check(real(), json!("$3"))));
        assert!(is_mismatch(check(real(), json!(false))));
    }

    #[test]
    fn test_boolean() {
        let flag = || ColumnSpec::new("Active", DataType::Boolean);
        assert_eq!(check(flag(), json!(true)), Ok(json!(true)));
        assert_eq!(check(flag(), json!(0)), Ok(json!(false)));
        assert_eq!(check(flag(), json!(1)), Ok(json!(true)));
        assert_eq!(check(flag(), json!("1")), Ok(json!(true)));
        assert_eq!(check(flag(), json!("false")), Ok(json!(false)));
        assert!(is_mismatch(check(flag(), json!(2))));
        assert!(is_mismatch(check(flag(), json!("yes"))));
        assert!(is_mismatch(check(flag(), json!("TRUE"))));
    }

    #[test]
    fn test_date() {
        let date = || ColumnSpec::new("Due", DataType::Date);
        assert_eq!(check(date(), json!("2024-02-29")), Ok(json!("2024-02-29")));
        assert!(is_mismatch(check(date(), json!("2023-02-29"))));
        assert!(is_mismatch(check(date(), json!("2024-2-9"))));
        assert!(is_mismatch(check(date(), json!("29/02/2024"))));
        assert!(is_mismatch(check(date(), json!(20240229))));
    }

    #[test]
    fn test_lookup() {
        let vendor = column(ColumnSpec::new("Vendor", DataType::Lookup).lookup(3, None));
        let options = vec![
            LookupOption {
                value: 1.0,
                label: "Alpha".to_string(),
            },
            LookupOption {
                value: 2.0,
                label: "Beta".to_string(),
            },
        ];
        let cx = FieldContext {
            lookup_options: Some(&options),
            ..Default::default()
        };
        assert_eq!(validate_field(&vendor, &json!("2"), &cx), Ok(json!(2)));
        assert_eq!(validate_field(&vendor, &json!(1), &cx), Ok(json!(1)));
        for bad in [json!(5), json!("abc"), json!(true)] {
            assert!(matches!(
                validate_field(&vendor, &bad, &cx),
                Err(FieldError::ReferentialIntegrity { .. })
            ));
        }
        assert!(matches!(
            validate_field(&vendor, &json!(1), &FieldContext::default()),
            Err(FieldError::ReferentialIntegrity { .. })
        ));
    }

    #[test]
    fn test_text_coercion() {
        let text = || ColumnSpec::new("Name", DataType::Text);
        assert_eq!(check(text(), json!("hi")), Ok(json!("hi")));
        assert_eq!(check(text(), json!(42)), Ok(json!("42")));
        assert!(is_mismatch(check(text(), json!(["a"]))));
        let image = ColumnSpec::new("Photo", DataType::Image).required();
        assert_eq!(
            check(image, json!("not even a url")),
            Ok(json!("not even a url"))
        );
    }

    fn rows_with_keys(keys: &[i64]) -> Vec<crate::schema::Row> {
        keys.iter()
            .map(|k| crate::schema::Row {
                id: *k as u64,
                table_id: 1,
                encoded_data: format!(r#"{{"Id":{}}}"#, k),
                created_at: Utc::now(),
            })
            .collect()
    }

    #[test]
    fn test_manual_key_uniqueness_on_edit() {
        let key = column(ColumnSpec::new("Id", DataType::Integer).primary(false));
        let registry = PrimaryKeyRegistry::from_rows("Id", &rows_with_keys(&[1, 2, 3]));
        let cx = FieldContext {
            registry: Some(&registry),
            original_key: Some(2),
            ..Default::default()
        };
        assert_eq!(validate_field(&key, &json!("2"), &cx), Ok(json!(2)));
        assert_eq!(
            validate_field(&key, &json!(1), &cx),
            Err(FieldError::DuplicateKey {
                field: "Id".to_string(),
                value: 1
            })
        );
        assert_eq!(validate_field(&key, &json!(4), &cx), Ok(json!(4)));
    }

    #[test]
    fn test_auto_generated_key_skips_registry() {
        let key = column(ColumnSpec::new("Id", DataType::Integer).primary(true));
        let registry = PrimaryKeyRegistry::from_rows("Id", &rows_with_keys(&[1]));
        let cx = FieldContext {
            registry: Some(&registry),
            ..Default::default()
        };
        assert_eq!(validate_field(&key, &json!(1), &cx), Ok(json!(1)));
    }

    fn schema() -> TableSchema {
        use crate::formula::{FormulaAst, FormulaOp};
        let specs = [
            ColumnSpec::new("Id", DataType::Integer).primary(false),
            ColumnSpec::new("Name", DataType::Text).required(),
            ColumnSpec::new("Qty", DataType::Integer).required(),
            ColumnSpec::new("Active", DataType::Boolean),
            ColumnSpec::new("Double", DataType::Formula).formula(FormulaAst::operator(
                FormulaOp::Mul,
                FormulaAst::column("Qty"),
                FormulaAst::literal(2),
            )),
        ];
        let columns = specs
            .into_iter()
            .enumerate()
            .map(|(i, spec)| Column::from_spec(i as u64 + 1, 1, spec))
            .collect();
        TableSchema::new(1, columns)
    }

    #[test]
    fn test_validate_record_coerces_and_drops_formula() {
        let record = json!({"Id": "9", "Name": "Bolt", "Qty": "3", "Active": "1", "Double": 99, "Extra": 1});
        let out = validate_record(&schema(), record.as_object().unwrap(), &RecordContext::create())
            .unwrap();
        assert_eq!(
            Value::Object(out),
            json!({"Id": 9, "Name": "Bolt", "Qty": 3, "Active": true})
        );
    }

    #[test]
    fn test_validate_record_reports_in_column_order() {
        let record = json!({"Id": "x", "Name": "", "Qty": "1.5"});
        let errors = validate_record(&schema(), record.as_object().unwrap(), &RecordContext::create())
            .unwrap_err();
        assert_eq!(errors.len(), 3);
        assert_eq!(errors.first().map(FieldError::field), Some("Id"));
        assert!(matches!(errors.get("Name"), Some(FieldError::Required { .. })));
        assert!(matches!(errors.get("Qty"), Some(FieldError::TypeMismatch { .. })));
    }

    #[test]
    fn test_validate_record_pins_key_on_edit() {
        let record = json!({"Id": 77, "Name": "Bolt", "Qty": 1});
        let cx = RecordContext::edit(Some(json!(5)));
        let out = validate_record(&schema(), record.as_object().unwrap(), &cx).unwrap();
        assert_eq!(out.get("Id"), Some(&json!(5)));
    }

    #[test]
    fn test_default_values() {
        assert_eq!(default_value(&column(ColumnSpec::new("B", DataType::Boolean))), json!(false));
        assert_eq!(default_value(&column(ColumnSpec::new("L", DataType::Lookup))), Value::Null);
        assert_eq!(default_value(&column(ColumnSpec::new("R", DataType::Real))), json!(""));
    }
}
