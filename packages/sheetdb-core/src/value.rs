//! Helpers for inspecting and normalizing JSON scalar values.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Number, Value};

/// Optional sign, digits, optional `.digits`.
fn decimal_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[+-]?\d+(\.\d+)?$").expect("valid decimal pattern"))
}

/// Returns `true` for null and the empty string.
pub fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Parses a signed decimal string. Exponents, hex and `NaN` are rejected.
pub fn parse_decimal(text: &str) -> Option<f64> {
    if !decimal_pattern().is_match(text) {
        return None;
    }
    text.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Reads a number from a JSON number or a decimal string.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_decimal(s.trim()),
        _ => None,
    }
}

/// Canonical JSON form of a number: integral values become integers.
pub fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n >= i64::MIN as f64 && n <= i64::MAX as f64 {
        return Value::from(n as i64);
    }
    Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
}

/// Parses literal text into the narrowest JSON number.
pub fn parse_number_literal(text: &str) -> Option<Number> {
    let text = text.trim();
    if let Ok(n) = text.parse::<i64>() {
        return Some(Number::from(n));
    }
    parse_decimal(text).and_then(Number::from_f64)
}

/// Human-readable description of a value for error messages.
pub fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("boolean {}", b),
        Value::Number(n) => format!("number {}", n),
        Value::String(s) => format!("\"{}\"", s),
        Value::Array(_) => "array".to_string(),
        Value::Object(_) => "object".to_string(),
    }
}

/// Text form of a scalar, used for labels and string coercion.
pub fn display_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_decimal("-3.25"), Some(-3.25));
        assert_eq!(parse_decimal("+7"), Some(7.0));
        assert_eq!(parse_decimal("1e3"), None);
        assert_eq!(parse_decimal("1."), None);
        assert_eq!(parse_decimal(".5"), None);
        assert_eq!(parse_decimal(""), None);
    }

    #[test]
    fn test_number_value_prefers_integers() {
        assert_eq!(number_value(12.0), json!(12));
        assert_eq!(number_value(2.5), json!(2.5));
        assert_eq!(number_value(f64::NAN), Value::Null);
    }

    #[test]
    fn test_parse_number_literal() {
        assert_eq!(parse_number_literal(" 10 "), Some(Number::from(10)));
        assert_eq!(parse_number_literal("0.5"), Number::from_f64(0.5));
        assert_eq!(parse_number_literal("ten"), None);
    }
}
