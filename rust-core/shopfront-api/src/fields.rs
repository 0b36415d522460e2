// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
//! Lenient readers for request values and stored record fields.
//!
//! Browser clients send ids and quantities as numbers or numeric strings
//! interchangeably, and stored records are schemaless, so handlers read
//! through these helpers instead of indexing records directly.

use serde_json::Value;
use shopfront_store::Record;

use crate::ApiError;

/// A non-negative integer given as a JSON number or a numeric string.
pub fn loose_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0 && f.fract() == 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// A number given as a JSON number or a numeric string.
pub fn loose_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Loose truthiness: `false`, `null`, `0`, `""` and absence are false.
pub fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

/// A present, non-empty string.
pub fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}

/// String field of a record.
pub fn str_field<'a>(record: &'a Record, key: &str) -> Option<&'a str> {
    record.get(key).and_then(Value::as_str)
}

/// Numeric field of a record.
pub fn f64_field(record: &Record, key: &str) -> Option<f64> {
    record.get(key).and_then(loose_f64)
}

/// Integer field of a record.
pub fn u64_field(record: &Record, key: &str) -> Option<u64> {
    record.get(key).and_then(loose_u64)
}

/// A record field, or JSON `null`.
pub fn field_or_null(record: &Record, key: &str) -> Value {
    record.get(key).cloned().unwrap_or(Value::Null)
}

/// Parse an id path segment; anything that is not an id cannot exist.
pub fn path_id(raw: &str, what: &str) -> Result<u64, ApiError> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::NotFound(format!("{what} not found")))
}

/// Case-insensitive substring test.
pub fn contains_ci(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

/// A `serde_json::Value` known to be an object, as a record.
pub fn into_record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_loose_numbers() {
        assert_eq!(loose_u64(&json!(3)), Some(3));
        assert_eq!(loose_u64(&json!("12")), Some(12));
        assert_eq!(loose_u64(&json!(2.0)), Some(2));
        assert_eq!(loose_u64(&json!(-1)), None);
        assert_eq!(loose_u64(&json!("x")), None);
        assert_eq!(loose_f64(&json!("99.5")), Some(99.5));
        assert_eq!(loose_f64(&json!(null)), None);
    }

    #[test]
    fn test_truthy() {
        assert!(truthy(Some(&json!(true))));
        assert!(truthy(Some(&json!("yes"))));
        assert!(truthy(Some(&json!(1))));
        assert!(!truthy(Some(&json!(0))));
        assert!(!truthy(Some(&json!(""))));
        assert!(!truthy(Some(&Value::Null)));
        assert!(!truthy(None));
    }

    #[test]
    fn test_path_id() {
        assert_eq!(path_id("42", "Order").unwrap(), 42);
        assert!(matches!(path_id("abc", "Order"), Err(ApiError::NotFound(_))));
    }

    #[test]
    fn test_record_fields() {
        let record = into_record(json!({"name": "Mug", "price": "8.5", "stock": 3}));
        assert_eq!(str_field(&record, "name"), Some("Mug"));
        assert_eq!(f64_field(&record, "price"), Some(8.5));
        assert_eq!(u64_field(&record, "stock"), Some(3));
        assert_eq!(field_or_null(&record, "missing"), Value::Null);
        assert!(contains_ci("Coffee Beans", "bean"));
    }

    proptest::proptest! {
        #[test]
        fn prop_numeric_strings_read_like_numbers(n in 0u64..1_000_000_000) {
            proptest::prop_assert_eq!(loose_u64(&json!(n.to_string())), Some(n));
            proptest::prop_assert_eq!(loose_u64(&json!(n)), Some(n));
            proptest::prop_assert!(truthy(Some(&json!(n))) == (n != 0));
        }
    }
}
