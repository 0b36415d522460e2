// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Equality and ordering over JSON field values, shared by conditions, the SQL
// shim and callers that sort records.

use std::cmp::Ordering;

use serde_json::{Number, Value};

/// Strict equality between two field values.
///
/// Values must have the same JSON type. Numbers compare by numeric value, so
/// `1` and `1.0` are equal, but `1` and `"1"` are not. Arrays and objects
/// compare element-wise with the same rules.
pub fn strict_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => numbers_eq(a, b),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| strict_eq(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, x)| b.get(key).is_some_and(|y| strict_eq(x, y)))
        }
        _ => left == right,
    }
}

fn numbers_eq(a: &Number, b: &Number) -> bool {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x == y;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

/// Two-way comparison used for sorting records by a field.
///
/// Numbers, strings and booleans of the same type are ordered; anything
/// else (missing fields, mixed types, NaN) compares as equal so a stable
/// sort leaves those records in their original relative order.
pub fn compare_values(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    match (left, right) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        },
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numbers_compare_by_value() {
        assert!(strict_eq(&json!(1), &json!(1.0)));
        assert!(strict_eq(&json!(-4), &json!(-4)));
        assert!(!strict_eq(&json!(1), &json!(2)));
    }

    #[test]
    fn test_no_type_coercion() {
        assert!(!strict_eq(&json!(1), &json!("1")));
        assert!(!strict_eq(&json!(0), &json!(false)));
        assert!(!strict_eq(&json!(null), &json!(false)));
        assert!(strict_eq(&json!(null), &json!(null)));
    }

    #[test]
    fn test_no_substring_matching() {
        assert!(!strict_eq(&json!("phone"), &json!("smartphone")));
        assert!(strict_eq(&json!("phone"), &json!("phone")));
    }

    #[test]
    fn test_composite_values() {
        assert!(strict_eq(&json!([1, "a"]), &json!([1.0, "a"])));
        assert!(!strict_eq(&json!([1]), &json!([1, 2])));
        assert!(strict_eq(&json!({"a": 1}), &json!({"a": 1.0})));
        assert!(!strict_eq(&json!({"a": 1}), &json!({"b": 1})));
    }

    #[test]
    fn test_compare_values() {
        assert_eq!(compare_values(Some(&json!(1)), Some(&json!(2.5))), Ordering::Less);
        assert_eq!(compare_values(Some(&json!("b")), Some(&json!("a"))), Ordering::Greater);
        assert_eq!(compare_values(Some(&json!(true)), Some(&json!(false))), Ordering::Greater);
        assert_eq!(compare_values(Some(&json!(1)), Some(&json!("1"))), Ordering::Equal);
        assert_eq!(compare_values(None, Some(&json!(1))), Ordering::Equal);
    }
}
