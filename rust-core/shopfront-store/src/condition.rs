// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Record filters accepted by `all`, `get` and `delete`.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::document::Record;
use crate::value::strict_eq;

/// A boxed record predicate.
pub type Predicate = Arc<dyn Fn(&Record) -> bool + Send + Sync>;

/// Selects records within a table.
///
/// # Example
///
/// ```rust
/// use serde_json::json;
/// use shopfront_store::Condition;
///
/// let mine = Condition::fields([("user_id", json!(1)), ("product_id", json!(7))]);
/// let cheap = Condition::predicate(|r| r["price"].as_f64().is_some_and(|p| p < 10.0));
/// let one = Condition::by_id(3);
/// # let _ = (mine, cheap, one);
/// ```
#[derive(Clone)]
pub enum Condition {
    /// Keep records for which the closure returns true.
    Predicate(Predicate),
    /// Keep records where every listed field strictly equals the given value.
    FieldEquals(Record),
    /// Keep the record whose `id` equals this value.
    ById(u64),
}

impl Condition {
    /// Build a [`Condition::Predicate`] from a closure.
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&Record) -> bool + Send + Sync + 'static,
    {
        Condition::Predicate(Arc::new(f))
    }

    /// Build a single-field [`Condition::FieldEquals`].
    pub fn field(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::fields([(key, value)])
    }

    /// Build a multi-field [`Condition::FieldEquals`].
    pub fn fields<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Condition::FieldEquals(
            pairs
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }

    /// Build a [`Condition::ById`].
    pub fn by_id(id: u64) -> Self {
        Condition::ById(id)
    }

    /// Whether `record` satisfies this condition.
    ///
    /// An empty field mapping matches every record.
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Condition::Predicate(f) => f(record),
            Condition::FieldEquals(expected) => expected.iter().all(|(key, value)| {
                record.get(key).is_some_and(|actual| strict_eq(actual, value))
            }),
            Condition::ById(id) => record
                .get("id")
                .is_some_and(|actual| strict_eq(actual, &Value::from(*id))),
        }
    }
}

impl From<u64> for Condition {
    fn from(id: u64) -> Self {
        Condition::ById(id)
    }
}

impl From<Record> for Condition {
    fn from(fields: Record) -> Self {
        Condition::FieldEquals(fields)
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Predicate(_) => f.write_str("Predicate(..)"),
            Condition::FieldEquals(fields) => f.debug_tuple("FieldEquals").field(fields).finish(),
            Condition::ById(id) => f.debug_tuple("ById").field(id).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn test_field_equals_requires_every_field() {
        let condition = Condition::fields([("a", json!(1)), ("b", json!(2))]);
        assert!(condition.matches(&record(json!({"a": 1, "b": 2, "c": 3}))));
        assert!(!condition.matches(&record(json!({"a": 1, "b": 3}))));
        assert!(!condition.matches(&record(json!({"a": 1}))));
    }

    #[test]
    fn test_field_equals_is_strict() {
        let condition = Condition::field("user_id", 1);
        assert!(condition.matches(&record(json!({"user_id": 1}))));
        assert!(!condition.matches(&record(json!({"user_id": "1"}))));
    }

    #[test]
    fn test_null_field_does_not_match_missing_field() {
        let condition = Condition::field("phone", Value::Null);
        assert!(condition.matches(&record(json!({"phone": null}))));
        assert!(!condition.matches(&record(json!({}))));
    }

    #[test]
    fn test_empty_mapping_matches_everything() {
        let condition = Condition::FieldEquals(Record::new());
        assert!(condition.matches(&record(json!({"id": 9}))));
    }

    #[test]
    fn test_by_id_and_predicate() {
        let row = record(json!({"id": 4, "price": 12.5}));
        assert!(Condition::by_id(4).matches(&row));
        assert!(!Condition::from(5).matches(&row));
        assert!(Condition::predicate(|r| r["price"].as_f64() > Some(10.0)).matches(&row));
    }

    #[test]
    fn test_debug_hides_closure() {
        let condition = Condition::predicate(|_| true);
        assert_eq!(format!("{condition:?}"), "Predicate(..)");
        assert_eq!(format!("{:?}", Condition::by_id(2)), "ById(2)");
    }
}
