// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The persisted document: every table plus the per-table id sequences,
// stored as one JSON object.
//
// On disk the document looks like:
//
// ```text
// {
//   "addresses": [ { "id": 1, "created_at": "...", ... } ],
//   "cart_items": [],
//   ...
//   "sequences": { "addresses": 2, "cart_items": 1, ... }
// }
// ```
//
// Tables outside the default set (for example `reviews`) are kept as-is.
// Members that are not arrays (say `"meta": {"version": 2}`) and array
// entries that are not objects are not usable as records, but they are
// carried along and written back unchanged.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::StoreError;

/// One row: an open mapping of field name to JSON value.
pub type Record = Map<String, Value>;

/// Tables present in every freshly created document.
pub const DEFAULT_TABLES: [&str; 8] = [
    "users",
    "categories",
    "shops",
    "products",
    "cart_items",
    "orders",
    "order_items",
    "addresses",
];

const SEQUENCES_KEY: &str = "sequences";

/// The whole database as loaded from (or written to) the backing file.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Table name to its records, in insertion order.
    tables: BTreeMap<String, Vec<Record>>,
    /// Table name to the next id that will be assigned.
    sequences: BTreeMap<String, u64>,
    /// Non-object entries found in a table, written back after its records.
    stray_rows: BTreeMap<String, Vec<Value>>,
    /// Top-level members that are neither tables nor `sequences`.
    extra: Map<String, Value>,
}

impl Default for Document {
    fn default() -> Self {
        let mut document = Self {
            tables: BTreeMap::new(),
            sequences: BTreeMap::new(),
            stray_rows: BTreeMap::new(),
            extra: Map::new(),
        };
        document.ensure_defaults();
        document
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for (name, records) in &self.tables {
            match self.stray_rows.get(name) {
                Some(stray) => {
                    let rows: Vec<Value> = records
                        .iter()
                        .cloned()
                        .map(Value::Object)
                        .chain(stray.iter().cloned())
                        .collect();
                    map.serialize_entry(name, &rows)?;
                }
                None => map.serialize_entry(name, records)?,
            }
        }
        for (key, value) in &self.extra {
            map.serialize_entry(key, value)?;
        }
        map.serialize_entry(SEQUENCES_KEY, &self.sequences)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for Document {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let members = Map::<String, Value>::deserialize(deserializer)
            .map_err(|err| de::Error::custom(format!("document must be a JSON object: {err}")))?;
        Ok(Self::from_members(members))
    }
}

impl Document {
    /// Sort top-level members into tables, sequences and preserved extras.
    fn from_members(members: Map<String, Value>) -> Self {
        let mut document = Self {
            tables: BTreeMap::new(),
            sequences: BTreeMap::new(),
            stray_rows: BTreeMap::new(),
            extra: Map::new(),
        };

        for (key, value) in members {
            match value {
                // Unusable counters are dropped and recomputed from the table's ids.
                Value::Object(sequences) if key == SEQUENCES_KEY => {
                    for (table, next) in sequences {
                        if let Some(next) = next.as_u64() {
                            document.sequences.insert(table, next);
                        }
                    }
                }
                _ if key == SEQUENCES_KEY => {}
                Value::Array(rows) => {
                    let mut records = Vec::with_capacity(rows.len());
                    let mut stray = Vec::new();
                    for row in rows {
                        match row {
                            Value::Object(record) => records.push(record),
                            other => stray.push(other),
                        }
                    }
                    if !stray.is_empty() {
                        document.stray_rows.insert(key.clone(), stray);
                    }
                    document.tables.insert(key, records);
                }
                other => {
                    document.extra.insert(key, other);
                }
            }
        }
        document
    }

    /// Top-level members kept verbatim because they are not tables.
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    /// A fresh document: all default tables empty, all sequences at 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a document from raw JSON bytes, filling in any missing default
    /// tables or sequences.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, StoreError> {
        let mut document: Document = serde_json::from_slice(bytes)
            .map_err(|err| StoreError::CorruptedData(err.to_string()))?;
        document.ensure_defaults();
        Ok(document)
    }

    /// Serialize as pretty-printed JSON (two-space indent).
    pub fn to_pretty_vec(&self) -> Result<Vec<u8>, StoreError> {
        serde_json::to_vec_pretty(self)
            .map_err(|err| StoreError::SerializationError(err.to_string()))
    }

    /// Make sure every default table and its sequence exist.
    ///
    /// Returns `true` if anything had to be added.
    pub fn ensure_defaults(&mut self) -> bool {
        let mut changed = false;
        for table in DEFAULT_TABLES {
            if !self.tables.contains_key(table) {
                self.extra.remove(table);
                self.tables.insert(table.to_string(), Vec::new());
                changed = true;
            }
            if !self.sequences.contains_key(table) {
                self.sequences.insert(table.to_string(), 1);
                changed = true;
            }
        }
        changed
    }

    /// Records of `name`, or an empty slice for an unknown table.
    pub fn table(&self, name: &str) -> &[Record] {
        self.tables.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Mutable records of `name`, creating the table if it does not exist.
    pub fn table_mut(&mut self, name: &str) -> &mut Vec<Record> {
        self.extra.remove(name);
        self.tables.entry(name.to_string()).or_default()
    }

    /// Whether a table named `name` exists (possibly empty).
    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Names of all tables in the document.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// The raw stored sequence value for `name`, if any.
    pub fn sequence(&self, name: &str) -> Option<u64> {
        self.sequences.get(name).copied()
    }

    /// All stored sequences.
    pub fn sequences(&self) -> &BTreeMap<String, u64> {
        &self.sequences
    }

    /// The id the next insert into `name` should receive.
    ///
    /// This is the stored sequence (1 when missing), raised past the largest
    /// id already in the table so a hand-edited file cannot cause reuse.
    pub fn next_sequence(&self, name: &str) -> u64 {
        let stored = self.sequence(name).unwrap_or(1).max(1);
        let past_max = self
            .table(name)
            .iter()
            .filter_map(record_id)
            .max()
            .map_or(1, |max| max + 1);
        stored.max(past_max)
    }

    /// Overwrite the sequence for `name`.
    pub fn set_sequence(&mut self, name: &str, next: u64) {
        self.sequences.insert(name.to_string(), next);
    }

    /// Raise the sequence for `name` to at least `next`; never lowers it.
    pub fn raise_sequence(&mut self, name: &str, next: u64) {
        let entry = self.sequences.entry(name.to_string()).or_insert(1);
        if next > *entry {
            *entry = next;
        }
    }
}

/// The `id` field of a record, when it is a non-negative integer.
pub fn record_id(record: &Record) -> Option<u64> {
    record.get("id").and_then(Value::as_u64)
}

/// ISO-8601 UTC timestamp with millisecond precision, e.g.
/// `2026-10-17T08:30:00.000Z`.
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// [`iso_timestamp`] of the current instant.
pub fn now_timestamp() -> String {
    iso_timestamp(Utc::now())
}
