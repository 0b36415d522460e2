// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Shopfront Document Store
//
// A relational-looking data store kept as one JSON document. Each table is
// an array of records inside the document, and each table has an
// auto-increment sequence. Reads load the whole document; writes replace it
// atomically.
//
// # Modules
//
// - [`backend`] -- The `StorageBackend` trait: where the document bytes live.
// - [`file`] -- The JSON file backend (temp file + rename writes).
// - [`memory`] -- An in-memory backend for tests and ephemeral stores.
// - [`metrics`] -- A transparent wrapper that collects operation statistics.
// - [`document`] -- The document model: tables, sequences, timestamps.
// - [`condition`] -- Record filters for `all`, `get` and `delete`.
// - [`value`] -- Strict equality and ordering over JSON values.
// - [`store`] -- Table operations: `all`, `get`, `insert`, `update`, `delete`.
// - [`sequencer`] -- Debounced id reservation behind `Store::next_id`.
// - [`sql`] -- A SQLite-flavoured `prepare`/`exec`/`pragma` shim.
// - [`error`] -- The `StoreError` enum for backend failures.
//
// # Example
//
// ```rust
// use serde_json::json;
// use shopfront_store::{Condition, InMemoryBackend, Store};
//
// # tokio_test::block_on(async {
// let store = Store::new(InMemoryBackend::new());
// store.initialize().await;
//
// let mut phone = serde_json::Map::new();
// phone.insert("name".into(), json!("Phone"));
// phone.insert("category_id".into(), json!(1));
// let stored = store.insert("products", phone).await;
// assert_eq!(stored["id"], 1);
//
// let found = store.all("products", Some(&Condition::field("category_id", 1))).await;
// assert_eq!(found.len(), 1);
// # });
// ```

pub mod backend;
pub mod condition;
pub mod document;
pub mod error;
pub mod file;
pub mod memory;
pub mod metrics;
pub mod sequencer;
pub mod sql;
pub mod store;
pub mod value;

// Re-export the most commonly used types at the crate root for convenience.
pub use backend::StorageBackend;
pub use condition::Condition;
pub use document::{iso_timestamp, now_timestamp, record_id, Document, Record, DEFAULT_TABLES};
pub use error::StoreError;
pub use file::JsonFileBackend;
pub use memory::InMemoryBackend;
pub use metrics::{BackendStats, MetricsBackend};
pub use sequencer::{IdSequencer, DEFAULT_DEBOUNCE};
pub use sql::{ParsedQuery, RunResult, Statement};
pub use store::{Store, StoreConfig};
pub use value::{compare_values, strict_eq};
