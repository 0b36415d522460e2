// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Table operations over the single persisted document.
//
// Every call loads the whole document from the backend, and every mutation
// writes the whole document back; nothing is cached between calls. Mutations
// (insert, update, delete, save, id flushes) run under one in-process writer
// lock held across the load-mutate-save cycle, so concurrent requests in the
// same process cannot lose each other's writes or hand out the same id.
// Readers never take the lock.
//
// Failures never cross this boundary as errors: an unreadable or corrupt
// document loads as a fresh one, and failed writes are logged and reported
// as `false` where the operation has a boolean result.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::backend::StorageBackend;
use crate::condition::Condition;
use crate::document::{now_timestamp, Document, Record};
use crate::file::JsonFileBackend;
use crate::sequencer::{IdSequencer, DEFAULT_DEBOUNCE};
use crate::value::strict_eq;

/// Store tuning knobs.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Idle window before ids reserved with [`Store::next_id`] are written.
    pub debounce: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

/// Relational-style access to the tables of one document.
///
/// Cloning is cheap and clones share the backend, writer lock and sequencer.
pub struct Store<B: StorageBackend> {
    backend: Arc<B>,
    writer: Arc<Mutex<()>>,
    sequencer: Arc<IdSequencer>,
}

impl<B: StorageBackend> Clone for Store<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            writer: Arc::clone(&self.writer),
            sequencer: Arc::clone(&self.sequencer),
        }
    }
}

impl Store<JsonFileBackend> {
    /// Open the JSON file at `path` and initialize it (see [`Store::initialize`]).
    pub async fn open(path: impl AsRef<Path>, config: StoreConfig) -> Self {
        let store = Self::with_config(JsonFileBackend::new(path), config);
        store.initialize().await;
        store
    }
}

impl<B: StorageBackend + 'static> Store<B> {
    /// Wrap `backend` with default settings.
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, StoreConfig::default())
    }

    /// Wrap `backend` with explicit settings.
    pub fn with_config(backend: B, config: StoreConfig) -> Self {
        Self {
            backend: Arc::new(backend),
            writer: Arc::new(Mutex::new(())),
            sequencer: Arc::new(IdSequencer::new(config.debounce)),
        }
    }

    /// The underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The id sequencer used by [`Store::next_id`].
    pub fn sequencer(&self) -> &IdSequencer {
        &self.sequencer
    }

    /// Load the document, fill in missing default tables and sequences, and
    /// write it back. Returns whether the write succeeded.
    pub async fn initialize(&self) -> bool {
        let _guard = self.writer.lock().await;
        let document = self.read_document().await;
        let saved = self.write_document(&document).await;
        info!(
            backend = self.backend.name(),
            tables = document.table_names().count(),
            saved,
            "Document store initialized"
        );
        saved
    }

    /// Load the full document.
    ///
    /// A missing, unreadable or malformed document yields a fresh default one.
    pub async fn load(&self) -> Document {
        self.read_document().await
    }

    /// Overwrite the stored document with `document`.
    ///
    /// Returns `false` (after logging) if the write failed. A caller doing
    /// its own load-modify-save is not protected against concurrent
    /// mutations between the two calls.
    pub async fn save(&self, document: &Document) -> bool {
        let _guard = self.writer.lock().await;
        self.write_document(document).await
    }

    /// All records of `table` matching `condition` (all records if `None`),
    /// in insertion order. Unknown tables read as empty.
    pub async fn all(&self, table: &str, condition: Option<&Condition>) -> Vec<Record> {
        let document = self.read_document().await;
        document
            .table(table)
            .iter()
            .filter(|record| condition.map_or(true, |c| c.matches(record)))
            .cloned()
            .collect()
    }

    /// The first record of `table` matching `condition`, by insertion order.
    pub async fn get(&self, table: &str, condition: Option<&Condition>) -> Option<Record> {
        let document = self.read_document().await;
        document
            .table(table)
            .iter()
            .find(|record| condition.map_or(true, |c| c.matches(record)))
            .cloned()
    }

    /// Append `record` to `table`, assigning the next id and, unless the
    /// record already carries one, a `created_at` timestamp.
    ///
    /// The table is created if it does not exist. A failed write is logged
    /// but the stored record is still returned.
    pub async fn insert(&self, table: &str, record: Record) -> Record {
        let _guard = self.writer.lock().await;
        let mut document = self.read_document().await;

        let mut id = document.next_sequence(table);
        if let Some(reserved) = self.sequencer.watermark(table) {
            id = id.max(reserved);
        }

        let mut stored = record;
        stored.insert("id".to_string(), Value::from(id));
        if !has_created_at(&stored) {
            stored.insert("created_at".to_string(), Value::String(now_timestamp()));
        }

        document.table_mut(table).push(stored.clone());
        document.set_sequence(table, id + 1);

        if self.write_document(&document).await {
            debug!(table, id, "Inserted record");
        } else {
            warn!(table, id, "Inserted record was not persisted");
        }
        stored
    }

    /// Shallow-merge `patch` into the first record of `table` whose id is
    /// `id`. The record's `id` and `created_at` are never overwritten.
    ///
    /// Returns the updated record, or `None` (without writing) if no record
    /// has that id.
    pub async fn update(&self, table: &str, id: u64, patch: Record) -> Option<Record> {
        let _guard = self.writer.lock().await;
        let mut document = self.read_document().await;

        let target = Value::from(id);
        let record = document
            .table_mut(table)
            .iter_mut()
            .find(|record| record.get("id").is_some_and(|v| strict_eq(v, &target)))?;

        for (key, value) in patch {
            if key == "id" || key == "created_at" {
                continue;
            }
            record.insert(key, value);
        }
        let updated = record.clone();

        if self.write_document(&document).await {
            debug!(table, id, "Updated record");
        } else {
            warn!(table, id, "Updated record was not persisted");
        }
        Some(updated)
    }

    /// Remove every record of `table` matching `condition`.
    ///
    /// Returns whether the resulting document was saved; removing nothing is
    /// still a successful save.
    pub async fn delete(&self, table: &str, condition: &Condition) -> bool {
        let _guard = self.writer.lock().await;
        let mut document = self.read_document().await;

        let records = document.table_mut(table);
        let before = records.len();
        records.retain(|record| !condition.matches(record));
        let removed = before - records.len();

        let saved = self.write_document(&document).await;
        debug!(table, removed, saved, "Deleted records");
        saved
    }

    /// Reserve the next id for `table` without writing the document now.
    ///
    /// The first reservation after a flush schedules a single write after
    /// the debounce window; later reservations join that write without
    /// moving its deadline. Must be called from within a tokio runtime.
    pub async fn next_id(&self, table: &str) -> u64 {
        let id = {
            let _guard = self.writer.lock().await;
            let document = self.read_document().await;
            self.sequencer.reserve(table, document.next_sequence(table))
        };

        if self.sequencer.try_arm() {
            self.schedule_flush();
        }
        debug!(table, id, "Reserved id");
        id
    }

    /// Write all pending id reservations now.
    ///
    /// Watermarks are merged into the freshly loaded document (never
    /// lowering a stored sequence). Returns `true` when there was nothing to
    /// flush or the write succeeded. A failed write keeps the reservations
    /// and schedules another attempt one debounce window later.
    pub async fn flush_pending(&self) -> bool {
        let _guard = self.writer.lock().await;
        let pending = self.sequencer.take_pending();
        if pending.is_empty() {
            return true;
        }

        let mut document = self.read_document().await;
        for (table, next) in &pending {
            document.raise_sequence(table, *next);
        }

        let saved = self.write_document(&document).await;
        if saved {
            debug!(tables = pending.len(), "Flushed reserved ids");
        } else {
            self.sequencer.restore(pending);
            if self.sequencer.try_arm() {
                warn!(
                    retry_in_ms = self.sequencer.debounce().as_millis() as u64,
                    "Id flush failed, retrying"
                );
                self.schedule_flush();
            }
        }
        saved
    }

    fn schedule_flush(&self) {
        let store = self.clone();
        let delay = self.sequencer.debounce();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            store.flush_pending().await;
        });
    }

    async fn read_document(&self) -> Document {
        match self.backend.read().await {
            Ok(Some(bytes)) => match Document::from_slice(&bytes) {
                Ok(document) => document,
                Err(err) => {
                    warn!(
                        backend = self.backend.name(),
                        error = %err,
                        "Stored document is unreadable, using an empty document"
                    );
                    Document::new()
                }
            },
            Ok(None) => Document::new(),
            Err(err) => {
                warn!(
                    backend = self.backend.name(),
                    error = %err,
                    "Failed to read document, using an empty document"
                );
                Document::new()
            }
        }
    }

    async fn write_document(&self, document: &Document) -> bool {
        let bytes = match document.to_pretty_vec() {
            Ok(bytes) => bytes,
            Err(err) => {
                error!(error = %err, "Failed to serialize document");
                return false;
            }
        };

        match self.backend.write(&bytes).await {
            Ok(()) => true,
            Err(err) => {
                error!(backend = self.backend.name(), error = %err, "Failed to save document");
                false
            }
        }
    }
}

fn has_created_at(record: &Record) -> bool {
    match record.get("created_at") {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}
