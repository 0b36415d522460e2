// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory storage backend.
//
// Keeps the serialized document in a tokio `RwLock`. Intended for tests and
// ephemeral runs; it can also be told to reject writes so that failure paths
// are reachable without a real disk.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::backend::StorageBackend;
use crate::error::StoreError;

/// An in-memory backend holding one serialized document.
///
/// Clones share state, which makes a clone behave like a second process
/// opening the same file.
///
/// # Example
///
/// ```rust
/// use shopfront_store::backend::StorageBackend;
/// use shopfront_store::memory::InMemoryBackend;
///
/// # tokio_test::block_on(async {
/// let backend = InMemoryBackend::new();
/// assert_eq!(backend.read().await.unwrap(), None);
/// backend.write(b"{}").await.unwrap();
/// assert_eq!(backend.read().await.unwrap(), Some(b"{}".to_vec()));
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    /// The stored bytes, `None` until the first write.
    data: Arc<RwLock<Option<Vec<u8>>>>,
    /// When set, every write fails with `BackendUnavailable`.
    reject_writes: Arc<AtomicBool>,
}

impl InMemoryBackend {
    /// Create a new, empty in-memory backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend that already holds `bytes`, valid or not.
    pub fn with_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            data: Arc::new(RwLock::new(Some(bytes.into()))),
            reject_writes: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make subsequent writes fail (or succeed again).
    pub fn set_reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    /// Overwrite the stored bytes directly, bypassing write rejection.
    pub async fn replace(&self, bytes: impl Into<Vec<u8>>) {
        *self.data.write().await = Some(bytes.into());
    }
}

#[async_trait]
impl StorageBackend for InMemoryBackend {
    async fn read(&self) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.data.read().await.clone())
    }

    async fn write(&self, bytes: &[u8]) -> Result<(), StoreError> {
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(StoreError::BackendUnavailable(
                "in-memory backend is rejecting writes".to_string(),
            ));
        }
        *self.data.write().await = Some(bytes.to_vec());
        Ok(())
    }

    fn name(&self) -> &str {
        "in-memory"
    }

    async fn approximate_size(&self) -> Result<Option<u64>, StoreError> {
        let data = self.data.read().await;
        Ok(Some(data.as_ref().map_or(0, |bytes| bytes.len() as u64)))
    }
}
