// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Storage backend trait for the Shopfront document store.
//
// A backend holds exactly one opaque blob: the serialized document. The
// store owns parsing, defaults and recovery; backends only move bytes.

use async_trait::async_trait;

use crate::error::StoreError;

/// A place the serialized document can be read from and written to.
///
/// Implementations must be safe to share across threads and tokio tasks.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Read the stored document bytes.
    ///
    /// Returns `Ok(None)` if nothing has been stored yet, rather than an error.
    async fn read(&self) -> Result<Option<Vec<u8>>, StoreError>;

    /// Replace the stored document bytes with `bytes`.
    async fn write(&self, bytes: &[u8]) -> Result<(), StoreError>;

    /// A human-readable name for this backend, used in logging and health output.
    fn name(&self) -> &str;

    /// Return the size of the stored document in bytes, if known.
    async fn approximate_size(&self) -> Result<Option<u64>, StoreError>;
}

#[async_trait]
impl<B: StorageBackend + ?Sized> StorageBackend for Box<B> {
    async fn read(&self) -> Result<Option<Vec<u8>>, StoreError> {
        (**self).read().await
    }

    async fn write(&self, bytes: &[u8]) -> Result<(), StoreError> {
        (**self).write(bytes).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    async fn approximate_size(&self) -> Result<Option<u64>, StoreError> {
        (**self).approximate_size().await
    }
}
