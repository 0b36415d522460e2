// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Metrics-collecting wrapper for document store backends.
//
// Wraps any `StorageBackend` and transparently counts reads and writes,
// write failures, latency sums and byte totals. The API's health endpoint
// reports these numbers.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::backend::StorageBackend;
use crate::error::StoreError;

/// Accumulated statistics for a backend.
///
/// All counters are monotonically increasing for the lifetime of the
/// [`MetricsBackend`] that owns them.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BackendStats {
    /// Number of `read` operations performed.
    pub read_count: u64,
    /// Number of `write` operations attempted.
    pub write_count: u64,
    /// Number of `write` operations that returned an error.
    pub failed_write_count: u64,
    /// Cumulative wall-clock latency of all `read` calls, in milliseconds.
    pub read_latency_sum_ms: f64,
    /// Cumulative wall-clock latency of all `write` calls, in milliseconds.
    pub write_latency_sum_ms: f64,
    /// Total bytes returned by successful reads.
    pub total_bytes_read: u64,
    /// Total bytes handed to successful writes.
    pub total_bytes_written: u64,
}

/// A backend wrapper that collects operation metrics.
///
/// # Example
///
/// ```rust
/// use shopfront_store::backend::StorageBackend;
/// use shopfront_store::memory::InMemoryBackend;
/// use shopfront_store::metrics::MetricsBackend;
///
/// # tokio_test::block_on(async {
/// let metered = MetricsBackend::new(InMemoryBackend::new());
/// metered.write(b"{}").await.unwrap();
/// metered.read().await.unwrap();
///
/// let stats = metered.stats().await;
/// assert_eq!(stats.write_count, 1);
/// assert_eq!(stats.read_count, 1);
/// # });
/// ```
pub struct MetricsBackend<B: StorageBackend> {
    /// The wrapped backend that performs the actual storage operations.
    inner: B,
    /// Shared, mutable statistics accumulator.
    stats: Arc<RwLock<BackendStats>>,
}

impl<B: StorageBackend> MetricsBackend<B> {
    /// Wrap `inner` with metrics collection.
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            stats: Arc::new(RwLock::new(BackendStats::default())),
        }
    }

    /// Return a snapshot of the current statistics.
    pub async fn stats(&self) -> BackendStats {
        self.stats.read().await.clone()
    }

    /// Reset all statistics to zero.
    pub async fn reset_stats(&self) {
        *self.stats.write().await = BackendStats::default();
    }

    /// Return a reference to the inner backend.
    pub fn inner(&self) -> &B {
        &self.inner
    }
}

#[async_trait]
impl<B: StorageBackend> StorageBackend for MetricsBackend<B> {
    async fn read(&self) -> Result<Option<Vec<u8>>, StoreError> {
        let start = Instant::now();
        let result = self.inner.read().await;
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        let mut s = self.stats.write().await;
        s.read_count += 1;
        s.read_latency_sum_ms += elapsed_ms;
        if let Ok(Some(ref bytes)) = result {
            s.total_bytes_read += bytes.len() as u64;
        }

        result
    }

    async fn write(&self, bytes: &[u8]) -> Result<(), StoreError> {
        let start = Instant::now();
        let result = self.inner.write(bytes).await;
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        let mut s = self.stats.write().await;
        s.write_count += 1;
        s.write_latency_sum_ms += elapsed_ms;
        match result {
            Ok(()) => s.total_bytes_written += bytes.len() as u64,
            Err(_) => s.failed_write_count += 1,
        }

        result
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn approximate_size(&self) -> Result<Option<u64>, StoreError> {
        self.inner.approximate_size().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryBackend;

    #[tokio::test]
    async fn test_counts_reads_and_writes() {
        let metered = MetricsBackend::new(InMemoryBackend::new());

        metered.read().await.unwrap();
        metered.write(b"hello").await.unwrap();
        metered.read().await.unwrap();

        let stats = metered.stats().await;
        assert_eq!(stats.read_count, 2);
        assert_eq!(stats.write_count, 1);
        assert_eq!(stats.failed_write_count, 0);
        assert_eq!(stats.total_bytes_written, 5);
        // The first read found nothing; only the second returned bytes.
        assert_eq!(stats.total_bytes_read, 5);
    }

    #[tokio::test]
    async fn test_counts_failed_writes() {
        let inner = InMemoryBackend::new();
        inner.set_reject_writes(true);
        let metered = MetricsBackend::new(inner);

        assert!(metered.write(b"nope").await.is_err());

        let stats = metered.stats().await;
        assert_eq!(stats.write_count, 1);
        assert_eq!(stats.failed_write_count, 1);
        assert_eq!(stats.total_bytes_written, 0);
    }

    #[tokio::test]
    async fn test_reset_and_passthrough() {
        let metered = MetricsBackend::new(InMemoryBackend::new());
        metered.write(b"abc").await.unwrap();
        metered.reset_stats().await;

        assert_eq!(metered.stats().await.write_count, 0);
        assert_eq!(metered.name(), "in-memory");
        assert_eq!(metered.approximate_size().await.unwrap(), Some(3));
        assert_eq!(metered.inner().read().await.unwrap(), Some(b"abc".to_vec()));
    }
}
