// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Storage error types for the Shopfront document store.
//
// These errors stay inside the crate boundary: backends report them, and the
// store turns them into log lines plus a degraded result (an empty document
// on read, `false` on write). They are public so that custom backends can
// produce them.

use thiserror::Error;

/// Errors that can occur while reading or writing the backing document.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred in the underlying storage layer.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to serialize the document.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// The stored bytes are not a valid document.
    #[error("corrupted data: {0}")]
    CorruptedData(String),

    /// The storage backend is not available.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only fs");
        let err = StoreError::Io(io_err);
        assert!(err.to_string().contains("I/O error"));
        assert!(err.to_string().contains("read-only fs"));
    }

    #[test]
    fn test_corrupted_data_display() {
        let err = StoreError::CorruptedData("expected value at line 1".to_string());
        assert_eq!(
            err.to_string(),
            "corrupted data: expected value at line 1"
        );
    }

    #[test]
    fn test_backend_unavailable_display() {
        let err = StoreError::BackendUnavailable("disk detached".to_string());
        assert!(err.to_string().contains("backend unavailable"));
    }
}
