// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// JSON file backend: the document lives in a single file on disk.
//
// Writes go to a sibling `<name>.tmp` file which is fsynced and then renamed
// over the target, so readers see either the old or the new document and a
// crash mid-write cannot leave half a JSON object behind.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::backend::StorageBackend;
use crate::error::StoreError;

/// Stores the document at a fixed file path.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    /// Use `path` as the backing file. Nothing is touched until the first
    /// read or write; missing parent directories are created on write.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// The backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "database.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    async fn ensure_parent_dir(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && fs::metadata(parent).await.is_err() {
                fs::create_dir_all(parent).await?;
                info!(dir = %parent.display(), "Created data directory");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for JsonFileBackend {
    async fn read(&self) -> Result<Option<Vec<u8>>, StoreError> {
        match fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn write(&self, bytes: &[u8]) -> Result<(), StoreError> {
        self.ensure_parent_dir().await?;

        let temp = self.temp_path();
        let mut file = fs::File::create(&temp).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp, &self.path).await?;
        debug!(path = %self.path.display(), bytes = bytes.len(), "Wrote document file");
        Ok(())
    }

    fn name(&self) -> &str {
        "json-file"
    }

    async fn approximate_size(&self) -> Result<Option<u64>, StoreError> {
        match fs::metadata(&self.path).await {
            Ok(meta) => Ok(Some(meta.len())),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_reads_as_none() {
        let dir = TempDir::new().unwrap();
        let backend = JsonFileBackend::new(dir.path().join("database.json"));
        assert_eq!(backend.read().await.unwrap(), None);
        assert_eq!(backend.approximate_size().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_write_creates_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data").join("nested").join("database.json");
        let backend = JsonFileBackend::new(&path);

        backend.write(b"{\"users\": []}").await.unwrap();
        assert!(path.exists());
        assert_eq!(
            backend.read().await.unwrap(),
            Some(b"{\"users\": []}".to_vec())
        );
    }

    #[tokio::test]
    async fn test_write_replaces_and_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("database.json");
        let backend = JsonFileBackend::new(&path);

        backend.write(b"a much longer first version").await.unwrap();
        backend.write(b"short").await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"short");
        assert!(!dir.path().join("database.json.tmp").exists());
        assert_eq!(backend.approximate_size().await.unwrap(), Some(5));
    }

    #[tokio::test]
    async fn test_unwritable_target_is_an_error() {
        let dir = TempDir::new().unwrap();
        // The target path is an existing directory, so the rename must fail.
        let target = dir.path().join("occupied");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("keep"), b"x").unwrap();

        let backend = JsonFileBackend::new(&target);
        assert!(backend.write(b"{}").await.is_err());
    }
}
