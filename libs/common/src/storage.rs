//! Local persistence for the client
//!
//! This module provides a small string key-value store backed by files on
//! disk, one file per key. The client uses it to persist the session
//! snapshot between launches.

use crate::error::StorageResult;
use std::path::PathBuf;
use tokio::fs;
use tracing::debug;

/// File-backed key-value store
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at the given directory
    ///
    /// The directory is created lazily on the first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileStore { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Write a value under a key, replacing any previous value
    ///
    /// The value is staged to a temporary file and renamed into place, so a
    /// torn write never surfaces on read.
    pub async fn write(&self, key: &str, value: &str) -> StorageResult<()> {
        fs::create_dir_all(&self.dir).await?;

        let path = self.path_for(key);
        let staging = self.dir.join(format!("{key}.json.tmp"));
        fs::write(&staging, value).await?;
        fs::rename(&staging, &path).await?;

        debug!("Persisted {} ({} bytes)", key, value.len());
        Ok(())
    }

    /// Read the value stored under a key, if any
    pub async fn read(&self, key: &str) -> StorageResult<Option<String>> {
        match fs::read_to_string(self.path_for(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a key; removing an absent key is not an error
    pub async fn delete(&self, key: &str) -> StorageResult<()> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
