//! File system storage
//!
//! Each key maps to one file below the base path. The file starts with the
//! key's revision as 8 big-endian bytes, followed by the value. Writes go to
//! a uniquely named temporary sibling that is flushed and renamed into place,
//! so a reader always sees a complete revision/value pair.
//!
//! Every mutation runs under an exclusive lock on `<base>/.lock`, which also
//! serialises writers in other processes sharing the directory.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use async_trait::async_trait;
use fs2::FileExt;
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::debug;

use crate::{check_revision, validate_key, Revision, Storage, StorageError, StorageResult, Versioned};

const HEADER_LEN: usize = 8;
const LOCK_FILE: &str = ".lock";

/// A file system-based storage implementation
pub struct FileStorage {
    base_path: PathBuf,
    /// Keeps this process to one blocking lock waiter at a time
    write_lock: Mutex<()>,
}

impl FileStorage {
    /// Open (and create if needed) a storage rooted at `base_path`
    pub fn new(base_path: PathBuf) -> StorageResult<Self> {
        std::fs::create_dir_all(&base_path)
            .map_err(|e| StorageError::IoError(format!("Failed to create directory: {}", e)))?;

        Ok(FileStorage {
            base_path,
            write_lock: Mutex::new(()),
        })
    }

    fn get_full_path(&self, key: &str) -> PathBuf {
        let mut path = self.base_path.clone();
        path.push(key);
        path
    }

    /// Run `op` on a blocking thread while holding the store-wide file lock
    async fn with_store_lock<T, F>(&self, op: F) -> StorageResult<T>
    where
        F: FnOnce() -> StorageResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let _guard = self.write_lock.lock().await;
        let lock_path = self.base_path.join(LOCK_FILE);

        tokio::task::spawn_blocking(move || {
            // Released when the handle is dropped
            let _lock = acquire_lock(&lock_path)?;
            op()
        })
        .await
        .map_err(|e| StorageError::IoError(format!("Storage task failed: {}", e)))?
    }
}

fn acquire_lock(path: &Path) -> StorageResult<File> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(path)
        .map_err(|e| StorageError::IoError(format!("Failed to open lock file: {}", e)))?;
    file.lock_exclusive()
        .map_err(|e| StorageError::IoError(format!("Failed to lock storage: {}", e)))?;
    Ok(file)
}

fn decode_record(key: &str, raw: Vec<u8>) -> StorageResult<Versioned<Vec<u8>>> {
    if raw.len() < HEADER_LEN {
        return Err(StorageError::DeserializationError(format!(
            "Truncated record for key {}",
            key
        )));
    }

    let mut header = [0u8; HEADER_LEN];
    header.copy_from_slice(&raw[..HEADER_LEN]);

    Ok(Versioned {
        value: raw[HEADER_LEN..].to_vec(),
        revision: u64::from_be_bytes(header),
    })
}

fn read_entry(path: &Path, key: &str) -> StorageResult<Option<Versioned<Vec<u8>>>> {
    match std::fs::read(path) {
        Ok(raw) => decode_record(key, raw).map(Some),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StorageError::IoError(format!("Failed to read data: {}", e))),
    }
}

fn write_entry(path: &Path, key: &str, revision: Revision, data: &[u8]) -> StorageResult<()> {
    let parent = path
        .parent()
        .ok_or_else(|| StorageError::InvalidKey(key.to_string()))?;
    std::fs::create_dir_all(parent)
        .map_err(|e| StorageError::IoError(format!("Failed to create directory: {}", e)))?;

    let mut tmp = NamedTempFile::new_in(parent)
        .map_err(|e| StorageError::IoError(format!("Failed to create temp file: {}", e)))?;
    let write_err = |e: std::io::Error| StorageError::IoError(format!("Failed to write data: {}", e));
    tmp.write_all(&revision.to_be_bytes()).map_err(write_err)?;
    tmp.write_all(data).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path)
        .map_err(|e| StorageError::IoError(format!("Failed to commit data: {}", e.error)))?;

    debug!(key, revision, "wrote record");
    Ok(())
}

#[async_trait]
impl Storage for FileStorage {
    async fn put(&self, key: &str, data: &[u8]) -> StorageResult<Revision> {
        validate_key(key)?;
        let path = self.get_full_path(key);
        let key = key.to_string();
        let data = data.to_vec();

        self.with_store_lock(move || {
            let revision = read_entry(&path, &key)?.map_or(1, |v| v.revision + 1);
            write_entry(&path, &key, revision, &data)?;
            Ok(revision)
        })
        .await
    }

    async fn get_with_revision(&self, key: &str) -> StorageResult<Versioned<Vec<u8>>> {
        validate_key(key)?;
        let raw = match tokio::fs::read(self.get_full_path(key)).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::KeyNotFound(key.to_string()))
            }
            Err(e) => return Err(StorageError::IoError(format!("Failed to read data: {}", e))),
        };
        decode_record(key, raw)
    }

    async fn put_if_revision(
        &self,
        key: &str,
        expected: Option<Revision>,
        data: &[u8],
    ) -> StorageResult<Revision> {
        validate_key(key)?;
        let path = self.get_full_path(key);
        let key = key.to_string();
        let data = data.to_vec();

        self.with_store_lock(move || {
            let actual = read_entry(&path, &key)?.map(|v| v.revision);
            let revision = check_revision(&key, expected, actual)?;
            write_entry(&path, &key, revision, &data)?;
            Ok(revision)
        })
        .await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        validate_key(key)?;
        let path = self.get_full_path(key);
        let key = key.to_string();

        self.with_store_lock(move || match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::KeyNotFound(key)),
            Err(e) => Err(StorageError::IoError(format!("Failed to delete file: {}", e))),
        })
        .await
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        validate_key(key)?;
        Ok(tokio::fs::metadata(self.get_full_path(key)).await.is_ok())
    }

    /// Lists the files directly inside the directory named by `prefix`,
    /// skipping the lock file and in-flight temp files
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let mut result = Vec::new();
        let dir = prefix.trim_end_matches('/');
        let prefix_path = self.get_full_path(dir);

        let mut entries = match tokio::fs::read_dir(&prefix_path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(result),
            Err(e) => return Err(StorageError::IoError(format!("Failed to read directory: {}", e))),
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::IoError(format!("Failed to read directory entry: {}", e)))?
        {
            let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
            if !is_file {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with('.') {
                    result.push(format!("{}/{}", dir, name));
                }
            }
        }

        result.sort();
        Ok(result)
    }
}
