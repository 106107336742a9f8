use std::collections::HashMap;
use tokio::sync::RwLock;
use async_trait::async_trait;

use crate::{check_revision, validate_key, Revision, Storage, StorageError, StorageResult, Versioned};

/// In-memory storage implementation.
///
/// Values are replaced whole under the write lock, so a reader sees either
/// the previous or the next document, never a mix.
pub struct MemoryStorage {
    data: RwLock<HashMap<String, Versioned<Vec<u8>>>>,
}

impl MemoryStorage {
    /// Create a new memory storage instance
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn put(&self, key: &str, data: &[u8]) -> StorageResult<Revision> {
        validate_key(key)?;
        let mut storage = self.data.write().await;
        let revision = storage.get(key).map_or(1, |v| v.revision + 1);
        storage.insert(
            key.to_string(),
            Versioned {
                value: data.to_vec(),
                revision,
            },
        );
        Ok(revision)
    }

    async fn get_with_revision(&self, key: &str) -> StorageResult<Versioned<Vec<u8>>> {
        let storage = self.data.read().await;
        storage
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::KeyNotFound(key.to_string()))
    }

    async fn put_if_revision(
        &self,
        key: &str,
        expected: Option<Revision>,
        data: &[u8],
    ) -> StorageResult<Revision> {
        validate_key(key)?;
        let mut storage = self.data.write().await;
        let revision = check_revision(key, expected, storage.get(key).map(|v| v.revision))?;
        storage.insert(
            key.to_string(),
            Versioned {
                value: data.to_vec(),
                revision,
            },
        );
        Ok(revision)
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let mut storage = self.data.write().await;
        if storage.remove(key).is_none() {
            return Err(StorageError::KeyNotFound(key.to_string()));
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let storage = self.data.read().await;
        Ok(storage.contains_key(key))
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let storage = self.data.read().await;
        let mut keys: Vec<String> = storage
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }
}
