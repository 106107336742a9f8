//! Storage system for coopvote
//!
//! Byte-oriented key-value storage where every key carries a revision. The
//! revision lets callers apply read-modify-write cycles as conditional
//! writes, so concurrent writers to the same key cannot lose each other's
//! updates. This crate provides:
//! - the `Storage` trait and its JSON extension `JsonStorage`
//! - an in-memory implementation
//! - a file-system implementation

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

pub mod file_storage;
pub mod memory_storage;

pub use file_storage::FileStorage;
pub use memory_storage::MemoryStorage;

/// Monotonic per-key write counter; the first write of a key yields 1
pub type Revision = u64;

/// Storage-related errors
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Revision conflict on {key}: expected {expected:?}, found {actual:?}")]
    RevisionConflict {
        key: String,
        expected: Option<Revision>,
        actual: Option<Revision>,
    },
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() {
            StorageError::DeserializationError(err.to_string())
        } else {
            StorageError::SerializationError(err.to_string())
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// A stored value together with the revision it was read at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<T> {
    pub value: T,
    pub revision: Revision,
}

/// The core Storage trait defining the operations all storage implementations must support
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    /// Store data at the specified key unconditionally, returning the new revision
    async fn put(&self, key: &str, data: &[u8]) -> StorageResult<Revision>;

    /// Retrieve data and its current revision
    async fn get_with_revision(&self, key: &str) -> StorageResult<Versioned<Vec<u8>>>;

    /// Store data only if the key is still at `expected` (`None` means the key
    /// must not exist yet). Fails with `RevisionConflict` otherwise.
    async fn put_if_revision(
        &self,
        key: &str,
        expected: Option<Revision>,
        data: &[u8],
    ) -> StorageResult<Revision>;

    /// Delete data at the specified key
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Check if a key exists
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// List all keys with a given prefix
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>>;

    /// Retrieve data from the specified key
    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        Ok(self.get_with_revision(key).await?.value)
    }
}

/// Extension trait for JSON serialization/deserialization
#[async_trait]
pub trait JsonStorage: Storage {
    /// Store a serializable value at the specified key
    async fn put_json<T: Serialize + Send + Sync>(&self, key: &str, value: &T) -> StorageResult<Revision> {
        let json_data = serde_json::to_vec_pretty(value)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
        self.put(key, &json_data).await
    }

    /// Retrieve and deserialize a value from the specified key
    async fn get_json<T: DeserializeOwned + Send>(&self, key: &str) -> StorageResult<T> {
        Ok(self.get_json_with_revision(key).await?.value)
    }

    /// Retrieve and deserialize a value along with its revision
    async fn get_json_with_revision<T: DeserializeOwned + Send>(
        &self,
        key: &str,
    ) -> StorageResult<Versioned<T>> {
        let stored = self.get_with_revision(key).await?;
        let value = serde_json::from_slice(&stored.value)
            .map_err(|e| StorageError::DeserializationError(e.to_string()))?;
        Ok(Versioned {
            value,
            revision: stored.revision,
        })
    }

    /// Conditionally store a serializable value
    async fn put_json_if_revision<T: Serialize + Send + Sync>(
        &self,
        key: &str,
        expected: Option<Revision>,
        value: &T,
    ) -> StorageResult<Revision> {
        let json_data = serde_json::to_vec_pretty(value)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
        self.put_if_revision(key, expected, &json_data).await
    }
}

// Implement JsonStorage for any type that implements Storage
impl<T: Storage + ?Sized> JsonStorage for T {}

/// Reject keys that are empty or could escape a storage root
pub(crate) fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty()
        || key.starts_with('/')
        || key.split('/').any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Shared revision check used by every implementation
pub(crate) fn check_revision(
    key: &str,
    expected: Option<Revision>,
    actual: Option<Revision>,
) -> StorageResult<Revision> {
    if expected != actual {
        return Err(StorageError::RevisionConflict {
            key: key.to_string(),
            expected,
            actual,
        });
    }
    Ok(actual.map_or(1, |rev| rev + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("resolutions/abc").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("/etc/passwd").is_err());
        assert!(validate_key("resolutions/../secrets").is_err());
        assert!(validate_key("resolutions//abc").is_err());
    }

    #[test]
    fn test_check_revision() {
        assert_eq!(check_revision("k", None, None).unwrap(), 1);
        assert_eq!(check_revision("k", Some(3), Some(3)).unwrap(), 4);
        assert!(matches!(
            check_revision("k", Some(2), Some(3)),
            Err(StorageError::RevisionConflict { expected: Some(2), actual: Some(3), .. })
        ));
        assert!(check_revision("k", None, Some(1)).is_err());
    }
}
