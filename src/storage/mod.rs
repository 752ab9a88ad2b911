pub mod memory;
pub mod sqlite;

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Primary record array key, shared by both backends.
pub const PRIMARY_KEY: &str = "Snapprompts";
/// Schema version marker, written by whichever process first observes a mismatch.
pub const VERSION_KEY: &str = "SnappromptsVersion";
/// Keys older releases stored snippets under, scavenged during migration and recovery.
pub const LEGACY_KEYS: [&str; 4] = ["snapprompts", "snippets", "prompts", "textSnippets"];

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("sqlite error: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage lock poisoned")]
    LockPoisoned,
}

/// Asynchronous key-value backend. Both the synced and the local store expose
/// this surface; every call is independently fallible and callers fold
/// failures to "found nothing" or "not yet saved" at the point of use.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>, StorageError>;
    async fn set(&self, entries: HashMap<String, Value>) -> Result<(), StorageError>;
    async fn remove(&self, keys: &[&str]) -> Result<(), StorageError>;
}

pub async fn read_key(
    backend: &dyn StorageBackend,
    key: &str,
) -> Result<Option<Value>, StorageError> {
    let mut entries = backend.get(&[key]).await?;
    Ok(entries.remove(key))
}

pub async fn write_key(
    backend: &dyn StorageBackend,
    key: &str,
    value: Value,
) -> Result<(), StorageError> {
    backend.set(HashMap::from([(key.to_string(), value)])).await
}

/// Backend whose every call fails, for exercising degraded paths.
#[cfg(test)]
pub struct FailingBackend;

#[cfg(test)]
#[async_trait]
impl StorageBackend for FailingBackend {
    async fn get(&self, _keys: &[&str]) -> Result<HashMap<String, Value>, StorageError> {
        Err(StorageError::Unavailable("backend offline".to_string()))
    }

    async fn set(&self, _entries: HashMap<String, Value>) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("backend offline".to_string()))
    }

    async fn remove(&self, _keys: &[&str]) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("backend offline".to_string()))
    }
}
