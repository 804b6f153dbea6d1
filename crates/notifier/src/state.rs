//! Last-notified timestamps per issue key.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state file {path} could not be read: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("state file {path} could not be written: {source}")]
    Write { path: PathBuf, source: std::io::Error },
    #[error("state file {path} is not a JSON object of strings: {source}")]
    Parse { path: PathBuf, source: serde_json::Error },
    #[error("state could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    fn get(&self, key: &str) -> Option<&str>;
    fn set(&mut self, key: &str, timestamp: &str);
    /// Persists the whole map.
    async fn flush(&self) -> Result<(), StoreError>;
}

/// Flat JSON object file, rewritten in full on every flush.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Loads `path`; a missing file is an empty store.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|source| StoreError::Parse { path: path.clone(), source })?,
            Err(error) if error.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(StoreError::Read { path, source }),
        };
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl NotificationStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    fn set(&mut self, key: &str, timestamp: &str) {
        self.entries.insert(key.to_string(), timestamp.to_string());
    }

    async fn flush(&self) -> Result<(), StoreError> {
        let encoded = serde_json::to_vec(&self.entries)?;
        let staging = self.path.with_extension("json.tmp");
        tokio::fs::write(&staging, &encoded)
            .await
            .map_err(|source| StoreError::Write { path: staging.clone(), source })?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .map_err(|source| StoreError::Write { path: self.path.clone(), source })
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
    flushes: AtomicUsize,
}

impl MemoryStore {
    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    fn set(&mut self, key: &str, timestamp: &str) {
        self.entries.insert(key.to_string(), timestamp.to_string());
    }

    async fn flush(&self) -> Result<(), StoreError> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::{JsonFileStore, NotificationStore, StoreError};

    #[tokio::test]
    async fn missing_file_loads_empty_and_flush_round_trips() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("notified_issues.json");

        let mut store = JsonFileStore::load(&path).await.expect("load");
        assert!(store.is_empty());

        store.set("OPS-1", "2024-03-05T10:15:30.000+0000");
        store.flush().await.expect("flush");

        let raw = std::fs::read_to_string(&path).expect("state file");
        assert_eq!(raw, r#"{"OPS-1":"2024-03-05T10:15:30.000+0000"}"#);

        let reloaded = JsonFileStore::load(&path).await.expect("reload");
        assert_eq!(reloaded.get("OPS-1"), Some("2024-03-05T10:15:30.000+0000"));
        assert_eq!(reloaded.get("OPS-2"), None);
    }

    #[tokio::test]
    async fn corrupt_file_is_a_parse_error() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("state.json");
        std::fs::write(&path, "[1, 2]").expect("write");

        assert!(matches!(JsonFileStore::load(&path).await, Err(StoreError::Parse { .. })));
    }
}
