//! Durable storage for the session token pair

use async_trait::async_trait;
use log::warn;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::{ApiError, Result};

/// Key/value storage for persisted tokens, the client-side equivalent of browser
/// local storage.
#[async_trait]
pub trait TokenStorage: Send + Sync {
    /// Read a value
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete a value; missing keys are not an error
    async fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory token storage for tests and ephemeral sessions
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-populated with values
    pub fn with_values(values: &[(&str, &str)]) -> Self {
        let map = values
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self {
            values: Arc::new(Mutex::new(map)),
        }
    }

    /// Number of stored values
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.values.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl TokenStorage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.lock().remove(key);
        Ok(())
    }
}

/// Token storage backed by a JSON file, surviving process restarts
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl FileStorage {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<HashMap<String, String>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(HashMap::new()),
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(map) => Ok(map),
                Err(e) => {
                    warn!("Ignoring unreadable token file {}: {}", self.path.display(), e);
                    Ok(HashMap::new())
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(ApiError::storage(e)),
        }
    }

    async fn write_all(&self, values: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(ApiError::storage)?;
            }
        }
        let json = serde_json::to_vec_pretty(values).map_err(ApiError::storage)?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(ApiError::storage)
    }
}

#[async_trait]
impl TokenStorage for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_all().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut values = self.read_all().await?;
        values.insert(key.to_string(), value.to_string());
        self.write_all(&values).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut values = self.read_all().await?;
        if values.remove(key).is_some() {
            self.write_all(&values).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_storage_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session").join("tokens.json");

        let storage = FileStorage::new(&path);
        assert_eq!(storage.get("access_token").await.unwrap(), None);
        storage.set("access_token", "a1").await.unwrap();
        storage.set("refresh_token", "r1").await.unwrap();

        let reopened = FileStorage::new(&path);
        assert_eq!(reopened.get("access_token").await.unwrap(), Some("a1".to_string()));

        reopened.remove("access_token").await.unwrap();
        reopened.remove("missing").await.unwrap();
        assert_eq!(storage.get("access_token").await.unwrap(), None);
        assert_eq!(storage.get("refresh_token").await.unwrap(), Some("r1".to_string()));
    }

    #[test]
    fn test_memory_storage() {
        tokio_test::block_on(async {
            let storage = MemoryStorage::with_values(&[("access_token", "a")]);
            assert_eq!(storage.len(), 1);
            assert_eq!(storage.get("access_token").await.unwrap().as_deref(), Some("a"));

            let shared = storage.clone();
            shared.set("refresh_token", "r").await.unwrap();
            assert_eq!(storage.len(), 2);

            storage.remove("access_token").await.unwrap();
            storage.remove("refresh_token").await.unwrap();
            assert!(storage.is_empty());
        });
    }
}
