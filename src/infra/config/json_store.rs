// File-backed parameter store. The whole map is kept in memory and written
// out as pretty JSON on every change.

use crate::core::config::{ConfigError, ConfigStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;

pub struct JsonConfigStore {
    path: PathBuf,
    cache: RwLock<HashMap<String, String>>,
}

impl JsonConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let cache = if path.exists() {
            let file = std::fs::File::open(&path).expect("Failed to open config parameters file");
            let map: HashMap<String, String> = serde_json::from_reader(file).unwrap_or_default();
            RwLock::new(map)
        } else {
            RwLock::new(HashMap::new())
        };

        Self { path, cache }
    }

    async fn persist(&self) -> Result<(), ConfigError> {
        let cache = self.cache.read().await;
        let file = std::fs::File::create(&self.path)?;
        serde_json::to_writer_pretty(file, &*cache)?;
        Ok(())
    }
}

#[async_trait]
impl ConfigStore for JsonConfigStore {
    async fn get_param(&self, key: &str) -> Result<Option<String>, ConfigError> {
        let cache = self.cache.read().await;
        Ok(cache.get(key).cloned())
    }

    async fn set_param(&self, key: &str, value: Option<&str>) -> Result<(), ConfigError> {
        let mut cache = self.cache.write().await;
        match value {
            Some(value) => cache.insert(key.to_string(), value.to_string()),
            None => cache.remove(key),
        };
        drop(cache); // Release lock before persisting
        self.persist().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_params_survive_reopening() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let store = JsonConfigStore::new(&path);
        store
            .set_param("crm_sheets.google_key_file", Some("blob"))
            .await
            .unwrap();

        let reopened = JsonConfigStore::new(&path);
        assert_eq!(
            reopened
                .get_param("crm_sheets.google_key_file")
                .await
                .unwrap()
                .as_deref(),
            Some("blob")
        );
    }

    #[tokio::test]
    async fn test_clearing_removes_the_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let store = JsonConfigStore::new(&path);
        store.set_param("k", Some("v")).await.unwrap();
        store.set_param("k", None).await.unwrap();

        assert_eq!(store.get_param("k").await.unwrap(), None);
        let reopened = JsonConfigStore::new(&path);
        assert_eq!(reopened.get_param("k").await.unwrap(), None);
    }
}
