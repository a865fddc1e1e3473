// In-memory parameter store for tests and throwaway wiring.

use crate::core::config::{ConfigError, ConfigStore};
use async_trait::async_trait;
use dashmap::DashMap;

pub struct InMemoryConfigStore {
    params: DashMap<String, String>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self {
            params: DashMap::new(),
        }
    }
}

impl Default for InMemoryConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn get_param(&self, key: &str) -> Result<Option<String>, ConfigError> {
        Ok(self.params.get(key).map(|v| v.value().clone()))
    }

    async fn set_param(&self, key: &str, value: Option<&str>) -> Result<(), ConfigError> {
        match value {
            Some(value) => {
                self.params.insert(key.to_string(), value.to_string());
            }
            None => {
                self.params.remove(key);
            }
        }
        Ok(())
    }
}
