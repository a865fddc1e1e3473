// Global configuration parameters (the credentials blob lives here).
// Injected into the services that need it rather than read from process
// globals, so tests can swap in their own store.

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Process-wide key/value parameter store.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get_param(&self, key: &str) -> Result<Option<String>, ConfigError>;

    /// `None` clears the parameter.
    async fn set_param(&self, key: &str, value: Option<&str>) -> Result<(), ConfigError>;
}
