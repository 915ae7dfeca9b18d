use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_max_connections() -> u32 {
    5
}

fn default_max_register_attempts() -> u32 {
    5
}

fn default_register_retry_backoff_ms() -> u64 {
    10
}

/// Connection settings for the Postgres backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: default_max_connections(),
        }
    }
}

/// Tuning for `RunRepository`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Total tries `register_model` gets before surfacing a version conflict.
    #[serde(default = "default_max_register_attempts")]
    pub max_register_attempts: u32,
    /// Base delay between tries; attempt `n` waits `n` times this.
    #[serde(default = "default_register_retry_backoff_ms")]
    pub register_retry_backoff_ms: u64,
}

impl RepositoryConfig {
    pub fn register_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.register_retry_backoff_ms)
    }
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            max_register_attempts: default_max_register_attempts(),
            register_retry_backoff_ms: default_register_retry_backoff_ms(),
        }
    }
}
