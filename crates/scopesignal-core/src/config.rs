//! Classifier configuration shared by the library crates and the CLI.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_CACHE_DIR: &str = ".scopesignal_cache";
pub const DEFAULT_BACKOFF_UNIT: Duration = Duration::from_secs(1);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_MODEL: &str = "deepseek-chat";
pub const DEFAULT_BASE_URL: &str = "https://api.deepseek.com";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("max_retries must be at least 1")]
    ZeroRetries,
    #[error("batch_concurrency must be at least 1")]
    ZeroConcurrency,
    #[error("request_timeout must be non-zero")]
    ZeroTimeout,
    #[error("{0} must not be empty")]
    Empty(&'static str),
}

/// Settings consumed by the classify pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierConfig {
    /// Total attempts per classification, first call included.
    pub max_retries: u32,
    pub cache_ttl: Duration,
    pub cache_enabled: bool,
    pub cache_dir: PathBuf,
    /// Backoff before attempt `n + 1` is `backoff_unit * 2^(n - 1)`.
    pub backoff_unit: Duration,
    pub request_timeout: Duration,
    pub batch_concurrency: usize,
    pub model: String,
    pub base_url: String,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            cache_ttl: DEFAULT_CACHE_TTL,
            cache_enabled: true,
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            backoff_unit: DEFAULT_BACKOFF_UNIT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            batch_concurrency: 1,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl ClassifierConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retries == 0 {
            return Err(ConfigError::ZeroRetries);
        }
        if self.batch_concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.model.trim().is_empty() {
            return Err(ConfigError::Empty("model"));
        }
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Empty("base_url"));
        }
        Ok(())
    }
}
