//! Process-wide configuration for the generation pipeline.
//!
//! Covers collaborator endpoints, storage locations, input limits and the
//! retry budget shared by every collaborator call.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::error::DomainError;
use crate::retry::{RetryPolicy, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY};

/// Default number of record tasks in flight per batch.
pub const DEFAULT_MAX_CONCURRENT_TASKS: usize = 8;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

impl From<ConfigError> for DomainError {
    fn from(err: ConfigError) -> Self {
        DomainError::configuration(err.to_string())
    }
}

/// Configuration for the pipeline and its collaborators.
#[derive(Debug, Clone)]
pub struct AppConfig {
    // Collaborators
    /// PostgreSQL connection URL; only commands that persist need it.
    pub database_url: Option<String>,
    /// Base URL of the LiteLLM proxy.
    pub litellm_api_base: String,
    /// API key for the LiteLLM proxy.
    pub litellm_api_key: Option<String>,

    // Object storage
    /// Root directory of the object store.
    pub object_store_path: PathBuf,
    /// Folder prefix for generated output files.
    pub upload_folder: String,

    // Input limits
    /// Byte ceiling for fetched documents.
    pub max_fetch_bytes: u64,
    /// Timeout for a single fetch request.
    pub fetch_timeout: Duration,
    /// Minimum source length, in characters, worth generating from.
    pub min_source_length: usize,
    /// Question/answer turns per transcript.
    pub max_interactions: usize,

    // Concurrency
    /// Record tasks allowed in flight at once across a batch.
    pub max_concurrent_tasks: usize,

    // Retry
    pub retry_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            litellm_api_base: "http://localhost:4000".to_string(),
            litellm_api_key: None,

            object_store_path: PathBuf::from("./object-store"),
            upload_folder: "synthetic-data".to_string(),

            max_fetch_bytes: crate::fetch::DEFAULT_MAX_FETCH_BYTES,
            fetch_timeout: Duration::from_secs(30),
            min_source_length: 20,
            max_interactions: crate::llm::DEFAULT_MAX_INTERACTIONS,

            max_concurrent_tasks: DEFAULT_MAX_CONCURRENT_TASKS,

            retry_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl AppConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `DATABASE_URL`: PostgreSQL connection URL
    /// - `LITELLM_API_BASE`: LiteLLM proxy base URL (required)
    /// - `LITELLM_API_KEY`: LiteLLM proxy key
    /// - `CONVO_OBJECT_STORE_PATH`: Object store root (default: ./object-store)
    /// - `CONVO_UPLOAD_FOLDER`: Output folder prefix (default: synthetic-data)
    /// - `CONVO_MAX_FETCH_BYTES`: Fetch byte ceiling (default: 2 MiB)
    /// - `CONVO_FETCH_TIMEOUT_SECS`: Fetch timeout (default: 30)
    /// - `CONVO_MIN_SOURCE_LENGTH`: Minimum source length (default: 20)
    /// - `CONVO_MAX_INTERACTIONS`: Turns per transcript (default: 5)
    /// - `CONVO_MAX_CONCURRENT_TASKS`: Record tasks in flight (default: 8)
    /// - `CONVO_RETRY_ATTEMPTS`: Attempts per collaborator call (default: 2)
    /// - `CONVO_RETRY_DELAY_MS`: Delay between attempts (default: 1700)
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        config.database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        config.litellm_api_base = std::env::var("LITELLM_API_BASE")
            .map_err(|_| ConfigError::MissingEnvVar("LITELLM_API_BASE".to_string()))?;

        config.litellm_api_key = std::env::var("LITELLM_API_KEY").ok();

        if let Ok(val) = std::env::var("CONVO_OBJECT_STORE_PATH") {
            config.object_store_path = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("CONVO_UPLOAD_FOLDER") {
            config.upload_folder = val;
        }

        if let Ok(val) = std::env::var("CONVO_MAX_FETCH_BYTES") {
            config.max_fetch_bytes = parse_env_value(&val, "CONVO_MAX_FETCH_BYTES")?;
        }

        if let Ok(val) = std::env::var("CONVO_FETCH_TIMEOUT_SECS") {
            let secs: u64 = parse_env_value(&val, "CONVO_FETCH_TIMEOUT_SECS")?;
            config.fetch_timeout = Duration::from_secs(secs);
        }

        if let Ok(val) = std::env::var("CONVO_MIN_SOURCE_LENGTH") {
            config.min_source_length = parse_env_value(&val, "CONVO_MIN_SOURCE_LENGTH")?;
        }

        if let Ok(val) = std::env::var("CONVO_MAX_INTERACTIONS") {
            config.max_interactions = parse_env_value(&val, "CONVO_MAX_INTERACTIONS")?;
        }

        if let Ok(val) = std::env::var("CONVO_MAX_CONCURRENT_TASKS") {
            config.max_concurrent_tasks = parse_env_value(&val, "CONVO_MAX_CONCURRENT_TASKS")?;
        }

        if let Ok(val) = std::env::var("CONVO_RETRY_ATTEMPTS") {
            config.retry_attempts = parse_env_value(&val, "CONVO_RETRY_ATTEMPTS")?;
        }

        if let Ok(val) = std::env::var("CONVO_RETRY_DELAY_MS") {
            let ms: u64 = parse_env_value(&val, "CONVO_RETRY_DELAY_MS")?;
            config.retry_delay = Duration::from_millis(ms);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.litellm_api_base.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "litellm_api_base cannot be empty".to_string(),
            ));
        }

        if self.upload_folder.trim_matches('/').trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "upload_folder cannot be empty".to_string(),
            ));
        }

        if self.max_fetch_bytes == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_fetch_bytes must be greater than 0".to_string(),
            ));
        }

        if self.fetch_timeout.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "fetch_timeout must be greater than 0".to_string(),
            ));
        }

        if self.max_interactions == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_interactions must be greater than 0".to_string(),
            ));
        }

        if self.max_concurrent_tasks == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_concurrent_tasks must be greater than 0".to_string(),
            ));
        }

        if self.retry_attempts == 0 {
            return Err(ConfigError::ValidationFailed(
                "retry_attempts must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// The database URL, required by commands that persist.
    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))
    }

    /// Retry budget applied to every collaborator call.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_attempts, self.retry_delay)
    }

    /// Builder method to set database URL.
    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    /// Builder method to set the LiteLLM base URL.
    pub fn with_litellm_api_base(mut self, base: impl Into<String>) -> Self {
        self.litellm_api_base = base.into();
        self
    }

    /// Builder method to set object store root.
    pub fn with_object_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.object_store_path = path.into();
        self
    }

    /// Builder method to set the output folder prefix.
    pub fn with_upload_folder(mut self, folder: impl Into<String>) -> Self {
        self.upload_folder = folder.into();
        self
    }

    /// Builder method to set fetch byte ceiling.
    pub fn with_max_fetch_bytes(mut self, bytes: u64) -> Self {
        self.max_fetch_bytes = bytes;
        self
    }

    /// Builder method to set minimum source length.
    pub fn with_min_source_length(mut self, length: usize) -> Self {
        self.min_source_length = length;
        self
    }

    /// Builder method to set turns per transcript.
    pub fn with_max_interactions(mut self, turns: usize) -> Self {
        self.max_interactions = turns;
        self
    }

    /// Builder method to set the record concurrency limit.
    pub fn with_max_concurrent_tasks(mut self, limit: usize) -> Self {
        self.max_concurrent_tasks = limit;
        self
    }

    /// Builder method to set the retry budget.
    pub fn with_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.retry_attempts = attempts;
        self.retry_delay = delay;
        self
    }
}

/// Parse an environment variable value into a type.
fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}
