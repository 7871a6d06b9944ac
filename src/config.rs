//! Configuration System
//!
//! Layered configuration for the connection, the batch engine and logging.
//! Sources merge in order: built-in defaults, the global file, workspace files,
//! then `BULKOP__*` environment variables.

use crate::batch::{BatchSettings, MAX_BATCH_SIZE, MAX_INITIAL_RETRY_DELAY};
use crate::fault::{deserialize_codes, FaultPolicy};
use crate::logging::LoggingConfig;
use crate::rpc::PassThrough;
use serde::{Deserialize, Serialize};
use std::time::Duration;

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkopConfig {
    /// Record service connection
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Batch engine settings
    #[serde(default)]
    pub batch: BatchConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where and how to reach the record service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Base URL of the service; `Execute` and `ExecuteMultiple` are appended.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Environment variable holding the bearer token.
    #[serde(default = "default_access_token_env")]
    pub access_token_env: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_access_token_env() -> String {
    "BULKOP_ACCESS_TOKEN".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            access_token_env: default_access_token_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ConnectionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Bearer token from the configured environment variable, if set.
    pub fn access_token(&self) -> Option<String> {
        std::env::var(&self.access_token_env)
            .ok()
            .filter(|token| !token.is_empty())
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(endpoint) = &self.endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(format!("endpoint must be an http(s) URL: {}", endpoint));
            }
        }
        if self.timeout_secs == 0 {
            return Err("timeout_secs must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// Batch engine defaults; CLI flags override per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default)]
    pub retries: u32,

    #[serde(default = "default_initial_retry_delay_secs")]
    pub initial_retry_delay_secs: u64,

    #[serde(default = "default_retry_poll_interval_ms")]
    pub retry_poll_interval_ms: u64,

    /// Fault codes treated as acceptable absence; integers or "0x..." strings
    #[serde(default, deserialize_with = "deserialize_codes")]
    pub suppressed_fault_codes: Vec<i32>,

    /// Fault codes treated as transient in addition to the built-in ones
    #[serde(default, deserialize_with = "deserialize_codes")]
    pub retryable_fault_codes: Vec<i32>,
}

fn default_batch_size() -> usize {
    100
}

fn default_initial_retry_delay_secs() -> u64 {
    5
}

fn default_retry_poll_interval_ms() -> u64 {
    1000
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            retries: 0,
            initial_retry_delay_secs: default_initial_retry_delay_secs(),
            retry_poll_interval_ms: default_retry_poll_interval_ms(),
            suppressed_fault_codes: Vec::new(),
            retryable_fault_codes: Vec::new(),
        }
    }
}

impl BatchConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(format!(
                "batch_size must be between 1 and {} (got {})",
                MAX_BATCH_SIZE, self.batch_size
            ));
        }
        if self.initial_retry_delay_secs > MAX_INITIAL_RETRY_DELAY.as_secs() {
            return Err(format!(
                "initial_retry_delay_secs must be at most {} (got {})",
                MAX_INITIAL_RETRY_DELAY.as_secs(),
                self.initial_retry_delay_secs
            ));
        }
        if self.retry_poll_interval_ms == 0 {
            return Err("retry_poll_interval_ms must be greater than zero".to_string());
        }
        Ok(())
    }

    /// Engine settings from this section plus per-run pass-through flags.
    pub fn to_settings(&self, pass_through: PassThrough) -> BatchSettings {
        BatchSettings {
            batch_size: self.batch_size,
            retries: self.retries,
            initial_retry_delay: Duration::from_secs(self.initial_retry_delay_secs),
            retry_poll_interval: Duration::from_millis(self.retry_poll_interval_ms),
            pass_through,
            fault_policy: FaultPolicy {
                suppressed_codes: self.suppressed_fault_codes.clone(),
                retryable_codes: self.retryable_fault_codes.clone(),
            },
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    Connection(String),
    Batch(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Connection(msg) => write!(f, "Connection: {}", msg),
            ValidationError::Batch(msg) => write!(f, "Batch: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl BulkopConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(e) = self.connection.validate() {
            errors.push(ValidationError::Connection(e));
        }
        if let Err(e) = self.batch.validate() {
            errors.push(ValidationError::Batch(e));
        }
        if let Err(e) = self.logging.validate() {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
