//! Engine settings supplied at construction.

use crate::error::ApiError;
use crate::fault::FaultPolicy;
use crate::rpc::PassThrough;
use std::time::Duration;

/// Largest composite request the service accepts.
pub const MAX_BATCH_SIZE: usize = 1000;

/// Longest accepted base delay for retry backoff (one day).
pub const MAX_INITIAL_RETRY_DELAY: Duration = Duration::from_secs(86400);

#[derive(Debug, Clone, PartialEq)]
pub struct BatchSettings {
    /// Operations per composite request; `1` disables batching.
    pub batch_size: usize,
    /// Retry attempts allotted to each operation.
    pub retries: u32,
    /// Base of the exponential backoff.
    pub initial_retry_delay: Duration,
    /// Upper bound on one sleep in the retry drain.
    pub retry_poll_interval: Duration,
    pub pass_through: PassThrough,
    pub fault_policy: FaultPolicy,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            batch_size: 100,
            retries: 0,
            initial_retry_delay: Duration::from_secs(5),
            retry_poll_interval: Duration::from_secs(1),
            pass_through: PassThrough::default(),
            fault_policy: FaultPolicy::default(),
        }
    }
}

impl BatchSettings {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(ApiError::ConfigError(format!(
                "batch size must be between 1 and {} (got {})",
                MAX_BATCH_SIZE, self.batch_size
            )));
        }
        if self.initial_retry_delay > MAX_INITIAL_RETRY_DELAY {
            return Err(ApiError::ConfigError(format!(
                "initial retry delay must be at most {}s (got {}s)",
                MAX_INITIAL_RETRY_DELAY.as_secs(),
                self.initial_retry_delay.as_secs()
            )));
        }
        if self.retry_poll_interval.is_zero() {
            return Err(ApiError::ConfigError(
                "retry poll interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_batching(&self) -> bool {
        self.batch_size > 1
    }
}
