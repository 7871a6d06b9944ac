//! Built-in defaults every configuration starts from.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("connection.access_token_env", "BULKOP_ACCESS_TOKEN")?
        .set_default("connection.timeout_secs", 120)?
        .set_default("batch.batch_size", 100)?
        .set_default("batch.retries", 0)?
        .set_default("batch.initial_retry_delay_secs", 5)?
        .set_default("batch.retry_poll_interval_ms", 1000)
}
