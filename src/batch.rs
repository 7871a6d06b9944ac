//! Batched operation execution: accumulator, retry scheduler and cancellation.

pub mod cancel;
pub mod executor;
pub mod retry;
pub mod settings;
pub mod stats;

pub use cancel::CancellationSignal;
pub use executor::BatchExecutor;
pub use retry::RetryQueue;
pub use settings::{BatchSettings, MAX_BATCH_SIZE, MAX_INITIAL_RETRY_DELAY};
pub use stats::BatchStats;
