//! Counters describing what the executor has done.

use serde::Serialize;

/// Executor statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    /// Operations handed to `queue_operation`, counting re-admitted retries.
    pub queued: usize,
    /// Composite requests sent.
    pub composite_calls: usize,
    /// Single requests sent (batching disabled).
    pub single_calls: usize,
    pub succeeded: usize,
    pub suppressed: usize,
    pub failed: usize,
    pub retries_scheduled: usize,
    pub declined: usize,
    /// Pending or retry-scheduled work dropped by cancellation.
    pub abandoned: usize,
}

impl BatchStats {
    /// Operations that reached a terminal state.
    pub fn settled(&self) -> usize {
        self.succeeded + self.suppressed + self.failed + self.declined
    }
}
