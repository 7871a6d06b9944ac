//! Callback surface the engine reports through.

use crate::error::RpcError;
use serde_json::Value;
use std::fmt;

/// A terminal failure of one operation, with what it was doing.
#[derive(Debug, Clone)]
pub struct OperationFailure {
    pub action: &'static str,
    pub target: String,
    /// Calls made for this operation, including the failing one.
    pub attempts: u32,
    pub error: RpcError,
}

impl fmt::Display for OperationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} failed", self.action, self.target)?;
        if self.attempts > 1 {
            write!(f, " after {} attempts", self.attempts)?;
        }
        write!(f, ": {}", self.error)
    }
}

/// Caller-supplied sink for diagnostics, errors, results and confirmation.
pub trait OperationHost: Send + Sync {
    /// Diagnostic text about one operation.
    fn write_verbose(&self, message: &str);

    /// Non-terminating error attributed to the source record.
    fn write_error(&self, failure: &OperationFailure, input: &Value);

    /// Success output.
    fn write_output(&self, output: Value);

    /// Confirmation gate. Returning false drops the operation silently.
    fn should_process(&self, target: &str, action: &str) -> bool;
}
