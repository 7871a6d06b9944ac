//! Operations: the per-record unit of work and its callback surface.

pub mod context;
pub mod host;
pub mod kind;

pub use context::{backoff_delay, Disposition, OperationContext, RetryBudget};
pub use host::{OperationFailure, OperationHost};
pub use kind::OperationKind;
