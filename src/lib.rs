//! Bulkop: Batched Record Operations
//!
//! Bulk create, update, upsert, delete and invoke operations against a remote
//! record service. Operations are grouped into bounded composite requests,
//! per-item outcomes are routed back to their source records, and transient
//! failures are retried with exponential backoff.

pub mod batch;
pub mod cli;
pub mod config;
pub mod error;
pub mod fault;
pub mod logging;
pub mod operation;
pub mod record;
pub mod rpc;
