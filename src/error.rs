//! Error types for the bulk operation engine.

use crate::fault::Fault;
use thiserror::Error;

/// Failure of a single call against the record service.
#[derive(Debug, Clone, Error)]
pub enum RpcError {
    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("{0}")]
    Fault(Fault),

    #[error("Invalid response from service: {0}")]
    InvalidResponse(String),
}

impl RpcError {
    /// The structured fault, when the service returned one.
    pub fn fault(&self) -> Option<&Fault> {
        match self {
            RpcError::Fault(fault) => Some(fault),
            _ => None,
        }
    }
}

impl From<Fault> for RpcError {
    fn from(fault: Fault) -> Self {
        RpcError::Fault(fault)
    }
}

/// Top-level errors for configuration, input and engine lifecycle.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid input record: {0}")]
    InvalidInput(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Service error: {0}")]
    Rpc(#[from] RpcError),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::InvalidInput(err.to_string())
    }
}
