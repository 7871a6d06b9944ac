//! Record Service Client
//!
//! The engine only needs two calls from the remote record service: execute one
//! request, or execute an ordered list of requests as one composite round-trip.
//! Everything else about the connection lives behind [`OrganizationService`].

use crate::error::RpcError;
use crate::fault::Fault;
use async_trait::async_trait;

pub mod http;
pub mod request;

pub use http::HttpOrganizationService;
pub use request::{BypassMode, OrganizationRequest, OrganizationResponse, PassThrough};

/// Per-item outcome of a composite call, in submission order.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    Success(OrganizationResponse),
    Fault(Fault),
    /// The service returned nothing for this position.
    Missing,
}

/// Record service client trait
#[async_trait]
pub trait OrganizationService: Send + Sync {
    /// Execute a single request.
    async fn execute(&self, request: OrganizationRequest) -> Result<OrganizationResponse, RpcError>;

    /// Execute requests as one composite call. Outcome `i` belongs to request `i`.
    /// An `Err` means no per-item outcome is available.
    async fn execute_multiple(
        &self,
        requests: Vec<OrganizationRequest>,
    ) -> Result<Vec<ItemOutcome>, RpcError>;
}
