//! The operation variants and the request each one builds.

use crate::error::ApiError;
use crate::record::{EntityReference, IntersectLink, Record};
use crate::rpc::{OrganizationRequest, OrganizationResponse};
use serde_json::{Map, Value};
use uuid::Uuid;

/// One kind of record operation, carrying only the data it needs.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationKind {
    Create {
        record: Record,
    },
    Update {
        record: Record,
    },
    Upsert {
        record: Record,
    },
    Delete {
        target: EntityReference,
        /// Treat "record does not exist" as success.
        if_exists: bool,
        /// Set when the target row is a many-to-many intersect row.
        intersect: Option<IntersectLink>,
    },
    Invoke {
        request_name: String,
        parameters: Map<String, Value>,
    },
}

impl OperationKind {
    /// Verb shown in confirmation prompts.
    pub fn action(&self) -> &'static str {
        match self {
            OperationKind::Create { .. } => "Create",
            OperationKind::Update { .. } => "Update",
            OperationKind::Upsert { .. } => "Upsert",
            OperationKind::Delete { .. } => "Delete",
            OperationKind::Invoke { .. } => "Invoke",
        }
    }

    /// What the operation acts on, for prompts and diagnostics.
    pub fn target(&self) -> String {
        match self {
            OperationKind::Create { record }
            | OperationKind::Update { record }
            | OperationKind::Upsert { record } => record.target_label(),
            OperationKind::Delete {
                intersect: Some(link),
                ..
            } => link.to_string(),
            OperationKind::Delete { target, .. } => target.to_string(),
            OperationKind::Invoke { request_name, .. } => request_name.clone(),
        }
    }

    /// Reject operations that can never produce a valid request.
    pub fn validate(&self) -> Result<(), ApiError> {
        match self {
            OperationKind::Create { record } | OperationKind::Upsert { record }
                if record.logical_name.is_empty() =>
            {
                Err(ApiError::InvalidInput("record has no table name".to_string()))
            }
            OperationKind::Update { record } if record.id.is_none() => Err(
                ApiError::InvalidInput(format!("update of {} requires an id", record.logical_name)),
            ),
            OperationKind::Upsert { record } if record.id.is_none() => Err(
                ApiError::InvalidInput(format!("upsert of {} requires an id", record.logical_name)),
            ),
            OperationKind::Invoke { request_name, .. } if request_name.is_empty() => {
                Err(ApiError::InvalidInput("request name is empty".to_string()))
            }
            _ => Ok(()),
        }
    }

    /// Build the request from current state. Intersect deletes become disassociations.
    pub fn build_request(&self) -> OrganizationRequest {
        match self {
            OperationKind::Create { record } => OrganizationRequest::create(record),
            OperationKind::Update { record } => OrganizationRequest::update(record),
            OperationKind::Upsert { record } => OrganizationRequest::upsert(record),
            OperationKind::Delete {
                intersect: Some(link),
                ..
            } => OrganizationRequest::disassociate(link),
            OperationKind::Delete { target, .. } => OrganizationRequest::delete(target),
            OperationKind::Invoke {
                request_name,
                parameters,
            } => OrganizationRequest {
                request_name: request_name.clone(),
                parameters: parameters.clone(),
            },
        }
    }

    /// Id of the affected record, reading the service response for creates.
    pub fn result_id(&self, response: &OrganizationResponse) -> Option<Uuid> {
        match self {
            OperationKind::Create { record } => response
                .results
                .get("id")
                .and_then(Value::as_str)
                .and_then(|id| Uuid::parse_str(id).ok())
                .or(record.id),
            OperationKind::Update { record } | OperationKind::Upsert { record } => record.id,
            OperationKind::Delete { target, .. } => Some(target.id),
            OperationKind::Invoke { .. } => None,
        }
    }

    pub fn is_idempotent_delete(&self) -> bool {
        matches!(self, OperationKind::Delete { if_exists: true, .. })
    }
}
