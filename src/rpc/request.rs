//! Request and response envelopes exchanged with the record service.

use crate::record::{EntityReference, IntersectLink, Record};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Named request with an open parameter map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OrganizationRequest {
    pub request_name: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

impl OrganizationRequest {
    pub fn new(request_name: impl Into<String>) -> Self {
        Self {
            request_name: request_name.into(),
            parameters: Map::new(),
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }

    pub fn create(record: &Record) -> Self {
        Self::new("Create").with_parameter("Target", record_value(record))
    }

    pub fn update(record: &Record) -> Self {
        Self::new("Update").with_parameter("Target", record_value(record))
    }

    pub fn upsert(record: &Record) -> Self {
        Self::new("Upsert").with_parameter("Target", record_value(record))
    }

    pub fn delete(target: &EntityReference) -> Self {
        Self::new("Delete").with_parameter("Target", reference_value(target))
    }

    pub fn disassociate(link: &IntersectLink) -> Self {
        Self::new("Disassociate")
            .with_parameter("Target", reference_value(&link.entity1))
            .with_parameter("Relationship", Value::String(link.relationship.clone()))
            .with_parameter("RelatedEntities", json!([reference_value(&link.entity2)]))
    }

    /// Copy pass-through flags into the parameter map.
    pub fn apply(&mut self, pass_through: &PassThrough) {
        if !pass_through.bypass_business_logic_execution.is_empty() {
            let modes: Vec<&str> = pass_through
                .bypass_business_logic_execution
                .iter()
                .map(|mode| mode.as_str())
                .collect();
            self.parameters.insert(
                "BypassBusinessLogicExecution".to_string(),
                Value::String(modes.join(",")),
            );
        }
        if !pass_through.bypass_step_ids.is_empty() {
            self.parameters.insert(
                "BypassBusinessLogicExecutionStepIds".to_string(),
                Value::String(pass_through.bypass_step_ids.join(",")),
            );
        }
    }
}

fn record_value(record: &Record) -> Value {
    serde_json::to_value(record).unwrap_or(Value::Null)
}

fn reference_value(reference: &EntityReference) -> Value {
    json!({ "table": reference.logical_name, "id": reference.id })
}

/// Successful response with its result map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OrganizationResponse {
    #[serde(default)]
    pub response_name: String,
    #[serde(default)]
    pub results: Map<String, Value>,
}

impl OrganizationResponse {
    pub fn new(response_name: impl Into<String>) -> Self {
        Self {
            response_name: response_name.into(),
            results: Map::new(),
        }
    }

    pub fn with_result(mut self, name: impl Into<String>, value: Value) -> Self {
        self.results.insert(name.into(), value);
        self
    }
}

/// Custom business-logic categories the service can be told to skip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
pub enum BypassMode {
    CustomSync,
    CustomAsync,
}

impl BypassMode {
    pub fn as_str(self) -> &'static str {
        match self {
            BypassMode::CustomSync => "CustomSync",
            BypassMode::CustomAsync => "CustomAsync",
        }
    }
}

/// Flags copied onto every constructed request without interpretation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassThrough {
    #[serde(default)]
    pub bypass_business_logic_execution: Vec<BypassMode>,
    #[serde(default)]
    pub bypass_step_ids: Vec<String>,
}
