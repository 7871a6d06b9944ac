//! Record model shared by operations and the service client.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Pointer to one row in one table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityReference {
    #[serde(rename = "table")]
    pub logical_name: String,
    pub id: Uuid,
}

impl EntityReference {
    pub fn new(logical_name: impl Into<String>, id: Uuid) -> Self {
        Self {
            logical_name: logical_name.into(),
            id,
        }
    }
}

impl fmt::Display for EntityReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.logical_name, self.id)
    }
}

/// A table row with its column values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "table")]
    pub logical_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl Record {
    pub fn new(logical_name: impl Into<String>) -> Self {
        Self {
            logical_name: logical_name.into(),
            id: None,
            attributes: Map::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    /// Reference to this record, if it has an id.
    pub fn reference(&self) -> Option<EntityReference> {
        self.id
            .map(|id| EntityReference::new(self.logical_name.clone(), id))
    }

    /// Human-readable target used in confirmation prompts and diagnostics.
    pub fn target_label(&self) -> String {
        match self.id {
            Some(id) => format!("{}:{}", self.logical_name, id),
            None => format!("{} (new)", self.logical_name),
        }
    }
}

/// A row of a many-to-many intersect table, identified by the two rows it links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntersectLink {
    pub relationship: String,
    pub entity1: EntityReference,
    pub entity2: EntityReference,
}

impl fmt::Display for IntersectLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} <-> {})", self.relationship, self.entity1, self.entity2)
    }
}
