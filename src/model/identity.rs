//! Entity identities and identity types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Numeric id of an entity.
pub type EntityId = u64;

/// One identity of an entity, e.g. a user name or an email address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub type_id: String,
    pub value: String,
    pub entity_id: EntityId,
}

impl Identity {
    pub fn new(type_id: impl Into<String>, value: impl Into<String>, entity_id: EntityId) -> Self {
        Self {
            type_id: type_id.into(),
            value: value.into(),
            entity_id,
        }
    }
}

/// Identity type with the attributes it extracts from identity values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityType {
    pub name: String,
    /// Identity component name to attribute type name.
    #[serde(default)]
    pub extracted_attributes: BTreeMap<String, String>,
}

impl IdentityType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extracted_attributes: BTreeMap::new(),
        }
    }

    pub fn with_extracted(mut self, component: impl Into<String>, attribute: impl Into<String>) -> Self {
        self.extracted_attributes.insert(component.into(), attribute.into());
        self
    }
}
