//! Attribute types and attribute instances.

use super::group::GroupPath;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// `max_elements` value meaning "no upper bound".
pub const UNLIMITED_ELEMENTS: u32 = u32::MAX;

/// Schema of a named attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeType {
    pub name: String,
    pub value_syntax: String,
    /// Syntax specific configuration, interpreted by the syntax factory.
    #[serde(default)]
    pub value_syntax_config: Value,
    pub min_elements: u32,
    pub max_elements: u32,
    #[serde(default)]
    pub unique_values: bool,
    #[serde(default)]
    pub self_modifiable: bool,
    /// Root group values of a global type show up in every group.
    #[serde(default)]
    pub global: bool,
    #[serde(default)]
    pub flags: u32,
    /// Metadata provider id to provider specific value.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub displayed_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl AttributeType {
    pub const TYPE_IMMUTABLE_FLAG: u32 = 0x01;
    pub const INSTANCES_IMMUTABLE_FLAG: u32 = 0x02;
    const KNOWN_FLAGS: u32 = Self::TYPE_IMMUTABLE_FLAG | Self::INSTANCES_IMMUTABLE_FLAG;

    pub fn new(
        name: impl Into<String>,
        value_syntax: impl Into<String>,
        min_elements: u32,
        max_elements: u32,
    ) -> Self {
        Self {
            name: name.into(),
            value_syntax: value_syntax.into(),
            value_syntax_config: Value::Null,
            min_elements,
            max_elements,
            unique_values: false,
            self_modifiable: false,
            global: false,
            flags: 0,
            metadata: BTreeMap::new(),
            displayed_name: None,
            description: None,
        }
    }

    pub fn with_syntax_config(mut self, config: Value) -> Self {
        self.value_syntax_config = config;
        self
    }

    pub fn with_unique_values(mut self, unique_values: bool) -> Self {
        self.unique_values = unique_values;
        self
    }

    pub fn with_self_modifiable(mut self, self_modifiable: bool) -> Self {
        self.self_modifiable = self_modifiable;
        self
    }

    pub fn with_global(mut self, global: bool) -> Self {
        self.global = global;
        self
    }

    pub fn with_flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_metadata(mut self, provider: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(provider.into(), value.into());
        self
    }

    pub fn with_displayed_name(mut self, displayed_name: impl Into<String>) -> Self {
        self.displayed_name = Some(displayed_name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The definition itself can't be changed apart from its descriptions.
    pub fn is_type_immutable(&self) -> bool {
        self.flags & Self::TYPE_IMMUTABLE_FLAG != 0
    }

    /// Instances can only be written through the system path.
    pub fn is_instance_immutable(&self) -> bool {
        self.flags & Self::INSTANCES_IMMUTABLE_FLAG != 0
    }

    pub fn has_unknown_flags(&self) -> bool {
        self.flags & !Self::KNOWN_FLAGS != 0
    }

    pub fn is_unlimited(&self) -> bool {
        self.max_elements == UNLIMITED_ELEMENTS
    }
}

/// An attribute assigned to an entity in a group. Values are kept in the
/// internal string form of the value syntax.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    pub name: String,
    pub value_syntax: String,
    pub group_path: GroupPath,
    pub values: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_idp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation_profile: Option<String>,
}

impl Attribute {
    pub fn new<I, S>(
        name: impl Into<String>,
        value_syntax: impl Into<String>,
        group_path: GroupPath,
        values: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            value_syntax: value_syntax.into(),
            group_path,
            values: values.into_iter().map(Into::into).collect(),
            remote_idp: None,
            translation_profile: None,
        }
    }

    pub fn with_remote_idp(mut self, remote_idp: impl Into<String>) -> Self {
        self.remote_idp = Some(remote_idp.into());
        self
    }

    pub fn with_translation_profile(mut self, profile: impl Into<String>) -> Self {
        self.translation_profile = Some(profile.into());
        self
    }
}

/// An attribute with its provenance: directly assigned or produced by a
/// statement (or global propagation), plus storage timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeExt {
    #[serde(flatten)]
    pub attribute: Attribute,
    pub direct: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
}

impl AttributeExt {
    /// A directly assigned attribute, created and updated now.
    pub fn direct(attribute: Attribute) -> Self {
        let now = Utc::now();
        Self {
            attribute,
            direct: true,
            created: Some(now),
            updated: Some(now),
        }
    }

    /// An attribute computed during evaluation, without timestamps.
    pub fn derived(attribute: Attribute) -> Self {
        Self {
            attribute,
            direct: false,
            created: None,
            updated: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.attribute.name
    }

    pub fn values(&self) -> &[String] {
        &self.attribute.values
    }

    pub fn group_path(&self) -> &GroupPath {
        &self.attribute.group_path
    }

    pub fn value_syntax(&self) -> &str {
        &self.attribute.value_syntax
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flags() {
        let at = AttributeType::new("cn", "string", 1, 1);
        assert!(!at.is_type_immutable());
        assert!(!at.is_instance_immutable());
        assert!(!at.has_unknown_flags());

        let at = at.with_flags(AttributeType::TYPE_IMMUTABLE_FLAG | AttributeType::INSTANCES_IMMUTABLE_FLAG);
        assert!(at.is_type_immutable());
        assert!(at.is_instance_immutable());

        assert!(AttributeType::new("x", "string", 0, 1).with_flags(100).has_unknown_flags());
    }

    #[test]
    fn test_attribute_type_json_uses_camel_case() {
        let at = AttributeType::new("email", "verifiableEmail", 0, UNLIMITED_ELEMENTS)
            .with_unique_values(true);
        let json = serde_json::to_value(&at).unwrap();
        assert_eq!(json["valueSyntax"], json!("verifiableEmail"));
        assert_eq!(json["uniqueValues"], json!(true));
        assert_eq!(json["maxElements"], json!(u32::MAX));
    }

    #[test]
    fn test_attribute_ext_flattens_attribute() {
        let ext = AttributeExt::derived(Attribute::new(
            "cn",
            "string",
            GroupPath::root(),
            ["a"],
        ));
        let json = serde_json::to_value(&ext).unwrap();
        assert_eq!(json["name"], json!("cn"));
        assert_eq!(json["groupPath"], json!("/"));
        assert_eq!(json["direct"], json!(false));
        assert!(json.get("created").is_none());
    }
}
