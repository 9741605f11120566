//! Values restricted to a fixed set of strings.

use super::{AttributeValueSyntax, parse_config, value_as_text};
use crate::error::{ValidationError, ValidationResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

pub const ID: &str = "enumeration";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct EnumerationSyntaxConfig {
    pub allowed: BTreeSet<String>,
}

/// Without configuration no value is accepted.
#[derive(Debug, Clone)]
pub struct EnumerationSyntax {
    config: EnumerationSyntaxConfig,
}

impl EnumerationSyntax {
    pub fn from_config(config: &Value) -> ValidationResult<Self> {
        Ok(Self {
            config: parse_config(ID, config)?,
        })
    }

    pub fn allowed(&self) -> &BTreeSet<String> {
        &self.config.allowed
    }
}

impl AttributeValueSyntax for EnumerationSyntax {
    fn id(&self) -> &'static str {
        ID
    }

    fn validate(&self, value: &str) -> ValidationResult<()> {
        if self.config.allowed.contains(value) {
            Ok(())
        } else {
            Err(ValidationError::invalid_value(
                ID,
                value,
                format!("not one of {:?}", self.config.allowed),
            ))
        }
    }

    fn convert_from_string(&self, value: &str) -> ValidationResult<Value> {
        Ok(Value::String(value.to_string()))
    }

    fn convert_to_string(&self, value: &Value) -> ValidationResult<String> {
        Ok(value_as_text(value))
    }

    fn deserialize_simple(&self, value: &str) -> ValidationResult<String> {
        self.validate(value)?;
        Ok(value.to_string())
    }

    fn serialized_configuration(&self) -> Value {
        serde_json::to_value(&self.config).unwrap_or(Value::Null)
    }
}
