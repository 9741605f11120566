//! Free text values with length bounds and an optional pattern.

use super::{AttributeValueSyntax, parse_config, value_as_text};
use crate::error::{ValidationError, ValidationResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const ID: &str = "string";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct StringSyntaxConfig {
    pub min_length: usize,
    pub max_length: usize,
    /// Pattern every value must match in full.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regexp: Option<String>,
}

impl Default for StringSyntaxConfig {
    fn default() -> Self {
        Self {
            min_length: 0,
            max_length: 1024,
            regexp: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StringSyntax {
    config: StringSyntaxConfig,
    pattern: Option<Regex>,
}

impl StringSyntax {
    pub fn new(config: StringSyntaxConfig) -> ValidationResult<Self> {
        if config.min_length > config.max_length {
            return Err(ValidationError::InvalidSyntaxConfiguration {
                syntax: ID.to_string(),
                details: format!(
                    "minLength {} is greater than maxLength {}",
                    config.min_length, config.max_length
                ),
            });
        }
        let pattern = config
            .regexp
            .as_deref()
            .map(|re| Regex::new(&format!("^(?:{})$", re)))
            .transpose()
            .map_err(|e| ValidationError::InvalidSyntaxConfiguration {
                syntax: ID.to_string(),
                details: e.to_string(),
            })?;
        Ok(Self { config, pattern })
    }

    pub fn from_config(config: &Value) -> ValidationResult<Self> {
        Self::new(parse_config(ID, config)?)
    }

    pub fn config(&self) -> &StringSyntaxConfig {
        &self.config
    }
}

impl AttributeValueSyntax for StringSyntax {
    fn id(&self) -> &'static str {
        ID
    }

    fn validate(&self, value: &str) -> ValidationResult<()> {
        let length = value.chars().count();
        if length < self.config.min_length {
            return Err(ValidationError::invalid_value(
                ID,
                value,
                format!("shorter than {} characters", self.config.min_length),
            ));
        }
        if length > self.config.max_length {
            return Err(ValidationError::invalid_value(
                ID,
                value,
                format!("longer than {} characters", self.config.max_length),
            ));
        }
        if let Some(pattern) = &self.pattern {
            if !pattern.is_match(value) {
                return Err(ValidationError::invalid_value(
                    ID,
                    value,
                    format!("does not match '{}'", pattern.as_str()),
                ));
            }
        }
        Ok(())
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_length_bounds() {
        let syntax = StringSyntax::from_config(&json!({"minLength": 2, "maxLength": 4})).unwrap();
        assert!(syntax.validate("a").is_err());
        assert!(syntax.validate("ab").is_ok());
        assert!(syntax.validate("abcd").is_ok());
        assert!(syntax.validate("abcde").is_err());
    }

    #[test]
    fn test_regexp_must_match_whole_value() {
        let syntax = StringSyntax::from_config(&json!({"regexp": "[a-z]+"})).unwrap();
        assert!(syntax.validate("abc").is_ok());
        assert!(syntax.validate("abc1").is_err());
    }

    #[test]
    fn test_invalid_config() {
        assert!(StringSyntax::from_config(&json!({"regexp": "("})).is_err());
        assert!(StringSyntax::from_config(&json!({"minLength": 5, "maxLength": 1})).is_err());
        assert!(StringSyntax::from_config(&json!({"colour": "red"})).is_err());
    }

    #[test]
    fn test_serialized_configuration() {
        let syntax = StringSyntax::from_config(&json!({"maxLength": 10})).unwrap();
        assert_eq!(
            syntax.serialized_configuration(),
            json!({"minLength": 0, "maxLength": 10})
        );
    }
}
