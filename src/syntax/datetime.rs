//! RFC 3339 timestamps, normalised to UTC.

use super::{AttributeValueSyntax, value_as_text};
use crate::error::{ValidationError, ValidationResult};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Value, json};

pub const ID: &str = "dateTime";

#[derive(Debug, Clone, Default)]
pub struct DateTimeSyntax;

impl DateTimeSyntax {
    /// The syntax has no options; anything but `null` or `{}` is rejected.
    pub fn from_config(config: &Value) -> ValidationResult<Self> {
        match config {
            Value::Null => Ok(Self),
            Value::Object(map) if map.is_empty() => Ok(Self),
            other => Err(ValidationError::InvalidSyntaxConfiguration {
                syntax: ID.to_string(),
                details: format!("unexpected configuration {}", other),
            }),
        }
    }

    fn parse(value: &str) -> ValidationResult<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(value.trim())
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| ValidationError::invalid_value(ID, value, e.to_string()))
    }

    fn format(value: &DateTime<Utc>) -> String {
        value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }
}

impl AttributeValueSyntax for DateTimeSyntax {
    fn id(&self) -> &'static str {
        ID
    }

    fn validate(&self, value: &str) -> ValidationResult<()> {
        Self::parse(value).map(|_| ())
    }

    fn are_equal(&self, a: &str, b: &str) -> bool {
        match (Self::parse(a), Self::parse(b)) {
            (Ok(a), Ok(b)) => a == b,
            _ => a == b,
        }
    }

    fn convert_from_string(&self, value: &str) -> ValidationResult<Value> {
        Ok(Value::String(Self::format(&Self::parse(value)?)))
    }

    fn convert_to_string(&self, value: &Value) -> ValidationResult<String> {
        Ok(Self::format(&Self::parse(&value_as_text(value))?))
    }

    fn deserialize_simple(&self, value: &str) -> ValidationResult<String> {
        Ok(Self::format(&Self::parse(value)?))
    }

    fn serialized_configuration(&self) -> Value {
        json!({})
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalised_to_utc() {
        let syntax = DateTimeSyntax;
        assert_eq!(
            syntax.deserialize_simple("2024-05-01T12:00:00+02:00").unwrap(),
            "2024-05-01T10:00:00Z"
        );
        assert!(syntax.are_equal("2024-05-01T12:00:00+02:00", "2024-05-01T10:00:00Z"));
        assert!(syntax.validate("yesterday").is_err());
    }

    #[test]
    fn test_config() {
        assert!(DateTimeSyntax::from_config(&json!({})).is_ok());
        assert!(DateTimeSyntax::from_config(&json!({"zone": "UTC"})).is_err());
    }
}
