//! Integer and floating point values with optional bounds.

use super::{AttributeValueSyntax, parse_config, value_as_text};
use crate::error::{ValidationError, ValidationResult};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

pub const INTEGER_ID: &str = "integer";
pub const FLOATING_POINT_ID: &str = "floatingPoint";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IntegerSyntaxConfig {
    pub min: i64,
    pub max: i64,
}

impl Default for IntegerSyntaxConfig {
    fn default() -> Self {
        Self {
            min: i64::MIN,
            max: i64::MAX,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IntegerSyntax {
    config: IntegerSyntaxConfig,
}

impl IntegerSyntax {
    pub fn from_config(config: &Value) -> ValidationResult<Self> {
        let config: IntegerSyntaxConfig = parse_config(INTEGER_ID, config)?;
        if config.min > config.max {
            return Err(ValidationError::InvalidSyntaxConfiguration {
                syntax: INTEGER_ID.to_string(),
                details: format!("min {} is greater than max {}", config.min, config.max),
            });
        }
        Ok(Self { config })
    }

    fn parse(&self, value: &str) -> ValidationResult<i64> {
        let parsed: i64 = value
            .trim()
            .parse()
            .map_err(|_| ValidationError::invalid_value(INTEGER_ID, value, "not an integer"))?;
        if parsed < self.config.min || parsed > self.config.max {
            return Err(ValidationError::invalid_value(
                INTEGER_ID,
                value,
                format!("outside of [{}, {}]", self.config.min, self.config.max),
            ));
        }
        Ok(parsed)
    }
}

impl AttributeValueSyntax for IntegerSyntax {
    fn id(&self) -> &'static str {
        INTEGER_ID
    }

    fn validate(&self, value: &str) -> ValidationResult<()> {
        self.parse(value).map(|_| ())
    }

    fn are_equal(&self, a: &str, b: &str) -> bool {
        match (a.trim().parse::<i64>(), b.trim().parse::<i64>()) {
            (Ok(a), Ok(b)) => a == b,
            _ => a == b,
        }
    }

    fn convert_from_string(&self, value: &str) -> ValidationResult<Value> {
        Ok(Value::Number(Number::from(self.parse(value)?)))
    }

    fn convert_to_string(&self, value: &Value) -> ValidationResult<String> {
        Ok(self.parse(&value_as_text(value))?.to_string())
    }

    fn deserialize_simple(&self, value: &str) -> ValidationResult<String> {
        Ok(self.parse(value)?.to_string())
    }

    fn serialized_configuration(&self) -> Value {
        serde_json::to_value(&self.config).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FloatingPointSyntaxConfig {
    pub min: f64,
    pub max: f64,
}

impl Default for FloatingPointSyntaxConfig {
    fn default() -> Self {
        Self {
            min: f64::MIN,
            max: f64::MAX,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FloatingPointSyntax {
    config: FloatingPointSyntaxConfig,
}

impl FloatingPointSyntax {
    pub fn from_config(config: &Value) -> ValidationResult<Self> {
        let config: FloatingPointSyntaxConfig = parse_config(FLOATING_POINT_ID, config)?;
        if config.min > config.max {
            return Err(ValidationError::InvalidSyntaxConfiguration {
                syntax: FLOATING_POINT_ID.to_string(),
                details: format!("min {} is greater than max {}", config.min, config.max),
            });
        }
        Ok(Self { config })
    }

    fn parse(&self, value: &str) -> ValidationResult<f64> {
        let parsed: f64 = value
            .trim()
            .parse()
            .map_err(|_| ValidationError::invalid_value(FLOATING_POINT_ID, value, "not a number"))?;
        if !parsed.is_finite() {
            return Err(ValidationError::invalid_value(
                FLOATING_POINT_ID,
                value,
                "not a finite number",
            ));
        }
        if parsed < self.config.min || parsed > self.config.max {
            return Err(ValidationError::invalid_value(
                FLOATING_POINT_ID,
                value,
                format!("outside of [{}, {}]", self.config.min, self.config.max),
            ));
        }
        Ok(parsed)
    }
}

impl AttributeValueSyntax for FloatingPointSyntax {
    fn id(&self) -> &'static str {
        FLOATING_POINT_ID
    }

    fn validate(&self, value: &str) -> ValidationResult<()> {
        self.parse(value).map(|_| ())
    }

    fn are_equal(&self, a: &str, b: &str) -> bool {
        match (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
            (Ok(a), Ok(b)) => a == b,
            _ => a == b,
        }
    }

    fn convert_from_string(&self, value: &str) -> ValidationResult<Value> {
        let parsed = self.parse(value)?;
        Number::from_f64(parsed)
            .map(Value::Number)
            .ok_or_else(|| ValidationError::invalid_value(FLOATING_POINT_ID, value, "not a finite number"))
    }

    fn convert_to_string(&self, value: &Value) -> ValidationResult<String> {
        Ok(self.parse(&value_as_text(value))?.to_string())
    }

    fn deserialize_simple(&self, value: &str) -> ValidationResult<String> {
        Ok(self.parse(value)?.to_string())
    }

    fn serialized_configuration(&self) -> Value {
        serde_json::to_value(&self.config).unwrap_or(Value::Null)
    }
}
