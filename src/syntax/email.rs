//! Email addresses carrying confirmation state.
//!
//! The internal form is a JSON document holding the address and its
//! confirmation data; the simple external form is the bare address.
//!
//! ```rust
//! use attribute_engine::syntax::{AttributeValueSyntax, VerifiableEmailSyntax};
//! use serde_json::Value;
//!
//! let syntax = VerifiableEmailSyntax::from_config(&Value::Null).unwrap();
//! let internal = syntax.deserialize_simple("alice@example.com").unwrap();
//! assert_eq!(syntax.serialize_simple(&internal).unwrap(), "alice@example.com");
//! assert!(!syntax.confirmation_info(&internal).unwrap().confirmed);
//! ```

use super::{AttributeValueSyntax, parse_config};
use crate::error::{ValidationError, ValidationResult};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const ID: &str = "verifiableEmail";

const ADDRESS_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";

/// Confirmation state of a single value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationInfo {
    pub confirmed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sent_request_amount: u32,
}

impl ConfirmationInfo {
    pub fn unconfirmed() -> Self {
        Self::default()
    }

    pub fn confirmed_now() -> Self {
        Self {
            confirmed: true,
            confirmation_date: Some(Utc::now()),
            sent_request_amount: 0,
        }
    }
}

/// Typed email value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiableEmail {
    pub value: String,
    #[serde(default)]
    pub confirmation_data: ConfirmationInfo,
}

impl VerifiableEmail {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            confirmation_data: ConfirmationInfo::unconfirmed(),
        }
    }

    pub fn confirmed(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            confirmation_data: ConfirmationInfo::confirmed_now(),
        }
    }

    /// Parse the internal form. A bare address is read as unconfirmed.
    pub fn from_internal(value: &str) -> ValidationResult<Self> {
        let trimmed = value.trim();
        if trimmed.starts_with('{') {
            serde_json::from_str(trimmed)
                .map_err(|e| ValidationError::invalid_value(ID, value, e.to_string()))
        } else {
            Ok(Self::new(trimmed))
        }
    }

    pub fn to_internal(&self) -> ValidationResult<String> {
        serde_json::to_string(self)
            .map_err(|e| ValidationError::invalid_value(ID, &self.value, e.to_string()))
    }

    /// Local part compared exactly, domain case-insensitively.
    pub fn same_address(&self, other: &VerifiableEmail) -> bool {
        match (self.value.rsplit_once('@'), other.value.rsplit_once('@')) {
            (Some((local_a, domain_a)), Some((local_b, domain_b))) => {
                local_a == local_b && domain_a.eq_ignore_ascii_case(domain_b)
            }
            _ => self.value == other.value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct VerifiableEmailSyntaxConfig {
    pub max_length: usize,
}

impl Default for VerifiableEmailSyntaxConfig {
    fn default() -> Self {
        Self { max_length: 320 }
    }
}

#[derive(Debug, Clone)]
pub struct VerifiableEmailSyntax {
    config: VerifiableEmailSyntaxConfig,
    address: Regex,
}

impl VerifiableEmailSyntax {
    pub fn from_config(config: &Value) -> ValidationResult<Self> {
        let config = parse_config(ID, config)?;
        let address = Regex::new(ADDRESS_PATTERN).map_err(|e| {
            ValidationError::InvalidSyntaxConfiguration {
                syntax: ID.to_string(),
                details: e.to_string(),
            }
        })?;
        Ok(Self { config, address })
    }

    fn check_address(&self, address: &str) -> ValidationResult<()> {
        if address.chars().count() > self.config.max_length {
            return Err(ValidationError::invalid_value(
                ID,
                address,
                format!("longer than {} characters", self.config.max_length),
            ));
        }
        if !self.address.is_match(address) {
            return Err(ValidationError::invalid_value(
                ID,
                address,
                "not a valid email address",
            ));
        }
        Ok(())
    }

    fn parse(&self, value: &str) -> ValidationResult<VerifiableEmail> {
        let email = VerifiableEmail::from_internal(value)?;
        self.check_address(&email.value)?;
        Ok(email)
    }
}

impl AttributeValueSyntax for VerifiableEmailSyntax {
    fn id(&self) -> &'static str {
        ID
    }

    fn validate(&self, value: &str) -> ValidationResult<()> {
        self.parse(value).map(|_| ())
    }

    fn are_equal(&self, a: &str, b: &str) -> bool {
        match (
            VerifiableEmail::from_internal(a),
            VerifiableEmail::from_internal(b),
        ) {
            (Ok(a), Ok(b)) => a.same_address(&b),
            _ => a == b,
        }
    }

    fn convert_from_string(&self, value: &str) -> ValidationResult<Value> {
        let email = self.parse(value)?;
        serde_json::to_value(&email).map_err(|e| ValidationError::invalid_value(ID, value, e.to_string()))
    }

    fn convert_to_string(&self, value: &Value) -> ValidationResult<String> {
        let email = match value {
            Value::String(address) => VerifiableEmail::new(address.trim()),
            other => serde_json::from_value(other.clone())
                .map_err(|e| ValidationError::invalid_value(ID, other.to_string(), e.to_string()))?,
        };
        self.check_address(&email.value)?;
        email.to_internal()
    }

    fn serialize_simple(&self, value: &str) -> ValidationResult<String> {
        Ok(VerifiableEmail::from_internal(value)?.value)
    }

    fn deserialize_simple(&self, value: &str) -> ValidationResult<String> {
        let address = value.trim();
        self.check_address(address)?;
        VerifiableEmail::new(address).to_internal()
    }

    fn is_email_verifiable(&self) -> bool {
        true
    }

    fn confirmation_info(&self, value: &str) -> Option<ConfirmationInfo> {
        VerifiableEmail::from_internal(value)
            .ok()
            .map(|email| email.confirmation_data)
    }

    fn with_confirmation(&self, value: &str, info: &ConfirmationInfo) -> ValidationResult<String> {
        let mut email = VerifiableEmail::from_internal(value)?;
        email.confirmation_data = info.clone();
        email.to_internal()
    }

    fn serialized_configuration(&self) -> Value {
        serde_json::to_value(&self.config).unwrap_or(Value::Null)
    }
}
