//! Base64 encoded JPEG, PNG or GIF images.
//!
//! Image values are publicly exposed: each value is served under the hex
//! SHA-256 digest of its bytes.

use super::{AttributeValueSyntax, PublicExposure, parse_config, value_as_text};
use crate::error::{ValidationError, ValidationResult};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt::Write;

pub const ID: &str = "image";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct ImageSyntaxConfig {
    /// Upper bound of the decoded image size in bytes.
    pub max_size: usize,
}

impl Default for ImageSyntaxConfig {
    fn default() -> Self {
        Self { max_size: 1_024_000 }
    }
}

#[derive(Debug, Clone)]
pub struct ImageSyntax {
    config: ImageSyntaxConfig,
}

impl ImageSyntax {
    pub fn from_config(config: &Value) -> ValidationResult<Self> {
        Ok(Self {
            config: parse_config(ID, config)?,
        })
    }

    fn decode(&self, value: &str) -> ValidationResult<(Vec<u8>, &'static str)> {
        let bytes = BASE64
            .decode(value.trim())
            .map_err(|e| ValidationError::invalid_value(ID, abbreviate(value), e.to_string()))?;
        if bytes.len() > self.config.max_size {
            return Err(ValidationError::invalid_value(
                ID,
                abbreviate(value),
                format!(
                    "image of {} bytes exceeds the limit of {} bytes",
                    bytes.len(),
                    self.config.max_size
                ),
            ));
        }
        let content_type = content_type(&bytes).ok_or_else(|| {
            ValidationError::invalid_value(ID, abbreviate(value), "unsupported image format")
        })?;
        Ok((bytes, content_type))
    }
}

fn content_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("image/png")
    } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Some("image/gif")
    } else {
        None
    }
}

fn abbreviate(value: &str) -> String {
    match value.char_indices().nth(32) {
        Some((idx, _)) => format!("{}...", &value[..idx]),
        None => value.to_string(),
    }
}

fn hex_digest(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().fold(String::with_capacity(64), |mut out, b| {
        let _ = write!(out, "{:02x}", b);
        out
    })
}

impl AttributeValueSyntax for ImageSyntax {
    fn id(&self) -> &'static str {
        ID
    }

    fn validate(&self, value: &str) -> ValidationResult<()> {
        self.decode(value).map(|_| ())
    }

    fn are_equal(&self, a: &str, b: &str) -> bool {
        match (BASE64.decode(a.trim()), BASE64.decode(b.trim())) {
            (Ok(a), Ok(b)) => a == b,
            _ => a == b,
        }
    }

    fn convert_from_string(&self, value: &str) -> ValidationResult<Value> {
        let (bytes, _) = self.decode(value)?;
        Ok(Value::String(BASE64.encode(bytes)))
    }

    fn convert_to_string(&self, value: &Value) -> ValidationResult<String> {
        let text = value_as_text(value);
        let (bytes, _) = self.decode(&text)?;
        Ok(BASE64.encode(bytes))
    }

    fn deserialize_simple(&self, value: &str) -> ValidationResult<String> {
        let (bytes, _) = self.decode(value)?;
        Ok(BASE64.encode(bytes))
    }

    fn public_exposure(&self, value: &str) -> Option<PublicExposure> {
        let (bytes, content_type) = self.decode(value).ok()?;
        Some(PublicExposure {
            id: hex_digest(&bytes),
            content_type: content_type.to_string(),
            bytes,
        })
    }

    fn serialized_configuration(&self) -> Value {
        serde_json::to_value(&self.config).unwrap_or(Value::Null)
    }
}
