//! Attribute value syntaxes and the registry of syntax factories.
//!
//! A syntax defines how attribute values are validated, compared and
//! converted between three forms:
//!
//! - the *internal* string form kept in [`Attribute::values`](crate::model::Attribute)
//! - a typed view expressed as JSON (`convert_from_string` / `convert_to_string`)
//! - the *simple external* form shown to users and statement expressions
//!
//! Syntaxes are created per attribute type from the type's opaque
//! configuration by a [`SyntaxFactory`] registered under the syntax id.
//!
//! # Examples
//!
//! ```rust
//! use attribute_engine::syntax::SyntaxRegistry;
//! use serde_json::json;
//!
//! let registry = SyntaxRegistry::with_defaults();
//! let syntax = registry.get("string", &json!({"maxLength": 5})).unwrap();
//! assert!(syntax.validate("short").is_ok());
//! assert!(syntax.validate("too long").is_err());
//! ```

pub mod datetime;
pub mod email;
pub mod enumeration;
pub mod image;
pub mod numeric;
pub mod string;

pub use datetime::DateTimeSyntax;
pub use email::{ConfirmationInfo, VerifiableEmail, VerifiableEmailSyntax};
pub use enumeration::EnumerationSyntax;
pub use image::ImageSyntax;
pub use numeric::{FloatingPointSyntax, IntegerSyntax};
pub use string::StringSyntax;

use crate::error::{AttributeError, AttributeResult, ValidationError, ValidationResult};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

/// Value handling rules of one attribute value syntax.
pub trait AttributeValueSyntax: Send + Sync + fmt::Debug {
    /// Registry id of the syntax.
    fn id(&self) -> &'static str;

    /// Check a value in internal form.
    fn validate(&self, value: &str) -> ValidationResult<()>;

    /// Syntax level equality of two internal values.
    fn are_equal(&self, a: &str, b: &str) -> bool {
        a == b
    }

    /// Typed view of an internal value.
    fn convert_from_string(&self, value: &str) -> ValidationResult<Value>;

    /// Internal form of a typed value.
    fn convert_to_string(&self, value: &Value) -> ValidationResult<String>;

    /// Simple external form of an internal value.
    fn serialize_simple(&self, value: &str) -> ValidationResult<String> {
        Ok(value.to_string())
    }

    /// Parse a simple external value into internal form.
    fn deserialize_simple(&self, value: &str) -> ValidationResult<String>;

    /// Values carry confirmation state.
    fn is_email_verifiable(&self) -> bool {
        false
    }

    /// Confirmation state of a value, for email verifiable syntaxes.
    fn confirmation_info(&self, _value: &str) -> Option<ConfirmationInfo> {
        None
    }

    /// Replace the confirmation state of a value.
    fn with_confirmation(&self, value: &str, _info: &ConfirmationInfo) -> ValidationResult<String> {
        Ok(value.to_string())
    }

    /// Publicly served content derived from a value, if the syntax has any.
    fn public_exposure(&self, _value: &str) -> Option<PublicExposure> {
        None
    }

    /// Effective configuration, in the form accepted by the factory.
    fn serialized_configuration(&self) -> Value;
}

/// Content of a value that is served publicly under a content addressed id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicExposure {
    pub id: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Builds a configured syntax instance from a type's syntax configuration.
pub type SyntaxFactory =
    Arc<dyn Fn(&Value) -> ValidationResult<Arc<dyn AttributeValueSyntax>> + Send + Sync>;

/// Registry mapping syntax ids to their factories.
#[derive(Clone, Default)]
pub struct SyntaxRegistry {
    factories: HashMap<String, SyntaxFactory>,
}

impl SyntaxRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in syntax.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(string::ID, |config| {
            Ok(Arc::new(StringSyntax::from_config(config)?) as Arc<dyn AttributeValueSyntax>)
        });
        registry.register(numeric::INTEGER_ID, |config| {
            Ok(Arc::new(IntegerSyntax::from_config(config)?) as Arc<dyn AttributeValueSyntax>)
        });
        registry.register(numeric::FLOATING_POINT_ID, |config| {
            Ok(Arc::new(FloatingPointSyntax::from_config(config)?) as Arc<dyn AttributeValueSyntax>)
        });
        registry.register(enumeration::ID, |config| {
            Ok(Arc::new(EnumerationSyntax::from_config(config)?) as Arc<dyn AttributeValueSyntax>)
        });
        registry.register(datetime::ID, |config| {
            Ok(Arc::new(DateTimeSyntax::from_config(config)?) as Arc<dyn AttributeValueSyntax>)
        });
        registry.register(email::ID, |config| {
            Ok(Arc::new(VerifiableEmailSyntax::from_config(config)?) as Arc<dyn AttributeValueSyntax>)
        });
        registry.register(image::ID, |config| {
            Ok(Arc::new(ImageSyntax::from_config(config)?) as Arc<dyn AttributeValueSyntax>)
        });
        registry
    }

    /// Register or replace the factory of a syntax.
    pub fn register<F>(&mut self, id: impl Into<String>, factory: F)
    where
        F: Fn(&Value) -> ValidationResult<Arc<dyn AttributeValueSyntax>> + Send + Sync + 'static,
    {
        self.factories.insert(id.into(), Arc::new(factory));
    }

    /// Drop every syntax not named in `enabled`.
    pub fn retain(&mut self, enabled: &BTreeSet<String>) {
        self.factories.retain(|id, _| enabled.contains(id));
    }

    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    /// A syntax instance configured with `config`.
    pub fn get(&self, id: &str, config: &Value) -> AttributeResult<Arc<dyn AttributeValueSyntax>> {
        let factory = self
            .factories
            .get(id)
            .ok_or_else(|| AttributeError::unknown_syntax(id))?;
        Ok(factory(config)?)
    }

    /// A syntax instance with default configuration.
    pub fn get_unconfigured(&self, id: &str) -> AttributeResult<Arc<dyn AttributeValueSyntax>> {
        self.get(id, &Value::Null)
    }

    pub fn supported_syntaxes(&self) -> BTreeSet<String> {
        self.factories.keys().cloned().collect()
    }
}

impl fmt::Debug for SyntaxRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntaxRegistry")
            .field("syntaxes", &self.supported_syntaxes())
            .finish()
    }
}

/// Deserialize a syntax configuration, `null` meaning the defaults.
pub(crate) fn parse_config<C>(syntax: &str, config: &Value) -> ValidationResult<C>
where
    C: DeserializeOwned + Default,
{
    if config.is_null() {
        return Ok(C::default());
    }
    serde_json::from_value(config.clone()).map_err(|e| {
        ValidationError::InvalidSyntaxConfiguration {
            syntax: syntax.to_string(),
            details: e.to_string(),
        }
    })
}

/// Text of a JSON value as used by simple external forms.
pub(crate) fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
