//! Attribute type metadata providers.
//!
//! Metadata marks attribute types with a role understood by the rest of the
//! platform, e.g. "this type holds the contact email". A provider decides
//! whether its marker may be attached to a given type, whether at most one
//! type may carry it, and whether values of marked types are sensitive.

use crate::error::{AttributeError, AttributeResult, BuildError, BuildResult, ValidationError};
use crate::model::AttributeType;
use crate::syntax;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

/// A metadata kind that can be attached to attribute types.
pub trait MetadataProvider: Send + Sync + fmt::Debug {
    /// Metadata id, used as the key of [`AttributeType::metadata`].
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// At most one attribute type may carry singleton metadata.
    fn is_singleton(&self) -> bool {
        false
    }

    /// Values of types carrying this metadata are hidden from plain reads.
    fn is_security_sensitive(&self) -> bool {
        false
    }

    /// Check that `value` may be attached to `attribute_type`.
    fn verify(&self, value: &str, attribute_type: &AttributeType) -> AttributeResult<()>;
}

fn require_syntax(
    provider: &dyn MetadataProvider,
    attribute_type: &AttributeType,
    syntax: &str,
) -> AttributeResult<()> {
    if attribute_type.value_syntax == syntax {
        Ok(())
    } else {
        Err(ValidationError::invalid_attribute_type(
            &attribute_type.name,
            format!(
                "metadata '{}' requires the {} syntax, the type uses {}",
                provider.name(),
                syntax,
                attribute_type.value_syntax
            ),
        )
        .into())
    }
}

/// Marks the attribute type holding the contact email of entities.
#[derive(Debug, Default)]
pub struct ContactEmailMetadataProvider;

impl ContactEmailMetadataProvider {
    pub const NAME: &'static str = "contactEmail";
}

impl MetadataProvider for ContactEmailMetadataProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Contact email address of the entity"
    }

    fn is_singleton(&self) -> bool {
        true
    }

    fn verify(&self, _value: &str, attribute_type: &AttributeType) -> AttributeResult<()> {
        require_syntax(self, attribute_type, syntax::email::ID)
    }
}

/// Marks the attribute type holding the displayed name of entities.
#[derive(Debug, Default)]
pub struct EntityNameMetadataProvider;

impl EntityNameMetadataProvider {
    pub const NAME: &'static str = "entityName";
}

impl MetadataProvider for EntityNameMetadataProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Name of the entity"
    }

    fn is_singleton(&self) -> bool {
        true
    }

    fn verify(&self, _value: &str, attribute_type: &AttributeType) -> AttributeResult<()> {
        require_syntax(self, attribute_type, syntax::string::ID)
    }
}

/// Marks types whose values must not be returned by plain attribute reads.
#[derive(Debug, Default)]
pub struct SensitiveMetadataProvider;

impl SensitiveMetadataProvider {
    pub const NAME: &'static str = "sensitive";
}

impl MetadataProvider for SensitiveMetadataProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "Values are security sensitive"
    }

    fn is_security_sensitive(&self) -> bool {
        true
    }

    fn verify(&self, value: &str, attribute_type: &AttributeType) -> AttributeResult<()> {
        if value.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::invalid_attribute_type(
                &attribute_type.name,
                format!("metadata '{}' takes no value", Self::NAME),
            )
            .into())
        }
    }
}

/// Registered metadata providers by name.
#[derive(Debug, Clone, Default)]
pub struct MetadataProviderRegistry {
    providers: HashMap<String, Arc<dyn MetadataProvider>>,
}

impl MetadataProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in providers.
    pub fn with_defaults() -> Self {
        let mut providers: HashMap<String, Arc<dyn MetadataProvider>> = HashMap::new();
        for provider in [
            Arc::new(ContactEmailMetadataProvider) as Arc<dyn MetadataProvider>,
            Arc::new(EntityNameMetadataProvider),
            Arc::new(SensitiveMetadataProvider),
        ] {
            providers.insert(provider.name().to_string(), provider);
        }
        Self { providers }
    }

    pub fn register(&mut self, provider: Arc<dyn MetadataProvider>) -> BuildResult<()> {
        let name = provider.name().to_string();
        if self.providers.contains_key(&name) {
            return Err(BuildError::DuplicateMetadataProvider { name });
        }
        self.providers.insert(name, provider);
        Ok(())
    }

    pub fn get(&self, id: &str) -> AttributeResult<&Arc<dyn MetadataProvider>> {
        self.providers
            .get(id)
            .ok_or_else(|| AttributeError::UnknownMetadata { id: id.to_string() })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.providers.contains_key(id)
    }

    pub fn names(&self) -> BTreeSet<String> {
        self.providers.keys().cloned().collect()
    }

    /// Whether any metadata of the type is security sensitive.
    pub fn is_security_sensitive(&self, attribute_type: &AttributeType) -> bool {
        attribute_type.metadata.keys().any(|id| {
            self.providers
                .get(id)
                .is_some_and(|provider| provider.is_security_sensitive())
        })
    }
}
