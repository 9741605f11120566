//! Attribute schema: types, classes, metadata and validation.
//!
//! # Key Types
//!
//! - [`AttributeTypeCatalog`] - Creation, update and removal of attribute types
//! - [`AttributeClassManagement`] - Attribute class definitions and group assignment
//! - [`EffectivePermissions`] - Flattened allowed/mandatory sets of a class set
//! - [`AttributeValidator`] - Checks attributes against their types
//! - [`MetadataProviderRegistry`] - Known attribute type metadata
//!
//! # Examples
//!
//! ```rust
//! use attribute_engine::model::{Attribute, AttributeType, GroupPath};
//! use attribute_engine::schema::AttributeValidator;
//! use attribute_engine::syntax::SyntaxRegistry;
//!
//! let registry = SyntaxRegistry::with_defaults();
//! let at = AttributeType::new("cn", "string", 1, 1);
//! let attribute = Attribute::new("cn", "string", GroupPath::root(), ["Alice"]);
//! assert!(AttributeValidator::new(&registry).validate(&attribute, &at).is_ok());
//! ```

pub mod cache;
pub mod catalog;
pub mod classes;
pub mod metadata;
pub mod validation;

#[cfg(test)]
mod tests;

pub use cache::{DEFAULT_METADATA_CACHE_TTL, MetadataTypeCache};
pub use catalog::AttributeTypeCatalog;
pub use classes::{AttributeClassManagement, EffectivePermissions};
pub use metadata::{
    ContactEmailMetadataProvider, EntityNameMetadataProvider, MetadataProvider,
    MetadataProviderRegistry, SensitiveMetadataProvider,
};
pub use validation::{AttributeValidator, validate_with_syntax};
