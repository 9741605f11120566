//! Error types for attribute schema, class and resolution operations.
//!
//! Management operations fail fast with an [`AttributeError`] before anything
//! is written. Value-level problems are reported as [`ValidationError`], which
//! converts into [`AttributeError::SchemaValidation`].

use crate::model::{EntityId, GroupPath};
use crate::storage::StorageError;

/// Main error type for attribute management operations.
#[derive(Debug, thiserror::Error)]
pub enum AttributeError {
    /// An attribute does not satisfy its attribute type
    #[error("Schema validation error: {0}")]
    SchemaValidation(#[from] ValidationError),

    /// A structural rule was broken: immutable types, class restrictions,
    /// mandatory attributes, instances left behind and similar
    #[error("Schema consistency error: {message}")]
    SchemaConsistency { message: String },

    /// A type update would invalidate an already stored attribute
    #[error(
        "Attribute type change conflicts with the attribute of entity {entity_id} in group {group}: {source}"
    )]
    ConflictingInstance {
        entity_id: EntityId,
        group: GroupPath,
        #[source]
        source: ValidationError,
    },

    /// No syntax registered under the given id
    #[error("Unknown attribute value syntax: {syntax}")]
    UnknownSyntax { syntax: String },

    /// The entity is not a member of the group the attribute is scoped to
    #[error("Entity {entity_id} is not a member of group {group}")]
    GroupMembership { entity_id: EntityId, group: GroupPath },

    /// A configured capacity limit would be exceeded
    #[error("Capacity limit '{limit}' exceeded: {current} > {max}")]
    CapacityLimit {
        limit: String,
        current: u64,
        max: u64,
    },

    /// A self-service write would drop every confirmed value
    #[error("Confirmation state error: {message}")]
    ConfirmationState { message: String },

    /// Attribute type not defined
    #[error("Attribute type '{name}' is not defined")]
    UnknownAttributeType { name: String },

    /// Attribute class not defined
    #[error("Attribute class '{name}' is not defined")]
    UnknownAttributeClass { name: String },

    /// Group does not exist
    #[error("Group '{path}' does not exist")]
    UnknownGroup { path: GroupPath },

    /// Metadata provider not registered
    #[error("Metadata provider '{id}' is not registered")]
    UnknownMetadata { id: String },

    /// The attribute is not set on the entity in the group
    #[error("Attribute '{name}' is not set for entity {entity_id} in group {group}")]
    AttributeNotFound {
        entity_id: EntityId,
        group: GroupPath,
        name: String,
    },

    /// A named object is already present
    #[error("{kind} '{name}' already exists")]
    AlreadyExists { kind: String, name: String },

    /// Invalid call parameters
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Errors raised by a storage collaborator
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Value-level validation errors.
///
/// Produced by attribute value syntaxes, the attribute validator and the
/// statement definition checks.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// Fewer values than the type's minimum
    #[error("Attribute '{attribute}' must have at least {min} values, got {actual}")]
    TooFewValues {
        attribute: String,
        min: u32,
        actual: usize,
    },

    /// More values than the type's maximum
    #[error("Attribute '{attribute}' can have at most {max} values, got {actual}")]
    TooManyValues {
        attribute: String,
        max: u32,
        actual: usize,
    },

    /// Attribute name differs from its type name
    #[error("Attribute name '{attribute}' does not match attribute type '{attribute_type}'")]
    NameMismatch {
        attribute: String,
        attribute_type: String,
    },

    /// Attribute syntax differs from its type syntax
    #[error(
        "Attribute '{attribute}' uses value syntax '{actual}' but its type requires '{expected}'"
    )]
    SyntaxMismatch {
        attribute: String,
        expected: String,
        actual: String,
    },

    /// One of the values is not valid for the syntax
    #[error("Value #{position} of attribute '{attribute}' is invalid: {details}")]
    InvalidAttributeValue {
        attribute: String,
        position: usize,
        details: String,
    },

    /// Two values of a unique-values attribute are equal
    #[error("Duplicated values detected: {first} and {second}")]
    DuplicatedValues { first: usize, second: usize },

    /// A raw value rejected by a syntax
    #[error("Invalid {syntax} value '{value}': {details}")]
    InvalidValue {
        syntax: String,
        value: String,
        details: String,
    },

    /// Syntax configuration could not be applied
    #[error("Invalid configuration of the {syntax} syntax: {details}")]
    InvalidSyntaxConfiguration { syntax: String, details: String },

    /// Attribute statement definition is malformed
    #[error("Invalid attribute statement: {details}")]
    InvalidStatement { details: String },

    /// Attribute type definition is malformed
    #[error("Invalid attribute type '{attribute_type}': {details}")]
    InvalidAttributeType {
        attribute_type: String,
        details: String,
    },

    /// General validation error with custom message
    #[error("Validation failed: {message}")]
    Custom { message: String },
}

/// Errors raised while compiling or evaluating statement expressions.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExpressionError {
    /// The expression text could not be parsed
    #[error("Cannot parse expression '{expression}': {details}")]
    Parse { expression: String, details: String },

    /// A variable is not present in the evaluation context
    #[error("Unknown variable '{name}'")]
    UnknownVariable { name: String },

    /// Member, index or method access on null
    #[error("Null value dereferenced: {operation}")]
    NullDereference { operation: String },

    /// Operand types do not fit the operator
    #[error("Type mismatch in '{operation}': {details}")]
    TypeMismatch { operation: String, details: String },

    /// Unsupported method call
    #[error("Unknown method '{method}' on {target}")]
    UnknownMethod { method: String, target: String },

    /// List index out of range
    #[error("Index {index} out of bounds for list of length {length}")]
    IndexOutOfBounds { index: i64, length: usize },

    /// Integer division or remainder by zero
    #[error("Division by zero")]
    DivisionByZero,

    /// A condition evaluated to null
    #[error("Expression evaluated to null")]
    NullResult,

    /// A condition evaluated to something other than a boolean
    #[error("Expression result is not a boolean: {actual}")]
    NotBoolean { actual: String },
}

/// Errors that can occur while assembling an attribute engine.
///
/// These are configuration mistakes and are expected to surface at startup.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// Invalid configuration provided
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    /// An allow-listed syntax is not registered
    #[error("Enabled syntax '{syntax}' is not registered")]
    UnknownEnabledSyntax { syntax: String },

    /// Two metadata providers share one name
    #[error("Metadata provider '{name}' registered twice")]
    DuplicateMetadataProvider { name: String },
}

// Convenience methods for creating common errors
impl AttributeError {
    /// Create a schema consistency error
    pub fn schema_consistency(message: impl Into<String>) -> Self {
        Self::SchemaConsistency {
            message: message.into(),
        }
    }

    /// Create a confirmation state error
    pub fn confirmation_state(message: impl Into<String>) -> Self {
        Self::ConfirmationState {
            message: message.into(),
        }
    }

    /// Create an unknown syntax error
    pub fn unknown_syntax(syntax: impl Into<String>) -> Self {
        Self::UnknownSyntax {
            syntax: syntax.into(),
        }
    }

    /// Create an unknown attribute type error
    pub fn unknown_attribute_type(name: impl Into<String>) -> Self {
        Self::UnknownAttributeType { name: name.into() }
    }

    /// Create an unknown attribute class error
    pub fn unknown_attribute_class(name: impl Into<String>) -> Self {
        Self::UnknownAttributeClass { name: name.into() }
    }

    /// Create an already exists error
    pub fn already_exists(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::AlreadyExists {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}

impl ValidationError {
    /// Create a value error for a syntax
    pub fn invalid_value(
        syntax: impl Into<String>,
        value: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            syntax: syntax.into(),
            value: value.into(),
            details: details.into(),
        }
    }

    /// Create a statement definition error
    pub fn invalid_statement(details: impl Into<String>) -> Self {
        Self::InvalidStatement {
            details: details.into(),
        }
    }

    /// Create an attribute type definition error
    pub fn invalid_attribute_type(
        attribute_type: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self::InvalidAttributeType {
            attribute_type: attribute_type.into(),
            details: details.into(),
        }
    }

    /// Create a custom validation error
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom {
            message: message.into(),
        }
    }
}

impl ExpressionError {
    pub(crate) fn type_mismatch(operation: impl Into<String>, details: impl Into<String>) -> Self {
        Self::TypeMismatch {
            operation: operation.into(),
            details: details.into(),
        }
    }

    pub(crate) fn null_dereference(operation: impl Into<String>) -> Self {
        Self::NullDereference {
            operation: operation.into(),
        }
    }
}

// Result type aliases for convenience
pub type AttributeResult<T> = Result<T, AttributeError>;
pub type ValidationResult<T> = Result<T, ValidationError>;
pub type ExpressionResult<T> = Result<T, ExpressionError>;
pub type BuildResult<T> = Result<T, BuildError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let error = AttributeError::unknown_attribute_type("email");
        assert!(error.to_string().contains("email"));

        let error = AttributeError::already_exists("Attribute class", "person");
        assert_eq!(error.to_string(), "Attribute class 'person' already exists");
    }

    #[test]
    fn test_duplicated_values_message() {
        let error = ValidationError::DuplicatedValues {
            first: 0,
            second: 2,
        };
        assert_eq!(error.to_string(), "Duplicated values detected: 0 and 2");
    }

    #[test]
    fn test_error_chain() {
        let validation_error = ValidationError::custom("broken");
        let error = AttributeError::from(validation_error);
        assert!(error.to_string().contains("Schema validation error"));
        assert!(matches!(error, AttributeError::SchemaValidation(_)));
    }

    #[test]
    fn test_conflicting_instance_names_entity_and_group() {
        let error = AttributeError::ConflictingInstance {
            entity_id: 7,
            group: GroupPath::root(),
            source: ValidationError::TooManyValues {
                attribute: "cn".to_string(),
                max: 1,
                actual: 2,
            },
        };
        let message = error.to_string();
        assert!(message.contains("entity 7"));
        assert!(message.contains("group /"));
    }
}
