//! Validation of attribute instances against their attribute types.
//!
//! Checks run in a fixed order and stop at the first failure: cardinality,
//! name, syntax id, per-value syntax validity and finally pairwise
//! uniqueness when the type requires unique values.

use crate::error::{AttributeResult, ValidationError, ValidationResult};
use crate::model::{Attribute, AttributeType};
use crate::syntax::{AttributeValueSyntax, SyntaxRegistry};

/// Validates attributes, creating the configured syntax of each type on
/// demand.
#[derive(Debug, Clone, Copy)]
pub struct AttributeValidator<'a> {
    syntaxes: &'a SyntaxRegistry,
}

impl<'a> AttributeValidator<'a> {
    pub fn new(syntaxes: &'a SyntaxRegistry) -> Self {
        Self { syntaxes }
    }

    /// Validate `attribute` against `attribute_type`.
    ///
    /// Fails with `UnknownSyntax` when the type's syntax is not registered and
    /// with `SchemaValidation` for any value-level problem.
    pub fn validate(
        &self,
        attribute: &Attribute,
        attribute_type: &AttributeType,
    ) -> AttributeResult<()> {
        let syntax = self
            .syntaxes
            .get(&attribute_type.value_syntax, &attribute_type.value_syntax_config)?;
        validate_with_syntax(attribute, attribute_type, syntax.as_ref())?;
        Ok(())
    }
}

/// Validate with an already configured syntax.
pub fn validate_with_syntax(
    attribute: &Attribute,
    attribute_type: &AttributeType,
    syntax: &dyn AttributeValueSyntax,
) -> ValidationResult<()> {
    let values = &attribute.values;

    if values.len() < attribute_type.min_elements as usize {
        return Err(ValidationError::TooFewValues {
            attribute: attribute.name.clone(),
            min: attribute_type.min_elements,
            actual: values.len(),
        });
    }
    if !attribute_type.is_unlimited() && values.len() > attribute_type.max_elements as usize {
        return Err(ValidationError::TooManyValues {
            attribute: attribute.name.clone(),
            max: attribute_type.max_elements,
            actual: values.len(),
        });
    }
    if attribute.name != attribute_type.name {
        return Err(ValidationError::NameMismatch {
            attribute: attribute.name.clone(),
            attribute_type: attribute_type.name.clone(),
        });
    }
    if attribute.value_syntax != attribute_type.value_syntax {
        return Err(ValidationError::SyntaxMismatch {
            attribute: attribute.name.clone(),
            expected: attribute_type.value_syntax.clone(),
            actual: attribute.value_syntax.clone(),
        });
    }

    for (position, value) in values.iter().enumerate() {
        syntax
            .validate(value)
            .map_err(|e| ValidationError::InvalidAttributeValue {
                attribute: attribute.name.clone(),
                position,
                details: e.to_string(),
            })?;
    }

    if attribute_type.unique_values {
        for (first, a) in values.iter().enumerate() {
            for (offset, b) in values[first + 1..].iter().enumerate() {
                if syntax.are_equal(a, b) {
                    return Err(ValidationError::DuplicatedValues {
                        first,
                        second: first + 1 + offset,
                    });
                }
            }
        }
    }
    Ok(())
}
