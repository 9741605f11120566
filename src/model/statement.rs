//! Attribute statements: group scoped rules assigning attributes to members.

use super::attribute::Attribute;
use super::group::GroupPath;
use crate::error::{ValidationError, ValidationResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What happens when a statement produces an attribute that is already
/// present in the collected set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConflictResolution {
    /// Keep the existing attribute.
    Skip,
    /// Replace the existing attribute unless it is directly assigned.
    Overwrite,
    /// Append values if the type has no upper bound on values.
    Merge,
}

/// Direction of a recursive extra-attribute collection pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    Upwards,
    Downwards,
    Undirected,
}

/// How the assigned attribute is produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum StatementAssignment {
    /// A constant attribute, scoped to the statement's group.
    Fixed { attribute: Attribute },
    /// Values computed by an expression and converted with the type's syntax.
    Dynamic {
        attribute_type: String,
        expression: String,
    },
}

/// A conditional assignment of an attribute to the members of a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeStatement {
    pub condition: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_attributes_group: Option<GroupPath>,
    pub conflict_resolution: ConflictResolution,
    pub assignment: StatementAssignment,
}

impl AttributeStatement {
    pub fn fixed(
        condition: impl Into<String>,
        extra_attributes_group: Option<GroupPath>,
        conflict_resolution: ConflictResolution,
        attribute: Attribute,
    ) -> Self {
        Self {
            condition: condition.into(),
            extra_attributes_group,
            conflict_resolution,
            assignment: StatementAssignment::Fixed { attribute },
        }
    }

    pub fn dynamic(
        condition: impl Into<String>,
        extra_attributes_group: Option<GroupPath>,
        conflict_resolution: ConflictResolution,
        attribute_type: impl Into<String>,
        expression: impl Into<String>,
    ) -> Self {
        Self {
            condition: condition.into(),
            extra_attributes_group,
            conflict_resolution,
            assignment: StatementAssignment::Dynamic {
                attribute_type: attribute_type.into(),
                expression: expression.into(),
            },
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self.assignment, StatementAssignment::Dynamic { .. })
    }

    /// Name of the assigned attribute, for fixed and dynamic statements alike.
    pub fn assigned_attribute_name(&self) -> &str {
        match &self.assignment {
            StatementAssignment::Fixed { attribute } => &attribute.name,
            StatementAssignment::Dynamic { attribute_type, .. } => attribute_type,
        }
    }

    /// Whether the statement takes part in a directed collection pass over
    /// `group_of_statement`. Statements without an extra group always do;
    /// others only when the extra group lies in the pass direction.
    pub fn is_suitable_for_directed_evaluation(
        &self,
        direction: Direction,
        group_of_statement: &GroupPath,
    ) -> bool {
        let Some(extra) = &self.extra_attributes_group else {
            return true;
        };
        if extra == group_of_statement {
            return true;
        }
        match direction {
            Direction::Upwards => extra.is_ancestor_of(group_of_statement),
            Direction::Downwards => extra.is_descendant_of(group_of_statement),
            Direction::Undirected => false,
        }
    }

    /// Structural checks of a statement placed in `owning_group`.
    pub fn validate(&self, owning_group: &GroupPath) -> ValidationResult<()> {
        if self.condition.trim().is_empty() {
            return Err(ValidationError::invalid_statement(
                "The condition must be set",
            ));
        }
        match &self.assignment {
            StatementAssignment::Dynamic {
                attribute_type,
                expression,
            } => {
                if attribute_type.trim().is_empty() || expression.trim().is_empty() {
                    return Err(ValidationError::invalid_statement(
                        "Both expression and attribute type must be set together",
                    ));
                }
            }
            StatementAssignment::Fixed { attribute } => {
                if &attribute.group_path != owning_group {
                    return Err(ValidationError::invalid_statement(
                        "Fixed attribute's group must be equal to the statement's group",
                    ));
                }
            }
        }
        if let Some(extra) = &self.extra_attributes_group {
            if extra == owning_group {
                return Err(ValidationError::invalid_statement(
                    "The additional attributes group must be different from the statement's group",
                ));
            }
            if !(extra.is_ancestor_of(owning_group) || extra.is_descendant_of(owning_group)) {
                return Err(ValidationError::invalid_statement(
                    "The additional attributes group must be either child or parent of the statement's group",
                ));
            }
        }
        Ok(())
    }
}

impl fmt::Display for AttributeStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.assignment {
            StatementAssignment::Fixed { attribute } => write!(
                f,
                "Assign {} = {:?} if '{}' is true",
                attribute.name, attribute.values, self.condition
            ),
            StatementAssignment::Dynamic {
                attribute_type,
                expression,
            } => write!(
                f,
                "Assign {} = expr({}) if '{}' is true",
                attribute_type, expression, self.condition
            ),
        }
    }
}
