//! Attribute statement evaluation.
//!
//! Statements attached to groups assign attributes to group members when
//! their condition holds. [`EffectiveAttributesEvaluator`] computes, for one
//! entity and one group, the direct attributes merged with everything the
//! statements produce. It works on snapshots only: every lookup goes
//! through [`StatementLookups`], so one evaluation never touches the store.
//!
//! # Example Usage
//!
//! ```rust
//! use attribute_engine::expression::BuiltinExpressionEngine;
//! use attribute_engine::model::{
//!     Attribute, AttributeExt, AttributeStatement, AttributeType, ConflictResolution, Group,
//!     GroupPath, Identity,
//! };
//! use attribute_engine::statements::{EffectiveAttributesEvaluator, EntitySnapshot, SchemaSnapshot};
//! use attribute_engine::syntax::SyntaxRegistry;
//! use std::collections::{BTreeSet, HashMap};
//!
//! let root = GroupPath::root();
//! let perm = Attribute::new("perm", "string", root.clone(), ["full"]);
//! let group = Group::new(root.clone()).with_statement(AttributeStatement::fixed(
//!     "attr['role'] == 'admin'",
//!     None,
//!     ConflictResolution::Skip,
//!     perm,
//! ));
//! let lookups = SchemaSnapshot::new(
//!     [group],
//!     [AttributeType::new("role", "string", 1, 1), AttributeType::new("perm", "string", 1, 1)],
//! );
//!
//! let role = AttributeExt::direct(Attribute::new("role", "string", root.clone(), ["admin"]));
//! let direct = HashMap::from([(root.clone(), HashMap::from([("role".to_string(), role)]))]);
//! let identities = vec![Identity::new("userName", "alice", 1)];
//! let groups = BTreeSet::from([root.clone()]);
//! let classes = HashMap::new();
//! let entity = EntitySnapshot {
//!     identities: &identities,
//!     groups: &groups,
//!     direct_attributes: &direct,
//!     known_classes: &classes,
//! };
//!
//! let syntaxes = SyntaxRegistry::with_defaults();
//! let engine = BuiltinExpressionEngine::new();
//! let evaluator = EffectiveAttributesEvaluator::new(&syntaxes, &engine, &lookups, entity);
//! let effective = evaluator.get_effective_attributes(&root, None);
//! assert_eq!(effective["perm"].values(), ["full".to_string()]);
//! assert!(!effective["perm"].direct);
//! ```

pub mod evaluator;

#[cfg(test)]
mod tests;

pub use evaluator::{AttributeMap, EffectiveAttributesEvaluator, EntitySnapshot};

use crate::error::{AttributeResult, ValidationError, ValidationResult};
use crate::expression::ExpressionEvaluator;
use crate::model::{AttributeType, Group, GroupPath, GroupView, StatementAssignment};
use crate::storage::{AttributeTypeStore, GroupStore};
use std::collections::HashMap;

/// Lookups used while evaluating statements.
pub trait StatementLookups: Send + Sync {
    fn group(&self, path: &GroupPath) -> Option<&Group>;

    fn attribute_type(&self, name: &str) -> Option<&AttributeType>;

    /// Group data exposed to expressions under `groupsObj`.
    fn group_view(&self, path: &GroupPath) -> Option<GroupView> {
        self.group(path).map(Group::view)
    }
}

/// In-memory copy of the groups and attribute types.
#[derive(Debug, Clone, Default)]
pub struct SchemaSnapshot {
    groups: HashMap<GroupPath, Group>,
    types: HashMap<String, AttributeType>,
}

impl SchemaSnapshot {
    pub fn new<G, T>(groups: G, types: T) -> Self
    where
        G: IntoIterator<Item = Group>,
        T: IntoIterator<Item = AttributeType>,
    {
        Self {
            groups: groups
                .into_iter()
                .map(|group| (group.path.clone(), group))
                .collect(),
            types: types
                .into_iter()
                .map(|at| (at.name.clone(), at))
                .collect(),
        }
    }

    /// Read all groups and attribute types from the store.
    pub async fn load<S>(store: &S) -> AttributeResult<Self>
    where
        S: GroupStore + AttributeTypeStore,
    {
        let groups = store.get_all_groups().await?;
        let types = store.get_all_attribute_types().await?;
        Ok(Self::new(groups, types))
    }

    pub fn types(&self) -> &HashMap<String, AttributeType> {
        &self.types
    }
}

impl StatementLookups for SchemaSnapshot {
    fn group(&self, path: &GroupPath) -> Option<&Group> {
        self.groups.get(path)
    }

    fn attribute_type(&self, name: &str) -> Option<&AttributeType> {
        self.types.get(name)
    }
}

/// Check the statements of a group: structure, compilable expressions and
/// known target attribute types.
pub fn validate_statements<E, L>(group: &Group, engine: &E, lookups: &L) -> ValidationResult<()>
where
    E: ExpressionEvaluator,
    L: StatementLookups + ?Sized,
{
    for statement in &group.attribute_statements {
        statement.validate(&group.path)?;

        let compile = |expression: &str| {
            engine
                .compile(expression)
                .map(|_| ())
                .map_err(|e| ValidationError::invalid_statement(e.to_string()))
        };
        compile(&statement.condition)?;
        if let StatementAssignment::Dynamic { expression, .. } = &statement.assignment {
            compile(expression)?;
        }

        let target = statement.assigned_attribute_name();
        if lookups.attribute_type(target).is_none() {
            return Err(ValidationError::invalid_statement(format!(
                "The attribute type '{}' assigned by the statement is not defined",
                target
            )));
        }
    }
    Ok(())
}
