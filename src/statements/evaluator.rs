//! Effective attribute computation for one entity.

use super::StatementLookups;
use crate::error::ExpressionError;
use crate::expression::{EvaluationContext, ExpressionEvaluator};
use crate::model::{
    Attribute, AttributeExt, AttributeStatement, AttributesClass, ConflictResolution, Direction,
    GroupPath, Identity, StatementAssignment,
};
use crate::schema::EffectivePermissions;
use crate::syntax::{SyntaxRegistry, value_as_text};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};

/// Attributes of one group keyed by name.
pub type AttributeMap = HashMap<String, AttributeExt>;

type AttributesByGroup = HashMap<GroupPath, AttributeMap>;

const DEFAULT_CLASS_ATTRIBUTE: &str = "sys:AttributeClasses";

/// Everything known about the entity being evaluated.
#[derive(Debug, Clone, Copy)]
pub struct EntitySnapshot<'a> {
    pub identities: &'a [Identity],
    /// All groups the entity belongs to.
    pub groups: &'a BTreeSet<GroupPath>,
    /// Directly stored attributes per group.
    pub direct_attributes: &'a HashMap<GroupPath, AttributeMap>,
    pub known_classes: &'a HashMap<String, AttributesClass>,
}

/// One-shot evaluator of the effective attributes of an entity.
///
/// A broken statement never fails the evaluation: condition errors, value
/// conversion problems and cyclic extra-group references are logged and the
/// statement is skipped.
pub struct EffectiveAttributesEvaluator<'a, E: ExpressionEvaluator> {
    syntaxes: &'a SyntaxRegistry,
    engine: &'a E,
    lookups: &'a dyn StatementLookups,
    entity: EntitySnapshot<'a>,
    class_attribute: &'a str,
    group_paths: Value,
    group_views: Value,
    ids_by_type: Value,
}

impl<'a, E: ExpressionEvaluator> EffectiveAttributesEvaluator<'a, E> {
    pub fn new(
        syntaxes: &'a SyntaxRegistry,
        engine: &'a E,
        lookups: &'a dyn StatementLookups,
        entity: EntitySnapshot<'a>,
    ) -> Self {
        let group_paths = Value::Array(
            entity
                .groups
                .iter()
                .map(|path| Value::String(path.to_string()))
                .collect(),
        );

        let mut views = Map::new();
        for path in entity.groups {
            let view = lookups
                .group_view(path)
                .and_then(|view| serde_json::to_value(view).ok())
                .unwrap_or(Value::Null);
            views.insert(path.to_string(), view);
        }

        let mut ids_by_type = Map::new();
        for identity in entity.identities {
            let values = ids_by_type
                .entry(identity.type_id.clone())
                .or_insert_with(|| Value::Array(Vec::new()));
            if let Value::Array(values) = values {
                values.push(Value::String(identity.value.clone()));
            }
        }

        Self {
            syntaxes,
            engine,
            lookups,
            entity,
            class_attribute: DEFAULT_CLASS_ATTRIBUTE,
            group_paths,
            group_views: Value::Object(views),
            ids_by_type: Value::Object(ids_by_type),
        }
    }

    /// Name of the attribute holding the entity's attribute classes.
    pub fn with_class_attribute(mut self, class_attribute: &'a str) -> Self {
        self.class_attribute = class_attribute;
        self
    }

    /// Effective attributes of the entity in `group`, optionally limited to
    /// one attribute name.
    ///
    /// Extra attributes of descendant groups are collected first, then those
    /// of ancestor groups, then the statements of `group` itself are applied.
    /// Outside of the root group, global attributes of the root group are
    /// added unless already present.
    pub fn get_effective_attributes(&self, group: &GroupPath, queried: Option<&str>) -> AttributeMap {
        let mut downwards = AttributesByGroup::new();
        self.collect_directed(Direction::Downwards, group, &mut downwards, &mut Vec::new());

        let mut upwards = AttributesByGroup::new();
        self.collect_directed(Direction::Upwards, group, &mut upwards, &mut Vec::new());

        let statements = self.statements_of(group);
        let collected = self.process_statements(
            Direction::Undirected,
            Some(&upwards),
            Some(&downwards),
            group,
            queried,
            statements,
        );

        if group.is_root() {
            collected
        } else {
            self.add_global(collected, queried)
        }
    }

    fn statements_of(&self, group: &GroupPath) -> &'a [AttributeStatement] {
        match self.lookups.group(group) {
            Some(definition) => &definition.attribute_statements,
            None => {
                log::warn!("Group {} is unknown, its statements are ignored", group);
                &[]
            }
        }
    }

    fn collect_directed(
        &self,
        direction: Direction,
        group: &GroupPath,
        collected: &mut AttributesByGroup,
        path: &mut Vec<GroupPath>,
    ) {
        if path.contains(group) {
            log::warn!(
                "Cyclic reference to group {} while collecting {:?} attributes via {:?}, cutting",
                group,
                direction,
                path
            );
            return;
        }
        if collected.contains_key(group) {
            return;
        }

        let statements = self.statements_of(group);
        let interesting: BTreeSet<&GroupPath> = statements
            .iter()
            .filter(|statement| statement.is_suitable_for_directed_evaluation(direction, group))
            .filter_map(|statement| statement.extra_attributes_group.as_ref())
            .filter(|extra| *extra != group)
            .collect();

        path.push(group.clone());
        for extra in interesting {
            if !self.entity.groups.contains(extra) {
                continue;
            }
            self.collect_directed(direction, extra, collected, path);
        }
        path.pop();

        let previous: &AttributesByGroup = collected;
        let result = match direction {
            Direction::Upwards => {
                self.process_statements(direction, Some(previous), None, group, None, statements)
            }
            _ => self.process_statements(direction, None, Some(previous), group, None, statements),
        };
        collected.insert(group.clone(), result);
    }

    fn process_statements(
        &self,
        direction: Direction,
        upwards: Option<&AttributesByGroup>,
        downwards: Option<&AttributesByGroup>,
        group: &GroupPath,
        queried: Option<&str>,
        statements: &[AttributeStatement],
    ) -> AttributeMap {
        let empty = AttributeMap::new();
        let direct = self.entity.direct_attributes.get(group).unwrap_or(&empty);

        let mut collected: AttributeMap = match queried {
            None => direct.clone(),
            Some(name) => direct
                .get(name)
                .map(|attribute| (name.to_string(), attribute.clone()))
                .into_iter()
                .collect(),
        };

        let permissions = self.permissions(group, direct);
        let base_context = self.base_context(group, direct);

        for (index, statement) in statements.iter().enumerate() {
            let extra = statement.extra_attributes_group.as_ref().and_then(|extra| {
                let mut found = None;
                if group.is_ancestor_or_self(extra) {
                    found = downwards.and_then(|maps| maps.get(extra));
                }
                if extra.is_ancestor_or_self(group) {
                    if let Some(maps) = upwards {
                        found = maps.get(extra);
                    }
                }
                found
            });

            log::trace!(
                "Processing statement {} in {} for entity {}: {}",
                index + 1,
                group,
                base_context.get("entityId").unwrap_or(&Value::Null),
                statement
            );
            self.process_statement(
                direction,
                group,
                statement,
                queried,
                &mut collected,
                &base_context,
                extra,
                &permissions,
            );
        }
        collected
    }

    #[allow(clippy::too_many_arguments)]
    fn process_statement(
        &self,
        direction: Direction,
        group: &GroupPath,
        statement: &AttributeStatement,
        queried: Option<&str>,
        collected: &mut AttributeMap,
        base_context: &EvaluationContext,
        extra: Option<&AttributeMap>,
        permissions: &EffectivePermissions,
    ) {
        if direction != Direction::Undirected
            && !statement.is_suitable_for_directed_evaluation(direction, group)
        {
            return;
        }
        let target = statement.assigned_attribute_name();
        if !permissions.is_allowed(target) {
            log::debug!(
                "Attribute {} is not allowed by the attribute classes in {}, statement skipped",
                target,
                group
            );
            return;
        }
        if queried.is_some_and(|name| name != target) {
            return;
        }

        let mut context = base_context.clone();
        self.add_attributes_to_context(&mut context, "eattrs", "eattr", extra);

        if !self.evaluate_condition(statement, &context) {
            return;
        }

        let produced = match &statement.assignment {
            StatementAssignment::Fixed { attribute } => attribute.clone(),
            StatementAssignment::Dynamic {
                attribute_type,
                expression,
            } => match self.evaluate_value(group, attribute_type, expression, &context) {
                Some(attribute) => attribute,
                None => return,
            },
        };

        let name = produced.name.clone();
        let Some(existing) = collected.get_mut(&name) else {
            collected.insert(name, AttributeExt::derived(produced));
            return;
        };

        match statement.conflict_resolution {
            ConflictResolution::Skip => {
                log::trace!("Conflict on {}, skipping the statement result", name);
            }
            ConflictResolution::Overwrite => {
                if existing.direct {
                    log::trace!("Conflict on {}, direct attribute is kept", name);
                } else {
                    log::trace!("Conflict on {}, overwriting the derived attribute", name);
                    *existing = AttributeExt::derived(produced);
                }
            }
            ConflictResolution::Merge => {
                match self.lookups.attribute_type(&name) {
                    Some(at) if at.is_unlimited() => {
                        log::trace!("Conflict on {}, merging values", name);
                        existing.attribute.values.extend(produced.values);
                    }
                    Some(_) => {
                        log::trace!(
                            "Conflict on {}, merge skipped as the type limits the number of values",
                            name
                        );
                    }
                    None => {
                        log::warn!("Attribute type {} is unknown, merge skipped", name);
                    }
                }
            }
        }
    }

    fn evaluate_condition(&self, statement: &AttributeStatement, context: &EvaluationContext) -> bool {
        let result = self
            .engine
            .compile(&statement.condition)
            .and_then(|compiled| self.engine.evaluate_boolean(&compiled, context));
        match result {
            Ok(value) => {
                log::trace!(
                    "Condition '{}' evaluated to {} in {}",
                    statement.condition,
                    value,
                    context.get("groupName").unwrap_or(&Value::Null)
                );
                value
            }
            Err(ExpressionError::NullResult) => {
                log::debug!("Condition '{}' evaluated to null, assuming false", statement.condition);
                false
            }
            Err(e) => {
                log::warn!(
                    "Error evaluating attribute statement condition '{}', skipping statement: {}",
                    statement.condition,
                    e
                );
                false
            }
        }
    }

    fn evaluate_value(
        &self,
        group: &GroupPath,
        attribute_type: &str,
        expression: &str,
        context: &EvaluationContext,
    ) -> Option<Attribute> {
        let value = match self
            .engine
            .compile(expression)
            .and_then(|compiled| self.engine.evaluate_value(&compiled, context))
        {
            Ok(Value::Null) => {
                log::debug!("Attribute value evaluated to null, skipping");
                return None;
            }
            Ok(value) => value,
            Err(e) => {
                log::warn!(
                    "Error evaluating attribute statement value '{}', skipping statement: {}",
                    expression,
                    e
                );
                return None;
            }
        };

        let Some(at) = self.lookups.attribute_type(attribute_type) else {
            log::warn!(
                "Attribute type {} assigned by a statement is unknown, skipping",
                attribute_type
            );
            return None;
        };
        let syntax = match self.syntaxes.get(&at.value_syntax, &at.value_syntax_config) {
            Ok(syntax) => syntax,
            Err(e) => {
                log::warn!("Can't create syntax of attribute {}: {}", attribute_type, e);
                return None;
            }
        };

        let items = match value {
            Value::Array(items) => items,
            single => vec![single],
        };
        let mut values = Vec::with_capacity(items.len());
        for item in &items {
            if item.is_null() {
                log::debug!("Statement produced a null value for {}, skipping", attribute_type);
                return None;
            }
            match syntax.deserialize_simple(&value_as_text(item)) {
                Ok(converted) => values.push(converted),
                Err(e) => {
                    log::debug!(
                        "Can't convert values returned by the statement to the type of attribute {}, skipping: {}",
                        attribute_type,
                        e
                    );
                    return None;
                }
            }
        }
        log::trace!("Evaluated values of attribute {}: {:?}", attribute_type, values);
        Some(Attribute::new(attribute_type, syntax.id(), group.clone(), values))
    }

    fn add_global(&self, mut collected: AttributeMap, queried: Option<&str>) -> AttributeMap {
        let Some(root) = self.entity.direct_attributes.get(&GroupPath::root()) else {
            return collected;
        };
        let candidates: Vec<&AttributeExt> = match queried {
            Some(name) => root.get(name).into_iter().collect(),
            None => root.values().collect(),
        };
        for attribute in candidates {
            let global = self
                .lookups
                .attribute_type(attribute.name())
                .is_some_and(|at| at.global);
            if global && !collected.contains_key(attribute.name()) {
                let mut propagated = attribute.clone();
                propagated.direct = false;
                collected.insert(attribute.name().to_string(), propagated);
            }
        }
        collected
    }

    fn permissions(&self, group: &GroupPath, direct: &AttributeMap) -> EffectivePermissions {
        let Some(assigned) = direct.get(self.class_attribute) else {
            return EffectivePermissions::unrestricted();
        };
        match EffectivePermissions::resolve(
            assigned.values().iter().map(String::as_str),
            self.entity.known_classes,
        ) {
            Ok(permissions) => permissions,
            Err(e) => {
                log::warn!(
                    "Attribute classes of the entity in {} can not be resolved, not restricting statements: {}",
                    group,
                    e
                );
                EffectivePermissions::unrestricted()
            }
        }
    }

    fn base_context(&self, group: &GroupPath, direct: &AttributeMap) -> EvaluationContext {
        let mut context = EvaluationContext::new();
        let entity_id = self
            .entity
            .identities
            .first()
            .map(|identity| Value::from(identity.entity_id))
            .unwrap_or(Value::Null);
        context.insert("entityId".to_string(), entity_id);
        context.insert("groupName".to_string(), Value::String(group.to_string()));
        context.insert("groups".to_string(), self.group_paths.clone());
        context.insert("groupsObj".to_string(), self.group_views.clone());
        context.insert("idsByType".to_string(), self.ids_by_type.clone());
        self.add_attributes_to_context(&mut context, "attrs", "attr", Some(direct));
        context
    }

    fn add_attributes_to_context(
        &self,
        context: &mut EvaluationContext,
        all_key: &str,
        first_key: &str,
        attributes: Option<&AttributeMap>,
    ) {
        let Some(attributes) = attributes else {
            context.insert(all_key.to_string(), Value::Null);
            context.insert(first_key.to_string(), Value::Null);
            return;
        };

        let mut all = Map::new();
        let mut first = Map::new();
        for attribute in attributes.values() {
            let values = self.external_values(attribute);
            first.insert(
                attribute.name().to_string(),
                Value::String(values.first().cloned().unwrap_or_default()),
            );
            all.insert(
                attribute.name().to_string(),
                Value::Array(values.into_iter().map(Value::String).collect()),
            );
        }
        context.insert(all_key.to_string(), Value::Object(all));
        context.insert(first_key.to_string(), Value::Object(first));
    }

    fn external_values(&self, attribute: &AttributeExt) -> Vec<String> {
        let syntax = match self.syntaxes.get_unconfigured(attribute.value_syntax()) {
            Ok(syntax) => syntax,
            Err(_) => return attribute.values().to_vec(),
        };
        attribute
            .values()
            .iter()
            .map(|value| {
                syntax
                    .serialize_simple(value)
                    .unwrap_or_else(|_| value.clone())
            })
            .collect()
    }
}
