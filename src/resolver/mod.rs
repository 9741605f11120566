//! Effective attribute resolution and attribute writes.
//!
//! [`AttributeResolver`] is the entry point used by protocol layers. Reads
//! load the entity's direct attributes and, when effective attributes are
//! requested, run the statement evaluator over a snapshot of the groups and
//! attribute types. Writes go through the full chain of checks: type
//! immutability, attribute classes, confirmation state, validation,
//! capacity limits and group membership.
//!
//! # Example Usage
//!
//! ```rust
//! use attribute_engine::config::AttributeEngineBuilder;
//! use attribute_engine::model::{Attribute, AttributeType, GroupPath, Identity};
//! use attribute_engine::storage::InMemoryStore;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(InMemoryStore::new());
//! store.add_identity(Identity::new("userName", "alice", 1)).await?;
//!
//! let engine = AttributeEngineBuilder::new(Arc::clone(&store)).build()?;
//! engine.initialize().await?;
//! engine.catalog.create(AttributeType::new("cn", "string", 1, 1)).await?;
//!
//! let cn = Attribute::new("cn", "string", GroupPath::root(), ["Alice"]);
//! engine.resolver.add_attribute(1, cn, false, true).await?;
//!
//! let attributes = engine.resolver.get_all_attributes(1, None, true, None).await?;
//! assert_eq!(attributes.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod confirmation;


use crate::error::{AttributeError, AttributeResult};
use crate::expression::ExpressionEvaluator;
use crate::limits::{CapacityLimitName, CapacityLimiter};
use crate::model::{
    Attribute, AttributeExt, AttributeStatement, AttributeType, EntityId, GroupPath,
};
use crate::schema::{AttributeClassManagement, AttributeTypeCatalog, AttributeValidator};
use crate::statements::{
    AttributeMap, EffectiveAttributesEvaluator, EntitySnapshot, SchemaSnapshot, validate_statements,
};
use crate::storage::{
    AttributeKey, AttributeRepository, AttributeStore, GroupStore, IdentityStore, MembershipStore,
    StoredAttribute,
};
use crate::syntax::string;
use chrono::Utc;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Attributes of an entity keyed by group, then by attribute name.
pub type AttributesByGroup = HashMap<GroupPath, AttributeMap>;

/// Reads and writes of entity attributes.
pub struct AttributeResolver<S, E> {
    store: Arc<S>,
    catalog: AttributeTypeCatalog<S>,
    classes: AttributeClassManagement<S>,
    engine: Arc<E>,
    limiter: Arc<dyn CapacityLimiter>,
}

impl<S, E> Clone for AttributeResolver<S, E> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            catalog: self.catalog.clone(),
            classes: self.classes.clone(),
            engine: Arc::clone(&self.engine),
            limiter: Arc::clone(&self.limiter),
        }
    }
}

impl<S: AttributeRepository, E: ExpressionEvaluator> AttributeResolver<S, E> {
    pub fn new(
        store: Arc<S>,
        catalog: AttributeTypeCatalog<S>,
        classes: AttributeClassManagement<S>,
        engine: Arc<E>,
        limiter: Arc<dyn CapacityLimiter>,
    ) -> Self {
        Self {
            store,
            catalog,
            classes,
            engine,
            limiter,
        }
    }

    /// Attributes of the entity per group.
    ///
    /// Without `effective` only stored attributes are returned, narrowed to
    /// `group` and `type_filter` when given. With `effective` the statements
    /// of `group`, or of every group of the entity when `group` is `None`,
    /// are evaluated as well.
    pub async fn get_all_attributes_as_map(
        &self,
        entity_id: EntityId,
        group: Option<&GroupPath>,
        effective: bool,
        type_filter: Option<&str>,
    ) -> AttributeResult<AttributesByGroup> {
        let mut direct = self.direct_attributes(entity_id).await?;
        if !effective {
            filter_direct(&mut direct, group, type_filter);
            return Ok(direct);
        }

        let membership = self.store.get_entity_membership(entity_id).await?;
        let targets: Vec<GroupPath> = match group {
            Some(group) => vec![group.clone()],
            None => membership.iter().cloned().collect(),
        };
        let identities = self.store.get_identities(entity_id).await?;
        let known_classes = self.classes.known_classes().await?;
        let snapshot = SchemaSnapshot::load(self.store.as_ref()).await?;

        let entity = EntitySnapshot {
            identities: &identities,
            groups: &membership,
            direct_attributes: &direct,
            known_classes: &known_classes,
        };
        let evaluator = EffectiveAttributesEvaluator::new(
            self.catalog.syntaxes(),
            self.engine.as_ref(),
            &snapshot,
            entity,
        )
        .with_class_attribute(self.classes.class_attribute());

        let mut result = AttributesByGroup::new();
        for target in targets {
            log::debug!("Evaluating effective attributes of entity {} in {}", entity_id, target);
            let attributes = evaluator.get_effective_attributes(&target, type_filter);
            result.insert(target, attributes);
        }
        Ok(result)
    }

    /// Effective attributes of the entity in one group.
    pub async fn get_all_attributes_as_map_one_group(
        &self,
        entity_id: EntityId,
        group: &GroupPath,
    ) -> AttributeResult<AttributeMap> {
        let mut by_group = self
            .get_all_attributes_as_map(entity_id, Some(group), true, None)
            .await?;
        Ok(by_group.remove(group).unwrap_or_default())
    }

    /// Attributes of the entity as a flat list ordered by group and name.
    /// A given `group` must be one of the entity's groups.
    pub async fn get_all_attributes(
        &self,
        entity_id: EntityId,
        group: Option<&GroupPath>,
        effective: bool,
        type_filter: Option<&str>,
    ) -> AttributeResult<Vec<AttributeExt>> {
        if let Some(group) = group {
            self.ensure_member(entity_id, group).await?;
        }
        let by_group = self
            .get_all_attributes_as_map(entity_id, group, effective, type_filter)
            .await?;

        let mut groups: Vec<_> = by_group.into_iter().collect();
        groups.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(groups
            .into_iter()
            .flat_map(|(_, attributes)| {
                let mut attributes: Vec<_> = attributes.into_values().collect();
                attributes.sort_by(|a, b| a.attribute.name.cmp(&b.attribute.name));
                attributes
            })
            .collect())
    }

    /// Effective attributes with security-sensitive types left out.
    pub async fn get_attributes(
        &self,
        entity_id: EntityId,
        group: Option<&GroupPath>,
        type_filter: Option<&str>,
    ) -> AttributeResult<Vec<AttributeExt>> {
        let attributes = self
            .get_all_attributes(entity_id, group, true, type_filter)
            .await?;
        let types = self.types_by_name().await?;
        let metadata = self.catalog.metadata_providers();
        Ok(attributes
            .into_iter()
            .filter(|attribute| {
                types
                    .get(attribute.name())
                    .is_none_or(|at| !metadata.is_security_sensitive(at))
            })
            .collect())
    }

    /// The entity's direct attribute of the type carrying a singleton
    /// metadata, if both exist.
    pub async fn get_attribute_by_metadata(
        &self,
        entity_id: EntityId,
        group: &GroupPath,
        metadata_id: &str,
    ) -> AttributeResult<Option<AttributeExt>> {
        let Some(at) = self.catalog.get_with_singleton_metadata(metadata_id).await? else {
            return Ok(None);
        };
        let mut found = self
            .get_all_attributes(entity_id, Some(group), false, Some(&at.name))
            .await?;
        Ok(if found.len() == 1 { found.pop() } else { None })
    }

    /// Add or, with `allow_update`, replace an attribute of the entity.
    ///
    /// `honor_initial_confirmation` marks a privileged caller whose
    /// confirmation state is taken as given.
    pub async fn add_attribute(
        &self,
        entity_id: EntityId,
        attribute: Attribute,
        allow_update: bool,
        honor_initial_confirmation: bool,
    ) -> AttributeResult<()> {
        let at = self.catalog.get(&attribute.name).await?;
        self.check_instance_mutable(&at)?;

        let permissions = self
            .classes
            .permissions_for(entity_id, &attribute.group_path)
            .await?;
        if !permissions.is_allowed(&attribute.name) {
            return Err(AttributeError::schema_consistency(format!(
                "The attribute '{}' is not allowed by the entity's attribute classes in the group {}",
                attribute.name, attribute.group_path
            )));
        }

        self.add_checked(entity_id, attribute, &at, allow_update, honor_initial_confirmation)
            .await
    }

    /// Add or replace an attribute on behalf of the system. Instance
    /// immutability and attribute classes are not enforced and the
    /// confirmation state is kept.
    pub async fn add_system_attribute(
        &self,
        entity_id: EntityId,
        attribute: Attribute,
        allow_update: bool,
    ) -> AttributeResult<()> {
        let at = self.catalog.get(&attribute.name).await?;
        self.add_checked(entity_id, attribute, &at, allow_update, true)
            .await
    }

    /// Add or replace several attributes, typically when an entity is set up.
    pub async fn add_attributes_list(
        &self,
        entity_id: EntityId,
        attributes: Vec<Attribute>,
        honor_initial_confirmation: bool,
    ) -> AttributeResult<()> {
        let types = self.types_by_name().await?;
        for attribute in attributes {
            let at = types
                .get(&attribute.name)
                .ok_or_else(|| AttributeError::unknown_attribute_type(&attribute.name))?;
            self.check_instance_mutable(at)?;
            self.add_checked(entity_id, attribute, at, true, honor_initial_confirmation)
                .await?;
        }
        Ok(())
    }

    /// Remove a stored attribute. Mandatory attributes can not be removed.
    pub async fn remove_attribute(
        &self,
        entity_id: EntityId,
        group: &GroupPath,
        name: &str,
    ) -> AttributeResult<()> {
        let at = self.catalog.get(name).await?;
        self.check_instance_mutable(&at)?;

        let permissions = self.classes.permissions_for(entity_id, group).await?;
        if permissions.is_mandatory(name) {
            return Err(AttributeError::schema_consistency(format!(
                "The attribute '{}' is required by the entity's attribute classes in the group {}",
                name, group
            )));
        }

        let key = AttributeKey::new(entity_id, group.clone(), name);
        if !self.store.delete_attribute(&key).await? {
            return Err(AttributeError::AttributeNotFound {
                entity_id,
                group: group.clone(),
                name: name.to_string(),
            });
        }
        log::debug!("Removed attribute {}", key);
        Ok(())
    }

    /// Assign attribute classes to the entity in the group. The entity's
    /// attributes there must conform to the new classes combined with the
    /// group's classes.
    pub async fn set_attribute_classes(
        &self,
        entity_id: EntityId,
        group: &GroupPath,
        classes: BTreeSet<String>,
    ) -> AttributeResult<()> {
        self.ensure_member(entity_id, group).await?;
        let permissions = self.classes.permissions_with(group, &classes).await?;
        let names = self.classes.attribute_names(entity_id, group).await?;
        permissions.check_attributes(names.iter().map(String::as_str))?;

        let attribute = Attribute::new(
            self.classes.class_attribute(),
            string::ID,
            group.clone(),
            classes,
        );
        log::debug!(
            "Setting attribute classes {:?} of entity {} in {}",
            attribute.values,
            entity_id,
            group
        );
        self.create_or_update(entity_id, attribute).await
    }

    /// Check a prospective set of attributes against the classes of a group.
    pub async fn check_group_attribute_classes_consistency(
        &self,
        attributes: &[Attribute],
        group: &GroupPath,
    ) -> AttributeResult<()> {
        let permissions = self.classes.permissions_with(group, &BTreeSet::new()).await?;
        permissions.check_attributes(attributes.iter().map(|a| a.name.as_str()))
    }

    /// Replace the statements of a group after checking each of them.
    pub async fn update_group_statements(
        &self,
        group: &GroupPath,
        statements: Vec<AttributeStatement>,
    ) -> AttributeResult<()> {
        let mut definition = self
            .store
            .get_group(group)
            .await?
            .ok_or_else(|| AttributeError::UnknownGroup { path: group.clone() })?;
        definition.attribute_statements = statements;

        let snapshot = SchemaSnapshot::load(self.store.as_ref()).await?;
        validate_statements(&definition, self.engine.as_ref(), &snapshot)?;

        log::info!(
            "Updating {} attribute statements of group {}",
            definition.attribute_statements.len(),
            group
        );
        self.store.update_group(definition).await?;
        Ok(())
    }

    async fn add_checked(
        &self,
        entity_id: EntityId,
        mut attribute: Attribute,
        at: &AttributeType,
        allow_update: bool,
        honor_initial_confirmation: bool,
    ) -> AttributeResult<()> {
        if attribute.value_syntax.is_empty() {
            attribute.value_syntax = at.value_syntax.clone();
        }

        let existing = self
            .store
            .get_entity_attributes(entity_id, Some(&attribute.name), Some(&attribute.group_path))
            .await?
            .into_iter()
            .next();

        let syntax = self.catalog.syntaxes().get_unconfigured(&attribute.value_syntax)?;
        let previous = existing
            .as_ref()
            .filter(|_| allow_update)
            .map(|e| &e.attribute);
        confirmation::reconcile(
            &mut attribute,
            previous,
            syntax.as_ref(),
            honor_initial_confirmation,
        )?;

        AttributeValidator::new(self.catalog.syntaxes()).validate(&attribute, at)?;
        self.check_capacity(&attribute, existing.is_none()).await?;

        let configured = self
            .catalog
            .syntaxes()
            .get(&at.value_syntax, &at.value_syntax_config)?;
        let exposed: Vec<_> = attribute
            .values
            .iter()
            .filter_map(|value| configured.public_exposure(value))
            .collect();

        let mut stored = StoredAttribute::new(entity_id, AttributeExt::direct(attribute));
        let key = stored.key();
        match existing {
            None => {
                self.ensure_member(entity_id, &key.group).await?;
                log::debug!("Creating attribute {}", key);
                self.store.create_attribute(stored).await?;
            }
            Some(_) if !allow_update => {
                return Err(AttributeError::already_exists("Attribute", key.to_string()));
            }
            Some(previous) => {
                log::debug!("Updating attribute {}", key);
                stored.attribute.created = previous.created;
                self.store.update_attribute(stored).await?;
            }
        }

        for exposure in exposed {
            log::trace!("Linking public content {} to {}", exposure.id, key);
            self.store.link_keyword_to_attribute(&exposure.id, &key).await?;
        }
        Ok(())
    }

    async fn check_capacity(&self, attribute: &Attribute, creating: bool) -> AttributeResult<()> {
        self.limiter.assert_within_limit(
            CapacityLimitName::AttributeValuesCount,
            attribute.values.len() as u64,
        )?;
        let largest = attribute.values.iter().map(String::len).max().unwrap_or(0);
        self.limiter
            .assert_within_limit(CapacityLimitName::AttributeValueSize, largest as u64)?;

        if creating && self.limiter.limit(CapacityLimitName::AttributesCount).is_some() {
            let current = self.store.count_attributes().await?;
            self.limiter
                .assert_within_limit(CapacityLimitName::AttributesCount, current + 1)?;
        }
        Ok(())
    }

    async fn create_or_update(&self, entity_id: EntityId, attribute: Attribute) -> AttributeResult<()> {
        let existing = self
            .store
            .get_entity_attributes(entity_id, Some(&attribute.name), Some(&attribute.group_path))
            .await?
            .into_iter()
            .next();
        let mut stored = StoredAttribute::new(entity_id, AttributeExt::direct(attribute));
        match existing {
            None => self.store.create_attribute(stored).await?,
            Some(previous) => {
                stored.attribute.created = previous.created;
                stored.attribute.updated = Some(Utc::now());
                self.store.update_attribute(stored).await?
            }
        }
        Ok(())
    }

    async fn direct_attributes(&self, entity_id: EntityId) -> AttributeResult<AttributesByGroup> {
        let mut by_group = AttributesByGroup::new();
        for stored in self.store.get_attributes(None, Some(entity_id), None).await? {
            let attribute = stored.attribute;
            by_group
                .entry(attribute.group_path().clone())
                .or_default()
                .insert(attribute.name().to_string(), attribute);
        }
        Ok(by_group)
    }

    async fn types_by_name(&self) -> AttributeResult<HashMap<String, AttributeType>> {
        Ok(self
            .catalog
            .list_all()
            .await?
            .into_iter()
            .map(|at| (at.name.clone(), at))
            .collect())
    }

    async fn ensure_member(&self, entity_id: EntityId, group: &GroupPath) -> AttributeResult<()> {
        if self.store.is_member(entity_id, group).await? {
            Ok(())
        } else {
            Err(AttributeError::GroupMembership {
                entity_id,
                group: group.clone(),
            })
        }
    }

    fn check_instance_mutable(&self, at: &AttributeType) -> AttributeResult<()> {
        if at.is_instance_immutable() {
            return Err(AttributeError::schema_consistency(format!(
                "The attribute with name '{}' can not be manually modified",
                at.name
            )));
        }
        Ok(())
    }
}

fn filter_direct(by_group: &mut AttributesByGroup, group: Option<&GroupPath>, type_filter: Option<&str>) {
    if let Some(group) = group {
        by_group.retain(|path, _| path == group);
    }
    if let Some(name) = type_filter {
        for attributes in by_group.values_mut() {
            attributes.retain(|attribute_name, _| attribute_name == name);
        }
    }
}
