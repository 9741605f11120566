//! Attribute classes: which attribute names an entity may or must carry in a
//! group.
//!
//! The classes assigned to a group apply to all of its members; each entity
//! can have further classes assigned per group, stored as the string values
//! of the class assignment attribute (`sys:AttributeClasses` by default).
//! [`EffectivePermissions`] flattens a set of classes with all their
//! ancestors into one allowed/mandatory set.

use crate::error::{AttributeError, AttributeResult};
use crate::model::{AttributesClass, EntityId, GroupPath};
use crate::storage::{
    AttributeClassStore, AttributeRepository, AttributeStore, GroupStore, IdentityStore,
    MembershipStore,
};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Flattened permissions of a set of attribute classes.
///
/// An empty class set restricts nothing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EffectivePermissions {
    classes: BTreeSet<String>,
    allowed: BTreeSet<String>,
    mandatory: BTreeSet<String>,
    allow_arbitrary: bool,
}

impl EffectivePermissions {
    /// Permissions allowing every attribute and requiring none.
    pub fn unrestricted() -> Self {
        Self {
            allow_arbitrary: true,
            ..Self::default()
        }
    }

    /// Union of the given classes and all their ancestors.
    ///
    /// Fails with `UnknownAttributeClass` if a class or an ancestor is not in
    /// `known`.
    pub fn resolve<'a, I>(class_names: I, known: &HashMap<String, AttributesClass>) -> AttributeResult<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut pending: Vec<&str> = class_names.into_iter().collect();
        if pending.is_empty() {
            return Ok(Self::unrestricted());
        }

        let mut permissions = Self::default();
        let mut visited: BTreeSet<&str> = BTreeSet::new();
        while let Some(name) = pending.pop() {
            if !visited.insert(name) {
                continue;
            }
            let class = known
                .get(name)
                .ok_or_else(|| AttributeError::unknown_attribute_class(name))?;
            permissions.allowed.extend(class.allowed.iter().cloned());
            permissions.mandatory.extend(class.mandatory.iter().cloned());
            permissions.allow_arbitrary |= class.allow_arbitrary;
            pending.extend(class.parent_classes.iter().map(String::as_str));
        }
        permissions.classes = visited.into_iter().map(str::to_string).collect();
        permissions.allowed.extend(permissions.mandatory.iter().cloned());
        Ok(permissions)
    }

    /// Classes contributing to the permissions, ancestors included.
    pub fn classes(&self) -> &BTreeSet<String> {
        &self.classes
    }

    pub fn allowed(&self) -> &BTreeSet<String> {
        &self.allowed
    }

    pub fn mandatory(&self) -> &BTreeSet<String> {
        &self.mandatory
    }

    pub fn allows_arbitrary(&self) -> bool {
        self.allow_arbitrary
    }

    pub fn is_allowed(&self, attribute: &str) -> bool {
        self.allow_arbitrary || self.allowed.contains(attribute)
    }

    pub fn is_mandatory(&self, attribute: &str) -> bool {
        self.mandatory.contains(attribute)
    }

    /// Whether moving from `previous` to these permissions can invalidate
    /// attributes accepted before: something allowed is no longer allowed,
    /// arbitrary attributes were switched off, or a new name became mandatory.
    pub fn is_restricting(&self, previous: &EffectivePermissions) -> bool {
        if previous.allow_arbitrary && !self.allow_arbitrary {
            return true;
        }
        if !self.allow_arbitrary && !previous.allowed.is_subset(&self.allowed) {
            return true;
        }
        !self.mandatory.is_subset(&previous.mandatory)
    }

    /// Every name allowed and every mandatory name present.
    pub fn check_attributes<'a, I>(&self, attribute_names: I) -> AttributeResult<()>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let present: BTreeSet<&str> = attribute_names.into_iter().collect();
        if let Some(forbidden) = present.iter().find(|name| !self.is_allowed(name)) {
            return Err(AttributeError::schema_consistency(format!(
                "The attribute '{}' is not allowed by the attribute classes {:?}",
                forbidden, self.classes
            )));
        }
        if let Some(missing) = self
            .mandatory
            .iter()
            .find(|name| !present.contains(name.as_str()))
        {
            return Err(AttributeError::schema_consistency(format!(
                "The attribute '{}' is mandatory under the attribute classes {:?}",
                missing, self.classes
            )));
        }
        Ok(())
    }
}

/// Management of attribute class definitions and their group assignment.
pub struct AttributeClassManagement<S> {
    store: Arc<S>,
    class_attribute: String,
}

impl<S> Clone for AttributeClassManagement<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            class_attribute: self.class_attribute.clone(),
        }
    }
}

impl<S: AttributeRepository> AttributeClassManagement<S> {
    pub fn new(store: Arc<S>, class_attribute: impl Into<String>) -> Self {
        Self {
            store,
            class_attribute: class_attribute.into(),
        }
    }

    /// Name of the attribute holding per-entity class assignments.
    pub fn class_attribute(&self) -> &str {
        &self.class_attribute
    }

    /// All class definitions by name.
    pub async fn known_classes(&self) -> AttributeResult<HashMap<String, AttributesClass>> {
        Ok(self
            .store
            .get_all_attribute_classes()
            .await?
            .into_iter()
            .map(|class| (class.name.clone(), class))
            .collect())
    }

    pub async fn create(&self, mut class: AttributesClass) -> AttributeResult<()> {
        if class.name.trim().is_empty() {
            return Err(AttributeError::invalid_argument(
                "Attribute class name must not be empty",
            ));
        }
        let known = self.known_classes().await?;
        if known.contains_key(&class.name) {
            return Err(AttributeError::already_exists("Attribute class", &class.name));
        }
        check_parents(&class, &known)?;

        class.normalize();
        log::info!("Creating attribute class '{}'", class.name);
        self.store.create_attribute_class(class).await?;
        Ok(())
    }

    /// Replace a class definition.
    ///
    /// A change restricting the effective permissions is only accepted while
    /// no other class inherits from the class and neither groups nor entities
    /// have it assigned.
    pub async fn update(&self, mut class: AttributesClass) -> AttributeResult<()> {
        let mut known = self.known_classes().await?;
        if !known.contains_key(&class.name) {
            return Err(AttributeError::unknown_attribute_class(&class.name));
        }
        check_parents(&class, &known)?;
        class.normalize();

        let previous = EffectivePermissions::resolve([class.name.as_str()], &known)?;
        known.insert(class.name.clone(), class.clone());
        if inherits_from(&class.parent_classes, &class.name, &known) {
            return Err(AttributeError::schema_consistency(format!(
                "Attribute class '{}' can not inherit from itself",
                class.name
            )));
        }
        let updated = EffectivePermissions::resolve([class.name.as_str()], &known)?;

        if updated.is_restricting(&previous) {
            if let Some(usage) = self.find_usage(&class.name, &known).await? {
                return Err(AttributeError::schema_consistency(format!(
                    "Attribute class '{}' can not be restricted as it is {}",
                    class.name, usage
                )));
            }
        }

        log::info!("Updating attribute class '{}'", class.name);
        self.store.update_attribute_class(class).await?;
        Ok(())
    }

    pub async fn remove(&self, name: &str) -> AttributeResult<()> {
        let known = self.known_classes().await?;
        if !known.contains_key(name) {
            return Err(AttributeError::unknown_attribute_class(name));
        }
        if let Some(usage) = self.find_usage(name, &known).await? {
            return Err(AttributeError::schema_consistency(format!(
                "Attribute class '{}' can not be removed as it is {}",
                name, usage
            )));
        }

        log::info!("Removing attribute class '{}'", name);
        self.store.delete_attribute_class(name).await?;
        Ok(())
    }

    pub async fn get(&self, name: &str) -> AttributeResult<AttributesClass> {
        self.store
            .get_attribute_class(name)
            .await?
            .ok_or_else(|| AttributeError::unknown_attribute_class(name))
    }

    /// All classes ordered by name.
    pub async fn list_all(&self) -> AttributeResult<Vec<AttributesClass>> {
        let mut classes = self.store.get_all_attribute_classes().await?;
        classes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(classes)
    }

    /// Assign classes to a group. Every member's attributes in the group must
    /// conform to the group classes combined with the member's own classes.
    pub async fn set_group_classes(
        &self,
        group: &GroupPath,
        classes: BTreeSet<String>,
    ) -> AttributeResult<()> {
        let mut definition = self
            .store
            .get_group(group)
            .await?
            .ok_or_else(|| AttributeError::UnknownGroup { path: group.clone() })?;
        let known = self.known_classes().await?;
        EffectivePermissions::resolve(classes.iter().map(String::as_str), &known)?;

        for member in self.store.get_members(group).await? {
            let entity_classes = self.get_entity_classes(member, group).await?;
            let permissions = EffectivePermissions::resolve(
                classes.iter().chain(&entity_classes).map(String::as_str),
                &known,
            )?;
            let names = self.attribute_names(member, group).await?;
            permissions.check_attributes(names.iter().map(String::as_str))?;
        }

        log::info!("Assigning attribute classes {:?} to group {}", classes, group);
        definition.attributes_classes = classes;
        self.store.update_group(definition).await?;
        Ok(())
    }

    /// Classes assigned directly to the entity in the group.
    pub async fn get_entity_classes(
        &self,
        entity_id: EntityId,
        group: &GroupPath,
    ) -> AttributeResult<BTreeSet<String>> {
        let assigned = self
            .store
            .get_entity_attributes(entity_id, Some(&self.class_attribute), Some(group))
            .await?;
        Ok(assigned
            .iter()
            .flat_map(|attribute| attribute.values().iter().cloned())
            .collect())
    }

    /// Effective permissions of the entity in the group: the group's classes
    /// together with the entity's own classes.
    pub async fn permissions_for(
        &self,
        entity_id: EntityId,
        group: &GroupPath,
    ) -> AttributeResult<EffectivePermissions> {
        let entity_classes = self.get_entity_classes(entity_id, group).await?;
        self.permissions_with(group, &entity_classes).await
    }

    /// Effective permissions of the group's classes extended by `classes`.
    pub async fn permissions_with(
        &self,
        group: &GroupPath,
        classes: &BTreeSet<String>,
    ) -> AttributeResult<EffectivePermissions> {
        let group_classes = self
            .store
            .get_group(group)
            .await?
            .map(|g| g.attributes_classes)
            .unwrap_or_default();
        let known = self.known_classes().await?;
        EffectivePermissions::resolve(
            group_classes.iter().chain(classes).map(String::as_str),
            &known,
        )
    }

    /// Names of the entity's attributes in the group, the class assignment
    /// attribute excluded.
    pub(crate) async fn attribute_names(
        &self,
        entity_id: EntityId,
        group: &GroupPath,
    ) -> AttributeResult<BTreeSet<String>> {
        Ok(self
            .store
            .get_entity_attributes(entity_id, None, Some(group))
            .await?
            .into_iter()
            .map(|attribute| attribute.attribute.name)
            .filter(|name| name != &self.class_attribute)
            .collect())
    }

    async fn find_usage(
        &self,
        name: &str,
        known: &HashMap<String, AttributesClass>,
    ) -> AttributeResult<Option<String>> {
        if let Some(child) = known
            .values()
            .find(|class| class.parent_classes.contains(name))
        {
            return Ok(Some(format!("a parent of the class '{}'", child.name)));
        }
        let groups = self.store.get_all_groups().await?;
        if let Some(group) = groups
            .iter()
            .find(|group| group.attributes_classes.contains(name))
        {
            return Ok(Some(format!("assigned to the group {}", group.path)));
        }
        let entities = self
            .store
            .get_entities_with_string_attribute(&self.class_attribute, name)
            .await?;
        if let Some(entity) = entities.iter().next() {
            return Ok(Some(format!("assigned to the entity {}", entity)));
        }
        Ok(None)
    }
}

fn check_parents(
    class: &AttributesClass,
    known: &HashMap<String, AttributesClass>,
) -> AttributeResult<()> {
    match class
        .parent_classes
        .iter()
        .find(|parent| !known.contains_key(parent.as_str()))
    {
        Some(missing) => Err(AttributeError::unknown_attribute_class(missing)),
        None => Ok(()),
    }
}

fn inherits_from(
    parents: &BTreeSet<String>,
    ancestor: &str,
    known: &HashMap<String, AttributesClass>,
) -> bool {
    let mut pending: Vec<&str> = parents.iter().map(String::as_str).collect();
    let mut visited = BTreeSet::new();
    while let Some(name) = pending.pop() {
        if name == ancestor {
            return true;
        }
        if !visited.insert(name) {
            continue;
        }
        if let Some(class) = known.get(name) {
            pending.extend(class.parent_classes.iter().map(String::as_str));
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Attribute, AttributeExt, Group, Identity};
    use crate::storage::{InMemoryStore, StoredAttribute};
    use proptest::prelude::*;

    const CLASS_ATTRIBUTE: &str = "sys:AttributeClasses";

    fn known(classes: &[AttributesClass]) -> HashMap<String, AttributesClass> {
        classes
            .iter()
            .map(|class| (class.name.clone(), class.clone()))
            .collect()
    }

    fn path(p: &str) -> GroupPath {
        GroupPath::new(p).unwrap()
    }

    #[test]
    fn test_empty_class_set_is_unrestricted() {
        let permissions = EffectivePermissions::resolve([], &HashMap::new()).unwrap();
        assert!(permissions.is_allowed("anything"));
        assert!(permissions.mandatory().is_empty());
    }

    #[test]
    fn test_inherited_permissions() {
        let classes = known(&[
            AttributesClass::simple("base", ["cn"], ["email"]),
            AttributesClass::simple("staff", ["office"], Vec::<&str>::new()).with_parents(["base"]),
        ]);
        let permissions = EffectivePermissions::resolve(["staff"], &classes).unwrap();
        assert!(permissions.is_allowed("cn"));
        assert!(permissions.is_allowed("office"));
        assert!(permissions.is_mandatory("email"));
        assert!(!permissions.is_allowed("salary"));
        assert_eq!(permissions.classes().len(), 2);
    }

    #[test]
    fn test_arbitrary_ancestor_allows_everything() {
        let classes = known(&[
            AttributesClass::simple("open", Vec::<&str>::new(), Vec::<&str>::new())
                .with_allow_arbitrary(true),
            AttributesClass::simple("child", ["cn"], Vec::<&str>::new()).with_parents(["open"]),
        ]);
        let permissions = EffectivePermissions::resolve(["child"], &classes).unwrap();
        assert!(permissions.is_allowed("anything"));
    }

    #[test]
    fn test_parent_cycle_terminates() {
        let classes = known(&[
            AttributesClass::simple("a", ["x"], Vec::<&str>::new()).with_parents(["b"]),
            AttributesClass::simple("b", ["y"], Vec::<&str>::new()).with_parents(["a"]),
        ]);
        let permissions = EffectivePermissions::resolve(["a"], &classes).unwrap();
        assert!(permissions.is_allowed("x") && permissions.is_allowed("y"));
    }

    #[test]
    fn test_unknown_class() {
        let err = EffectivePermissions::resolve(["ghost"], &HashMap::new()).unwrap_err();
        assert!(matches!(err, AttributeError::UnknownAttributeClass { .. }));
    }

    #[test]
    fn test_check_attributes() {
        let classes = known(&[AttributesClass::simple("person", ["cn"], ["email"])]);
        let permissions = EffectivePermissions::resolve(["person"], &classes).unwrap();
        assert!(permissions.check_attributes(["cn", "email"]).is_ok());
        assert!(permissions.check_attributes(["cn"]).is_err());
        assert!(permissions.check_attributes(["email", "salary"]).is_err());
    }

    #[test]
    fn test_is_restricting() {
        let wide = known(&[AttributesClass::simple("c", ["a", "b"], Vec::<&str>::new())]);
        let narrow = known(&[AttributesClass::simple("c", ["a"], Vec::<&str>::new())]);
        let stricter = known(&[AttributesClass::simple("c", ["a", "b"], ["a"])]);
        let wide = EffectivePermissions::resolve(["c"], &wide).unwrap();
        let narrow = EffectivePermissions::resolve(["c"], &narrow).unwrap();
        let stricter = EffectivePermissions::resolve(["c"], &stricter).unwrap();

        assert!(narrow.is_restricting(&wide));
        assert!(!wide.is_restricting(&narrow));
        assert!(stricter.is_restricting(&wide));
        assert!(!wide.is_restricting(&wide));
        assert!(narrow.is_restricting(&EffectivePermissions::unrestricted()));
    }

    proptest! {
        #[test]
        fn prop_child_permissions_contain_parent_permissions(
            parent_allowed in proptest::collection::btree_set("[a-e]", 0..5),
            child_allowed in proptest::collection::btree_set("[a-e]", 0..5),
            arbitrary in any::<bool>(),
        ) {
            let classes = known(&[
                AttributesClass::simple("parent", parent_allowed.clone(), Vec::<String>::new())
                    .with_allow_arbitrary(arbitrary),
                AttributesClass::simple("child", child_allowed, Vec::<String>::new())
                    .with_parents(["parent"]),
            ]);
            let parent = EffectivePermissions::resolve(["parent"], &classes).unwrap();
            let child = EffectivePermissions::resolve(["child"], &classes).unwrap();
            prop_assert!(parent.allowed().is_subset(child.allowed()));
            prop_assert_eq!(child.allows_arbitrary(), arbitrary);
            for name in parent_allowed {
                prop_assert!(child.is_allowed(&name));
            }
        }
    }

    async fn management() -> (Arc<InMemoryStore>, AttributeClassManagement<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        store.add_group(Group::new(path("/A"))).await.unwrap();
        store.add_identity(Identity::new("userName", "alice", 1)).await.unwrap();
        store.add_member(1, &path("/A")).await.unwrap();
        let management = AttributeClassManagement::new(Arc::clone(&store), CLASS_ATTRIBUTE);
        (store, management)
    }

    #[tokio::test]
    async fn test_create_get_and_remove() {
        let (_store, management) = management().await;
        assert!(matches!(
            management.remove("foo").await,
            Err(AttributeError::UnknownAttributeClass { .. })
        ));

        let ac1 = AttributesClass::simple("ac1", ["a2"], Vec::<&str>::new());
        let ac2 = AttributesClass::simple("ac2", Vec::<&str>::new(), Vec::<&str>::new())
            .with_allow_arbitrary(true)
            .with_parents(["ac1"]);
        management.create(ac1.clone()).await.unwrap();
        assert!(matches!(
            management.create(ac1.clone()).await,
            Err(AttributeError::AlreadyExists { .. })
        ));
        management.create(ac2).await.unwrap();
        assert_eq!(management.get("ac1").await.unwrap(), ac1);
        assert_eq!(management.list_all().await.unwrap().len(), 2);

        assert!(matches!(
            management.remove("ac1").await,
            Err(AttributeError::SchemaConsistency { .. })
        ));
        management.remove("ac2").await.unwrap();
        management.remove("ac1").await.unwrap();
        assert!(management.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_with_unknown_parent() {
        let (_store, management) = management().await;
        let orphan = AttributesClass::simple("c", ["a"], Vec::<&str>::new()).with_parents(["ghost"]);
        assert!(matches!(
            management.create(orphan).await,
            Err(AttributeError::UnknownAttributeClass { .. })
        ));
    }

    #[tokio::test]
    async fn test_unused_class_can_be_restricted() {
        let (_store, management) = management().await;
        management
            .create(AttributesClass::simple("ac1", ["a2"], ["a1"]))
            .await
            .unwrap();
        let restricted = AttributesClass::simple("ac1", ["a3"], ["a2"]);
        management.update(restricted.clone()).await.unwrap();
        assert_eq!(management.get("ac1").await.unwrap(), restricted);
    }

    #[tokio::test]
    async fn test_used_class_can_only_be_widened() {
        let (store, management) = management().await;
        management
            .create(AttributesClass::simple("ac1", ["a1", "a2"], Vec::<&str>::new()))
            .await
            .unwrap();
        store
            .create_attribute(StoredAttribute::new(
                1,
                AttributeExt::direct(Attribute::new(CLASS_ATTRIBUTE, "string", path("/A"), ["ac1"])),
            ))
            .await
            .unwrap();

        let narrowed = AttributesClass::simple("ac1", ["a1"], Vec::<&str>::new());
        assert!(matches!(
            management.update(narrowed).await,
            Err(AttributeError::SchemaConsistency { .. })
        ));

        let widened = AttributesClass::simple("ac1", ["a1", "a2", "a3"], Vec::<&str>::new());
        management.update(widened).await.unwrap();

        assert!(matches!(
            management.remove("ac1").await,
            Err(AttributeError::SchemaConsistency { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_rejects_self_inheritance() {
        let (_store, management) = management().await;
        management
            .create(AttributesClass::simple("a", ["x"], Vec::<&str>::new()))
            .await
            .unwrap();
        management
            .create(AttributesClass::simple("b", ["y"], Vec::<&str>::new()).with_parents(["a"]))
            .await
            .unwrap();
        let looped = AttributesClass::simple("a", ["x"], Vec::<&str>::new()).with_parents(["b"]);
        assert!(matches!(
            management.update(looped).await,
            Err(AttributeError::SchemaConsistency { .. })
        ));
    }

    #[tokio::test]
    async fn test_group_classes_checked_against_members() {
        let (store, management) = management().await;
        management
            .create(AttributesClass::simple("person", ["cn"], Vec::<&str>::new()))
            .await
            .unwrap();
        store
            .create_attribute(StoredAttribute::new(
                1,
                AttributeExt::direct(Attribute::new("salary", "string", path("/A"), ["1"])),
            ))
            .await
            .unwrap();

        let classes = BTreeSet::from(["person".to_string()]);
        assert!(matches!(
            management.set_group_classes(&path("/A"), classes.clone()).await,
            Err(AttributeError::SchemaConsistency { .. })
        ));

        store
            .delete_attribute(&crate::storage::AttributeKey::new(1, path("/A"), "salary"))
            .await
            .unwrap();
        management.set_group_classes(&path("/A"), classes).await.unwrap();
        let group = store.get_group(&path("/A")).await.unwrap().unwrap();
        assert!(group.attributes_classes.contains("person"));

        assert!(matches!(
            management.remove("person").await,
            Err(AttributeError::SchemaConsistency { .. })
        ));
        let permissions = management.permissions_for(1, &path("/A")).await.unwrap();
        assert!(permissions.is_allowed("cn"));
        assert!(!permissions.is_allowed("salary"));
    }
}
