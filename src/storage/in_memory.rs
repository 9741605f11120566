//! In-memory implementation of every storage contract.
//!
//! Thread-safe through a single async `RwLock` around plain ordered maps. It is
//! designed for tests, development and embedded use where persistence is not
//! required. Ordered maps keep every listing deterministic.
//!
//! A fresh store contains only the root group `/`. Entities come into
//! existence with their first identity and are then members of `/`.
//!
//! # Example Usage
//!
//! ```rust
//! use attribute_engine::model::{Group, GroupPath, Identity};
//! use attribute_engine::storage::{InMemoryStore, MembershipStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = InMemoryStore::new();
//! let staff = GroupPath::new("/staff")?;
//! store.add_group(Group::new(staff.clone())).await?;
//! store.add_identity(Identity::new("userName", "alice", 1)).await?;
//! store.add_member(1, &staff).await?;
//!
//! assert!(store.is_member(1, &staff).await?);
//! # Ok(())
//! # }
//! ```

use crate::model::{
    AttributeExt, AttributeType, AttributesClass, EntityId, Group, GroupPath, Identity,
    IdentityType,
};
use crate::storage::{
    AttributeClassStore, AttributeKey, AttributeStore, AttributeTypeStore, GroupStore,
    IdentityStore, IdentityTypeStore, MembershipStore, StorageError, StoredAttribute,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug)]
struct StoreData {
    attributes: BTreeMap<AttributeKey, AttributeExt>,
    keywords: HashMap<String, BTreeSet<AttributeKey>>,
    attribute_types: BTreeMap<String, AttributeType>,
    classes: BTreeMap<String, AttributesClass>,
    groups: BTreeMap<GroupPath, Group>,
    memberships: BTreeMap<EntityId, BTreeSet<GroupPath>>,
    identities: Vec<Identity>,
    identity_types: BTreeMap<String, IdentityType>,
}

impl StoreData {
    fn with_root() -> Self {
        let mut groups = BTreeMap::new();
        groups.insert(GroupPath::root(), Group::new(GroupPath::root()));
        Self {
            attributes: BTreeMap::new(),
            keywords: HashMap::new(),
            attribute_types: BTreeMap::new(),
            classes: BTreeMap::new(),
            groups,
            memberships: BTreeMap::new(),
            identities: Vec::new(),
            identity_types: BTreeMap::new(),
        }
    }
}

/// Thread-safe in-memory store.
#[derive(Clone)]
pub struct InMemoryStore {
    data: Arc<RwLock<StoreData>>,
}

/// Object counts, for debugging and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InMemoryStoreStats {
    pub attribute_count: usize,
    pub attribute_type_count: usize,
    pub class_count: usize,
    pub group_count: usize,
    pub entity_count: usize,
}

impl InMemoryStore {
    /// Create a store holding only the root group.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(StoreData::with_root())),
        }
    }

    /// Add a group below an existing parent group.
    pub async fn add_group(&self, group: Group) -> Result<(), StorageError> {
        let mut data = self.data.write().await;
        if data.groups.contains_key(&group.path) {
            return Err(StorageError::already_exists("Group", group.path.as_str()));
        }
        if let Some(parent) = group.path.parent() {
            if !data.groups.contains_key(&parent) {
                return Err(StorageError::not_found("Group", parent.as_str()));
            }
        }
        data.groups.insert(group.path.clone(), group);
        Ok(())
    }

    /// Add an identity. The entity becomes a member of `/`.
    pub async fn add_identity(&self, identity: Identity) -> Result<(), StorageError> {
        let mut data = self.data.write().await;
        if data
            .identities
            .iter()
            .any(|i| i.type_id == identity.type_id && i.value == identity.value)
        {
            return Err(StorageError::already_exists(
                "Identity",
                format!("{}:{}", identity.type_id, identity.value),
            ));
        }
        data.memberships
            .entry(identity.entity_id)
            .or_default()
            .insert(GroupPath::root());
        data.identities.push(identity);
        Ok(())
    }

    /// Make an entity a member of a group and of every ancestor group.
    pub async fn add_member(&self, entity_id: EntityId, group: &GroupPath) -> Result<(), StorageError> {
        let mut data = self.data.write().await;
        if !data.groups.contains_key(group) {
            return Err(StorageError::not_found("Group", group.as_str()));
        }
        let membership = data.memberships.entry(entity_id).or_default();
        let mut current = Some(group.clone());
        while let Some(path) = current {
            current = path.parent();
            membership.insert(path);
        }
        Ok(())
    }

    /// Register an identity type.
    pub async fn add_identity_type(&self, identity_type: IdentityType) -> Result<(), StorageError> {
        let mut data = self.data.write().await;
        data.identity_types
            .insert(identity_type.name.clone(), identity_type);
        Ok(())
    }

    /// Get storage statistics for debugging and monitoring.
    pub async fn stats(&self) -> InMemoryStoreStats {
        let data = self.data.read().await;
        InMemoryStoreStats {
            attribute_count: data.attributes.len(),
            attribute_type_count: data.attribute_types.len(),
            class_count: data.classes.len(),
            group_count: data.groups.len(),
            entity_count: data.memberships.len(),
        }
    }

    /// Drop everything but the root group (useful for testing).
    pub async fn clear(&self) {
        let mut data = self.data.write().await;
        *data = StoreData::with_root();
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AttributeStore for InMemoryStore {
    async fn get_entity_attributes(
        &self,
        entity_id: EntityId,
        name: Option<&str>,
        group: Option<&GroupPath>,
    ) -> Result<Vec<AttributeExt>, StorageError> {
        let data = self.data.read().await;
        Ok(data
            .attributes
            .iter()
            .filter(|(key, _)| key.entity_id == entity_id)
            .filter(|(key, _)| name.is_none_or(|n| key.name == n))
            .filter(|(key, _)| group.is_none_or(|g| &key.group == g))
            .map(|(_, attribute)| attribute.clone())
            .collect())
    }

    async fn get_attributes(
        &self,
        name: Option<&str>,
        entity_id: Option<EntityId>,
        group: Option<&GroupPath>,
    ) -> Result<Vec<StoredAttribute>, StorageError> {
        let data = self.data.read().await;
        Ok(data
            .attributes
            .iter()
            .filter(|(key, _)| name.is_none_or(|n| key.name == n))
            .filter(|(key, _)| entity_id.is_none_or(|e| key.entity_id == e))
            .filter(|(key, _)| group.is_none_or(|g| &key.group == g))
            .map(|(key, attribute)| StoredAttribute::new(key.entity_id, attribute.clone()))
            .collect())
    }

    async fn count_attributes(&self) -> Result<u64, StorageError> {
        let data = self.data.read().await;
        Ok(data.attributes.len() as u64)
    }

    async fn create_attribute(&self, attribute: StoredAttribute) -> Result<(), StorageError> {
        let key = attribute.key();
        let mut data = self.data.write().await;
        if data.attributes.contains_key(&key) {
            return Err(StorageError::already_exists("Attribute", key.to_string()));
        }
        data.attributes.insert(key, attribute.attribute);
        Ok(())
    }

    async fn update_attribute(&self, attribute: StoredAttribute) -> Result<(), StorageError> {
        let key = attribute.key();
        let mut data = self.data.write().await;
        match data.attributes.get_mut(&key) {
            Some(existing) => {
                *existing = attribute.attribute;
                Ok(())
            }
            None => Err(StorageError::not_found("Attribute", key.to_string())),
        }
    }

    async fn delete_attribute(&self, key: &AttributeKey) -> Result<bool, StorageError> {
        let mut data = self.data.write().await;
        let existed = data.attributes.remove(key).is_some();
        if existed {
            for linked in data.keywords.values_mut() {
                linked.remove(key);
            }
            data.keywords.retain(|_, linked| !linked.is_empty());
        }
        Ok(existed)
    }

    async fn link_keyword_to_attribute(
        &self,
        keyword: &str,
        key: &AttributeKey,
    ) -> Result<(), StorageError> {
        let mut data = self.data.write().await;
        if !data.attributes.contains_key(key) {
            return Err(StorageError::not_found("Attribute", key.to_string()));
        }
        data.keywords
            .entry(keyword.to_string())
            .or_default()
            .insert(key.clone());
        Ok(())
    }

    async fn get_all_with_keyword(&self, keyword: &str) -> Result<Vec<StoredAttribute>, StorageError> {
        let data = self.data.read().await;
        Ok(data
            .keywords
            .get(keyword)
            .into_iter()
            .flatten()
            .filter_map(|key| {
                data.attributes
                    .get(key)
                    .map(|attribute| StoredAttribute::new(key.entity_id, attribute.clone()))
            })
            .collect())
    }
}

impl AttributeTypeStore for InMemoryStore {
    async fn get_attribute_type(&self, name: &str) -> Result<Option<AttributeType>, StorageError> {
        let data = self.data.read().await;
        Ok(data.attribute_types.get(name).cloned())
    }

    async fn get_all_attribute_types(&self) -> Result<Vec<AttributeType>, StorageError> {
        let data = self.data.read().await;
        Ok(data.attribute_types.values().cloned().collect())
    }

    async fn create_attribute_type(&self, attribute_type: AttributeType) -> Result<(), StorageError> {
        let mut data = self.data.write().await;
        if data.attribute_types.contains_key(&attribute_type.name) {
            return Err(StorageError::already_exists(
                "Attribute type",
                attribute_type.name,
            ));
        }
        data.attribute_types
            .insert(attribute_type.name.clone(), attribute_type);
        Ok(())
    }

    async fn update_attribute_type(&self, attribute_type: AttributeType) -> Result<(), StorageError> {
        let mut data = self.data.write().await;
        match data.attribute_types.get_mut(&attribute_type.name) {
            Some(existing) => {
                *existing = attribute_type;
                Ok(())
            }
            None => Err(StorageError::not_found("Attribute type", attribute_type.name)),
        }
    }

    async fn delete_attribute_type(&self, name: &str) -> Result<bool, StorageError> {
        let mut data = self.data.write().await;
        Ok(data.attribute_types.remove(name).is_some())
    }
}

impl AttributeClassStore for InMemoryStore {
    async fn get_attribute_class(&self, name: &str) -> Result<Option<AttributesClass>, StorageError> {
        let data = self.data.read().await;
        Ok(data.classes.get(name).cloned())
    }

    async fn get_all_attribute_classes(&self) -> Result<Vec<AttributesClass>, StorageError> {
        let data = self.data.read().await;
        Ok(data.classes.values().cloned().collect())
    }

    async fn create_attribute_class(&self, class: AttributesClass) -> Result<(), StorageError> {
        let mut data = self.data.write().await;
        if data.classes.contains_key(&class.name) {
            return Err(StorageError::already_exists("Attribute class", class.name));
        }
        data.classes.insert(class.name.clone(), class);
        Ok(())
    }

    async fn update_attribute_class(&self, class: AttributesClass) -> Result<(), StorageError> {
        let mut data = self.data.write().await;
        match data.classes.get_mut(&class.name) {
            Some(existing) => {
                *existing = class;
                Ok(())
            }
            None => Err(StorageError::not_found("Attribute class", class.name)),
        }
    }

    async fn delete_attribute_class(&self, name: &str) -> Result<bool, StorageError> {
        let mut data = self.data.write().await;
        Ok(data.classes.remove(name).is_some())
    }
}

impl GroupStore for InMemoryStore {
    async fn get_group(&self, path: &GroupPath) -> Result<Option<Group>, StorageError> {
        let data = self.data.read().await;
        Ok(data.groups.get(path).cloned())
    }

    async fn get_all_groups(&self) -> Result<Vec<Group>, StorageError> {
        let data = self.data.read().await;
        Ok(data.groups.values().cloned().collect())
    }

    async fn update_group(&self, group: Group) -> Result<(), StorageError> {
        let mut data = self.data.write().await;
        match data.groups.get_mut(&group.path) {
            Some(existing) => {
                *existing = group;
                Ok(())
            }
            None => Err(StorageError::not_found("Group", group.path.as_str())),
        }
    }
}

impl MembershipStore for InMemoryStore {
    async fn get_entity_membership(&self, entity_id: EntityId) -> Result<BTreeSet<GroupPath>, StorageError> {
        let data = self.data.read().await;
        Ok(data.memberships.get(&entity_id).cloned().unwrap_or_default())
    }

    async fn is_member(&self, entity_id: EntityId, group: &GroupPath) -> Result<bool, StorageError> {
        let data = self.data.read().await;
        Ok(data
            .memberships
            .get(&entity_id)
            .is_some_and(|groups| groups.contains(group)))
    }

    async fn get_members(&self, group: &GroupPath) -> Result<BTreeSet<EntityId>, StorageError> {
        let data = self.data.read().await;
        Ok(data
            .memberships
            .iter()
            .filter(|(_, groups)| groups.contains(group))
            .map(|(entity_id, _)| *entity_id)
            .collect())
    }
}

impl IdentityStore for InMemoryStore {
    async fn get_identities(&self, entity_id: EntityId) -> Result<Vec<Identity>, StorageError> {
        let data = self.data.read().await;
        Ok(data
            .identities
            .iter()
            .filter(|identity| identity.entity_id == entity_id)
            .cloned()
            .collect())
    }

    async fn get_entities_with_string_attribute(
        &self,
        attribute: &str,
        value: &str,
    ) -> Result<BTreeSet<EntityId>, StorageError> {
        let data = self.data.read().await;
        Ok(data
            .attributes
            .iter()
            .filter(|(key, stored)| {
                key.name == attribute && stored.values().iter().any(|v| v == value)
            })
            .map(|(key, _)| key.entity_id)
            .collect())
    }
}

impl IdentityTypeStore for InMemoryStore {
    async fn get_all_identity_types(&self) -> Result<Vec<IdentityType>, StorageError> {
        let data = self.data.read().await;
        Ok(data.identity_types.values().cloned().collect())
    }

    async fn update_identity_type(&self, identity_type: IdentityType) -> Result<(), StorageError> {
        let mut data = self.data.write().await;
        match data.identity_types.get_mut(&identity_type.name) {
            Some(existing) => {
                *existing = identity_type;
                Ok(())
            }
            None => Err(StorageError::not_found("Identity type", identity_type.name)),
        }
    }
}
