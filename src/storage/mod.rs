//! Storage collaborator contracts for attributes, schema objects and the
//! group tree.
//!
//! The engine never persists anything itself. Every read and write goes
//! through the traits below, which a deployment implements on top of its
//! database. Transactions are the collaborator's business: one management
//! call is expected to run inside one transaction of the backend.
//!
//! # Architecture
//!
//! The storage layer is responsible for:
//! - Keeping attributes, attribute types, classes, groups, memberships and identities
//! - Lookups by key and simple scans
//! - Keyword links of publicly exposed values
//!
//! The storage layer is NOT responsible for:
//! - Validation of values or definitions
//! - Attribute class enforcement
//! - Statement evaluation
//!
//! All operations are async and return `impl Future + Send`, so implementations
//! may simply use `async fn`. [`InMemoryStore`] implements every trait and is
//! meant for tests and embedded use.
//!
//! # Example Usage
//!
//! ```rust
//! use attribute_engine::model::{Attribute, AttributeExt, GroupPath};
//! use attribute_engine::storage::{AttributeStore, InMemoryStore, StoredAttribute};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = InMemoryStore::new();
//! let attribute = Attribute::new("cn", "string", GroupPath::root(), ["Alice"]);
//! store
//!     .create_attribute(StoredAttribute::new(1, AttributeExt::direct(attribute)))
//!     .await?;
//!
//! let found = store.get_entity_attributes(1, Some("cn"), None).await?;
//! assert_eq!(found.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod in_memory;


pub use errors::StorageError;
pub use in_memory::{InMemoryStore, InMemoryStoreStats};

use crate::model::{
    AttributeExt, AttributeType, AttributesClass, EntityId, Group, GroupPath, Identity,
    IdentityType,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;

/// Identifies one attribute of one entity in one group.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeKey {
    pub entity_id: EntityId,
    pub group: GroupPath,
    pub name: String,
}

impl AttributeKey {
    pub fn new(entity_id: EntityId, group: GroupPath, name: impl Into<String>) -> Self {
        Self {
            entity_id,
            group,
            name: name.into(),
        }
    }
}

impl fmt::Display for AttributeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.entity_id, self.group, self.name)
    }
}

/// An attribute together with its owning entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAttribute {
    pub entity_id: EntityId,
    pub attribute: AttributeExt,
}

impl StoredAttribute {
    pub fn new(entity_id: EntityId, attribute: AttributeExt) -> Self {
        Self {
            entity_id,
            attribute,
        }
    }

    pub fn key(&self) -> AttributeKey {
        AttributeKey::new(
            self.entity_id,
            self.attribute.group_path().clone(),
            self.attribute.name(),
        )
    }
}

/// Attribute instances of entities.
pub trait AttributeStore: Send + Sync {
    /// Attributes of one entity, optionally narrowed to a name and/or a group.
    fn get_entity_attributes(
        &self,
        entity_id: EntityId,
        name: Option<&str>,
        group: Option<&GroupPath>,
    ) -> impl Future<Output = Result<Vec<AttributeExt>, StorageError>> + Send;

    /// Attributes of any entity matching every given filter.
    fn get_attributes(
        &self,
        name: Option<&str>,
        entity_id: Option<EntityId>,
        group: Option<&GroupPath>,
    ) -> impl Future<Output = Result<Vec<StoredAttribute>, StorageError>> + Send;

    /// Number of stored attributes.
    fn count_attributes(&self) -> impl Future<Output = Result<u64, StorageError>> + Send;

    /// Store a new attribute. Fails if the key is taken.
    fn create_attribute(
        &self,
        attribute: StoredAttribute,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Replace an existing attribute. Fails if the key is unknown.
    fn update_attribute(
        &self,
        attribute: StoredAttribute,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Delete an attribute, returning whether it existed. Keyword links of the
    /// attribute are dropped as well.
    fn delete_attribute(
        &self,
        key: &AttributeKey,
    ) -> impl Future<Output = Result<bool, StorageError>> + Send;

    /// Link a keyword, such as a public content id, to an attribute.
    fn link_keyword_to_attribute(
        &self,
        keyword: &str,
        key: &AttributeKey,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Attributes linked to a keyword.
    fn get_all_with_keyword(
        &self,
        keyword: &str,
    ) -> impl Future<Output = Result<Vec<StoredAttribute>, StorageError>> + Send;
}

/// Attribute type definitions.
pub trait AttributeTypeStore: Send + Sync {
    fn get_attribute_type(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<AttributeType>, StorageError>> + Send;

    fn get_all_attribute_types(
        &self,
    ) -> impl Future<Output = Result<Vec<AttributeType>, StorageError>> + Send;

    fn create_attribute_type(
        &self,
        attribute_type: AttributeType,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn update_attribute_type(
        &self,
        attribute_type: AttributeType,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn delete_attribute_type(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<bool, StorageError>> + Send;
}

/// Attribute class definitions.
pub trait AttributeClassStore: Send + Sync {
    fn get_attribute_class(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<AttributesClass>, StorageError>> + Send;

    fn get_all_attribute_classes(
        &self,
    ) -> impl Future<Output = Result<Vec<AttributesClass>, StorageError>> + Send;

    fn create_attribute_class(
        &self,
        class: AttributesClass,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn update_attribute_class(
        &self,
        class: AttributesClass,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn delete_attribute_class(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<bool, StorageError>> + Send;
}

/// The group tree.
pub trait GroupStore: Send + Sync {
    fn get_group(
        &self,
        path: &GroupPath,
    ) -> impl Future<Output = Result<Option<Group>, StorageError>> + Send;

    fn get_all_groups(&self) -> impl Future<Output = Result<Vec<Group>, StorageError>> + Send;

    /// Replace an existing group definition.
    fn update_group(&self, group: Group) -> impl Future<Output = Result<(), StorageError>> + Send;
}

/// Group memberships of entities.
pub trait MembershipStore: Send + Sync {
    /// Paths of all groups the entity belongs to.
    fn get_entity_membership(
        &self,
        entity_id: EntityId,
    ) -> impl Future<Output = Result<BTreeSet<GroupPath>, StorageError>> + Send;

    fn is_member(
        &self,
        entity_id: EntityId,
        group: &GroupPath,
    ) -> impl Future<Output = Result<bool, StorageError>> + Send;

    fn get_members(
        &self,
        group: &GroupPath,
    ) -> impl Future<Output = Result<BTreeSet<EntityId>, StorageError>> + Send;
}

/// Identities of entities.
pub trait IdentityStore: Send + Sync {
    fn get_identities(
        &self,
        entity_id: EntityId,
    ) -> impl Future<Output = Result<Vec<Identity>, StorageError>> + Send;

    /// Entities having a string attribute `attribute` with `value` among its
    /// values, in any group.
    fn get_entities_with_string_attribute(
        &self,
        attribute: &str,
        value: &str,
    ) -> impl Future<Output = Result<BTreeSet<EntityId>, StorageError>> + Send;
}

/// Identity types and their extracted-attribute mappings.
pub trait IdentityTypeStore: Send + Sync {
    fn get_all_identity_types(
        &self,
    ) -> impl Future<Output = Result<Vec<IdentityType>, StorageError>> + Send;

    fn update_identity_type(
        &self,
        identity_type: IdentityType,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;
}

/// Every storage contract the engine needs, implemented automatically.
pub trait AttributeRepository:
    AttributeStore
    + AttributeTypeStore
    + AttributeClassStore
    + GroupStore
    + MembershipStore
    + IdentityStore
    + IdentityTypeStore
{
}

impl<T> AttributeRepository for T where
    T: AttributeStore
        + AttributeTypeStore
        + AttributeClassStore
        + GroupStore
        + MembershipStore
        + IdentityStore
        + IdentityTypeStore
{
}
