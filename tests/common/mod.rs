//! Shared fixtures for the integration tests.
//!
//! [`TestEnvironment`] builds an engine over an in-memory store holding a
//! small group tree and one entity.

#![allow(dead_code)]

use attribute_engine::config::{AttributeEngine, AttributeEngineBuilder, EngineConfig};
use attribute_engine::model::{
    Attribute, AttributeExt, AttributeStatement, AttributeType, Group, GroupPath, Identity,
};
use attribute_engine::statements::AttributeMap;
use attribute_engine::storage::{GroupStore, InMemoryStore};
use std::sync::Arc;

pub const ENTITY: u64 = 1;

pub fn path(p: &str) -> GroupPath {
    GroupPath::new(p).unwrap()
}

pub fn string_attr(name: &str, group: &str, values: &[&str]) -> Attribute {
    Attribute::new(name, "string", path(group), values.iter().copied())
}

pub fn values(attributes: &AttributeMap, name: &str) -> Vec<String> {
    attributes
        .get(name)
        .map(|a: &AttributeExt| a.values().to_vec())
        .unwrap_or_default()
}

pub struct TestEnvironment {
    pub store: Arc<InMemoryStore>,
    pub engine: AttributeEngine<InMemoryStore>,
}

impl TestEnvironment {
    /// Groups `/g`, `/a` and `/a/b`, entity 1 in all of them.
    pub async fn new() -> Self {
        Self::with_config(EngineConfig::default()).await
    }

    pub async fn with_config(config: EngineConfig) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();

        let store = Arc::new(InMemoryStore::new());
        for group in ["/g", "/a", "/a/b"] {
            store.add_group(Group::new(path(group))).await.unwrap();
        }
        store
            .add_identity(Identity::new("userName", "alice", ENTITY))
            .await
            .unwrap();
        for group in ["/g", "/a", "/a/b"] {
            store.add_member(ENTITY, &path(group)).await.unwrap();
        }

        let engine = AttributeEngineBuilder::new(Arc::clone(&store))
            .with_config(config)
            .build()
            .unwrap();
        engine.initialize().await.unwrap();
        Self { store, engine }
    }

    pub async fn define(&self, attribute_types: impl IntoIterator<Item = AttributeType>) {
        for at in attribute_types {
            self.engine.catalog.create(at).await.unwrap();
        }
    }

    pub async fn set(&self, attribute: Attribute) {
        self.engine
            .resolver
            .add_attribute(ENTITY, attribute, true, true)
            .await
            .unwrap();
    }

    /// Attach statements to a stored group without validating them.
    pub async fn attach(&self, group: &str, statements: Vec<AttributeStatement>) {
        let mut definition = self.store.get_group(&path(group)).await.unwrap().unwrap();
        definition.attribute_statements = statements;
        self.store.update_group(definition).await.unwrap();
    }

    pub async fn effective(&self, group: &str) -> AttributeMap {
        self.engine
            .resolver
            .get_all_attributes_as_map_one_group(ENTITY, &path(group))
            .await
            .unwrap()
    }
}
