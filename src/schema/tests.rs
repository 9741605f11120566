//! Tests for the attribute type catalog.

use super::{AttributeTypeCatalog, MetadataProviderRegistry, MetadataTypeCache};
use crate::error::{AttributeError, ValidationError};
use crate::model::{Attribute, AttributeExt, AttributeType, GroupPath, IdentityType};
use crate::storage::{
    AttributeStore, AttributeTypeStore, IdentityTypeStore, InMemoryStore, StoredAttribute,
};
use crate::syntax::SyntaxRegistry;
use serde_json::json;
use std::sync::Arc;

fn catalog() -> (Arc<InMemoryStore>, AttributeTypeCatalog<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    let catalog = AttributeTypeCatalog::new(
        Arc::clone(&store),
        Arc::new(SyntaxRegistry::with_defaults()),
        Arc::new(MetadataProviderRegistry::with_defaults()),
        Arc::new(MetadataTypeCache::default()),
    );
    (store, catalog)
}

async fn store_instance(store: &InMemoryStore, entity_id: u64, name: &str, values: &[&str]) {
    store
        .create_attribute(StoredAttribute::new(
            entity_id,
            AttributeExt::direct(Attribute::new(
                name,
                "string",
                GroupPath::root(),
                values.iter().copied(),
            )),
        ))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_create_and_get() {
    let (_store, catalog) = catalog();
    let at = AttributeType::new("cn", "string", 1, 1).with_description("Common name");
    catalog.create(at.clone()).await.unwrap();

    assert_eq!(catalog.get("cn").await.unwrap(), at);
    assert!(matches!(
        catalog.create(at).await,
        Err(AttributeError::AlreadyExists { .. })
    ));
    assert!(matches!(
        catalog.get("missing").await,
        Err(AttributeError::UnknownAttributeType { .. })
    ));
}

#[tokio::test]
async fn test_create_rejects_invalid_definitions() {
    let (_store, catalog) = catalog();

    let flags = AttributeType::new("a", "string", 0, 1).with_flags(0x10);
    assert!(matches!(
        catalog.create(flags).await,
        Err(AttributeError::SchemaValidation(ValidationError::InvalidAttributeType { .. }))
    ));

    let bounds = AttributeType::new("b", "string", 3, 1);
    assert!(matches!(
        catalog.create(bounds).await,
        Err(AttributeError::SchemaValidation(ValidationError::InvalidAttributeType { .. }))
    ));

    let syntax = AttributeType::new("c", "hologram", 0, 1);
    assert!(matches!(
        catalog.create(syntax).await,
        Err(AttributeError::UnknownSyntax { .. })
    ));

    let config = AttributeType::new("d", "integer", 0, 1).with_syntax_config(json!({"min": "x"}));
    assert!(matches!(
        catalog.create(config).await,
        Err(AttributeError::SchemaValidation(ValidationError::InvalidSyntaxConfiguration { .. }))
    ));

    let metadata = AttributeType::new("e", "string", 0, 1).with_metadata("unknown", "");
    assert!(matches!(
        catalog.create(metadata).await,
        Err(AttributeError::UnknownMetadata { .. })
    ));

    assert!(catalog.list_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_singleton_metadata() {
    let (_store, catalog) = catalog();
    let email = AttributeType::new("email", "verifiableEmail", 0, 1).with_metadata("contactEmail", "");
    catalog.create(email.clone()).await.unwrap();

    let second = AttributeType::new("email2", "verifiableEmail", 0, 1).with_metadata("contactEmail", "");
    assert!(matches!(
        catalog.create(second).await,
        Err(AttributeError::SchemaConsistency { .. })
    ));

    let wrong_syntax = AttributeType::new("name", "integer", 0, 1).with_metadata("entityName", "");
    assert!(catalog.create(wrong_syntax).await.is_err());

    assert_eq!(
        catalog.get_with_singleton_metadata("contactEmail").await.unwrap(),
        Some(email.clone())
    );
    assert_eq!(catalog.get_with_singleton_metadata("entityName").await.unwrap(), None);
    assert!(matches!(
        catalog.get_with_singleton_metadata("sensitive").await,
        Err(AttributeError::InvalidArgument { .. })
    ));
    assert_eq!(catalog.list_by_metadata("contactEmail").await.unwrap(), vec![email]);
}

#[tokio::test]
async fn test_cache_is_invalidated_on_mutation() {
    let (_store, catalog) = catalog();
    assert_eq!(catalog.get_with_singleton_metadata("entityName").await.unwrap(), None);

    let name = AttributeType::new("name", "string", 0, 1).with_metadata("entityName", "");
    catalog.create(name.clone()).await.unwrap();
    assert_eq!(
        catalog.get_with_singleton_metadata("entityName").await.unwrap(),
        Some(name)
    );

    catalog.remove("name", false).await.unwrap();
    assert_eq!(catalog.get_with_singleton_metadata("entityName").await.unwrap(), None);
}

#[tokio::test]
async fn test_update_revalidates_instances() {
    let (store, catalog) = catalog();
    catalog
        .create(AttributeType::new("tags", "string", 0, 5))
        .await
        .unwrap();
    store_instance(&store, 1, "tags", &["a", "b", "c"]).await;
    store_instance(&store, 2, "tags", &["a"]).await;

    let narrowed = AttributeType::new("tags", "string", 0, 2);
    match catalog.update(narrowed).await {
        Err(AttributeError::ConflictingInstance {
            entity_id, source, ..
        }) => {
            assert_eq!(entity_id, 1);
            assert!(matches!(source, ValidationError::TooManyValues { .. }));
        }
        other => panic!("Expected ConflictingInstance, got {:?}", other),
    }
    assert_eq!(catalog.get("tags").await.unwrap().max_elements, 5);

    let widened = AttributeType::new("tags", "string", 0, 10).with_description("Tags");
    catalog.update(widened.clone()).await.unwrap();
    assert_eq!(catalog.get("tags").await.unwrap(), widened);
}

#[tokio::test]
async fn test_immutable_type_update_keeps_definition() {
    let (store, catalog) = catalog();
    let at = AttributeType::new("sys:x", "string", 0, 1)
        .with_flags(AttributeType::TYPE_IMMUTABLE_FLAG);
    store.create_attribute_type(at.clone()).await.unwrap();

    let change = AttributeType::new("sys:x", "integer", 2, 3)
        .with_description("changed")
        .with_self_modifiable(true);
    catalog.update(change).await.unwrap();

    let stored = catalog.get("sys:x").await.unwrap();
    assert_eq!(stored.value_syntax, "string");
    assert_eq!(stored.max_elements, 1);
    assert_eq!(stored.description.as_deref(), Some("changed"));
    assert!(stored.self_modifiable);

    assert!(matches!(
        catalog.remove("sys:x", true).await,
        Err(AttributeError::SchemaConsistency { .. })
    ));
}

#[tokio::test]
async fn test_syntax_change_clears_identity_extraction() {
    let (store, catalog) = catalog();
    catalog
        .create(AttributeType::new("uid", "string", 0, 1))
        .await
        .unwrap();
    store
        .add_identity_type(IdentityType::new("x500").with_extracted("uid", "uid").with_extracted("cn", "cn"))
        .await
        .unwrap();
    store_instance(&store, 1, "uid", &["42"]).await;

    catalog
        .update(AttributeType::new("uid", "integer", 0, 1))
        .await
        .unwrap();

    let identity_types = store.get_all_identity_types().await.unwrap();
    assert_eq!(identity_types[0].extracted_attributes.len(), 1);
    assert!(identity_types[0].extracted_attributes.contains_key("cn"));

    let instances = store.get_attributes(Some("uid"), None, None).await.unwrap();
    assert_eq!(instances[0].attribute.value_syntax(), "integer");
}

#[tokio::test]
async fn test_remove_with_and_without_instances() {
    let (store, catalog) = catalog();
    catalog
        .create(AttributeType::new("cn", "string", 0, 1))
        .await
        .unwrap();
    store_instance(&store, 1, "cn", &["Alice"]).await;

    assert!(matches!(
        catalog.remove("cn", false).await,
        Err(AttributeError::SchemaConsistency { .. })
    ));
    catalog.remove("cn", true).await.unwrap();
    assert!(store.get_attributes(Some("cn"), None, None).await.unwrap().is_empty());
    assert!(catalog.list_all().await.unwrap().is_empty());
}
