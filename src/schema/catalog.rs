//! Attribute type catalog: creation, update and removal of attribute types.
//!
//! The catalog validates definitions before they reach the store: flags,
//! cardinality bounds, the value syntax together with its configuration and
//! the attached metadata. Updates of mutable types re-validate every stored
//! instance so that no attribute is left in conflict with its type.

use super::cache::MetadataTypeCache;
use super::metadata::MetadataProviderRegistry;
use super::validation::validate_with_syntax;
use crate::error::{AttributeError, AttributeResult, ValidationError};
use crate::model::AttributeType;
use crate::storage::{AttributeRepository, AttributeStore, AttributeTypeStore, IdentityTypeStore};
use crate::syntax::SyntaxRegistry;
use std::sync::Arc;

/// Service object managing attribute types.
pub struct AttributeTypeCatalog<S> {
    store: Arc<S>,
    syntaxes: Arc<SyntaxRegistry>,
    metadata: Arc<MetadataProviderRegistry>,
    cache: Arc<MetadataTypeCache>,
}

impl<S> Clone for AttributeTypeCatalog<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            syntaxes: Arc::clone(&self.syntaxes),
            metadata: Arc::clone(&self.metadata),
            cache: Arc::clone(&self.cache),
        }
    }
}

impl<S: AttributeRepository> AttributeTypeCatalog<S> {
    pub fn new(
        store: Arc<S>,
        syntaxes: Arc<SyntaxRegistry>,
        metadata: Arc<MetadataProviderRegistry>,
        cache: Arc<MetadataTypeCache>,
    ) -> Self {
        Self {
            store,
            syntaxes,
            metadata,
            cache,
        }
    }

    pub fn syntaxes(&self) -> &SyntaxRegistry {
        &self.syntaxes
    }

    pub fn metadata_providers(&self) -> &MetadataProviderRegistry {
        &self.metadata
    }

    pub async fn create(&self, attribute_type: AttributeType) -> AttributeResult<()> {
        if attribute_type.name.trim().is_empty() {
            return Err(AttributeError::invalid_argument(
                "Attribute type name must not be empty",
            ));
        }
        if self
            .store
            .get_attribute_type(&attribute_type.name)
            .await?
            .is_some()
        {
            return Err(AttributeError::already_exists(
                "Attribute type",
                &attribute_type.name,
            ));
        }
        self.verify_definition(&attribute_type).await?;

        log::info!(
            "Creating attribute type '{}' with syntax {}",
            attribute_type.name,
            attribute_type.value_syntax
        );
        self.store.create_attribute_type(attribute_type).await?;
        self.cache.invalidate().await;
        Ok(())
    }

    /// Update an attribute type.
    ///
    /// For a type-immutable type only the displayed name, description and
    /// self-modifiable flag are taken from `attribute_type`. Otherwise the
    /// whole definition is replaced after every stored instance has been
    /// validated against it; the first instance in conflict aborts the update.
    pub async fn update(&self, attribute_type: AttributeType) -> AttributeResult<()> {
        let existing = self.get(&attribute_type.name).await?;

        if existing.is_type_immutable() {
            let mut updated = existing;
            updated.displayed_name = attribute_type.displayed_name;
            updated.description = attribute_type.description;
            updated.self_modifiable = attribute_type.self_modifiable;
            log::info!(
                "Updating presentation of immutable attribute type '{}'",
                updated.name
            );
            self.store.update_attribute_type(updated).await?;
            self.cache.invalidate().await;
            return Ok(());
        }

        self.verify_definition(&attribute_type).await?;
        let syntax = self.syntaxes.get(
            &attribute_type.value_syntax,
            &attribute_type.value_syntax_config,
        )?;
        let syntax_changed = existing.value_syntax != attribute_type.value_syntax;

        let mut instances = self
            .store
            .get_attributes(Some(&attribute_type.name), None, None)
            .await?;
        for instance in &mut instances {
            instance.attribute.attribute.value_syntax = attribute_type.value_syntax.clone();
            validate_with_syntax(&instance.attribute.attribute, &attribute_type, syntax.as_ref())
                .map_err(|source| AttributeError::ConflictingInstance {
                    entity_id: instance.entity_id,
                    group: instance.attribute.group_path().clone(),
                    source,
                })?;
        }

        log::info!("Updating attribute type '{}'", attribute_type.name);
        let name = attribute_type.name.clone();
        self.store.update_attribute_type(attribute_type).await?;
        if syntax_changed {
            for instance in instances {
                self.store.update_attribute(instance).await?;
            }
            self.clear_identity_extraction(&name).await?;
        }
        self.cache.invalidate().await;
        Ok(())
    }

    /// Remove an attribute type. Stored instances are deleted when
    /// `delete_instances` is set, otherwise their presence is an error.
    pub async fn remove(&self, name: &str, delete_instances: bool) -> AttributeResult<()> {
        let existing = self.get(name).await?;
        if existing.is_type_immutable() {
            return Err(AttributeError::schema_consistency(format!(
                "The attribute type '{}' can not be removed",
                name
            )));
        }

        let instances = self.store.get_attributes(Some(name), None, None).await?;
        if !instances.is_empty() && !delete_instances {
            return Err(AttributeError::schema_consistency(format!(
                "The attribute type '{}' has {} instances and their removal was not requested",
                name,
                instances.len()
            )));
        }
        for instance in &instances {
            self.store.delete_attribute(&instance.key()).await?;
        }

        log::info!(
            "Removing attribute type '{}' with {} instances",
            name,
            instances.len()
        );
        self.store.delete_attribute_type(name).await?;
        self.clear_identity_extraction(name).await?;
        self.cache.invalidate().await;
        Ok(())
    }

    pub async fn get(&self, name: &str) -> AttributeResult<AttributeType> {
        self.store
            .get_attribute_type(name)
            .await?
            .ok_or_else(|| AttributeError::unknown_attribute_type(name))
    }

    /// All types ordered by name.
    pub async fn list_all(&self) -> AttributeResult<Vec<AttributeType>> {
        let mut types = self.store.get_all_attribute_types().await?;
        types.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(types)
    }

    /// Types carrying the given metadata, ordered by name.
    pub async fn list_by_metadata(&self, metadata_id: &str) -> AttributeResult<Vec<AttributeType>> {
        let mut types = self.list_all().await?;
        types.retain(|at| at.metadata.contains_key(metadata_id));
        Ok(types)
    }

    /// The only type carrying a singleton metadata, if any. Served from the
    /// metadata cache when possible.
    pub async fn get_with_singleton_metadata(
        &self,
        metadata_id: &str,
    ) -> AttributeResult<Option<AttributeType>> {
        let provider = self.metadata.get(metadata_id)?;
        if !provider.is_singleton() {
            return Err(AttributeError::invalid_argument(format!(
                "Metadata '{}' is not a singleton",
                metadata_id
            )));
        }
        if let Some(cached) = self.cache.get(metadata_id).await {
            return Ok(cached);
        }

        let found = self
            .store
            .get_all_attribute_types()
            .await?
            .into_iter()
            .find(|at| at.metadata.contains_key(metadata_id));
        self.cache.put(metadata_id, found.clone()).await;
        Ok(found)
    }

    async fn verify_definition(&self, attribute_type: &AttributeType) -> AttributeResult<()> {
        let invalid = |details: String| -> AttributeError {
            ValidationError::invalid_attribute_type(&attribute_type.name, details).into()
        };

        if attribute_type.has_unknown_flags() {
            return Err(invalid(format!(
                "unsupported flags {:#x}",
                attribute_type.flags
            )));
        }
        if attribute_type.min_elements > attribute_type.max_elements {
            return Err(invalid(format!(
                "minimum number of elements {} is larger than the maximum {}",
                attribute_type.min_elements, attribute_type.max_elements
            )));
        }
        self.syntaxes.get(
            &attribute_type.value_syntax,
            &attribute_type.value_syntax_config,
        )?;

        let mut others = None;
        for (metadata_id, value) in &attribute_type.metadata {
            let provider = self.metadata.get(metadata_id)?;
            provider.verify(value, attribute_type)?;
            if !provider.is_singleton() {
                continue;
            }
            if others.is_none() {
                others = Some(self.store.get_all_attribute_types().await?);
            }
            let holder = others.iter().flatten().find(|other| {
                other.name != attribute_type.name && other.metadata.contains_key(metadata_id)
            });
            if let Some(holder) = holder {
                return Err(AttributeError::schema_consistency(format!(
                    "The metadata '{}' is already assigned to the attribute type '{}'",
                    metadata_id, holder.name
                )));
            }
        }
        Ok(())
    }

    async fn clear_identity_extraction(&self, attribute_type: &str) -> AttributeResult<()> {
        for mut identity_type in self.store.get_all_identity_types().await? {
            let before = identity_type.extracted_attributes.len();
            identity_type
                .extracted_attributes
                .retain(|_, target| target != attribute_type);
            if identity_type.extracted_attributes.len() != before {
                log::debug!(
                    "Dropping extraction of '{}' from identity type '{}'",
                    attribute_type,
                    identity_type.name
                );
                self.store.update_identity_type(identity_type).await?;
            }
        }
        Ok(())
    }
}

