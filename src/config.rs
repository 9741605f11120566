//! Engine configuration and assembly.
//!
//! [`AttributeEngineBuilder`] wires the syntax registry, metadata providers,
//! the metadata cache, capacity limits and the expression engine into the
//! catalogs and the resolver, all sharing one store.

use crate::error::{AttributeError, AttributeResult, BuildError, BuildResult};
use crate::expression::{BuiltinExpressionEngine, ExpressionEvaluator};
use crate::limits::{CapacityLimitName, CapacityLimiter, ConfiguredLimiter, NoLimits};
use crate::model::{AttributeType, UNLIMITED_ELEMENTS};
use crate::resolver::AttributeResolver;
use crate::schema::{
    AttributeClassManagement, AttributeTypeCatalog, MetadataProvider, MetadataProviderRegistry,
    MetadataTypeCache,
};
use crate::storage::AttributeRepository;
use crate::syntax::{AttributeValueSyntax, SyntaxRegistry, string};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

/// Name of the system attribute holding an entity's attribute classes.
pub const DEFAULT_ATTRIBUTE_CLASSES_ATTRIBUTE: &str = "sys:AttributeClasses";

/// Engine settings, usually deserialized from the host's configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Lifetime of cached singleton-metadata lookups, in seconds.
    pub metadata_cache_ttl: u64,

    /// Maximum per capacity limit. Limits not listed are unbounded.
    pub capacity_limits: HashMap<CapacityLimitName, u64>,

    /// When set, only these syntaxes are available.
    pub enabled_syntaxes: Option<BTreeSet<String>>,

    pub attribute_classes_attribute: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            metadata_cache_ttl: 900,
            capacity_limits: HashMap::new(),
            enabled_syntaxes: None,
            attribute_classes_attribute: DEFAULT_ATTRIBUTE_CLASSES_ATTRIBUTE.to_string(),
        }
    }
}

impl EngineConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> BuildResult<()> {
        if self.metadata_cache_ttl == 0 {
            return Err(BuildError::InvalidConfiguration {
                message: "Metadata cache TTL must be positive".to_string(),
            });
        }
        if self.attribute_classes_attribute.trim().is_empty() {
            return Err(BuildError::InvalidConfiguration {
                message: "Attribute classes attribute name cannot be empty".to_string(),
            });
        }
        if let Some(enabled) = &self.enabled_syntaxes {
            if !enabled.contains(string::ID) {
                return Err(BuildError::InvalidConfiguration {
                    message: format!(
                        "The {} syntax is required by the attribute classes attribute",
                        string::ID
                    ),
                });
            }
        }
        Ok(())
    }

    pub fn metadata_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.metadata_cache_ttl)
    }
}

/// Builder for [`AttributeEngine`].
///
/// # Examples
///
/// ```rust
/// use attribute_engine::config::{AttributeEngineBuilder, EngineConfig};
/// use attribute_engine::limits::CapacityLimitName;
/// use attribute_engine::storage::InMemoryStore;
/// use std::sync::Arc;
///
/// let mut config = EngineConfig::default();
/// config.capacity_limits.insert(CapacityLimitName::AttributeValuesCount, 100);
///
/// let engine = AttributeEngineBuilder::new(Arc::new(InMemoryStore::new()))
///     .with_config(config)
///     .build()
///     .unwrap();
/// assert_eq!(engine.config().metadata_cache_ttl, 900);
/// ```
pub struct AttributeEngineBuilder<S, E = BuiltinExpressionEngine> {
    store: Arc<S>,
    config: EngineConfig,
    syntaxes: SyntaxRegistry,
    metadata_providers: Vec<Arc<dyn MetadataProvider>>,
    limiter: Option<Arc<dyn CapacityLimiter>>,
    engine: E,
}

impl<S: AttributeRepository> AttributeEngineBuilder<S> {
    /// Start with the default configuration, every built-in syntax and the
    /// built-in expression engine.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            config: EngineConfig::default(),
            syntaxes: SyntaxRegistry::with_defaults(),
            metadata_providers: Vec::new(),
            limiter: None,
            engine: BuiltinExpressionEngine::new(),
        }
    }
}

impl<S: AttributeRepository, E: ExpressionEvaluator> AttributeEngineBuilder<S, E> {
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Register an additional syntax, or replace a built-in one.
    pub fn with_syntax<F>(mut self, id: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&Value) -> crate::error::ValidationResult<Arc<dyn AttributeValueSyntax>>
            + Send
            + Sync
            + 'static,
    {
        self.syntaxes.register(id, factory);
        self
    }

    /// Add a metadata provider next to the built-in ones.
    pub fn with_metadata_provider(mut self, provider: Arc<dyn MetadataProvider>) -> Self {
        self.metadata_providers.push(provider);
        self
    }

    /// Use a custom limiter instead of the configured limits.
    pub fn with_capacity_limiter(mut self, limiter: Arc<dyn CapacityLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Replace the expression engine used for statements.
    pub fn with_expression_evaluator<E2: ExpressionEvaluator>(
        self,
        engine: E2,
    ) -> AttributeEngineBuilder<S, E2> {
        AttributeEngineBuilder {
            store: self.store,
            config: self.config,
            syntaxes: self.syntaxes,
            metadata_providers: self.metadata_providers,
            limiter: self.limiter,
            engine,
        }
    }

    /// Build the engine.
    ///
    /// # Errors
    ///
    /// Returns a `BuildError` if the configuration is invalid, names a
    /// syntax that is not registered, or two metadata providers share a name.
    pub fn build(self) -> BuildResult<AttributeEngine<S, E>> {
        self.config.validate()?;

        let mut syntaxes = self.syntaxes;
        if let Some(enabled) = &self.config.enabled_syntaxes {
            if let Some(unknown) = enabled.iter().find(|id| !syntaxes.contains(id)) {
                return Err(BuildError::UnknownEnabledSyntax {
                    syntax: unknown.clone(),
                });
            }
            syntaxes.retain(enabled);
        }

        let mut metadata = MetadataProviderRegistry::with_defaults();
        for provider in self.metadata_providers {
            metadata.register(provider)?;
        }

        let limiter = match self.limiter {
            Some(limiter) => limiter,
            None if self.config.capacity_limits.is_empty() => Arc::new(NoLimits),
            None => Arc::new(ConfiguredLimiter::new(self.config.capacity_limits.clone())),
        };

        let cache = MetadataTypeCache::new(self.config.metadata_cache_ttl());
        let catalog = AttributeTypeCatalog::new(
            Arc::clone(&self.store),
            Arc::new(syntaxes),
            Arc::new(metadata),
            Arc::new(cache),
        );
        let classes = AttributeClassManagement::new(
            Arc::clone(&self.store),
            self.config.attribute_classes_attribute.clone(),
        );
        let resolver = AttributeResolver::new(
            Arc::clone(&self.store),
            catalog.clone(),
            classes.clone(),
            Arc::new(self.engine),
            limiter,
        );

        log::debug!(
            "Attribute engine built with syntaxes {:?}",
            catalog.syntaxes().supported_syntaxes()
        );
        Ok(AttributeEngine {
            catalog,
            classes,
            resolver,
            config: self.config,
        })
    }
}

/// The assembled attribute engine.
pub struct AttributeEngine<S, E = BuiltinExpressionEngine> {
    pub catalog: AttributeTypeCatalog<S>,
    pub classes: AttributeClassManagement<S>,
    pub resolver: AttributeResolver<S, E>,
    config: EngineConfig,
}

impl<S: AttributeRepository, E: ExpressionEvaluator> AttributeEngine<S, E> {
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Install the system attribute type holding attribute class
    /// assignments, unless it is already defined.
    pub async fn initialize(&self) -> AttributeResult<()> {
        let name = self.classes.class_attribute();
        match self.catalog.get(name).await {
            Ok(_) => Ok(()),
            Err(AttributeError::UnknownAttributeType { .. }) => {
                let at = AttributeType::new(name, string::ID, 0, UNLIMITED_ELEMENTS)
                    .with_flags(
                        AttributeType::TYPE_IMMUTABLE_FLAG | AttributeType::INSTANCES_IMMUTABLE_FLAG,
                    )
                    .with_description("Attribute classes assigned to the entity in the group");
                self.catalog.create(at).await
            }
            Err(e) => Err(e),
        }
    }
}
