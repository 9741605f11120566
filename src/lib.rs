//! Attribute resolution and policy enforcement for identity management.
//!
//! Entities carry attributes inside groups of a hierarchy. Attribute types
//! define what values are legal, attribute classes restrict which attributes
//! an entity may hold in a group, and group attribute statements derive
//! additional attributes from existing ones.
//!
//! # Core Components
//!
//! - [`AttributeEngine`] - The assembled engine, built with [`AttributeEngineBuilder`]
//! - [`AttributeTypeCatalog`] - Attribute type definitions
//! - [`AttributeClassManagement`] - Attribute classes and their assignment
//! - [`AttributeResolver`] - Direct and effective attributes of entities
//! - [`EffectiveAttributesEvaluator`] - Group statement evaluation
//! - [`SyntaxRegistry`] - Value syntaxes
//!
//! # Quick Start
//!
//! ```rust
//! use attribute_engine::AttributeEngineBuilder;
//! use attribute_engine::model::{Attribute, AttributeType, GroupPath, Identity};
//! use attribute_engine::storage::InMemoryStore;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(InMemoryStore::new());
//! store.add_identity(Identity::new("userName", "alice", 1)).await?;
//!
//! let engine = AttributeEngineBuilder::new(Arc::clone(&store)).build()?;
//! engine.initialize().await?;
//! engine.catalog.create(AttributeType::new("cn", "string", 1, 1)).await?;
//!
//! let cn = Attribute::new("cn", "string", GroupPath::root(), ["Alice"]);
//! engine.resolver.add_attribute(1, cn, false, true).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod expression;
pub mod limits;
pub mod model;
pub mod resolver;
pub mod schema;
pub mod statements;
pub mod storage;
pub mod syntax;

pub use config::{AttributeEngine, AttributeEngineBuilder, EngineConfig};
pub use error::{AttributeError, AttributeResult, BuildError, ValidationError};
pub use expression::{BuiltinExpressionEngine, ExpressionEvaluator};
pub use limits::{CapacityLimitName, CapacityLimiter};
pub use model::{Attribute, AttributeExt, AttributeStatement, AttributeType, AttributesClass, GroupPath};
pub use resolver::AttributeResolver;
pub use schema::{AttributeClassManagement, AttributeTypeCatalog};
pub use statements::EffectiveAttributesEvaluator;
pub use syntax::{AttributeValueSyntax, SyntaxRegistry};
