//! Data model shared by the catalogs, the statement evaluator and the resolver.
//!
//! # Key Types
//!
//! - [`AttributeType`] - schema of a named attribute
//! - [`Attribute`] / [`AttributeExt`] - attribute instances, the latter with provenance
//! - [`AttributesClass`] - allowed and mandatory attribute names
//! - [`Group`] / [`GroupPath`] - the group tree
//! - [`AttributeStatement`] - conditional attribute assignment rules
//!
//! # Examples
//!
//! ```rust
//! use attribute_engine::model::{Attribute, GroupPath};
//!
//! let group = GroupPath::new("/staff/it").unwrap();
//! let attribute = Attribute::new("cn", "string", group.clone(), ["Alice"]);
//! assert!(GroupPath::root().is_ancestor_of(&attribute.group_path));
//! ```

pub mod attribute;
pub mod class;
pub mod group;
pub mod identity;
pub mod statement;

pub use attribute::{Attribute, AttributeExt, AttributeType, UNLIMITED_ELEMENTS};
pub use class::AttributesClass;
pub use group::{Group, GroupPath, GroupView};
pub use identity::{EntityId, Identity, IdentityType};
pub use statement::{AttributeStatement, ConflictResolution, Direction, StatementAssignment};
