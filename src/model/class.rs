//! Attribute classes: named permission sets over attribute names.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A named set of allowed and mandatory attribute names, optionally
/// inheriting from parent classes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributesClass {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub allowed: BTreeSet<String>,
    #[serde(default)]
    pub mandatory: BTreeSet<String>,
    #[serde(default)]
    pub allow_arbitrary: bool,
    #[serde(default)]
    pub parent_classes: BTreeSet<String>,
}

impl AttributesClass {
    /// Mandatory attributes are always allowed as well.
    pub fn new<A, M, P>(
        name: impl Into<String>,
        description: Option<String>,
        allowed: A,
        mandatory: M,
        parent_classes: P,
        allow_arbitrary: bool,
    ) -> Self
    where
        A: IntoIterator<Item = String>,
        M: IntoIterator<Item = String>,
        P: IntoIterator<Item = String>,
    {
        let mut class = Self {
            name: name.into(),
            description,
            allowed: allowed.into_iter().collect(),
            mandatory: mandatory.into_iter().collect(),
            allow_arbitrary,
            parent_classes: parent_classes.into_iter().collect(),
        };
        class.normalize();
        class
    }

    /// Shorthand for a class without description and parents.
    pub fn simple<A, M>(name: impl Into<String>, allowed: A, mandatory: M) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        M: IntoIterator,
        M::Item: Into<String>,
    {
        Self::new(
            name,
            None,
            allowed.into_iter().map(Into::into),
            mandatory.into_iter().map(Into::into),
            std::iter::empty(),
            false,
        )
    }

    pub fn with_parents<P>(mut self, parents: P) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
    {
        self.parent_classes = parents.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_allow_arbitrary(mut self, allow_arbitrary: bool) -> Self {
        self.allow_arbitrary = allow_arbitrary;
        self
    }

    /// Make `allowed` a superset of `mandatory`.
    pub fn normalize(&mut self) {
        let mandatory = self.mandatory.clone();
        self.allowed.extend(mandatory);
    }
}
