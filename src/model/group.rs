//! Group paths, groups and the expression-facing group projection.

use super::statement::AttributeStatement;
use crate::error::{ValidationError, ValidationResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// A validated, segment-based group path such as `/`, `/A` or `/A/B`.
///
/// Ancestry is decided on whole segments, so `/a` is an ancestor of `/a/b`
/// but not of `/ab`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GroupPath(String);

impl GroupPath {
    /// The root group `/`.
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Parse and normalise a group path. A single trailing slash is dropped.
    pub fn new(path: impl AsRef<str>) -> ValidationResult<Self> {
        let path = path.as_ref().trim();
        if path == "/" {
            return Ok(Self::root());
        }
        if !path.starts_with('/') {
            return Err(ValidationError::custom(format!(
                "Group path '{}' must start with '/'",
                path
            )));
        }
        let trimmed = path.strip_suffix('/').unwrap_or(path);
        if trimmed[1..].split('/').any(|segment| segment.trim().is_empty()) {
            return Err(ValidationError::custom(format!(
                "Group path '{}' contains an empty segment",
                path
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Path segments, empty for the root group.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|segment| !segment.is_empty())
    }

    /// Last path segment, or `/` for the root group.
    pub fn name(&self) -> &str {
        self.segments().last().unwrap_or("/")
    }

    /// The enclosing group, `None` for the root group.
    pub fn parent(&self) -> Option<GroupPath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) | None => Some(Self::root()),
            Some(idx) => Some(Self(self.0[..idx].to_string())),
        }
    }

    /// Path of a direct child group.
    pub fn child(&self, segment: &str) -> ValidationResult<GroupPath> {
        if self.is_root() {
            Self::new(format!("/{}", segment))
        } else {
            Self::new(format!("{}/{}", self.0, segment))
        }
    }

    /// Strict ancestry: a group is never its own ancestor.
    pub fn is_ancestor_of(&self, other: &GroupPath) -> bool {
        if self == other {
            return false;
        }
        if self.is_root() {
            return true;
        }
        other
            .0
            .strip_prefix(self.0.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
    }

    pub fn is_descendant_of(&self, other: &GroupPath) -> bool {
        other.is_ancestor_of(self)
    }

    pub fn is_ancestor_or_self(&self, other: &GroupPath) -> bool {
        self == other || self.is_ancestor_of(other)
    }
}

impl Default for GroupPath {
    fn default() -> Self {
        Self::root()
    }
}

impl fmt::Display for GroupPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for GroupPath {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for GroupPath {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for GroupPath {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<GroupPath> for String {
    fn from(path: GroupPath) -> Self {
        path.0
    }
}

impl AsRef<str> for GroupPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A group of the directory tree with its attribute statements and the
/// attribute classes assigned to the group itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub path: GroupPath,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub displayed_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub attribute_statements: Vec<AttributeStatement>,
    #[serde(default)]
    pub attributes_classes: BTreeSet<String>,
}

impl Group {
    pub fn new(path: GroupPath) -> Self {
        Self {
            path,
            displayed_name: None,
            description: None,
            attribute_statements: Vec::new(),
            attributes_classes: BTreeSet::new(),
        }
    }

    pub fn with_displayed_name(mut self, displayed_name: impl Into<String>) -> Self {
        self.displayed_name = Some(displayed_name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_statement(mut self, statement: AttributeStatement) -> Self {
        self.attribute_statements.push(statement);
        self
    }

    pub fn with_attributes_classes<I, S>(mut self, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes_classes = classes.into_iter().map(Into::into).collect();
        self
    }

    /// Project the group for use inside statement expressions.
    pub fn view(&self) -> GroupView {
        GroupView {
            path: self.path.to_string(),
            name: self.path.name().to_string(),
            displayed_name: self
                .displayed_name
                .clone()
                .unwrap_or_else(|| self.path.name().to_string()),
            description: self.description.clone(),
            parent_path: self.path.parent().map(|p| p.to_string()),
        }
    }
}

/// Group data as seen by statement expressions under `groupsObj`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupView {
    pub path: String,
    pub name: String,
    pub displayed_name: String,
    pub description: Option<String>,
    pub parent_path: Option<String>,
}
