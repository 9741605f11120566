//! Capacity limits enforced when attributes are written.

use crate::error::{AttributeError, AttributeResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Limits checked by the attribute resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CapacityLimitName {
    /// Number of stored attributes, checked when a new attribute is created
    AttributesCount,
    /// Number of values of one attribute
    AttributeValuesCount,
    /// Length in bytes of the largest value of one attribute
    AttributeValueSize,
}

impl fmt::Display for CapacityLimitName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AttributesCount => "attributesCount",
            Self::AttributeValuesCount => "attributeValuesCount",
            Self::AttributeValueSize => "attributeValueSize",
        };
        f.write_str(name)
    }
}

/// Source of capacity limits.
pub trait CapacityLimiter: Send + Sync + fmt::Debug {
    /// Configured maximum, `None` when unlimited.
    fn limit(&self, name: CapacityLimitName) -> Option<u64>;

    /// Fail with `CapacityLimit` when `current` exceeds the limit.
    fn assert_within_limit(&self, name: CapacityLimitName, current: u64) -> AttributeResult<()> {
        match self.limit(name) {
            Some(max) if current > max => Err(AttributeError::CapacityLimit {
                limit: name.to_string(),
                current,
                max,
            }),
            _ => Ok(()),
        }
    }
}

/// Limiter without any limit.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLimits;

impl CapacityLimiter for NoLimits {
    fn limit(&self, _name: CapacityLimitName) -> Option<u64> {
        None
    }
}

/// Limiter backed by a fixed table, usually taken from the engine config.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredLimiter {
    limits: HashMap<CapacityLimitName, u64>,
}

impl ConfiguredLimiter {
    pub fn new(limits: HashMap<CapacityLimitName, u64>) -> Self {
        Self { limits }
    }

    pub fn with_limit(mut self, name: CapacityLimitName, max: u64) -> Self {
        self.limits.insert(name, max);
        self
    }
}

impl CapacityLimiter for ConfiguredLimiter {
    fn limit(&self, name: CapacityLimitName) -> Option<u64> {
        self.limits.get(&name).copied()
    }
}
