//! Time-bounded cache of the attribute type carrying a singleton metadata.

use crate::model::AttributeType;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Default lifetime of cache entries.
pub const DEFAULT_METADATA_CACHE_TTL: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone)]
struct CacheEntry {
    loaded: Instant,
    attribute_type: Option<AttributeType>,
}

/// Caches lookups by singleton metadata id. Absent types are cached too.
///
/// Every attribute type mutation must call [`MetadataTypeCache::invalidate`].
#[derive(Debug)]
pub struct MetadataTypeCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MetadataTypeCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached lookup result, `None` when missing or expired.
    pub async fn get(&self, metadata_id: &str) -> Option<Option<AttributeType>> {
        let entries = self.entries.read().await;
        entries
            .get(metadata_id)
            .filter(|entry| entry.loaded.elapsed() < self.ttl)
            .map(|entry| entry.attribute_type.clone())
    }

    pub async fn put(&self, metadata_id: &str, attribute_type: Option<AttributeType>) {
        let mut entries = self.entries.write().await;
        entries.insert(
            metadata_id.to_string(),
            CacheEntry {
                loaded: Instant::now(),
                attribute_type,
            },
        );
    }

    pub async fn invalidate(&self) {
        let mut entries = self.entries.write().await;
        if !entries.is_empty() {
            log::debug!("Invalidating {} cached metadata lookups", entries.len());
        }
        entries.clear();
    }
}

impl Default for MetadataTypeCache {
    fn default() -> Self {
        Self::new(DEFAULT_METADATA_CACHE_TTL)
    }
}
