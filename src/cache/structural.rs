//! Per-file structural result cache: LRU eviction, long TTL.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::{CacheStats, EvictionPolicy, TtlCache};
use crate::analysis::model::StructuralResult;
use crate::config::StructuralCacheConfig;
use crate::error::Result;

/// Structural results keyed by file path.
pub struct StructuralCache {
    inner: TtlCache<Arc<StructuralResult>>,
}

impl StructuralCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: TtlCache::new("structural", capacity, ttl, EvictionPolicy::LeastRecentlyUsed),
        }
    }

    pub fn from_config(config: &StructuralCacheConfig) -> Self {
        Self::new(config.capacity, config.ttl())
    }

    pub fn get(&self, path: &str) -> Option<Arc<StructuralResult>> {
        self.inner.get(path)
    }

    pub fn set(&self, path: impl Into<String>, result: Arc<StructuralResult>) {
        self.inner.set(path, result);
    }

    pub fn invalidate(&self, path: &str) -> bool {
        self.inner.remove(path).is_some()
    }

    pub fn clear(&self) {
        self.inner.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.stats()
    }

    pub fn start_sweeper(&self, parent: &CancellationToken) -> Result<()> {
        self.inner.start_sweeper(parent)
    }

    pub async fn stop_sweeper(&self) {
        self.inner.stop_sweeper().await;
    }
}
