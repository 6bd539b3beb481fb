//! Bounded, TTL-expiring caches.
//!
//! [`TtlCache`] is the shared engine behind the structural-result cache and
//! the mode-decision cache. One `RwLock` guards the map; recency and access
//! counts are atomics so hits only need the read lock. Expired entries are
//! invisible to readers and removed either on lookup or by the sweeper.

pub mod decision;
pub mod structural;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::background::BackgroundTask;
use crate::error::Result;

pub use decision::DecisionCache;
pub use structural::StructuralCache;

// ---------------------------------------------------------------------------
// Entry and policy
// ---------------------------------------------------------------------------

/// Rough heap size of a cached value, used for the memory estimate.
pub trait MemoryFootprint {
    fn memory_estimate(&self) -> usize;
}

impl<T: MemoryFootprint> MemoryFootprint for Arc<T> {
    fn memory_estimate(&self) -> usize {
        self.as_ref().memory_estimate()
    }
}

/// Which entry `set` drops when the cache is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPolicy {
    /// Smallest last-access sequence.
    LeastRecentlyUsed,
    /// Smallest creation sequence.
    OldestCreated,
}

pub struct CacheEntry<V> {
    value: V,
    created: Instant,
    created_at: DateTime<Utc>,
    created_seq: u64,
    last_access: AtomicU64,
    access_count: AtomicU64,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        now.duration_since(self.created) >= ttl
    }

    fn access_count(&self) -> u64 {
        self.access_count.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Copy-out statistics for one cache.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub name: &'static str,
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub hit_rate: f64,
    pub miss_rate: f64,
    pub memory_estimate: usize,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// TtlCache
// ---------------------------------------------------------------------------

struct CacheInner<V> {
    name: &'static str,
    capacity: usize,
    ttl: Duration,
    policy: EvictionPolicy,
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    clock: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl<V> CacheInner<V> {
    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(self.ttl, now));
        let removed = before - entries.len();
        self.expirations.fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }
}

pub struct TtlCache<V> {
    inner: Arc<CacheInner<V>>,
    sweeper: Mutex<Option<BackgroundTask>>,
}

impl<V> TtlCache<V>
where
    V: Clone + MemoryFootprint + Send + Sync + 'static,
{
    /// A zero capacity is treated as one.
    pub fn new(name: &'static str, capacity: usize, ttl: Duration, policy: EvictionPolicy) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                name,
                capacity: capacity.max(1),
                ttl,
                policy,
                entries: RwLock::new(HashMap::new()),
                clock: AtomicU64::new(0),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                evictions: AtomicU64::new(0),
                expirations: AtomicU64::new(0),
            }),
            sweeper: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Return a clone of the live value for `key`. Expired entries count as
    /// a miss and are removed.
    pub fn get(&self, key: &str) -> Option<V> {
        let inner = &self.inner;
        let now = Instant::now();
        {
            let entries = inner.entries.read().unwrap_or_else(|e| e.into_inner());
            match entries.get(key) {
                Some(entry) if !entry.is_expired(inner.ttl, now) => {
                    entry.last_access.store(inner.tick(), Ordering::Relaxed);
                    entry.access_count.fetch_add(1, Ordering::Relaxed);
                    inner.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(entry.value.clone());
                }
                Some(_) => {}
                None => {
                    inner.misses.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
            }
        }

        // Expired: re-check under the write lock, another reader may have
        // removed or a writer replaced it.
        let mut entries = inner.entries.write().unwrap_or_else(|e| e.into_inner());
        if entries
            .get(key)
            .is_some_and(|entry| entry.is_expired(inner.ttl, Instant::now()))
        {
            entries.remove(key);
            inner.expirations.fetch_add(1, Ordering::Relaxed);
        }
        inner.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Insert or replace. Replacing an existing key never evicts; inserting a
    /// new key into a full cache drops expired entries first and otherwise
    /// evicts exactly one entry according to the policy.
    pub fn set(&self, key: impl Into<String>, value: V) {
        let inner = &self.inner;
        let key = key.into();
        let seq = inner.tick();
        let now = Instant::now();
        let mut entries = inner.entries.write().unwrap_or_else(|e| e.into_inner());

        if !entries.contains_key(&key) && entries.len() >= inner.capacity {
            let before = entries.len();
            entries.retain(|_, entry| !entry.is_expired(inner.ttl, now));
            let expired = before - entries.len();
            inner.expirations.fetch_add(expired as u64, Ordering::Relaxed);

            if entries.len() >= inner.capacity {
                let victim = match inner.policy {
                    EvictionPolicy::LeastRecentlyUsed => entries
                        .iter()
                        .min_by_key(|(_, e)| e.last_access.load(Ordering::Relaxed))
                        .map(|(k, _)| k.clone()),
                    EvictionPolicy::OldestCreated => entries
                        .iter()
                        .min_by_key(|(_, e)| e.created_seq)
                        .map(|(k, _)| k.clone()),
                };
                if let Some(victim) = victim {
                    entries.remove(&victim);
                    inner.evictions.fetch_add(1, Ordering::Relaxed);
                    tracing::trace!(cache = inner.name, key = %victim, "Evicted cache entry");
                }
            }
        }

        entries.insert(
            key,
            CacheEntry {
                value,
                created: now,
                created_at: Utc::now(),
                created_seq: seq,
                last_access: AtomicU64::new(seq),
                access_count: AtomicU64::new(0),
            },
        );
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        let mut entries = self.inner.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.remove(key).map(|entry| entry.value)
    }

    /// Whether `key` is present and live. Does not touch recency or counters.
    pub fn contains(&self, key: &str) -> bool {
        let entries = self.inner.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired(self.inner.ttl, Instant::now()))
    }

    /// Successful reads of the live entry for `key` since it was stored.
    pub fn access_count(&self, key: &str) -> Option<u64> {
        let entries = self.inner.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .get(key)
            .filter(|entry| !entry.is_expired(self.inner.ttl, Instant::now()))
            .map(CacheEntry::access_count)
    }

    pub fn clear(&self) {
        let mut entries = self.inner.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.clear();
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        let entries = self.inner.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every expired entry now. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.inner.purge_expired()
    }

    pub fn stats(&self) -> CacheStats {
        let inner = &self.inner;
        let entries = inner.entries.read().unwrap_or_else(|e| e.into_inner());
        let hits = inner.hits.load(Ordering::Relaxed);
        let misses = inner.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        let (hit_rate, miss_rate) = if lookups == 0 {
            (0.0, 0.0)
        } else {
            (hits as f64 / lookups as f64, misses as f64 / lookups as f64)
        };
        let key_bytes: usize = entries.keys().map(|k| k.len()).sum();
        let value_bytes: usize = entries.values().map(|e| e.value.memory_estimate()).sum();

        CacheStats {
            name: inner.name,
            entries: entries.len(),
            capacity: inner.capacity,
            hits,
            misses,
            evictions: inner.evictions.load(Ordering::Relaxed),
            expirations: inner.expirations.load(Ordering::Relaxed),
            hit_rate,
            miss_rate,
            memory_estimate: key_bytes + value_bytes,
            oldest: entries.values().map(|e| e.created_at).min(),
            newest: entries.values().map(|e| e.created_at).max(),
        }
    }

    /// Start the background sweeper, which purges expired entries every
    /// TTL/2. Starting twice keeps the first sweeper.
    pub fn start_sweeper(&self, parent: &CancellationToken) -> Result<()> {
        let mut slot = self.sweeper.lock().unwrap_or_else(|e| e.into_inner());
        if slot.as_ref().is_some_and(|task| task.is_running()) {
            return Ok(());
        }
        let period = (self.inner.ttl / 2).max(Duration::from_millis(1));
        let weak: Weak<CacheInner<V>> = Arc::downgrade(&self.inner);
        let task = BackgroundTask::spawn_periodic("cache-sweeper", parent, period, move || {
            if let Some(inner) = weak.upgrade() {
                let removed = inner.purge_expired();
                if removed > 0 {
                    tracing::debug!(cache = inner.name, removed, "Swept expired cache entries");
                }
            }
        })?;
        *slot = Some(task);
        Ok(())
    }

    pub fn sweeper_running(&self) -> bool {
        let slot = self.sweeper.lock().unwrap_or_else(|e| e.into_inner());
        slot.as_ref().is_some_and(|task| task.is_running())
    }

    /// Stop the sweeper if one is running. Idempotent.
    pub async fn stop_sweeper(&self) {
        let task = {
            let mut slot = self.sweeper.lock().unwrap_or_else(|e| e.into_inner());
            slot.take()
        };
        if let Some(task) = task {
            task.stop().await;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    struct Blob(usize);

    impl MemoryFootprint for Blob {
        fn memory_estimate(&self) -> usize {
            self.0
        }
    }

    fn lru(capacity: usize) -> TtlCache<Blob> {
        TtlCache::new("test", capacity, Duration::from_secs(60), EvictionPolicy::LeastRecentlyUsed)
    }

    #[test]
    fn set_then_get_within_ttl() {
        let cache = lru(4);
        cache.set("a", Blob(1));
        assert_eq!(cache.get("a"), Some(Blob(1)));
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.entries, 1);
    }

    #[test]
    fn access_count_tracks_reads_and_resets_on_replace() {
        let cache = lru(4);
        cache.set("a", Blob(1));
        assert_eq!(cache.access_count("a"), Some(0));
        cache.get("a");
        cache.get("a");
        assert_eq!(cache.access_count("a"), Some(2));
        cache.set("a", Blob(2));
        assert_eq!(cache.access_count("a"), Some(0));
        assert_eq!(cache.access_count("missing"), None);
    }

    #[test]
    fn missing_key_counts_a_miss() {
        let cache = lru(4);
        assert_eq!(cache.get("nope"), None);
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.miss_rate, 1.0);
    }

    #[test]
    fn expired_entry_is_a_miss_and_removed() {
        let cache = TtlCache::new("short", 4, Duration::from_millis(20), EvictionPolicy::LeastRecentlyUsed);
        cache.set("a", Blob(1));
        std::thread::sleep(Duration::from_millis(40));
        assert!(!cache.contains("a"));
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.len(), 0);
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.expirations, 1);
    }

    #[test]
    fn lru_evicts_least_recently_read() {
        let cache = lru(2);
        cache.set("a", Blob(1));
        cache.set("b", Blob(1));
        assert!(cache.get("a").is_some());
        cache.set("c", Blob(1));
        assert!(cache.contains("a"));
        assert!(!cache.contains("b"));
        assert!(cache.contains("c"));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn oldest_created_ignores_reads() {
        let cache = TtlCache::new("fifo", 2, Duration::from_secs(60), EvictionPolicy::OldestCreated);
        cache.set("a", Blob(1));
        cache.set("b", Blob(1));
        assert!(cache.get("a").is_some());
        cache.set("c", Blob(1));
        assert!(!cache.contains("a"));
        assert!(cache.contains("b"));
    }

    #[test]
    fn replacing_a_key_never_evicts() {
        let cache = lru(2);
        cache.set("a", Blob(1));
        cache.set("b", Blob(1));
        cache.set("a", Blob(2));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().evictions, 0);
        assert_eq!(cache.get("a"), Some(Blob(2)));
    }

    #[test]
    fn full_cache_prefers_dropping_expired_entries() {
        let cache = TtlCache::new("mixed", 2, Duration::from_millis(20), EvictionPolicy::LeastRecentlyUsed);
        cache.set("old", Blob(1));
        std::thread::sleep(Duration::from_millis(40));
        cache.set("fresh", Blob(1));
        cache.set("newer", Blob(1));
        let stats = cache.stats();
        assert_eq!(stats.evictions, 0);
        assert_eq!(stats.expirations, 1);
        assert_eq!(stats.entries, 2);
    }

    #[test]
    fn stats_memory_and_timestamps() {
        let cache = lru(4);
        assert!(cache.stats().oldest.is_none());
        cache.set("k1", Blob(100));
        cache.set("k2", Blob(50));
        let stats = cache.stats();
        assert_eq!(stats.memory_estimate, 150 + 4);
        assert!(stats.oldest.unwrap() <= stats.newest.unwrap());
    }

    #[test]
    fn clear_and_remove() {
        let cache = lru(4);
        cache.set("a", Blob(1));
        cache.set("b", Blob(2));
        assert_eq!(cache.remove("a"), Some(Blob(1)));
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn sweeper_removes_expired_entries() {
        let cache = TtlCache::new("swept", 4, Duration::from_millis(20), EvictionPolicy::OldestCreated);
        let token = CancellationToken::new();
        cache.start_sweeper(&token).unwrap();
        assert!(cache.sweeper_running());
        cache.set("a", Blob(1));
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(cache.len(), 0);
        cache.stop_sweeper().await;
        cache.stop_sweeper().await;
        assert!(!cache.sweeper_running());
    }

    #[test]
    fn concurrent_readers_and_writers_keep_counters_consistent() {
        let cache = Arc::new(lru(64));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..200 {
                        let key = format!("k{}", (t * 7 + i) % 32);
                        if cache.get(&key).is_none() {
                            cache.set(key, Blob(i));
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let stats = cache.stats();
        assert_eq!(stats.hits + stats.misses, 8 * 200);
        assert!(stats.entries <= 64);
    }
}
