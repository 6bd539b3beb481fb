//! Mode-decision cache: oldest-first eviction, short TTL, keyed by a hashed
//! query signature.

use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;

use super::{CacheStats, EvictionPolicy, TtlCache};
use crate::config::DecisionCacheConfig;
use crate::error::Result;
use crate::selector::decision::ModeDecision;
use crate::types::Query;

pub struct DecisionCache {
    inner: TtlCache<ModeDecision>,
    signature_chars: usize,
}

impl DecisionCache {
    pub fn new(capacity: usize, ttl: Duration, signature_chars: usize) -> Self {
        Self {
            inner: TtlCache::new("decision", capacity, ttl, EvictionPolicy::OldestCreated),
            signature_chars,
        }
    }

    pub fn from_config(config: &DecisionCacheConfig, signature_chars: usize) -> Self {
        Self::new(config.capacity, config.ttl(), signature_chars)
    }

    /// Hex SHA-256 over query type, file path, normalized text and line.
    pub fn signature(&self, query: &Query) -> String {
        query_signature(query, self.signature_chars)
    }

    pub fn get(&self, signature: &str) -> Option<ModeDecision> {
        self.inner.get(signature)
    }

    pub fn set(&self, signature: impl Into<String>, decision: ModeDecision) {
        self.inner.set(signature, decision);
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

/// Lowercase, collapse whitespace, and truncate to `max_chars` characters.
pub fn normalize_query_text(text: &str, max_chars: usize) -> String {
    let collapsed = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    collapsed.chars().take(max_chars).collect()
}

pub fn query_signature(query: &Query, max_chars: usize) -> String {
    let raw = format!(
        "{}|{}|{}|{}",
        query.query_type.as_str(),
        query.file_path.as_deref().unwrap_or(""),
        normalize_query_text(&query.text, max_chars),
        query.line.map(|l| l.to_string()).unwrap_or_default(),
    );
    hex::encode(Sha256::digest(raw.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{QueryType, RetrievalMode};

    #[test]
    fn signature_ignores_case_and_spacing() {
        let a = Query::new("Find   NewManager").with_file("svc.go");
        let b = Query::new("find newmanager ").with_file("svc.go");
        assert_eq!(query_signature(&a, 64), query_signature(&b, 64));
        assert_eq!(query_signature(&a, 64).len(), 64);
    }

    #[test]
    fn signature_distinguishes_type_file_and_line() {
        let base = Query::new("x").with_file("a.go");
        let sig = query_signature(&base, 64);
        assert_ne!(sig, query_signature(&base.clone().with_type(QueryType::Documentation), 64));
        assert_ne!(sig, query_signature(&base.clone().at_line(3), 64));
        assert_ne!(sig, query_signature(&Query::new("x").with_file("b.go"), 64));
    }

    #[test]
    fn long_text_truncates_on_char_boundary() {
        let text = "é".repeat(100);
        let normalized = normalize_query_text(&text, 64);
        assert_eq!(normalized.chars().count(), 64);
        let a = Query::new(format!("{}tail one", "a".repeat(64)));
        let b = Query::new(format!("{}tail two", "a".repeat(64)));
        assert_eq!(query_signature(&a, 64), query_signature(&b, 64));
    }

    #[test]
    fn evicts_oldest_decision() {
        let cache = DecisionCache::new(2, Duration::from_secs(60), 64);
        let d = ModeDecision::new(RetrievalMode::SemanticOnly, 0.5);
        cache.set("one", d.clone());
        cache.set("two", d.clone());
        assert!(cache.get("one").is_some());
        cache.set("three", d);
        assert!(cache.get("one").is_none());
        assert!(cache.get("two").is_some());
        assert_eq!(cache.stats().evictions, 1);
        assert_eq!(cache.stats().name, "decision");
    }
}
