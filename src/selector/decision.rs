//! The selector's output.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::MemoryFootprint;
use crate::types::RetrievalMode;

/// Which retrieval mode to use for a query, and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeDecision {
    pub mode: RetrievalMode,
    /// In [0, 1].
    pub confidence: f64,
    pub structural_score: f64,
    pub semantic_score: f64,
    /// One entry per rule or signal that shaped the decision, in order.
    pub reasoning: Vec<String>,
    pub hybrid_recommended: bool,
    pub cache_hit: bool,
    pub decided_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl ModeDecision {
    pub fn new(mode: RetrievalMode, confidence: f64) -> Self {
        Self {
            mode,
            confidence: confidence.clamp(0.0, 1.0),
            structural_score: 0.0,
            semantic_score: 0.0,
            reasoning: Vec::new(),
            hybrid_recommended: mode.is_hybrid(),
            cache_hit: false,
            decided_at: Utc::now(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_scores(mut self, structural: f64, semantic: f64) -> Self {
        self.structural_score = structural;
        self.semantic_score = semantic;
        self.hybrid_recommended = self.mode.is_hybrid() || structural.min(semantic) > 0.5;
        self
    }

    /// Copy served from the decision cache.
    pub fn as_cache_hit(&self) -> Self {
        let mut hit = self.clone();
        hit.cache_hit = true;
        hit.decided_at = Utc::now();
        hit
    }
}

impl MemoryFootprint for ModeDecision {
    fn memory_estimate(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.reasoning.iter().map(|r| r.len()).sum::<usize>()
            + self
                .metadata
                .iter()
                .map(|(k, v)| k.len() + v.len())
                .sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_is_clamped() {
        assert_eq!(ModeDecision::new(RetrievalMode::StructuralOnly, 1.7).confidence, 1.0);
        assert_eq!(ModeDecision::new(RetrievalMode::StructuralOnly, -0.2).confidence, 0.0);
    }

    #[test]
    fn hybrid_recommended_when_both_scores_are_strong() {
        let d = ModeDecision::new(RetrievalMode::StructuralOnly, 0.9).with_scores(0.8, 0.6);
        assert!(d.hybrid_recommended);
        let d = ModeDecision::new(RetrievalMode::StructuralOnly, 0.9).with_scores(0.8, 0.2);
        assert!(!d.hybrid_recommended);
        let d = ModeDecision::new(RetrievalMode::HybridSemanticFirst, 0.5).with_scores(0.1, 0.2);
        assert!(d.hybrid_recommended);
    }

    #[test]
    fn cache_hit_copy_keeps_scores() {
        let mut d = ModeDecision::new(RetrievalMode::SemanticOnly, 0.8).with_scores(0.1, 0.7);
        d.reasoning.push("documentation file".into());
        let hit = d.as_cache_hit();
        assert!(hit.cache_hit);
        assert!(!d.cache_hit);
        assert_eq!(hit.reasoning, d.reasoning);
        assert!(hit.decided_at >= d.decided_at);
    }
}
