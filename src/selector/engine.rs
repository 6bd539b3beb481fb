//! The mode selection rule.
//!
//! Order of evaluation:
//!
//! 1. cached decision for the query signature, if caching is enabled
//! 2. a configured forced mode (an unknown name falls through to 5)
//! 3. structural-only when structural fit clears the threshold and beats semantic
//! 4. semantic-only when semantic fit beats structural and clears the floor
//! 5. hybrid when the scores are within the margin and one exceeds 0.5
//! 6. fallback: semantic-only if enabled, otherwise structural-only

use std::sync::Arc;

use super::decision::ModeDecision;
use super::features::QueryFeatures;
use super::scoring::{semantic_fit, structural_fit, unit};
use crate::cache::{CacheStats, DecisionCache};
use crate::config::{HybridConfig, SelectorConfig, WeightsConfig};
use crate::metrics::MetricsCollector;
use crate::types::{Query, RetrievalMode};

/// Minimum score one side must exceed for a hybrid decision.
const HYBRID_MIN_SCORE: f64 = 0.5;
const FALLBACK_CONFIDENCE: f64 = 0.3;

const DECISION_CACHE: &str = "decision";

pub struct ModeSelector {
    config: SelectorConfig,
    weights: WeightsConfig,
    cache: Arc<DecisionCache>,
    metrics: Arc<MetricsCollector>,
}

impl ModeSelector {
    pub fn new(
        config: &HybridConfig,
        cache: Arc<DecisionCache>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            config: config.selector.clone(),
            weights: config.weights.clone(),
            cache,
            metrics,
        }
    }

    /// Selector with its own decision cache.
    pub fn from_config(config: &HybridConfig, metrics: Arc<MetricsCollector>) -> Self {
        let cache = Arc::new(DecisionCache::from_config(
            &config.decision_cache,
            config.selector.signature_chars,
        ));
        Self::new(config, cache, metrics)
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<DecisionCache> {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Decide how to answer `query`, consulting and filling the decision
    /// cache. Never fails: configuration problems resolve to the fallback.
    pub fn select_mode(&self, query: &Query) -> ModeDecision {
        let caching = self.config.caching_enabled;
        let signature = caching.then(|| self.cache.signature(query));

        if let Some(sig) = &signature {
            if let Some(cached) = self.cache.get(sig) {
                self.metrics.record_cache_hit(DECISION_CACHE, true);
                let hit = cached.as_cache_hit();
                self.metrics
                    .record_mode_selection(hit.mode, None, hit.confidence);
                tracing::debug!(mode = %hit.mode, "Mode decision served from cache");
                return hit;
            }
            self.metrics.record_cache_hit(DECISION_CACHE, false);
        }

        let decision = self.evaluate(query);
        if let Some(sig) = signature {
            self.cache.set(sig, decision.clone());
        }
        self.metrics
            .record_mode_selection(decision.mode, None, decision.confidence);
        tracing::debug!(
            mode = %decision.mode,
            confidence = decision.confidence,
            structural = decision.structural_score,
            semantic = decision.semantic_score,
            "Mode selected"
        );
        decision
    }

    /// Score `query` and apply the decision rule, bypassing cache and metrics.
    pub fn evaluate(&self, query: &Query) -> ModeDecision {
        let features = QueryFeatures::extract(query, &self.config);
        let structural = structural_fit(&features, &self.weights.structural);
        let semantic = semantic_fit(&features, &self.weights.semantic);
        let (s, sem) = (structural.score, semantic.score);

        let mut reasons: Vec<String> = structural
            .reasons
            .iter()
            .map(|r| format!("structural: {r}"))
            .chain(semantic.reasons.iter().map(|r| format!("semantic: {r}")))
            .collect();

        let (mode, confidence) = match self.config.force_mode.as_deref() {
            Some(name) => match RetrievalMode::from_str_loose(name) {
                Some(mode) => {
                    reasons.push(format!("mode {mode} forced by configuration"));
                    (mode, 1.0)
                }
                None => {
                    tracing::warn!(force_mode = name, "Unknown forced mode, using fallback");
                    reasons.push(format!("configuration error: unknown forced mode {name:?}"));
                    self.fallback(&mut reasons)
                }
            },
            None => self.apply_rules(s, sem, &mut reasons),
        };

        let mut decision = ModeDecision::new(mode, confidence).with_scores(s, sem);
        decision.reasoning = reasons;
        decision
            .metadata
            .insert("query_type".into(), query.query_type.as_str().into());
        if let Some(ext) = &features.extension {
            decision.metadata.insert("extension".into(), ext.clone());
        }
        decision
    }

    fn apply_rules(&self, s: f64, sem: f64, reasons: &mut Vec<String>) -> (RetrievalMode, f64) {
        let cfg = &self.config;
        if s >= cfg.structural_threshold && s > sem {
            reasons.push(format!(
                "structural fit {s:.2} >= threshold {:.2} and exceeds semantic fit {sem:.2}",
                cfg.structural_threshold
            ));
            return (RetrievalMode::StructuralOnly, single_confidence(s, sem));
        }
        if sem > s && sem >= cfg.semantic_quality_floor {
            reasons.push(format!(
                "semantic fit {sem:.2} >= floor {:.2} and exceeds structural fit {s:.2}",
                cfg.semantic_quality_floor
            ));
            return (RetrievalMode::SemanticOnly, single_confidence(sem, s));
        }
        if (s - sem).abs() <= cfg.hybrid_margin && s.max(sem) > HYBRID_MIN_SCORE {
            let mode = if s >= sem {
                RetrievalMode::HybridStructuralFirst
            } else {
                RetrievalMode::HybridSemanticFirst
            };
            reasons.push(format!(
                "scores within margin {:.2} (structural {s:.2}, semantic {sem:.2}): {mode}",
                cfg.hybrid_margin
            ));
            return (mode, unit(0.3 + 0.5 * (s + sem) / 2.0));
        }
        reasons.push(format!(
            "no rule matched (structural {s:.2}, semantic {sem:.2})"
        ));
        self.fallback(reasons)
    }

    fn fallback(&self, reasons: &mut Vec<String>) -> (RetrievalMode, f64) {
        if self.config.fallback_enabled {
            reasons.push("fallback to semantic search".to_string());
            (RetrievalMode::SemanticOnly, FALLBACK_CONFIDENCE)
        } else {
            reasons.push("fallback disabled, defaulting to structural analysis".to_string());
            (RetrievalMode::StructuralOnly, FALLBACK_CONFIDENCE)
        }
    }
}

/// Confidence of a single-mode decision: grows with the winning score and
/// with its lead over the other side.
fn single_confidence(winner: f64, other: f64) -> f64 {
    unit(0.4 + 0.3 * winner + 0.3 * (winner - other))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
