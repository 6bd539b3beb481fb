//! Statistics snapshot and grouped summary types.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One entry of the recent-error ring.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorRecord {
    pub mode: String,
    /// Short error kind, e.g. `timeout`.
    pub kind: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Everything the collector knows. Snapshots are deep copies.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistics {
    pub total_queries: u64,
    pub successful_queries: u64,
    pub failed_queries: u64,
    pub queries_by_mode: BTreeMap<String, u64>,
    /// Incremental mean per mode.
    pub avg_latency_ms: BTreeMap<String, f64>,
    pub overall_avg_latency_ms: f64,
    /// Exponential moving averages per mode.
    pub success_rate: BTreeMap<String, f64>,
    pub quality: BTreeMap<String, f64>,
    pub cache_hit_rate: BTreeMap<String, f64>,
    pub cache_lookups: BTreeMap<String, u64>,
    pub cache_hits: BTreeMap<String, u64>,
    /// Most recent sample per mode.
    pub memory_bytes: BTreeMap<String, u64>,
    pub peak_memory_bytes: BTreeMap<String, u64>,
    pub error_counts: BTreeMap<String, u64>,
    pub total_errors: u64,
    pub last_errors: VecDeque<ErrorRecord>,
    pub mode_selections: BTreeMap<String, u64>,
    pub total_selections: u64,
    pub avg_confidence: f64,
    pub decisions_evaluated: u64,
    pub correct_decisions: u64,
    /// `correct_decisions / decisions_evaluated`, 0 before any outcome.
    pub decision_accuracy: f64,
    /// Outcomes keyed by the mode that was selected.
    pub decisions_by_mode: BTreeMap<String, u64>,
    pub correct_by_mode: BTreeMap<String, u64>,
    pub accuracy_by_mode: BTreeMap<String, f64>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for Statistics {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            total_queries: 0,
            successful_queries: 0,
            failed_queries: 0,
            queries_by_mode: BTreeMap::new(),
            avg_latency_ms: BTreeMap::new(),
            overall_avg_latency_ms: 0.0,
            success_rate: BTreeMap::new(),
            quality: BTreeMap::new(),
            cache_hit_rate: BTreeMap::new(),
            cache_lookups: BTreeMap::new(),
            cache_hits: BTreeMap::new(),
            memory_bytes: BTreeMap::new(),
            peak_memory_bytes: BTreeMap::new(),
            error_counts: BTreeMap::new(),
            total_errors: 0,
            last_errors: VecDeque::new(),
            mode_selections: BTreeMap::new(),
            total_selections: 0,
            avg_confidence: 0.0,
            decisions_evaluated: 0,
            correct_decisions: 0,
            decision_accuracy: 0.0,
            decisions_by_mode: BTreeMap::new(),
            correct_by_mode: BTreeMap::new(),
            accuracy_by_mode: BTreeMap::new(),
            started_at: now,
            updated_at: now,
        }
    }
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub counts: CountsSummary,
    pub performance: PerformanceSummary,
    pub optimization: OptimizationSummary,
    pub reliability: ReliabilitySummary,
    pub uptime_secs: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountsSummary {
    pub total_queries: u64,
    pub successful_queries: u64,
    pub failed_queries: u64,
    pub total_selections: u64,
    pub total_errors: u64,
    pub queries_by_mode: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceSummary {
    pub overall_avg_latency_ms: f64,
    pub avg_latency_ms: BTreeMap<String, f64>,
    pub peak_memory_bytes: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationSummary {
    pub cache_hit_rate: BTreeMap<String, f64>,
    pub avg_confidence: f64,
    pub decision_accuracy: f64,
    /// Share of evaluated selections of each mode that were correct.
    pub accuracy_by_mode: BTreeMap<String, f64>,
    /// Share of selections per mode, in [0, 1].
    pub mode_distribution: BTreeMap<String, f64>,
    pub quality: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReliabilitySummary {
    pub overall_success_rate: f64,
    pub success_rate: BTreeMap<String, f64>,
    pub error_counts: BTreeMap<String, u64>,
    pub recent_errors: usize,
}

impl Statistics {
    /// Seconds since the collector was created or last reset.
    pub fn uptime_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds().max(0)
    }

    pub fn summary(&self) -> Summary {
        let overall_success_rate = if self.total_queries == 0 {
            0.0
        } else {
            self.successful_queries as f64 / self.total_queries as f64
        };
        let mode_distribution = self
            .mode_selections
            .iter()
            .map(|(mode, count)| {
                let share = if self.total_selections == 0 {
                    0.0
                } else {
                    *count as f64 / self.total_selections as f64
                };
                (mode.clone(), share)
            })
            .collect();

        Summary {
            counts: CountsSummary {
                total_queries: self.total_queries,
                successful_queries: self.successful_queries,
                failed_queries: self.failed_queries,
                total_selections: self.total_selections,
                total_errors: self.total_errors,
                queries_by_mode: self.queries_by_mode.clone(),
            },
            performance: PerformanceSummary {
                overall_avg_latency_ms: self.overall_avg_latency_ms,
                avg_latency_ms: self.avg_latency_ms.clone(),
                peak_memory_bytes: self.peak_memory_bytes.clone(),
            },
            optimization: OptimizationSummary {
                cache_hit_rate: self.cache_hit_rate.clone(),
                avg_confidence: self.avg_confidence,
                decision_accuracy: self.decision_accuracy,
                accuracy_by_mode: self.accuracy_by_mode.clone(),
                mode_distribution,
                quality: self.quality.clone(),
            },
            reliability: ReliabilitySummary {
                overall_success_rate,
                success_rate: self.success_rate.clone(),
                error_counts: self.error_counts.clone(),
                recent_errors: self.last_errors.len(),
            },
            uptime_secs: self.uptime_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_summary_has_zero_rates() {
        let summary = Statistics::default().summary();
        assert_eq!(summary.counts.total_queries, 0);
        assert_eq!(summary.reliability.overall_success_rate, 0.0);
        assert!(summary.optimization.mode_distribution.is_empty());
    }

    #[test]
    fn mode_distribution_sums_to_one() {
        let mut stats = Statistics::default();
        stats.mode_selections.insert("structural".into(), 3);
        stats.mode_selections.insert("semantic".into(), 1);
        stats.total_selections = 4;
        let dist = stats.summary().optimization.mode_distribution;
        assert_eq!(dist["structural"], 0.75);
        assert_eq!(dist.values().sum::<f64>(), 1.0);
    }

    #[test]
    fn uptime_keeps_growing_without_new_records() {
        let mut stats = Statistics::default();
        stats.started_at = Utc::now() - chrono::Duration::seconds(90);
        stats.updated_at = stats.started_at;
        assert!(stats.summary().uptime_secs >= 90);
    }

    #[test]
    fn summary_serializes_grouped_sections() {
        let json = serde_json::to_value(Statistics::default().summary()).unwrap();
        for section in ["counts", "performance", "optimization", "reliability"] {
            assert!(json.get(section).is_some(), "missing {section}");
        }
    }
}
