//! Thread-safe query, cache and decision metrics.
//!
//! One `RwLock` guards the [`Statistics`]; every `record_*` call takes the
//! write lock briefly and never fails. Rates are exponential moving averages
//! (`new = old * w + sample * (1 - w)`, first sample initializes), latency is
//! an incremental mean, and the recent-error ring drops its oldest entry
//! when full.

pub mod stats;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::background::BackgroundTask;
use crate::config::MetricsConfig;
use crate::error::{HybridError, Result};
use crate::types::RetrievalMode;

pub use stats::{ErrorRecord, Statistics, Summary};

pub struct MetricsCollector {
    stats: Arc<RwLock<Statistics>>,
    smoothing: f64,
    error_ring_capacity: usize,
    report_interval: Duration,
    reporter: Mutex<Option<BackgroundTask>>,
}

fn ema(map: &mut BTreeMap<String, f64>, key: &str, sample: f64, w: f64) {
    map.entry(key.to_string())
        .and_modify(|old| *old = *old * w + sample * (1.0 - w))
        .or_insert(sample);
}

fn bump(map: &mut BTreeMap<String, u64>, key: &str) -> u64 {
    let count = map.entry(key.to_string()).or_insert(0);
    *count += 1;
    *count
}

impl MetricsCollector {
    pub fn new(config: &MetricsConfig) -> Self {
        Self {
            stats: Arc::new(RwLock::new(Statistics::default())),
            smoothing: config.smoothing.clamp(0.0, 0.999),
            error_ring_capacity: config.error_ring_capacity.max(1),
            report_interval: config.report_interval(),
            reporter: Mutex::new(None),
        }
    }

    fn write<F: FnOnce(&mut Statistics)>(&self, f: F) {
        let mut stats = self.stats.write().unwrap_or_else(|e| e.into_inner());
        f(&mut stats);
        stats.updated_at = Utc::now();
    }

    /// Record a finished query. `quality` is the mean relevance of what was
    /// returned, in [0, 1].
    pub fn record_query(&self, mode: &str, duration: Duration, success: bool, quality: f64) {
        let w = self.smoothing;
        let latency_ms = duration.as_secs_f64() * 1000.0;
        let quality = if quality.is_finite() { quality.clamp(0.0, 1.0) } else { 0.0 };
        self.write(|s| {
            s.total_queries += 1;
            if success {
                s.successful_queries += 1;
            } else {
                s.failed_queries += 1;
            }
            let n = bump(&mut s.queries_by_mode, mode);
            let mean = s.avg_latency_ms.entry(mode.to_string()).or_insert(0.0);
            *mean += (latency_ms - *mean) / n as f64;
            s.overall_avg_latency_ms +=
                (latency_ms - s.overall_avg_latency_ms) / s.total_queries as f64;
            ema(&mut s.success_rate, mode, if success { 1.0 } else { 0.0 }, w);
            ema(&mut s.quality, mode, quality, w);
        });
    }

    /// Record a mode decision. When the hindsight-best mode is already known
    /// it also counts toward decision accuracy.
    pub fn record_mode_selection(
        &self,
        selected: RetrievalMode,
        actual_best: Option<RetrievalMode>,
        confidence: f64,
    ) {
        let confidence = confidence.clamp(0.0, 1.0);
        self.write(|s| {
            bump(&mut s.mode_selections, selected.as_str());
            s.total_selections += 1;
            s.avg_confidence += (confidence - s.avg_confidence) / s.total_selections as f64;
            if let Some(best) = actual_best {
                apply_outcome(s, selected, best);
            }
        });
    }

    /// Record which mode would have been best for an earlier selection.
    pub fn record_selection_outcome(&self, selected: RetrievalMode, actual_best: RetrievalMode) {
        self.write(|s| apply_outcome(s, selected, actual_best));
    }

    pub fn record_error(&self, mode: &str, err: &HybridError) {
        let record = ErrorRecord {
            mode: mode.to_string(),
            kind: err.kind().to_string(),
            message: err.to_string(),
            at: Utc::now(),
        };
        let cap = self.error_ring_capacity;
        self.write(|s| {
            bump(&mut s.error_counts, mode);
            s.total_errors += 1;
            s.last_errors.push_back(record);
            while s.last_errors.len() > cap {
                s.last_errors.pop_front();
            }
        });
    }

    pub fn record_cache_hit(&self, mode: &str, hit: bool) {
        let w = self.smoothing;
        self.write(|s| {
            bump(&mut s.cache_lookups, mode);
            if hit {
                bump(&mut s.cache_hits, mode);
            }
            ema(&mut s.cache_hit_rate, mode, if hit { 1.0 } else { 0.0 }, w);
        });
    }

    pub fn record_memory_usage(&self, mode: &str, bytes: u64) {
        self.write(|s| {
            s.memory_bytes.insert(mode.to_string(), bytes);
            let peak = s.peak_memory_bytes.entry(mode.to_string()).or_insert(0);
            *peak = (*peak).max(bytes);
        });
    }

    /// Deep copy of the current statistics.
    pub fn snapshot(&self) -> Statistics {
        self.stats.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn summary(&self) -> Summary {
        self.stats.read().unwrap_or_else(|e| e.into_inner()).summary()
    }

    pub fn reset(&self) {
        let mut stats = self.stats.write().unwrap_or_else(|e| e.into_inner());
        *stats = Statistics::default();
    }

    /// Log a summary every `report_interval` until `ctx` is cancelled or
    /// [`stop`](Self::stop) is called. A second call while running is a no-op.
    pub fn start_periodic_reporting(&self, ctx: &CancellationToken) -> Result<()> {
        let mut slot = self.reporter.lock().unwrap_or_else(|e| e.into_inner());
        if slot.as_ref().is_some_and(|task| task.is_running()) {
            return Ok(());
        }
        let stats = Arc::clone(&self.stats);
        let task = BackgroundTask::spawn_periodic("metrics-reporter", ctx, self.report_interval, move || {
            let summary = stats.read().unwrap_or_else(|e| e.into_inner()).summary();
            tracing::info!(
                queries = summary.counts.total_queries,
                errors = summary.counts.total_errors,
                success_rate = summary.reliability.overall_success_rate,
                avg_latency_ms = summary.performance.overall_avg_latency_ms,
                decision_accuracy = summary.optimization.decision_accuracy,
                "Retrieval metrics"
            );
        })?;
        *slot = Some(task);
        Ok(())
    }

    pub fn is_reporting(&self) -> bool {
        let slot = self.reporter.lock().unwrap_or_else(|e| e.into_inner());
        slot.as_ref().is_some_and(|task| task.is_running())
    }

    /// Stop periodic reporting. Idempotent.
    pub async fn stop(&self) {
        let task = {
            let mut slot = self.reporter.lock().unwrap_or_else(|e| e.into_inner());
            slot.take()
        };
        if let Some(task) = task {
            task.stop().await;
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new(&MetricsConfig::default())
    }
}

fn apply_outcome(s: &mut Statistics, selected: RetrievalMode, best: RetrievalMode) {
    let mode = selected.as_str();
    s.decisions_evaluated += 1;
    let evaluated = bump(&mut s.decisions_by_mode, mode);
    let correct = s.correct_by_mode.entry(mode.to_string()).or_insert(0);
    if selected == best {
        s.correct_decisions += 1;
        *correct += 1;
    }
    let accuracy = *correct as f64 / evaluated as f64;
    s.accuracy_by_mode.insert(mode.to_string(), accuracy);
    s.decision_accuracy = s.correct_decisions as f64 / s.decisions_evaluated as f64;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
