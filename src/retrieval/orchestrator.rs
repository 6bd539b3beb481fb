//! Query entry point: decide, run the chosen path(s), combine, record.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::combiner::{CombinedResult, ResultCombiner};
use super::structural_search;
use crate::analysis::{SourceReader, StructuralAnalyzer, StructuralResult};
use crate::cache::{CacheStats, StructuralCache};
use crate::config::{self, HybridConfig};
use crate::error::{HybridError, Result};
use crate::metrics::{MetricsCollector, Statistics, Summary};
use crate::observability::validate_path;
use crate::selector::{ModeDecision, ModeSelector};
use crate::semantic::SemanticSearch;
use crate::types::{Query, ResultSource, RetrievalMode};

/// Answer to one query.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalResponse {
    pub decision: ModeDecision,
    pub results: Vec<CombinedResult>,
    pub elapsed: Duration,
    pub structural_timed_out: bool,
    pub semantic_timed_out: bool,
}

/// Both caches, reported independently.
#[derive(Debug, Clone, Serialize)]
pub struct CacheReport {
    pub structural: CacheStats,
    pub decision: CacheStats,
}

struct PathOutcome {
    results: Vec<CombinedResult>,
    structural_timed_out: bool,
    semantic_timed_out: bool,
}

pub struct RetrievalOrchestrator {
    config: HybridConfig,
    root: PathBuf,
    metrics: Arc<MetricsCollector>,
    structural_cache: Arc<StructuralCache>,
    analyzer: Arc<StructuralAnalyzer>,
    selector: ModeSelector,
    combiner: ResultCombiner,
    semantic: Option<SemanticSearch>,
    lifecycle: CancellationToken,
    started: AtomicBool,
}

impl RetrievalOrchestrator {
    /// Build every component from `config`. Nothing runs until
    /// [`start`](Self::start).
    pub fn new(config: HybridConfig, root: impl Into<PathBuf>) -> Result<Self> {
        config::validate(&config)?;
        let root = root.into();
        let root = root.canonicalize().unwrap_or(root);

        let metrics = Arc::new(MetricsCollector::new(&config.metrics));
        let structural_cache = Arc::new(StructuralCache::from_config(&config.structural_cache));
        let analyzer = Arc::new(StructuralAnalyzer::new(
            &config,
            Arc::clone(&structural_cache),
            Arc::clone(&metrics),
        ));
        let selector = ModeSelector::from_config(&config, Arc::clone(&metrics));
        let combiner = ResultCombiner::from_config(&config.retrieval);

        Ok(Self {
            config,
            root,
            metrics,
            structural_cache,
            analyzer,
            selector,
            combiner,
            semantic: None,
            lifecycle: CancellationToken::new(),
            started: AtomicBool::new(false),
        })
    }

    pub fn with_semantic(mut self, semantic: SemanticSearch) -> Self {
        self.semantic = Some(semantic);
        self
    }

    /// Read source files through `source` instead of the filesystem.
    pub fn with_source(mut self, source: Arc<dyn SourceReader>) -> Self {
        self.analyzer = Arc::new(
            StructuralAnalyzer::new(
                &self.config,
                Arc::clone(&self.structural_cache),
                Arc::clone(&self.metrics),
            )
            .with_source(source),
        );
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn analyzer(&self) -> &Arc<StructuralAnalyzer> {
        &self.analyzer
    }

    pub fn selector(&self) -> &ModeSelector {
        &self.selector
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Launch the cache sweepers and the metrics reporter. Must run inside a
    /// tokio runtime. Calling it again while started is a no-op.
    pub fn start(&self) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let launched = self
            .structural_cache
            .start_sweeper(&self.lifecycle)
            .and_then(|()| self.selector.cache().start_sweeper(&self.lifecycle))
            .and_then(|()| self.metrics.start_periodic_reporting(&self.lifecycle));
        if let Err(e) = launched {
            self.started.store(false, Ordering::SeqCst);
            return Err(e);
        }
        tracing::info!(root = %self.root.display(), preset = self.config.preset.as_str(), "Retrieval engine started");
        Ok(())
    }

    /// Stop background tasks. Idempotent; the engine can be started again.
    pub async fn shutdown(&self) {
        if !self.started.swap(false, Ordering::SeqCst) {
            return;
        }
        self.structural_cache.stop_sweeper().await;
        self.selector.cache().stop_sweeper().await;
        self.metrics.stop().await;
        tracing::info!("Retrieval engine stopped");
    }

    pub fn cache_stats(&self) -> CacheReport {
        CacheReport {
            structural: self.structural_cache.stats(),
            decision: self.selector.cache_stats(),
        }
    }

    pub fn metrics_snapshot(&self) -> Statistics {
        self.metrics.snapshot()
    }

    pub fn metrics_summary(&self) -> Summary {
        self.metrics.summary()
    }

    /// Answer `query`. The mode decision is made first; only the path(s) it
    /// names are run.
    pub async fn retrieve(
        &self,
        query: &Query,
        cancel: &CancellationToken,
    ) -> Result<RetrievalResponse> {
        if !self.is_started() {
            return Err(HybridError::NotInitialized(
                "retrieval engine not started".into(),
            ));
        }
        if cancel.is_cancelled() {
            return Err(HybridError::Cancelled);
        }
        query.validate()?;
        let limited;
        let query = if query.limit == 0 {
            limited = query
                .clone()
                .with_limit(query.effective_limit(self.config.retrieval.default_limit));
            &limited
        } else {
            query
        };
        let resolved = query
            .file_path
            .as_deref()
            .map(|p| validate_path(p, &self.root))
            .transpose()?;

        let started = Instant::now();
        let decision = self.selector.select_mode(query);
        let mode = decision.mode;

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(HybridError::Cancelled),
            outcome = self.execute(mode, query, resolved.as_deref(), cancel) => outcome,
        };
        let elapsed = started.elapsed();

        match outcome {
            Ok(paths) => {
                let quality = mean_relevance(&paths.results);
                self.metrics.record_query(mode.as_str(), elapsed, true, quality);
                if mode.is_hybrid() {
                    if let Some(top) = paths.results.first() {
                        self.metrics
                            .record_selection_outcome(mode, hindsight_best(mode, top.source));
                    }
                }
                tracing::debug!(
                    mode = %mode,
                    results = paths.results.len(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Query answered"
                );
                Ok(RetrievalResponse {
                    decision,
                    results: paths.results,
                    elapsed,
                    structural_timed_out: paths.structural_timed_out,
                    semantic_timed_out: paths.semantic_timed_out,
                })
            }
            Err(e) => {
                self.metrics.record_query(mode.as_str(), elapsed, false, 0.0);
                self.metrics.record_error(mode.as_str(), &e);
                tracing::warn!(mode = %mode, error = %e, "Query failed");
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        mode: RetrievalMode,
        query: &Query,
        file: Option<&Path>,
        cancel: &CancellationToken,
    ) -> Result<PathOutcome> {
        let query_timeout = self.config.retrieval.query_timeout();
        let path_timeout = self.config.retrieval.path_timeout();

        match mode {
            RetrievalMode::StructuralOnly | RetrievalMode::SemanticOnly => {
                let (structural, semantic) = if mode.uses_structural() {
                    let structural = tokio::time::timeout(query_timeout, self.structural_path(query, file, cancel))
                        .await
                        .map_err(|_| HybridError::Timeout(query_timeout))??;
                    (structural, Vec::new())
                } else {
                    let semantic = tokio::time::timeout(query_timeout, self.semantic_path(query))
                        .await
                        .map_err(|_| HybridError::Timeout(query_timeout))??;
                    (Vec::new(), semantic)
                };
                Ok(PathOutcome {
                    results: self.combiner.combine(mode, structural, semantic, query),
                    structural_timed_out: false,
                    semantic_timed_out: false,
                })
            }
            RetrievalMode::HybridStructuralFirst | RetrievalMode::HybridSemanticFirst => {
                let (structural, semantic) = tokio::join!(
                    tokio::time::timeout(path_timeout, self.structural_path(query, file, cancel)),
                    tokio::time::timeout(path_timeout, self.semantic_path(query)),
                );
                let structural_timed_out = structural.is_err();
                let semantic_timed_out = semantic.is_err();
                if structural_timed_out && semantic_timed_out {
                    return Err(HybridError::Timeout(path_timeout));
                }
                let structural = self.absorb(ResultSource::Structural, structural, path_timeout)?;
                let semantic = self.absorb(ResultSource::Semantic, semantic, path_timeout)?;
                Ok(PathOutcome {
                    results: self.combiner.combine(mode, structural, semantic, query),
                    structural_timed_out,
                    semantic_timed_out,
                })
            }
        }
    }

    /// A failed or timed-out hybrid path contributes nothing. Cancellation
    /// still propagates.
    fn absorb(
        &self,
        source: ResultSource,
        outcome: std::result::Result<Result<Vec<CombinedResult>>, tokio::time::error::Elapsed>,
        path_timeout: Duration,
    ) -> Result<Vec<CombinedResult>> {
        match outcome {
            Ok(Ok(results)) => Ok(results),
            Ok(Err(HybridError::Cancelled)) => Err(HybridError::Cancelled),
            Ok(Err(e)) => {
                tracing::warn!(path = source.as_str(), error = %e, "Hybrid path failed");
                self.metrics.record_error(source.as_str(), &e);
                Ok(Vec::new())
            }
            Err(_) => {
                tracing::warn!(
                    path = source.as_str(),
                    timeout_ms = path_timeout.as_millis() as u64,
                    "Hybrid path timed out"
                );
                self.metrics
                    .record_error(source.as_str(), &HybridError::Timeout(path_timeout));
                Ok(Vec::new())
            }
        }
    }

    async fn structural_path(
        &self,
        query: &Query,
        file: Option<&Path>,
        cancel: &CancellationToken,
    ) -> Result<Vec<CombinedResult>> {
        let files: Vec<Arc<StructuralResult>> = match file {
            Some(path) => {
                let analyzer = Arc::clone(&self.analyzer);
                let path = path.to_path_buf();
                let result = tokio::task::spawn_blocking(move || analyzer.analyze_file(&path))
                    .await
                    .map_err(|e| HybridError::Task(format!("structural analysis failed: {e}")))??;
                vec![result]
            }
            None => self.analyzer.analyze_workspace(&self.root, cancel).await?.files,
        };
        self.metrics.record_memory_usage(
            ResultSource::Structural.as_str(),
            self.structural_cache.stats().memory_estimate as u64,
        );

        Ok(files
            .iter()
            .filter(|f| query.filters.allows_path(&f.file_path))
            .flat_map(|f| structural_search::search(f, query))
            .collect())
    }

    async fn semantic_path(&self, query: &Query) -> Result<Vec<CombinedResult>> {
        let semantic = self.semantic.as_ref().ok_or_else(|| {
            HybridError::NotInitialized("no semantic search backend configured".into())
        })?;
        let hits = semantic.search(query).await?;
        Ok(hits
            .iter()
            .map(|hit| {
                let mut result = CombinedResult::from_semantic_hit(hit);
                // Align index paths with analyzer paths so overlaps merge.
                if let Some(location) = result.location.as_mut() {
                    if let Ok(resolved) = validate_path(&location.file_path, &self.root) {
                        location.file_path = resolved.to_string_lossy().into_owned();
                    }
                }
                result
            })
            .collect())
    }
}

fn mean_relevance(results: &[CombinedResult]) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    results.iter().map(|r| r.relevance).sum::<f64>() / results.len() as f64
}

/// The mode that would have sufficed, judged by where the top result came from.
fn hindsight_best(selected: RetrievalMode, top: ResultSource) -> RetrievalMode {
    match top {
        ResultSource::Structural => RetrievalMode::StructuralOnly,
        ResultSource::Semantic => RetrievalMode::SemanticOnly,
        ResultSource::Combined => selected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hindsight_prefers_the_top_source() {
        let mode = RetrievalMode::HybridStructuralFirst;
        assert_eq!(hindsight_best(mode, ResultSource::Semantic), RetrievalMode::SemanticOnly);
        assert_eq!(hindsight_best(mode, ResultSource::Structural), RetrievalMode::StructuralOnly);
        assert_eq!(hindsight_best(mode, ResultSource::Combined), mode);
    }

    #[test]
    fn mean_relevance_of_nothing_is_zero() {
        assert_eq!(mean_relevance(&[]), 0.0);
    }

    #[tokio::test]
    async fn retrieve_before_start_is_not_initialized() {
        let tmp = tempfile::TempDir::new().unwrap();
        let engine = RetrievalOrchestrator::new(HybridConfig::default(), tmp.path()).unwrap();
        let err = engine
            .retrieve(&Query::new("x"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, HybridError::NotInitialized(_)));
    }

    #[tokio::test]
    async fn start_and_shutdown_are_idempotent() {
        let tmp = tempfile::TempDir::new().unwrap();
        let engine = RetrievalOrchestrator::new(HybridConfig::default(), tmp.path()).unwrap();
        engine.start().unwrap();
        engine.start().unwrap();
        assert!(engine.is_started());
        engine.shutdown().await;
        engine.shutdown().await;
        assert!(!engine.is_started());
        engine.start().unwrap();
        engine.shutdown().await;
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = HybridConfig::default();
        config.selector.structural_threshold = 2.0;
        assert!(matches!(
            RetrievalOrchestrator::new(config, "."),
            Err(HybridError::Config(_))
        ));
    }
}
