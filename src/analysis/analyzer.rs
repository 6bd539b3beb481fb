//! Structural analysis of single files and whole workspaces.
//!
//! [`StructuralAnalyzer::analyze_file`] is synchronous: it reads, parses and
//! extracts on the calling thread. Workspace analysis fans files out to a
//! dedicated [`WorkerPool`] so parsing runs on tokio's blocking threads.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;

use super::complexity::file_cyclomatic;
use super::extractor::extract;
use super::model::{ComplexityMetrics, FunctionInfo, StructuralResult, TypeInfo};
use super::parser::CodeParser;
use super::source::{FsSource, ListOptions, SourceReader};
use crate::cache::StructuralCache;
use crate::config::{HybridConfig, RetrievalConfig, WorkerPoolConfig};
use crate::error::{HybridError, Result};
use crate::metrics::MetricsCollector;
use crate::pool::WorkerPool;
use crate::types::Language;

/// Back-off between submit attempts while the pool queue is full.
const QUEUE_FULL_BACKOFF: Duration = Duration::from_millis(2);

/// Metrics and cache label for this component.
const MODE: &str = "structural";

pub struct StructuralAnalyzer {
    parser: CodeParser,
    cache: Arc<StructuralCache>,
    source: Arc<dyn SourceReader>,
    metrics: Arc<MetricsCollector>,
    pool_config: WorkerPoolConfig,
    retrieval: RetrievalConfig,
}

// ---------------------------------------------------------------------------
// Workspace analysis output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct FileFailure {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkspaceTotals {
    pub files: usize,
    pub lines: u64,
    pub functions: usize,
    pub types: usize,
    /// Distinct package / module names.
    pub packages: usize,
    pub avg_function_complexity: f64,
    pub total_cyclomatic: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceAnalysis {
    pub root: PathBuf,
    /// Sorted by file path.
    pub files: Vec<Arc<StructuralResult>>,
    pub failures: Vec<FileFailure>,
    pub totals: WorkspaceTotals,
    pub elapsed: Duration,
}

impl WorkspaceTotals {
    fn from_results(files: &[Arc<StructuralResult>]) -> Self {
        let mut totals = Self {
            files: files.len(),
            ..Self::default()
        };
        let mut packages = BTreeSet::new();
        let mut complexity_sum = 0u64;
        for file in files {
            totals.lines += u64::from(file.metrics.lines);
            totals.functions += file.functions.len();
            totals.types += file.types.len();
            totals.total_cyclomatic += u64::from(file.metrics.cyclomatic);
            complexity_sum += file.functions.iter().map(|f| u64::from(f.complexity)).sum::<u64>();
            if !file.package.is_empty() {
                packages.insert(file.package.as_str());
            }
        }
        totals.packages = packages.len();
        if totals.functions > 0 {
            totals.avg_function_complexity = complexity_sum as f64 / totals.functions as f64;
        }
        totals
    }
}

// ---------------------------------------------------------------------------
// Line context
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextScope {
    Function,
    Method,
    Type,
    Package,
}

impl ContextScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Method => "method",
            Self::Type => "type",
            Self::Package => "package",
        }
    }
}

/// The declarations enclosing one line of a file.
#[derive(Debug, Clone)]
pub struct StructuralContext {
    pub scope: ContextScope,
    pub line: u32,
    pub function: Option<FunctionInfo>,
    pub type_info: Option<TypeInfo>,
    pub result: Arc<StructuralResult>,
}

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

impl StructuralAnalyzer {
    pub fn new(
        config: &HybridConfig,
        cache: Arc<StructuralCache>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            parser: CodeParser::new(),
            cache,
            source: Arc::new(FsSource),
            metrics,
            pool_config: config.worker_pool.clone(),
            retrieval: config.retrieval.clone(),
        }
    }

    /// Read files through `source` instead of the filesystem.
    pub fn with_source(mut self, source: Arc<dyn SourceReader>) -> Self {
        self.source = source;
        self
    }

    pub fn cache(&self) -> &Arc<StructuralCache> {
        &self.cache
    }

    /// Analyze one file, serving from the cache when possible.
    pub fn analyze_file(&self, path: &Path) -> Result<Arc<StructuralResult>> {
        let key = path.to_string_lossy().into_owned();
        if let Some(hit) = self.cache.get(&key) {
            self.metrics.record_cache_hit(MODE, true);
            return Ok(hit);
        }
        self.metrics.record_cache_hit(MODE, false);

        let language = CodeParser::detect_language(path)
            .ok_or_else(|| HybridError::UnsupportedLanguage(key.clone()))?;
        let bytes = self.source.read(path)?;
        let content = String::from_utf8(bytes)
            .map_err(|_| HybridError::Parse(format!("{key}: file is not valid UTF-8")))?;

        let mut result = analyze_source_with(&self.parser, &key, &content, language)?;
        result.modified_at = self.source.modified(path);
        let result = Arc::new(result);
        self.cache.set(key, Arc::clone(&result));
        tracing::debug!(
            file = %result.file_path,
            functions = result.functions.len(),
            types = result.types.len(),
            "Analyzed file"
        );
        Ok(result)
    }

    /// The innermost function and type containing `line` (1-based).
    pub fn structural_context_at(&self, path: &Path, line: u32) -> Result<StructuralContext> {
        if line == 0 {
            return Err(HybridError::InvalidQuery("line numbers start at 1".into()));
        }
        let result = self.analyze_file(path)?;
        let function = result.function_at(line).cloned();
        let type_info = result.type_at(line).cloned();
        let scope = match (&function, &type_info) {
            (Some(f), _) if f.is_method => ContextScope::Method,
            (Some(_), _) => ContextScope::Function,
            (None, Some(_)) => ContextScope::Type,
            (None, None) => ContextScope::Package,
        };
        Ok(StructuralContext {
            scope,
            line,
            function,
            type_info,
            result,
        })
    }

    /// Analyze every supported file under `root` on a dedicated worker pool.
    ///
    /// Per-file failures are logged and collected; cancellation aborts the
    /// whole walk with [`HybridError::Cancelled`].
    pub async fn analyze_workspace(
        self: &Arc<Self>,
        root: &Path,
        cancel: &CancellationToken,
    ) -> Result<WorkspaceAnalysis> {
        let started = Instant::now();
        if cancel.is_cancelled() {
            return Err(HybridError::Cancelled);
        }

        let files = {
            let source = Arc::clone(&self.source);
            let root = root.to_path_buf();
            let options = ListOptions {
                exclude_dirs: self.retrieval.exclude_dirs.clone(),
                max_file_bytes: self.retrieval.max_file_bytes,
            };
            let walk_cancel = cancel.clone();
            let mut files = tokio::task::spawn_blocking(move || source.list(&root, &options, &walk_cancel))
                .await
                .map_err(|e| HybridError::Task(format!("workspace walk failed: {e}")))??;
            files.retain(|path| CodeParser::is_supported(path));
            files
        };
        tracing::info!(root = %root.display(), files = files.len(), "Analyzing workspace");

        let pool: WorkerPool<Arc<StructuralResult>> =
            WorkerPool::new("workspace-analysis", &self.pool_config);
        pool.start(cancel)?;
        let results = pool.results()?;

        let mut pending: HashMap<u64, PathBuf> = HashMap::with_capacity(files.len());
        for path in files {
            loop {
                let analyzer = Arc::clone(self);
                let job_path = path.clone();
                let job = move |quit: &CancellationToken| {
                    if quit.is_cancelled() {
                        return Err(HybridError::Cancelled);
                    }
                    analyzer.analyze_file(&job_path)
                };
                match pool.submit(job) {
                    Ok(id) => {
                        pending.insert(id, path);
                        break;
                    }
                    Err(HybridError::QueueFull { .. }) => {
                        tokio::select! {
                            _ = cancel.cancelled() => {
                                pool.stop().await;
                                return Err(HybridError::Cancelled);
                            }
                            _ = tokio::time::sleep(QUEUE_FULL_BACKOFF) => {}
                        }
                    }
                    Err(e) => {
                        pool.stop().await;
                        return Err(e);
                    }
                }
            }
        }

        let mut analyzed = Vec::with_capacity(pending.len());
        let mut failures = Vec::new();
        while !pending.is_empty() {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    pool.stop().await;
                    return Err(HybridError::Cancelled);
                }
                next = results.recv() => next,
            };
            let Ok(done) = next else { break };
            let Some(path) = pending.remove(&done.task_id) else {
                continue;
            };
            match done.outcome {
                Ok(result) => analyzed.push(result),
                Err(HybridError::Cancelled) => {
                    pool.stop().await;
                    return Err(HybridError::Cancelled);
                }
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "Skipping file");
                    self.metrics.record_error(MODE, &e);
                    failures.push(FileFailure {
                        path: path.to_string_lossy().into_owned(),
                        error: e.to_string(),
                    });
                }
            }
        }
        pool.stop().await;
        if cancel.is_cancelled() {
            return Err(HybridError::Cancelled);
        }

        analyzed.sort_by(|a, b| a.file_path.cmp(&b.file_path));
        failures.sort_by(|a, b| a.path.cmp(&b.path));
        let totals = WorkspaceTotals::from_results(&analyzed);
        self.metrics
            .record_memory_usage(MODE, self.cache.stats().memory_estimate as u64);
        tracing::info!(
            files = totals.files,
            failures = failures.len(),
            functions = totals.functions,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Workspace analysis complete"
        );

        Ok(WorkspaceAnalysis {
            root: root.to_path_buf(),
            files: analyzed,
            failures,
            totals,
            elapsed: started.elapsed(),
        })
    }
}

/// Parse and extract `content` without touching any cache.
pub fn analyze_source(file_path: &str, content: &str, language: Language) -> Result<StructuralResult> {
    analyze_source_with(&CodeParser::new(), file_path, content, language)
}

fn analyze_source_with(
    parser: &CodeParser,
    file_path: &str,
    content: &str,
    language: Language,
) -> Result<StructuralResult> {
    let tree = parser.parse(content, language)?;
    let extraction = extract(&tree, content, language, file_path);
    let metrics = ComplexityMetrics {
        cyclomatic: file_cyclomatic(tree.root_node(), language),
        lines: content.lines().count() as u32,
        functions: extraction.functions.len() as u32,
        types: extraction.types.len() as u32,
    };
    Ok(StructuralResult {
        file_path: file_path.to_string(),
        language,
        package: extraction.package,
        imports: extraction.imports,
        functions: extraction.functions,
        types: extraction.types,
        dependencies: extraction.dependencies,
        metrics,
        content_hash: hex::encode(Sha256::digest(content.as_bytes())),
        analyzed_at: Utc::now(),
        modified_at: None,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
