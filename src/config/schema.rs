//! Configuration data structures for the retrieval engine.
//!
//! Defines the YAML config format: preset, selector thresholds, scoring
//! weights, cache sizing, worker pool, metrics and retrieval timeouts.
//! Every field has a serde default so partial files load cleanly.

use serde::{Deserialize, Serialize};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration.
///
/// Loaded from YAML files and environment variables; see
/// [`super::load_config`] for the source priority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HybridConfig {
    /// Config format version (currently "1.0").
    #[serde(default = "default_version")]
    pub version: String,

    /// Active preset name. Presets tune the selector thresholds.
    #[serde(default)]
    pub preset: PresetName,

    #[serde(default)]
    pub selector: SelectorConfig,

    #[serde(default)]
    pub weights: WeightsConfig,

    #[serde(default)]
    pub structural_cache: StructuralCacheConfig,

    #[serde(default)]
    pub decision_cache: DecisionCacheConfig,

    #[serde(default)]
    pub worker_pool: WorkerPoolConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            preset: PresetName::Balanced,
            selector: SelectorConfig::default(),
            weights: WeightsConfig::default(),
            structural_cache: StructuralCacheConfig::default(),
            decision_cache: DecisionCacheConfig::default(),
            worker_pool: WorkerPoolConfig::default(),
            metrics: MetricsConfig::default(),
            retrieval: RetrievalConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// PresetName
// ---------------------------------------------------------------------------

/// Named presets that shift the balance between structural and semantic
/// retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresetName {
    #[default]
    Balanced,
    /// Lower structural threshold, stricter semantic floor.
    #[serde(rename = "structural-leaning")]
    StructuralLeaning,
    /// Higher structural threshold, looser semantic floor.
    #[serde(rename = "semantic-leaning")]
    SemanticLeaning,
}

impl PresetName {
    /// Parse from a loose string (case-insensitive, underscores accepted).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "balanced" | "default" => Some(Self::Balanced),
            "structural-leaning" | "structural_leaning" | "structural" => {
                Some(Self::StructuralLeaning)
            }
            "semantic-leaning" | "semantic_leaning" | "semantic" => Some(Self::SemanticLeaning),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Balanced => "balanced",
            Self::StructuralLeaning => "structural-leaning",
            Self::SemanticLeaning => "semantic-leaning",
        }
    }
}

impl std::fmt::Display for PresetName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// SelectorConfig
// ---------------------------------------------------------------------------

/// Decision rule parameters for the mode selector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Minimum structural fit for structural-only.
    #[serde(default = "default_structural_threshold")]
    pub structural_threshold: f64,

    /// Minimum semantic fit for semantic-only.
    #[serde(default = "default_semantic_quality_floor")]
    pub semantic_quality_floor: f64,

    /// Maximum score gap for which hybrid is chosen.
    #[serde(default = "default_hybrid_margin")]
    pub hybrid_margin: f64,

    /// When no rule fires: semantic-only if true, structural-only otherwise.
    #[serde(default = "default_true")]
    pub fallback_enabled: bool,

    #[serde(default = "default_true")]
    pub caching_enabled: bool,

    /// Skip scoring and always pick this mode (e.g. "structural").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_mode: Option<String>,

    /// Query text is truncated to this many characters in decision signatures.
    #[serde(default = "default_signature_chars")]
    pub signature_chars: usize,

    #[serde(default = "default_structural_extensions")]
    pub prefer_structural_extensions: Vec<String>,

    #[serde(default = "default_semantic_extensions")]
    pub prefer_semantic_extensions: Vec<String>,

    /// Files that earn the documentation bonus and the structural penalty.
    #[serde(default = "default_documentation_extensions")]
    pub documentation_extensions: Vec<String>,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            structural_threshold: default_structural_threshold(),
            semantic_quality_floor: default_semantic_quality_floor(),
            hybrid_margin: default_hybrid_margin(),
            fallback_enabled: true,
            caching_enabled: true,
            force_mode: None,
            signature_chars: default_signature_chars(),
            prefer_structural_extensions: default_structural_extensions(),
            prefer_semantic_extensions: default_semantic_extensions(),
            documentation_extensions: default_documentation_extensions(),
        }
    }
}

impl SelectorConfig {
    pub fn is_structural_extension(&self, ext: &str) -> bool {
        self.prefer_structural_extensions
            .iter()
            .any(|e| e.eq_ignore_ascii_case(ext))
    }

    pub fn is_semantic_extension(&self, ext: &str) -> bool {
        self.prefer_semantic_extensions
            .iter()
            .any(|e| e.eq_ignore_ascii_case(ext))
    }

    pub fn is_documentation_extension(&self, ext: &str) -> bool {
        self.documentation_extensions
            .iter()
            .any(|e| e.eq_ignore_ascii_case(ext))
    }
}

// ---------------------------------------------------------------------------
// Scoring weights
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightsConfig {
    #[serde(default)]
    pub structural: StructuralWeights,
    #[serde(default)]
    pub semantic: SemanticWeights,
}

/// Weights for the structural-fit score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuralWeights {
    pub extension: f64,
    pub query_type: f64,
    pub code_signals: f64,
    pub line_specific: f64,
    /// Subtracted when the target is a documentation file.
    pub documentation_penalty: f64,
}

impl Default for StructuralWeights {
    fn default() -> Self {
        Self {
            extension: 0.5,
            query_type: 0.2,
            code_signals: 0.2,
            line_specific: 0.15,
            documentation_penalty: 0.4,
        }
    }
}

/// Weights for the semantic-fit score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SemanticWeights {
    pub extension: f64,
    pub documentation: f64,
    pub prose: f64,
    pub scope: f64,
    pub query_type: f64,
}

impl Default for SemanticWeights {
    fn default() -> Self {
        Self {
            extension: 0.2,
            documentation: 0.15,
            prose: 0.35,
            scope: 0.25,
            query_type: 0.05,
        }
    }
}

// ---------------------------------------------------------------------------
// Caches
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuralCacheConfig {
    pub capacity: usize,
    pub ttl_secs: u64,
}

impl Default for StructuralCacheConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            ttl_secs: 30 * 60,
        }
    }
}

impl StructuralCacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionCacheConfig {
    pub capacity: usize,
    pub ttl_secs: u64,
}

impl Default for DecisionCacheConfig {
    fn default() -> Self {
        Self {
            capacity: 500,
            ttl_secs: 5 * 60,
        }
    }
}

impl DecisionCacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

// ---------------------------------------------------------------------------
// WorkerPoolConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerPoolConfig {
    pub workers: usize,
    pub queue_capacity: usize,
    /// How long `stop` waits for in-flight tasks before force-stopping.
    pub shutdown_timeout_ms: u64,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 256,
            shutdown_timeout_ms: 5_000,
        }
    }
}

impl WorkerPoolConfig {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

// ---------------------------------------------------------------------------
// MetricsConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Maximum number of recent errors kept in the snapshot.
    pub error_ring_capacity: usize,
    /// Weight of the previous value in exponential moving averages.
    pub smoothing: f64,
    pub report_interval_ms: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            error_ring_capacity: 100,
            smoothing: 0.9,
            report_interval_ms: 60_000,
        }
    }
}

impl MetricsConfig {
    pub fn report_interval(&self) -> Duration {
        Duration::from_millis(self.report_interval_ms)
    }
}

// ---------------------------------------------------------------------------
// RetrievalConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Budget for a whole query.
    pub query_timeout_ms: u64,
    /// Budget for each path of a hybrid query.
    pub path_timeout_ms: u64,
    pub default_limit: usize,
    /// Relevance bonus when both paths hit the same location.
    pub overlap_bonus: f64,
    /// Files larger than this are skipped by workspace analysis.
    pub max_file_bytes: u64,
    /// Directory names never descended into.
    pub exclude_dirs: Vec<String>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            query_timeout_ms: 30_000,
            path_timeout_ms: 10_000,
            default_limit: 20,
            overlap_bonus: 0.1,
            max_file_bytes: 1024 * 1024,
            exclude_dirs: ["vendor", "node_modules", "target", ".git"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl RetrievalConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn path_timeout(&self) -> Duration {
        Duration::from_millis(self.path_timeout_ms)
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_version() -> String {
    "1.0".to_string()
}

fn default_true() -> bool {
    true
}

fn default_structural_threshold() -> f64 {
    0.65
}

fn default_semantic_quality_floor() -> f64 {
    0.6
}

fn default_hybrid_margin() -> f64 {
    0.15
}

fn default_signature_chars() -> usize {
    64
}

/// Source extensions that favour structural analysis.
pub const STRUCTURAL_EXTENSIONS: &[&str] = &[
    ".go", ".rs", ".py", ".ts", ".tsx", ".js", ".jsx", ".java", ".kt", ".c", ".h", ".cpp",
    ".hpp", ".cs", ".rb", ".swift",
];

/// Documentation extensions; they drive the documentation penalty/bonus.
pub const DOCUMENTATION_EXTENSIONS: &[&str] = &[".md", ".markdown", ".rst", ".txt", ".adoc"];

/// Prose and data formats that embedding search handles better than an AST.
pub const SEMANTIC_EXTENSIONS: &[&str] = &[
    ".md", ".markdown", ".rst", ".txt", ".adoc", ".html", ".json", ".yaml", ".yml", ".toml",
    ".csv", ".ipynb",
];

fn default_structural_extensions() -> Vec<String> {
    STRUCTURAL_EXTENSIONS.iter().map(|s| s.to_string()).collect()
}

fn default_semantic_extensions() -> Vec<String> {
    SEMANTIC_EXTENSIONS.iter().map(|s| s.to_string()).collect()
}

fn default_documentation_extensions() -> Vec<String> {
    DOCUMENTATION_EXTENSIONS.iter().map(|s| s.to_string()).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
