//! Core domain types shared across the analyzer, selector, and orchestrator.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{HybridError, Result};

// ---------------------------------------------------------------------------
// Language
// ---------------------------------------------------------------------------

/// Source languages the structural analyzer can parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Go,
    Rust,
    Python,
}

impl Language {
    /// Map a file extension (including the dot) to a language.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            ".go" => Some(Self::Go),
            ".rs" => Some(Self::Rust),
            ".py" | ".pyi" => Some(Self::Python),
            _ => None,
        }
    }

    /// Detect the language of a path from its extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|e| Self::from_extension(&format!(".{e}")))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Go => "go",
            Self::Rust => "rust",
            Self::Python => "python",
        }
    }

    /// Parse from a string (case-insensitive).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "go" | "golang" => Some(Self::Go),
            "rust" | "rs" => Some(Self::Rust),
            "python" | "py" => Some(Self::Python),
            _ => None,
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// QueryType
// ---------------------------------------------------------------------------

/// What kind of lookup the caller is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    /// No declared intent; the selector relies on the text and file alone.
    #[default]
    General,
    DeclarationLookup,
    DependencyAnalysis,
    ReferenceLookup,
    SemanticLookup,
    Documentation,
    /// Caller expects both structural and semantic evidence.
    Mixed,
}

impl QueryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::DeclarationLookup => "declaration_lookup",
            Self::DependencyAnalysis => "dependency_analysis",
            Self::ReferenceLookup => "reference_lookup",
            Self::SemanticLookup => "semantic_lookup",
            Self::Documentation => "documentation",
            Self::Mixed => "mixed",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "" | "general" => Some(Self::General),
            "declaration_lookup" | "declaration" | "definition" => Some(Self::DeclarationLookup),
            "dependency_analysis" | "dependency" | "dependencies" => {
                Some(Self::DependencyAnalysis)
            }
            "reference_lookup" | "reference" | "references" => Some(Self::ReferenceLookup),
            "semantic_lookup" | "semantic" => Some(Self::SemanticLookup),
            "documentation" | "docs" => Some(Self::Documentation),
            "mixed" | "hybrid" => Some(Self::Mixed),
            _ => None,
        }
    }

    /// Query types that structural analysis answers precisely.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::DeclarationLookup | Self::DependencyAnalysis | Self::ReferenceLookup
        )
    }

    /// Query types that favour embedding similarity.
    pub fn is_semantic(&self) -> bool {
        matches!(self, Self::SemanticLookup | Self::Documentation)
    }
}

impl std::fmt::Display for QueryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Scope
// ---------------------------------------------------------------------------

/// How much of the codebase a query ranges over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[default]
    File,
    Package,
    Workspace,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Package => "package",
            Self::Workspace => "workspace",
        }
    }

    /// Breadth in [0,1]: file-local is narrow, workspace-wide is broad.
    pub fn breadth(&self) -> f64 {
        match self {
            Self::File => 0.0,
            Self::Package => 0.5,
            Self::Workspace => 1.0,
        }
    }
}

// ---------------------------------------------------------------------------
// QueryFilters
// ---------------------------------------------------------------------------

/// Optional result filters attached to a query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryFilters {
    /// Allowed file extensions (with the dot). Empty means no restriction.
    #[serde(default)]
    pub extensions: Vec<String>,
    /// Path substrings to exclude.
    #[serde(default)]
    pub exclude_paths: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_relevance: Option<f64>,
    /// Maximum age of the underlying source, in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_age_secs: Option<u64>,
}

impl QueryFilters {
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
            && self.exclude_paths.is_empty()
            && self.min_relevance.is_none()
            && self.max_age_secs.is_none()
    }

    /// Whether `path` passes the extension and exclusion filters.
    pub fn allows_path(&self, path: &str) -> bool {
        if self.exclude_paths.iter().any(|p| path.contains(p.as_str())) {
            return false;
        }
        if self.extensions.is_empty() {
            return true;
        }
        let ext = extension_of(path);
        self.extensions
            .iter()
            .any(|allowed| ext.as_deref() == Some(allowed.to_lowercase().as_str()))
    }
}

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

/// Default number of results returned when the caller does not set a limit.
pub const DEFAULT_LIMIT: usize = 20;

/// A request for code context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    /// 1-based line number. Only meaningful together with `file_path`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default)]
    pub query_type: QueryType,
    #[serde(default)]
    pub scope: Scope,
    #[serde(default)]
    pub filters: QueryFilters,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            file_path: None,
            line: None,
            query_type: QueryType::General,
            scope: Scope::File,
            filters: QueryFilters::default(),
            limit: DEFAULT_LIMIT,
        }
    }

    pub fn with_file(mut self, path: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn at_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_type(mut self, query_type: QueryType) -> Self {
        self.query_type = query_type;
        self
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_filters(mut self, filters: QueryFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// `limit`, or `default` when the caller asked for 0.
    pub fn effective_limit(&self, default: usize) -> usize {
        if self.limit == 0 {
            default.max(1)
        } else {
            self.limit
        }
    }

    /// Lowercased extension of the target file, including the dot.
    pub fn extension(&self) -> Option<String> {
        self.file_path.as_deref().and_then(extension_of)
    }

    /// Check the query invariants: a line number requires a file path, and
    /// the line is 1-based.
    pub fn validate(&self) -> Result<()> {
        match (self.line, self.file_path.as_deref()) {
            (Some(_), None) => Err(HybridError::InvalidQuery(
                "a line number requires a file path".into(),
            )),
            (Some(0), Some(_)) => Err(HybridError::InvalidQuery(
                "line numbers are 1-based".into(),
            )),
            (_, Some(p)) if p.trim().is_empty() => {
                Err(HybridError::InvalidQuery("file path is empty".into()))
            }
            _ => Ok(()),
        }
    }
}

/// Lowercased extension of `path` including the leading dot.
pub fn extension_of(path: &str) -> Option<String> {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
}

// ---------------------------------------------------------------------------
// RetrievalMode
// ---------------------------------------------------------------------------

/// How a query is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
    StructuralOnly,
    SemanticOnly,
    /// Both paths run; structural results win ties.
    HybridStructuralFirst,
    /// Both paths run; semantic results win ties.
    HybridSemanticFirst,
}

impl RetrievalMode {
    pub const ALL: [RetrievalMode; 4] = [
        Self::StructuralOnly,
        Self::SemanticOnly,
        Self::HybridStructuralFirst,
        Self::HybridSemanticFirst,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StructuralOnly => "structural",
            Self::SemanticOnly => "semantic",
            Self::HybridStructuralFirst => "hybrid_structural_first",
            Self::HybridSemanticFirst => "hybrid_semantic_first",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "structural" | "structural_only" | "ast" => Some(Self::StructuralOnly),
            "semantic" | "semantic_only" | "vector" => Some(Self::SemanticOnly),
            "hybrid" | "hybrid_structural_first" | "structural_first" => {
                Some(Self::HybridStructuralFirst)
            }
            "hybrid_semantic_first" | "semantic_first" => Some(Self::HybridSemanticFirst),
            _ => None,
        }
    }

    pub fn is_hybrid(&self) -> bool {
        matches!(self, Self::HybridStructuralFirst | Self::HybridSemanticFirst)
    }

    pub fn uses_structural(&self) -> bool {
        !matches!(self, Self::SemanticOnly)
    }

    pub fn uses_semantic(&self) -> bool {
        !matches!(self, Self::StructuralOnly)
    }

    /// Source priority for tie-breaking; lower ranks first.
    pub fn source_priority(&self, source: ResultSource) -> u8 {
        match (self, source) {
            (_, ResultSource::Combined) => 0,
            (Self::StructuralOnly | Self::HybridStructuralFirst, ResultSource::Structural) => 1,
            (Self::StructuralOnly | Self::HybridStructuralFirst, ResultSource::Semantic) => 2,
            (Self::SemanticOnly | Self::HybridSemanticFirst, ResultSource::Semantic) => 1,
            (Self::SemanticOnly | Self::HybridSemanticFirst, ResultSource::Structural) => 2,
        }
    }
}

impl std::fmt::Display for RetrievalMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ResultSource
// ---------------------------------------------------------------------------

/// Which path produced a ranked result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultSource {
    Structural,
    Semantic,
    /// The same location was found by both paths.
    Combined,
}

impl ResultSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Structural => "structural",
            Self::Semantic => "semantic",
            Self::Combined => "combined",
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
