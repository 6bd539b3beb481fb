//! Structural analysis results.
//!
//! A [`StructuralResult`] is built once per file, shared behind an `Arc`, and
//! replaced wholesale when the file is re-analyzed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::MemoryFootprint;
use crate::types::Language;

/// An import or `use` declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportInfo {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Standard-library import for the file's language.
    pub is_std: bool,
    pub line: u32,
}

/// A function or method declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionInfo {
    pub name: String,
    /// Receiver or owning type for methods.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
    /// Declaration header up to the body, whitespace-collapsed.
    pub signature: String,
    pub start_line: u32,
    pub end_line: u32,
    pub complexity: u32,
    pub cognitive: u32,
    pub is_method: bool,
    pub exported: bool,
}

impl FunctionInfo {
    pub fn contains_line(&self, line: u32) -> bool {
        self.start_line <= line && line <= self.end_line
    }

    /// `Receiver.name` for methods, `name` otherwise.
    pub fn qualified_name(&self) -> String {
        match &self.receiver {
            Some(recv) => format!("{recv}.{}", self.name),
            None => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldInfo {
    pub name: String,
    pub type_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    Struct,
    Interface,
    Enum,
    Trait,
    Class,
    Alias,
}

impl TypeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Struct => "struct",
            Self::Interface => "interface",
            Self::Enum => "enum",
            Self::Trait => "trait",
            Self::Class => "class",
            Self::Alias => "alias",
        }
    }
}

/// A type declaration with its fields and the methods attached to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeInfo {
    pub name: String,
    pub kind: TypeKind,
    pub fields: Vec<FieldInfo>,
    /// Method names: interface/trait members, class methods, or methods
    /// declared on the type elsewhere in the same file.
    pub methods: Vec<String>,
    pub start_line: u32,
    pub end_line: u32,
    pub exported: bool,
}

impl TypeInfo {
    pub fn contains_line(&self, line: u32) -> bool {
        self.start_line <= line && line <= self.end_line
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    Import,
    Call,
    /// Go struct embedding.
    Embed,
    /// Rust `impl Trait for Type`.
    Implements,
    /// Python base class.
    Extends,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Import => "import",
            Self::Call => "call",
            Self::Embed => "embed",
            Self::Implements => "implements",
            Self::Extends => "extends",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub from: String,
    pub to: String,
    pub kind: EdgeKind,
}

/// File-level aggregates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplexityMetrics {
    /// 1 + every decision point in the file.
    pub cyclomatic: u32,
    pub lines: u32,
    pub functions: u32,
    pub types: u32,
}

/// Everything the analyzer knows about one source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuralResult {
    pub file_path: String,
    pub language: Language,
    /// Go package, Rust crate-relative module, or Python module name.
    pub package: String,
    pub imports: Vec<ImportInfo>,
    pub functions: Vec<FunctionInfo>,
    pub types: Vec<TypeInfo>,
    pub dependencies: Vec<DependencyEdge>,
    pub metrics: ComplexityMetrics,
    /// SHA-256 of the file contents, hex encoded.
    pub content_hash: String,
    pub analyzed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
}

impl StructuralResult {
    /// Innermost function whose line range contains `line`.
    pub fn function_at(&self, line: u32) -> Option<&FunctionInfo> {
        self.functions
            .iter()
            .filter(|f| f.contains_line(line))
            .min_by_key(|f| f.end_line - f.start_line)
    }

    /// Innermost type whose line range contains `line`.
    pub fn type_at(&self, line: u32) -> Option<&TypeInfo> {
        self.types
            .iter()
            .filter(|t| t.contains_line(line))
            .min_by_key(|t| t.end_line - t.start_line)
    }

    pub fn find_function(&self, name: &str) -> Option<&FunctionInfo> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn find_type(&self, name: &str) -> Option<&TypeInfo> {
        self.types.iter().find(|t| t.name == name)
    }

    /// Mean per-function cyclomatic complexity, 0 when there are none.
    pub fn average_function_complexity(&self) -> f64 {
        if self.functions.is_empty() {
            return 0.0;
        }
        let total: u32 = self.functions.iter().map(|f| f.complexity).sum();
        f64::from(total) / self.functions.len() as f64
    }
}

impl MemoryFootprint for StructuralResult {
    fn memory_estimate(&self) -> usize {
        let strings = self.file_path.len() + self.package.len() + self.content_hash.len();
        let imports: usize = self
            .imports
            .iter()
            .map(|i| i.path.len() + i.alias.as_ref().map_or(0, |a| a.len()) + 16)
            .sum();
        let functions: usize = self
            .functions
            .iter()
            .map(|f| f.name.len() + f.signature.len() + f.receiver.as_ref().map_or(0, |r| r.len()) + 32)
            .sum();
        let types: usize = self
            .types
            .iter()
            .map(|t| {
                t.name.len()
                    + t.fields.iter().map(|f| f.name.len() + f.type_name.len()).sum::<usize>()
                    + t.methods.iter().map(|m| m.len()).sum::<usize>()
                    + 32
            })
            .sum();
        let edges: usize = self
            .dependencies
            .iter()
            .map(|d| d.from.len() + d.to.len() + 8)
            .sum();
        std::mem::size_of::<Self>() + strings + imports + functions + types + edges
    }
}
