//! Structural analysis: parsing, declaration extraction, complexity.

pub mod analyzer;
pub mod complexity;
pub mod extractor;
pub mod model;
pub mod parser;
pub mod source;

pub use analyzer::{
    analyze_source, ContextScope, FileFailure, StructuralAnalyzer, StructuralContext,
    WorkspaceAnalysis, WorkspaceTotals,
};
pub use model::{
    ComplexityMetrics, DependencyEdge, EdgeKind, FieldInfo, FunctionInfo, ImportInfo,
    StructuralResult, TypeInfo, TypeKind,
};
pub use parser::CodeParser;
pub use source::{FsSource, ListOptions, MemorySource, SourceReader};
