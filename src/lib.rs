//! Hybrid code-context retrieval.
//!
//! Decides per query whether structural analysis (tree-sitter parsing of the
//! source), semantic vector search, or both should answer it, runs the chosen
//! paths, and merges their results into one ranked list.

pub mod analysis;
pub mod background;
pub mod cache;
pub mod config;
pub mod error;
pub mod metrics;
pub mod observability;
pub mod pool;
pub mod retrieval;
pub mod selector;
pub mod semantic;
pub mod types;
