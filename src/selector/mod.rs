//! Mode selection: which retrieval path answers a query.

pub mod decision;
pub mod engine;
pub mod features;
pub mod scoring;

pub use decision::ModeDecision;
pub use engine::ModeSelector;
pub use features::QueryFeatures;
pub use scoring::{semantic_fit, structural_fit, FitScore};
