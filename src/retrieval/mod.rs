//! Query orchestration: structural search, result combination, and the
//! engine facade callers talk to.

pub mod combiner;
pub mod orchestrator;
pub mod structural_search;

pub use combiner::{CombinedResult, Location, ResultCombiner};
pub use orchestrator::{CacheReport, RetrievalOrchestrator, RetrievalResponse};
