//! Crate-wide error type.
//!
//! Request-level failures (cancellation, timeouts, missing startup) and
//! component-local failures (a single unparseable file) share one enum so
//! callers can match on the kind without downcasting.

use std::time::Duration;

use thiserror::Error;

/// Errors produced by the retrieval engine.
#[derive(Debug, Error)]
pub enum HybridError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unsupported language for file: {0}")]
    UnsupportedLanguage(String),

    /// An operation ran before the owning component was started.
    #[error("Not initialized: {0}")]
    NotInitialized(String),

    #[error("Worker pool is not started")]
    NotStarted,

    /// Non-blocking back-pressure from the worker pool. The caller decides
    /// whether to retry or drop the task.
    #[error("Worker pool queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Semantic search failed: {0}")]
    Semantic(String),

    #[error("Task failed: {0}")]
    Task(String),

    #[error("{0}")]
    Other(String),
}

impl HybridError {
    /// Short label used when recording the error in metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Parse(_) => "parse",
            Self::UnsupportedLanguage(_) => "unsupported_language",
            Self::NotInitialized(_) => "not_initialized",
            Self::NotStarted => "not_started",
            Self::QueueFull { .. } => "queue_full",
            Self::Timeout(_) => "timeout",
            Self::Cancelled => "cancelled",
            Self::InvalidQuery(_) => "invalid_query",
            Self::Config(_) => "config",
            Self::Semantic(_) => "semantic",
            Self::Task(_) => "task",
            Self::Other(_) => "other",
        }
    }
}

pub type Result<T> = std::result::Result<T, HybridError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_full_message_includes_capacity() {
        let err = HybridError::QueueFull { capacity: 8 };
        assert_eq!(err.to_string(), "Worker pool queue is full (capacity 8)");
        assert_eq!(err.kind(), "queue_full");
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: HybridError = io.into();
        assert!(matches!(err, HybridError::Io(_)));
        assert!(err.to_string().contains("gone"));
    }
}
