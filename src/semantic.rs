//! Semantic search collaborators.
//!
//! The engine only depends on two capabilities: turning text into a vector
//! and finding the nearest stored documents. Concrete providers live
//! outside this crate.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{HybridError, Result};
use crate::types::{Query, QueryFilters, DEFAULT_LIMIT};

/// Metadata keys read from hits to place them in a file.
pub const META_FILE_PATH: &str = "file_path";
pub const META_START_LINE: &str = "start_line";
pub const META_END_LINE: &str = "end_line";

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}

#[async_trait]
pub trait VectorSearch: Send + Sync {
    async fn search(
        &self,
        vector: &[f32],
        limit: usize,
        filters: &QueryFilters,
    ) -> Result<Vec<SemanticHit>>;
}

/// One ranked document from the vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticHit {
    pub document_id: String,
    pub content: String,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    /// Similarity, higher is better. Usually in [0, 1].
    pub score: f64,
}

impl SemanticHit {
    pub fn file_path(&self) -> Option<&str> {
        self.metadata.get(META_FILE_PATH).and_then(|v| v.as_str())
    }

    fn line(&self, key: &str) -> Option<u32> {
        self.metadata
            .get(key)
            .and_then(|v| v.as_u64())
            .and_then(|n| u32::try_from(n).ok())
    }

    pub fn start_line(&self) -> Option<u32> {
        self.line(META_START_LINE)
    }

    pub fn end_line(&self) -> Option<u32> {
        self.line(META_END_LINE).or_else(|| self.start_line())
    }
}

/// An embedding provider paired with the index it feeds.
#[derive(Clone)]
pub struct SemanticSearch {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorSearch>,
}

impl SemanticSearch {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, index: Arc<dyn VectorSearch>) -> Self {
        Self { embedder, index }
    }

    /// Embed the query text and fetch up to `query.limit` hits, or
    /// [`DEFAULT_LIMIT`] when the limit is 0.
    pub async fn search(&self, query: &Query) -> Result<Vec<SemanticHit>> {
        if query.text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let vector = self.embedder.embed(&query.text).await?;
        if vector.is_empty() {
            return Err(HybridError::Semantic("embedding provider returned an empty vector".into()));
        }
        let limit = query.effective_limit(DEFAULT_LIMIT);
        self.index.search(&vector, limit, &query.filters).await
    }
}
