//! Query-time retrieval over an [`EmbeddingIndex`].

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::config::RagConfig;
use crate::document::SearchResult;
use crate::error::Result;
use crate::index::EmbeddingIndex;

/// A source of context passages for a query.
///
/// The answer policy depends on this trait rather than on the index so it
/// can be exercised with fixed passages.
#[async_trait]
pub trait ContextRetriever: Send + Sync {
    /// Return the texts of the passages most relevant to `query`, best first.
    async fn retrieve(&self, query: &str) -> Result<Vec<String>>;
}

/// Top-k retrieval over a shared, read-only [`EmbeddingIndex`].
#[derive(Debug, Clone)]
pub struct Retriever {
    index: Arc<EmbeddingIndex>,
    top_k: usize,
    similarity_threshold: Option<f32>,
}

impl Retriever {
    /// Create a retriever using `top_k` and `similarity_threshold` from `config`.
    pub fn new(index: Arc<EmbeddingIndex>, config: &RagConfig) -> Self {
        Self { index, top_k: config.top_k, similarity_threshold: config.similarity_threshold }
    }

    /// The index this retriever reads.
    pub fn index(&self) -> &Arc<EmbeddingIndex> {
        &self.index
    }

    /// Default number of passages returned per query.
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Scored results for `query`, at most `k`, best first.
    ///
    /// Without a configured similarity threshold this is the index's top-k
    /// unchanged; with one, results scoring at or below it are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingError`](crate::RagError::EmbeddingError)
    /// if the query cannot be embedded.
    pub async fn retrieve_scored(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        let mut results = self.index.query(query, k).await?;
        if let Some(threshold) = self.similarity_threshold {
            results.retain(|r| r.score > threshold);
        }
        debug!(
            top_k = k,
            result_count = results.len(),
            best_score = results.first().map(|r| r.score),
            "retrieved context"
        );
        Ok(results)
    }

    /// Passage texts for `query`, at most `k`, best first.
    ///
    /// # Errors
    ///
    /// See [`retrieve_scored`](Retriever::retrieve_scored).
    pub async fn retrieve_k(&self, query: &str, k: usize) -> Result<Vec<String>> {
        Ok(self.retrieve_scored(query, k).await?.into_iter().map(|r| r.chunk.text).collect())
    }
}

#[async_trait]
impl ContextRetriever for Retriever {
    async fn retrieve(&self, query: &str) -> Result<Vec<String>> {
        self.retrieve_k(query, self.top_k).await
    }
}
