//! Query-time retrieval with a fixed MMR policy.

use std::sync::Arc;

use tracing::{error, info};

use crate::config::RagConfig;
use crate::document::SearchResult;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

/// MMR search parameters applied to every query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalPolicy {
    /// Results returned per query.
    pub k: usize,
    /// Nearest-neighbour candidates considered before MMR selection.
    pub fetch_k: usize,
    /// Relevance/diversity trade-off.
    pub lambda: f32,
}

impl Default for RetrievalPolicy {
    fn default() -> Self {
        Self { k: 2, fetch_k: 5, lambda: 0.5 }
    }
}

impl From<&RagConfig> for RetrievalPolicy {
    fn from(config: &RagConfig) -> Self {
        Self { k: config.top_k, fetch_k: config.fetch_k, lambda: config.lambda }
    }
}

/// Embeds a query and runs an MMR search over one collection.
///
/// Stateless between queries.
#[derive(Clone)]
pub struct Retriever {
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    collection: String,
    policy: RetrievalPolicy,
}

impl Retriever {
    /// Create a retriever over `collection` that applies `policy` to every query.
    pub fn new(
        embedding_provider: Arc<dyn EmbeddingProvider>,
        vector_store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
        policy: RetrievalPolicy,
    ) -> Self {
        Self { embedding_provider, vector_store, collection: collection.into(), policy }
    }

    /// Return up to `k` chunks for `query`, in MMR selection order.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::PipelineError`] if the query cannot be embedded
    /// or the search fails.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<SearchResult>> {
        let embedding = self.embedding_provider.embed(query).await.map_err(|e| {
            error!(error = %e, "embedding failed during retrieval");
            RagError::PipelineError(format!("query embedding failed: {e}"))
        })?;

        let RetrievalPolicy { k, fetch_k, lambda } = self.policy;
        let results = self
            .vector_store
            .search_mmr(&self.collection, &embedding, k, fetch_k, lambda)
            .await
            .map_err(|e| {
                error!(collection = %self.collection, error = %e, "MMR search failed");
                RagError::PipelineError(format!(
                    "search failed in collection '{}': {e}",
                    self.collection
                ))
            })?;

        info!(collection = %self.collection, result_count = results.len(), "retrieved chunks");
        Ok(results)
    }
}
