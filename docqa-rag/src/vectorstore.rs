//! Vector store trait for storing and searching vector embeddings.

use async_trait::async_trait;

use crate::document::{Chunk, SearchResult};
use crate::error::Result;
use crate::mmr;

/// Outcome of opening a named collection.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectionStatus {
    /// The collection exists and holds `count` chunks.
    Opened {
        /// Number of stored chunks.
        count: usize,
    },
    /// No collection with that name exists yet.
    NotFound,
    /// The collection exists but could not be read back.
    Corrupt(String),
}

/// A storage backend for vector embeddings with similarity search.
///
/// Implementations manage named collections of [`Chunk`]s and support
/// upserting, counting, and searching by vector similarity. Chunk IDs are
/// the upsert key, so storing the same chunks twice does not duplicate them.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{PersistentVectorStore, VectorStore};
///
/// let store = PersistentVectorStore::open("./rag_chroma_db")?;
/// store.create_collection("docs", 384).await?;
/// store.upsert("docs", &chunks).await?;
/// let results = store.search_mmr("docs", &query_embedding, 2, 5, 0.5).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create a named collection. No-op if it already exists.
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()>;

    /// Open a named collection, reporting whether it exists and is readable.
    async fn open_collection(&self, name: &str) -> CollectionStatus;

    /// Delete a named collection and all its data.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Upsert chunks into a collection. Chunks must have embeddings set.
    async fn upsert(&self, collection: &str, chunks: &[Chunk]) -> Result<()>;

    /// Number of chunks stored in a collection.
    async fn count(&self, collection: &str) -> Result<usize>;

    /// Number of chunks in a collection whose `source` metadata equals `source`.
    async fn count_source(&self, collection: &str, source: &str) -> Result<usize>;

    /// Search for the `top_k` most similar chunks to the given embedding.
    ///
    /// Returns results ordered by descending similarity score; equal scores
    /// keep insertion order.
    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>>;

    /// Search with maximal marginal relevance.
    ///
    /// Fetches the `fetch_k` nearest neighbours, then greedily selects up to
    /// `k` of them, trading relevance against redundancy with `lambda`
    /// (see [`mmr::rerank`]). Never returns more than `min(k, fetch_k)` results.
    async fn search_mmr(
        &self,
        collection: &str,
        embedding: &[f32],
        k: usize,
        fetch_k: usize,
        lambda: f32,
    ) -> Result<Vec<SearchResult>> {
        let candidates = self.search(collection, embedding, fetch_k).await?;
        Ok(mmr::rerank(candidates, k, lambda))
    }

    /// Write any pending state to durable storage.
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Whether `name` can be used as a collection name (`[a-z0-9_-]+`).
pub fn is_valid_collection_name(name: &str) -> bool {
    !name.is_empty()
        && name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
