//! RAG pipeline orchestrator.
//!
//! The [`RagPipeline`] is the application context: it owns the
//! [`EmbeddingProvider`], [`VectorStore`], [`Chunker`] and
//! [`AnswerGenerator`] and runs both halves of the workflow, index building
//! (chunk → embed → store) and question answering (retrieve → generate).
//!
//! # Example
//!
//! ```rust,ignore
//! use docqa_rag::{RagPipeline, RagConfig, PersistentVectorStore, GeminiLlm};
//!
//! let config = RagConfig::default();
//! let pipeline = RagPipeline::builder()
//!     .vector_store(Arc::new(PersistentVectorStore::open(&config.persist_dir)?))
//!     .config(config)
//!     .embedding_provider(Arc::new(embedder))
//!     .llm(Arc::new(GeminiLlm::from_env()?))
//!     .build()?;
//!
//! pipeline.index_documents("fake_data", &documents).await?;
//! let answer = pipeline.ask("fake_data", "What is Streamlit?").await?;
//! pipeline.close().await?;
//! ```

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::chunking::{Chunker, RecursiveChunker};
use crate::config::RagConfig;
use crate::document::{Chunk, Document, SearchResult};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generator::AnswerGenerator;
use crate::llm::LlmProvider;
use crate::retriever::{RetrievalPolicy, Retriever};
use crate::vectorstore::{CollectionStatus, VectorStore};

/// Summary of an [`index_documents`](RagPipeline::index_documents) run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexReport {
    /// Whether the collection had to be created.
    pub created: bool,
    /// Sources that were chunked, embedded and stored.
    pub ingested_sources: Vec<String>,
    /// Sources that already had chunks in the collection.
    pub skipped_sources: Vec<String>,
    /// Chunks written during this run.
    pub chunks_added: usize,
    /// Chunks in the collection afterwards.
    pub total_chunks: usize,
}

/// The answer to one question together with the context it was drawn from.
#[derive(Debug, Clone)]
pub struct Answer {
    /// Retrieved chunks, in MMR selection order.
    pub results: Vec<SearchResult>,
    /// The model's reply, unmodified.
    pub text: String,
}

/// The RAG pipeline orchestrator.
///
/// Built once via [`RagPipeline::builder()`] and passed by reference to
/// whatever drives it (the interactive loop, tests). Call
/// [`close`](RagPipeline::close) before exiting so pending store state is
/// written.
pub struct RagPipeline {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    chunker: Arc<dyn Chunker>,
    generator: AnswerGenerator,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the embedding provider.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    /// Return a reference to the vector store.
    pub fn vector_store(&self) -> &Arc<dyn VectorStore> {
        &self.vector_store
    }

    /// Create a named collection in the vector store.
    ///
    /// The collection is created with the dimensionality reported by the
    /// configured [`EmbeddingProvider`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::PipelineError`] if the vector store operation fails.
    pub async fn create_collection(&self, name: &str) -> Result<()> {
        let dimensions = self.embedding_provider.dimensions();
        self.vector_store.create_collection(name, dimensions).await.map_err(|e| {
            error!(collection = name, error = %e, "failed to create collection");
            RagError::PipelineError(format!("failed to create collection '{name}': {e}"))
        })
    }

    /// Delete a named collection from the vector store.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::PipelineError`] if the vector store operation fails.
    pub async fn delete_collection(&self, name: &str) -> Result<()> {
        self.vector_store.delete_collection(name).await.map_err(|e| {
            error!(collection = name, error = %e, "failed to delete collection");
            RagError::PipelineError(format!("failed to delete collection '{name}': {e}"))
        })
    }

    /// Make sure every document's source is stored in `collection`.
    ///
    /// Opens the collection first:
    /// - `NotFound`: the collection is created and every document ingested.
    /// - `Opened`: only documents whose source has no stored chunks yet are
    ///   ingested; the rest are skipped.
    /// - `Corrupt`: nothing is touched and
    ///   [`RagError::CorruptCollection`] is returned.
    ///
    /// Documents without a `source` entry are grouped by their ID. Every
    /// document of a source is chunked and embedded before anything is
    /// written, and the source's chunks go to the store in one upsert, so a
    /// failure part way through leaves the source absent rather than partial.
    pub async fn index_documents(
        &self,
        collection: &str,
        documents: &[Document],
    ) -> Result<IndexReport> {
        let mut report = IndexReport::default();

        match self.vector_store.open_collection(collection).await {
            CollectionStatus::NotFound => {
                self.create_collection(collection).await?;
                report.created = true;
            }
            CollectionStatus::Opened { count } => {
                info!(collection, count, "opened existing collection");
            }
            CollectionStatus::Corrupt(message) => {
                error!(collection, %message, "refusing to index into a corrupt collection");
                return Err(RagError::CorruptCollection {
                    collection: collection.to_string(),
                    message,
                });
            }
        }

        let mut sources: Vec<(&str, Vec<&Document>)> = Vec::new();
        for document in documents {
            let source = document.source().unwrap_or(document.id.as_str());
            match sources.iter_mut().find(|(s, _)| *s == source) {
                Some((_, group)) => group.push(document),
                None => sources.push((source, vec![document])),
            }
        }

        for (source, group) in sources {
            let stored = self.vector_store.count_source(collection, source).await.map_err(|e| {
                error!(collection, source, error = %e, "failed to count stored chunks");
                RagError::PipelineError(format!("failed to inspect collection '{collection}': {e}"))
            })?;
            if stored > 0 {
                info!(collection, source, stored, "source already indexed, skipping");
                report.skipped_sources.push(source.to_string());
                continue;
            }

            let mut chunks = Vec::new();
            for document in group {
                chunks.extend(self.embed_document(document).await?);
            }
            self.store_chunks(collection, source, &chunks).await?;
            info!(collection, source, chunk_count = chunks.len(), "ingested source");
            report.chunks_added += chunks.len();
            report.ingested_sources.push(source.to_string());
        }

        self.vector_store.flush().await?;
        report.total_chunks = self.vector_store.count(collection).await?;

        info!(
            collection,
            created = report.created,
            chunks_added = report.chunks_added,
            total_chunks = report.total_chunks,
            "collection ready"
        );
        Ok(report)
    }

    /// Drop `collection` and index `documents` into a fresh copy.
    ///
    /// This is the way out of a [`RagError::CorruptCollection`].
    pub async fn rebuild_collection(
        &self,
        collection: &str,
        documents: &[Document],
    ) -> Result<IndexReport> {
        warn!(collection, "rebuilding collection from scratch");
        self.delete_collection(collection).await?;
        self.index_documents(collection, documents).await
    }

    /// Chunk `document` and attach an embedding to every chunk.
    ///
    /// Nothing is written to the vector store.
    async fn embed_document(&self, document: &Document) -> Result<Vec<Chunk>> {
        let mut chunks = self.chunker.chunk(document);
        if chunks.is_empty() {
            return Ok(chunks);
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings = self.embedding_provider.embed_batch(&texts).await.map_err(|e| {
            error!(document.id = %document.id, error = %e, "embedding failed during ingestion");
            RagError::PipelineError(format!("embedding failed for document '{}': {e}", document.id))
        })?;

        if embeddings.len() != chunks.len() {
            return Err(RagError::PipelineError(format!(
                "embedding provider returned {} vectors for {} chunks of document '{}'",
                embeddings.len(),
                chunks.len(),
                document.id
            )));
        }
        for (chunk, embedding) in chunks.iter_mut().zip(embeddings) {
            chunk.embedding = embedding;
        }
        Ok(chunks)
    }

    /// Write `chunks` in a single upsert so a source is stored whole or not at all.
    async fn store_chunks(&self, collection: &str, label: &str, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        self.vector_store.upsert(collection, chunks).await.map_err(|e| {
            error!(collection, source = label, error = %e, "upsert failed during ingestion");
            RagError::PipelineError(format!("upsert failed for '{label}': {e}"))
        })
    }

    /// A [`Retriever`] over `collection` using the configured MMR policy.
    pub fn retriever(&self, collection: &str) -> Retriever {
        Retriever::new(
            self.embedding_provider.clone(),
            self.vector_store.clone(),
            collection,
            RetrievalPolicy::from(&self.config),
        )
    }

    /// Answer `question` from the chunks stored in `collection`.
    ///
    /// An empty retrieval still reaches the model, with an empty context.
    pub async fn ask(&self, collection: &str, question: &str) -> Result<Answer> {
        let results = self.retriever(collection).retrieve(question).await?;
        if results.is_empty() {
            warn!(collection, "no chunks retrieved, answering with empty context");
        }
        let text = self.generator.generate(question, &results).await?;
        Ok(Answer { results, text })
    }

    /// Flush pending vector store state.
    pub async fn close(&self) -> Result<()> {
        self.vector_store.flush().await.map_err(|e| {
            error!(error = %e, "failed to flush vector store");
            e
        })
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// `embedding_provider`, `vector_store` and `llm` are required. Without a
/// `config` the defaults are used; without a `chunker` a
/// [`RecursiveChunker`] is built from the config.
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = RagPipeline::builder()
///     .config(RagConfig::default())
///     .embedding_provider(Arc::new(embedder))
///     .vector_store(Arc::new(store))
///     .llm(Arc::new(llm))
///     .build()?;
/// ```
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    chunker: Option<Arc<dyn Chunker>>,
    llm: Option<Arc<dyn LlmProvider>>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector store backend.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Override the document chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set the language model that writes answers.
    pub fn llm(mut self, llm: Arc<dyn LlmProvider>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Build the [`RagPipeline`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if any required field is missing.
    pub fn build(self) -> Result<RagPipeline> {
        let config = self.config.unwrap_or_default();
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| RagError::ConfigError("vector_store is required".to_string()))?;
        let llm = self.llm.ok_or_else(|| RagError::ConfigError("llm is required".to_string()))?;
        let chunker = self
            .chunker
            .unwrap_or_else(|| Arc::new(RecursiveChunker::from_config(&config)));

        Ok(RagPipeline {
            config,
            embedding_provider,
            vector_store,
            chunker,
            generator: AnswerGenerator::new(llm),
        })
    }
}
