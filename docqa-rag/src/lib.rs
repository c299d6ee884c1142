//! Retrieval-augmented question answering over a single document.
//!
//! This crate provides:
//! - Text and per-page PDF loading
//! - Recursive character chunking with overlap
//! - Hugging Face and Ollama embedding providers
//! - A disk-persisted vector store with MMR search
//! - Grounded answer generation through Gemini
//! - [`RagPipeline`], which ties the pieces together

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod gemini;
pub mod generator;
pub mod huggingface;
pub mod llm;
pub mod loader;
pub mod mmr;
pub mod ollama;
pub mod persistent;
pub mod pipeline;
pub mod retriever;
pub mod vectorstore;

pub use chunking::{Chunker, RecursiveChunker, TextSpan};
pub use config::{DEFAULT_PERSIST_DIR, DEFAULT_SEPARATORS, RagConfig, RagConfigBuilder};
pub use document::{Chunk, Document, PAGE_KEY, SOURCE_KEY, SearchResult};
pub use embedding::{EmbeddingProvider, normalize};
pub use error::{RagError, Result};
pub use gemini::GeminiLlm;
pub use generator::{AnswerGenerator, PROMPT_TEMPLATE, REFUSAL};
pub use huggingface::HuggingFaceEmbeddingProvider;
pub use llm::LlmProvider;
pub use loader::{DocumentKind, DocumentLoader, collection_name_for};
pub use ollama::OllamaEmbeddingProvider;
pub use persistent::PersistentVectorStore;
pub use pipeline::{Answer, IndexReport, RagPipeline, RagPipelineBuilder};
pub use retriever::{RetrievalPolicy, Retriever};
pub use vectorstore::{CollectionStatus, VectorStore, cosine_similarity};
