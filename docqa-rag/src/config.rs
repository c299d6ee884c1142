//! Configuration for the RAG pipeline.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Default directory holding persisted collections.
pub const DEFAULT_PERSIST_DIR: &str = "./rag_chroma_db";

/// Separators tried by the recursive chunker, in priority order.
pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Configuration parameters for the RAG pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Split separators in priority order; `""` splits between characters.
    pub separators: Vec<String>,
    /// Number of results returned per query.
    pub top_k: usize,
    /// Size of the nearest-neighbour candidate pool handed to MMR.
    pub fetch_k: usize,
    /// MMR trade-off: 1.0 is pure relevance, 0.0 is pure diversity.
    pub lambda: f32,
    /// Directory where collections are persisted.
    pub persist_dir: PathBuf,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 750,
            chunk_overlap: 80,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
            top_k: 2,
            fetch_k: 5,
            lambda: 0.5,
            persist_dir: PathBuf::from(DEFAULT_PERSIST_DIR),
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Replace the separator priority list.
    pub fn separators<I, S>(mut self, separators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.separators = separators.into_iter().map(Into::into).collect();
        self
    }

    /// Set the number of results returned per query.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the MMR candidate pool size.
    pub fn fetch_k(mut self, fetch_k: usize) -> Self {
        self.config.fetch_k = fetch_k;
        self
    }

    /// Set the MMR relevance/diversity trade-off.
    pub fn lambda(mut self, lambda: f32) -> Self {
        self.config.lambda = lambda;
        self
    }

    /// Set the directory where collections are persisted.
    pub fn persist_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.persist_dir = dir.into();
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `chunk_size == 0` or `chunk_overlap >= chunk_size`
    /// - `separators` is empty
    /// - `top_k == 0` or `fetch_k < top_k`
    /// - `lambda` is outside `[0.0, 1.0]`
    pub fn build(self) -> Result<RagConfig> {
        let config = self.config;
        if config.chunk_size == 0 {
            return Err(RagError::ConfigError("chunk_size must be greater than zero".to_string()));
        }
        if config.chunk_overlap >= config.chunk_size {
            return Err(RagError::ConfigError(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                config.chunk_overlap, config.chunk_size
            )));
        }
        if config.separators.is_empty() {
            return Err(RagError::ConfigError("at least one separator is required".to_string()));
        }
        if config.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        if config.fetch_k < config.top_k {
            return Err(RagError::ConfigError(format!(
                "fetch_k ({}) must be at least top_k ({})",
                config.fetch_k, config.top_k
            )));
        }
        if !(0.0..=1.0).contains(&config.lambda) {
            return Err(RagError::ConfigError(format!(
                "lambda ({}) must be within [0.0, 1.0]",
                config.lambda
            )));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_demo_pipeline() {
        let config = RagConfig::builder().build().unwrap();
        assert_eq!(config.chunk_size, 750);
        assert_eq!(config.chunk_overlap, 80);
        assert_eq!(config.separators, vec!["\n\n", "\n", " ", ""]);
        assert_eq!((config.top_k, config.fetch_k), (2, 5));
        assert_eq!(config.persist_dir, PathBuf::from(DEFAULT_PERSIST_DIR));
    }

    #[test]
    fn rejects_overlap_not_smaller_than_size() {
        let err = RagConfig::builder().chunk_size(100).chunk_overlap(100).build().unwrap_err();
        assert!(matches!(err, RagError::ConfigError(_)));
    }

    #[test]
    fn rejects_candidate_pool_smaller_than_k() {
        assert!(RagConfig::builder().top_k(4).fetch_k(3).build().is_err());
        assert!(RagConfig::builder().top_k(0).build().is_err());
    }

    #[test]
    fn rejects_lambda_out_of_range() {
        assert!(RagConfig::builder().lambda(1.5).build().is_err());
        assert!(RagConfig::builder().lambda(-0.1).build().is_err());
        assert!(RagConfig::builder().lambda(0.0).build().is_ok());
    }

    #[test]
    fn rejects_empty_separator_list() {
        let empty: [&str; 0] = [];
        assert!(RagConfig::builder().separators(empty).build().is_err());
    }
}
