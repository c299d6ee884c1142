//! Hugging Face embedding provider using the hosted feature-extraction pipeline.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::{EmbeddingProvider, finish_vectors};
use crate::error::{RagError, Result};

/// The default Hugging Face inference base URL.
const HF_INFERENCE_URL: &str = "https://router.huggingface.co/hf-inference/models";

/// The default sentence-transformers model.
pub const DEFAULT_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// The dimensionality of `all-MiniLM-L6-v2`.
const DEFAULT_DIMENSIONS: usize = 384;

/// Texts sent per feature-extraction request.
pub const MAX_BATCH_SIZE: usize = 32;

/// An [`EmbeddingProvider`] backed by the Hugging Face inference API.
///
/// Calls the `feature-extraction` pipeline of a sentence-transformers model
/// and L2-normalizes the returned vectors. Batches larger than
/// [`MAX_BATCH_SIZE`] are split across several requests.
///
/// # Configuration
///
/// - `model` – defaults to `sentence-transformers/all-MiniLM-L6-v2`.
/// - `dimensions` – must match the model (384 for MiniLM).
/// - `api_key` – from the constructor or the `HF_TOKEN` /
///   `HUGGINGFACEHUB_API_TOKEN` environment variables.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::huggingface::HuggingFaceEmbeddingProvider;
///
/// let provider = HuggingFaceEmbeddingProvider::from_env()?;
/// let embedding = provider.embed("hello world").await?;
/// ```
pub struct HuggingFaceEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dimensions: usize,
}

impl HuggingFaceEmbeddingProvider {
    /// Create a new provider with the given API token.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(RagError::EmbeddingError {
                provider: "HuggingFace".into(),
                message: "API token must not be empty".into(),
            });
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: HF_INFERENCE_URL.into(),
            model: DEFAULT_MODEL.into(),
            dimensions: DEFAULT_DIMENSIONS,
        })
    }

    /// Create a new provider using `HF_TOKEN` or `HUGGINGFACEHUB_API_TOKEN`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("HF_TOKEN")
            .or_else(|_| std::env::var("HUGGINGFACEHUB_API_TOKEN"))
            .map_err(|_| RagError::EmbeddingError {
                provider: "HuggingFace".into(),
                message: "HF_TOKEN or HUGGINGFACEHUB_API_TOKEN environment variable not set"
                    .into(),
            })?;
        Self::new(api_key)
    }

    /// Set the model name and its embedding dimensionality.
    pub fn with_model(mut self, model: impl Into<String>, dimensions: usize) -> Self {
        self.model = model.into();
        self.dimensions = dimensions;
        self
    }

    /// Point the provider at a different inference host (e.g. a dedicated endpoint).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/{}/pipeline/feature-extraction",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    /// One feature-extraction request for at most [`MAX_BATCH_SIZE`] texts.
    async fn request(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&FeatureExtractionRequest { inputs: texts.to_vec() })
            .send()
            .await
            .map_err(|e| {
                error!(provider = "HuggingFace", error = %e, "request failed");
                RagError::EmbeddingError {
                    provider: "HuggingFace".into(),
                    message: format!("request failed: {e}"),
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail =
                serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error).unwrap_or(body);

            error!(provider = "HuggingFace", %status, "API error");
            return Err(RagError::EmbeddingError {
                provider: "HuggingFace".into(),
                message: format!("API returned {status}: {detail}"),
            });
        }

        let vectors: Vec<Vec<f32>> = response.json().await.map_err(|e| {
            error!(provider = "HuggingFace", error = %e, "failed to parse response");
            RagError::EmbeddingError {
                provider: "HuggingFace".into(),
                message: format!("failed to parse response: {e}"),
            }
        })?;

        if vectors.len() != texts.len() {
            return Err(RagError::EmbeddingError {
                provider: "HuggingFace".into(),
                message: format!("expected {} vectors, got {}", texts.len(), vectors.len()),
            });
        }
        Ok(vectors)
    }
}

// ── Hugging Face API request/response types ────────────────────────

#[derive(Serialize)]
struct FeatureExtractionRequest<'a> {
    inputs: Vec<&'a str>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

// ── EmbeddingProvider implementation ───────────────────────────────

#[async_trait]
impl EmbeddingProvider for HuggingFaceEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = "HuggingFace", text_len = text.len(), "embedding single text");

        let results = self.embed_batch(&[text]).await?;
        results.into_iter().next().ok_or_else(|| RagError::EmbeddingError {
            provider: "HuggingFace".into(),
            message: "API returned empty response".into(),
        })
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            provider = "HuggingFace",
            batch_size = texts.len(),
            model = %self.model,
            "embedding batch"
        );

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(MAX_BATCH_SIZE) {
            vectors.extend(self.request(batch).await?);
        }

        finish_vectors("HuggingFace", self.dimensions, vectors)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "HuggingFace"
    }
}
