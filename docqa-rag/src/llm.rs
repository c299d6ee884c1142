//! Language model seam used by the answer generator.

use async_trait::async_trait;

use crate::error::Result;

/// A hosted or local model that completes a prompt.
///
/// Implementations send the prompt as a single user turn and return the
/// reply text as-is.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Complete `prompt` and return the model's reply.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Provider name used in logs and errors.
    fn name(&self) -> &str;
}
