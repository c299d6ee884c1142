//! Grounded answer generation.
//!
//! [`AnswerGenerator`] renders retrieved chunks and the user's question into
//! a fixed prompt that restricts the model to the supplied context, then
//! returns the model's reply unmodified.

use std::sync::Arc;

use tracing::{error, info};

use crate::document::SearchResult;
use crate::error::Result;
use crate::llm::LlmProvider;

/// What the model is told to say when the context lacks the answer.
pub const REFUSAL: &str = "I don't have enough information to answer from the context.";

/// Prompt template with `{context}` and `{question}` placeholders.
pub const PROMPT_TEMPLATE: &str = r#"You are an expert assistant. Use ONLY the provided context to answer the question.
If the answer is not in the context, say: "I don't have enough information to answer from the context."
Do NOT use outside knowledge. Do NOT make up facts.

Context:
{context}

Question:
{question}

Answer:
Provide a clear, accurate, and well-structured response based solely on the context provided.
Use professional academic tone with proper terminology. Structure your answer logically with appropriate explanations.
If relevant, include key definitions, concepts, or examples from the context to support your answer.
Be concise yet comprehensive - aim for clarity over brevity. Maintain objectivity and precision in your explanation.
"#;

/// Fills the grounded prompt and asks an [`LlmProvider`] for the answer.
#[derive(Clone)]
pub struct AnswerGenerator {
    llm: Arc<dyn LlmProvider>,
    template: String,
}

impl AnswerGenerator {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm, template: PROMPT_TEMPLATE.to_string() }
    }

    /// Use a different template. It should contain `{context}` and `{question}`.
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    /// Join chunk texts with a blank line, in retrieval order.
    pub fn build_context(results: &[SearchResult]) -> String {
        results.iter().map(|r| r.chunk.text.as_str()).collect::<Vec<_>>().join("\n\n")
    }

    /// Substitute `context` and `question` into the template.
    pub fn render_prompt(&self, context: &str, question: &str) -> String {
        // Context first, so placeholder text inside the context is never substituted.
        let (head, tail) = match self.template.split_once("{context}") {
            Some((head, tail)) => (head, Some(tail)),
            None => (self.template.as_str(), None),
        };
        let mut prompt = head.replace("{question}", question);
        if let Some(tail) = tail {
            prompt.push_str(context);
            prompt.push_str(&tail.replace("{question}", question));
        }
        prompt
    }

    /// Ask the model to answer `question` from `results`.
    ///
    /// # Errors
    ///
    /// Propagates the provider's error; nothing is retried.
    pub async fn generate(&self, question: &str, results: &[SearchResult]) -> Result<String> {
        let context = Self::build_context(results);
        let prompt = self.render_prompt(&context, question);

        let answer = self.llm.generate(&prompt).await.map_err(|e| {
            error!(provider = self.llm.name(), error = %e, "answer generation failed");
            e
        })?;

        info!(
            provider = self.llm.name(),
            context_len = context.len(),
            answer_len = answer.len(),
            "generated answer"
        );
        Ok(answer)
    }
}
