//! Tests for the interactive question loop.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use docqa_cli::run_chat;
use docqa_rag::{
    Document, EmbeddingProvider, LlmProvider, PersistentVectorStore, REFUSAL, RagPipeline, Result,
    SOURCE_KEY,
};

/// Embeds every text to the same unit vector.
struct ConstantEmbedder;

#[async_trait]
impl EmbeddingProvider for ConstantEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![1.0, 0.0, 0.0, 0.0])
    }

    fn dimensions(&self) -> usize {
        4
    }

    fn name(&self) -> &str {
        "constant"
    }
}

/// Counts calls and always answers with the refusal.
#[derive(Default)]
struct CountingLlm {
    calls: AtomicUsize,
}

#[async_trait]
impl LlmProvider for CountingLlm {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(REFUSAL.to_string())
    }

    fn name(&self) -> &str {
        "counting"
    }
}

async fn indexed_pipeline(dir: &std::path::Path, llm: Arc<CountingLlm>) -> RagPipeline {
    let pipeline = RagPipeline::builder()
        .embedding_provider(Arc::new(ConstantEmbedder))
        .vector_store(Arc::new(PersistentVectorStore::open(dir).unwrap()))
        .llm(llm)
        .build()
        .unwrap();

    let doc = Document {
        id: "fake_data.txt".into(),
        text: "Streamlit is an open-source Python framework for data apps.".into(),
        metadata: HashMap::from([(SOURCE_KEY.to_string(), "fake_data.txt".to_string())]),
        source_uri: None,
    };
    pipeline.index_documents("fake_data", &[doc]).await.unwrap();
    pipeline
}

fn lines(lines: &[&str]) -> Cursor<String> {
    Cursor::new(lines.iter().map(|l| format!("{l}\n")).collect())
}

#[tokio::test]
async fn quitting_with_capital_q_stops_after_two_questions() {
    let dir = tempfile::tempdir().unwrap();
    let llm = Arc::new(CountingLlm::default());
    let pipeline = indexed_pipeline(dir.path(), llm.clone()).await;

    let mut output = Vec::new();
    let input = lines(&["What is X?", "n", "What is Y?", "Q"]);
    let answered = run_chat(&pipeline, "fake_data", input, &mut output).await.unwrap();

    assert_eq!(answered, 2);
    assert_eq!(llm.calls.load(Ordering::SeqCst), 2);

    let printed = String::from_utf8(output).unwrap();
    assert_eq!(printed.matches("Retrieved 1 chunk(s)").count(), 2);
    assert!(printed.contains("Top match"));
    assert!(printed.contains(REFUSAL));
}

#[tokio::test]
async fn end_of_input_ends_the_loop() {
    let dir = tempfile::tempdir().unwrap();
    let llm = Arc::new(CountingLlm::default());
    let pipeline = indexed_pipeline(dir.path(), llm.clone()).await;

    let answered =
        run_chat(&pipeline, "fake_data", lines(&["What is X?"]), std::io::sink()).await.unwrap();
    assert_eq!(answered, 1);

    let answered = run_chat(&pipeline, "fake_data", lines(&[]), std::io::sink()).await.unwrap();
    assert_eq!(answered, 0);
}

#[tokio::test]
async fn blank_questions_are_asked_again() {
    let dir = tempfile::tempdir().unwrap();
    let llm = Arc::new(CountingLlm::default());
    let pipeline = indexed_pipeline(dir.path(), llm.clone()).await;

    let input = lines(&["", "   ", "What is Streamlit?", "q"]);
    let answered = run_chat(&pipeline, "fake_data", input, std::io::sink()).await.unwrap();

    assert_eq!(answered, 1);
    assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn empty_collection_prints_no_results() {
    let dir = tempfile::tempdir().unwrap();
    let llm = Arc::new(CountingLlm::default());
    let pipeline = RagPipeline::builder()
        .embedding_provider(Arc::new(ConstantEmbedder))
        .vector_store(Arc::new(PersistentVectorStore::open(dir.path()).unwrap()))
        .llm(llm)
        .build()
        .unwrap();
    pipeline.create_collection("empty").await.unwrap();

    let mut output = Vec::new();
    run_chat(&pipeline, "empty", lines(&["anything?", "q"]), &mut output).await.unwrap();

    let printed = String::from_utf8(output).unwrap();
    assert!(printed.contains("Retrieved 0 chunk(s)"));
    assert!(printed.contains("(no results)"));
}
