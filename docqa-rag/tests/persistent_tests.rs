//! Tests for the disk-persisted vector store.

use std::collections::HashMap;

use docqa_rag::document::{Chunk, SOURCE_KEY};
use docqa_rag::embedding::normalize;
use docqa_rag::error::RagError;
use docqa_rag::persistent::PersistentVectorStore;
use docqa_rag::vectorstore::{CollectionStatus, VectorStore};
use proptest::prelude::*;

const DIM: usize = 8;

fn chunk(id: &str, source: &str, embedding: Vec<f32>) -> Chunk {
    Chunk {
        id: id.to_string(),
        text: format!("text of {id}"),
        start_index: 0,
        embedding,
        metadata: HashMap::from([(SOURCE_KEY.to_string(), source.to_string())]),
        document_id: source.to_string(),
    }
}

fn basis(i: usize) -> Vec<f32> {
    let mut v = vec![0.0; DIM];
    v[i % DIM] = 1.0;
    v
}

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map("non-zero embedding", |mut v| {
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm < 1e-3 {
            return None;
        }
        normalize(&mut v);
        Some(v)
    })
}

#[tokio::test]
async fn missing_collection_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = PersistentVectorStore::open(dir.path()).unwrap();

    assert_eq!(store.open_collection("fake_data").await, CollectionStatus::NotFound);
    assert_eq!(store.open_collection("../escape").await, CollectionStatus::NotFound);
    assert!(store.count("fake_data").await.is_err());
}

#[tokio::test]
async fn invalid_collection_name_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let store = PersistentVectorStore::open(dir.path()).unwrap();

    let err = store.create_collection("Not Valid", DIM).await.unwrap_err();
    assert!(matches!(err, RagError::ConfigError(_)));
}

#[tokio::test]
async fn upsert_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let store = PersistentVectorStore::open(dir.path()).unwrap();
    store.create_collection("docs", DIM).await.unwrap();

    let chunks: Vec<Chunk> = (0..4).map(|i| chunk(&format!("a_{i}"), "a.txt", basis(i))).collect();
    store.upsert("docs", &chunks).await.unwrap();
    assert_eq!(store.count("docs").await.unwrap(), 4);

    store.upsert("docs", &chunks).await.unwrap();
    assert_eq!(store.count("docs").await.unwrap(), 4);
}

#[tokio::test]
async fn upsert_replaces_chunk_with_same_id() {
    let dir = tempfile::tempdir().unwrap();
    let store = PersistentVectorStore::open(dir.path()).unwrap();
    store.create_collection("docs", DIM).await.unwrap();

    store.upsert("docs", &[chunk("a_0", "a.txt", basis(0))]).await.unwrap();
    store.upsert("docs", &[chunk("a_0", "a.txt", basis(3))]).await.unwrap();

    assert_eq!(store.count("docs").await.unwrap(), 1);
    let results = store.search("docs", &basis(3), 1).await.unwrap();
    assert!((results[0].score - 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn wrong_dimensions_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let store = PersistentVectorStore::open(dir.path()).unwrap();
    store.create_collection("docs", DIM).await.unwrap();

    let err = store.upsert("docs", &[chunk("a_0", "a.txt", vec![1.0, 0.0])]).await.unwrap_err();
    assert!(matches!(err, RagError::VectorStoreError { .. }));
    assert_eq!(store.count("docs").await.unwrap(), 0);
}

#[tokio::test]
async fn reopening_the_directory_recovers_every_chunk() {
    let dir = tempfile::tempdir().unwrap();
    let chunks: Vec<Chunk> = (0..5).map(|i| chunk(&format!("a_{i}"), "a.txt", basis(i))).collect();

    {
        let store = PersistentVectorStore::open(dir.path()).unwrap();
        store.create_collection("docs", DIM).await.unwrap();
        store.upsert("docs", &chunks).await.unwrap();
    }

    let store = PersistentVectorStore::open(dir.path()).unwrap();
    assert_eq!(store.open_collection("docs").await, CollectionStatus::Opened { count: 5 });

    let results = store.search("docs", &basis(2), 5).await.unwrap();
    assert_eq!(results.len(), 5);
    assert_eq!(results[0].chunk, chunks[2]);
}

#[tokio::test]
async fn flush_persists_an_empty_created_collection() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = PersistentVectorStore::open(dir.path()).unwrap();
        store.create_collection("empty", DIM).await.unwrap();
        store.flush().await.unwrap();
    }

    let store = PersistentVectorStore::open(dir.path()).unwrap();
    assert_eq!(store.open_collection("empty").await, CollectionStatus::Opened { count: 0 });
}

#[tokio::test]
async fn unparseable_file_is_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("docs.json"), b"{ not json").unwrap();

    let store = PersistentVectorStore::open(dir.path()).unwrap();
    assert!(matches!(store.open_collection("docs").await, CollectionStatus::Corrupt(_)));

    let err = store.create_collection("docs", DIM).await.unwrap_err();
    assert!(matches!(err, RagError::CorruptCollection { .. }));
    assert!(matches!(
        store.upsert("docs", &[chunk("a_0", "a.txt", basis(0))]).await,
        Err(RagError::CorruptCollection { .. })
    ));
}

#[tokio::test]
async fn unknown_format_version_is_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let file = serde_json::json!({
        "format_version": 99,
        "name": "docs",
        "dimensions": DIM,
        "chunks": []
    });
    std::fs::write(dir.path().join("docs.json"), file.to_string()).unwrap();

    let store = PersistentVectorStore::open(dir.path()).unwrap();
    match store.open_collection("docs").await {
        CollectionStatus::Corrupt(message) => assert!(message.contains("99")),
        other => panic!("expected Corrupt, got {other:?}"),
    }
}

#[tokio::test]
async fn delete_removes_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = PersistentVectorStore::open(dir.path()).unwrap();
    store.create_collection("docs", DIM).await.unwrap();
    store.upsert("docs", &[chunk("a_0", "a.txt", basis(0))]).await.unwrap();
    assert!(dir.path().join("docs.json").exists());

    store.delete_collection("docs").await.unwrap();
    assert!(!dir.path().join("docs.json").exists());
    assert_eq!(store.open_collection("docs").await, CollectionStatus::NotFound);
}

#[tokio::test]
async fn count_source_counts_only_matching_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let store = PersistentVectorStore::open(dir.path()).unwrap();
    store.create_collection("docs", DIM).await.unwrap();

    let mut chunks: Vec<Chunk> = (0..3).map(|i| chunk(&format!("a_{i}"), "a.txt", basis(i))).collect();
    chunks.push(chunk("b_0", "b.txt", basis(4)));
    store.upsert("docs", &chunks).await.unwrap();

    assert_eq!(store.count_source("docs", "a.txt").await.unwrap(), 3);
    assert_eq!(store.count_source("docs", "b.txt").await.unwrap(), 1);
    assert_eq!(store.count_source("docs", "c.txt").await.unwrap(), 0);
}

#[tokio::test]
async fn mmr_prefers_diverse_results_over_near_duplicates() {
    let dir = tempfile::tempdir().unwrap();
    let store = PersistentVectorStore::open(dir.path()).unwrap();
    store.create_collection("docs", 3).await.unwrap();

    let chunks = vec![
        chunk("a", "a.txt", vec![1.0, 0.0, 0.0]),
        chunk("a-copy", "a.txt", vec![1.0, 0.0, 0.0]),
        chunk("b", "a.txt", vec![0.0, 1.0, 0.0]),
        chunk("far", "a.txt", vec![0.0, 0.0, 1.0]),
    ];
    store.upsert("docs", &chunks).await.unwrap();

    let query = [1.0, 1.0, 0.0];
    let plain = store.search("docs", &query, 2).await.unwrap();
    let plain_ids: Vec<&str> = plain.iter().map(|r| r.chunk.id.as_str()).collect();
    assert_eq!(plain_ids, vec!["a", "a-copy"]);

    let diverse = store.search_mmr("docs", &query, 2, 5, 0.5).await.unwrap();
    let diverse_ids: Vec<&str> = diverse.iter().map(|r| r.chunk.id.as_str()).collect();
    assert_eq!(diverse_ids, vec!["a", "b"]);
}

#[tokio::test]
async fn mmr_never_looks_past_fetch_k_candidates() {
    let dir = tempfile::tempdir().unwrap();
    let store = PersistentVectorStore::open(dir.path()).unwrap();
    store.create_collection("docs", DIM).await.unwrap();
    let chunks: Vec<Chunk> = (0..4).map(|i| chunk(&format!("c_{i}"), "a.txt", basis(i))).collect();
    store.upsert("docs", &chunks).await.unwrap();

    let results = store.search_mmr("docs", &basis(2), 3, 1, 0.5).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].chunk.id, "c_2");
}

/// A stored vector used as the query comes back first with score 1.0.
mod prop_round_trip_search {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn stored_vector_is_its_own_nearest_neighbour(
            embeddings in proptest::collection::vec(arb_normalized_embedding(DIM), 1..12),
            pick in any::<prop::sample::Index>(),
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let dir = tempfile::tempdir().unwrap();
            let target = pick.index(embeddings.len());

            let (first, count) = rt.block_on(async {
                let store = PersistentVectorStore::open(dir.path()).unwrap();
                store.create_collection("docs", DIM).await.unwrap();
                let chunks: Vec<Chunk> = embeddings
                    .iter()
                    .enumerate()
                    .map(|(i, e)| chunk(&format!("c_{i}"), "a.txt", e.clone()))
                    .collect();
                store.upsert("docs", &chunks).await.unwrap();

                let results = store.search("docs", &embeddings[target], 3).await.unwrap();
                (results[0].clone(), store.count("docs").await.unwrap())
            });

            prop_assert_eq!(count, embeddings.len());
            prop_assert!((first.score - 1.0).abs() < 1e-4);
            // Duplicate vectors tie at 1.0; any of them is a correct first hit.
            prop_assert!(
                (docqa_rag::cosine_similarity(&first.chunk.embedding, &embeddings[target]) - 1.0)
                    .abs()
                    < 1e-4
            );
        }
    }
}
