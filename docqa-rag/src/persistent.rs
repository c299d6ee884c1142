//! Disk-persisted vector store using cosine similarity.
//!
//! [`PersistentVectorStore`] keeps every collection in memory behind a
//! `tokio::sync::RwLock` and mirrors each one to
//! `<persist_dir>/<collection>.json`. Files are replaced atomically (temp file
//! + rename) so a crash mid-write leaves the previous version intact.
//! Collections are loaded lazily the first time they are opened.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::document::{Chunk, SearchResult};
use crate::error::{RagError, Result};
use crate::vectorstore::{CollectionStatus, VectorStore, cosine_similarity, is_valid_collection_name};

/// On-disk layout version; files with another version are reported as corrupt.
const FORMAT_VERSION: u32 = 1;

const BACKEND: &str = "persistent";

#[derive(Serialize)]
struct CollectionFileRef<'a> {
    format_version: u32,
    name: &'a str,
    dimensions: usize,
    chunks: &'a [Chunk],
}

#[derive(Deserialize)]
struct CollectionFile {
    format_version: u32,
    name: String,
    dimensions: usize,
    chunks: Vec<Chunk>,
}

#[derive(Debug)]
struct Collection {
    dimensions: usize,
    chunks: Vec<Chunk>,
    positions: HashMap<String, usize>,
    dirty: bool,
}

impl Collection {
    fn new(dimensions: usize) -> Self {
        Self { dimensions, chunks: Vec::new(), positions: HashMap::new(), dirty: true }
    }

    fn from_file(file: CollectionFile) -> std::result::Result<Self, String> {
        let mut collection = Self::new(file.dimensions);
        collection.dirty = false;
        for chunk in file.chunks {
            if chunk.embedding.len() != file.dimensions {
                return Err(format!(
                    "chunk '{}' has {} dimensions, collection declares {}",
                    chunk.id,
                    chunk.embedding.len(),
                    file.dimensions
                ));
            }
            collection.insert(chunk);
        }
        Ok(collection)
    }

    fn insert(&mut self, chunk: Chunk) {
        match self.positions.get(&chunk.id) {
            Some(&pos) => self.chunks[pos] = chunk,
            None => {
                self.positions.insert(chunk.id.clone(), self.chunks.len());
                self.chunks.push(chunk);
            }
        }
    }
}

/// A [`VectorStore`] that persists collections as JSON files in a directory.
///
/// Reopening the same directory recovers every stored chunk. Chunks are kept
/// in insertion order and keyed by ID, so upserting the same chunk twice
/// replaces it in place.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{PersistentVectorStore, VectorStore};
///
/// let store = PersistentVectorStore::open("./rag_chroma_db")?;
/// match store.open_collection("fake_data").await {
///     CollectionStatus::NotFound => { /* build it */ }
///     _ => {}
/// }
/// ```
#[derive(Debug)]
pub struct PersistentVectorStore {
    dir: PathBuf,
    collections: RwLock<HashMap<String, Collection>>,
}

impl PersistentVectorStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        debug!(dir = %dir.display(), "opened persistent vector store");
        Ok(Self { dir, collections: RwLock::new(HashMap::new()) })
    }

    fn collection_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    fn missing(name: &str) -> RagError {
        RagError::VectorStoreError {
            backend: BACKEND.to_string(),
            message: format!("collection '{name}' does not exist"),
        }
    }

    /// Read a collection file. `Ok(None)` means the file does not exist.
    fn read_collection(&self, name: &str) -> std::result::Result<Option<Collection>, String> {
        let path = self.collection_path(name);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(format!("failed to read {}: {e}", path.display())),
        };

        let file: CollectionFile = serde_json::from_slice(&bytes)
            .map_err(|e| format!("failed to parse {}: {e}", path.display()))?;

        if file.format_version != FORMAT_VERSION {
            return Err(format!(
                "unsupported format version {} (expected {FORMAT_VERSION})",
                file.format_version
            ));
        }
        if file.name != name {
            return Err(format!("file holds collection '{}', expected '{name}'", file.name));
        }

        Collection::from_file(file).map(Some)
    }

    fn write_collection(&self, name: &str, collection: &Collection) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let file = CollectionFileRef {
            format_version: FORMAT_VERSION,
            name,
            dimensions: collection.dimensions,
            chunks: &collection.chunks,
        };

        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        serde_json::to_writer(&mut tmp, &file).map_err(|e| RagError::VectorStoreError {
            backend: BACKEND.to_string(),
            message: format!("failed to serialize collection '{name}': {e}"),
        })?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.collection_path(name)).map_err(|e| RagError::Io(e.error))?;

        debug!(collection = name, chunk_count = collection.chunks.len(), "persisted collection");
        Ok(())
    }

    /// Make sure `name` is loaded into memory, failing if it is missing or corrupt.
    async fn ensure_loaded(&self, name: &str) -> Result<()> {
        match self.open_collection(name).await {
            CollectionStatus::Opened { .. } => Ok(()),
            CollectionStatus::NotFound => Err(Self::missing(name)),
            CollectionStatus::Corrupt(message) => {
                Err(RagError::CorruptCollection { collection: name.to_string(), message })
            }
        }
    }
}

#[async_trait]
impl VectorStore for PersistentVectorStore {
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        if !is_valid_collection_name(name) {
            return Err(RagError::ConfigError(format!(
                "invalid collection name '{name}': use lowercase letters, digits, '_' or '-'"
            )));
        }

        let existing = match self.open_collection(name).await {
            CollectionStatus::Opened { .. } => true,
            CollectionStatus::NotFound => false,
            CollectionStatus::Corrupt(message) => {
                return Err(RagError::CorruptCollection { collection: name.to_string(), message });
            }
        };

        let mut collections = self.collections.write().await;
        if existing {
            if let Some(collection) = collections.get(name) {
                if collection.dimensions != dimensions {
                    return Err(RagError::VectorStoreError {
                        backend: BACKEND.to_string(),
                        message: format!(
                            "collection '{name}' has {} dimensions, requested {dimensions}",
                            collection.dimensions
                        ),
                    });
                }
            }
            debug!(collection = name, "collection already exists, skipping creation");
            return Ok(());
        }

        collections.insert(name.to_string(), Collection::new(dimensions));
        info!(collection = name, dimensions, "created collection");
        Ok(())
    }

    async fn open_collection(&self, name: &str) -> CollectionStatus {
        if let Some(collection) = self.collections.read().await.get(name) {
            return CollectionStatus::Opened { count: collection.chunks.len() };
        }
        if !is_valid_collection_name(name) {
            return CollectionStatus::NotFound;
        }

        match self.read_collection(name) {
            Ok(None) => CollectionStatus::NotFound,
            Ok(Some(collection)) => {
                let mut collections = self.collections.write().await;
                let count = collections.entry(name.to_string()).or_insert(collection).chunks.len();
                debug!(collection = name, count, "loaded collection from disk");
                CollectionStatus::Opened { count }
            }
            Err(message) => {
                warn!(collection = name, %message, "collection file is unreadable");
                CollectionStatus::Corrupt(message)
            }
        }
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.collections.write().await.remove(name);
        if is_valid_collection_name(name) {
            match std::fs::remove_file(self.collection_path(name)) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        info!(collection = name, "deleted collection");
        Ok(())
    }

    async fn upsert(&self, collection: &str, chunks: &[Chunk]) -> Result<()> {
        self.ensure_loaded(collection).await?;

        let mut collections = self.collections.write().await;
        let store = collections.get_mut(collection).ok_or_else(|| Self::missing(collection))?;

        if let Some(bad) = chunks.iter().find(|c| c.embedding.len() != store.dimensions) {
            return Err(RagError::VectorStoreError {
                backend: BACKEND.to_string(),
                message: format!(
                    "chunk '{}' has {} dimensions, collection '{collection}' expects {}",
                    bad.id,
                    bad.embedding.len(),
                    store.dimensions
                ),
            });
        }

        for chunk in chunks {
            store.insert(chunk.clone());
        }
        self.write_collection(collection, store)?;
        store.dirty = false;
        Ok(())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        self.ensure_loaded(collection).await?;
        let collections = self.collections.read().await;
        let store = collections.get(collection).ok_or_else(|| Self::missing(collection))?;
        Ok(store.chunks.len())
    }

    async fn count_source(&self, collection: &str, source: &str) -> Result<usize> {
        self.ensure_loaded(collection).await?;
        let collections = self.collections.read().await;
        let store = collections.get(collection).ok_or_else(|| Self::missing(collection))?;
        Ok(store.chunks.iter().filter(|c| c.source() == Some(source)).count())
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        self.ensure_loaded(collection).await?;
        let collections = self.collections.read().await;
        let store = collections.get(collection).ok_or_else(|| Self::missing(collection))?;

        let mut scored: Vec<SearchResult> = store
            .chunks
            .iter()
            .map(|chunk| {
                let score = cosine_similarity(&chunk.embedding, embedding);
                SearchResult { chunk: chunk.clone(), score }
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn flush(&self) -> Result<()> {
        let mut collections = self.collections.write().await;
        for (name, collection) in collections.iter_mut().filter(|(_, c)| c.dirty) {
            self.write_collection(name, collection)?;
            collection.dirty = false;
        }
        Ok(())
    }
}
