//! Vector index abstraction layer.
//!
//! A trait-based abstraction over vector index backends. Similarity is
//! cosine in every backend; switching metrics silently changes ranking
//! semantics, so the metric is fixed here and not configurable.

mod memory;
mod qdrant;

pub use memory::MemoryBackend;
pub use qdrant::QdrantBackend;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::VectorStoreError;
use crate::models::{Chunk, ScoredChunk, VectorDriver, VectorStoreConfig};

/// Abstract vector index: chunk tuples in, nearest neighbours out.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Check that the index is reachable.
    async fn health_check(&self) -> Result<bool, VectorStoreError>;

    /// Create the collection if it does not exist.
    async fn ensure_collection(&self) -> Result<(), VectorStoreError>;

    /// Insert or replace chunks with their embeddings, keyed by chunk id.
    async fn upsert_chunks(
        &self,
        points: Vec<(Chunk, Vec<f32>)>,
    ) -> Result<(), VectorStoreError>;

    /// Remove every chunk belonging to a document.
    async fn delete_by_document(&self, document_id: &str) -> Result<(), VectorStoreError>;

    /// Nearest-neighbour query, optionally scoped to one document and
    /// cut off below a minimum cosine score.
    async fn search(
        &self,
        query_vector: Vec<f32>,
        limit: u64,
        document_id: Option<&str>,
        min_score: Option<f32>,
    ) -> Result<Vec<ScoredChunk>, VectorStoreError>;

    /// Total stored chunks.
    async fn chunk_count(&self) -> Result<u64, VectorStoreError>;

    /// Stored chunks for one document.
    async fn chunk_count_for(&self, document_id: &str) -> Result<u64, VectorStoreError>;

    /// Collection name.
    fn collection(&self) -> &str;
}

/// Create a vector index backend from configuration.
pub async fn create_backend(
    config: &VectorStoreConfig,
    embedding_dim: u32,
) -> Result<Arc<dyn VectorStore>, VectorStoreError> {
    match config.driver {
        VectorDriver::Qdrant => {
            let backend = QdrantBackend::new(config, u64::from(embedding_dim))?;
            Ok(Arc::new(backend))
        }
        VectorDriver::Memory => Ok(Arc::new(MemoryBackend::new(&config.collection))),
    }
}
