//! In-memory vector index.
//!
//! Brute-force cosine similarity over all stored vectors, behind
//! `std::sync::RwLock`. Nothing survives a restart; useful for tests and for
//! single-shot CLI sessions without a Qdrant instance.

use std::sync::RwLock;

use async_trait::async_trait;

use super::VectorStore;
use crate::error::VectorStoreError;
use crate::models::{Chunk, ScoredChunk};

struct StoredPoint {
    chunk: Chunk,
    vector: Vec<f32>,
}

pub struct MemoryBackend {
    points: RwLock<Vec<StoredPoint>>,
    collection: String,
}

impl MemoryBackend {
    pub fn new(collection: &str) -> Self {
        Self {
            points: RwLock::new(Vec::new()),
            collection: collection.to_string(),
        }
    }
}

fn cosine_sim(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a < f32::EPSILON || mag_b < f32::EPSILON {
        0.0
    } else {
        dot / (mag_a * mag_b)
    }
}

#[async_trait]
impl VectorStore for MemoryBackend {
    async fn health_check(&self) -> Result<bool, VectorStoreError> {
        Ok(true)
    }

    async fn ensure_collection(&self) -> Result<(), VectorStoreError> {
        Ok(())
    }

    async fn upsert_chunks(
        &self,
        new_points: Vec<(Chunk, Vec<f32>)>,
    ) -> Result<(), VectorStoreError> {
        let mut points = self.points.write().unwrap();
        for (chunk, vector) in new_points {
            points.retain(|p| p.chunk.id != chunk.id);
            points.push(StoredPoint { chunk, vector });
        }
        Ok(())
    }

    async fn delete_by_document(&self, document_id: &str) -> Result<(), VectorStoreError> {
        let mut points = self.points.write().unwrap();
        points.retain(|p| p.chunk.document_id != document_id);
        Ok(())
    }

    async fn search(
        &self,
        query_vector: Vec<f32>,
        limit: u64,
        document_id: Option<&str>,
        min_score: Option<f32>,
    ) -> Result<Vec<ScoredChunk>, VectorStoreError> {
        let points = self.points.read().unwrap();
        let mut results: Vec<ScoredChunk> = points
            .iter()
            .filter(|p| document_id.is_none_or(|id| p.chunk.document_id == id))
            .map(|p| ScoredChunk::new(p.chunk.clone(), cosine_sim(&query_vector, &p.vector)))
            .filter(|r| min_score.is_none_or(|min| r.score >= min))
            .collect();

        results.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.chunk.seq_index.cmp(&b.chunk.seq_index))
        });
        results.truncate(limit as usize);
        Ok(results)
    }

    async fn chunk_count(&self) -> Result<u64, VectorStoreError> {
        Ok(self.points.read().unwrap().len() as u64)
    }

    async fn chunk_count_for(&self, document_id: &str) -> Result<u64, VectorStoreError> {
        Ok(self
            .points
            .read()
            .unwrap()
            .iter()
            .filter(|p| p.chunk.document_id == document_id)
            .count() as u64)
    }

    fn collection(&self) -> &str {
        &self.collection
    }
}
