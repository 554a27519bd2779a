//! Retrieval result types. Produced per question, never persisted.

use serde::{Deserialize, Serialize};

use super::document::Chunk;

/// A chunk paired with its similarity score for one query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    /// Cosine similarity against the query vector.
    pub score: f32,
}

impl ScoredChunk {
    pub fn new(chunk: Chunk, score: f32) -> Self {
        Self { chunk, score }
    }
}
