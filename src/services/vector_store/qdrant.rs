//! Qdrant vector index backend.

use async_trait::async_trait;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter,
    PointStruct, SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder,
};
use std::collections::HashMap;

use super::VectorStore;
use crate::error::VectorStoreError;
use crate::models::{Chunk, ScoredChunk, VectorStoreConfig};

pub struct QdrantBackend {
    client: Qdrant,
    collection: String,
    embedding_dim: u64,
}

impl QdrantBackend {
    pub fn new(config: &VectorStoreConfig, embedding_dim: u64) -> Result<Self, VectorStoreError> {
        let mut builder = Qdrant::from_url(&config.url);

        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key.clone());
        }

        let client = builder
            .build()
            .map_err(|e| VectorStoreError::Connection(e.to_string()))?;

        Ok(Self {
            client,
            collection: config.collection.clone(),
            embedding_dim,
        })
    }

    fn document_filter(document_id: &str) -> Filter {
        Filter::must([Condition::matches(
            "document_id",
            document_id.to_string(),
        )])
    }

    async fn collection_exists(&self) -> Result<bool, VectorStoreError> {
        match self.client.collection_info(&self.collection).await {
            Ok(_) => Ok(true),
            Err(e) => {
                let msg = e.to_string();
                if msg.contains("not found") || msg.contains("doesn't exist") {
                    Ok(false)
                } else {
                    Err(VectorStoreError::Collection(msg))
                }
            }
        }
    }
}

fn payload_str(payload: &HashMap<String, qdrant_client::qdrant::Value>, key: &str) -> String {
    payload
        .get(key)
        .and_then(|v| match &v.kind {
            Some(qdrant_client::qdrant::value::Kind::StringValue(s)) => Some(s.clone()),
            _ => None,
        })
        .unwrap_or_default()
}

fn payload_u32(payload: &HashMap<String, qdrant_client::qdrant::Value>, key: &str) -> u32 {
    payload
        .get(key)
        .and_then(|v| match &v.kind {
            Some(qdrant_client::qdrant::value::Kind::IntegerValue(n)) => Some(*n as u32),
            _ => None,
        })
        .unwrap_or_default()
}

#[async_trait]
impl VectorStore for QdrantBackend {
    async fn health_check(&self) -> Result<bool, VectorStoreError> {
        self.client
            .health_check()
            .await
            .map(|_| true)
            .map_err(|e| VectorStoreError::Connection(e.to_string()))
    }

    async fn ensure_collection(&self) -> Result<(), VectorStoreError> {
        if self.collection_exists().await? {
            return Ok(());
        }

        let create_collection = CreateCollectionBuilder::new(&self.collection).vectors_config(
            VectorParamsBuilder::new(self.embedding_dim, Distance::Cosine),
        );

        self.client
            .create_collection(create_collection)
            .await
            .map_err(|e| VectorStoreError::Collection(e.to_string()))?;

        Ok(())
    }

    async fn upsert_chunks(
        &self,
        points: Vec<(Chunk, Vec<f32>)>,
    ) -> Result<(), VectorStoreError> {
        if points.is_empty() {
            return Ok(());
        }

        let points: Vec<PointStruct> = points
            .into_iter()
            .map(|(chunk, vector)| {
                let mut payload: HashMap<String, qdrant_client::qdrant::Value> = HashMap::new();
                payload.insert("document_id".to_string(), chunk.document_id.into());
                payload.insert("seq_index".to_string(), i64::from(chunk.seq_index).into());
                payload.insert("page_start".to_string(), i64::from(chunk.page_start).into());
                payload.insert("page_end".to_string(), i64::from(chunk.page_end).into());
                payload.insert(
                    "token_count".to_string(),
                    i64::from(chunk.token_count).into(),
                );
                payload.insert(
                    "overlap_leading".to_string(),
                    i64::from(chunk.overlap_leading).into(),
                );
                payload.insert("content".to_string(), chunk.text.into());

                PointStruct::new(chunk.id, vector, payload)
            })
            .collect();

        let upsert = UpsertPointsBuilder::new(&self.collection, points);

        self.client
            .upsert_points(upsert)
            .await
            .map_err(|e| VectorStoreError::Upsert(e.to_string()))?;

        Ok(())
    }

    async fn delete_by_document(&self, document_id: &str) -> Result<(), VectorStoreError> {
        let delete =
            DeletePointsBuilder::new(&self.collection).points(Self::document_filter(document_id));

        self.client
            .delete_points(delete)
            .await
            .map_err(|e| VectorStoreError::Delete(e.to_string()))?;

        Ok(())
    }

    async fn search(
        &self,
        query_vector: Vec<f32>,
        limit: u64,
        document_id: Option<&str>,
        min_score: Option<f32>,
    ) -> Result<Vec<ScoredChunk>, VectorStoreError> {
        let mut search_builder =
            SearchPointsBuilder::new(&self.collection, query_vector, limit).with_payload(true);

        if let Some(id) = document_id {
            search_builder = search_builder.filter(Self::document_filter(id));
        }

        if let Some(score) = min_score {
            search_builder = search_builder.score_threshold(score);
        }

        let results = self
            .client
            .search_points(search_builder)
            .await
            .map_err(|e| VectorStoreError::Search(e.to_string()))?;

        let scored: Vec<ScoredChunk> = results
            .result
            .into_iter()
            .map(|point| {
                let payload = point.payload;

                let chunk_id = match &point.id {
                    Some(id) => match &id.point_id_options {
                        Some(qdrant_client::qdrant::point_id::PointIdOptions::Uuid(uuid)) => {
                            uuid.clone()
                        }
                        Some(qdrant_client::qdrant::point_id::PointIdOptions::Num(num)) => {
                            num.to_string()
                        }
                        None => String::new(),
                    },
                    None => String::new(),
                };

                let chunk = Chunk {
                    id: chunk_id,
                    document_id: payload_str(&payload, "document_id"),
                    text: payload_str(&payload, "content"),
                    seq_index: payload_u32(&payload, "seq_index"),
                    page_start: payload_u32(&payload, "page_start"),
                    page_end: payload_u32(&payload, "page_end"),
                    token_count: payload_u32(&payload, "token_count"),
                    overlap_leading: payload_u32(&payload, "overlap_leading"),
                };

                ScoredChunk::new(chunk, point.score)
            })
            .collect();

        Ok(scored)
    }

    async fn chunk_count(&self) -> Result<u64, VectorStoreError> {
        if !self.collection_exists().await? {
            return Ok(0);
        }
        let count = CountPointsBuilder::new(&self.collection).exact(true);
        let response = self
            .client
            .count(count)
            .await
            .map_err(|e| VectorStoreError::Search(e.to_string()))?;
        Ok(response.result.map_or(0, |r| r.count))
    }

    async fn chunk_count_for(&self, document_id: &str) -> Result<u64, VectorStoreError> {
        if !self.collection_exists().await? {
            return Ok(0);
        }
        let count = CountPointsBuilder::new(&self.collection)
            .filter(Self::document_filter(document_id))
            .exact(true);
        let response = self
            .client
            .count(count)
            .await
            .map_err(|e| VectorStoreError::Search(e.to_string()))?;
        Ok(response.result.map_or(0, |r| r.count))
    }

    fn collection(&self) -> &str {
        &self.collection
    }
}
