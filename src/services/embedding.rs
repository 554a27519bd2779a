//! Embedding client for generating text embeddings.

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::EmbeddingError;
use crate::models::EmbeddingConfig;

/// Opaque embedding function: texts in, fixed-dimension vectors out.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of chunk texts. The returned vectors are in input
    /// order and the count always matches the input count.
    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Embed a single query string.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let embeddings = self.embed_batch(vec![text.to_string()]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::InvalidResponse("empty embedding response".to_string()))
    }

    /// Vector width this provider produces.
    fn dimension(&self) -> u32;
}

/// Request body for an OpenAI-compatible /embeddings endpoint.
#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Debug, Deserialize)]
struct EmbedData {
    index: usize,
    embedding: Vec<f32>,
}

/// Client for an OpenAI-compatible embedding API.
///
/// Batches above the configured ceiling are split into multiple requests;
/// within each response, vectors are re-ordered by the service-reported
/// index rather than trusted positionally.
#[derive(Debug, Clone)]
pub struct HttpEmbeddingClient {
    client: Client,
    base_url: String,
    model: String,
    dimension: u32,
    batch_size: usize,
}

impl HttpEmbeddingClient {
    pub fn new(config: &EmbeddingConfig, api_key: Option<&str>) -> Result<Self, EmbeddingError> {
        let mut headers = header::HeaderMap::new();
        if let Some(key) = api_key {
            let value = header::HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|e| EmbeddingError::Connection(e.to_string()))?;
            headers.insert(header::AUTHORIZATION, value);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| EmbeddingError::Connection(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dimension: config.dimension,
            batch_size: config.batch_size.max(1) as usize,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn embed_single_batch(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let expected = texts.len();
        let url = format!("{}/embeddings", self.base_url);
        let request = EmbedRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EmbeddingError::Timeout
                } else if e.is_connect() {
                    EmbeddingError::Connection(e.to_string())
                } else {
                    EmbeddingError::Request(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let embed_response: EmbedResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?;

        if embed_response.data.len() != expected {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {} embeddings, got {}",
                expected,
                embed_response.data.len()
            )));
        }

        let mut ordered: Vec<Vec<f32>> = vec![Vec::new(); expected];
        for item in embed_response.data {
            let slot = ordered
                .get_mut(item.index)
                .ok_or_else(|| {
                    EmbeddingError::InvalidResponse(format!("index {} out of range", item.index))
                })?;
            *slot = item.embedding;
        }
        Ok(ordered)
    }
}

fn classify_status(status: StatusCode, body: &str) -> EmbeddingError {
    let detail = format!("status {}: {}", status, body.chars().take(200).collect::<String>());
    if status == StatusCode::TOO_MANY_REQUESTS {
        EmbeddingError::RateLimited(detail)
    } else if status.is_server_error() {
        EmbeddingError::Server(detail)
    } else {
        EmbeddingError::Rejected(detail)
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingClient {
    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut all_embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let embeddings = self.embed_single_batch(batch.to_vec()).await?;
            all_embeddings.extend(embeddings);
        }
        Ok(all_embeddings)
    }

    fn dimension(&self) -> u32 {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let config = EmbeddingConfig::default();
        assert!(HttpEmbeddingClient::new(&config, Some("sk-test")).is_ok());
    }

    #[test]
    fn test_base_url_trimming() {
        let config = EmbeddingConfig {
            url: "http://localhost:8000/v1/".to_string(),
            ..Default::default()
        };
        let client = HttpEmbeddingClient::new(&config, None).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000/v1");
    }

    #[test]
    fn test_classify_status() {
        assert!(matches!(
            classify_status(StatusCode::SERVICE_UNAVAILABLE, "overloaded"),
            EmbeddingError::Server(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, ""),
            EmbeddingError::RateLimited(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, "bad key"),
            EmbeddingError::Rejected(_)
        ));
    }
}
