//! Completion client for answer generation.

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::CompletionError;
use crate::models::CompletionConfig;

/// One message on the completion wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Opaque completion function: prompt messages in, answer text out.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, CompletionError>;
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionChoiceMessage {
    content: Option<String>,
}

/// Client for an OpenAI-compatible chat-completions API.
#[derive(Debug, Clone)]
pub struct HttpCompletionClient {
    client: Client,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl HttpCompletionClient {
    pub fn new(config: &CompletionConfig, api_key: Option<&str>) -> Result<Self, CompletionError> {
        let mut headers = header::HeaderMap::new();
        if let Some(key) = api_key {
            let value = header::HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|e| CompletionError::Connection(e.to_string()))?;
            headers.insert(header::AUTHORIZATION, value);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| CompletionError::Connection(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

fn classify_status(status: StatusCode, body: &str) -> CompletionError {
    let detail = format!("status {}: {}", status, body.chars().take(200).collect::<String>());
    if status == StatusCode::TOO_MANY_REQUESTS {
        CompletionError::RateLimited(detail)
    } else if status.is_server_error() {
        CompletionError::Server(detail)
    } else {
        CompletionError::Rejected(detail)
    }
}

#[async_trait]
impl CompletionProvider for HttpCompletionClient {
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, CompletionError> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = CompletionRequest {
            model: &self.model,
            messages: &messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CompletionError::Timeout
                } else if e.is_connect() {
                    CompletionError::Connection(e.to_string())
                } else {
                    CompletionError::Request(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::InvalidResponse(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| CompletionError::InvalidResponse("no completion content".to_string()))
    }
}
