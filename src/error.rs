//! Error types for the PDF chat pipeline.

use thiserror::Error;

use crate::utils::retry::Retryable;

/// Errors raised while validating an upload, before any extraction work.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("not a PDF: {0}")]
    NotPdf(String),

    #[error("file too large: {size} bytes (limit {limit})")]
    TooLarge { size: u64, limit: u64 },

    #[error("empty upload")]
    EmptyUpload,
}

/// Errors raised while extracting text from PDF bytes.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unreadable PDF: {0}")]
    UnreadablePdf(String),

    #[error("document contains no extractable text")]
    EmptyDocument,
}

/// Errors related to embedding generation.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("failed to connect to embedding service: {0}")]
    Connection(String),

    #[error("embedding request timed out")]
    Timeout,

    #[error("embedding service rate limited: {0}")]
    RateLimited(String),

    #[error("embedding service error: {0}")]
    Server(String),

    #[error("embedding service rejected request: {0}")]
    Rejected(String),

    #[error("embedding request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),
}

impl Retryable for EmbeddingError {
    fn is_retryable(&self) -> bool {
        match self {
            // Transport problems and 5xx/429 are worth one more attempt
            EmbeddingError::Connection(_)
            | EmbeddingError::Timeout
            | EmbeddingError::RateLimited(_)
            | EmbeddingError::Server(_) => true,
            EmbeddingError::Request(e) => e.is_timeout() || e.is_connect(),
            // 4xx and malformed bodies are configuration problems, not flakiness
            EmbeddingError::Rejected(_) | EmbeddingError::InvalidResponse(_) => false,
        }
    }
}

/// Errors related to answer generation.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("failed to connect to completion service: {0}")]
    Connection(String),

    #[error("completion request timed out")]
    Timeout,

    #[error("completion service rate limited: {0}")]
    RateLimited(String),

    #[error("completion service error: {0}")]
    Server(String),

    #[error("completion service rejected request: {0}")]
    Rejected(String),

    #[error("completion request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid completion response: {0}")]
    InvalidResponse(String),
}

impl Retryable for CompletionError {
    fn is_retryable(&self) -> bool {
        match self {
            CompletionError::Connection(_)
            | CompletionError::Timeout
            | CompletionError::RateLimited(_)
            | CompletionError::Server(_) => true,
            CompletionError::Request(e) => e.is_timeout() || e.is_connect(),
            CompletionError::Rejected(_) | CompletionError::InvalidResponse(_) => false,
        }
    }
}

/// Errors related to vector index operations.
#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("failed to connect to vector index: {0}")]
    Connection(String),

    #[error("collection error: {0}")]
    Collection(String),

    #[error("upsert error: {0}")]
    Upsert(String),

    #[error("search error: {0}")]
    Search(String),

    #[error("delete error: {0}")]
    Delete(String),
}

impl Retryable for VectorStoreError {
    fn is_retryable(&self) -> bool {
        match self {
            VectorStoreError::Connection(_) => true,
            VectorStoreError::Collection(msg)
            | VectorStoreError::Upsert(msg)
            | VectorStoreError::Search(msg)
            | VectorStoreError::Delete(msg) => {
                let msg = msg.to_lowercase();
                msg.contains("timeout") || msg.contains("connection") || msg.contains("unavailable")
            }
        }
    }
}

/// Errors raised on the ingestion path. Ingestion is all-or-nothing per
/// document: any of these leaves the previously committed chunk set intact.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid upload: {0}")]
    Input(#[from] InputError),

    #[error("extraction failed: {0}")]
    Extract(#[from] ExtractError),

    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("vector index failed: {0}")]
    VectorStore(#[from] VectorStoreError),
}

/// Errors raised on the question-answering path. Conversation history held by
/// the caller is never modified by a failed ask.
#[derive(Debug, Error)]
pub enum AskError {
    #[error("empty question")]
    EmptyQuestion,

    #[error("unknown document: {0}")]
    UnknownDocument(String),

    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("vector index failed: {0}")]
    VectorStore(#[from] VectorStoreError),

    #[error("answer generation failed: {0}")]
    Completion(#[from] CompletionError),
}

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("path error: {0}")]
    Path(String),

    #[error("validation error: {0}")]
    Validation(String),
}
