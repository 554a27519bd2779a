pub mod chat;
pub mod config;
pub mod document;
pub mod retrieval;

pub use chat::{AskOutcome, ConversationTurn, IngestReport, Role, StatusReport};
pub use config::{
    CompletionConfig, Config, EmbeddingConfig, IngestionConfig, RetrievalConfig, ServerConfig,
    VectorDriver, VectorStoreConfig,
};
pub use document::{Chunk, Document, DocumentStatus, PageText};
pub use retrieval::ScoredChunk;
