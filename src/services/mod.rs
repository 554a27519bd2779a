//! Pipeline services: extraction, chunking, embedding, indexing, retrieval
//! and answer composition.

pub mod chunker;
pub mod completion;
pub mod composer;
pub mod embedding;
pub mod extractor;
pub mod ingest;
pub mod retriever;
pub mod vector_store;

pub use chunker::{Chunker, split_sentences};
pub use completion::{ChatMessage, CompletionProvider, HttpCompletionClient};
pub use composer::AnswerComposer;
pub use embedding::{EmbeddingProvider, HttpEmbeddingClient};
pub use ingest::Pipeline;
pub use retriever::Retriever;
pub use vector_store::{MemoryBackend, QdrantBackend, VectorStore, create_backend};
