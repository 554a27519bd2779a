use serde::{Deserialize, Serialize};

pub const DEFAULT_EMBEDDING_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_COMPLETION_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";
pub const DEFAULT_COLLECTION: &str = "pdfchat_chunks";

/// Environment variable consulted for the embedding/completion API key.
pub const API_KEY_ENV: &str = "PDFCHAT_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub completion: CompletionConfig,

    #[serde(default)]
    pub vector_store: VectorStoreConfig,

    #[serde(default)]
    pub ingestion: IngestionConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    pub fn config_path() -> Option<std::path::PathBuf> {
        dirs::config_dir().map(|p| p.join("pdfchat").join("config.toml"))
    }

    pub fn load() -> Result<Self, crate::error::ConfigError> {
        if let Some(path) = Self::config_path()
            && path.exists()
        {
            let content = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)?;
            config.validate()?;
            return Ok(config);
        }
        Ok(Self::default())
    }

    pub fn save(&self) -> Result<(), crate::error::ConfigError> {
        let path = Self::config_path().ok_or_else(|| {
            crate::error::ConfigError::Path("could not determine config directory".to_string())
        })?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), crate::error::ConfigError> {
        if self.ingestion.chunk_max_tokens == 0 {
            return Err(crate::error::ConfigError::Validation(
                "ingestion.chunk_max_tokens must be at least 1".to_string(),
            ));
        }
        if self.retrieval.top_k == 0 {
            return Err(crate::error::ConfigError::Validation(
                "retrieval.top_k must be at least 1".to_string(),
            ));
        }
        if self.retrieval.candidate_multiplier == 0 {
            return Err(crate::error::ConfigError::Validation(
                "retrieval.candidate_multiplier must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.retrieval.min_score) {
            return Err(crate::error::ConfigError::Validation(
                "retrieval.min_score must be between 0.0 and 1.0".to_string(),
            ));
        }
        Ok(())
    }

    /// API key for the embedding/completion services, from the environment.
    pub fn api_key() -> Option<String> {
        std::env::var(API_KEY_ENV)
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .ok()
            .filter(|k| !k.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_url")]
    pub url: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Vector width the collection is created with. Must match the model.
    #[serde(default = "default_dimension")]
    pub dimension: u32,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Maximum texts per embedding request.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Embedding batches in flight at once during ingestion.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,
}

fn default_embedding_url() -> String {
    DEFAULT_EMBEDDING_URL.to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_dimension() -> u32 {
    1536
}

fn default_timeout() -> u64 {
    60
}

fn default_batch_size() -> u32 {
    64
}

fn default_concurrency() -> u32 {
    4
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: default_embedding_url(),
            model: default_embedding_model(),
            dimension: default_dimension(),
            timeout_secs: default_timeout(),
            batch_size: default_batch_size(),
            concurrency: default_concurrency(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    #[serde(default = "default_completion_url")]
    pub url: String,

    #[serde(default = "default_completion_model")]
    pub model: String,

    #[serde(default = "default_completion_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_completion_url() -> String {
    DEFAULT_COMPLETION_URL.to_string()
}

fn default_completion_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_completion_timeout() -> u64 {
    120
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_temperature() -> f32 {
    0.7
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            url: default_completion_url(),
            model: default_completion_model(),
            timeout_secs: default_completion_timeout(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

/// Which vector index backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorDriver {
    #[default]
    Qdrant,
    /// Brute-force in-process index; nothing survives a restart.
    Memory,
}

impl std::fmt::Display for VectorDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VectorDriver::Qdrant => write!(f, "qdrant"),
            VectorDriver::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    #[serde(default)]
    pub driver: VectorDriver,

    #[serde(default = "default_qdrant_url")]
    pub url: String,

    #[serde(default = "default_collection")]
    pub collection: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

fn default_qdrant_url() -> String {
    DEFAULT_QDRANT_URL.to_string()
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            driver: VectorDriver::default(),
            url: default_qdrant_url(),
            collection: default_collection(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Uploads above this are rejected before extraction.
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,

    /// Approximate token ceiling per chunk.
    #[serde(default = "default_chunk_max_tokens")]
    pub chunk_max_tokens: u32,

    /// Trailing sentences of one chunk repeated at the head of the next.
    #[serde(default = "default_overlap_sentences")]
    pub overlap_sentences: u32,
}

fn default_max_file_bytes() -> u64 {
    25 * 1024 * 1024
}

fn default_chunk_max_tokens() -> u32 {
    800
}

fn default_overlap_sentences() -> u32 {
    2
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: default_max_file_bytes(),
            chunk_max_tokens: default_chunk_max_tokens(),
            overlap_sentences: default_overlap_sentences(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Chunks kept after filtering.
    #[serde(default = "default_top_k")]
    pub top_k: u32,

    /// The index is asked for top_k * candidate_multiplier candidates so
    /// post-filtering still has enough to choose from.
    #[serde(default = "default_candidate_multiplier")]
    pub candidate_multiplier: u32,

    /// Candidates scoring below this are dropped.
    #[serde(default = "default_min_score")]
    pub min_score: f32,

    /// Approximate token budget for the assembled context block.
    #[serde(default = "default_context_token_budget")]
    pub context_token_budget: u32,

    /// Conversation turns carried into the prompt.
    #[serde(default = "default_history_turns")]
    pub history_turns: u32,
}

fn default_top_k() -> u32 {
    5
}

fn default_candidate_multiplier() -> u32 {
    3
}

fn default_min_score() -> f32 {
    0.25
}

fn default_context_token_budget() -> u32 {
    5000
}

fn default_history_turns() -> u32 {
    8
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            candidate_multiplier: default_candidate_multiplier(),
            min_score: default_min_score(),
            context_token_budget: default_context_token_budget(),
            history_turns: default_history_turns(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.embedding.url, DEFAULT_EMBEDDING_URL);
        assert_eq!(config.vector_store.url, DEFAULT_QDRANT_URL);
        assert_eq!(config.vector_store.collection, DEFAULT_COLLECTION);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_ingestion_defaults() {
        let config = IngestionConfig::default();
        assert_eq!(config.overlap_sentences, 2);
        assert!((500..=1000).contains(&config.chunk_max_tokens));
    }

    #[test]
    fn test_validate_rejects_bad_min_score() {
        let mut config = Config::default();
        config.retrieval.min_score = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_roundtrip_toml() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back.retrieval.top_k, config.retrieval.top_k);
        assert_eq!(back.vector_store.driver, VectorDriver::Qdrant);
    }
}
