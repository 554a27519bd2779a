use serde::{Deserialize, Serialize};

/// Ingestion state of a document in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Ready,
    Failed,
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentStatus::Pending => write!(f, "pending"),
            DocumentStatus::Ready => write!(f, "ready"),
            DocumentStatus::Failed => write!(f, "failed"),
        }
    }
}

/// An ingested (or failing) PDF. Identity is the filename: re-uploading the
/// same filename supersedes the previous chunk set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub filename: String,
    pub size_bytes: u64,
    pub page_count: u32,
    pub chunk_count: u32,
    pub ingested_at: String,
    pub status: DocumentStatus,
}

impl Document {
    pub fn generate_id(filename: &str) -> String {
        use sha2::{Digest, Sha256};
        let hash = Sha256::digest(filename.as_bytes());
        hex::encode(&hash[..16])
    }

    pub fn pending(filename: &str, size_bytes: u64) -> Self {
        Self {
            id: Self::generate_id(filename),
            filename: filename.to_string(),
            size_bytes,
            page_count: 0,
            chunk_count: 0,
            ingested_at: chrono::Utc::now().to_rfc3339(),
            status: DocumentStatus::Pending,
        }
    }
}

/// Cleaned plain text of one PDF page. Page numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub page_number: u32,
    pub text: String,
}

/// The atomic retrieval unit: a bounded, sentence-aligned span of document
/// text with enough metadata to reconstruct document order and provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub text: String,
    /// Position within the document; assigned monotonically by the chunker.
    pub seq_index: u32,
    /// First and last page the chunk's sentences came from.
    pub page_start: u32,
    pub page_end: u32,
    /// Approximate token count (chars / 4).
    pub token_count: u32,
    /// Leading sentences shared with the previous chunk (0 for the first).
    pub overlap_leading: u32,
}

impl Chunk {
    /// Deterministic chunk id: the same document and position always map to
    /// the same point id, so re-ingestion overwrites in place.
    pub fn generate_id(document_id: &str, seq_index: u32) -> String {
        use uuid::Uuid;
        let name = format!("{}:{}", document_id, seq_index);
        Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
    }
}
