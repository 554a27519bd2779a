//! Conversation and boundary types for the question-answering path.

use serde::{Deserialize, Serialize};

use super::retrieval::ScoredChunk;

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One turn of a session-scoped conversation. The pipeline never stores
/// these; the caller owns the history and passes it into every ask.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub text: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            timestamp: Some(chrono::Utc::now().to_rfc3339()),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            timestamp: Some(chrono::Utc::now().to_rfc3339()),
        }
    }
}

/// Result of asking a question. "Nothing relevant enough" and "nothing
/// loaded" are outcomes, not errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AskOutcome {
    Answer {
        text: String,
        /// Chunks the answer was grounded on, in the order they were
        /// presented to the model.
        sources: Vec<ScoredChunk>,
    },
    /// No document has been ingested yet.
    NoDocument,
    /// Every candidate scored below the similarity threshold.
    InsufficientContext,
}

impl AskOutcome {
    /// Short human-readable text for non-answer outcomes.
    pub fn display_text(&self) -> &str {
        match self {
            AskOutcome::Answer { text, .. } => text,
            AskOutcome::NoDocument => "No document loaded. Ingest a PDF first.",
            AskOutcome::InsufficientContext => {
                "The document does not contain anything relevant to that question."
            }
        }
    }
}

/// Summary returned by a successful ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub document_id: String,
    pub filename: String,
    pub pages: u32,
    pub chunks: u32,
    pub duration_ms: u64,
}

/// Snapshot of what the pipeline currently holds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub has_content: bool,
    pub document_count: u32,
    pub chunk_count: u64,
    pub documents: Vec<crate::models::Document>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_constructors() {
        let turn = ConversationTurn::user("hello");
        assert_eq!(turn.role, Role::User);
        assert!(turn.timestamp.is_some());
        assert_eq!(ConversationTurn::assistant("hi").role, Role::Assistant);
    }

    #[test]
    fn test_outcome_display_text() {
        assert!(AskOutcome::NoDocument.display_text().contains("No document"));
        let answer = AskOutcome::Answer {
            text: "42".to_string(),
            sources: vec![],
        };
        assert_eq!(answer.display_text(), "42");
    }

    #[test]
    fn test_outcome_serializes_with_tag() {
        let json = serde_json::to_string(&AskOutcome::InsufficientContext).unwrap();
        assert!(json.contains("insufficient_context"));
    }
}
