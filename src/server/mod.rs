//! HTTP API for the pipeline.
//!
//! | Method | Path         | Description                              |
//! |--------|--------------|------------------------------------------|
//! | `GET`  | `/health`    | Health check (returns version)           |
//! | `GET`  | `/status`    | Document and chunk counts                |
//! | `POST` | `/documents` | Multipart PDF upload → ingestion report  |
//! | `POST` | `/ask`       | Question + history → grounded answer     |
//!
//! Error responses all follow one schema:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question cannot be empty" } }
//! ```
//!
//! CORS is permissive to support browser-based upload/chat frontends.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};

use crate::error::{AskError, IngestError};
use crate::models::{AskOutcome, ConversationTurn};
use crate::services::Pipeline;

#[derive(Clone)]
struct AppState {
    pipeline: Arc<Pipeline>,
}

/// Run the HTTP API until the process is terminated.
pub async fn run_server(pipeline: Arc<Pipeline>, bind: &str) -> anyhow::Result<()> {
    let upload_limit = pipeline.config().ingestion.max_file_bytes as usize + 1024 * 1024;
    let state = AppState { pipeline };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/documents", post(upload_document))
        .route("/ask", post(ask))
        .layer(DefaultBodyLimit::max(upload_limit))
        .layer(cors)
        .with_state(state);

    tracing::info!(bind, "pdfchat API listening");
    println!("pdfchat API listening on http://{bind}");

    let listener = tokio::net::TcpListener::bind(bind).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": { "code": self.code, "message": self.message }
        });
        (self.status, Json(body)).into_response()
    }
}

impl From<IngestError> for ApiError {
    fn from(e: IngestError) -> Self {
        match &e {
            IngestError::Input(_) => ApiError::bad_request(e.to_string()),
            IngestError::Extract(_) => {
                ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, "unreadable_pdf", e.to_string())
            }
            IngestError::Embedding(_) | IngestError::VectorStore(_) => {
                ApiError::new(StatusCode::BAD_GATEWAY, "upstream_error", e.to_string())
            }
        }
    }
}

impl From<AskError> for ApiError {
    fn from(e: AskError) -> Self {
        match &e {
            AskError::EmptyQuestion => ApiError::bad_request(e.to_string()),
            AskError::UnknownDocument(_) => {
                ApiError::new(StatusCode::NOT_FOUND, "not_found", e.to_string())
            }
            AskError::Embedding(_) | AskError::VectorStore(_) | AskError::Completion(_) => {
                ApiError::new(StatusCode::BAD_GATEWAY, "upstream_error", e.to_string())
            }
        }
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn status(State(state): State<AppState>) -> Json<serde_json::Value> {
    let report = state.pipeline.status().await;
    Json(json!({
        "has_content": report.has_content,
        "document_count": report.document_count,
        "chunk_count": report.chunk_count,
        "documents": report.documents,
    }))
}

async fn upload_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(|n| n.to_string())
            .ok_or_else(|| ApiError::bad_request("file part has no filename"))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(e.to_string()))?;
        upload = Some((filename, bytes.to_vec()));
        break;
    }

    let (filename, bytes) =
        upload.ok_or_else(|| ApiError::bad_request("multipart field 'file' is required"))?;

    let report = state.pipeline.ingest(&filename, &bytes).await?;
    Ok(Json(json!({
        "status": "ready",
        "document": report,
    })))
}

#[derive(Debug, Deserialize)]
struct AskRequest {
    question: String,
    #[serde(default)]
    history: Vec<ConversationTurn>,
    #[serde(default)]
    document: Option<String>,
}

async fn ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let outcome = state
        .pipeline
        .ask(
            &request.question,
            &request.history,
            request.document.as_deref(),
        )
        .await?;

    let body = match &outcome {
        AskOutcome::Answer { text, sources } => json!({
            "outcome": "answer",
            "answer": text,
            "sources": sources,
        }),
        AskOutcome::NoDocument | AskOutcome::InsufficientContext => json!({
            "outcome": outcome_code(&outcome),
            "message": outcome.display_text(),
        }),
    };
    Ok(Json(body))
}

fn outcome_code(outcome: &AskOutcome) -> &'static str {
    match outcome {
        AskOutcome::Answer { .. } => "answer",
        AskOutcome::NoDocument => "no_document",
        AskOutcome::InsufficientContext => "insufficient_context",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_code() {
        assert_eq!(outcome_code(&AskOutcome::NoDocument), "no_document");
        assert_eq!(
            outcome_code(&AskOutcome::InsufficientContext),
            "insufficient_context"
        );
    }

    #[test]
    fn test_api_error_mapping() {
        let e: ApiError = AskError::EmptyQuestion.into();
        assert_eq!(e.status, StatusCode::BAD_REQUEST);

        let e: ApiError = AskError::UnknownDocument("x.pdf".into()).into();
        assert_eq!(e.status, StatusCode::NOT_FOUND);

        let e: ApiError =
            IngestError::Extract(crate::error::ExtractError::EmptyDocument).into();
        assert_eq!(e.status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
