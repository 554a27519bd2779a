//! End-to-end pipeline tests over the in-memory vector index.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use pdfchat::error::{CompletionError, EmbeddingError};
use pdfchat::models::{AskOutcome, Config, ConversationTurn, DocumentStatus, VectorDriver};
use pdfchat::services::{
    ChatMessage, CompletionProvider, EmbeddingProvider, MemoryBackend, Pipeline,
};
use pdfchat::utils::retry::RetryPolicy;

/// Minimal valid PDF with one page per input string, with correct xref
/// offsets so lopdf can parse it.
fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    let n = pages.len();
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let mut offsets = Vec::new();

    offsets.push(out.len());
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");

    let kids: Vec<String> = (0..n).map(|i| format!("{} 0 R", 3 + 2 * i)).collect();
    offsets.push(out.len());
    out.extend_from_slice(
        format!(
            "2 0 obj << /Type /Pages /Kids [{}] /Count {} >> endobj\n",
            kids.join(" "),
            n
        )
        .as_bytes(),
    );

    let font_obj = 3 + 2 * n;
    for (i, text) in pages.iter().enumerate() {
        let page_obj = 3 + 2 * i;
        let content_obj = page_obj + 1;
        offsets.push(out.len());
        out.extend_from_slice(
            format!(
                "{page_obj} 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
                 /Contents {content_obj} 0 R /Resources << /Font << /F1 {font_obj} 0 R >> >> >> endobj\n"
            )
            .as_bytes(),
        );
        let escaped = text.replace('\\', "\\\\").replace('(', "\\(").replace(')', "\\)");
        let stream = format!("BT /F1 12 Tf 72 720 Td ({escaped}) Tj ET");
        offsets.push(out.len());
        out.extend_from_slice(
            format!(
                "{content_obj} 0 obj << /Length {} >> stream\n{stream}\nendstream endobj\n",
                stream.len()
            )
            .as_bytes(),
        );
    }

    offsets.push(out.len());
    out.extend_from_slice(
        format!("{font_obj} 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n")
            .as_bytes(),
    );

    let total_objs = font_obj + 1;
    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {total_objs}\n").as_bytes());
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for off in &offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", off).as_bytes());
    }
    out.extend_from_slice(
        format!("trailer << /Size {total_objs} /Root 1 0 R >>\nstartxref\n{xref_start}\n%%EOF\n")
            .as_bytes(),
    );
    out
}

/// Deterministic embedder with non-negative components, so cosine scores
/// are always positive and equal texts embed equally.
struct HashEmbedder;

fn hash_vector(text: &str) -> Vec<f32> {
    let mut v = [1.0f32; 8];
    for (i, b) in text.bytes().enumerate() {
        v[(b as usize + i) % 8] += f32::from(b % 13);
    }
    let mag = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    v.iter().map(|x| x / mag).collect()
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| hash_vector(t)).collect())
    }

    fn dimension(&self) -> u32 {
        8
    }
}

struct EchoCompleter;

#[async_trait]
impl CompletionProvider for EchoCompleter {
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, CompletionError> {
        Ok(format!("answered from {} messages", messages.len()))
    }
}

struct BrokenCompleter;

#[async_trait]
impl CompletionProvider for BrokenCompleter {
    async fn complete(&self, _messages: Vec<ChatMessage>) -> Result<String, CompletionError> {
        Err(CompletionError::Server("status 500: model down".to_string()))
    }
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.vector_store.driver = VectorDriver::Memory;
    config.retrieval.min_score = 0.0;
    config.ingestion.chunk_max_tokens = 30;
    config
}

fn pipeline(completer: Arc<dyn CompletionProvider>) -> (Pipeline, Arc<MemoryBackend>) {
    let config = test_config();
    let store = Arc::new(MemoryBackend::new(&config.vector_store.collection));
    let retry = RetryPolicy::default().with_initial_delay(Duration::from_millis(5));
    (
        Pipeline::new(Arc::new(HashEmbedder), completer, store.clone(), config, retry),
        store,
    )
}

fn sample_pdf() -> Vec<u8> {
    pdf_with_pages(&[
        "The first page introduces the subject. It sets out the main claims plainly.",
        "The second page develops the argument. Evidence accumulates sentence by sentence.",
        "The third page concludes the matter. Loose ends are tied up neatly here.",
    ])
}

#[tokio::test]
async fn ingest_then_ask_round_trip() {
    let (pipeline, _store) = pipeline(Arc::new(EchoCompleter));

    let report = pipeline.ingest("sample.pdf", &sample_pdf()).await.unwrap();
    assert_eq!(report.pages, 3);
    assert!(report.chunks >= 3);

    let outcome = pipeline
        .ask("What does the argument develop into?", &[], None)
        .await
        .unwrap();
    let AskOutcome::Answer { text, sources } = outcome else {
        panic!("expected an answer");
    };
    assert!(text.starts_with("answered from"));

    // Selection is by similarity; presentation is ascending document order.
    let order: Vec<u32> = sources.iter().map(|s| s.chunk.seq_index).collect();
    let mut sorted = order.clone();
    sorted.sort_unstable();
    assert_eq!(order, sorted);
    assert!(sources.iter().all(|s| s.chunk.page_start >= 1));
}

#[tokio::test]
async fn reingest_supersedes_previous_chunk_set() {
    let (pipeline, store) = pipeline(Arc::new(EchoCompleter));

    let first = pipeline.ingest("sample.pdf", &sample_pdf()).await.unwrap();
    let shorter = pdf_with_pages(&["A single short replacement page with one sentence."]);
    let second = pipeline.ingest("sample.pdf", &shorter).await.unwrap();

    assert!(second.chunks < first.chunks);
    // Exactly one active chunk set: old chunks are unreachable.
    use pdfchat::services::VectorStore;
    assert_eq!(store.chunk_count().await.unwrap(), u64::from(second.chunks));

    let status = pipeline.status().await;
    assert_eq!(status.document_count, 1);
    assert_eq!(status.chunk_count, u64::from(second.chunks));
    assert_eq!(status.documents[0].status, DocumentStatus::Ready);
    assert_eq!(status.documents[0].page_count, 1);
}

#[tokio::test]
async fn history_flows_into_the_prompt() {
    let (pipeline, _store) = pipeline(Arc::new(EchoCompleter));
    pipeline.ingest("sample.pdf", &sample_pdf()).await.unwrap();

    let history = vec![
        ConversationTurn::user("What is this about?"),
        ConversationTurn::assistant("It is about an argument."),
    ];
    let outcome = pipeline
        .ask("And how does it conclude?", &history, None)
        .await
        .unwrap();
    let AskOutcome::Answer { text, .. } = outcome else {
        panic!("expected an answer");
    };
    // system + 2 history turns + question
    assert_eq!(text, "answered from 4 messages");
}

#[tokio::test]
async fn failed_answer_leaves_pipeline_usable() {
    let config = test_config();
    let store = Arc::new(MemoryBackend::new(&config.vector_store.collection));
    let retry = RetryPolicy::new(1);

    let broken = Pipeline::new(
        Arc::new(HashEmbedder),
        Arc::new(BrokenCompleter),
        store.clone(),
        config.clone(),
        retry.clone(),
    );
    broken.ingest("sample.pdf", &sample_pdf()).await.unwrap();
    broken.ask("anything?", &[], None).await.unwrap_err();

    // The index is untouched by the failed answer; a healthy completer
    // over the same store answers fine.
    let healthy = Pipeline::new(
        Arc::new(HashEmbedder),
        Arc::new(EchoCompleter),
        store,
        config,
        retry,
    );
    healthy.ingest("sample.pdf", &sample_pdf()).await.unwrap();
    let outcome = healthy.ask("anything?", &[], None).await.unwrap();
    assert!(matches!(outcome, AskOutcome::Answer { .. }));
}

#[tokio::test]
async fn status_reflects_empty_pipeline() {
    let (pipeline, _store) = pipeline(Arc::new(EchoCompleter));
    let status = pipeline.status().await;
    assert!(!status.has_content);
    assert_eq!(status.document_count, 0);
    assert_eq!(status.chunk_count, 0);

    let outcome = pipeline.ask("hello?", &[], None).await.unwrap();
    assert!(matches!(outcome, AskOutcome::NoDocument));
}
