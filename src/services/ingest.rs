//! Pipeline façade: ingestion, question answering, and status.
//!
//! Owns the document registry and the per-document locks that serialize
//! ingestion of one filename against itself while letting different
//! documents proceed concurrently.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use crate::error::{AskError, EmbeddingError, IngestError, InputError};
use crate::models::{
    AskOutcome, Config, ConversationTurn, Document, DocumentStatus, IngestReport, StatusReport,
};
use crate::services::chunker::Chunker;
use crate::services::completion::{CompletionProvider, HttpCompletionClient};
use crate::services::composer::AnswerComposer;
use crate::services::embedding::{EmbeddingProvider, HttpEmbeddingClient};
use crate::services::extractor;
use crate::services::retriever::Retriever;
use crate::services::vector_store::{VectorStore, create_backend};
use crate::utils::retry::{RetryPolicy, with_retry};

/// PDF files start with this magic within the first kilobyte.
const PDF_MAGIC: &[u8] = b"%PDF-";
const MAGIC_SCAN_WINDOW: usize = 1024;

struct DocumentEntry {
    document: Document,
    lock: Arc<Mutex<()>>,
}

/// On-disk mirror of the registry, so separate CLI invocations agree on
/// what the (externally persistent) vector index holds.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Manifest {
    documents: Vec<Document>,
}

/// The document ingestion and retrieval pipeline behind the `ingest`, `ask`
/// and `status` boundaries. Stateless apart from the vector index and the
/// registry mirroring what the index holds.
pub struct Pipeline {
    config: Config,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    chunker: Chunker,
    retriever: Retriever,
    composer: AnswerComposer,
    retry: RetryPolicy,
    registry: RwLock<HashMap<String, DocumentEntry>>,
    manifest_path: Option<PathBuf>,
}

impl Pipeline {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        completer: Arc<dyn CompletionProvider>,
        store: Arc<dyn VectorStore>,
        config: Config,
        retry: RetryPolicy,
    ) -> Self {
        let retriever = Retriever::new(
            embedder.clone(),
            store.clone(),
            config.retrieval.clone(),
            retry.clone(),
        );
        let composer =
            AnswerComposer::new(completer, config.retrieval.history_turns, retry.clone());
        let chunker = Chunker::new(&config.ingestion);

        Self {
            embedder,
            store,
            chunker,
            retriever,
            composer,
            retry,
            config,
            registry: RwLock::new(HashMap::new()),
            manifest_path: None,
        }
    }

    /// Build the pipeline from configuration: HTTP providers plus the
    /// configured vector index backend.
    ///
    /// With the Qdrant backend the document registry is mirrored to a small
    /// manifest file, so separate invocations see the same document set the
    /// index holds. The in-memory backend loses its vectors on exit, so no
    /// manifest is kept for it.
    pub async fn from_config(config: Config) -> anyhow::Result<Self> {
        let api_key = Config::api_key();
        let embedder = Arc::new(HttpEmbeddingClient::new(
            &config.embedding,
            api_key.as_deref(),
        )?);
        let completer = Arc::new(HttpCompletionClient::new(
            &config.completion,
            api_key.as_deref(),
        )?);
        let store = create_backend(&config.vector_store, config.embedding.dimension).await?;

        let persistent = config.vector_store.driver == crate::models::VectorDriver::Qdrant;
        let mut pipeline = Self::new(embedder, completer, store, config, RetryPolicy::default());
        if persistent {
            pipeline.manifest_path = manifest_path();
            pipeline.load_manifest().await;
        }
        Ok(pipeline)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Ingest a PDF: validate, extract, chunk, embed, then atomically swap
    /// the document's chunk set in the index.
    ///
    /// All-or-nothing per document: on failure nothing is written and a
    /// previously ready version of the same filename stays queryable.
    pub async fn ingest(&self, filename: &str, bytes: &[u8]) -> Result<IngestReport, IngestError> {
        let start = Instant::now();
        validate_upload(filename, bytes, self.config.ingestion.max_file_bytes)?;

        let (doc_lock, prior) = self.begin_ingest(filename, bytes.len() as u64).await;
        let _guard = doc_lock.lock().await;

        // Everything up to here computes; nothing has touched the index yet,
        // so a failure leaves the prior version fully intact.
        let prepared = match self.prepare_chunks(filename, bytes).await {
            Ok(prepared) => prepared,
            Err(e) => {
                self.finish_failed(filename, prior).await;
                return Err(e);
            }
        };

        let (document_id, page_count, points) = prepared;
        let chunk_count = points.len() as u32;

        // Commit: delete-then-upsert under the document lock is the atomic
        // swap that keeps a single active chunk set per filename.
        if let Err(e) = self.commit_chunks(&document_id, points).await {
            self.finish_failed(filename, None).await;
            return Err(e);
        }

        let report = IngestReport {
            document_id: document_id.clone(),
            filename: filename.to_string(),
            pages: page_count,
            chunks: chunk_count,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        self.finish_ready(filename, page_count, chunk_count).await;

        tracing::info!(
            filename,
            pages = page_count,
            chunks = chunk_count,
            "document ingested"
        );
        Ok(report)
    }

    /// Answer a question from ingested content.
    ///
    /// `document` scopes retrieval to one filename; with no filter the
    /// question runs over every ready document. A question racing a
    /// re-ingestion of its target waits for the new version to commit.
    pub async fn ask(
        &self,
        question: &str,
        history: &[ConversationTurn],
        document: Option<&str>,
    ) -> Result<AskOutcome, AskError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AskError::EmptyQuestion);
        }

        // Wait out in-flight ingestion on the documents this question may
        // touch, so it never sees a half-swapped chunk set.
        let pending_locks: Vec<Arc<Mutex<()>>> = {
            let registry = self.registry.read().await;
            match document {
                Some(name) => {
                    let entry = registry
                        .get(name)
                        .ok_or_else(|| AskError::UnknownDocument(name.to_string()))?;
                    vec![entry.lock.clone()]
                }
                None => registry.values().map(|e| e.lock.clone()).collect(),
            }
        };
        for lock in pending_locks {
            drop(lock.lock().await);
        }

        let target: Option<String> = {
            let registry = self.registry.read().await;
            match document {
                Some(name) => {
                    let entry = registry
                        .get(name)
                        .ok_or_else(|| AskError::UnknownDocument(name.to_string()))?;
                    if entry.document.status != DocumentStatus::Ready {
                        return Ok(AskOutcome::NoDocument);
                    }
                    Some(entry.document.id.clone())
                }
                None => {
                    let ready: Vec<&DocumentEntry> = registry
                        .values()
                        .filter(|e| e.document.status == DocumentStatus::Ready)
                        .collect();
                    match ready.len() {
                        0 => return Ok(AskOutcome::NoDocument),
                        1 => Some(ready[0].document.id.clone()),
                        _ => None,
                    }
                }
            }
        };

        let selected = self
            .retriever
            .retrieve(question, self.config.retrieval.top_k, target.as_deref())
            .await?;

        if selected.is_empty() {
            tracing::debug!("no chunk scored above threshold");
            return Ok(AskOutcome::InsufficientContext);
        }

        let (sources, context) = self.retriever.assemble_context(selected);
        let text = self.composer.compose(question, &context, history).await?;

        Ok(AskOutcome::Answer { text, sources })
    }

    /// Snapshot of ingested documents and chunk counts.
    pub async fn status(&self) -> StatusReport {
        let registry = self.registry.read().await;
        let mut documents: Vec<Document> =
            registry.values().map(|e| e.document.clone()).collect();
        documents.sort_by(|a, b| a.filename.cmp(&b.filename));

        let ready: Vec<&Document> = documents
            .iter()
            .filter(|d| d.status == DocumentStatus::Ready)
            .collect();
        let chunk_count = ready.iter().map(|d| u64::from(d.chunk_count)).sum();

        StatusReport {
            has_content: !ready.is_empty(),
            document_count: ready.len() as u32,
            chunk_count,
            documents,
        }
    }

    async fn begin_ingest(
        &self,
        filename: &str,
        size_bytes: u64,
    ) -> (Arc<Mutex<()>>, Option<Document>) {
        let mut registry = self.registry.write().await;
        let entry = registry
            .entry(filename.to_string())
            .or_insert_with(|| DocumentEntry {
                document: Document::pending(filename, size_bytes),
                lock: Arc::new(Mutex::new(())),
            });
        let prior = (entry.document.status == DocumentStatus::Ready)
            .then(|| entry.document.clone());
        entry.document.size_bytes = size_bytes;
        entry.document.status = DocumentStatus::Pending;
        (entry.lock.clone(), prior)
    }

    /// Extract, chunk and embed; no index writes happen here.
    ///
    /// Embedding batches run concurrently up to the configured cap. Each
    /// task pairs vectors with the chunks of its own batch, so points carry
    /// their chunk id and completion order never matters.
    async fn prepare_chunks(
        &self,
        filename: &str,
        bytes: &[u8],
    ) -> Result<(String, u32, Vec<(crate::models::Chunk, Vec<f32>)>), IngestError> {
        let pages = extractor::extract(bytes)?;
        let page_count = extractor::page_count(bytes);
        let document_id = Document::generate_id(filename);
        let chunks = self.chunker.chunk(&document_id, &pages);

        let batch_size = self.config.embedding.batch_size.max(1) as usize;
        let concurrency = self.config.embedding.concurrency.max(1) as usize;
        let mut batches = chunks
            .chunks(batch_size)
            .map(<[crate::models::Chunk]>::to_vec)
            .collect::<Vec<_>>()
            .into_iter();

        let mut points = Vec::with_capacity(chunks.len());
        let mut tasks = tokio::task::JoinSet::new();

        loop {
            while tasks.len() < concurrency {
                let Some(batch) = batches.next() else { break };
                let embedder = self.embedder.clone();
                let retry = self.retry.clone();
                tasks.spawn(async move {
                    let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
                    let vectors = with_retry(&retry, || embedder.embed_batch(texts.clone()))
                        .await
                        .into_result()?;
                    if vectors.len() != batch.len() {
                        return Err(EmbeddingError::InvalidResponse(format!(
                            "expected {} vectors, got {}",
                            batch.len(),
                            vectors.len()
                        )));
                    }
                    Ok(batch.into_iter().zip(vectors).collect::<Vec<_>>())
                });
            }

            let Some(joined) = tasks.join_next().await else {
                break;
            };
            // Dropping the set on error aborts outstanding batches.
            let pairs = joined
                .map_err(|e| EmbeddingError::InvalidResponse(format!("embedding task: {e}")))??;
            points.extend(pairs);
        }

        Ok((document_id, page_count, points))
    }

    async fn commit_chunks(
        &self,
        document_id: &str,
        points: Vec<(crate::models::Chunk, Vec<f32>)>,
    ) -> Result<(), IngestError> {
        self.store.ensure_collection().await?;
        self.store.delete_by_document(document_id).await?;
        self.store.upsert_chunks(points).await?;
        Ok(())
    }

    async fn finish_ready(&self, filename: &str, page_count: u32, chunk_count: u32) {
        {
            let mut registry = self.registry.write().await;
            if let Some(entry) = registry.get_mut(filename) {
                entry.document.page_count = page_count;
                entry.document.chunk_count = chunk_count;
                entry.document.ingested_at = chrono::Utc::now().to_rfc3339();
                entry.document.status = DocumentStatus::Ready;
            }
        }
        self.save_manifest().await;
    }

    /// Record a failed ingestion. When a prior ready version exists its
    /// chunks are still in the index, so the registry is rolled back to it.
    async fn finish_failed(&self, filename: &str, prior: Option<Document>) {
        {
            let mut registry = self.registry.write().await;
            if let Some(entry) = registry.get_mut(filename) {
                match prior {
                    Some(document) => entry.document = document,
                    None => entry.document.status = DocumentStatus::Failed,
                }
            }
        }
        self.save_manifest().await;
    }

    async fn load_manifest(&self) {
        let Some(ref path) = self.manifest_path else {
            return;
        };
        let Ok(content) = std::fs::read_to_string(path) else {
            return;
        };
        let manifest: Manifest = match serde_json::from_str(&content) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(error = %e, "ignoring unreadable document manifest");
                return;
            }
        };

        let mut registry = self.registry.write().await;
        for mut document in manifest.documents {
            // An ingest that never finished in a previous process is failed.
            if document.status == DocumentStatus::Pending {
                document.status = DocumentStatus::Failed;
            }
            registry.insert(
                document.filename.clone(),
                DocumentEntry {
                    document,
                    lock: Arc::new(Mutex::new(())),
                },
            );
        }
    }

    async fn save_manifest(&self) {
        let Some(ref path) = self.manifest_path else {
            return;
        };
        let manifest = {
            let registry = self.registry.read().await;
            Manifest {
                documents: registry.values().map(|e| e.document.clone()).collect(),
            }
        };
        let result = (|| -> std::io::Result<()> {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let content = serde_json::to_string_pretty(&manifest)?;
            std::fs::write(path, content)
        })();
        if let Err(e) = result {
            tracing::warn!(error = %e, "failed to save document manifest");
        }
    }
}

fn manifest_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("pdfchat").join("documents.json"))
}

/// Reject oversized or non-PDF uploads before any extraction work begins.
fn validate_upload(filename: &str, bytes: &[u8], max_bytes: u64) -> Result<(), InputError> {
    if bytes.is_empty() {
        return Err(InputError::EmptyUpload);
    }
    if bytes.len() as u64 > max_bytes {
        return Err(InputError::TooLarge {
            size: bytes.len() as u64,
            limit: max_bytes,
        });
    }
    let window = &bytes[..bytes.len().min(MAGIC_SCAN_WINDOW)];
    let has_magic = window
        .windows(PDF_MAGIC.len())
        .any(|w| w == PDF_MAGIC);
    if !has_magic {
        return Err(InputError::NotPdf(filename.to_string()));
    }
    Ok(())
}
