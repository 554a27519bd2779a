//! Query-side retrieval: embed the question, search the index, filter and
//! rank, then assemble a bounded context block.
//!
//! Similarity order decides which chunks are *selected*; document order
//! decides how they are *presented*. The model reasons better over text in
//! its original sequence than over a scrambled most-relevant-first list.

use std::fmt::Write as FmtWrite;
use std::sync::Arc;

use crate::error::AskError;
use crate::models::{RetrievalConfig, ScoredChunk};
use crate::services::embedding::EmbeddingProvider;
use crate::services::vector_store::VectorStore;
use crate::utils::retry::{RetryPolicy, with_retry};

pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    config: RetrievalConfig,
    retry: RetryPolicy,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        config: RetrievalConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            embedder,
            store,
            config,
            retry,
        }
    }

    /// Retrieve up to `top_k` chunks relevant to the question, in descending
    /// score order with ties broken by ascending sequence index.
    ///
    /// An empty result means nothing scored above the similarity threshold;
    /// callers treat that as a first-class outcome, not an error.
    pub async fn retrieve(
        &self,
        question: &str,
        top_k: u32,
        document_id: Option<&str>,
    ) -> Result<Vec<ScoredChunk>, AskError> {
        let query_vector = with_retry(&self.retry, || self.embedder.embed_query(question))
            .await
            .into_result()?;

        // Over-fetch so the threshold cut still leaves enough candidates.
        let candidates = u64::from(top_k) * u64::from(self.config.candidate_multiplier);
        let mut results = self
            .store
            .search(
                query_vector,
                candidates,
                document_id,
                Some(self.config.min_score),
            )
            .await?;

        results.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.chunk.seq_index.cmp(&b.chunk.seq_index))
        });
        results.truncate(top_k as usize);

        tracing::debug!(
            question_len = question.len(),
            selected = results.len(),
            "retrieval complete"
        );
        Ok(results)
    }

    /// Arrange selected chunks for presentation and concatenate them into a
    /// context block, bounded by the configured token budget.
    ///
    /// Chunks are ordered by ascending sequence index (document order), not
    /// by score. Returns the chunks actually included, in presentation
    /// order, alongside the assembled text.
    pub fn assemble_context(&self, selected: Vec<ScoredChunk>) -> (Vec<ScoredChunk>, String) {
        let mut ordered = selected;
        ordered.sort_by(|a, b| {
            a.chunk
                .document_id
                .cmp(&b.chunk.document_id)
                .then_with(|| a.chunk.seq_index.cmp(&b.chunk.seq_index))
        });

        let budget = self.config.context_token_budget as u64;
        let mut included = Vec::with_capacity(ordered.len());
        let mut context = String::new();
        let mut used_tokens = 0u64;

        for scored in ordered {
            let chunk_tokens = u64::from(scored.chunk.token_count.max(1));
            if used_tokens + chunk_tokens > budget && !included.is_empty() {
                break;
            }
            if !context.is_empty() {
                context.push_str("\n\n");
            }
            let pages = if scored.chunk.page_start == scored.chunk.page_end {
                format!("{}", scored.chunk.page_start)
            } else {
                format!("{}-{}", scored.chunk.page_start, scored.chunk.page_end)
            };
            write!(context, "[Page {}] {}", pages, scored.chunk.text).unwrap();
            used_tokens += chunk_tokens;
            included.push(scored);
        }

        (included, context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EmbeddingError;
    use crate::models::Chunk;
    use crate::services::vector_store::MemoryBackend;
    use async_trait::async_trait;

    /// Deterministic embedder: maps known phrases to fixed unit vectors.
    struct StubEmbedder;

    fn unit(v: [f32; 3]) -> Vec<f32> {
        let mag = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        v.iter().map(|x| x / mag).collect()
    }

    fn vector_for(text: &str) -> Vec<f32> {
        if text.contains("alpha") {
            unit([1.0, 0.1, 0.0])
        } else if text.contains("beta") {
            unit([0.0, 1.0, 0.1])
        } else {
            unit([0.1, 0.1, 1.0])
        }
    }

    #[async_trait]
    impl EmbeddingProvider for StubEmbedder {
        async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts.iter().map(|t| vector_for(t)).collect())
        }

        fn dimension(&self) -> u32 {
            3
        }
    }

    /// Five chunks, sequence indices 0-4; chunk 3 is closest to the "alpha"
    /// query direction, chunks 1-2 are near misses, 0 and 4 are unrelated.
    fn seeded_points() -> Vec<(Chunk, Vec<f32>)> {
        vec![
            (
                chunk(0, "intro text with nothing special"),
                unit([0.1, 0.1, 1.0]),
            ),
            (chunk(1, "alpha topic begins here"), unit([0.9, 0.3, 0.0])),
            (
                chunk(2, "alpha continues with detail"),
                unit([0.85, 0.4, 0.0]),
            ),
            (
                chunk(3, "the best alpha material lives here"),
                unit([1.0, 0.1, 0.0]),
            ),
            (chunk(4, "closing beta remarks"), unit([0.0, 1.0, 0.1])),
        ]
    }

    fn chunk(seq_index: u32, text: &str) -> Chunk {
        Chunk {
            id: Chunk::generate_id("doc", seq_index),
            document_id: "doc".to_string(),
            text: text.to_string(),
            seq_index,
            page_start: seq_index / 2 + 1,
            page_end: seq_index / 2 + 1,
            token_count: 10,
            overlap_leading: if seq_index == 0 { 0 } else { 2 },
        }
    }

    async fn seeded_retriever(config: RetrievalConfig) -> Retriever {
        let store = Arc::new(MemoryBackend::new("test"));
        store.upsert_chunks(seeded_points()).await.unwrap();
        Retriever::new(Arc::new(StubEmbedder), store, config, RetryPolicy::none())
    }

    #[tokio::test]
    async fn test_retrieve_orders_by_score_and_limits() {
        let retriever = seeded_retriever(RetrievalConfig {
            min_score: 0.3,
            ..Default::default()
        })
        .await;

        let results = retriever
            .retrieve("tell me about alpha", 3, None)
            .await
            .unwrap();
        assert!(results.len() <= 3);
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        // Chunk 3 has the best score for this question.
        assert_eq!(results[0].chunk.seq_index, 3);
    }

    #[tokio::test]
    async fn test_retrieve_empty_below_threshold() {
        let retriever = seeded_retriever(RetrievalConfig {
            min_score: 0.99,
            ..Default::default()
        })
        .await;

        let results = retriever
            .retrieve("completely unrelated question", 3, None)
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_context_presented_in_document_order() {
        let retriever = seeded_retriever(RetrievalConfig {
            min_score: 0.3,
            ..Default::default()
        })
        .await;

        // Selection is by similarity (chunk 3 scores highest); presentation
        // must be ascending sequence order regardless.
        let selected = retriever
            .retrieve("tell me about alpha", 3, None)
            .await
            .unwrap();
        assert_eq!(selected[0].chunk.seq_index, 3);

        let (included, context) = retriever.assemble_context(selected);
        let order: Vec<u32> = included.iter().map(|s| s.chunk.seq_index).collect();
        let mut sorted = order.clone();
        sorted.sort_unstable();
        assert_eq!(order, sorted);

        let first_pos = context.find("alpha topic begins").unwrap();
        let best_pos = context.find("best alpha material").unwrap();
        assert!(first_pos < best_pos);
        assert!(context.starts_with("[Page "));
    }

    #[tokio::test]
    async fn test_context_budget_bounds_output() {
        let retriever = seeded_retriever(RetrievalConfig {
            min_score: 0.0,
            context_token_budget: 15,
            ..Default::default()
        })
        .await;

        let selected = retriever
            .retrieve("tell me about alpha", 5, None)
            .await
            .unwrap();
        let total = selected.len();
        let (included, _) = retriever.assemble_context(selected);
        // 10-token chunks against a 15-token budget: only one fits.
        assert_eq!(included.len(), 1);
        assert!(total > included.len());
    }

    #[tokio::test]
    async fn test_tie_break_ascending_sequence() {
        let store = Arc::new(MemoryBackend::new("test"));
        let v = unit([1.0, 0.0, 0.0]);
        store
            .upsert_chunks(vec![
                (chunk(4, "alpha one"), v.clone()),
                (chunk(1, "alpha two"), v.clone()),
                (chunk(2, "alpha three"), v.clone()),
            ])
            .await
            .unwrap();
        let retriever = Retriever::new(
            Arc::new(StubEmbedder),
            store,
            RetrievalConfig {
                min_score: 0.0,
                ..Default::default()
            },
            RetryPolicy::none(),
        );

        let results = retriever.retrieve("alpha question", 2, None).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.seq_index, 1);
        assert_eq!(results[1].chunk.seq_index, 2);
    }
}
