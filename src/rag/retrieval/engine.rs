//! Retrieval engine: query text to ranked, threshold-filtered chunks.

use crate::corpus::{Chunk, KnowledgeBase};
use crate::embedding::EmbeddingProvider;
use crate::errors::{RagError, Result};
use std::sync::Arc;

/// Search parameters for retrieval
#[derive(Debug, Clone, Copy)]
pub struct SearchParams {
    /// Maximum number of chunks to retrieve
    pub top_k: usize,
    /// Minimum cosine similarity for a chunk to count as relevant.
    /// A nearest neighbor below this is not grounding context.
    pub min_score: f32,
}

impl From<&crate::config::RetrievalConfig> for SearchParams {
    fn from(config: &crate::config::RetrievalConfig) -> Self {
        Self {
            top_k: config.top_k,
            min_score: config.min_score,
        }
    }
}

/// Retrieved chunk with its similarity score
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalResult {
    pub chunk: Chunk,
    pub score: f32,
}

/// Retrieval engine over the shared read-only knowledge base
pub struct Retriever {
    knowledge: Arc<KnowledgeBase>,
    embedder: Arc<dyn EmbeddingProvider>,
    default_params: SearchParams,
}

impl Retriever {
    pub fn new(
        knowledge: Arc<KnowledgeBase>,
        embedder: Arc<dyn EmbeddingProvider>,
        default_params: SearchParams,
    ) -> Self {
        Self {
            knowledge,
            embedder,
            default_params,
        }
    }

    /// Retrieve chunks relevant to the query with the default parameters
    pub async fn retrieve(&self, query: &str) -> Result<Vec<RetrievalResult>> {
        self.retrieve_with_params(query, self.default_params).await
    }

    /// Retrieve with explicit parameters.
    ///
    /// An empty result is a valid outcome meaning "no grounding
    /// context", never an error.
    pub async fn retrieve_with_params(
        &self,
        query: &str,
        params: SearchParams,
    ) -> Result<Vec<RetrievalResult>> {
        let query_vector = self.embed_query(query).await?;

        let hits = self
            .knowledge
            .index()
            .query(&query_vector, params.top_k)?;

        let results = hits
            .into_iter()
            .filter(|hit| hit.score >= params.min_score)
            .filter_map(|hit| {
                self.knowledge.store().get(hit.id).map(|chunk| RetrievalResult {
                    chunk: chunk.clone(),
                    score: hit.score,
                })
            })
            .collect();

        Ok(results)
    }

    /// Default search parameters
    pub fn default_params(&self) -> SearchParams {
        self.default_params
    }

    /// Embed the query, retrying once on provider failure.
    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        let vector = match self.embedder.embed(query).await {
            Ok(vector) => vector,
            Err(first) => self.embedder.embed(query).await.map_err(|_| {
                RagError::EmbeddingFailure(format!("query embedding failed twice: {}", first))
            })?,
        };

        let expected = self.knowledge.dimension();
        if vector.len() != expected {
            return Err(RagError::EmbeddingFailure(format!(
                "provider returned {} dimensions, index expects {}",
                vector.len(),
                expected
            )));
        }

        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::store::KnowledgeBase;
    use crate::embedding::HashedEmbedder;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    const DIM: usize = 64;

    async fn build_knowledge(texts: &[(u64, &str)]) -> Arc<KnowledgeBase> {
        let embedder = HashedEmbedder::new(DIM);
        let mut chunks = Vec::new();
        for (id, text) in texts {
            chunks.push(Chunk {
                id: *id,
                text: text.to_string(),
                source_document_id: "doc".to_string(),
                embedding: embedder.embed(text).await.unwrap(),
            });
        }
        Arc::new(KnowledgeBase::build(chunks, DIM).unwrap())
    }

    fn retriever(knowledge: Arc<KnowledgeBase>, params: SearchParams) -> Retriever {
        Retriever::new(knowledge, Arc::new(HashedEmbedder::new(DIM)), params)
    }

    #[tokio::test]
    async fn test_retrieve_ranks_relevant_chunk_first() {
        let knowledge = build_knowledge(&[
            (1, "погода сегодня солнечная и тёплая"),
            (2, "инвестиционный пай именная ценная бумага"),
        ])
        .await;
        let retriever = retriever(
            knowledge,
            SearchParams {
                top_k: 2,
                min_score: 0.0,
            },
        );

        let results = retriever
            .retrieve("что такое инвестиционный пай")
            .await
            .unwrap();

        assert_eq!(results[0].chunk.id, 2);
        assert!(results[0].score > results.get(1).map(|r| r.score).unwrap_or(0.0));
    }

    #[tokio::test]
    async fn test_threshold_filters_weak_matches() {
        let knowledge = build_knowledge(&[(1, "совершенно другая тема")]).await;
        let retriever = retriever(
            knowledge,
            SearchParams {
                top_k: 3,
                min_score: 0.9,
            },
        );

        let results = retriever.retrieve("инвестиционный пай").await.unwrap();

        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_empty_index_returns_empty_not_error() {
        let knowledge = build_knowledge(&[]).await;
        let retriever = retriever(
            knowledge,
            SearchParams {
                top_k: 3,
                min_score: 0.3,
            },
        );

        let results = retriever.retrieve("любой вопрос").await.unwrap();

        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_top_k_bounds_result_count() {
        let knowledge = build_knowledge(&[
            (1, "пай фонда"),
            (2, "пай фонда недвижимости"),
            (3, "пай закрытого фонда"),
        ])
        .await;
        let retriever = retriever(
            knowledge,
            SearchParams {
                top_k: 2,
                min_score: 0.0,
            },
        );

        let results = retriever.retrieve("пай").await.unwrap();

        assert_eq!(results.len(), 2);
    }

    /// Provider failing on the first call, succeeding on the second
    struct FlakyEmbedder {
        inner: HashedEmbedder,
        calls: AtomicU32,
        failures: u32,
    }

    #[async_trait]
    impl EmbeddingProvider for FlakyEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(RagError::EmbeddingFailure("provider offline".to_string()))
            } else {
                self.inner.embed(text).await
            }
        }

        fn dimension(&self) -> usize {
            self.inner.dimension()
        }
    }

    #[tokio::test]
    async fn test_embed_failure_is_retried_once() {
        let knowledge = build_knowledge(&[(1, "инвестиционный пай")]).await;
        let embedder = Arc::new(FlakyEmbedder {
            inner: HashedEmbedder::new(DIM),
            calls: AtomicU32::new(0),
            failures: 1,
        });
        let retriever = Retriever::new(
            knowledge,
            embedder.clone(),
            SearchParams {
                top_k: 1,
                min_score: 0.0,
            },
        );

        let results = retriever.retrieve("инвестиционный пай").await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_embed_failing_twice_surfaces_error() {
        let knowledge = build_knowledge(&[(1, "инвестиционный пай")]).await;
        let embedder = Arc::new(FlakyEmbedder {
            inner: HashedEmbedder::new(DIM),
            calls: AtomicU32::new(0),
            failures: u32::MAX,
        });
        let retriever = Retriever::new(
            knowledge,
            embedder,
            SearchParams {
                top_k: 1,
                min_score: 0.0,
            },
        );

        let result = retriever.retrieve("инвестиционный пай").await;

        assert!(matches!(result, Err(RagError::EmbeddingFailure(_))));
    }

    #[tokio::test]
    async fn test_wrong_dimension_is_embedding_failure() {
        let knowledge = build_knowledge(&[(1, "инвестиционный пай")]).await;
        // Provider dimension disagrees with the index
        let retriever = Retriever::new(
            knowledge,
            Arc::new(HashedEmbedder::new(DIM / 2)),
            SearchParams {
                top_k: 1,
                min_score: 0.0,
            },
        );

        let result = retriever.retrieve("инвестиционный пай").await;

        assert!(matches!(result, Err(RagError::EmbeddingFailure(_))));
    }
}
