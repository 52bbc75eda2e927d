//! End-to-end RAG pipeline.
//!
//! `answer` is the single entry point callers use: it validates the
//! query, drives retrieval, prompt assembly, and generation, and always
//! produces an `AnswerResult` — substituting the fallback response when
//! generation fails terminally. Only an invalid query surfaces as an
//! error, because that one belongs to the caller.

use crate::config::Config;
use crate::corpus::KnowledgeBase;
use crate::doctor::{ComponentHealth, HealthStatus};
use crate::embedding::EmbeddingProvider;
use crate::errors::{RagError, Result};
use crate::generation::{CompletionBackend, GenerationClient, RetryPolicy};
use crate::rag::prompt::PromptBuilder;
use crate::rag::retrieval::{RetrievalResult, Retriever, SearchParams};
use crate::telemetry::{TelemetryCollector, TelemetryEvent};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Fallback served when generation fails and nothing was retrieved
const FALLBACK_UNAVAILABLE: &str = "The answer-generation service is temporarily \
unavailable. Please try again later or contact a specialist.";

/// Fallback prefix when generation fails but grounding context exists
const FALLBACK_WITH_CONTEXT: &str = "The answer-generation service is temporarily \
unavailable. Here is the relevant information from our knowledge base:";

/// Final result of one answered query
#[derive(Debug, Clone, Serialize)]
pub struct AnswerResult {
    pub response_text: String,
    pub context_found: bool,
    pub processing_time_seconds: f64,
    pub retrieved_chunk_ids: Vec<u64>,
}

/// Top-level pipeline: retriever -> prompt builder -> generation client
pub struct RagPipeline<B: CompletionBackend> {
    retriever: Retriever,
    prompt_builder: PromptBuilder,
    generation: GenerationClient<B>,
    knowledge: Arc<KnowledgeBase>,
    telemetry: TelemetryCollector,
}

impl<B: CompletionBackend> RagPipeline<B> {
    pub fn new(
        knowledge: Arc<KnowledgeBase>,
        embedder: Arc<dyn EmbeddingProvider>,
        backend: B,
        config: &Config,
        telemetry: TelemetryCollector,
    ) -> Self {
        let retriever = Retriever::new(
            knowledge.clone(),
            embedder,
            SearchParams::from(&config.retrieval),
        );
        let prompt_builder = PromptBuilder::new(config.prompt.clone());
        let generation = GenerationClient::new(
            backend,
            RetryPolicy::from_config(&config.retry),
            telemetry.clone(),
        );

        Self {
            retriever,
            prompt_builder,
            generation,
            knowledge,
            telemetry,
        }
    }

    /// Answer a client question.
    ///
    /// Fails only with `InvalidQuery`; every system failure below this
    /// point degrades into the returned `AnswerResult` instead of
    /// crashing the request. Processing time covers everything from
    /// validation to result construction, backoff waits included.
    pub async fn answer(&self, query: &str) -> Result<AnswerResult> {
        let started = Instant::now();

        let query = query.trim();
        if query.is_empty() {
            return Err(RagError::InvalidQuery(
                "query must not be empty".to_string(),
            ));
        }

        self.telemetry.record(TelemetryEvent::QueryReceived {
            timestamp: Instant::now(),
        });

        // A failing embedding provider degrades to "no grounding
        // context"; the query still gets a conservative answer.
        let results = match self.retriever.retrieve(query).await {
            Ok(results) => results,
            Err(RagError::EmbeddingFailure(reason)) => {
                self.telemetry.record(TelemetryEvent::RetrievalDegraded {
                    reason,
                    timestamp: Instant::now(),
                });
                Vec::new()
            }
            Err(other) => return Err(other),
        };

        let context_found = !results.is_empty();
        let retrieved_chunk_ids: Vec<u64> = results.iter().map(|r| r.chunk.id).collect();

        self.telemetry.record(TelemetryEvent::RetrievalCompleted {
            retrieved: results.len(),
            context_found,
            timestamp: Instant::now(),
        });

        let prompt = self.prompt_builder.build(query, &results);

        let response_text = match self.generation.generate(&prompt).await {
            Ok(text) => text,
            Err(error) => {
                self.telemetry.record(TelemetryEvent::FallbackServed {
                    reason: error.to_string(),
                    timestamp: Instant::now(),
                });
                fallback_response(&results)
            }
        };

        let processing_time_seconds = started.elapsed().as_secs_f64();

        self.telemetry.record(TelemetryEvent::AnswerProduced {
            grounded: context_found,
            processing_seconds: processing_time_seconds,
            timestamp: Instant::now(),
        });

        Ok(AnswerResult {
            response_text,
            context_found,
            processing_time_seconds,
            retrieved_chunk_ids,
        })
    }

    /// Per-component health report for the diagnostics surface
    pub async fn health_check(&self) -> Vec<ComponentHealth> {
        let mut components = Vec::new();

        let count = self.knowledge.document_count();
        components.push(if count > 0 {
            ComponentHealth {
                component: "knowledge_base".to_string(),
                status: HealthStatus::Healthy,
                detail: format!(
                    "{} chunks indexed, dimension {}",
                    count,
                    self.knowledge.dimension()
                ),
            }
        } else {
            ComponentHealth {
                component: "knowledge_base".to_string(),
                status: HealthStatus::Degraded,
                detail: "knowledge base is empty; all answers will be ungrounded".to_string(),
            }
        });

        components.push(if self.generation.ping().await {
            ComponentHealth {
                component: "generation_backend".to_string(),
                status: HealthStatus::Healthy,
                detail: format!("model {} reachable", self.generation.model()),
            }
        } else {
            ComponentHealth {
                component: "generation_backend".to_string(),
                status: HealthStatus::Unhealthy,
                detail: "remote endpoint is not reachable".to_string(),
            }
        });

        components
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    pub fn telemetry(&self) -> &TelemetryCollector {
        &self.telemetry
    }
}

/// Build the fallback answer; retrieved excerpts are included when
/// grounding context was found so the client still gets something useful.
fn fallback_response(results: &[RetrievalResult]) -> String {
    if results.is_empty() {
        return FALLBACK_UNAVAILABLE.to_string();
    }

    let excerpts: Vec<&str> = results.iter().map(|r| r.chunk.text.as_str()).collect();
    format!("{}\n\n{}", FALLBACK_WITH_CONTEXT, excerpts.join("\n\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::Chunk;

    fn result(id: u64, text: &str) -> RetrievalResult {
        RetrievalResult {
            chunk: Chunk {
                id,
                text: text.to_string(),
                source_document_id: "doc".to_string(),
                embedding: Vec::new(),
            },
            score: 0.8,
        }
    }

    #[test]
    fn test_fallback_without_context() {
        let text = fallback_response(&[]);
        assert!(text.contains("temporarily unavailable"));
        assert!(!text.contains("knowledge base:"));
    }

    #[test]
    fn test_fallback_with_context_includes_excerpts() {
        let text = fallback_response(&[result(1, "Units are securities.")]);
        assert!(text.contains("temporarily unavailable"));
        assert!(text.contains("Units are securities."));
    }
}
