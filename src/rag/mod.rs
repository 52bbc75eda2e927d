// Retrieval-augmented generation pipeline.
//
// Components:
// - Retrieval: embed the query, search the index, apply the relevance
//   threshold
// - Prompt: assemble a bounded prompt from query and retrieved chunks
// - Pipeline: end-to-end orchestration with timing and fallback handling

pub mod pipeline;
pub mod prompt;
pub mod retrieval;

// Re-export key types
pub use pipeline::{AnswerResult, RagPipeline};
pub use prompt::{Prompt, PromptBuilder};
pub use retrieval::{RetrievalResult, Retriever, SearchParams};
