//! Prompt assembly for the consultation pipeline.
//!
//! `build` is a pure function of (query, retrieved chunks): the same
//! inputs always produce the same prompt. Context is bounded by a
//! character budget; when nothing relevant was retrieved, the system
//! instructions switch to the conservative no-context variant, which is
//! how `context_found = false` reaches the generation model.

use crate::config::PromptLimits;
use crate::corpus::Chunk;
use crate::rag::retrieval::RetrievalResult;

/// System instructions when grounding context is available
const GROUNDED_INSTRUCTIONS: &str = "\
You are a professional consultant on investment products.

Your task:
- Answer client questions about investment units, closed-end funds, and related services
- Use only the knowledge-base excerpts provided with the question
- Give precise, professional answers
- If the excerpts do not cover something, say so honestly
- Provide product information only, never financial advice

Style: businesslike, but clear to a non-specialist.";

/// System instructions when the knowledge base had nothing relevant
const NO_CONTEXT_INSTRUCTIONS: &str = "\
You are a professional consultant on investment products.

No relevant information was found in the knowledge base for this
question. Say that you cannot give a definitive answer, answer only in
general terms if it is safe to do so, and suggest contacting a
specialist. Never invent product details. Provide no financial advice.";

/// Assembled prompt: a value object, consumed but never mutated
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    system_instructions: String,
    context_chunks: Vec<Chunk>,
    user_query: String,
}

impl Prompt {
    pub fn system_instructions(&self) -> &str {
        &self.system_instructions
    }

    pub fn context_chunks(&self) -> &[Chunk] {
        &self.context_chunks
    }

    pub fn user_query(&self) -> &str {
        &self.user_query
    }

    /// True when at least one grounding chunk made it into the prompt
    pub fn has_context(&self) -> bool {
        !self.context_chunks.is_empty()
    }

    /// Render the user-role message sent to the generation backend
    pub fn user_message(&self) -> String {
        if self.context_chunks.is_empty() {
            return format!("Client question: {}", self.user_query);
        }

        let mut excerpts = String::new();
        for (i, chunk) in self.context_chunks.iter().enumerate() {
            if i > 0 {
                excerpts.push_str("\n\n");
            }
            excerpts.push_str(&format!("[{}] {}", i + 1, chunk.text));
        }

        format!(
            "Knowledge-base excerpts:\n\n{}\n\nClient question: {}\n\nAnswer using only the excerpts above.",
            excerpts, self.user_query
        )
    }

    /// Minimal prompt for backend and client tests
    #[cfg(test)]
    pub fn for_test(query: &str) -> Self {
        Self {
            system_instructions: NO_CONTEXT_INSTRUCTIONS.to_string(),
            context_chunks: Vec::new(),
            user_query: query.to_string(),
        }
    }
}

/// Assembles bounded prompts from retrieval results
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    limits: PromptLimits,
}

impl PromptBuilder {
    pub fn new(limits: PromptLimits) -> Self {
        Self { limits }
    }

    /// Build a prompt from the query and ranked retrieval results.
    ///
    /// Chunks are included in the given order until the character budget
    /// is reached; everything from the first over-budget chunk on is
    /// dropped, so truncation removes lowest-ranked chunks first and
    /// never reorders the survivors.
    pub fn build(&self, query: &str, results: &[RetrievalResult]) -> Prompt {
        let mut context_chunks = Vec::new();
        let mut used_chars = 0;

        for result in results {
            let chunk_chars = result.chunk.text.chars().count();
            if used_chars + chunk_chars > self.limits.max_prompt_chars {
                break;
            }
            used_chars += chunk_chars;
            context_chunks.push(result.chunk.clone());
        }

        let system_instructions = if context_chunks.is_empty() {
            NO_CONTEXT_INSTRUCTIONS
        } else {
            GROUNDED_INSTRUCTIONS
        };

        Prompt {
            system_instructions: system_instructions.to_string(),
            context_chunks,
            user_query: query.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: u64, text: &str, score: f32) -> RetrievalResult {
        RetrievalResult {
            chunk: Chunk {
                id,
                text: text.to_string(),
                source_document_id: "doc".to_string(),
                embedding: Vec::new(),
            },
            score,
        }
    }

    fn builder(max_prompt_chars: usize) -> PromptBuilder {
        PromptBuilder::new(PromptLimits { max_prompt_chars })
    }

    #[test]
    fn test_build_is_pure() {
        let results = vec![result(1, "chunk one", 0.9), result(2, "chunk two", 0.8)];
        let builder = builder(1000);

        let a = builder.build("question?", &results);
        let b = builder.build("question?", &results);

        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_results_select_no_context_variant() {
        let prompt = builder(1000).build("question?", &[]);

        assert!(!prompt.has_context());
        assert!(prompt.system_instructions().contains("No relevant information"));
        assert_eq!(prompt.user_message(), "Client question: question?");
    }

    #[test]
    fn test_grounded_variant_includes_excerpts() {
        let results = vec![result(1, "Units are securities.", 0.9)];
        let prompt = builder(1000).build("What is a unit?", &results);

        assert!(prompt.has_context());
        assert!(prompt.system_instructions().contains("knowledge-base excerpts"));
        assert!(prompt.user_message().contains("[1] Units are securities."));
        assert!(prompt.user_message().contains("What is a unit?"));
    }

    #[test]
    fn test_truncation_drops_lowest_ranked_first() {
        // 10-char chunks against a 25-char budget: only the two
        // highest-ranked fit
        let results = vec![
            result(1, "aaaaaaaaaa", 0.9),
            result(2, "bbbbbbbbbb", 0.8),
            result(3, "cccccccccc", 0.7),
        ];
        let prompt = builder(25).build("q", &results);

        let ids: Vec<u64> = prompt.context_chunks().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_truncation_never_reorders() {
        let results = vec![
            result(3, "first ranked", 0.9),
            result(1, "second ranked", 0.8),
            result(2, "third ranked", 0.7),
        ];
        let prompt = builder(1000).build("q", &results);

        let ids: Vec<u64> = prompt.context_chunks().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn test_budget_counts_chars_not_bytes() {
        // Ten Cyrillic characters are twenty bytes; a 10-char budget must
        // still admit the chunk
        let results = vec![result(1, "инвестиции", 0.9)];
        let prompt = builder(10).build("q", &results);

        assert!(prompt.has_context());
    }

    #[test]
    fn test_all_chunks_over_budget_falls_back_to_no_context() {
        let results = vec![result(1, "this chunk is far too long", 0.9)];
        let prompt = builder(5).build("q", &results);

        assert!(!prompt.has_context());
        assert!(prompt.system_instructions().contains("No relevant information"));
    }
}
