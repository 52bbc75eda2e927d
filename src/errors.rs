//! Error types for the fondrag consultation core.
//!
//! Splits user errors (invalid query) from system errors (embedding,
//! generation, build-time corpus problems) so callers can map each onto
//! the right surface.

use thiserror::Error;

/// Main error type for the RAG core
#[derive(Error, Debug)]
pub enum RagError {
    /// Query rejected before any retrieval work (user error)
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Embedding provider failed or returned a vector of the wrong length
    #[error("Embedding failed: {0}")]
    EmbeddingFailure(String),

    /// Embedding length does not match the configured index dimension
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Terminal generation outcome, already past retry handling
    #[error("Generation failed: {0}")]
    Generation(#[from] GenerationError),

    /// Knowledge-base file problems at build time
    #[error("Corpus error: {0}")]
    Corpus(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Terminal outcome of a generation call.
///
/// `Retryable` never escapes the generation client: an exhausted attempt
/// budget is reported as `Fatal`, a crossed deadline as `DeadlineExceeded`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// Transient failure (timeout, rate limit, 5xx, transport)
    #[error("Retryable failure: {0}")]
    Retryable(String),

    /// Failure that must not be retried (authentication, malformed request)
    #[error("Fatal failure: {0}")]
    Fatal(String),

    /// Overall deadline crossed before a terminal outcome
    #[error("Deadline exceeded after {elapsed_ms}ms")]
    DeadlineExceeded { elapsed_ms: u64 },
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, RagError>;
