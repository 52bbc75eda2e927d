// Generation client: prompt -> answer text via a remote completion
// endpoint, with bounded retry, backoff, and an overall deadline.
//
// Components:
// - Backend: capability trait + OpenAI-compatible chat implementation
// - Retry: pure backoff/deadline policy (the per-request state machine)
// - Client: drives backend attempts under the policy

pub mod backend;
pub mod client;
pub mod retry;

pub use backend::{ChatBackend, CompletionBackend};
pub use client::GenerationClient;
pub use retry::{RetryPolicy, Transition};

/// Observed outcome of a single generation attempt.
///
/// Surfaced through telemetry only; the caller sees the terminal
/// `Result`, never the per-attempt history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    RetryableFailure(String),
    FatalFailure(String),
}
