//! Generation client: drives backend attempts under the retry policy.
//!
//! Per-request flow: attempt -> classify failure -> consult the policy ->
//! wait out the backoff or stop with a terminal error. Attempt count and
//! the wall-clock deadline are first-class; a request never sleeps into
//! territory the deadline forbids, and the caller gets either the full
//! answer text or a typed failure, never a partial result.

use crate::errors::GenerationError;
use crate::generation::backend::CompletionBackend;
use crate::generation::retry::{RetryPolicy, Transition};
use crate::generation::AttemptOutcome;
use crate::rag::prompt::Prompt;
use crate::telemetry::{TelemetryCollector, TelemetryEvent};
use std::time::Instant;
use tokio::time::sleep;

/// Retry-aware wrapper around a completion backend
pub struct GenerationClient<B: CompletionBackend> {
    backend: B,
    policy: RetryPolicy,
    telemetry: TelemetryCollector,
}

impl<B: CompletionBackend> GenerationClient<B> {
    pub fn new(backend: B, policy: RetryPolicy, telemetry: TelemetryCollector) -> Self {
        Self {
            backend,
            policy,
            telemetry,
        }
    }

    /// Generate an answer for the prompt.
    ///
    /// Transient failures are retried with exponential backoff up to the
    /// attempt budget; the overall deadline bounds the whole call
    /// including backoff waits. Each attempt's outcome is recorded as a
    /// telemetry event.
    pub async fn generate(&self, prompt: &Prompt) -> Result<String, GenerationError> {
        let started = Instant::now();
        let mut attempt: u32 = 1;

        loop {
            if started.elapsed() >= self.policy.overall_deadline() {
                return Err(GenerationError::DeadlineExceeded {
                    elapsed_ms: started.elapsed().as_millis() as u64,
                });
            }

            match self.backend.complete(prompt).await {
                Ok(text) => {
                    self.record(attempt, AttemptOutcome::Success);
                    return Ok(text);
                }
                Err(error) => {
                    self.record(attempt, outcome_of(&error));

                    match self.policy.next_step(attempt, error, started.elapsed()) {
                        Transition::RetryAfter(delay) => {
                            sleep(delay).await;
                            attempt += 1;
                        }
                        Transition::Fail(terminal) => return Err(terminal),
                    }
                }
            }
        }
    }

    /// Reachability of the remote endpoint, for health reporting
    pub async fn ping(&self) -> bool {
        self.backend.ping().await
    }

    /// Model name of the underlying backend
    pub fn model(&self) -> &str {
        self.backend.model()
    }

    fn record(&self, attempt: u32, outcome: AttemptOutcome) {
        self.telemetry.record(TelemetryEvent::GenerationAttempt {
            attempt,
            outcome,
            timestamp: Instant::now(),
        });
    }
}

fn outcome_of(error: &GenerationError) -> AttemptOutcome {
    match error {
        GenerationError::Retryable(reason) => AttemptOutcome::RetryableFailure(reason.clone()),
        GenerationError::Fatal(reason) => AttemptOutcome::FatalFailure(reason.clone()),
        GenerationError::DeadlineExceeded { .. } => {
            AttemptOutcome::FatalFailure(error.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Backend scripted to fail transiently a fixed number of times
    struct FlakyBackend {
        calls: Arc<AtomicU32>,
        failures_before_success: u32,
    }

    #[async_trait]
    impl CompletionBackend for FlakyBackend {
        async fn complete(&self, _prompt: &Prompt) -> Result<String, GenerationError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures_before_success {
                Err(GenerationError::Retryable("HTTP 503".to_string()))
            } else {
                Ok("answer".to_string())
            }
        }

        async fn ping(&self) -> bool {
            true
        }

        fn model(&self) -> &str {
            "mock"
        }
    }

    struct FatalBackend;

    #[async_trait]
    impl CompletionBackend for FatalBackend {
        async fn complete(&self, _prompt: &Prompt) -> Result<String, GenerationError> {
            Err(GenerationError::Fatal("401 unauthorized".to_string()))
        }

        async fn ping(&self) -> bool {
            false
        }

        fn model(&self) -> &str {
            "mock"
        }
    }

    fn fast_policy(max_attempts: u32, deadline_ms: u64) -> RetryPolicy {
        RetryPolicy::from_config(&RetryConfig {
            max_attempts,
            base_backoff_ms: 5,
            max_backoff_ms: 20,
            overall_deadline_ms: deadline_ms,
            jitter: false,
        })
    }

    #[tokio::test]
    async fn test_success_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let backend = FlakyBackend {
            calls: calls.clone(),
            failures_before_success: 2,
        };
        let telemetry = TelemetryCollector::new();
        let client = GenerationClient::new(backend, fast_policy(3, 5000), telemetry.clone());

        let result = client.generate(&Prompt::for_test("q")).await;

        assert_eq!(result.unwrap(), "answer");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(telemetry.get_stats().generation_attempts, 3);
        assert_eq!(telemetry.get_stats().generation_failures, 2);
    }

    #[tokio::test]
    async fn test_exhaustion_is_fatal_after_exact_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let backend = FlakyBackend {
            calls: calls.clone(),
            failures_before_success: u32::MAX,
        };
        let client =
            GenerationClient::new(backend, fast_policy(3, 5000), TelemetryCollector::new());

        let result = client.generate(&Prompt::for_test("q")).await;

        assert!(matches!(result, Err(GenerationError::Fatal(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fatal_failure_stops_after_one_attempt() {
        let client =
            GenerationClient::new(FatalBackend, fast_policy(5, 5000), TelemetryCollector::new());

        let result = client.generate(&Prompt::for_test("q")).await;

        assert!(matches!(result, Err(GenerationError::Fatal(_))));
    }

    #[tokio::test]
    async fn test_deadline_preempts_backoff() {
        let calls = Arc::new(AtomicU32::new(0));
        let backend = FlakyBackend {
            calls: calls.clone(),
            failures_before_success: u32::MAX,
        };
        // Backoff of 200ms cannot complete inside a 50ms deadline
        let policy = RetryPolicy::from_config(&RetryConfig {
            max_attempts: 10,
            base_backoff_ms: 200,
            max_backoff_ms: 400,
            overall_deadline_ms: 50,
            jitter: false,
        });
        let client = GenerationClient::new(backend, policy, TelemetryCollector::new());

        let result = client.generate(&Prompt::for_test("q")).await;

        assert!(matches!(
            result,
            Err(GenerationError::DeadlineExceeded { .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_elapsed_covers_backoff_waits() {
        let calls = Arc::new(AtomicU32::new(0));
        let backend = FlakyBackend {
            calls,
            failures_before_success: 2,
        };
        let policy = fast_policy(3, 5000);
        let expected_backoff = policy.max_total_backoff();
        let client = GenerationClient::new(backend, policy, TelemetryCollector::new());

        let started = Instant::now();
        client.generate(&Prompt::for_test("q")).await.unwrap();

        assert!(started.elapsed() >= expected_backoff);
    }
}
