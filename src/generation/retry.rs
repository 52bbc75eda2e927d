//! Retry policy with exponential backoff and an overall deadline.
//!
//! The policy is a pure decision function over (attempt number, error,
//! elapsed time), so every transition of the per-request state machine is
//! testable without a network or a real clock. The generation client owns
//! the actual waiting.

use crate::config::RetryConfig;
use crate::errors::GenerationError;
use std::time::Duration;

/// Decision after a failed attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Wait out the backoff, then run the next attempt
    RetryAfter(Duration),
    /// Stop with this terminal error
    Fail(GenerationError),
}

/// Bounded retry policy: attempt budget, backoff shape, wall-clock deadline
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_backoff: Duration,
    max_backoff: Duration,
    overall_deadline: Duration,
    jitter: bool,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_backoff: Duration::from_millis(config.base_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            overall_deadline: Duration::from_millis(config.overall_deadline_ms),
            jitter: config.jitter,
        }
    }

    /// Decide what follows the failure of 1-based attempt `attempt`.
    ///
    /// A retryable failure leads to another attempt only while the
    /// attempt budget holds and the backoff wait would still end before
    /// the deadline; once the deadline would be crossed, the request
    /// fails without starting the wait.
    pub fn next_step(
        &self,
        attempt: u32,
        error: GenerationError,
        elapsed: Duration,
    ) -> Transition {
        match error {
            GenerationError::Fatal(_) | GenerationError::DeadlineExceeded { .. } => {
                Transition::Fail(error)
            }
            GenerationError::Retryable(reason) => {
                if attempt >= self.max_attempts {
                    return Transition::Fail(GenerationError::Fatal(format!(
                        "retry budget exhausted after {} attempts: {}",
                        attempt, reason
                    )));
                }

                if elapsed >= self.overall_deadline {
                    return Transition::Fail(GenerationError::DeadlineExceeded {
                        elapsed_ms: elapsed.as_millis() as u64,
                    });
                }

                let delay = self.backoff_delay(attempt);
                if elapsed + delay >= self.overall_deadline {
                    return Transition::Fail(GenerationError::DeadlineExceeded {
                        elapsed_ms: elapsed.as_millis() as u64,
                    });
                }

                Transition::RetryAfter(delay)
            }
        }
    }

    /// Backoff before retrying after 1-based attempt `attempt`:
    /// `base * 2^(attempt - 1)`, capped, with optional ±25% jitter.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let delay = self.raw_delay(attempt);

        if !self.jitter {
            return delay;
        }

        let jitter_span = delay.as_millis() as i64 / 4;
        let offset = (rand::random::<f64>() * 2.0 - 1.0) * jitter_span as f64;
        let jittered = (delay.as_millis() as i64 + offset as i64).max(0) as u64;
        Duration::from_millis(jittered)
    }

    fn raw_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32);
        let delay_ms = (self.base_backoff.as_millis() as u64)
            .saturating_mul(1u64 << exponent)
            .min(self.max_backoff.as_millis() as u64);
        Duration::from_millis(delay_ms)
    }

    /// Sum of all backoff waits a fully exhausted request can spend
    pub fn max_total_backoff(&self) -> Duration {
        (1..self.max_attempts).map(|a| self.raw_delay(a)).sum()
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn overall_deadline(&self) -> Duration {
        self.overall_deadline
    }
}
