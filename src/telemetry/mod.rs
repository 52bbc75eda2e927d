//! Telemetry for the consultation pipeline.
//!
//! Collects per-request events (retrieval outcomes, generation attempts,
//! fallbacks) and aggregate counters for the session summary. Generation
//! attempt outcomes are observable here without ever being part of a
//! request's return value.

use crate::generation::AttemptOutcome;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Telemetry event types
#[derive(Debug, Clone)]
pub enum TelemetryEvent {
    QueryReceived {
        timestamp: Instant,
    },
    RetrievalCompleted {
        retrieved: usize,
        context_found: bool,
        timestamp: Instant,
    },
    /// Embedding failed after its retry; the query continues ungrounded
    RetrievalDegraded {
        reason: String,
        timestamp: Instant,
    },
    /// One generation attempt and how it ended
    GenerationAttempt {
        attempt: u32,
        outcome: AttemptOutcome,
        timestamp: Instant,
    },
    /// Generation failed terminally and the fallback answer was served
    FallbackServed {
        reason: String,
        timestamp: Instant,
    },
    AnswerProduced {
        grounded: bool,
        processing_seconds: f64,
        timestamp: Instant,
    },
}

/// Aggregate session statistics
#[derive(Debug, Clone, Default)]
pub struct TelemetryStats {
    pub queries_received: usize,
    pub answers_produced: usize,
    pub answers_grounded: usize,
    pub generation_attempts: usize,
    pub generation_failures: usize,
    pub fallbacks_served: usize,
    pub retrievals_degraded: usize,
}

/// Telemetry collector shared across pipeline components
#[derive(Clone)]
pub struct TelemetryCollector {
    events: Arc<Mutex<Vec<TelemetryEvent>>>,
    stats: Arc<Mutex<TelemetryStats>>,
    start_time: Instant,
}

impl TelemetryCollector {
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            stats: Arc::new(Mutex::new(TelemetryStats::default())),
            start_time: Instant::now(),
        }
    }

    /// Record an event
    pub fn record(&self, event: TelemetryEvent) {
        {
            let mut stats = self.stats.lock().unwrap();
            match &event {
                TelemetryEvent::QueryReceived { .. } => {
                    stats.queries_received += 1;
                }
                TelemetryEvent::RetrievalCompleted { .. } => {}
                TelemetryEvent::RetrievalDegraded { .. } => {
                    stats.retrievals_degraded += 1;
                }
                TelemetryEvent::GenerationAttempt { outcome, .. } => {
                    stats.generation_attempts += 1;
                    if !matches!(outcome, AttemptOutcome::Success) {
                        stats.generation_failures += 1;
                    }
                }
                TelemetryEvent::FallbackServed { .. } => {
                    stats.fallbacks_served += 1;
                }
                TelemetryEvent::AnswerProduced { grounded, .. } => {
                    stats.answers_produced += 1;
                    if *grounded {
                        stats.answers_grounded += 1;
                    }
                }
            }
        }

        let mut events = self.events.lock().unwrap();
        events.push(event);
    }

    /// Get current statistics
    pub fn get_stats(&self) -> TelemetryStats {
        self.stats.lock().unwrap().clone()
    }

    /// Get elapsed time since start
    pub fn elapsed(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }

    /// Get event count
    pub fn event_count(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    /// Get recent events (last n)
    pub fn recent_events(&self, n: usize) -> Vec<TelemetryEvent> {
        let events = self.events.lock().unwrap();
        let start = events.len().saturating_sub(n);
        events[start..].to_vec()
    }

    /// Share of answers backed by grounding context
    pub fn grounding_rate(&self) -> f64 {
        let stats = self.stats.lock().unwrap();
        if stats.answers_produced == 0 {
            1.0
        } else {
            stats.answers_grounded as f64 / stats.answers_produced as f64
        }
    }

    /// Print the session summary
    pub fn display_summary(&self) {
        let stats = self.get_stats();
        let elapsed = self.elapsed();

        println!("\n📊 Session Summary");
        println!("─────────────────────────────────────");
        println!("Duration:            {:?}", elapsed);
        println!("Queries answered:    {}", stats.answers_produced);
        println!("Grounding rate:      {:.1}%", self.grounding_rate() * 100.0);
        println!("Generation attempts: {}", stats.generation_attempts);
        println!("Fallbacks served:    {}", stats.fallbacks_served);
        println!();
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new()
    }
}
