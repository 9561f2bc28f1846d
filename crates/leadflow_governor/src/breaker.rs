//! Per-source circuit breaker.
//!
//! Consecutive failures trip the circuit; a tripped source is refused
//! admission until the cool-down passes, after which the next attempt is
//! allowed through (half-open) and its outcome closes or re-trips the
//! circuit.

use leadflow_types::SourceId;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    /// Tripped; refuses admissions until the instant passes
    Open { until_elapsed: bool },
}

#[derive(Debug, Default)]
struct SourceHealth {
    consecutive_failures: u32,
    tripped_at: Option<Instant>,
}

/// Breaker over all sources. Internally a single mutex - contention is
/// bounded by the fetcher cap, which is tiny.
pub struct CircuitBreaker {
    health: Mutex<HashMap<SourceId, SourceHealth>>,
    threshold: u32,
    cooldown: Duration,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            health: Mutex::new(HashMap::new()),
            threshold: threshold.max(1),
            cooldown,
        }
    }

    /// Whether the source may attempt a fetch right now.
    pub fn permits(&self, id: &SourceId) -> bool {
        let mut health = self.health.lock().expect("breaker lock poisoned");
        let entry = health.entry(id.clone()).or_default();
        match entry.tripped_at {
            None => true,
            Some(at) if at.elapsed() >= self.cooldown => {
                // Half-open: allow one probe; failure re-trips immediately.
                entry.tripped_at = None;
                entry.consecutive_failures = self.threshold.saturating_sub(1);
                info!(source = %id, "Circuit breaker half-open, probing source");
                true
            }
            Some(_) => false,
        }
    }

    pub fn state(&self, id: &SourceId) -> BreakerState {
        let health = self.health.lock().expect("breaker lock poisoned");
        match health.get(id).and_then(|h| h.tripped_at) {
            None => BreakerState::Closed,
            Some(at) => BreakerState::Open {
                until_elapsed: at.elapsed() >= self.cooldown,
            },
        }
    }

    pub fn record_success(&self, id: &SourceId) {
        let mut health = self.health.lock().expect("breaker lock poisoned");
        let entry = health.entry(id.clone()).or_default();
        entry.consecutive_failures = 0;
        entry.tripped_at = None;
    }

    /// Returns true when this failure tripped the circuit.
    pub fn record_failure(&self, id: &SourceId) -> bool {
        let mut health = self.health.lock().expect("breaker lock poisoned");
        let entry = health.entry(id.clone()).or_default();
        entry.consecutive_failures += 1;
        if entry.tripped_at.is_none() && entry.consecutive_failures >= self.threshold {
            entry.tripped_at = Some(Instant::now());
            warn!(
                source = %id,
                consecutive_failures = entry.consecutive_failures,
                "Circuit breaker tripped, cooling source down"
            );
            return true;
        }
        false
    }

    pub fn consecutive_failures(&self, id: &SourceId) -> u32 {
        self.health
            .lock()
            .expect("breaker lock poisoned")
            .get(id)
            .map(|h| h.consecutive_failures)
            .unwrap_or(0)
    }
}
