//! Provider availability tracking.
//!
//! Failure-heavy providers are cooled down for a window rather than
//! hammered; a cooled-down provider simply yields no enrichment for its
//! dimension until the window passes.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::warn;

/// Minimum observations before the failure rate is trusted.
const MIN_SAMPLES: u32 = 4;

#[derive(Debug, Default)]
struct Window {
    successes: u32,
    failures: u32,
    cooldown_until: Option<Instant>,
}

impl Window {
    fn failure_rate(&self) -> f64 {
        let total = self.successes + self.failures;
        if total == 0 {
            0.0
        } else {
            f64::from(self.failures) / f64::from(total)
        }
    }
}

pub struct ProviderHealth {
    windows: Mutex<HashMap<String, Window>>,
    failure_rate_threshold: f64,
    cooldown: Duration,
}

impl ProviderHealth {
    pub fn new(failure_rate_threshold: f64, cooldown: Duration) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            failure_rate_threshold,
            cooldown,
        }
    }

    /// Whether the provider should be consulted at all right now.
    pub fn available(&self, provider: &str) -> bool {
        let mut windows = self.windows.lock().expect("health lock poisoned");
        let window = windows.entry(provider.to_string()).or_default();
        match window.cooldown_until {
            Some(until) if Instant::now() < until => false,
            Some(_) => {
                // Cooldown over: start a fresh window.
                *window = Window::default();
                true
            }
            None => true,
        }
    }

    pub fn record_success(&self, provider: &str) {
        let mut windows = self.windows.lock().expect("health lock poisoned");
        windows.entry(provider.to_string()).or_default().successes += 1;
    }

    pub fn record_failure(&self, provider: &str) {
        let mut windows = self.windows.lock().expect("health lock poisoned");
        let window = windows.entry(provider.to_string()).or_default();
        window.failures += 1;
        let total = window.successes + window.failures;
        if total >= MIN_SAMPLES
            && window.failure_rate() >= self.failure_rate_threshold
            && window.cooldown_until.is_none()
        {
            window.cooldown_until = Some(Instant::now() + self.cooldown);
            warn!(
                provider,
                failure_rate = window.failure_rate(),
                cooldown_secs = self.cooldown.as_secs(),
                "Provider over failure threshold, cooling down"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_healthy_provider_stays_available() {
        let health = ProviderHealth::new(0.5, Duration::from_secs(60));
        for _ in 0..10 {
            health.record_success("companies");
        }
        health.record_failure("companies");
        assert!(health.available("companies"));
    }

    #[test]
    fn test_failing_provider_cools_down() {
        let health = ProviderHealth::new(0.5, Duration::from_secs(60));
        for _ in 0..4 {
            health.record_failure("companies");
        }
        assert!(!health.available("companies"));
    }

    #[test]
    fn test_cooldown_expiry_resets_window() {
        let health = ProviderHealth::new(0.5, Duration::from_millis(0));
        for _ in 0..4 {
            health.record_failure("companies");
        }
        // Zero cooldown: available again with a clean slate.
        assert!(health.available("companies"));
        health.record_failure("companies");
        assert!(health.available("companies"));
    }
}
