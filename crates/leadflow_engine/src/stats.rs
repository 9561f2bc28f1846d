//! Per-source health tallies for the status report.

use leadflow_types::SourceId;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceHealth {
    pub fetches_succeeded: u64,
    pub fetches_failed: u64,
    pub candidates: u64,
    pub rejections: u64,
    pub last_error: Option<String>,
}

#[derive(Default)]
pub struct SourceStats {
    health: Mutex<HashMap<SourceId, SourceHealth>>,
}

impl SourceStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_fetch_success(&self, id: &SourceId) {
        self.with(id, |h| h.fetches_succeeded += 1);
    }

    pub fn record_fetch_failure(&self, id: &SourceId, error: &str) {
        self.with(id, |h| {
            h.fetches_failed += 1;
            h.last_error = Some(error.to_string());
        });
    }

    pub fn record_candidates(&self, id: &SourceId, count: u64) {
        self.with(id, |h| h.candidates += count);
    }

    pub fn record_rejection(&self, id: &SourceId) {
        self.with(id, |h| h.rejections += 1);
    }

    pub fn get(&self, id: &SourceId) -> SourceHealth {
        self.health
            .lock()
            .expect("source stats lock poisoned")
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn all(&self) -> HashMap<SourceId, SourceHealth> {
        self.health
            .lock()
            .expect("source stats lock poisoned")
            .clone()
    }

    fn with(&self, id: &SourceId, update: impl FnOnce(&mut SourceHealth)) {
        let mut health = self.health.lock().expect("source stats lock poisoned");
        update(health.entry(id.clone()).or_default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tallies_accumulate() {
        let stats = SourceStats::new();
        let id = SourceId::new("feed-a").unwrap();
        stats.record_fetch_success(&id);
        stats.record_candidates(&id, 3);
        stats.record_rejection(&id);
        stats.record_fetch_failure(&id, "boom");

        let health = stats.get(&id);
        assert_eq!(health.fetches_succeeded, 1);
        assert_eq!(health.candidates, 3);
        assert_eq!(health.rejections, 1);
        assert_eq!(health.last_error.as_deref(), Some("boom"));
    }
}
