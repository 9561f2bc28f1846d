//! Registry implementation.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use leadflow_types::{Source, SourceId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("unknown source: {0}")]
    UnknownSource(String),
}

/// Mutable per-source run state, persisted through the store and replayed
/// into the registry at startup so due-ness survives restarts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceRunState {
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// Conditional-request validators from the last successful fetch
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

/// A source selected by [`SourceRegistry::list_due`], with how long it has
/// been waiting. Ordering is longest-waiting-first.
#[derive(Debug, Clone)]
pub struct DueSource {
    pub source: Arc<Source>,
    pub waiting: ChronoDuration,
}

/// Immutable view of the configured sources.
#[derive(Debug, Default)]
struct Snapshot {
    by_id: HashMap<SourceId, Arc<Source>>,
}

/// Holds the set of configured Sources, indexed by id.
pub struct SourceRegistry {
    snapshot: RwLock<Arc<Snapshot>>,
    state: Mutex<HashMap<SourceId, SourceRunState>>,
    /// Floor applied on top of each source's own schedule
    min_interval_minutes: u64,
}

impl SourceRegistry {
    pub fn new(sources: Vec<Source>, min_interval_minutes: u64) -> Self {
        let mut by_id = HashMap::with_capacity(sources.len());
        for source in sources {
            by_id.insert(source.id.clone(), Arc::new(source));
        }
        Self {
            snapshot: RwLock::new(Arc::new(Snapshot { by_id })),
            state: Mutex::new(HashMap::new()),
            min_interval_minutes,
        }
    }

    pub fn get(&self, id: &SourceId) -> Option<Arc<Source>> {
        self.current().by_id.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.current().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current().by_id.is_empty()
    }

    /// All sources, active or not. Order is unspecified.
    pub fn list_all(&self) -> Vec<Arc<Source>> {
        self.current().by_id.values().cloned().collect()
    }

    /// Sources whose next fetch is due at `now`, longest-waiting first.
    ///
    /// "Due" means `last_success_at + max(schedule, per-source floor) <= now`
    /// and the source is active. Admission (concurrency, pacing, breaker,
    /// pause) is the governor's gate and is applied by the orchestrator on
    /// top of this list.
    pub fn list_due(&self, now: DateTime<Utc>) -> Vec<DueSource> {
        let snapshot = self.current();
        let state = self.state.lock().expect("registry state lock poisoned");

        let mut due: Vec<DueSource> = Vec::new();
        for source in snapshot.by_id.values() {
            if !source.active {
                continue;
            }
            let interval_minutes = source
                .schedule
                .interval_minutes
                .max(self.min_interval_minutes);
            let interval = ChronoDuration::minutes(interval_minutes as i64);

            let last_success = state.get(&source.id).and_then(|s| s.last_success_at);
            let waiting = match last_success {
                Some(at) => {
                    let elapsed = now - at;
                    if elapsed < interval {
                        continue;
                    }
                    elapsed - interval
                }
                // Never fetched: due immediately, waiting since forever.
                None => ChronoDuration::MAX,
            };
            due.push(DueSource {
                source: Arc::clone(source),
                waiting,
            });
        }

        due.sort_by(|a, b| b.waiting.cmp(&a.waiting));
        debug!(due = due.len(), "Computed due sources");
        due
    }

    /// Insert or replace a source definition. In-flight work against the
    /// previous definition keeps its own `Arc` and drains naturally.
    pub fn upsert(&self, source: Source) {
        let mut guard = self.snapshot.write().expect("registry snapshot lock poisoned");
        let mut by_id = guard.by_id.clone();
        info!(source = %source.id, "Upserting source definition");
        by_id.insert(source.id.clone(), Arc::new(source));
        *guard = Arc::new(Snapshot { by_id });
    }

    /// Retirement is a flag flip plus drain; the definition and its
    /// historical leads remain.
    pub fn retire(&self, id: &SourceId) -> Result<(), RegistryError> {
        let mut guard = self.snapshot.write().expect("registry snapshot lock poisoned");
        let existing = guard
            .by_id
            .get(id)
            .ok_or_else(|| RegistryError::UnknownSource(id.to_string()))?;
        let mut retired = (**existing).clone();
        retired.active = false;
        let mut by_id = guard.by_id.clone();
        by_id.insert(id.clone(), Arc::new(retired));
        *guard = Arc::new(Snapshot { by_id });
        info!(source = %id, "Source retired");
        Ok(())
    }

    /// Replay persisted run state at startup.
    pub fn seed_state(&self, seeded: HashMap<SourceId, SourceRunState>) {
        let mut state = self.state.lock().expect("registry state lock poisoned");
        *state = seeded;
    }

    pub fn run_state(&self, id: &SourceId) -> SourceRunState {
        self.state
            .lock()
            .expect("registry state lock poisoned")
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn record_attempt(&self, id: &SourceId, at: DateTime<Utc>) {
        let mut state = self.state.lock().expect("registry state lock poisoned");
        state.entry(id.clone()).or_default().last_attempt_at = Some(at);
    }

    pub fn record_success(
        &self,
        id: &SourceId,
        at: DateTime<Utc>,
        etag: Option<String>,
        last_modified: Option<String>,
    ) {
        let mut state = self.state.lock().expect("registry state lock poisoned");
        let entry = state.entry(id.clone()).or_default();
        entry.last_success_at = Some(at);
        if etag.is_some() {
            entry.etag = etag;
        }
        if last_modified.is_some() {
            entry.last_modified = last_modified;
        }
    }

    fn current(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot.read().expect("registry snapshot lock poisoned"))
    }
}
