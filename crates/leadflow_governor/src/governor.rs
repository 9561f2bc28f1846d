//! Admission controller implementation.

use crate::breaker::CircuitBreaker;
use crate::host::{HostSampler, HostSample};
use leadflow_types::{GovernorConfig, SourceId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

/// RAII permit for one in-flight fetch. Dropping it releases the slot.
#[derive(Debug)]
pub struct FetchPermit {
    _permit: OwnedSemaphorePermit,
}

/// Why admission was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferReason {
    /// All fetcher slots are occupied
    NoSlot,
    /// The source ran more recently than its minimum interval
    TooSoon,
    /// The source's circuit breaker is open
    BreakerOpen,
}

impl DeferReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeferReason::NoSlot => "no-slot",
            DeferReason::TooSoon => "too-soon",
            DeferReason::BreakerOpen => "breaker-open",
        }
    }
}

impl fmt::Display for DeferReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of [`RateGovernor::try_admit`].
#[derive(Debug)]
pub enum Admission {
    Admitted(FetchPermit),
    Deferred(DeferReason),
    /// Resource pause or operator pause is in effect
    Paused,
}

/// Operator-visible governor state for status reports.
#[derive(Debug, Clone, PartialEq)]
pub struct GovernorStatus {
    pub paused: bool,
    pub pause_remaining: Option<Duration>,
    pub operator_paused: bool,
    pub fetch_slots_available: usize,
    pub worker_slots_available: usize,
    pub last_sample: Option<HostSample>,
}

#[derive(Debug, Default)]
struct PauseState {
    /// Resource pause expiry
    until: Option<Instant>,
    /// Operator pause has no expiry
    operator: bool,
    last_sample: Option<HostSample>,
}

/// Central admission controller. Cheap to share; all members are sync.
pub struct RateGovernor {
    config: GovernorConfig,
    fetch_slots: Arc<Semaphore>,
    worker_slots: Arc<Semaphore>,
    last_admitted: Mutex<HashMap<SourceId, Instant>>,
    pause: Mutex<PauseState>,
    breaker: CircuitBreaker,
}

impl RateGovernor {
    pub fn new(config: GovernorConfig) -> Self {
        let breaker = CircuitBreaker::new(config.breaker_threshold, config.breaker_cooldown());
        Self {
            fetch_slots: Arc::new(Semaphore::new(config.max_concurrent_sources)),
            worker_slots: Arc::new(Semaphore::new(config.max_workers)),
            last_admitted: Mutex::new(HashMap::new()),
            pause: Mutex::new(PauseState::default()),
            breaker,
            config,
        }
    }

    /// Admission check for one source.
    ///
    /// Order matters: the pause bit wins unconditionally, then the
    /// breaker, then pacing, then slot availability. A returned permit is
    /// RAII; in-flight work keeps its permit through a later pause
    /// (cancellation is cooperative, not preemptive).
    pub fn try_admit(&self, id: &SourceId) -> Admission {
        if self.is_paused() {
            return Admission::Paused;
        }
        if !self.breaker.permits(id) {
            return Admission::Deferred(DeferReason::BreakerOpen);
        }

        let min_interval = Duration::from_secs(self.config.per_source_min_interval_minutes * 60);
        {
            let last = self.last_admitted.lock().expect("pacing lock poisoned");
            if let Some(at) = last.get(id) {
                if at.elapsed() < min_interval {
                    return Admission::Deferred(DeferReason::TooSoon);
                }
            }
        }

        match Arc::clone(&self.fetch_slots).try_acquire_owned() {
            Ok(permit) => {
                self.last_admitted
                    .lock()
                    .expect("pacing lock poisoned")
                    .insert(id.clone(), Instant::now());
                debug!(source = %id, "Admitted fetch");
                Admission::Admitted(FetchPermit { _permit: permit })
            }
            Err(_) => Admission::Deferred(DeferReason::NoSlot),
        }
    }

    /// Acquire a stage worker slot, waiting if all are busy.
    pub async fn acquire_worker_slot(&self) -> OwnedSemaphorePermit {
        Arc::clone(&self.worker_slots)
            .acquire_owned()
            .await
            .expect("worker semaphore closed")
    }

    /// Feed one host sample through the backpressure rule. Called by the
    /// orchestrator's sampler task on its period.
    pub fn observe_sample(&self, sample: HostSample) {
        let mut pause = self.pause.lock().expect("pause lock poisoned");
        pause.last_sample = Some(sample);
        let over_cpu = sample.cpu_percent >= self.config.cpu_pause_threshold;
        let over_memory = sample.memory_percent >= self.config.memory_pause_threshold;
        if over_cpu || over_memory {
            let until = Instant::now() + self.config.pause_cooldown();
            let extending = pause.until.is_some();
            pause.until = Some(until);
            if !extending {
                warn!(
                    cpu = sample.cpu_percent,
                    memory = sample.memory_percent,
                    cooldown_secs = self.config.pause_cooldown_secs,
                    "Host resources over threshold, pausing admissions"
                );
            }
        }
    }

    /// Drive `sampler` on the configured period until cancelled.
    pub async fn run_sampler(
        &self,
        mut sampler: Box<dyn HostSampler>,
        cancel: tokio_util::sync::CancellationToken,
    ) {
        let period = Duration::from_secs(self.config.sample_interval_secs.max(1));
        loop {
            tokio::select! {
                _ = tokio::time::sleep(period) => {
                    self.observe_sample(sampler.sample());
                }
                _ = cancel.cancelled() => return,
            }
        }
    }

    /// Operator pause: holds until [`Self::resume`].
    pub fn pause(&self) {
        let mut pause = self.pause.lock().expect("pause lock poisoned");
        pause.operator = true;
        info!("Governor paused by operator");
    }

    pub fn resume(&self) {
        let mut pause = self.pause.lock().expect("pause lock poisoned");
        pause.operator = false;
        pause.until = None;
        info!("Governor resumed");
    }

    pub fn is_paused(&self) -> bool {
        let mut pause = self.pause.lock().expect("pause lock poisoned");
        if pause.operator {
            return true;
        }
        match pause.until {
            Some(until) if Instant::now() < until => true,
            Some(_) => {
                pause.until = None;
                false
            }
            None => false,
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn status(&self) -> GovernorStatus {
        let pause = self.pause.lock().expect("pause lock poisoned");
        let now = Instant::now();
        let pause_remaining = pause
            .until
            .and_then(|until| until.checked_duration_since(now));
        GovernorStatus {
            paused: pause.operator || pause_remaining.is_some(),
            pause_remaining,
            operator_paused: pause.operator,
            fetch_slots_available: self.fetch_slots.available_permits(),
            worker_slots_available: self.worker_slots.available_permits(),
            last_sample: pause.last_sample,
        }
    }
}
