//! Canonical default values shared across the pipeline.

/// Minimum interval between fetches of one source (minutes).
pub const DEFAULT_SOURCE_INTERVAL_MINUTES: u64 = 60;
/// Concurrent in-flight fetchers.
pub const DEFAULT_MAX_CONCURRENT_SOURCES: usize = 3;
/// Worker slots across the pipeline stages.
pub const DEFAULT_MAX_WORKERS: usize = 5;
/// How often the orchestrator asks the registry for due sources (seconds).
pub const DEFAULT_SOURCES_CHECK_INTERVAL_SECS: u64 = 3_600;

/// Per-request fetch timeout (seconds).
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;
/// Retry backoff base (seconds).
pub const DEFAULT_BACKOFF_BASE_SECS: u64 = 1;
/// Retry backoff multiplier per attempt.
pub const DEFAULT_BACKOFF_FACTOR: u32 = 2;
/// Retry backoff cap (seconds).
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 60;
/// Fetch attempts before a job is marked failed.
pub const DEFAULT_MAX_FETCH_ATTEMPTS: u32 = 3;

/// Host CPU percent above which the governor pauses admissions.
pub const DEFAULT_CPU_PAUSE_THRESHOLD: f32 = 80.0;
/// Host memory percent above which the governor pauses admissions.
pub const DEFAULT_MEMORY_PAUSE_THRESHOLD: f32 = 85.0;
/// How long a resource pause holds (seconds).
pub const DEFAULT_PAUSE_COOLDOWN_SECS: u64 = 300;
/// Consecutive source failures before the circuit breaker trips.
pub const DEFAULT_BREAKER_THRESHOLD: u32 = 5;
/// Breaker cool-down once tripped (seconds).
pub const DEFAULT_BREAKER_COOLDOWN_SECS: u64 = 3_600;

/// Classifier rejection threshold on confidence.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.7;
/// Candidates older than this are stale (days).
pub const DEFAULT_MAX_AGE_DAYS: i64 = 14;

/// Enrichment provider timeout (seconds).
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 10;
/// Enrichment cache capacity (entries).
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;
/// Enrichment cache TTL (seconds).
pub const DEFAULT_CACHE_TTL_SECS: u64 = 86_400;
/// TTL for cached negative lookups (seconds).
pub const DEFAULT_NEGATIVE_CACHE_TTL_SECS: u64 = 600;
/// Provider failure rate that triggers a cool-down.
pub const DEFAULT_PROVIDER_FAILURE_RATE: f64 = 0.5;
/// Provider cool-down window (seconds).
pub const DEFAULT_PROVIDER_COOLDOWN_SECS: u64 = 300;

/// Dedup fuzzy-match lookback window (days).
pub const DEFAULT_DEDUP_LOOKBACK_DAYS: i64 = 30;
/// Token-set similarity at or above which two leads are duplicates.
pub const DEFAULT_DEDUP_THRESHOLD: f64 = 0.85;

/// Export window period (minutes).
pub const DEFAULT_EXPORT_INTERVAL_MINUTES: u64 = 60;
/// Leads per export batch.
pub const DEFAULT_EXPORT_BATCH_SIZE: usize = 25;
/// Export timeout per CRM object (seconds).
pub const DEFAULT_EXPORT_TIMEOUT_SECS: u64 = 30;
/// Fallback backoff when the CRM rate-limits without Retry-After (seconds).
pub const DEFAULT_CRM_RETRY_AFTER_SECS: u64 = 10;

/// Graceful shutdown budget (seconds).
pub const DEFAULT_SHUTDOWN_DEADLINE_SECS: u64 = 30;
/// Bound on every inter-stage queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Trust weight for a source with no explicit configuration.
pub const DEFAULT_SOURCE_TRUST: f64 = 0.7;
