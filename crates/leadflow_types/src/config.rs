//! Pipeline configuration.
//!
//! The core receives this tree fully built; a thin outer shell loads and
//! validates files into it. Every tunable named in the component contracts
//! lives here with its canonical default.

use crate::defaults;
use crate::error::ConfigError;
use crate::lead::{LeadStatus, MarketSector, ProjectStage};
use crate::source::Source;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// One weighted vocabulary entry for sector classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorKeyword {
    pub term: String,
    pub weight: f64,
}

impl SectorKeyword {
    pub fn new(term: impl Into<String>, weight: f64) -> Self {
        Self {
            term: term.into(),
            weight,
        }
    }
}

/// One stage-identifying keyword.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageKeyword {
    pub term: String,
    pub stage: ProjectStage,
}

/// A region the firm sells into. Leads outside every target region are
/// rejected unless their source is region-trusted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetRegion {
    pub city: Option<String>,
    pub state: Option<String>,
}

impl TargetRegion {
    pub fn city(name: impl Into<String>) -> Self {
        Self {
            city: Some(name.into()),
            state: None,
        }
    }

    pub fn state(code: impl Into<String>) -> Self {
        Self {
            city: None,
            state: Some(code.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernorConfig {
    pub max_concurrent_sources: usize,
    pub max_workers: usize,
    pub per_source_min_interval_minutes: u64,
    pub cpu_pause_threshold: f32,
    pub memory_pause_threshold: f32,
    pub pause_cooldown_secs: u64,
    /// Host sampler period (seconds)
    pub sample_interval_secs: u64,
    pub breaker_threshold: u32,
    pub breaker_cooldown_secs: u64,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_sources: defaults::DEFAULT_MAX_CONCURRENT_SOURCES,
            max_workers: defaults::DEFAULT_MAX_WORKERS,
            per_source_min_interval_minutes: defaults::DEFAULT_SOURCE_INTERVAL_MINUTES,
            cpu_pause_threshold: defaults::DEFAULT_CPU_PAUSE_THRESHOLD,
            memory_pause_threshold: defaults::DEFAULT_MEMORY_PAUSE_THRESHOLD,
            pause_cooldown_secs: defaults::DEFAULT_PAUSE_COOLDOWN_SECS,
            sample_interval_secs: 15,
            breaker_threshold: defaults::DEFAULT_BREAKER_THRESHOLD,
            breaker_cooldown_secs: defaults::DEFAULT_BREAKER_COOLDOWN_SECS,
        }
    }
}

impl GovernorConfig {
    pub fn pause_cooldown(&self) -> Duration {
        Duration::from_secs(self.pause_cooldown_secs)
    }

    pub fn breaker_cooldown(&self) -> Duration {
        Duration::from_secs(self.breaker_cooldown_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub backoff_base_secs: u64,
    pub backoff_factor: u32,
    pub backoff_max_secs: u64,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: defaults::DEFAULT_FETCH_TIMEOUT_SECS,
            max_attempts: defaults::DEFAULT_MAX_FETCH_ATTEMPTS,
            backoff_base_secs: defaults::DEFAULT_BACKOFF_BASE_SECS,
            backoff_factor: defaults::DEFAULT_BACKOFF_FACTOR,
            backoff_max_secs: defaults::DEFAULT_BACKOFF_MAX_SECS,
            user_agent: "leadflow/0.1".to_string(),
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Exponential backoff for the given zero-based attempt, capped.
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let factor = u64::from(self.backoff_factor).saturating_pow(attempt);
        let secs = self.backoff_base_secs.saturating_mul(factor);
        Duration::from_secs(secs.min(self.backoff_max_secs))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifyConfig {
    pub confidence_threshold: f64,
    pub max_age_days: i64,
    /// Tie-break order when sectors score equal; first listed wins
    pub sector_priority: Vec<MarketSector>,
    pub sector_keywords: HashMap<MarketSector, Vec<SectorKeyword>>,
    pub stage_keywords: Vec<StageKeyword>,
    pub target_regions: Vec<TargetRegion>,
    /// Organization/location cue words for entity tagging
    pub organization_markers: Vec<String>,
    pub location_markers: Vec<String>,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: defaults::DEFAULT_CONFIDENCE_THRESHOLD,
            max_age_days: defaults::DEFAULT_MAX_AGE_DAYS,
            sector_priority: vec![
                MarketSector::Healthcare,
                MarketSector::HigherEducation,
                MarketSector::Energy,
                MarketSector::Entertainment,
                MarketSector::Commercial,
            ],
            sector_keywords: HashMap::new(),
            stage_keywords: Vec::new(),
            target_regions: Vec::new(),
            organization_markers: Vec::new(),
            location_markers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub capacity: usize,
    pub ttl_secs: u64,
    pub negative_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: defaults::DEFAULT_CACHE_CAPACITY,
            ttl_secs: defaults::DEFAULT_CACHE_TTL_SECS,
            negative_ttl_secs: defaults::DEFAULT_NEGATIVE_CACHE_TTL_SECS,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn negative_ttl(&self) -> Duration {
        Duration::from_secs(self.negative_ttl_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichConfig {
    pub provider_timeout_secs: u64,
    /// Concurrency cap applied to each provider separately
    pub per_provider_concurrency: usize,
    pub failure_rate_threshold: f64,
    pub provider_cooldown_secs: u64,
    pub cache: CacheConfig,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            provider_timeout_secs: defaults::DEFAULT_PROVIDER_TIMEOUT_SECS,
            per_provider_concurrency: 2,
            failure_rate_threshold: defaults::DEFAULT_PROVIDER_FAILURE_RATE,
            provider_cooldown_secs: defaults::DEFAULT_PROVIDER_COOLDOWN_SECS,
            cache: CacheConfig::default(),
        }
    }
}

impl EnrichConfig {
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    pub fn provider_cooldown(&self) -> Duration {
        Duration::from_secs(self.provider_cooldown_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite path, or `:memory:` in tests
    pub database_path: String,
    pub dedup_lookback_days: i64,
    pub dedup_threshold: f64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: "leadflow.db".to_string(),
            dedup_lookback_days: defaults::DEFAULT_DEDUP_LOOKBACK_DAYS,
            dedup_threshold: defaults::DEFAULT_DEDUP_THRESHOLD,
        }
    }
}

/// CRM property mapping, externalized so custom-property ids are never
/// hard-coded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CrmMapping {
    /// Internal field name -> CRM deal property name
    pub deal_fields: HashMap<String, String>,
    /// Internal status -> CRM deal stage identifier
    pub stage_map: HashMap<LeadStatus, String>,
    /// Custom deal property that stores the lead id for idempotent lookup
    pub lead_id_property: String,
}

impl CrmMapping {
    pub fn lead_id_property(&self) -> &str {
        if self.lead_id_property.is_empty() {
            "leadflow_lead_id"
        } else {
            &self.lead_id_property
        }
    }
}

/// Export window restricted to off-hours, e.g. 18:00-06:00 local. Spans
/// crossing midnight are legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportWindow {
    pub start_hour: u8,
    pub end_hour: u8,
}

impl ExportWindow {
    pub fn contains_hour(&self, hour: u8) -> bool {
        if self.start_hour <= self.end_hour {
            (self.start_hour..self.end_hour).contains(&hour)
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub interval_minutes: u64,
    pub batch_size: usize,
    pub object_timeout_secs: u64,
    pub default_retry_after_secs: u64,
    /// When set, exports run only inside this window
    pub window: Option<ExportWindow>,
    pub mapping: CrmMapping,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            interval_minutes: defaults::DEFAULT_EXPORT_INTERVAL_MINUTES,
            batch_size: defaults::DEFAULT_EXPORT_BATCH_SIZE,
            object_timeout_secs: defaults::DEFAULT_EXPORT_TIMEOUT_SECS,
            default_retry_after_secs: defaults::DEFAULT_CRM_RETRY_AFTER_SECS,
            window: None,
            mapping: CrmMapping::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub sources_check_interval_secs: u64,
    pub queue_capacity: usize,
    pub shutdown_deadline_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sources_check_interval_secs: defaults::DEFAULT_SOURCES_CHECK_INTERVAL_SECS,
            queue_capacity: defaults::DEFAULT_QUEUE_CAPACITY,
            shutdown_deadline_secs: defaults::DEFAULT_SHUTDOWN_DEADLINE_SECS,
        }
    }
}

impl EngineConfig {
    pub fn shutdown_deadline(&self) -> Duration {
        Duration::from_secs(self.shutdown_deadline_secs)
    }
}

/// The whole configuration surface handed to the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PipelineConfig {
    pub sources: Vec<Source>,
    pub governor: GovernorConfig,
    pub fetch: FetchConfig,
    pub classify: ClassifyConfig,
    pub enrich: EnrichConfig,
    pub store: StoreConfig,
    pub export: ExportConfig,
    pub engine: EngineConfig,
}

impl PipelineConfig {
    /// Startup validation. Configuration errors are fatal at startup and
    /// never fatal mid-run; reloads revalidate before applying.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.governor.max_concurrent_sources == 0 {
            return Err(ConfigError::Invalid(
                "governor.max_concurrent_sources must be at least 1".into(),
            ));
        }
        if self.governor.max_workers == 0 {
            return Err(ConfigError::Invalid(
                "governor.max_workers must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.classify.confidence_threshold) {
            return Err(ConfigError::Invalid(
                "classify.confidence_threshold must be within [0, 1]".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.store.dedup_threshold) {
            return Err(ConfigError::Invalid(
                "store.dedup_threshold must be within [0, 1]".into(),
            ));
        }
        if self.export.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "export.batch_size must be at least 1".into(),
            ));
        }
        if self.engine.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "engine.queue_capacity must be at least 1".into(),
            ));
        }
        if let Some(window) = &self.export.window {
            if window.start_hour > 23 || window.end_hour > 23 {
                return Err(ConfigError::Invalid(
                    "export.window hours must be within 0-23".into(),
                ));
            }
        }
        let mut seen = std::collections::HashSet::new();
        for source in &self.sources {
            if !seen.insert(&source.id) {
                return Err(ConfigError::DuplicateSource(source.id.to_string()));
            }
            if source.url.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "source '{}' has an empty url",
                    source.id
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SourceId;
    use crate::source::SourceType;

    #[test]
    fn test_default_config_is_valid() {
        PipelineConfig::default().validate().unwrap();
    }

    #[test]
    fn test_duplicate_source_ids_rejected() {
        let mut config = PipelineConfig::default();
        let id = SourceId::new("twice").unwrap();
        config.sources.push(Source::new(
            id.clone(),
            "First",
            "https://example.com/feed",
            SourceType::Feed,
        ));
        config.sources.push(Source::new(
            id,
            "Second",
            "https://example.com/feed2",
            SourceType::Feed,
        ));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateSource(_))
        ));
    }

    #[test]
    fn test_backoff_caps() {
        let fetch = FetchConfig::default();
        assert_eq!(fetch.backoff_for_attempt(0), Duration::from_secs(1));
        assert_eq!(fetch.backoff_for_attempt(1), Duration::from_secs(2));
        assert_eq!(fetch.backoff_for_attempt(2), Duration::from_secs(4));
        assert_eq!(fetch.backoff_for_attempt(10), Duration::from_secs(60));
    }

    #[test]
    fn test_export_window_wraps_midnight() {
        let window = ExportWindow {
            start_hour: 18,
            end_hour: 6,
        };
        assert!(window.contains_hour(19));
        assert!(window.contains_hour(2));
        assert!(!window.contains_hour(12));
    }
}
