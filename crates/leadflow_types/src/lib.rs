//! Canonical data model shared across the Leadflow pipeline.
//!
//! Every stage speaks these types: Sources in, CandidateLeads through the
//! extractor, Leads through classification and beyond. Enums here are the
//! CANONICAL definitions - use these everywhere.

pub mod config;
pub mod defaults;
pub mod error;
pub mod ids;
pub mod lead;
pub mod source;

// Re-export types for convenience
pub use error::ConfigError;
pub use ids::{LeadId, SourceId};
pub use lead::{
    normalize_match_text,
    CandidateLead,
    Company,
    CompanySize,
    Contact,
    DedupRecord,
    ExportResult,
    // Canonical enums (use these everywhere)
    LeadStatus,
    Location,
    Lead,
    MarketSector,
    MoneyCents,
    Priority,
    ProjectStage,
    RejectReason,
    SquareFeet,
};
pub use source::{
    FetchJob, FormStep, HtmlHints, JsonHints, PatternHints, RawPayload, Schedule, Source,
    SourceHints, SourceType,
};

pub use config::{
    CacheConfig, ClassifyConfig, CrmMapping, EnrichConfig, EngineConfig, ExportConfig,
    ExportWindow, FetchConfig, GovernorConfig, PipelineConfig, SectorKeyword, StageKeyword,
    StoreConfig, TargetRegion,
};
