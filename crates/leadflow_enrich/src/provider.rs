//! Provider capability interface.

use async_trait::async_trait;
use leadflow_types::{Company, CompanySize, Contact};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// The fixed set of enrichment operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnrichOp {
    CompanyLookup,
    DomainDiscovery,
    ContactFinding,
    SizeEstimation,
    RelatedProjects,
}

impl EnrichOp {
    pub const ALL: &'static [EnrichOp] = &[
        EnrichOp::CompanyLookup,
        EnrichOp::DomainDiscovery,
        EnrichOp::ContactFinding,
        EnrichOp::SizeEstimation,
        EnrichOp::RelatedProjects,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EnrichOp::CompanyLookup => "company-lookup",
            EnrichOp::DomainDiscovery => "domain-discovery",
            EnrichOp::ContactFinding => "contact-finding",
            EnrichOp::SizeEstimation => "size-estimation",
            EnrichOp::RelatedProjects => "related-projects",
        }
    }
}

impl fmt::Display for EnrichOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a provider can hand back, one variant per operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderValue {
    Company(Company),
    Domain(String),
    Contacts(Vec<Contact>),
    CompanySize(CompanySize),
    RelatedProjects(Vec<String>),
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider timed out after {0:?}")]
    Timeout(Duration),
    #[error("provider rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    #[error("provider rejected the request: {0}")]
    Rejected(String),
}

impl ProviderError {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::Timeout(_)
                | ProviderError::RateLimited { .. }
                | ProviderError::Unavailable(_)
        )
    }
}

/// Narrow lookup interface. `Ok(None)` is a definitive miss and is cached
/// as a negative result; errors are provider trouble and feed the health
/// tracker.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;
    async fn lookup(&self, key: &str) -> Result<Option<ProviderValue>, ProviderError>;
}
