//! Enrichment stage: gap-filling of lead fields from external providers.
//!
//! Five fixed operations (company lookup, domain discovery, contact
//! finding, size estimation, related-project search), each behind an
//! injected provider capability. Lookups are cached with TTL, capped LRU;
//! provider failures are contained here and never become pipeline
//! failures. Quality and priority scoring run after enrichment because
//! they reward field completeness.

mod cache;
mod enricher;
mod health;
mod provider;
pub mod scoring;

pub use cache::{CacheHit, CacheKey, EnrichmentCache};
pub use enricher::{Enricher, EnrichmentProviders};
pub use health::ProviderHealth;
pub use provider::{EnrichOp, Provider, ProviderError, ProviderValue};
