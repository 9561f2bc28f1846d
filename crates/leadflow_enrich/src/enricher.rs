//! Enrichment fan-out and conservative merge.

use crate::cache::{CacheHit, CacheKey, EnrichmentCache};
use crate::health::ProviderHealth;
use crate::provider::{EnrichOp, Provider, ProviderError, ProviderValue};
use crate::scoring;
use leadflow_types::{normalize_match_text, EnrichConfig, Lead};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// One injected provider per operation; any of them may be absent, in
/// which case that dimension is simply never enriched.
#[derive(Default, Clone)]
pub struct EnrichmentProviders {
    pub company: Option<Arc<dyn Provider>>,
    pub domain: Option<Arc<dyn Provider>>,
    pub contacts: Option<Arc<dyn Provider>>,
    pub size: Option<Arc<dyn Provider>>,
    pub related: Option<Arc<dyn Provider>>,
}

impl EnrichmentProviders {
    fn get(&self, op: EnrichOp) -> Option<&Arc<dyn Provider>> {
        match op {
            EnrichOp::CompanyLookup => self.company.as_ref(),
            EnrichOp::DomainDiscovery => self.domain.as_ref(),
            EnrichOp::ContactFinding => self.contacts.as_ref(),
            EnrichOp::SizeEstimation => self.size.as_ref(),
            EnrichOp::RelatedProjects => self.related.as_ref(),
        }
    }

    fn names(&self) -> Vec<String> {
        EnrichOp::ALL
            .iter()
            .filter_map(|op| self.get(*op))
            .map(|p| p.name().to_string())
            .collect()
    }
}

pub struct Enricher {
    providers: EnrichmentProviders,
    cache: EnrichmentCache,
    health: ProviderHealth,
    limits: HashMap<String, Arc<Semaphore>>,
    config: EnrichConfig,
}

impl Enricher {
    pub fn new(config: EnrichConfig, providers: EnrichmentProviders) -> Self {
        let mut limits = HashMap::new();
        for name in providers.names() {
            limits
                .entry(name)
                .or_insert_with(|| Arc::new(Semaphore::new(config.per_provider_concurrency.max(1))));
        }
        Self {
            cache: EnrichmentCache::new(&config.cache),
            health: ProviderHealth::new(
                config.failure_rate_threshold,
                config.provider_cooldown(),
            ),
            limits,
            providers,
            config,
        }
    }

    pub fn cache(&self) -> &EnrichmentCache {
        &self.cache
    }

    /// Enrich one lead. All operations run in parallel and join before the
    /// lead advances; failures leave the lead un-enriched for that
    /// dimension only. Quality, win probability, and priority are
    /// recomputed at the end - they are pure functions of the final field
    /// values, so recomputation is idempotent.
    pub async fn enrich(&self, mut lead: Lead) -> Lead {
        let company_key = lead.company.as_ref().map(|c| normalize_match_text(&c.name));
        let related_key = format!(
            "{} | {}",
            normalize_match_text(&lead.title),
            lead.location.normalized()
        );

        let (company, domain, contacts, size, related) = tokio::join!(
            self.run_op(EnrichOp::CompanyLookup, company_key.clone()),
            self.run_op(EnrichOp::DomainDiscovery, company_key.clone()),
            self.run_op(EnrichOp::ContactFinding, company_key.clone()),
            self.run_op(EnrichOp::SizeEstimation, company_key),
            self.run_op(EnrichOp::RelatedProjects, Some(related_key)),
        );

        apply(&mut lead, company);
        apply(&mut lead, domain);
        apply(&mut lead, size);
        apply(&mut lead, contacts);
        apply(&mut lead, related);

        lead.quality_score = scoring::score_quality(&lead);
        lead.win_probability = scoring::win_probability(&lead);
        lead.priority = scoring::priority_for(&lead);
        lead
    }

    async fn run_op(&self, op: EnrichOp, key: Option<String>) -> Option<ProviderValue> {
        let provider = self.providers.get(op)?;
        let key = key.filter(|k| !k.trim().is_empty())?;
        let cache_key = CacheKey::new(provider.name(), key.clone());

        match self.cache.get(&cache_key) {
            Some(CacheHit::Value(value)) => {
                debug!(op = %op, provider = provider.name(), "Enrichment cache hit");
                return Some(value);
            }
            Some(CacheHit::Negative) => return None,
            None => {}
        }

        if !self.health.available(provider.name()) {
            return None;
        }

        let semaphore = self.limits.get(provider.name())?;
        let _slot = semaphore.acquire().await.ok()?;

        match self.lookup_with_retry(provider.as_ref(), &key).await {
            Ok(Some(value)) => {
                self.health.record_success(provider.name());
                self.cache.put(cache_key, value.clone());
                Some(value)
            }
            Ok(None) => {
                self.health.record_success(provider.name());
                self.cache.put_negative(cache_key);
                None
            }
            Err(error) => {
                self.health.record_failure(provider.name());
                warn!(op = %op, provider = provider.name(), %error, "Enrichment lookup failed");
                self.cache.put_negative(cache_key);
                None
            }
        }
    }

    /// One bounded lookup, retried once on a transient failure.
    async fn lookup_with_retry(
        &self,
        provider: &dyn Provider,
        key: &str,
    ) -> Result<Option<ProviderValue>, ProviderError> {
        let timeout = self.config.provider_timeout();
        let first = match tokio::time::timeout(timeout, provider.lookup(key)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(timeout)),
        };
        match first {
            Err(error) if error.is_transient() => {
                match tokio::time::timeout(timeout, provider.lookup(key)).await {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::Timeout(timeout)),
                }
            }
            other => other,
        }
    }
}

/// Conservative merge: enrichment only ever fills gaps.
fn apply(lead: &mut Lead, value: Option<ProviderValue>) {
    let Some(value) = value else { return };
    match value {
        ProviderValue::Company(found) => match &mut lead.company {
            None => lead.company = Some(found),
            Some(existing) => {
                if existing.domain.is_none() {
                    existing.domain = found.domain;
                }
                if existing.size.is_none() {
                    existing.size = found.size;
                }
                if existing.hq_location.is_none() {
                    existing.hq_location = found.hq_location;
                }
            }
        },
        ProviderValue::Domain(domain) => {
            if let Some(company) = &mut lead.company {
                if company.domain.is_none() {
                    company.domain = Some(domain);
                }
            }
        }
        ProviderValue::CompanySize(size) => {
            if let Some(company) = &mut lead.company {
                if company.size.is_none() {
                    company.size = Some(size);
                }
            }
        }
        ProviderValue::Contacts(found) => {
            for contact in found {
                let seen = lead
                    .contacts
                    .iter()
                    .any(|c| c.name == contact.name && c.email == contact.email);
                if !seen {
                    lead.contacts.push(contact);
                }
            }
        }
        ProviderValue::RelatedProjects(projects) => {
            if lead.notes.is_empty() && !projects.is_empty() {
                lead.notes = format!("Related projects: {}", projects.join("; "));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use leadflow_types::{
        Company, Contact, LeadId, LeadStatus, Location, MarketSector, Priority, ProjectStage,
        SourceId,
    };
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FixedProvider {
        name: &'static str,
        value: Option<ProviderValue>,
        calls: AtomicU32,
    }

    impl FixedProvider {
        fn new(name: &'static str, value: Option<ProviderValue>) -> Arc<Self> {
            Arc::new(Self {
                name,
                value,
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl Provider for FixedProvider {
        fn name(&self) -> &str {
            self.name
        }

        async fn lookup(&self, _key: &str) -> Result<Option<ProviderValue>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.value.clone())
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl Provider for FailingProvider {
        fn name(&self) -> &str {
            "failing"
        }

        async fn lookup(&self, _key: &str) -> Result<Option<ProviderValue>, ProviderError> {
            Err(ProviderError::Unavailable("down".into()))
        }
    }

    fn lead_with_company() -> Lead {
        Lead {
            lead_id: LeadId::new(),
            source_id: SourceId::new("feed").unwrap(),
            source_url: "https://example.com/a".to_string(),
            source_record_id: None,
            title: "Hospital Expansion".to_string(),
            description: "wing addition".to_string(),
            market_sector: MarketSector::Healthcare,
            location: Location {
                city: Some("Tacoma".to_string()),
                state: Some("WA".to_string()),
                ..Location::default()
            },
            project_stage: ProjectStage::Planning,
            estimated_value: Some(leadflow_types::MoneyCents::from_dollars(12_000_000)),
            estimated_size: None,
            published_at: Some(Utc::now()),
            confidence_score: 0.85,
            quality_score: 0,
            priority: Priority::Medium,
            win_probability: 0.0,
            company: Some(Company {
                name: "Sound Builders".to_string(),
                ..Company::default()
            }),
            contacts: Vec::new(),
            status: LeadStatus::Validated,
            notes: String::new(),
            first_seen_at: Utc::now(),
            last_updated_at: Utc::now(),
            export_record_ids: HashMap::new(),
        }
    }

    fn enricher_with(providers: EnrichmentProviders) -> Enricher {
        Enricher::new(EnrichConfig::default(), providers)
    }

    #[tokio::test]
    async fn test_fills_gaps_only() {
        let domain = FixedProvider::new(
            "domains",
            Some(ProviderValue::Domain("soundbuilders.com".into())),
        );
        let enricher = enricher_with(EnrichmentProviders {
            domain: Some(domain),
            ..EnrichmentProviders::default()
        });

        let mut lead = lead_with_company();
        lead.company.as_mut().unwrap().domain = Some("existing.com".to_string());
        let enriched = enricher.enrich(lead).await;
        // Non-null field survives.
        assert_eq!(
            enriched.company.unwrap().domain.as_deref(),
            Some("existing.com")
        );

        let enriched = enricher.enrich(lead_with_company()).await;
        assert_eq!(
            enriched.company.unwrap().domain.as_deref(),
            Some("soundbuilders.com")
        );
    }

    #[tokio::test]
    async fn test_cache_prevents_second_lookup() {
        let domain = FixedProvider::new(
            "domains",
            Some(ProviderValue::Domain("soundbuilders.com".into())),
        );
        let enricher = enricher_with(EnrichmentProviders {
            domain: Some(Arc::clone(&domain) as Arc<dyn Provider>),
            ..EnrichmentProviders::default()
        });

        enricher.enrich(lead_with_company()).await;
        enricher.enrich(lead_with_company()).await;
        assert_eq!(domain.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_provider_failure_never_fails_lead() {
        let enricher = enricher_with(EnrichmentProviders {
            company: Some(Arc::new(FailingProvider)),
            ..EnrichmentProviders::default()
        });
        let enriched = enricher.enrich(lead_with_company()).await;
        // Lead proceeds un-enriched; scoring still ran.
        assert!(enriched.quality_score > 0);
    }

    #[tokio::test]
    async fn test_contacts_are_unioned() {
        let contacts = FixedProvider::new(
            "contacts",
            Some(ProviderValue::Contacts(vec![Contact {
                name: "Dana Reyes".to_string(),
                role: Some("Project Manager".to_string()),
                email: Some("dana@soundbuilders.com".to_string()),
                phone: None,
            }])),
        );
        let enricher = enricher_with(EnrichmentProviders {
            contacts: Some(contacts),
            ..EnrichmentProviders::default()
        });

        let mut lead = lead_with_company();
        lead.contacts.push(Contact {
            name: "Dana Reyes".to_string(),
            role: None,
            email: Some("dana@soundbuilders.com".to_string()),
            phone: None,
        });
        let enriched = enricher.enrich(lead).await;
        assert_eq!(enriched.contacts.len(), 1);
    }

    #[tokio::test]
    async fn test_scoring_is_idempotent() {
        let enricher = enricher_with(EnrichmentProviders::default());
        let once = enricher.enrich(lead_with_company()).await;
        let twice = enricher.enrich(once.clone()).await;
        assert_eq!(once.quality_score, twice.quality_score);
        assert_eq!(once.priority, twice.priority);
        assert_eq!(once.win_probability, twice.win_probability);
    }
}
