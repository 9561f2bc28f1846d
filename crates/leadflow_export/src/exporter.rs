//! Export algorithm.

use crate::crm::{CrmClient, CrmCompanySpec, CrmContactSpec, CrmError};
use crate::keyed_lock::KeyedLocks;
use crate::mapping;
use chrono::{DateTime, Timelike, Utc};
use leadflow_types::{normalize_match_text, ExportConfig, ExportResult, Lead, LeadId};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("crm failure: {0}")]
    Crm(#[from] CrmError),
}

impl ExportError {
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ExportError::Crm(CrmError::RateLimited { retry_after }) => *retry_after,
            _ => None,
        }
    }

    pub fn is_rate_limit(&self) -> bool {
        matches!(self, ExportError::Crm(CrmError::RateLimited { .. }))
    }
}

/// Per-lead outcome within a batch.
#[derive(Debug)]
pub enum BatchOutcome {
    Exported {
        lead_id: LeadId,
        record_ids: HashMap<String, String>,
    },
    Failed {
        lead_id: LeadId,
        error: String,
        rate_limited: bool,
    },
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<BatchOutcome>,
}

impl BatchReport {
    pub fn exported(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, BatchOutcome::Exported { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.exported()
    }
}

pub struct Exporter {
    crm: Arc<dyn CrmClient>,
    config: ExportConfig,
    company_locks: KeyedLocks,
}

impl Exporter {
    pub fn new(crm: Arc<dyn CrmClient>, config: ExportConfig) -> Self {
        Self {
            crm,
            config,
            company_locks: KeyedLocks::new(),
        }
    }

    /// Whether exports may run at this wall-clock hour.
    pub fn within_window(&self, now: DateTime<Utc>) -> bool {
        match &self.config.window {
            Some(window) => window.contains_hour(now.hour() as u8),
            None => true,
        }
    }

    /// Export a batch in order. A rate-limited lead is recorded as failed,
    /// the batch sleeps out the origin's backoff, then continues with the
    /// next lead; everything still unexported is retried next window.
    pub async fn export_batch(&self, leads: &[Lead]) -> BatchReport {
        let mut report = BatchReport::default();
        for lead in leads {
            match self.export_lead(lead).await {
                Ok(result) => {
                    report.outcomes.push(BatchOutcome::Exported {
                        lead_id: lead.lead_id,
                        record_ids: record_ids_from(&result),
                    });
                }
                Err(error) => {
                    let rate_limited = error.is_rate_limit();
                    report.outcomes.push(BatchOutcome::Failed {
                        lead_id: lead.lead_id,
                        error: error.to_string(),
                        rate_limited,
                    });
                    if rate_limited {
                        let backoff = error
                            .retry_after()
                            .unwrap_or(Duration::from_secs(self.config.default_retry_after_secs));
                        warn!(
                            lead = %lead.lead_id,
                            backoff_secs = backoff.as_secs(),
                            "CRM rate limited, backing off before next lead"
                        );
                        tokio::time::sleep(backoff).await;
                    }
                }
            }
        }
        info!(
            exported = report.exported(),
            failed = report.failed(),
            "Export batch finished"
        );
        report
    }

    /// Steps 1-7: resolve company, contacts, deal; map fields; attach a
    /// note. Every step is find-or-create, so a retried lead converges on
    /// the same CRM objects instead of duplicating them.
    pub async fn export_lead(&self, lead: &Lead) -> Result<ExportResult, ExportError> {
        let company_id = self.resolve_company(lead).await?;
        let contact_ids = self.resolve_contacts(lead, company_id.as_deref()).await?;
        let deal_id = self.resolve_deal(lead).await?;
        let note_id = self
            .bounded(self.crm.add_note(&deal_id, &mapping::note_body(lead)))
            .await?;

        debug!(lead = %lead.lead_id, deal = %deal_id, "Lead exported");
        Ok(ExportResult {
            lead_id: lead.lead_id,
            company_id,
            contact_ids,
            deal_id: Some(deal_id),
            note_id: Some(note_id),
            complete: true,
        })
    }

    /// Find-or-create the company under a per-(name, domain) lock so
    /// concurrent exports of the same company cannot double-create.
    async fn resolve_company(&self, lead: &Lead) -> Result<Option<String>, ExportError> {
        let Some(company) = &lead.company else {
            return Ok(None);
        };
        let normalized = normalize_match_text(&company.name);
        if normalized.is_empty() {
            return Ok(None);
        }
        let key = format!(
            "{normalized}|{}",
            company.domain.as_deref().unwrap_or_default()
        );
        let _guard = self.company_locks.acquire(&key).await;

        if let Some(id) = self
            .bounded(self.crm.find_company(&normalized, company.domain.as_deref()))
            .await?
        {
            return Ok(Some(id));
        }
        let id = self
            .bounded(self.crm.create_company(&CrmCompanySpec {
                name: company.name.clone(),
                domain: company.domain.clone(),
            }))
            .await?;
        Ok(Some(id))
    }

    async fn resolve_contacts(
        &self,
        lead: &Lead,
        company_id: Option<&str>,
    ) -> Result<Vec<String>, ExportError> {
        let mut contact_ids = Vec::new();
        for contact in &lead.contacts {
            let existing = match (&contact.email, company_id) {
                (Some(email), _) => self.bounded(self.crm.find_contact_by_email(email)).await?,
                (None, Some(company_id)) => {
                    self.bounded(self.crm.find_contact_by_name(&contact.name, company_id))
                        .await?
                }
                // No email and no company: nothing to key the search on.
                (None, None) => None,
            };
            let contact_id = match existing {
                Some(id) => id,
                None => {
                    self.bounded(self.crm.create_contact(&CrmContactSpec {
                        name: contact.name.clone(),
                        email: contact.email.clone(),
                        phone: contact.phone.clone(),
                        role: contact.role.clone(),
                        company_id: company_id.map(str::to_string),
                    }))
                    .await?
                }
            };
            if let Some(company_id) = company_id {
                self.bounded(self.crm.associate_contact(&contact_id, company_id))
                    .await?;
            }
            contact_ids.push(contact_id);
        }
        Ok(contact_ids)
    }

    async fn resolve_deal(&self, lead: &Lead) -> Result<String, ExportError> {
        let property = self.config.mapping.lead_id_property();
        let properties = mapping::deal_properties(lead, &self.config.mapping);
        let stage = mapping::stage_for(lead, &self.config.mapping);

        let existing = self
            .bounded(
                self.crm
                    .find_deal_by_property(property, &lead.lead_id.to_string()),
            )
            .await?;
        match existing {
            Some(deal_id) => {
                self.bounded(
                    self.crm
                        .update_deal(&deal_id, &properties, stage.as_deref()),
                )
                .await?;
                Ok(deal_id)
            }
            None => Ok(self
                .bounded(self.crm.create_deal(&properties, stage.as_deref()))
                .await?),
        }
    }

    /// Apply the per-object timeout; an elapsed timer reads as a transient
    /// CRM failure.
    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, CrmError>>,
    ) -> Result<T, CrmError> {
        let timeout = Duration::from_secs(self.config.object_timeout_secs);
        match tokio::time::timeout(timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(CrmError::Transient(format!(
                "crm call exceeded {timeout:?}"
            ))),
        }
    }
}

fn record_ids_from(result: &ExportResult) -> HashMap<String, String> {
    let mut ids = HashMap::new();
    if let Some(company_id) = &result.company_id {
        ids.insert("company".to_string(), company_id.clone());
    }
    if let Some(deal_id) = &result.deal_id {
        ids.insert("deal".to_string(), deal_id.clone());
    }
    if let Some(note_id) = &result.note_id {
        ids.insert("note".to_string(), note_id.clone());
    }
    for (index, contact_id) in result.contact_ids.iter().enumerate() {
        ids.insert(format!("contact:{index}"), contact_id.clone());
    }
    ids
}
