//! In-memory CRM double with create counters.

use async_trait::async_trait;
use leadflow_export::{CrmClient, CrmCompanySpec, CrmContactSpec, CrmError};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MockCrmCounts {
    pub companies_created: usize,
    pub contacts_created: usize,
    pub deals_created: usize,
    pub deals_updated: usize,
    pub notes_created: usize,
}

#[derive(Default)]
struct State {
    companies: Vec<(String, String, Option<String>)>,
    contacts: Vec<(String, String, Option<String>)>,
    deals: Vec<(String, HashMap<String, String>)>,
    associations: Vec<(String, String)>,
    counts: MockCrmCounts,
    next_id: usize,
    /// Every CRM call rate-limits once this many deals exist.
    rate_limit_after_deals: Option<usize>,
    retry_after: Option<Duration>,
}

/// Mock CRM: find-or-create against in-memory tables, with an optional
/// rate-limit trip wire for backpressure scenarios.
#[derive(Default)]
pub struct MockCrm {
    state: Mutex<State>,
}

impl MockCrm {
    pub fn new() -> Self {
        Self::default()
    }

    /// After `deals` deals exist, every further call returns 429 with the
    /// given Retry-After.
    pub fn rate_limit_after_deals(self, deals: usize, retry_after: Duration) -> Self {
        {
            let mut state = self.state.lock().expect("mock crm lock poisoned");
            state.rate_limit_after_deals = Some(deals);
            state.retry_after = Some(retry_after);
        }
        self
    }

    pub fn counts(&self) -> MockCrmCounts {
        self.state.lock().expect("mock crm lock poisoned").counts
    }

    pub fn deal_property(&self, deal_id: &str, property: &str) -> Option<String> {
        let state = self.state.lock().expect("mock crm lock poisoned");
        state
            .deals
            .iter()
            .find(|(id, _)| id == deal_id)
            .and_then(|(_, properties)| properties.get(property).cloned())
    }

    fn check_limit(state: &State) -> Result<(), CrmError> {
        if let Some(after) = state.rate_limit_after_deals {
            if state.deals.len() >= after {
                return Err(CrmError::RateLimited {
                    retry_after: state.retry_after,
                });
            }
        }
        Ok(())
    }

    fn next_id(state: &mut State, prefix: &str) -> String {
        state.next_id += 1;
        format!("{prefix}-{}", state.next_id)
    }
}

#[async_trait]
impl CrmClient for MockCrm {
    async fn find_company(
        &self,
        normalized_name: &str,
        domain: Option<&str>,
    ) -> Result<Option<String>, CrmError> {
        let state = self.state.lock().expect("mock crm lock poisoned");
        Self::check_limit(&state)?;
        Ok(state
            .companies
            .iter()
            .find(|(_, name, existing_domain)| {
                name == normalized_name
                    || (domain.is_some() && existing_domain.as_deref() == domain)
            })
            .map(|(id, _, _)| id.clone()))
    }

    async fn create_company(&self, spec: &CrmCompanySpec) -> Result<String, CrmError> {
        let mut state = self.state.lock().expect("mock crm lock poisoned");
        Self::check_limit(&state)?;
        let id = Self::next_id(&mut state, "company");
        let normalized = leadflow_types::normalize_match_text(&spec.name);
        state
            .companies
            .push((id.clone(), normalized, spec.domain.clone()));
        state.counts.companies_created += 1;
        Ok(id)
    }

    async fn find_contact_by_email(&self, email: &str) -> Result<Option<String>, CrmError> {
        let state = self.state.lock().expect("mock crm lock poisoned");
        Self::check_limit(&state)?;
        Ok(state
            .contacts
            .iter()
            .find(|(_, _, existing)| existing.as_deref() == Some(email))
            .map(|(id, _, _)| id.clone()))
    }

    async fn find_contact_by_name(
        &self,
        name: &str,
        _company_id: &str,
    ) -> Result<Option<String>, CrmError> {
        let state = self.state.lock().expect("mock crm lock poisoned");
        Self::check_limit(&state)?;
        Ok(state
            .contacts
            .iter()
            .find(|(_, existing, _)| existing == name)
            .map(|(id, _, _)| id.clone()))
    }

    async fn create_contact(&self, spec: &CrmContactSpec) -> Result<String, CrmError> {
        let mut state = self.state.lock().expect("mock crm lock poisoned");
        Self::check_limit(&state)?;
        let id = Self::next_id(&mut state, "contact");
        state
            .contacts
            .push((id.clone(), spec.name.clone(), spec.email.clone()));
        state.counts.contacts_created += 1;
        Ok(id)
    }

    async fn associate_contact(
        &self,
        contact_id: &str,
        company_id: &str,
    ) -> Result<(), CrmError> {
        let mut state = self.state.lock().expect("mock crm lock poisoned");
        Self::check_limit(&state)?;
        let pair = (contact_id.to_string(), company_id.to_string());
        if !state.associations.contains(&pair) {
            state.associations.push(pair);
        }
        Ok(())
    }

    async fn find_deal_by_property(
        &self,
        property: &str,
        value: &str,
    ) -> Result<Option<String>, CrmError> {
        let state = self.state.lock().expect("mock crm lock poisoned");
        Self::check_limit(&state)?;
        Ok(state
            .deals
            .iter()
            .find(|(_, properties)| properties.get(property).map(String::as_str) == Some(value))
            .map(|(id, _)| id.clone()))
    }

    async fn create_deal(
        &self,
        properties: &HashMap<String, String>,
        stage: Option<&str>,
    ) -> Result<String, CrmError> {
        let mut state = self.state.lock().expect("mock crm lock poisoned");
        Self::check_limit(&state)?;
        let id = Self::next_id(&mut state, "deal");
        let mut properties = properties.clone();
        if let Some(stage) = stage {
            properties.insert("dealstage".to_string(), stage.to_string());
        }
        state.deals.push((id.clone(), properties));
        state.counts.deals_created += 1;
        Ok(id)
    }

    async fn update_deal(
        &self,
        deal_id: &str,
        properties: &HashMap<String, String>,
        stage: Option<&str>,
    ) -> Result<(), CrmError> {
        let mut state = self.state.lock().expect("mock crm lock poisoned");
        Self::check_limit(&state)?;
        let deal = state
            .deals
            .iter_mut()
            .find(|(id, _)| id == deal_id)
            .ok_or_else(|| CrmError::Permanent(format!("no such deal {deal_id}")))?;
        deal.1.extend(properties.clone());
        if let Some(stage) = stage {
            deal.1.insert("dealstage".to_string(), stage.to_string());
        }
        state.counts.deals_updated += 1;
        Ok(())
    }

    async fn add_note(&self, _deal_id: &str, _body: &str) -> Result<String, CrmError> {
        let mut state = self.state.lock().expect("mock crm lock poisoned");
        Self::check_limit(&state)?;
        let id = Self::next_id(&mut state, "note");
        state.counts.notes_created += 1;
        Ok(id)
    }
}
