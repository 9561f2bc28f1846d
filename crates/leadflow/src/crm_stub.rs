//! Dry-run CRM client.
//!
//! The production CRM client is a deployment concern and is injected by
//! the integration that owns the tenant's credentials. Until one is
//! wired, exports run against this logging client, which honors the
//! find-or-create contract in memory so repeated runs stay idempotent.

use async_trait::async_trait;
use leadflow_export::{CrmClient, CrmCompanySpec, CrmContactSpec, CrmError};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::info;

#[derive(Default)]
struct Records {
    companies: HashMap<String, String>,
    contacts: HashMap<String, String>,
    deals: HashMap<String, String>,
    next_id: usize,
}

impl Records {
    fn next(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("dry-{prefix}-{}", self.next_id)
    }
}

#[derive(Default)]
pub struct LoggingCrm {
    records: Mutex<Records>,
}

impl LoggingCrm {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CrmClient for LoggingCrm {
    async fn find_company(
        &self,
        normalized_name: &str,
        _domain: Option<&str>,
    ) -> Result<Option<String>, CrmError> {
        let records = self.records.lock().expect("crm stub lock poisoned");
        Ok(records.companies.get(normalized_name).cloned())
    }

    async fn create_company(&self, spec: &CrmCompanySpec) -> Result<String, CrmError> {
        let mut records = self.records.lock().expect("crm stub lock poisoned");
        let id = records.next("company");
        let key = leadflow_types::normalize_match_text(&spec.name);
        records.companies.insert(key, id.clone());
        info!(company = %spec.name, id, "Dry-run CRM: company created");
        Ok(id)
    }

    async fn find_contact_by_email(&self, email: &str) -> Result<Option<String>, CrmError> {
        let records = self.records.lock().expect("crm stub lock poisoned");
        Ok(records.contacts.get(email).cloned())
    }

    async fn find_contact_by_name(
        &self,
        name: &str,
        _company_id: &str,
    ) -> Result<Option<String>, CrmError> {
        let records = self.records.lock().expect("crm stub lock poisoned");
        Ok(records.contacts.get(name).cloned())
    }

    async fn create_contact(&self, spec: &CrmContactSpec) -> Result<String, CrmError> {
        let mut records = self.records.lock().expect("crm stub lock poisoned");
        let id = records.next("contact");
        let key = spec
            .email
            .clone()
            .unwrap_or_else(|| spec.name.clone());
        records.contacts.insert(key, id.clone());
        info!(contact = %spec.name, id, "Dry-run CRM: contact created");
        Ok(id)
    }

    async fn associate_contact(
        &self,
        _contact_id: &str,
        _company_id: &str,
    ) -> Result<(), CrmError> {
        Ok(())
    }

    async fn find_deal_by_property(
        &self,
        _property: &str,
        value: &str,
    ) -> Result<Option<String>, CrmError> {
        let records = self.records.lock().expect("crm stub lock poisoned");
        Ok(records.deals.get(value).cloned())
    }

    async fn create_deal(
        &self,
        properties: &HashMap<String, String>,
        _stage: Option<&str>,
    ) -> Result<String, CrmError> {
        let mut records = self.records.lock().expect("crm stub lock poisoned");
        let id = records.next("deal");
        // Key by whichever property carries the lead id; it is always
        // present (the exporter injects it).
        for value in properties.values() {
            records.deals.insert(value.clone(), id.clone());
        }
        info!(id, "Dry-run CRM: deal created");
        Ok(id)
    }

    async fn update_deal(
        &self,
        deal_id: &str,
        _properties: &HashMap<String, String>,
        _stage: Option<&str>,
    ) -> Result<(), CrmError> {
        info!(deal = deal_id, "Dry-run CRM: deal updated");
        Ok(())
    }

    async fn add_note(&self, deal_id: &str, _body: &str) -> Result<String, CrmError> {
        let mut records = self.records.lock().expect("crm stub lock poisoned");
        let id = records.next("note");
        info!(deal = deal_id, id, "Dry-run CRM: note added");
        Ok(id)
    }
}
