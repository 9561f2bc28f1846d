//! CRM client capability.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrmError {
    #[error("crm rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },
    #[error("transient crm failure: {0}")]
    Transient(String),
    #[error("permanent crm failure: {0}")]
    Permanent(String),
}

/// Company creation payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrmCompanySpec {
    pub name: String,
    pub domain: Option<String>,
}

/// Contact creation payload. `company_id` is absent when the lead had no
/// resolvable company.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrmContactSpec {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Option<String>,
    pub company_id: Option<String>,
}

/// The injected CRM surface. The wire shape behind these calls is the
/// client's business; this contract is only find/create/update per object
/// kind plus notes.
#[async_trait]
pub trait CrmClient: Send + Sync {
    async fn find_company(
        &self,
        normalized_name: &str,
        domain: Option<&str>,
    ) -> Result<Option<String>, CrmError>;
    async fn create_company(&self, spec: &CrmCompanySpec) -> Result<String, CrmError>;

    async fn find_contact_by_email(&self, email: &str) -> Result<Option<String>, CrmError>;
    async fn find_contact_by_name(
        &self,
        name: &str,
        company_id: &str,
    ) -> Result<Option<String>, CrmError>;
    async fn create_contact(&self, spec: &CrmContactSpec) -> Result<String, CrmError>;
    async fn associate_contact(&self, contact_id: &str, company_id: &str)
        -> Result<(), CrmError>;

    /// Look a deal up by the custom property that carries our lead id.
    async fn find_deal_by_property(
        &self,
        property: &str,
        value: &str,
    ) -> Result<Option<String>, CrmError>;
    async fn create_deal(
        &self,
        properties: &HashMap<String, String>,
        stage: Option<&str>,
    ) -> Result<String, CrmError>;
    async fn update_deal(
        &self,
        deal_id: &str,
        properties: &HashMap<String, String>,
        stage: Option<&str>,
    ) -> Result<(), CrmError>;

    async fn add_note(&self, deal_id: &str, body: &str) -> Result<String, CrmError>;
}
