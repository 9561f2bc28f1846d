//! Enrichment provider doubles.

use async_trait::async_trait;
use leadflow_enrich::{Provider, ProviderError, ProviderValue};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Returns the same value for every key.
pub struct FixedProvider {
    name: &'static str,
    value: Option<ProviderValue>,
    calls: AtomicUsize,
}

impl FixedProvider {
    pub fn new(name: &'static str, value: Option<ProviderValue>) -> Self {
        Self {
            name,
            value,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
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

/// Always unavailable.
pub struct FailingProvider {
    name: &'static str,
}

impl FailingProvider {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

#[async_trait]
impl Provider for FailingProvider {
    fn name(&self) -> &str {
        self.name
    }

    async fn lookup(&self, _key: &str) -> Result<Option<ProviderValue>, ProviderError> {
        Err(ProviderError::Unavailable("stubbed outage".to_string()))
    }
}
