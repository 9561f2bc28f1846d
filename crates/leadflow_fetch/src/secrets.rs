//! Secret-name indirection.
//!
//! Source configs reference credentials by name only. The resolver is
//! injected at orchestrator construction; the core never reads the
//! environment or files itself.

use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SecretError {
    #[error("unknown secret: {0}")]
    Unknown(String),
}

pub trait SecretResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Result<String, SecretError>;
}

/// In-memory resolver used by tests and by shells that load secrets up
/// front.
#[derive(Debug, Default, Clone)]
pub struct StaticSecrets {
    values: HashMap<String, String>,
}

impl StaticSecrets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }
}

impl SecretResolver for StaticSecrets {
    fn resolve(&self, name: &str) -> Result<String, SecretError> {
        self.values
            .get(name)
            .cloned()
            .ok_or_else(|| SecretError::Unknown(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_secrets() {
        let secrets = StaticSecrets::new().with("crm-token", "s3cret");
        assert_eq!(secrets.resolve("crm-token").unwrap(), "s3cret");
        assert!(matches!(
            secrets.resolve("missing"),
            Err(SecretError::Unknown(_))
        ));
    }
}
