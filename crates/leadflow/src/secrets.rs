//! Environment-backed secret resolution.
//!
//! The shell is the only layer allowed to touch the environment; the
//! core sees secret names only. `credential = "portal-token"` resolves
//! from `LEADFLOW_SECRET_PORTAL_TOKEN`.

use leadflow_fetch::{SecretError, SecretResolver};

const ENV_PREFIX: &str = "LEADFLOW_SECRET_";

#[derive(Debug, Default)]
pub struct EnvSecrets;

impl EnvSecrets {
    pub fn new() -> Self {
        Self
    }

    fn env_name(secret: &str) -> String {
        let upper: String = secret
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("{ENV_PREFIX}{upper}")
    }
}

impl SecretResolver for EnvSecrets {
    fn resolve(&self, name: &str) -> Result<String, SecretError> {
        std::env::var(Self::env_name(name)).map_err(|_| SecretError::Unknown(name.to_string()))
    }
}
