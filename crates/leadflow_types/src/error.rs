//! Configuration errors. Stage-specific error types live in their crates;
//! this is only what the shared config surface needs.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("duplicate source id: {0}")]
    DuplicateSource(String),
}
