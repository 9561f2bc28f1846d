//! Fetch error taxonomy.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Failure kind, the unit the retry policy reasons about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchErrorKind {
    Network,
    Timeout,
    Throttled,
    Auth,
    NotModified,
    Parse,
    Server,
}

impl FetchErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchErrorKind::Network => "network",
            FetchErrorKind::Timeout => "timeout",
            FetchErrorKind::Throttled => "throttled",
            FetchErrorKind::Auth => "auth",
            FetchErrorKind::NotModified => "not-modified",
            FetchErrorKind::Parse => "parse",
            FetchErrorKind::Server => "server",
        }
    }
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("throttled by origin (retry after {retry_after:?})")]
    Throttled { retry_after: Option<Duration> },
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("content not modified since last fetch")]
    NotModified,
    #[error("response did not match the declared shape: {0}")]
    Parse(String),
    #[error("origin returned HTTP {status}")]
    Server { status: u16 },
}

impl FetchError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            FetchError::Network(_) => FetchErrorKind::Network,
            FetchError::Timeout(_) => FetchErrorKind::Timeout,
            FetchError::Throttled { .. } => FetchErrorKind::Throttled,
            FetchError::Auth(_) => FetchErrorKind::Auth,
            FetchError::NotModified => FetchErrorKind::NotModified,
            FetchError::Parse(_) => FetchErrorKind::Parse,
            FetchError::Server { .. } => FetchErrorKind::Server,
        }
    }

    /// Transient classes are retried with backoff; permanent classes fail
    /// fast. `NotModified` is neither - it is a short-circuit outcome the
    /// orchestrator treats as an empty success.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Network(_) | FetchError::Timeout(_) | FetchError::Throttled { .. } => true,
            FetchError::Server { status } => *status >= 500,
            FetchError::Auth(_) | FetchError::NotModified | FetchError::Parse(_) => false,
        }
    }

    /// Origin-supplied pacing hint, when present.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            FetchError::Throttled { retry_after } => *retry_after,
            _ => None,
        }
    }
}
