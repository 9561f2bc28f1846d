//! Extraction errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    /// The payload did not match the declared shape for the source type.
    /// Carries a truncated sample for the operator log.
    #[error("payload did not match declared shape: {reason} (sample: {sample})")]
    Shape { reason: String, sample: String },
    /// The source's hints are unusable (bad selector, bad regex). This is
    /// a configuration problem, flagged for operator review.
    #[error("unusable extraction hints: {0}")]
    BadHints(String),
}

impl ExtractError {
    pub fn shape(reason: impl Into<String>, payload: &[u8]) -> Self {
        const SAMPLE_LIMIT: usize = 120;
        let sample: String = String::from_utf8_lossy(payload)
            .chars()
            .take(SAMPLE_LIMIT)
            .collect();
        Self::Shape {
            reason: reason.into(),
            sample,
        }
    }
}
