//! Store errors.

use leadflow_types::{LeadId, LeadStatus};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("lead not found: {0}")]
    NotFound(LeadId),
    #[error("illegal status transition {from} -> {to} for lead {lead_id}")]
    Transition {
        lead_id: LeadId,
        from: LeadStatus,
        to: LeadStatus,
    },
    #[error("stored field failed to decode: {0}")]
    Decode(String),
    #[error("store writer is gone")]
    WriterGone,
}

impl StoreError {
    pub fn decode(context: impl Into<String>) -> Self {
        Self::Decode(context.into())
    }
}
