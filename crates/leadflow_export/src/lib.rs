//! Export stage: push qualified leads into the CRM.
//!
//! The CRM is three object kinds plus notes, reached through an injected
//! client with typed rate-limit errors. Resolution is find-or-create at
//! every level, guarded by local per-key locks so two workers can never
//! create the same company twice. Field and stage mappings are
//! configuration, not code.

mod crm;
mod exporter;
mod keyed_lock;
mod mapping;

pub use crm::{CrmClient, CrmCompanySpec, CrmContactSpec, CrmError};
pub use exporter::{BatchOutcome, BatchReport, ExportError, Exporter};
pub use keyed_lock::KeyedLocks;
pub use mapping::{deal_properties, note_body, stage_for};
