//! Lead persistence: CRUD, fuzzy deduplication, status transitions, and
//! the per-source run state - all over SQLite via sqlx.
//!
//! Mutations are transactional per lead. Cross-lead operations (the dedup
//! search plus the following upsert) are linearized through a single
//! writer task so concurrent workers cannot race duplicate inserts.

mod dedup;
mod error;
mod schema;
mod store;
mod writer;

pub use dedup::token_set_ratio;
pub use error::StoreError;
pub use store::{LeadStore, NearDuplicate, SourceStateRow, UpsertOutcome};
pub use writer::{StoreHandle, StoreWriter};
