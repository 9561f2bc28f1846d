//! Classification stage: `classify(CandidateLead) -> Lead | Rejection`.
//!
//! Deterministic by construction - the outcome is a pure function of the
//! candidate text, the source flags, and the loaded keyword tables. No
//! model weights, no randomness, no clock reads (the evaluation instant
//! is an argument).

mod classifier;
mod entities;
mod sector;
mod stage;
pub mod tables;

pub use classifier::{Classifier, Rejection};
pub use entities::{tag_entities, Entities};
pub use sector::classify_sector;
pub use stage::identify_stage;
