//! Source registry: the configured set of external origins and the
//! "what is due now" computation.
//!
//! Reads vastly outnumber writes, so the live source set is an immutable
//! snapshot behind an `Arc`; administrative updates build a new snapshot
//! and swap it in. Per-source run state (last success, last attempt) is
//! mutable and lock-guarded separately so the hot read path never blocks
//! on it.

mod registry;

pub use registry::{DueSource, RegistryError, SourceRegistry, SourceRunState};
