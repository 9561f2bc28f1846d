//! Orchestrator for the lead pipeline.
//!
//! Owns component lifecycles and wires the stages through bounded
//! queues: tick -> fetch -> extract -> classify -> enrich -> store, with
//! an export loop on its own schedule and a single storage writer. One
//! cancellation token reaches every loop; shutdown drains in-flight work
//! inside a deadline and reports what finished.

mod engine;
mod metrics;
mod stats;
mod status;
mod workers;

pub use engine::{Pipeline, PipelineDeps};
pub use metrics::{MetricsSnapshot, PipelineMetrics};
pub use stats::{SourceHealth, SourceStats};
pub use status::{ExportReport, QueueDepths, RunReport, ShutdownReport, StatusReport};
