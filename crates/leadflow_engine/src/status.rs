//! Operator-facing reports.

use crate::metrics::MetricsSnapshot;
use crate::stats::SourceHealth;
use leadflow_governor::GovernorStatus;
use leadflow_types::SourceId;
use std::collections::HashMap;

/// Depths of the inter-stage queues at the moment of the report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueDepths {
    pub fetch: usize,
    pub extract: usize,
    pub classify: usize,
    pub enrich: usize,
    pub store: usize,
}

/// What `status()` returns to the shells.
#[derive(Debug)]
pub struct StatusReport {
    pub running: bool,
    pub governor: GovernorStatus,
    pub queues: QueueDepths,
    pub sources: HashMap<SourceId, SourceHealth>,
    pub metrics: MetricsSnapshot,
    pub leads_total: i64,
    pub leads_exportable: i64,
}

impl StatusReport {
    pub fn paused(&self) -> bool {
        self.governor.paused
    }
}

/// Final tally emitted on graceful shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Worker loops that wound down inside the deadline
    pub tasks_completed: usize,
    /// Worker loops abandoned at the deadline
    pub tasks_abandoned: usize,
    pub metrics: MetricsSnapshot,
}

/// Outcome of one `run_once` pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    pub sources_fetched: usize,
    pub sources_unchanged: usize,
    pub sources_failed: usize,
    pub sources_deferred: usize,
    /// Admissions were refused outright because the governor is paused
    pub paused: bool,
    pub candidates: usize,
    pub leads_stored: usize,
    pub leads_merged: usize,
    pub rejections: usize,
}

/// Outcome of one export window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportReport {
    pub exported: usize,
    pub failed: usize,
    /// The window was skipped (off-hours or nothing qualified)
    pub skipped: bool,
}
