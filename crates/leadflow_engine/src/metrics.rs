//! Pipeline metrics.
//!
//! Lock-free atomic counters, owned by the engine and handed to workers
//! as an `Arc` - there is no global instance. Snapshots feed the status
//! report.

use std::sync::atomic::{AtomicU64, Ordering};

pub struct PipelineMetrics {
    // Fetch plane
    pub fetches_succeeded: AtomicU64,
    pub fetches_not_modified: AtomicU64,
    pub fetches_failed: AtomicU64,
    pub fetch_retries: AtomicU64,
    pub breaker_trips: AtomicU64,
    pub admissions_deferred: AtomicU64,

    // Extraction / classification
    pub candidates_extracted: AtomicU64,
    pub extract_errors: AtomicU64,
    pub leads_classified: AtomicU64,
    pub rejections_out_of_region: AtomicU64,
    pub rejections_low_confidence: AtomicU64,
    pub rejections_stale: AtomicU64,
    pub rejections_other: AtomicU64,

    // Store
    pub leads_inserted: AtomicU64,
    pub leads_merged: AtomicU64,
    pub duplicates_recorded: AtomicU64,
    pub store_errors: AtomicU64,

    // Export
    pub leads_exported: AtomicU64,
    pub export_failures: AtomicU64,
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineMetrics {
    pub const fn new() -> Self {
        Self {
            fetches_succeeded: AtomicU64::new(0),
            fetches_not_modified: AtomicU64::new(0),
            fetches_failed: AtomicU64::new(0),
            fetch_retries: AtomicU64::new(0),
            breaker_trips: AtomicU64::new(0),
            admissions_deferred: AtomicU64::new(0),
            candidates_extracted: AtomicU64::new(0),
            extract_errors: AtomicU64::new(0),
            leads_classified: AtomicU64::new(0),
            rejections_out_of_region: AtomicU64::new(0),
            rejections_low_confidence: AtomicU64::new(0),
            rejections_stale: AtomicU64::new(0),
            rejections_other: AtomicU64::new(0),
            leads_inserted: AtomicU64::new(0),
            leads_merged: AtomicU64::new(0),
            duplicates_recorded: AtomicU64::new(0),
            store_errors: AtomicU64::new(0),
            leads_exported: AtomicU64::new(0),
            export_failures: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn record_rejection(&self, reason: leadflow_types::RejectReason) {
        use leadflow_types::RejectReason::*;
        let counter = match reason {
            OutOfRegion => &self.rejections_out_of_region,
            LowConfidence => &self.rejections_low_confidence,
            Stale => &self.rejections_stale,
            MissingTitle => &self.rejections_other,
        };
        Self::inc(counter);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            fetches_succeeded: self.fetches_succeeded.load(Ordering::Relaxed),
            fetches_not_modified: self.fetches_not_modified.load(Ordering::Relaxed),
            fetches_failed: self.fetches_failed.load(Ordering::Relaxed),
            fetch_retries: self.fetch_retries.load(Ordering::Relaxed),
            breaker_trips: self.breaker_trips.load(Ordering::Relaxed),
            admissions_deferred: self.admissions_deferred.load(Ordering::Relaxed),
            candidates_extracted: self.candidates_extracted.load(Ordering::Relaxed),
            extract_errors: self.extract_errors.load(Ordering::Relaxed),
            leads_classified: self.leads_classified.load(Ordering::Relaxed),
            rejections_out_of_region: self.rejections_out_of_region.load(Ordering::Relaxed),
            rejections_low_confidence: self.rejections_low_confidence.load(Ordering::Relaxed),
            rejections_stale: self.rejections_stale.load(Ordering::Relaxed),
            rejections_other: self.rejections_other.load(Ordering::Relaxed),
            leads_inserted: self.leads_inserted.load(Ordering::Relaxed),
            leads_merged: self.leads_merged.load(Ordering::Relaxed),
            duplicates_recorded: self.duplicates_recorded.load(Ordering::Relaxed),
            store_errors: self.store_errors.load(Ordering::Relaxed),
            leads_exported: self.leads_exported.load(Ordering::Relaxed),
            export_failures: self.export_failures.load(Ordering::Relaxed),
        }
    }
}

/// Immutable snapshot for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub fetches_succeeded: u64,
    pub fetches_not_modified: u64,
    pub fetches_failed: u64,
    pub fetch_retries: u64,
    pub breaker_trips: u64,
    pub admissions_deferred: u64,
    pub candidates_extracted: u64,
    pub extract_errors: u64,
    pub leads_classified: u64,
    pub rejections_out_of_region: u64,
    pub rejections_low_confidence: u64,
    pub rejections_stale: u64,
    pub rejections_other: u64,
    pub leads_inserted: u64,
    pub leads_merged: u64,
    pub duplicates_recorded: u64,
    pub store_errors: u64,
    pub leads_exported: u64,
    pub export_failures: u64,
}

impl MetricsSnapshot {
    pub fn rejections_total(&self) -> u64 {
        self.rejections_out_of_region
            + self.rejections_low_confidence
            + self.rejections_stale
            + self.rejections_other
    }

    pub fn summary(&self) -> String {
        format!(
            "Fetch: {} ok, {} unchanged, {} failed | Extracted: {} | Classified: {} ({} rejected) | \
             Store: {} inserted, {} merged, {} dups | Exported: {} ({} failed)",
            self.fetches_succeeded,
            self.fetches_not_modified,
            self.fetches_failed,
            self.candidates_extracted,
            self.leads_classified,
            self.rejections_total(),
            self.leads_inserted,
            self.leads_merged,
            self.duplicates_recorded,
            self.leads_exported,
            self.export_failures,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_increments() {
        let metrics = PipelineMetrics::new();
        PipelineMetrics::inc(&metrics.leads_inserted);
        PipelineMetrics::inc(&metrics.leads_inserted);
        metrics.record_rejection(leadflow_types::RejectReason::OutOfRegion);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.leads_inserted, 2);
        assert_eq!(snapshot.rejections_out_of_region, 1);
        assert_eq!(snapshot.rejections_total(), 1);
    }

    #[test]
    fn test_summary_mentions_counts() {
        let metrics = PipelineMetrics::new();
        PipelineMetrics::inc(&metrics.leads_exported);
        assert!(metrics.snapshot().summary().contains("Exported: 1"));
    }
}
