//! Pipeline construction and the in-process control surface.

use crate::metrics::PipelineMetrics;
use crate::stats::SourceStats;
use crate::status::{ExportReport, QueueDepths, RunReport, ShutdownReport, StatusReport};
use crate::workers;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use leadflow_classify::{Classifier, Rejection};
use leadflow_enrich::{Enricher, EnrichmentProviders};
use leadflow_export::{BatchOutcome, CrmClient, Exporter};
use leadflow_fetch::{fetch_with_retry, FetchContext, FetchError, FetchErrorKind, Transport};
use leadflow_governor::{Admission, HostSampler, RateGovernor, SysinfoSampler};
use leadflow_registry::{SourceRegistry, SourceRunState};
use leadflow_store::{LeadStore, StoreHandle, StoreWriter, UpsertOutcome};
use leadflow_types::{
    CandidateLead, Lead, LeadStatus, PipelineConfig, RawPayload, Source, SourceId,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Everything the core consumes from the outside world, injected at
/// construction. Tests substitute deterministic doubles for each.
pub struct PipelineDeps {
    pub transport: Arc<dyn Transport>,
    pub crm: Arc<dyn CrmClient>,
    pub providers: EnrichmentProviders,
    pub host_sampler: Box<dyn HostSampler>,
}

impl PipelineDeps {
    /// Production wiring helper: real host sampler, caller supplies the
    /// network-facing capabilities.
    pub fn with_defaults(
        transport: Arc<dyn Transport>,
        crm: Arc<dyn CrmClient>,
        providers: EnrichmentProviders,
    ) -> Self {
        Self {
            transport,
            crm,
            providers,
            host_sampler: Box::new(SysinfoSampler::new()),
        }
    }
}

/// Shared state reachable from every worker loop.
pub(crate) struct Core {
    pub(crate) config: PipelineConfig,
    pub(crate) registry: SourceRegistry,
    pub(crate) governor: Arc<RateGovernor>,
    pub(crate) classifier: Classifier,
    pub(crate) enricher: Enricher,
    pub(crate) exporter: Exporter,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) store: LeadStore,
    pub(crate) writer: StoreHandle,
    pub(crate) metrics: Arc<PipelineMetrics>,
    pub(crate) stats: SourceStats,
    pub(crate) cancel: CancellationToken,
}

/// What one fetch attempt came to.
pub(crate) enum FetchOutcome {
    Payload(RawPayload),
    Unchanged,
    Failed,
}

impl Core {
    fn fetch_context(&self, source: &Source) -> FetchContext {
        let run_state = self.registry.run_state(&source.id);
        let today = Utc::now().date_naive();
        let date_from = source
            .hints
            .lookback_days
            .map(|days| today - chrono::Duration::days(i64::from(days)));
        FetchContext {
            attempt: 0,
            etag: run_state.etag,
            last_modified: run_state.last_modified,
            date_from,
            date_to: source.hints.lookback_days.map(|_| today),
        }
    }

    /// Fetch one source with retries, recording run state, breaker and
    /// health bookkeeping on every path.
    pub(crate) async fn fetch_source(&self, source: &Source) -> FetchOutcome {
        let ctx = self.fetch_context(source);
        let now = Utc::now();
        self.registry.record_attempt(&source.id, now);

        match fetch_with_retry(
            self.transport.as_ref(),
            source,
            &ctx,
            &self.config.fetch,
            &self.cancel,
        )
        .await
        {
            Ok(payload) => {
                self.governor.breaker().record_success(&source.id);
                self.registry.record_success(
                    &source.id,
                    now,
                    payload.etag.clone(),
                    payload.last_modified.clone(),
                );
                if let Err(error) = self
                    .writer
                    .record_source_success(
                        source.id.clone(),
                        now,
                        payload.etag.clone(),
                        payload.last_modified.clone(),
                    )
                    .await
                {
                    warn!(source = %source.id, %error, "Failed to persist source success");
                }
                self.stats.record_fetch_success(&source.id);
                PipelineMetrics::inc(&self.metrics.fetches_succeeded);
                PipelineMetrics::add(&self.metrics.fetch_retries, u64::from(payload.attempt));
                FetchOutcome::Payload(payload)
            }
            Err(error) if error.kind() == FetchErrorKind::NotModified => {
                // Same content as last time; refresh last-success so the
                // source is not considered overdue.
                self.governor.breaker().record_success(&source.id);
                self.registry.record_success(&source.id, now, None, None);
                if let Err(error) = self
                    .writer
                    .record_source_success(source.id.clone(), now, None, None)
                    .await
                {
                    warn!(source = %source.id, %error, "Failed to persist source success");
                }
                self.stats.record_fetch_success(&source.id);
                PipelineMetrics::inc(&self.metrics.fetches_not_modified);
                FetchOutcome::Unchanged
            }
            Err(error) => {
                self.record_fetch_failure(source, &error).await;
                FetchOutcome::Failed
            }
        }
    }

    async fn record_fetch_failure(&self, source: &Source, error: &FetchError) {
        warn!(source = %source.id, kind = %error.kind(), %error, "Fetch failed");
        if self.governor.breaker().record_failure(&source.id) {
            PipelineMetrics::inc(&self.metrics.breaker_trips);
        }
        if let Err(db_error) = self.writer.record_source_failure(source.id.clone()).await {
            warn!(source = %source.id, error = %db_error, "Failed to persist source failure");
        }
        self.stats
            .record_fetch_failure(&source.id, &error.to_string());
        PipelineMetrics::inc(&self.metrics.fetches_failed);
    }

    pub(crate) fn extract_payload(
        &self,
        source: &Source,
        payload: &RawPayload,
    ) -> Vec<CandidateLead> {
        match leadflow_extract::extract(source, payload) {
            Ok(candidates) => {
                PipelineMetrics::add(&self.metrics.candidates_extracted, candidates.len() as u64);
                self.stats
                    .record_candidates(&source.id, candidates.len() as u64);
                candidates
            }
            Err(error) => {
                // Shape errors are logged with their truncated sample and
                // flag the source for operator review.
                warn!(source = %source.id, %error, "Extraction failed");
                PipelineMetrics::inc(&self.metrics.extract_errors);
                self.stats
                    .record_fetch_failure(&source.id, &error.to_string());
                Vec::new()
            }
        }
    }

    pub(crate) fn classify_candidate(
        &self,
        source: &Source,
        candidate: &CandidateLead,
        now: DateTime<Utc>,
    ) -> Option<Lead> {
        match self.classifier.classify(candidate, source, now) {
            Ok(lead) => {
                PipelineMetrics::inc(&self.metrics.leads_classified);
                Some(lead)
            }
            Err(Rejection { reason, detail }) => {
                debug!(source = %source.id, %reason, detail, "Candidate rejected");
                self.metrics.record_rejection(reason);
                self.stats.record_rejection(&source.id);
                None
            }
        }
    }

    pub(crate) async fn store_lead(&self, lead: Lead, now: DateTime<Utc>) -> Option<UpsertOutcome> {
        match self.writer.upsert(lead, now).await {
            Ok(outcome) => {
                match &outcome {
                    UpsertOutcome::Inserted(_) => {
                        PipelineMetrics::inc(&self.metrics.leads_inserted)
                    }
                    UpsertOutcome::Merged(_) => PipelineMetrics::inc(&self.metrics.leads_merged),
                    UpsertOutcome::Duplicate { .. } => {
                        PipelineMetrics::inc(&self.metrics.duplicates_recorded)
                    }
                }
                Some(outcome)
            }
            Err(error) => {
                warn!(%error, "Store upsert failed");
                PipelineMetrics::inc(&self.metrics.store_errors);
                None
            }
        }
    }

    /// The whole chain for one admitted source, inline. Used by
    /// `run_once`; the background loops run the same helpers behind
    /// queues instead.
    pub(crate) async fn process_source_inline(&self, source: &Source, report: &mut RunReport) {
        let payload = match self.fetch_source(source).await {
            FetchOutcome::Payload(payload) => payload,
            FetchOutcome::Unchanged => {
                report.sources_unchanged += 1;
                return;
            }
            FetchOutcome::Failed => {
                report.sources_failed += 1;
                return;
            }
        };
        report.sources_fetched += 1;

        let now = Utc::now();
        for candidate in self.extract_payload(source, &payload) {
            report.candidates += 1;
            let Some(lead) = self.classify_candidate(source, &candidate, now) else {
                report.rejections += 1;
                continue;
            };
            let lead = self.enricher.enrich(lead).await;
            match self.store_lead(lead, now).await {
                Some(UpsertOutcome::Inserted(_)) => report.leads_stored += 1,
                Some(UpsertOutcome::Merged(_)) | Some(UpsertOutcome::Duplicate { .. }) => {
                    report.leads_merged += 1
                }
                None => {}
            }
        }
    }

    /// Advance stored `new` leads that satisfy the validation gate to
    /// `enriched`, then push a batch to the CRM.
    pub(crate) async fn run_export_window(&self, now: DateTime<Utc>) -> ExportReport {
        if !self.exporter.within_window(now) {
            debug!("Export window closed, skipping");
            return ExportReport {
                skipped: true,
                ..ExportReport::default()
            };
        }

        if let Err(error) = self.qualify_new_leads(now).await {
            warn!(%error, "Lead qualification failed");
        }

        let batch = match self.store.list_exportable(self.config.export.batch_size).await {
            Ok(batch) => batch,
            Err(error) => {
                warn!(%error, "Could not list exportable leads");
                return ExportReport::default();
            }
        };
        if batch.is_empty() {
            return ExportReport {
                skipped: true,
                ..ExportReport::default()
            };
        }

        info!(batch = batch.len(), "Export window opening");
        let outcome = self.exporter.export_batch(&batch).await;
        let mut report = ExportReport::default();
        for entry in outcome.outcomes {
            match entry {
                BatchOutcome::Exported {
                    lead_id,
                    record_ids,
                } => {
                    match self.writer.mark_exported(lead_id, record_ids, now).await {
                        Ok(()) => {
                            PipelineMetrics::inc(&self.metrics.leads_exported);
                            report.exported += 1;
                        }
                        Err(error) => {
                            warn!(lead = %lead_id, %error, "Failed to record export");
                            report.failed += 1;
                        }
                    }
                }
                BatchOutcome::Failed { lead_id, error, .. } => {
                    PipelineMetrics::inc(&self.metrics.export_failures);
                    report.failed += 1;
                    if let Err(db_error) = self
                        .writer
                        .record_export_attempt(lead_id, error, now)
                        .await
                    {
                        warn!(lead = %lead_id, error = %db_error, "Failed to record export attempt");
                    }
                }
            }
        }
        report
    }

    /// Walk freshly stored leads through processing -> validated ->
    /// enriched. Leads that fail the validation gate are rejected rather
    /// than silently re-qualified forever.
    async fn qualify_new_leads(&self, now: DateTime<Utc>) -> Result<()> {
        let new_leads = self
            .store
            .list_by_status(LeadStatus::New, self.config.export.batch_size * 4)
            .await
            .context("listing new leads")?;
        for lead in new_leads {
            let valid = lead.confidence_score >= self.config.classify.confidence_threshold
                && !lead.location.is_empty();
            if !valid {
                self.writer
                    .transition(lead.lead_id, LeadStatus::Rejected, now)
                    .await
                    .context("rejecting unqualified lead")?;
                continue;
            }
            for status in [
                LeadStatus::Processing,
                LeadStatus::Validated,
                LeadStatus::Enriched,
            ] {
                self.writer
                    .transition(lead.lead_id, status, now)
                    .await
                    .context("qualifying lead")?;
            }
        }
        Ok(())
    }
}

/// Handles to the running background loops.
struct Running {
    tasks: Vec<(&'static str, JoinHandle<()>)>,
    queues: workers::QueueProbes,
}

/// The orchestrator. Owns every component's lifecycle; the CLI/API shell
/// only ever touches the operations exposed here.
pub struct Pipeline {
    core: Arc<Core>,
    running: Mutex<Option<Running>>,
    sampler: Mutex<Option<Box<dyn HostSampler>>>,
}

impl Pipeline {
    /// Validate config, open the store, seed registry state, and wire
    /// components. Configuration errors are fatal here and nowhere else.
    pub async fn new(config: PipelineConfig, deps: PipelineDeps) -> Result<Self> {
        config.validate().context("invalid pipeline configuration")?;

        let store = LeadStore::open(config.store.clone())
            .await
            .context("opening lead store")?;
        // The writer task lives for the process; it drains and exits once
        // the last handle is dropped with the pipeline itself.
        let (writer, _writer_task) = StoreWriter::spawn(store.clone());

        let registry = SourceRegistry::new(
            config.sources.clone(),
            config.governor.per_source_min_interval_minutes,
        );
        let mut seeded = HashMap::new();
        for row in store
            .load_source_states()
            .await
            .context("loading source state")?
        {
            seeded.insert(
                row.source_id.clone(),
                SourceRunState {
                    last_success_at: row.last_success_at,
                    last_attempt_at: None,
                    etag: row.etag,
                    last_modified: row.last_modified,
                },
            );
        }
        registry.seed_state(seeded);

        let governor = Arc::new(RateGovernor::new(config.governor.clone()));
        let classifier = Classifier::new(config.classify.clone());
        let enricher = Enricher::new(config.enrich.clone(), deps.providers);
        let restored = store
            .load_enrichment_cache(Utc::now())
            .await
            .context("loading enrichment cache")?;
        if !restored.is_empty() {
            info!(entries = restored.len(), "Restored enrichment cache");
            enricher.cache().restore(restored);
        }
        let exporter = Exporter::new(deps.crm, config.export.clone());

        let core = Arc::new(Core {
            registry,
            governor,
            classifier,
            enricher,
            exporter,
            transport: deps.transport,
            store,
            writer,
            metrics: Arc::new(PipelineMetrics::new()),
            stats: SourceStats::new(),
            cancel: CancellationToken::new(),
            config,
        });

        Ok(Self {
            core,
            running: Mutex::new(None),
            sampler: Mutex::new(Some(deps.host_sampler)),
        })
    }

    /// Start the background loops: tick, stage pools, export, sampler.
    /// Idempotent - a second call is a no-op.
    pub fn start(&self) {
        let mut running = self.running.lock().expect("running lock poisoned");
        if running.is_some() {
            return;
        }
        let sampler = self
            .sampler
            .lock()
            .expect("sampler lock poisoned")
            .take()
            .unwrap_or_else(|| Box::new(SysinfoSampler::new()));
        let (tasks, queues) = workers::spawn_all(Arc::clone(&self.core), sampler);
        info!(tasks = tasks.len(), "Pipeline started");
        *running = Some(Running { tasks, queues });
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().expect("running lock poisoned").is_some()
    }

    /// One synchronous pass over due (or one named) source(s).
    pub async fn run_once(&self, only: Option<SourceId>) -> Result<RunReport> {
        let now = Utc::now();
        let due: Vec<Arc<Source>> = match only {
            Some(id) => {
                let source = self
                    .core
                    .registry
                    .get(&id)
                    .with_context(|| format!("unknown source: {id}"))?;
                vec![source]
            }
            None => self
                .core
                .registry
                .list_due(now)
                .into_iter()
                .map(|due| due.source)
                .collect(),
        };

        let mut report = RunReport::default();
        for source in due {
            match self.core.governor.try_admit(&source.id) {
                Admission::Admitted(permit) => {
                    self.core.process_source_inline(&source, &mut report).await;
                    drop(permit);
                }
                Admission::Deferred(reason) => {
                    debug!(source = %source.id, %reason, "Admission deferred");
                    PipelineMetrics::inc(&self.core.metrics.admissions_deferred);
                    report.sources_deferred += 1;
                }
                Admission::Paused => {
                    report.paused = true;
                    break;
                }
            }
        }
        Ok(report)
    }

    /// Run an export window immediately, ignoring the schedule (but not
    /// the off-hours window).
    pub async fn export_now(&self) -> ExportReport {
        self.core.run_export_window(Utc::now()).await
    }

    pub fn pause(&self) {
        self.core.governor.pause();
    }

    pub fn resume(&self) {
        self.core.governor.resume();
    }

    /// Administrative: add or replace a source definition. In-flight work
    /// against the old definition drains on its own `Arc`.
    pub fn upsert_source(&self, source: Source) {
        self.core.registry.upsert(source);
    }

    /// Administrative: retire a source (flag flip plus drain; history and
    /// leads are retained).
    pub fn retire_source(&self, id: &SourceId) -> Result<()> {
        self.core.registry.retire(id)?;
        Ok(())
    }

    pub async fn status(&self) -> StatusReport {
        let queues = self
            .running
            .lock()
            .expect("running lock poisoned")
            .as_ref()
            .map(|r| r.queues.depths())
            .unwrap_or_default();
        let leads_total = self.core.store.count().await.unwrap_or(-1);
        let leads_exportable = self
            .core
            .store
            .count_by_status(LeadStatus::Enriched)
            .await
            .unwrap_or(-1);
        StatusReport {
            running: self.is_running(),
            governor: self.core.governor.status(),
            queues,
            sources: self.core.stats.all(),
            metrics: self.core.metrics.snapshot(),
            leads_total,
            leads_exportable,
        }
    }

    /// Graceful shutdown: stop accepting work, let in-flight jobs finish
    /// inside the deadline, persist the enrichment cache, drain the
    /// writer, and report what completed versus what was abandoned.
    pub async fn shutdown(&self) -> ShutdownReport {
        info!("Shutdown requested");
        self.core.cancel.cancel();

        let deadline = Instant::now() + self.core.config.engine.shutdown_deadline();
        let mut report = ShutdownReport::default();

        let running = self.running.lock().expect("running lock poisoned").take();
        if let Some(running) = running {
            for (name, task) in running.tasks {
                let remaining = deadline.saturating_duration_since(Instant::now());
                match tokio::time::timeout(remaining, task).await {
                    Ok(_) => report.tasks_completed += 1,
                    Err(_) => {
                        warn!(task = name, "Worker did not stop inside the deadline, abandoning");
                        report.tasks_abandoned += 1;
                    }
                }
            }
        }

        let snapshot = self.core.enricher.cache().snapshot();
        if let Err(error) = self
            .core
            .store
            .save_enrichment_cache(&snapshot, Utc::now())
            .await
        {
            warn!(%error, "Failed to persist enrichment cache");
        }

        // The writer applies commands in order, so a flush barrier proves
        // every lead accepted before shutdown is on disk.
        let remaining = deadline.saturating_duration_since(Instant::now());
        match tokio::time::timeout(remaining, self.core.writer.flush()).await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => warn!(%error, "Store writer flush failed"),
            Err(_) => {
                warn!("Store writer did not drain inside the deadline");
                report.tasks_abandoned += 1;
            }
        }

        report.metrics = self.core.metrics.snapshot();
        info!(
            completed = report.tasks_completed,
            abandoned = report.tasks_abandoned,
            "Shutdown complete: {}",
            report.metrics.summary()
        );
        report
    }

    /// Direct read access for shells and tests; mutations still go
    /// through the pipeline.
    pub fn store(&self) -> &LeadStore {
        &self.core.store
    }
}
