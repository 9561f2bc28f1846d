//! Background worker loops.
//!
//! Every stage is a pool of tasks draining a bounded queue into the next
//! one; a full downstream queue blocks the sender, which is the
//! backpressure. All loops watch one cancellation token and stop picking
//! up work the moment it fires; whatever they already hold runs to
//! completion.

use crate::engine::{Core, FetchOutcome};
use crate::metrics::PipelineMetrics;
use crate::status::QueueDepths;
use chrono::Utc;
use leadflow_governor::{Admission, FetchPermit, HostSampler};
use leadflow_types::{CandidateLead, FetchJob, Lead, RawPayload, Source};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// An admitted fetch. The permit rides along and frees the governor slot
/// when the fetch (not the whole pipeline) is done.
struct AdmittedJob {
    job: FetchJob,
    source: Arc<Source>,
    permit: FetchPermit,
}

struct ExtractItem {
    source: Arc<Source>,
    payload: RawPayload,
}

struct ClassifyItem {
    source: Arc<Source>,
    candidate: CandidateLead,
}

/// Senders retained for depth probing in status reports.
pub(crate) struct QueueProbes {
    fetch: mpsc::Sender<AdmittedJob>,
    extract: mpsc::Sender<ExtractItem>,
    classify: mpsc::Sender<ClassifyItem>,
    enrich: mpsc::Sender<Lead>,
    store: mpsc::Sender<Lead>,
}

impl QueueProbes {
    pub(crate) fn depths(&self) -> QueueDepths {
        fn depth<T>(tx: &mpsc::Sender<T>) -> usize {
            tx.max_capacity() - tx.capacity()
        }
        QueueDepths {
            fetch: depth(&self.fetch),
            extract: depth(&self.extract),
            classify: depth(&self.classify),
            enrich: depth(&self.enrich),
            store: depth(&self.store),
        }
    }
}

type Named = (&'static str, JoinHandle<()>);

/// Wire the queues and spawn every loop.
pub(crate) fn spawn_all(
    core: Arc<Core>,
    sampler: Box<dyn HostSampler>,
) -> (Vec<Named>, QueueProbes) {
    let cap = core.config.engine.queue_capacity;
    let (fetch_tx, fetch_rx) = mpsc::channel::<AdmittedJob>(cap);
    let (extract_tx, extract_rx) = mpsc::channel::<ExtractItem>(cap);
    let (classify_tx, classify_rx) = mpsc::channel::<ClassifyItem>(cap);
    let (enrich_tx, enrich_rx) = mpsc::channel::<Lead>(cap);
    let (store_tx, store_rx) = mpsc::channel::<Lead>(cap);

    let probes = QueueProbes {
        fetch: fetch_tx.clone(),
        extract: extract_tx.clone(),
        classify: classify_tx.clone(),
        enrich: enrich_tx.clone(),
        store: store_tx.clone(),
    };

    let mut tasks: Vec<Named> = Vec::new();

    tasks.push((
        "tick",
        tokio::spawn(tick_loop(Arc::clone(&core), fetch_tx)),
    ));

    let fetch_rx = shared(fetch_rx);
    for _ in 0..core.config.governor.max_concurrent_sources {
        tasks.push((
            "fetch",
            tokio::spawn(fetch_worker(
                Arc::clone(&core),
                Arc::clone(&fetch_rx),
                extract_tx.clone(),
            )),
        ));
    }

    let extract_rx = shared(extract_rx);
    let classify_rx = shared(classify_rx);
    let enrich_rx = shared(enrich_rx);
    for _ in 0..core.config.governor.max_workers {
        tasks.push((
            "extract",
            tokio::spawn(extract_worker(
                Arc::clone(&core),
                Arc::clone(&extract_rx),
                classify_tx.clone(),
            )),
        ));
        tasks.push((
            "classify",
            tokio::spawn(classify_worker(
                Arc::clone(&core),
                Arc::clone(&classify_rx),
                enrich_tx.clone(),
            )),
        ));
        tasks.push((
            "enrich",
            tokio::spawn(enrich_worker(
                Arc::clone(&core),
                Arc::clone(&enrich_rx),
                store_tx.clone(),
            )),
        ));
    }

    tasks.push(("store", tokio::spawn(store_loop(Arc::clone(&core), store_rx))));
    tasks.push(("export", tokio::spawn(export_loop(Arc::clone(&core)))));

    let governor = Arc::clone(&core.governor);
    let cancel = core.cancel.clone();
    tasks.push((
        "sampler",
        tokio::spawn(async move { governor.run_sampler(sampler, cancel).await }),
    ));

    (tasks, probes)
}

type SharedRx<T> = Arc<tokio::sync::Mutex<mpsc::Receiver<T>>>;

fn shared<T>(rx: mpsc::Receiver<T>) -> SharedRx<T> {
    Arc::new(tokio::sync::Mutex::new(rx))
}

/// Receive one item, or `None` on cancellation/closed queue. Workers in
/// the same pool take turns holding the receiver lock; that is exactly
/// the queue-empty suspension point.
async fn next_item<T>(rx: &SharedRx<T>, core: &Core) -> Option<T> {
    let mut rx = rx.lock().await;
    tokio::select! {
        _ = core.cancel.cancelled() => None,
        item = rx.recv() => item,
    }
}

async fn send_item<T>(tx: &mpsc::Sender<T>, item: T, core: &Core) -> bool {
    tokio::select! {
        _ = core.cancel.cancelled() => false,
        sent = tx.send(item) => sent.is_ok(),
    }
}

/// Periodically ask the registry for due sources and push admitted ones
/// into the fetch queue.
async fn tick_loop(core: Arc<Core>, fetch_tx: mpsc::Sender<AdmittedJob>) {
    let period = std::time::Duration::from_secs(
        core.config.engine.sources_check_interval_secs.max(1),
    );
    let mut interval = tokio::time::interval(period);
    loop {
        tokio::select! {
            _ = core.cancel.cancelled() => break,
            _ = interval.tick() => {}
        }

        let now = Utc::now();
        let due = core.registry.list_due(now);
        debug!(due = due.len(), "Tick");
        for entry in due {
            match core.governor.try_admit(&entry.source.id) {
                Admission::Admitted(permit) => {
                    let job = AdmittedJob {
                        job: FetchJob {
                            source_id: entry.source.id.clone(),
                            scheduled_at: now,
                            attempt: 0,
                            deadline: now + fetch_budget(&core),
                        },
                        source: entry.source,
                        permit,
                    };
                    if !send_item(&fetch_tx, job, &core).await {
                        return;
                    }
                }
                Admission::Deferred(reason) => {
                    debug!(source = %entry.source.id, %reason, "Deferred at tick");
                    PipelineMetrics::inc(&core.metrics.admissions_deferred);
                }
                Admission::Paused => {
                    debug!("Governor paused, skipping the rest of the tick");
                    break;
                }
            }
        }
    }
    info!("Tick loop stopped");
}

/// Worst-case time one fetch job may spend queued plus retrying.
fn fetch_budget(core: &Core) -> chrono::Duration {
    let fetch = &core.config.fetch;
    let worst = fetch.timeout_secs * u64::from(fetch.max_attempts.max(1))
        + fetch.backoff_max_secs * u64::from(fetch.max_attempts.max(1));
    chrono::Duration::seconds(worst as i64)
}

async fn fetch_worker(
    core: Arc<Core>,
    rx: SharedRx<AdmittedJob>,
    extract_tx: mpsc::Sender<ExtractItem>,
) {
    while let Some(admitted) = next_item(&rx, &core).await {
        // A job that sat queued past its deadline goes back through the
        // scheduler instead of fetching stale.
        if Utc::now() > admitted.job.deadline {
            debug!(source = %admitted.job.source_id, "Fetch job expired in queue, dropping");
            drop(admitted.permit);
            continue;
        }
        let outcome = core.fetch_source(&admitted.source).await;
        drop(admitted.permit);
        if let FetchOutcome::Payload(payload) = outcome {
            let item = ExtractItem {
                source: admitted.source,
                payload,
            };
            if !send_item(&extract_tx, item, &core).await {
                break;
            }
        }
    }
}

async fn extract_worker(
    core: Arc<Core>,
    rx: SharedRx<ExtractItem>,
    classify_tx: mpsc::Sender<ClassifyItem>,
) {
    while let Some(item) = next_item(&rx, &core).await {
        let _slot = core.governor.acquire_worker_slot().await;
        for candidate in core.extract_payload(&item.source, &item.payload) {
            let next = ClassifyItem {
                source: Arc::clone(&item.source),
                candidate,
            };
            if !send_item(&classify_tx, next, &core).await {
                return;
            }
        }
    }
}

async fn classify_worker(
    core: Arc<Core>,
    rx: SharedRx<ClassifyItem>,
    enrich_tx: mpsc::Sender<Lead>,
) {
    while let Some(item) = next_item(&rx, &core).await {
        let _slot = core.governor.acquire_worker_slot().await;
        let now = Utc::now();
        if let Some(lead) = core.classify_candidate(&item.source, &item.candidate, now) {
            if !send_item(&enrich_tx, lead, &core).await {
                break;
            }
        }
    }
}

async fn enrich_worker(core: Arc<Core>, rx: SharedRx<Lead>, store_tx: mpsc::Sender<Lead>) {
    while let Some(lead) = next_item(&rx, &core).await {
        let _slot = core.governor.acquire_worker_slot().await;
        let enriched = core.enricher.enrich(lead).await;
        if !send_item(&store_tx, enriched, &core).await {
            break;
        }
    }
}

/// Single consumer feeding the single writer; keeps dedup linearized.
async fn store_loop(core: Arc<Core>, mut rx: mpsc::Receiver<Lead>) {
    loop {
        let lead = tokio::select! {
            _ = core.cancel.cancelled() => break,
            lead = rx.recv() => match lead {
                Some(lead) => lead,
                None => break,
            },
        };
        core.store_lead(lead, Utc::now()).await;
    }
    info!("Store loop stopped");
}

async fn export_loop(core: Arc<Core>) {
    let period = std::time::Duration::from_secs(
        core.config.export.interval_minutes.max(1) * 60,
    );
    let mut interval = tokio::time::interval(period);
    // The first tick fires immediately; skip it so startup does not race
    // the first fetches.
    interval.tick().await;
    loop {
        tokio::select! {
            _ = core.cancel.cancelled() => break,
            _ = interval.tick() => {}
        }
        let report = core.run_export_window(Utc::now()).await;
        if !report.skipped {
            info!(
                exported = report.exported,
                failed = report.failed,
                "Export window done"
            );
        }
    }
    info!("Export loop stopped");
}
