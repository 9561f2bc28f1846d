//! Single storage writer.
//!
//! Every mutation funnels through one task so the dedup search and the
//! insert it guards are linearized. Readers query the store directly;
//! only writes queue here. On shutdown the engine drops its handles and
//! the writer drains whatever is already queued before exiting, so a lead
//! that reached the writer is never lost.

use crate::error::StoreError;
use crate::store::{LeadStore, UpsertOutcome};
use chrono::{DateTime, Utc};
use leadflow_types::{Lead, LeadId, LeadStatus, SourceId};
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{error, info};

const WRITER_QUEUE_CAPACITY: usize = 128;

enum Command {
    Upsert {
        lead: Box<Lead>,
        now: DateTime<Utc>,
        reply: oneshot::Sender<Result<UpsertOutcome, StoreError>>,
    },
    Transition {
        lead_id: LeadId,
        to: LeadStatus,
        now: DateTime<Utc>,
        reply: oneshot::Sender<Result<(), StoreError>>,
    },
    SaveFields {
        lead: Box<Lead>,
        reply: oneshot::Sender<Result<(), StoreError>>,
    },
    MarkExported {
        lead_id: LeadId,
        record_ids: HashMap<String, String>,
        now: DateTime<Utc>,
        reply: oneshot::Sender<Result<(), StoreError>>,
    },
    RecordExportAttempt {
        lead_id: LeadId,
        error: String,
        now: DateTime<Utc>,
        reply: oneshot::Sender<Result<i64, StoreError>>,
    },
    SourceSuccess {
        source_id: SourceId,
        at: DateTime<Utc>,
        etag: Option<String>,
        last_modified: Option<String>,
        reply: oneshot::Sender<Result<(), StoreError>>,
    },
    SourceFailure {
        source_id: SourceId,
        reply: oneshot::Sender<Result<i64, StoreError>>,
    },
    /// Barrier: replies once every previously queued command has been
    /// applied.
    Flush {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable handle used by the pipeline workers.
#[derive(Clone)]
pub struct StoreHandle {
    tx: mpsc::Sender<Command>,
}

impl StoreHandle {
    pub async fn upsert(&self, lead: Lead, now: DateTime<Utc>) -> Result<UpsertOutcome, StoreError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Upsert {
            lead: Box::new(lead),
            now,
            reply,
        })
        .await?;
        rx.await.map_err(|_| StoreError::WriterGone)?
    }

    pub async fn transition(
        &self,
        lead_id: LeadId,
        to: LeadStatus,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Transition {
            lead_id,
            to,
            now,
            reply,
        })
        .await?;
        rx.await.map_err(|_| StoreError::WriterGone)?
    }

    pub async fn save_fields(&self, lead: Lead) -> Result<(), StoreError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::SaveFields {
            lead: Box::new(lead),
            reply,
        })
        .await?;
        rx.await.map_err(|_| StoreError::WriterGone)?
    }

    pub async fn mark_exported(
        &self,
        lead_id: LeadId,
        record_ids: HashMap<String, String>,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::MarkExported {
            lead_id,
            record_ids,
            now,
            reply,
        })
        .await?;
        rx.await.map_err(|_| StoreError::WriterGone)?
    }

    pub async fn record_export_attempt(
        &self,
        lead_id: LeadId,
        error: String,
        now: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::RecordExportAttempt {
            lead_id,
            error,
            now,
            reply,
        })
        .await?;
        rx.await.map_err(|_| StoreError::WriterGone)?
    }

    pub async fn record_source_success(
        &self,
        source_id: SourceId,
        at: DateTime<Utc>,
        etag: Option<String>,
        last_modified: Option<String>,
    ) -> Result<(), StoreError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::SourceSuccess {
            source_id,
            at,
            etag,
            last_modified,
            reply,
        })
        .await?;
        rx.await.map_err(|_| StoreError::WriterGone)?
    }

    pub async fn record_source_failure(&self, source_id: SourceId) -> Result<i64, StoreError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::SourceFailure { source_id, reply }).await?;
        rx.await.map_err(|_| StoreError::WriterGone)?
    }

    /// Wait until everything queued before this call has hit the
    /// database. Used at shutdown so no accepted lead is lost.
    pub async fn flush(&self) -> Result<(), StoreError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Flush { reply }).await?;
        rx.await.map_err(|_| StoreError::WriterGone)
    }

    async fn send(&self, command: Command) -> Result<(), StoreError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| StoreError::WriterGone)
    }
}

/// The writer task itself.
pub struct StoreWriter;

impl StoreWriter {
    /// Spawn the writer over the given store. The task exits once every
    /// handle is dropped and the queue has drained.
    pub fn spawn(store: LeadStore) -> (StoreHandle, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<Command>(WRITER_QUEUE_CAPACITY);
        let task = tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                Self::handle(&store, command).await;
            }
            info!("Store writer drained and stopped");
        });
        (StoreHandle { tx }, task)
    }

    async fn handle(store: &LeadStore, command: Command) {
        match command {
            Command::Upsert { lead, now, reply } => {
                let result = store.upsert(*lead, now).await;
                if let Err(error) = &result {
                    error!(%error, "Upsert failed");
                }
                let _ = reply.send(result);
            }
            Command::Transition {
                lead_id,
                to,
                now,
                reply,
            } => {
                let _ = reply.send(store.transition(&lead_id, to, now).await);
            }
            Command::SaveFields { lead, reply } => {
                let _ = reply.send(store.save_fields(&lead).await);
            }
            Command::MarkExported {
                lead_id,
                record_ids,
                now,
                reply,
            } => {
                let _ = reply.send(store.mark_exported(&lead_id, &record_ids, now).await);
            }
            Command::RecordExportAttempt {
                lead_id,
                error,
                now,
                reply,
            } => {
                let _ = reply.send(store.record_export_attempt(&lead_id, &error, now).await);
            }
            Command::SourceSuccess {
                source_id,
                at,
                etag,
                last_modified,
                reply,
            } => {
                let _ = reply.send(
                    store
                        .record_source_success(
                            &source_id,
                            at,
                            etag.as_deref(),
                            last_modified.as_deref(),
                        )
                        .await,
                );
            }
            Command::SourceFailure { source_id, reply } => {
                let _ = reply.send(store.record_source_failure(&source_id).await);
            }
            Command::Flush { reply } => {
                let _ = reply.send(());
            }
        }
    }
}
