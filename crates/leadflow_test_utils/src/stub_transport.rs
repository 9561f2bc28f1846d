//! Deterministic transport double.

use async_trait::async_trait;
use chrono::Utc;
use leadflow_fetch::{FetchContext, FetchError, Transport};
use leadflow_types::{RawPayload, Source, SourceId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// One canned response. Errors are rebuilt per call since `FetchError`
/// is not `Clone`.
pub enum StubResponse {
    Body(String),
    NotModified,
    ServerError(u16),
    NetworkError(String),
}

impl StubResponse {
    fn to_result(&self, source: &Source, attempt: u32) -> Result<RawPayload, FetchError> {
        match self {
            StubResponse::Body(body) => Ok(RawPayload {
                source_id: source.id.clone(),
                body: body.clone().into_bytes(),
                content_type: Some("application/rss+xml".to_string()),
                status: 200,
                fetched_at: Utc::now(),
                attempt,
                etag: None,
                last_modified: None,
            }),
            StubResponse::NotModified => Err(FetchError::NotModified),
            StubResponse::ServerError(status) => Err(FetchError::Server { status: *status }),
            StubResponse::NetworkError(reason) => Err(FetchError::Network(reason.clone())),
        }
    }
}

/// Replays a configured sequence of responses per source; the final entry
/// repeats once the sequence is exhausted.
#[derive(Default)]
pub struct StubTransport {
    scripts: Mutex<HashMap<SourceId, Vec<StubResponse>>>,
    cursor: Mutex<HashMap<SourceId, usize>>,
    calls: AtomicUsize,
    /// Optional artificial latency per fetch, for in-flight-count tests
    pub delay: Option<std::time::Duration>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, source_id: SourceId, responses: Vec<StubResponse>) -> Self {
        self.scripts
            .lock()
            .expect("stub scripts lock poisoned")
            .insert(source_id, responses);
        self
    }

    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn fetch(&self, source: &Source, ctx: &FetchContext) -> Result<RawPayload, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let index = {
            let mut cursor = self.cursor.lock().expect("stub cursor lock poisoned");
            let entry = cursor.entry(source.id.clone()).or_insert(0);
            let index = *entry;
            *entry += 1;
            index
        };
        let scripts = self.scripts.lock().expect("stub scripts lock poisoned");
        let script = scripts
            .get(&source.id)
            .ok_or_else(|| FetchError::Network(format!("no stub script for {}", source.id)))?;
        let response = script
            .get(index)
            .or_else(|| script.last())
            .ok_or_else(|| FetchError::Network("empty stub script".to_string()))?;
        response.to_result(source, ctx.attempt)
    }
}
