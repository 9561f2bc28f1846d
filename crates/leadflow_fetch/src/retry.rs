//! Retry wrapper around a transport.

use crate::error::FetchError;
use crate::transport::{FetchContext, Transport};
use leadflow_types::{FetchConfig, RawPayload, Source};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Fetch with exponential backoff on transient failures.
///
/// Permanent failures and `NotModified` return immediately. The origin's
/// `Retry-After` overrides the computed backoff when it is longer.
/// Cancellation is observed before every attempt and during backoff; a
/// cancelled fetch reports as a timeout so the job accounting stays
/// uniform.
pub async fn fetch_with_retry(
    transport: &dyn Transport,
    source: &Source,
    ctx: &FetchContext,
    config: &FetchConfig,
    cancel: &CancellationToken,
) -> Result<RawPayload, FetchError> {
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        if cancel.is_cancelled() {
            return Err(FetchError::Timeout(config.timeout()));
        }

        let attempt_ctx = FetchContext {
            attempt,
            ..ctx.clone()
        };
        let error = match transport.fetch(source, &attempt_ctx).await {
            Ok(payload) => return Ok(payload),
            Err(e) => e,
        };

        if !error.is_transient() {
            return Err(error);
        }

        attempt += 1;
        if attempt >= max_attempts {
            warn!(
                source = %source.id,
                attempts = attempt,
                error = %error,
                "Fetch retries exhausted"
            );
            return Err(error);
        }

        let mut backoff = config.backoff_for_attempt(attempt - 1);
        if let Some(retry_after) = error.retry_after() {
            backoff = backoff.max(retry_after);
        }
        debug!(
            source = %source.id,
            attempt,
            backoff_ms = backoff.as_millis() as u64,
            error = %error,
            "Transient fetch failure, backing off"
        );

        tokio::select! {
            _ = tokio::time::sleep(backoff) => {}
            _ = cancel.cancelled() => {
                return Err(FetchError::Timeout(config.timeout()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use leadflow_types::{SourceId, SourceType};
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyTransport {
        failures_before_success: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl Transport for FlakyTransport {
        async fn fetch(
            &self,
            source: &Source,
            ctx: &FetchContext,
        ) -> Result<RawPayload, FetchError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures_before_success {
                return Err(FetchError::Server { status: 503 });
            }
            Ok(RawPayload {
                source_id: source.id.clone(),
                body: b"ok".to_vec(),
                content_type: None,
                status: 200,
                fetched_at: chrono::Utc::now(),
                attempt: ctx.attempt,
                etag: None,
                last_modified: None,
            })
        }
    }

    fn source() -> Source {
        Source::new(
            SourceId::new("retry-test").unwrap(),
            "Retry Test",
            "https://example.com/feed",
            SourceType::Feed,
        )
    }

    fn fast_config(max_attempts: u32) -> FetchConfig {
        FetchConfig {
            max_attempts,
            backoff_base_secs: 0,
            ..FetchConfig::default()
        }
    }

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let transport = FlakyTransport {
            failures_before_success: 2,
            calls: AtomicU32::new(0),
        };
        let payload = fetch_with_retry(
            &transport,
            &source(),
            &FetchContext::default(),
            &fast_config(5),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(payload.status, 200);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_bounded_attempts() {
        let transport = FlakyTransport {
            failures_before_success: u32::MAX,
            calls: AtomicU32::new(0),
        };
        let result = fetch_with_retry(
            &transport,
            &source(),
            &FetchContext::default(),
            &fast_config(3),
            &CancellationToken::new(),
        )
        .await;
        assert!(matches!(result, Err(FetchError::Server { status: 503 })));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
    }

    struct PermanentTransport;

    #[async_trait]
    impl Transport for PermanentTransport {
        async fn fetch(&self, _: &Source, _: &FetchContext) -> Result<RawPayload, FetchError> {
            Err(FetchError::Auth("denied".into()))
        }
    }

    #[tokio::test]
    async fn test_permanent_fails_fast() {
        let result = fetch_with_retry(
            &PermanentTransport,
            &source(),
            &FetchContext::default(),
            &fast_config(5),
            &CancellationToken::new(),
        )
        .await;
        assert!(matches!(result, Err(FetchError::Auth(_))));
    }

    #[tokio::test]
    async fn test_cancelled_before_attempt() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let transport = FlakyTransport {
            failures_before_success: 0,
            calls: AtomicU32::new(0),
        };
        let result = fetch_with_retry(
            &transport,
            &source(),
            &FetchContext::default(),
            &fast_config(3),
            &cancel,
        )
        .await;
        assert!(result.is_err());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }
}
