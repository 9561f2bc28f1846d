//! HTTP transport behavior against a local mock origin.

use leadflow_fetch::{
    fetch_with_retry, FetchContext, FetchError, HttpTransport, StaticSecrets, Transport,
};
use leadflow_types::{FetchConfig, Source, SourceId, SourceType};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn feed_source(url: &str) -> Source {
    Source::new(
        SourceId::new("mock-feed").unwrap(),
        "Mock Feed",
        format!("{url}/feed.xml"),
        SourceType::Feed,
    )
}

fn transport() -> HttpTransport {
    HttpTransport::new(&FetchConfig::default(), Arc::new(StaticSecrets::new())).unwrap()
}

#[tokio::test]
async fn fetch_feed_captures_validators() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("etag", "\"v1\"")
                .insert_header("content-type", "application/rss+xml")
                .set_body_string("<rss/>"),
        )
        .mount(&server)
        .await;

    let payload = transport()
        .fetch(&feed_source(&server.uri()), &FetchContext::default())
        .await
        .unwrap();

    assert_eq!(payload.status, 200);
    assert_eq!(payload.etag.as_deref(), Some("\"v1\""));
    assert_eq!(
        payload.content_type.as_deref(),
        Some("application/rss+xml")
    );
    assert_eq!(payload.body, b"<rss/>");
}

#[tokio::test]
async fn conditional_fetch_reports_not_modified() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .and(header("if-none-match", "\"v1\""))
        .respond_with(ResponseTemplate::new(304))
        .mount(&server)
        .await;

    let ctx = FetchContext {
        etag: Some("\"v1\"".to_string()),
        ..FetchContext::default()
    };
    let result = transport().fetch(&feed_source(&server.uri()), &ctx).await;
    assert!(matches!(result, Err(FetchError::NotModified)));
}

#[tokio::test]
async fn throttle_carries_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
        .mount(&server)
        .await;

    let result = transport()
        .fetch(&feed_source(&server.uri()), &FetchContext::default())
        .await;
    match result {
        Err(FetchError::Throttled { retry_after }) => {
            assert_eq!(retry_after, Some(std::time::Duration::from_secs(7)));
        }
        other => panic!("expected throttled, got {other:?}"),
    }
}

#[tokio::test]
async fn retry_recovers_from_transient_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<rss/>"))
        .mount(&server)
        .await;

    let config = FetchConfig {
        backoff_base_secs: 0,
        max_attempts: 5,
        ..FetchConfig::default()
    };
    let payload = fetch_with_retry(
        &transport(),
        &feed_source(&server.uri()),
        &FetchContext::default(),
        &config,
        &CancellationToken::new(),
    )
    .await
    .unwrap();
    assert_eq!(payload.status, 200);
}

#[tokio::test]
async fn json_api_sends_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/projects"))
        .and(header("authorization", "Bearer s3cret"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .mount(&server)
        .await;

    let mut source = Source::new(
        SourceId::new("mock-api").unwrap(),
        "Mock API",
        format!("{}/api/projects", server.uri()),
        SourceType::JsonApi,
    );
    source.credential = Some("portal-token".to_string());

    let transport = HttpTransport::new(
        &FetchConfig::default(),
        Arc::new(StaticSecrets::new().with("portal-token", "s3cret")),
    )
    .unwrap();

    let payload = transport
        .fetch(&source, &FetchContext::default())
        .await
        .unwrap();
    assert_eq!(payload.status, 200);
}

#[tokio::test]
async fn missing_secret_is_auth_error_not_panic() {
    let server = MockServer::start().await;
    let mut source = Source::new(
        SourceId::new("mock-api").unwrap(),
        "Mock API",
        format!("{}/api/projects", server.uri()),
        SourceType::JsonApi,
    );
    source.credential = Some("unknown-secret".to_string());

    let result = transport().fetch(&source, &FetchContext::default()).await;
    assert!(matches!(result, Err(FetchError::Auth(_))));
}
