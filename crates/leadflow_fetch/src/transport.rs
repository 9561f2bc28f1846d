//! Transport dispatch per source type.

use crate::error::FetchError;
use crate::secrets::SecretResolver;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use leadflow_types::{FetchConfig, FormStep, RawPayload, Source, SourceType};
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED,
    RETRY_AFTER,
};
use reqwest::{Response, StatusCode};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Per-attempt context threaded from the orchestrator: conditional-request
/// validators from the last success and the portal query date range.
#[derive(Debug, Clone, Default)]
pub struct FetchContext {
    pub attempt: u32,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

/// One fetch against one source. Implementations must map every remote
/// failure to a typed [`FetchError`]; retries live a layer above.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, source: &Source, ctx: &FetchContext) -> Result<RawPayload, FetchError>;
}

/// Production transport over reqwest. One client, cookie store enabled so
/// declared portal form flows keep their session across steps.
pub struct HttpTransport {
    client: reqwest::Client,
    secrets: Arc<dyn SecretResolver>,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(config: &FetchConfig, secrets: Arc<dyn SecretResolver>) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .cookie_store(true)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(Self {
            client,
            secrets,
            timeout: config.timeout(),
        })
    }

    async fn fetch_feed(&self, source: &Source, ctx: &FetchContext) -> Result<Response, FetchError> {
        let mut request = self.client.get(&source.url);
        if let Some(etag) = &ctx.etag {
            request = request.header(IF_NONE_MATCH, etag);
        }
        if let Some(modified) = &ctx.last_modified {
            request = request.header(IF_MODIFIED_SINCE, modified);
        }
        self.send(request).await
    }

    async fn fetch_page(&self, source: &Source) -> Result<Response, FetchError> {
        let request = self
            .client
            .get(&source.url)
            .query(&source.hints.query)
            .headers(self.extra_headers(source)?);
        self.send(request).await
    }

    async fn fetch_api(&self, source: &Source) -> Result<Response, FetchError> {
        let mut request = self
            .client
            .get(&source.url)
            .query(&source.hints.query)
            .headers(self.extra_headers(source)?)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(credential) = &source.credential {
            let token = self
                .secrets
                .resolve(credential)
                .map_err(|e| FetchError::Auth(e.to_string()))?;
            request = request.bearer_auth(token);
        }
        self.send(request).await
    }

    /// Drive a declared form interaction. Steps run in order; the payload
    /// is the body of the last response. `AwaitSelector` only matters to
    /// rendering transports and is a no-op here.
    async fn fetch_portal(
        &self,
        source: &Source,
        ctx: &FetchContext,
    ) -> Result<Response, FetchError> {
        let base = Url::parse(&source.url)
            .map_err(|e| FetchError::Parse(format!("bad portal url: {e}")))?;
        let mut current_url = base.clone();
        let mut form: HashMap<String, String> = HashMap::new();
        let mut last: Option<Response> = None;

        for step in &source.hints.form_steps {
            match step {
                FormStep::Open { path } => {
                    current_url = base
                        .join(path)
                        .map_err(|e| FetchError::Parse(format!("bad portal path: {e}")))?;
                    let request = self
                        .client
                        .get(current_url.clone())
                        .headers(self.extra_headers(source)?);
                    last = Some(self.send(request).await?);
                }
                FormStep::Fill { selector, value } => {
                    form.insert(selector.clone(), substitute_dates(value, ctx));
                }
                FormStep::Submit { selector: _ } => {
                    let request = self
                        .client
                        .post(current_url.clone())
                        .headers(self.extra_headers(source)?)
                        .form(&form);
                    last = Some(self.send(request).await?);
                    form.clear();
                }
                FormStep::AwaitSelector { .. } => {}
            }
        }

        match last {
            Some(response) => Ok(response),
            // A portal without steps degrades to a plain page fetch.
            None => self.fetch_page(source).await,
        }
    }

    fn extra_headers(&self, source: &Source) -> Result<HeaderMap, FetchError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &source.hints.headers {
            let resolved = match value.strip_prefix("secret:") {
                Some(secret_name) => self
                    .secrets
                    .resolve(secret_name)
                    .map_err(|e| FetchError::Auth(e.to_string()))?,
                None => value.clone(),
            };
            let name: HeaderName = name
                .parse()
                .map_err(|_| FetchError::Parse(format!("bad header name: {name}")))?;
            let value = HeaderValue::from_str(&resolved)
                .map_err(|_| FetchError::Parse(format!("bad header value for {name}")))?;
            headers.insert(name, value);
        }
        Ok(headers)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response, FetchError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(self.timeout)
            } else {
                FetchError::Network(e.to_string())
            }
        })?;
        classify_status(&response)?;
        Ok(response)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, source: &Source, ctx: &FetchContext) -> Result<RawPayload, FetchError> {
        debug!(source = %source.id, kind = %source.source_type, attempt = ctx.attempt, "Fetching");
        let response = match source.source_type {
            SourceType::Feed => self.fetch_feed(source, ctx).await?,
            SourceType::HtmlNews => self.fetch_page(source).await?,
            SourceType::JsonApi | SourceType::DocumentApi => self.fetch_api(source).await?,
            SourceType::WebPortal => self.fetch_portal(source, ctx).await?,
        };

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let etag = header_string(response.headers(), &ETAG);
        let last_modified = header_string(response.headers(), &LAST_MODIFIED);
        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?
            .to_vec();

        Ok(RawPayload {
            source_id: source.id.clone(),
            body,
            content_type,
            status,
            fetched_at: Utc::now(),
            attempt: ctx.attempt,
            etag,
            last_modified,
        })
    }
}

fn header_string(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Map a non-success HTTP status to its error class.
fn classify_status(response: &Response) -> Result<(), FetchError> {
    let status = response.status();
    if status == StatusCode::NOT_MODIFIED {
        return Err(FetchError::NotModified);
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = header_string(response.headers(), &RETRY_AFTER)
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs);
        return Err(FetchError::Throttled { retry_after });
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(FetchError::Auth(format!("HTTP {}", status.as_u16())));
    }
    if status.is_client_error() || status.is_server_error() {
        return Err(FetchError::Server {
            status: status.as_u16(),
        });
    }
    Ok(())
}

fn substitute_dates(template: &str, ctx: &FetchContext) -> String {
    let mut out = template.to_string();
    if let Some(from) = ctx.date_from {
        out = out.replace("{date_from}", &from.format("%Y-%m-%d").to_string());
    }
    if let Some(to) = ctx.date_to {
        out = out.replace("{date_to}", &to.format("%Y-%m-%d").to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitute_dates() {
        let ctx = FetchContext {
            date_from: NaiveDate::from_ymd_opt(2026, 7, 1),
            date_to: NaiveDate::from_ymd_opt(2026, 7, 31),
            ..FetchContext::default()
        };
        assert_eq!(
            substitute_dates("{date_from}..{date_to}", &ctx),
            "2026-07-01..2026-07-31"
        );
    }
}
