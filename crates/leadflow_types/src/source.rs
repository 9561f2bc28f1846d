//! Source definitions and fetch-plane types.
//!
//! A Source is a closed tagged variant per transport plus a declarative
//! hint bag. Adding a new origin kind means adding a variant and a handler
//! in the fetch/extract crates - there is no runtime plugin loading.

use crate::ids::SourceId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Transport/parse family of a source.
/// This is the CANONICAL definition - use this everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceType {
    /// RSS/Atom feed, conditional GET
    Feed,
    /// Portal requiring declared form interaction before results render
    WebPortal,
    /// Plain HTML page walked with CSS selectors
    HtmlNews,
    /// Authenticated JSON API
    JsonApi,
    /// Document/text API matched with regex patterns
    DocumentApi,
}

impl SourceType {
    pub const ALL: &'static [SourceType] = &[
        SourceType::Feed,
        SourceType::WebPortal,
        SourceType::HtmlNews,
        SourceType::JsonApi,
        SourceType::DocumentApi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Feed => "feed",
            SourceType::WebPortal => "web-portal",
            SourceType::HtmlNews => "html-news",
            SourceType::JsonApi => "json-api",
            SourceType::DocumentApi => "document-api",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "feed" => Ok(SourceType::Feed),
            "web-portal" | "web_portal" => Ok(SourceType::WebPortal),
            "html-news" | "html_news" => Ok(SourceType::HtmlNews),
            "json-api" | "json_api" => Ok(SourceType::JsonApi),
            "document-api" | "document_api" => Ok(SourceType::DocumentApi),
            _ => Err(format!(
                "Invalid source type: '{}'. Expected: feed, web-portal, html-news, json-api, or document-api",
                s
            )),
        }
    }
}

/// Selector hints for HTML sources. All selectors are CSS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct HtmlHints {
    /// Selects one element per project mention
    pub item: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub link: Option<String>,
    pub date: Option<String>,
    pub location: Option<String>,
    pub value: Option<String>,
}

/// Dotted field paths for JSON sources, e.g. `results[].project.name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct JsonHints {
    /// Path to the array of records; empty means the root array
    pub items: String,
    pub title: String,
    pub description: Option<String>,
    pub link: Option<String>,
    pub record_id: Option<String>,
    pub date: Option<String>,
    pub location: Option<String>,
    pub value: Option<String>,
    pub size: Option<String>,
}

/// Regex patterns for document-text sources. Patterns use named groups
/// `title`, `location`, `value` where applicable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PatternHints {
    /// Splits the document into one chunk per mention; a chunk with no
    /// title match is skipped
    pub record_split: Option<String>,
    pub title: String,
    pub location: Option<String>,
    pub value: Option<String>,
    pub date: Option<String>,
}

/// One declared step of a portal form interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "action")]
pub enum FormStep {
    /// Load a page relative to the source URL
    Open { path: String },
    /// Type a value into the field matched by `selector`. `value` supports
    /// `{date_from}` / `{date_to}` substitution.
    Fill { selector: String, value: String },
    /// Click/submit the element matched by `selector`
    Submit { selector: String },
    /// Wait for `selector` to appear before reading the page
    AwaitSelector { selector: String },
}

/// Declarative per-source parameters. Which section applies depends on the
/// source type; the rest stay empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SourceHints {
    pub html: Option<HtmlHints>,
    pub json: Option<JsonHints>,
    pub patterns: Option<PatternHints>,
    pub form_steps: Vec<FormStep>,
    /// Extra query parameters appended to the request
    pub query: HashMap<String, String>,
    /// Extra request headers (values may name secrets via `secret:NAME`)
    pub headers: HashMap<String, String>,
    /// Days of history a portal query should request
    pub lookback_days: Option<u32>,
}

/// Fetch cadence. The config loader normalizes cron-style expressions to an
/// interval before the core sees them, so the registry only reasons about
/// minimum intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub interval_minutes: u64,
}

impl Schedule {
    pub const fn every_minutes(minutes: u64) -> Self {
        Self {
            interval_minutes: minutes,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes * 60)
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Self::every_minutes(crate::defaults::DEFAULT_SOURCE_INTERVAL_MINUTES)
    }
}

/// A named, typed handle to an external origin.
///
/// Created at config load; mutated only by administrative operations.
/// Never destroyed while in flight - retirement is an `active` flip plus
/// drain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: SourceId,
    pub name: String,
    pub url: String,
    pub source_type: SourceType,
    /// Name of a secret resolved through the injected resolver; never the
    /// secret itself
    #[serde(default)]
    pub credential: Option<String>,
    #[serde(default)]
    pub schedule: Schedule,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub hints: SourceHints,
    #[serde(default)]
    pub categories: Vec<String>,
    /// Trust weight folded into confidence scoring, in [0,1]
    #[serde(default = "default_trust_weight")]
    pub trust_weight: f64,
    /// Skip the target-region gate for this source
    #[serde(default)]
    pub region_trusted: bool,
    /// Exempt from the recency check (archival/backfill sources)
    #[serde(default)]
    pub historical: bool,
}

fn default_active() -> bool {
    true
}

fn default_trust_weight() -> f64 {
    crate::defaults::DEFAULT_SOURCE_TRUST
}

impl Source {
    pub fn new(id: SourceId, name: impl Into<String>, url: impl Into<String>, source_type: SourceType) -> Self {
        Self {
            id,
            name: name.into(),
            url: url.into(),
            source_type,
            credential: None,
            schedule: Schedule::default(),
            active: true,
            hints: SourceHints::default(),
            categories: Vec::new(),
            trust_weight: crate::defaults::DEFAULT_SOURCE_TRUST,
            region_trusted: false,
            historical: false,
        }
    }
}

/// Opaque result of one fetch for one source. Transient; never persisted
/// past the extractor.
#[derive(Debug, Clone)]
pub struct RawPayload {
    pub source_id: SourceId,
    pub body: Vec<u8>,
    pub content_type: Option<String>,
    pub status: u16,
    pub fetched_at: DateTime<Utc>,
    pub attempt: u32,
    /// Validators echoed back for the next conditional request
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

impl RawPayload {
    pub fn body_text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// A unit of work in the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchJob {
    pub source_id: SourceId,
    pub scheduled_at: DateTime<Utc>,
    pub attempt: u32,
    pub deadline: DateTime<Utc>,
}
