//! Extraction stage: `extract(Source, RawPayload) -> Vec<CandidateLead>`.
//!
//! Each source type has a pure extractor over the payload plus the
//! source's declarative hints: CSS selectors for HTML, dotted field paths
//! for JSON, regex patterns for document text. Extractors tolerate missing
//! non-required fields - a candidate with only a title and a URL is legal
//! and enters the pipeline.

mod document;
mod error;
mod feed;
mod html;
mod json;
pub mod normalize;

pub use error::ExtractError;

use leadflow_types::{CandidateLead, RawPayload, Source, SourceType};
use tracing::debug;

/// Dispatch on the source type. A payload often yields zero or many
/// candidates; zero is not an error.
pub fn extract(source: &Source, payload: &RawPayload) -> Result<Vec<CandidateLead>, ExtractError> {
    let mut candidates = match source.source_type {
        SourceType::Feed => feed::extract_feed(source, payload)?,
        SourceType::HtmlNews | SourceType::WebPortal => html::extract_html(source, payload)?,
        SourceType::JsonApi => json::extract_json(source, payload)?,
        SourceType::DocumentApi => document::extract_document(source, payload)?,
    };

    for candidate in &mut candidates {
        candidate.source_id = Some(source.id.clone());
    }
    candidates.retain(|c| !c.title.is_empty());
    debug!(source = %source.id, count = candidates.len(), "Extracted candidates");
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use leadflow_types::SourceId;

    fn payload_for(source: &Source, body: &str) -> RawPayload {
        RawPayload {
            source_id: source.id.clone(),
            body: body.as_bytes().to_vec(),
            content_type: None,
            status: 200,
            fetched_at: Utc::now(),
            attempt: 0,
            etag: None,
            last_modified: None,
        }
    }

    #[test]
    fn test_untitled_candidates_are_dropped() {
        let source = Source::new(
            SourceId::new("feed").unwrap(),
            "Feed",
            "https://example.com/feed.xml",
            SourceType::Feed,
        );
        let body = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Permits</title>
<item><description>no title here</description></item>
</channel></rss>"#;
        let candidates = extract(&source, &payload_for(&source, body)).unwrap();
        assert!(candidates.is_empty());
    }
}
