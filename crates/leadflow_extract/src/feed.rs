//! RSS/Atom extraction via feed-rs.

use crate::error::ExtractError;
use crate::normalize;
use leadflow_types::{CandidateLead, RawPayload, Source};

pub(crate) fn extract_feed(
    source: &Source,
    payload: &RawPayload,
) -> Result<Vec<CandidateLead>, ExtractError> {
    let feed = feed_rs::parser::parse(payload.body.as_slice())
        .map_err(|e| ExtractError::shape(format!("feed parse failed: {e}"), &payload.body))?;

    let mut candidates = Vec::with_capacity(feed.entries.len());
    for entry in feed.entries {
        let title = entry
            .title
            .as_ref()
            .map(|t| normalize::clean_text(&t.content))
            .unwrap_or_default();

        let description = entry
            .summary
            .as_ref()
            .map(|t| strip_markup(&t.content))
            .or_else(|| {
                entry
                    .content
                    .as_ref()
                    .and_then(|c| c.body.as_deref())
                    .map(strip_markup)
            })
            .unwrap_or_default();

        let link = entry
            .links
            .first()
            .and_then(|l| normalize::resolve_url(&source.url, &l.href))
            .unwrap_or_else(|| source.url.clone());

        let published_at = entry.published.or(entry.updated);

        let mut candidate = CandidateLead {
            title,
            description,
            source_url: link,
            source_record_id: non_empty(entry.id),
            published_at,
            ..CandidateLead::default()
        };
        candidate.estimated_value = normalize::parse_money(&candidate.description)
            .filter(|_| mentions_money(&candidate.description));
        candidates.push(candidate);
    }
    Ok(candidates)
}

/// Feed summaries frequently carry inline HTML; strip tags before the
/// whitespace pass.
fn strip_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    normalize::clean_text(&out)
}

fn mentions_money(text: &str) -> bool {
    text.contains('$')
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use leadflow_types::{MoneyCents, SourceId, SourceType};

    fn source() -> Source {
        Source::new(
            SourceId::new("permits-feed").unwrap(),
            "Permits Feed",
            "https://example.com/feed.xml",
            SourceType::Feed,
        )
    }

    fn payload(body: &str) -> RawPayload {
        RawPayload {
            source_id: source().id,
            body: body.as_bytes().to_vec(),
            content_type: Some("application/rss+xml".to_string()),
            status: 200,
            fetched_at: Utc::now(),
            attempt: 0,
            etag: None,
            last_modified: None,
        }
    }

    const RSS_ONE_ITEM: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
<title>Construction News</title>
<item>
  <title>New Office Building Construction</title>
  <link>https://example.com/projects/office-tower</link>
  <guid>proj-8841</guid>
  <description>A &lt;b&gt;$5,000,000&lt;/b&gt; office project in Seattle, WA.</description>
  <pubDate>Tue, 28 Jul 2026 12:00:00 GMT</pubDate>
</item>
</channel></rss>"#;

    #[test]
    fn test_single_item_feed() {
        let candidates = extract_feed(&source(), &payload(RSS_ONE_ITEM)).unwrap();
        assert_eq!(candidates.len(), 1);
        let c = &candidates[0];
        assert_eq!(c.title, "New Office Building Construction");
        assert_eq!(c.source_url, "https://example.com/projects/office-tower");
        assert_eq!(c.source_record_id.as_deref(), Some("proj-8841"));
        assert!(c.description.contains("$5,000,000"));
        assert!(!c.description.contains("<b>"));
        assert_eq!(c.estimated_value, Some(MoneyCents::from_dollars(5_000_000)));
        assert!(c.published_at.is_some());
    }

    #[test]
    fn test_garbage_body_is_shape_error() {
        let result = extract_feed(&source(), &payload("not a feed at all"));
        assert!(matches!(result, Err(ExtractError::Shape { .. })));
    }
}
