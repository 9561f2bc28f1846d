//! Test doubles for the pipeline's injected capabilities.
//!
//! Everything here is deterministic: the stub transport replays canned
//! payloads, the mock CRM counts creates (the idempotent-export property
//! is asserted against those counters), and the fixed providers return
//! configured values without touching the network.

mod mock_crm;
mod providers;
mod stub_transport;

pub use mock_crm::{MockCrm, MockCrmCounts};
pub use providers::{FailingProvider, FixedProvider};
pub use stub_transport::{StubResponse, StubTransport};

use chrono::{DateTime, Utc};
use leadflow_types::{Schedule, Source, SourceId, SourceType};

/// RSS body matching the commercial-project scenario: one item, Seattle,
/// $5M, published at the given instant.
pub fn rss_commercial_item(published: DateTime<Utc>) -> String {
    format!(
        r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
<title>Construction News</title>
<item>
  <title>New Office Building Construction</title>
  <link>https://news.example.com/projects/new-office</link>
  <guid>proj-001</guid>
  <description>A $5,000,000 office project in Seattle, WA.</description>
  <pubDate>{}</pubDate>
</item>
</channel></rss>"#,
        published.to_rfc2822()
    )
}

/// Same item but located outside every default target region.
pub fn rss_out_of_region_item(published: DateTime<Utc>) -> String {
    format!(
        r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
<title>Construction News</title>
<item>
  <title>New Office Building Construction</title>
  <link>https://news.example.com/projects/austin-office</link>
  <guid>proj-002</guid>
  <description>A $5,000,000 office project in Austin, TX.</description>
  <pubDate>{}</pubDate>
</item>
</channel></rss>"#,
        published.to_rfc2822()
    )
}

/// A feed source due immediately.
pub fn feed_source(id: &str) -> Source {
    let mut source = Source::new(
        SourceId::new(id).expect("valid test source id"),
        format!("Test feed {id}"),
        format!("https://news.example.com/{id}.xml"),
        SourceType::Feed,
    );
    source.schedule = Schedule::every_minutes(1);
    source
}
