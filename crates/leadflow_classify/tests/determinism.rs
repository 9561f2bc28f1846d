//! Classification must be a pure function of its inputs.

use chrono::{TimeZone, Utc};
use leadflow_classify::{tables, Classifier};
use leadflow_types::{CandidateLead, Source, SourceId, SourceType};
use proptest::prelude::*;

fn classifier() -> Classifier {
    let mut config = tables::default_classify_config();
    config.target_regions = tables::default_target_regions();
    Classifier::new(config)
}

fn source() -> Source {
    Source::new(
        SourceId::new("prop-feed").unwrap(),
        "Prop Feed",
        "https://example.com/feed.xml",
        SourceType::Feed,
    )
}

proptest! {
    #[test]
    fn same_input_same_outcome(
        title in ".{0,60}",
        description in ".{0,200}",
        has_location in any::<bool>(),
    ) {
        let candidate = CandidateLead {
            title,
            description,
            source_url: "https://example.com/x".to_string(),
            location_text: has_location.then(|| "Seattle, WA".to_string()),
            published_at: Some(Utc.with_ymd_and_hms(2026, 7, 30, 0, 0, 0).unwrap()),
            ..CandidateLead::default()
        };
        let classifier = classifier();
        let source = source();
        let now = Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap();

        let first = classifier.classify(&candidate, &source, now);
        let second = classifier.classify(&candidate, &source, now);

        match (first, second) {
            (Ok(a), Ok(b)) => {
                prop_assert_eq!(a.market_sector, b.market_sector);
                prop_assert_eq!(a.project_stage, b.project_stage);
                prop_assert_eq!(a.confidence_score, b.confidence_score);
                prop_assert_eq!(a.location, b.location);
            }
            (Err(a), Err(b)) => {
                prop_assert_eq!(a.reason, b.reason);
            }
            (a, b) => {
                prop_assert!(false, "diverged: {:?} vs {:?}", a.is_ok(), b.is_ok());
            }
        }
    }
}
