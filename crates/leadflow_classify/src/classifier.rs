//! The classification/validation pass.

use crate::entities::{tag_entities, Entities};
use crate::sector::classify_sector;
use crate::stage::identify_stage;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use leadflow_extract::normalize;
use leadflow_types::{
    CandidateLead, ClassifyConfig, Company, Lead, LeadId, LeadStatus, Location, Priority,
    RejectReason, Source, TargetRegion,
};
use std::collections::HashMap;
use tracing::debug;

// Confidence weights. Field presence carries 0.40, sector strength 0.25,
// stage 0.15, source trust 0.20; the sum is bounded by 1.0.
const WEIGHT_TITLE: f64 = 0.15;
const WEIGHT_DESCRIPTION: f64 = 0.10;
const WEIGHT_LOCATION: f64 = 0.10;
const WEIGHT_URL: f64 = 0.05;
const WEIGHT_SECTOR: f64 = 0.25;
const WEIGHT_STAGE: f64 = 0.15;
const WEIGHT_TRUST: f64 = 0.20;
/// Sector score at which the sector component saturates.
const SECTOR_SCORE_CAP: f64 = 3.0;

/// A refused candidate. Not an error - counted per source and dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub reason: RejectReason,
    pub detail: String,
}

impl Rejection {
    fn new(reason: RejectReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
        }
    }
}

pub struct Classifier {
    config: ClassifyConfig,
}

impl Classifier {
    pub fn new(config: ClassifyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifyConfig {
        &self.config
    }

    /// Classify one candidate. Pure given (candidate, source flags, now)
    /// and the loaded tables.
    pub fn classify(
        &self,
        candidate: &CandidateLead,
        source: &Source,
        now: DateTime<Utc>,
    ) -> Result<Lead, Rejection> {
        if candidate.title.trim().is_empty() {
            return Err(Rejection::new(RejectReason::MissingTitle, "empty title"));
        }

        let text = format!("{} {}", candidate.title, candidate.description);
        let entities = tag_entities(&text, &self.config);
        let location = self.resolve_location(candidate, &entities);

        self.validate_region(&location, source)?;

        let sector = classify_sector(&text, &self.config);
        let stage = identify_stage(&text, &self.config);

        let confidence = self.score_confidence(candidate, &location, sector.score, stage.matched, source);
        if confidence < self.config.confidence_threshold {
            return Err(Rejection::new(
                RejectReason::LowConfidence,
                format!(
                    "confidence {confidence:.2} below threshold {:.2}",
                    self.config.confidence_threshold
                ),
            ));
        }

        if let Some(published) = candidate.published_at {
            let max_age = ChronoDuration::days(self.config.max_age_days);
            if now - published > max_age && !source.historical {
                return Err(Rejection::new(
                    RejectReason::Stale,
                    format!("published {published}, older than {} days", self.config.max_age_days),
                ));
            }
        }

        let company = entities.organizations.first().map(|name| Company {
            name: name.clone(),
            ..Company::default()
        });

        debug!(
            source = %source.id,
            sector = %sector.sector,
            stage = %stage.stage,
            confidence,
            "Candidate classified"
        );

        Ok(Lead {
            lead_id: LeadId::new(),
            source_id: source.id.clone(),
            source_url: candidate.source_url.clone(),
            source_record_id: candidate.source_record_id.clone(),
            title: candidate.title.clone(),
            description: candidate.description.clone(),
            market_sector: sector.sector,
            location,
            project_stage: stage.stage,
            estimated_value: candidate.estimated_value,
            estimated_size: candidate.estimated_size,
            published_at: candidate.published_at,
            confidence_score: confidence,
            quality_score: 0,
            priority: Priority::Medium,
            win_probability: 0.0,
            company,
            contacts: Vec::new(),
            status: LeadStatus::New,
            notes: String::new(),
            first_seen_at: now,
            last_updated_at: now,
            export_record_ids: HashMap::new(),
        })
    }

    fn resolve_location(&self, candidate: &CandidateLead, entities: &Entities) -> Location {
        let text = candidate
            .location_text
            .clone()
            .or_else(|| entities.locations.first().cloned());
        let Some(text) = text else {
            return Location::default();
        };
        let (city, state) = normalize::split_location(&text);
        Location {
            city,
            state,
            ..Location::default()
        }
    }

    /// Target-region gate. Region-trusted sources skip it; an empty
    /// region table means the firm has not restricted territory.
    fn validate_region(&self, location: &Location, source: &Source) -> Result<(), Rejection> {
        if source.region_trusted || self.config.target_regions.is_empty() {
            return Ok(());
        }
        if location.is_empty() {
            return Err(Rejection::new(
                RejectReason::OutOfRegion,
                "no location extracted",
            ));
        }
        let matched = self
            .config
            .target_regions
            .iter()
            .any(|region| region_matches(region, location));
        if matched {
            Ok(())
        } else {
            Err(Rejection::new(
                RejectReason::OutOfRegion,
                format!("'{location}' is outside the target regions"),
            ))
        }
    }

    fn score_confidence(
        &self,
        candidate: &CandidateLead,
        location: &Location,
        sector_score: f64,
        stage_matched: bool,
        source: &Source,
    ) -> f64 {
        let mut confidence = 0.0;
        if !candidate.title.trim().is_empty() {
            confidence += WEIGHT_TITLE;
        }
        if !candidate.description.trim().is_empty() {
            confidence += WEIGHT_DESCRIPTION;
        }
        if !location.is_empty() {
            confidence += WEIGHT_LOCATION;
        }
        if !candidate.source_url.is_empty() {
            confidence += WEIGHT_URL;
        }
        confidence += (sector_score.min(SECTOR_SCORE_CAP) / SECTOR_SCORE_CAP) * WEIGHT_SECTOR;
        if stage_matched {
            confidence += WEIGHT_STAGE;
        }
        confidence += source.trust_weight.clamp(0.0, 1.0) * WEIGHT_TRUST;
        confidence.min(1.0)
    }
}

fn region_matches(region: &TargetRegion, location: &Location) -> bool {
    if let (Some(want), Some(have)) = (&region.city, &location.city) {
        if want.eq_ignore_ascii_case(have) {
            return true;
        }
    }
    if let (Some(want), Some(have)) = (&region.state, &location.state) {
        if want.eq_ignore_ascii_case(have) {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables;
    use leadflow_types::{SourceId, SourceType};

    fn classifier() -> Classifier {
        let mut config = tables::default_classify_config();
        config.target_regions = tables::default_target_regions();
        Classifier::new(config)
    }

    fn source() -> Source {
        Source::new(
            SourceId::new("feed").unwrap(),
            "Feed",
            "https://example.com/feed.xml",
            SourceType::Feed,
        )
    }

    fn office_candidate() -> CandidateLead {
        CandidateLead {
            title: "New Office Building Construction".to_string(),
            description: "A $5,000,000 office project in Seattle, WA.".to_string(),
            source_url: "https://example.com/projects/office".to_string(),
            published_at: Some(Utc::now() - ChronoDuration::days(2)),
            ..CandidateLead::default()
        }
    }

    #[test]
    fn test_commercial_seattle_lead_passes() {
        let lead = classifier()
            .classify(&office_candidate(), &source(), Utc::now())
            .unwrap();
        assert_eq!(lead.market_sector, leadflow_types::MarketSector::Commercial);
        assert_eq!(lead.project_stage, leadflow_types::ProjectStage::Planning);
        assert_eq!(lead.location.city.as_deref(), Some("Seattle"));
        assert!(lead.confidence_score >= 0.7);
        assert_eq!(lead.status, LeadStatus::New);
    }

    #[test]
    fn test_out_of_region_rejected() {
        let mut candidate = office_candidate();
        candidate.description = "A $5,000,000 office project in Austin, TX.".to_string();
        let rejection = classifier()
            .classify(&candidate, &source(), Utc::now())
            .unwrap_err();
        assert_eq!(rejection.reason, RejectReason::OutOfRegion);
    }

    #[test]
    fn test_region_trusted_source_skips_gate() {
        let mut candidate = office_candidate();
        candidate.description = "A $5,000,000 office project in Austin, TX.".to_string();
        let mut trusted = source();
        trusted.region_trusted = true;
        assert!(classifier()
            .classify(&candidate, &trusted, Utc::now())
            .is_ok());
    }

    #[test]
    fn test_stale_rejected_unless_historical() {
        let mut candidate = office_candidate();
        candidate.published_at = Some(Utc::now() - ChronoDuration::days(30));
        let rejection = classifier()
            .classify(&candidate, &source(), Utc::now())
            .unwrap_err();
        assert_eq!(rejection.reason, RejectReason::Stale);

        let mut historical = source();
        historical.historical = true;
        assert!(classifier()
            .classify(&candidate, &historical, Utc::now())
            .is_ok());
    }

    #[test]
    fn test_low_confidence_rejected() {
        let candidate = CandidateLead {
            title: "Brief note".to_string(),
            source_url: "https://example.com/x".to_string(),
            location_text: Some("Seattle, WA".to_string()),
            ..CandidateLead::default()
        };
        let mut weak_source = source();
        weak_source.trust_weight = 0.1;
        let rejection = classifier()
            .classify(&candidate, &weak_source, Utc::now())
            .unwrap_err();
        assert_eq!(rejection.reason, RejectReason::LowConfidence);
    }

    #[test]
    fn test_company_seeded_from_entities() {
        let mut candidate = office_candidate();
        candidate.description =
            "Sound Builders will deliver a $5,000,000 office project in Seattle, WA.".to_string();
        let lead = classifier()
            .classify(&candidate, &source(), Utc::now())
            .unwrap();
        assert_eq!(lead.company.unwrap().name, "Sound Builders");
    }

    #[test]
    fn test_classification_is_deterministic() {
        let classifier = classifier();
        let candidate = office_candidate();
        let now = Utc::now();
        let a = classifier.classify(&candidate, &source(), now).unwrap();
        let b = classifier.classify(&candidate, &source(), now).unwrap();
        assert_eq!(a.market_sector, b.market_sector);
        assert_eq!(a.project_stage, b.project_stage);
        assert_eq!(a.confidence_score, b.confidence_score);
        assert_eq!(a.location, b.location);
    }
}
