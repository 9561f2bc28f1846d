//! Lead entities and their canonical enums.

use crate::ids::{LeadId, SourceId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Canonical Enums (used across all crates)
// ============================================================================

/// Target market segment of the firm.
/// This is the CANONICAL definition - use this everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum MarketSector {
    Healthcare,
    HigherEducation,
    Energy,
    Entertainment,
    Commercial,
    /// No sector vocabulary matched
    #[default]
    Other,
}

impl MarketSector {
    pub const ALL: &'static [MarketSector] = &[
        MarketSector::Healthcare,
        MarketSector::HigherEducation,
        MarketSector::Energy,
        MarketSector::Entertainment,
        MarketSector::Commercial,
        MarketSector::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MarketSector::Healthcare => "healthcare",
            MarketSector::HigherEducation => "higher-education",
            MarketSector::Energy => "energy",
            MarketSector::Entertainment => "entertainment",
            MarketSector::Commercial => "commercial",
            MarketSector::Other => "other",
        }
    }
}

impl fmt::Display for MarketSector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MarketSector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "healthcare" => Ok(MarketSector::Healthcare),
            "higher-education" | "higher_education" => Ok(MarketSector::HigherEducation),
            "energy" => Ok(MarketSector::Energy),
            "entertainment" => Ok(MarketSector::Entertainment),
            "commercial" => Ok(MarketSector::Commercial),
            "other" => Ok(MarketSector::Other),
            _ => Err(format!("Invalid market sector: '{}'", s)),
        }
    }
}

/// Position of a project in the decision/approval/implementation timeline.
///
/// Ordering matters: earlier stages are more valuable to the firm, and the
/// classifier picks the EARLIEST stage when several keywords match.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStage {
    Conceptual,
    Planning,
    Approval,
    Funding,
    Implementation,
    #[default]
    Unknown,
}

impl ProjectStage {
    pub const ALL: &'static [ProjectStage] = &[
        ProjectStage::Conceptual,
        ProjectStage::Planning,
        ProjectStage::Approval,
        ProjectStage::Funding,
        ProjectStage::Implementation,
        ProjectStage::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStage::Conceptual => "conceptual",
            ProjectStage::Planning => "planning",
            ProjectStage::Approval => "approval",
            ProjectStage::Funding => "funding",
            ProjectStage::Implementation => "implementation",
            ProjectStage::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ProjectStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProjectStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "conceptual" => Ok(ProjectStage::Conceptual),
            "planning" => Ok(ProjectStage::Planning),
            "approval" => Ok(ProjectStage::Approval),
            "funding" => Ok(ProjectStage::Funding),
            "implementation" => Ok(ProjectStage::Implementation),
            "unknown" => Ok(ProjectStage::Unknown),
            _ => Err(format!("Invalid project stage: '{}'", s)),
        }
    }
}

/// Lifecycle of a persisted lead.
///
/// Status moves monotonically through the DAG:
///
/// ```text
/// new -> processing -> validated -> enriched -> exported -> archived
///                 \________________________________________> rejected
/// ```
///
/// `Rejected` and `Archived` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LeadStatus {
    #[default]
    New,
    Processing,
    Validated,
    Enriched,
    Exported,
    Archived,
    Rejected,
}

impl LeadStatus {
    pub const ALL: &'static [LeadStatus] = &[
        LeadStatus::New,
        LeadStatus::Processing,
        LeadStatus::Validated,
        LeadStatus::Enriched,
        LeadStatus::Exported,
        LeadStatus::Archived,
        LeadStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => "new",
            LeadStatus::Processing => "processing",
            LeadStatus::Validated => "validated",
            LeadStatus::Enriched => "enriched",
            LeadStatus::Exported => "exported",
            LeadStatus::Archived => "archived",
            LeadStatus::Rejected => "rejected",
        }
    }

    /// Rank along the happy path. Used for "status < enriched" checks in
    /// dedup merging; terminal branches compare via [`Self::is_terminal`].
    pub fn rank(&self) -> u8 {
        match self {
            LeadStatus::New => 0,
            LeadStatus::Processing => 1,
            LeadStatus::Validated => 2,
            LeadStatus::Enriched => 3,
            LeadStatus::Exported => 4,
            LeadStatus::Archived => 5,
            LeadStatus::Rejected => 5,
        }
    }

    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, LeadStatus::Archived | LeadStatus::Rejected)
    }

    /// Whether `self -> next` is a legal edge in the status DAG.
    ///
    /// Rejection is reachable from any non-terminal state; archival only
    /// after export. Everything else steps forward one stage at a time so
    /// no lead skips validation.
    pub fn can_transition(&self, next: LeadStatus) -> bool {
        use LeadStatus::*;
        match (self, next) {
            (_, _) if self.is_terminal() => false,
            (New, Processing) => true,
            (Processing, Validated) => true,
            (Validated, Enriched) => true,
            (Enriched, Exported) => true,
            (Exported, Archived) => true,
            (_, Rejected) => true,
            _ => false,
        }
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LeadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "new" => Ok(LeadStatus::New),
            "processing" => Ok(LeadStatus::Processing),
            "validated" => Ok(LeadStatus::Validated),
            "enriched" => Ok(LeadStatus::Enriched),
            "exported" => Ok(LeadStatus::Exported),
            "archived" => Ok(LeadStatus::Archived),
            "rejected" => Ok(LeadStatus::Rejected),
            _ => Err(format!("Invalid lead status: '{}'", s)),
        }
    }
}

/// Bucketed ranking derived from value, timeline, and win probability.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    #[default]
    Medium,
    Low,
    Minimal,
}

impl Priority {
    pub const ALL: &'static [Priority] = &[
        Priority::Critical,
        Priority::High,
        Priority::Medium,
        Priority::Low,
        Priority::Minimal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
            Priority::Minimal => "minimal",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "critical" => Ok(Priority::Critical),
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            "minimal" => Ok(Priority::Minimal),
            _ => Err(format!("Invalid priority: '{}'", s)),
        }
    }
}

/// Why the classifier refused a candidate. Counted per source, never stored
/// as a lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RejectReason {
    OutOfRegion,
    LowConfidence,
    Stale,
    MissingTitle,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::OutOfRegion => "out-of-region",
            RejectReason::LowConfidence => "low-confidence",
            RejectReason::Stale => "stale",
            RejectReason::MissingTitle => "missing-title",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Value types
// ============================================================================

/// Money amount in integer cents (USD).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord, Default,
)]
#[serde(transparent)]
pub struct MoneyCents(pub i64);

impl MoneyCents {
    pub const fn from_dollars(dollars: i64) -> Self {
        Self(dollars * 100)
    }

    pub fn as_dollars(&self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl fmt::Display for MoneyCents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.2}", self.as_dollars())
    }
}

/// Building area in integer square feet.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord, Default,
)]
#[serde(transparent)]
pub struct SquareFeet(pub i64);

/// Geographic placement of a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Location {
    pub city: Option<String>,
    pub state: Option<String>,
    pub county: Option<String>,
    /// (latitude, longitude) when a geocode is known
    pub coords: Option<(f64, f64)>,
}

impl Location {
    pub fn is_empty(&self) -> bool {
        self.city.is_none() && self.state.is_none() && self.county.is_none()
    }

    /// Lowercased "city, state" form used for dedup and region matching.
    pub fn normalized(&self) -> String {
        let city = self.city.as_deref().unwrap_or("").trim().to_lowercase();
        let state = self.state.as_deref().unwrap_or("").trim().to_lowercase();
        match (city.is_empty(), state.is_empty()) {
            (false, false) => format!("{city}, {state}"),
            (false, true) => city,
            (true, false) => state,
            (true, true) => String::new(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<&str> = Vec::new();
        if let Some(city) = &self.city {
            parts.push(city);
        }
        if let Some(state) = &self.state {
            parts.push(state);
        }
        write!(f, "{}", parts.join(", "))
    }
}

/// Company size bucket from enrichment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompanySize {
    Micro,
    Small,
    Medium,
    Large,
    Enterprise,
}

/// Company associated with a lead. Referenced by denormalized value, not by
/// object graph - the CRM ids live in `Lead::export_record_ids`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Company {
    pub name: String,
    pub domain: Option<String>,
    pub size: Option<CompanySize>,
    pub hq_location: Option<Location>,
}

/// A person attached to a lead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Contact {
    pub name: String,
    pub role: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

// ============================================================================
// Pipeline entities
// ============================================================================

/// Extractor output prior to classification.
///
/// Only `title` and `source_url` are required; everything else is
/// best-effort. The raw field bag is carried for operator debugging and is
/// never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CandidateLead {
    pub title: String,
    pub description: String,
    pub source_url: String,
    pub source_id: Option<SourceId>,
    /// Stable per-source record key when the origin provides one
    pub source_record_id: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub location_text: Option<String>,
    pub estimated_value: Option<MoneyCents>,
    pub estimated_size: Option<SquareFeet>,
    pub organizations: Vec<String>,
    pub locations: Vec<String>,
    pub people: Vec<String>,
    pub raw_fields: HashMap<String, String>,
}

/// The persisted lead entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    // Identity
    pub lead_id: LeadId,
    pub source_id: SourceId,
    pub source_url: String,
    pub source_record_id: Option<String>,

    // Content
    pub title: String,
    pub description: String,
    pub market_sector: MarketSector,
    pub location: Location,
    pub project_stage: ProjectStage,
    pub estimated_value: Option<MoneyCents>,
    pub estimated_size: Option<SquareFeet>,
    pub published_at: Option<DateTime<Utc>>,

    // Quality
    pub confidence_score: f64,
    pub quality_score: u8,
    pub priority: Priority,
    pub win_probability: f64,

    // Associations (denormalized; CRM ids live in export_record_ids)
    pub company: Option<Company>,
    pub contacts: Vec<Contact>,

    // Status
    pub status: LeadStatus,
    pub notes: String,

    // Audit
    pub first_seen_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    /// CRM object kind -> remote record id, filled on export
    pub export_record_ids: HashMap<String, String>,
}

impl Lead {
    /// Conservative merge: fill gaps from `other`, never overwrite a
    /// non-null field of `self`. Contacts are unioned by (name, email).
    pub fn merge_missing_from(&mut self, other: &Lead) {
        if self.description.is_empty() && !other.description.is_empty() {
            self.description = other.description.clone();
        }
        if self.source_record_id.is_none() {
            self.source_record_id = other.source_record_id.clone();
        }
        if self.location.city.is_none() {
            self.location.city = other.location.city.clone();
        }
        if self.location.state.is_none() {
            self.location.state = other.location.state.clone();
        }
        if self.location.county.is_none() {
            self.location.county = other.location.county.clone();
        }
        if self.location.coords.is_none() {
            self.location.coords = other.location.coords;
        }
        if self.estimated_value.is_none() {
            self.estimated_value = other.estimated_value;
        }
        if self.estimated_size.is_none() {
            self.estimated_size = other.estimated_size;
        }
        if self.published_at.is_none() {
            self.published_at = other.published_at;
        }
        match (&mut self.company, &other.company) {
            (None, Some(theirs)) => self.company = Some(theirs.clone()),
            (Some(ours), Some(theirs)) => {
                if ours.domain.is_none() {
                    ours.domain = theirs.domain.clone();
                }
                if ours.size.is_none() {
                    ours.size = theirs.size;
                }
                if ours.hq_location.is_none() {
                    ours.hq_location = theirs.hq_location.clone();
                }
            }
            _ => {}
        }
        for contact in &other.contacts {
            let seen = self
                .contacts
                .iter()
                .any(|c| c.name == contact.name && c.email == contact.email);
            if !seen {
                self.contacts.push(contact.clone());
            }
        }
    }

    /// Normalized title used in dedup similarity.
    pub fn normalized_title(&self) -> String {
        normalize_match_text(&self.title)
    }
}

/// Lowercase, strip punctuation, collapse whitespace. Shared by dedup and
/// by the exporter's company-name keys.
pub fn normalize_match_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_space = true;
    for c in text.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
            last_space = false;
        } else if !last_space {
            out.push(' ');
            last_space = true;
        }
    }
    out.trim_end().to_string()
}

/// Many-to-one relation from a duplicate lead to its canonical record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DedupRecord {
    pub duplicate_lead_id: LeadId,
    pub canonical_lead_id: LeadId,
    pub similarity: f64,
    pub recorded_at: DateTime<Utc>,
}

/// Outcome of one export run for one lead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportResult {
    pub lead_id: LeadId,
    pub company_id: Option<String>,
    pub contact_ids: Vec<String>,
    pub deal_id: Option<String>,
    pub note_id: Option<String>,
    /// False when some object resolved but an association or note failed;
    /// the lead stays enriched and is retried next window.
    pub complete: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_dag_happy_path() {
        use LeadStatus::*;
        let path = [New, Processing, Validated, Enriched, Exported, Archived];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_status_dag_no_skip() {
        use LeadStatus::*;
        assert!(!New.can_transition(Validated));
        assert!(!Processing.can_transition(Enriched));
        assert!(!New.can_transition(Exported));
    }

    #[test]
    fn test_status_terminal() {
        use LeadStatus::*;
        assert!(!Rejected.can_transition(Processing));
        assert!(!Archived.can_transition(Rejected));
        assert!(Enriched.can_transition(Rejected));
    }

    #[test]
    fn test_merge_never_overwrites() {
        let mut a = sample_lead();
        a.estimated_value = Some(MoneyCents::from_dollars(1_000_000));
        let mut b = sample_lead();
        b.estimated_value = Some(MoneyCents::from_dollars(9));
        b.estimated_size = Some(SquareFeet(120_000));

        a.merge_missing_from(&b);
        assert_eq!(a.estimated_value, Some(MoneyCents::from_dollars(1_000_000)));
        assert_eq!(a.estimated_size, Some(SquareFeet(120_000)));
    }

    #[test]
    fn test_normalize_match_text() {
        assert_eq!(
            normalize_match_text("  Riverside Hospital -- Expansion! "),
            "riverside hospital expansion"
        );
    }

    #[test]
    fn test_enum_string_roundtrip() {
        for sector in MarketSector::ALL {
            let parsed: MarketSector = sector.as_str().parse().unwrap();
            assert_eq!(*sector, parsed);
        }
        for status in LeadStatus::ALL {
            let parsed: LeadStatus = status.as_str().parse().unwrap();
            assert_eq!(*status, parsed);
        }
    }

    fn sample_lead() -> Lead {
        Lead {
            lead_id: LeadId::new(),
            source_id: SourceId::new("test-feed").unwrap(),
            source_url: "https://example.com/a".to_string(),
            source_record_id: None,
            title: "New Office Building Construction".to_string(),
            description: String::new(),
            market_sector: MarketSector::Commercial,
            location: Location {
                city: Some("Seattle".to_string()),
                state: Some("WA".to_string()),
                ..Location::default()
            },
            project_stage: ProjectStage::Planning,
            estimated_value: None,
            estimated_size: None,
            published_at: None,
            confidence_score: 0.8,
            quality_score: 50,
            priority: Priority::Medium,
            win_probability: 0.3,
            company: None,
            contacts: Vec::new(),
            status: LeadStatus::New,
            notes: String::new(),
            first_seen_at: Utc::now(),
            last_updated_at: Utc::now(),
            export_record_ids: HashMap::new(),
        }
    }
}
