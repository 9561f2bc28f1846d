//! Post-enrichment scoring.
//!
//! All three scores are pure functions of the lead's current field values,
//! so recomputing after any merge yields the same numbers.

use leadflow_types::{Lead, MoneyCents, Priority, ProjectStage};

const MILLION: MoneyCents = MoneyCents::from_dollars(1_000_000);
const TEN_MILLION: MoneyCents = MoneyCents::from_dollars(10_000_000);

/// Quality on the 0-100 scale: confidence carries 40 points, the rest
/// rewards completeness of the enriched fields.
pub fn score_quality(lead: &Lead) -> u8 {
    let mut score = (lead.confidence_score.clamp(0.0, 1.0) * 40.0).round() as i64;

    if let Some(value) = lead.estimated_value {
        score += 10;
        if value >= MILLION {
            score += 5;
        }
    }
    if lead.estimated_size.is_some() {
        score += 5;
    }
    if let Some(company) = &lead.company {
        score += 10;
        if company.domain.is_some() {
            score += 5;
        }
    }
    if !lead.contacts.is_empty() {
        score += 10;
    }
    if lead.project_stage != ProjectStage::Unknown {
        score += 10;
    }
    if lead.location.city.is_some() && lead.location.state.is_some() {
        score += 5;
    }

    score.clamp(0, 100) as u8
}

/// Win probability in [0,1]. Earlier stages score higher - a project
/// still in concept or planning can be influenced; one already under
/// construction rarely can.
pub fn win_probability(lead: &Lead) -> f64 {
    let stage_factor = match lead.project_stage {
        ProjectStage::Conceptual => 0.25,
        ProjectStage::Planning => 0.22,
        ProjectStage::Approval => 0.18,
        ProjectStage::Funding => 0.12,
        ProjectStage::Implementation => 0.05,
        ProjectStage::Unknown => 0.10,
    };
    let mut probability = 0.1 + lead.confidence_score.clamp(0.0, 1.0) * 0.3 + stage_factor;
    if lead.company.is_some() {
        probability += 0.1;
    }
    if !lead.contacts.is_empty() {
        probability += 0.1;
    }
    probability.min(1.0)
}

/// Bucketed priority from value, timeline, and win probability.
pub fn priority_for(lead: &Lead) -> Priority {
    let mut points = 0u8;

    points += match lead.estimated_value {
        Some(value) if value >= TEN_MILLION => 3,
        Some(value) if value >= MILLION => 2,
        Some(_) => 1,
        None => 1,
    };
    points += match lead.project_stage {
        ProjectStage::Conceptual | ProjectStage::Planning => 2,
        ProjectStage::Approval | ProjectStage::Funding => 1,
        ProjectStage::Implementation | ProjectStage::Unknown => 0,
    };
    let win = lead.win_probability.max(win_probability(lead));
    points += if win >= 0.6 {
        2
    } else if win >= 0.4 {
        1
    } else {
        0
    };

    match points {
        7.. => Priority::Critical,
        5..=6 => Priority::High,
        3..=4 => Priority::Medium,
        2 => Priority::Low,
        _ => Priority::Minimal,
    }
}
