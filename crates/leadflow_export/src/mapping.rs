//! Lead -> CRM field mapping.
//!
//! Internal field names are stable; the configured table renames them to
//! whatever custom properties the CRM tenant actually has, so property
//! ids never appear in code.

use leadflow_types::{CrmMapping, Lead};
use std::collections::HashMap;

/// Internal field name -> rendered value for one lead.
fn internal_fields(lead: &Lead) -> HashMap<&'static str, String> {
    let mut fields = HashMap::new();
    fields.insert("title", lead.title.clone());
    fields.insert("description", lead.description.clone());
    fields.insert("market_sector", lead.market_sector.to_string());
    fields.insert("project_stage", lead.project_stage.to_string());
    fields.insert("city", lead.location.city.clone().unwrap_or_default());
    fields.insert("state", lead.location.state.clone().unwrap_or_default());
    fields.insert("source_url", lead.source_url.clone());
    fields.insert(
        "estimated_value",
        lead.estimated_value
            .map(|v| format!("{:.2}", v.as_dollars()))
            .unwrap_or_default(),
    );
    fields.insert("confidence_score", format!("{:.2}", lead.confidence_score));
    fields.insert("quality_score", lead.quality_score.to_string());
    fields.insert("priority", lead.priority.to_string());
    fields.insert(
        "win_probability",
        format!("{:.2}", lead.win_probability),
    );
    fields
}

/// Deal properties for create/update. Only mapped fields are sent; the
/// lead-id custom property is always included so later exports can find
/// the deal again.
pub fn deal_properties(lead: &Lead, mapping: &CrmMapping) -> HashMap<String, String> {
    let fields = internal_fields(lead);
    let mut properties = HashMap::new();
    for (internal, crm_property) in &mapping.deal_fields {
        if let Some(value) = fields.get(internal.as_str()) {
            if !value.is_empty() {
                properties.insert(crm_property.clone(), value.clone());
            }
        }
    }
    properties.insert(
        mapping.lead_id_property().to_string(),
        lead.lead_id.to_string(),
    );
    properties
}

/// Configured deal-stage identifier for the lead's status, if any.
pub fn stage_for(lead: &Lead, mapping: &CrmMapping) -> Option<String> {
    mapping.stage_map.get(&lead.status).cloned()
}

/// Structured note summarizing where the lead came from and why it
/// qualified.
pub fn note_body(lead: &Lead) -> String {
    let mut lines = vec![
        format!("Source: {}", lead.source_url),
        format!("Sector: {}", lead.market_sector),
        format!("Stage: {}", lead.project_stage),
        format!("Confidence: {:.2}", lead.confidence_score),
        format!("Quality: {}/100", lead.quality_score),
        format!("Priority: {}", lead.priority),
    ];
    if let Some(value) = lead.estimated_value {
        lines.push(format!("Estimated value: {value}"));
    }
    if !lead.location.is_empty() {
        lines.push(format!("Location: {}", lead.location));
    }
    if !lead.notes.is_empty() {
        lines.push(lead.notes.clone());
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use leadflow_types::{
        LeadId, LeadStatus, Location, MarketSector, MoneyCents, Priority, ProjectStage, SourceId,
    };

    fn lead() -> Lead {
        Lead {
            lead_id: LeadId::new(),
            source_id: SourceId::new("s").unwrap(),
            source_url: "https://example.com/p".to_string(),
            source_record_id: None,
            title: "Office Tower".to_string(),
            description: "32 floors".to_string(),
            market_sector: MarketSector::Commercial,
            location: Location {
                city: Some("Seattle".to_string()),
                state: Some("WA".to_string()),
                ..Location::default()
            },
            project_stage: ProjectStage::Planning,
            estimated_value: Some(MoneyCents::from_dollars(5_000_000)),
            estimated_size: None,
            published_at: None,
            confidence_score: 0.82,
            quality_score: 74,
            priority: Priority::High,
            win_probability: 0.5,
            company: None,
            contacts: Vec::new(),
            status: LeadStatus::Enriched,
            notes: String::new(),
            first_seen_at: Utc::now(),
            last_updated_at: Utc::now(),
            export_record_ids: Default::default(),
        }
    }

    fn mapping() -> CrmMapping {
        let mut mapping = CrmMapping::default();
        mapping
            .deal_fields
            .insert("title".to_string(), "dealname".to_string());
        mapping
            .deal_fields
            .insert("estimated_value".to_string(), "amount".to_string());
        mapping
            .deal_fields
            .insert("city".to_string(), "custom_city_prop".to_string());
        mapping
            .stage_map
            .insert(LeadStatus::Enriched, "qualifiedtobuy".to_string());
        mapping.lead_id_property = "leadflow_lead_id".to_string();
        mapping
    }

    #[test]
    fn test_only_mapped_fields_are_sent() {
        let lead = lead();
        let properties = deal_properties(&lead, &mapping());
        assert_eq!(properties.get("dealname").unwrap(), "Office Tower");
        assert_eq!(properties.get("amount").unwrap(), "5000000.00");
        assert_eq!(properties.get("custom_city_prop").unwrap(), "Seattle");
        assert_eq!(
            properties.get("leadflow_lead_id").unwrap(),
            &lead.lead_id.to_string()
        );
        // Unmapped internals stay home.
        assert!(!properties.contains_key("description"));
        assert_eq!(properties.len(), 4);
    }

    #[test]
    fn test_stage_mapping() {
        assert_eq!(
            stage_for(&lead(), &mapping()).as_deref(),
            Some("qualifiedtobuy")
        );
    }

    #[test]
    fn test_note_carries_rationale() {
        let body = note_body(&lead());
        assert!(body.contains("https://example.com/p"));
        assert!(body.contains("Confidence: 0.82"));
        assert!(body.contains("Quality: 74/100"));
        assert!(body.contains("Seattle"));
    }
}
