//! Export semantics against the mock CRM.

use chrono::Utc;
use leadflow_export::{BatchOutcome, Exporter};
use leadflow_test_utils::MockCrm;
use leadflow_types::{
    Company, Contact, CrmMapping, ExportConfig, Lead, LeadId, LeadStatus, Location, MarketSector,
    MoneyCents, Priority, ProjectStage, SourceId,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

fn qualified_lead(n: usize) -> Lead {
    Lead {
        lead_id: LeadId::new(),
        source_id: SourceId::new("feed").unwrap(),
        source_url: format!("https://example.com/projects/{n}"),
        source_record_id: None,
        title: format!("Project {n}"),
        description: "qualified".to_string(),
        market_sector: MarketSector::Commercial,
        location: Location {
            city: Some("Seattle".to_string()),
            state: Some("WA".to_string()),
            ..Location::default()
        },
        project_stage: ProjectStage::Planning,
        estimated_value: Some(MoneyCents::from_dollars(4_000_000)),
        estimated_size: None,
        published_at: None,
        confidence_score: 0.8,
        quality_score: 70,
        priority: Priority::High,
        win_probability: 0.5,
        company: Some(Company {
            name: "Sound Builders".to_string(),
            domain: Some("soundbuilders.com".to_string()),
            ..Company::default()
        }),
        contacts: vec![Contact {
            name: "Dana Reyes".to_string(),
            role: Some("PM".to_string()),
            email: Some("dana@soundbuilders.com".to_string()),
            phone: None,
        }],
        status: LeadStatus::Enriched,
        notes: String::new(),
        first_seen_at: Utc::now(),
        last_updated_at: Utc::now(),
        export_record_ids: HashMap::new(),
    }
}

fn config() -> ExportConfig {
    let mut mapping = CrmMapping::default();
    mapping
        .deal_fields
        .insert("title".to_string(), "dealname".to_string());
    mapping
        .stage_map
        .insert(LeadStatus::Enriched, "qualifiedtobuy".to_string());
    ExportConfig {
        default_retry_after_secs: 0,
        mapping,
        ..ExportConfig::default()
    }
}

#[tokio::test]
async fn exporting_twice_is_idempotent() {
    let crm = Arc::new(MockCrm::new());
    let exporter = Exporter::new(Arc::clone(&crm) as Arc<_>, config());
    let lead = qualified_lead(1);

    let first = exporter.export_lead(&lead).await.unwrap();
    let second = exporter.export_lead(&lead).await.unwrap();

    assert_eq!(first.company_id, second.company_id);
    assert_eq!(first.deal_id, second.deal_id);
    assert_eq!(first.contact_ids, second.contact_ids);

    let counts = crm.counts();
    assert_eq!(counts.companies_created, 1);
    assert_eq!(counts.deals_created, 1);
    assert_eq!(counts.contacts_created, 1);
    // The second run patched the existing deal instead of creating one.
    assert_eq!(counts.deals_updated, 1);
}

#[tokio::test]
async fn two_leads_same_company_share_one_crm_company() {
    let crm = Arc::new(MockCrm::new());
    let exporter = Exporter::new(Arc::clone(&crm) as Arc<_>, config());

    let a = exporter.export_lead(&qualified_lead(1)).await.unwrap();
    let b = exporter.export_lead(&qualified_lead(2)).await.unwrap();

    assert_eq!(a.company_id, b.company_id);
    assert_ne!(a.deal_id, b.deal_id);
    assert_eq!(crm.counts().companies_created, 1);
    assert_eq!(crm.counts().deals_created, 2);
    // One contact per distinct email across both leads.
    assert_eq!(crm.counts().contacts_created, 1);
}

#[tokio::test]
async fn deal_carries_mapped_fields_and_stage() {
    let crm = Arc::new(MockCrm::new());
    let exporter = Exporter::new(Arc::clone(&crm) as Arc<_>, config());
    let lead = qualified_lead(3);

    let result = exporter.export_lead(&lead).await.unwrap();
    let deal_id = result.deal_id.unwrap();
    assert_eq!(
        crm.deal_property(&deal_id, "dealname").as_deref(),
        Some("Project 3")
    );
    assert_eq!(
        crm.deal_property(&deal_id, "dealstage").as_deref(),
        Some("qualifiedtobuy")
    );
    assert_eq!(
        crm.deal_property(&deal_id, "leadflow_lead_id"),
        Some(lead.lead_id.to_string())
    );
    assert_eq!(crm.counts().notes_created, 1);
}

#[tokio::test]
async fn rate_limited_batch_exports_prefix_and_keeps_order() {
    // Five qualified leads; the CRM starts returning 429 once two deals
    // exist, so leads 3..5 stay unexported for the next window.
    let crm = Arc::new(MockCrm::new().rate_limit_after_deals(2, Duration::from_millis(0)));
    let exporter = Exporter::new(Arc::clone(&crm) as Arc<_>, config());
    let leads: Vec<Lead> = (1..=5).map(qualified_lead).collect();

    let report = exporter.export_batch(&leads).await;
    assert_eq!(report.exported(), 2);
    assert_eq!(report.failed(), 3);

    for (index, outcome) in report.outcomes.iter().enumerate() {
        match outcome {
            BatchOutcome::Exported { lead_id, .. } => {
                assert!(index < 2);
                assert_eq!(*lead_id, leads[index].lead_id);
            }
            BatchOutcome::Failed {
                lead_id,
                rate_limited,
                ..
            } => {
                assert!(index >= 2);
                assert_eq!(*lead_id, leads[index].lead_id);
                assert!(rate_limited);
            }
        }
    }
    assert_eq!(crm.counts().deals_created, 2);
}

#[tokio::test]
async fn lead_without_company_still_exports_a_deal() {
    let crm = Arc::new(MockCrm::new());
    let exporter = Exporter::new(Arc::clone(&crm) as Arc<_>, config());
    let mut lead = qualified_lead(4);
    lead.company = None;
    lead.contacts.clear();

    let result = exporter.export_lead(&lead).await.unwrap();
    assert!(result.company_id.is_none());
    assert!(result.deal_id.is_some());
    assert_eq!(crm.counts().companies_created, 0);
    assert_eq!(crm.counts().deals_created, 1);
}
