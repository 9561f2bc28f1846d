//! Store behavior: dedup, transitions, export accounting, persistence.

use chrono::{Duration as ChronoDuration, Utc};
use leadflow_enrich::{CacheKey, ProviderValue};
use leadflow_store::{LeadStore, StoreError, StoreWriter, UpsertOutcome};
use leadflow_types::{
    Company, Lead, LeadId, LeadStatus, Location, MarketSector, MoneyCents, Priority, ProjectStage,
    SourceId,
};
use std::collections::HashMap;
use std::time::Duration;

fn lead(title: &str, url: &str, city: &str) -> Lead {
    Lead {
        lead_id: LeadId::new(),
        source_id: SourceId::new("test-source").unwrap(),
        source_url: url.to_string(),
        source_record_id: None,
        title: title.to_string(),
        description: "a project".to_string(),
        market_sector: MarketSector::Commercial,
        location: Location {
            city: Some(city.to_string()),
            state: Some("CA".to_string()),
            ..Location::default()
        },
        project_stage: ProjectStage::Planning,
        estimated_value: Some(MoneyCents::from_dollars(2_000_000)),
        estimated_size: None,
        published_at: Some(Utc::now()),
        confidence_score: 0.8,
        quality_score: 0,
        priority: Priority::Medium,
        win_probability: 0.0,
        company: None,
        contacts: Vec::new(),
        status: LeadStatus::New,
        notes: String::new(),
        first_seen_at: Utc::now(),
        last_updated_at: Utc::now(),
        export_record_ids: HashMap::new(),
    }
}

#[tokio::test]
async fn insert_and_get_roundtrip() {
    let store = LeadStore::open_in_memory().await.unwrap();
    let mut original = lead(
        "Riverside Hospital Expansion Project",
        "https://a.example.com/riverside",
        "Riverside",
    );
    original.company = Some(Company {
        name: "Sound Builders".to_string(),
        domain: Some("soundbuilders.com".to_string()),
        ..Company::default()
    });

    let outcome = store.upsert(original.clone(), Utc::now()).await.unwrap();
    let UpsertOutcome::Inserted(id) = outcome else {
        panic!("expected insert, got {outcome:?}");
    };

    let loaded = store.get(&id).await.unwrap();
    assert_eq!(loaded.title, original.title);
    assert_eq!(loaded.location.city.as_deref(), Some("Riverside"));
    assert_eq!(loaded.company.unwrap().name, "Sound Builders");
    assert_eq!(loaded.status, LeadStatus::New);
    assert_eq!(loaded.estimated_value, original.estimated_value);
}

#[tokio::test]
async fn refetch_same_url_merges_without_dedup_record() {
    let store = LeadStore::open_in_memory().await.unwrap();
    let first = lead("Office Tower", "https://a.example.com/office", "Seattle");
    store.upsert(first, Utc::now()).await.unwrap();

    let second = lead("Office Tower", "https://a.example.com/office", "Seattle");
    let outcome = store.upsert(second, Utc::now()).await.unwrap();
    assert!(matches!(outcome, UpsertOutcome::Merged(_)));
    assert_eq!(store.count().await.unwrap(), 1);
    assert!(store.dedup_records().await.unwrap().is_empty());
}

#[tokio::test]
async fn fuzzy_duplicate_links_to_canonical() {
    let store = LeadStore::open_in_memory().await.unwrap();
    let yesterday = Utc::now() - ChronoDuration::days(1);
    let a = lead(
        "Riverside Hospital Expansion Project",
        "https://a.example.com/riverside",
        "Riverside",
    );
    let UpsertOutcome::Inserted(a_id) = store.upsert(a, yesterday).await.unwrap() else {
        panic!("expected insert");
    };

    let b = lead(
        "Riverside Hospital Expansion",
        "https://other.example.org/news/riverside-hospital",
        "Riverside",
    );
    let b_id = b.lead_id;
    let outcome = store.upsert(b, Utc::now()).await.unwrap();
    assert_eq!(outcome, UpsertOutcome::Merged(a_id));
    assert_eq!(store.count().await.unwrap(), 1);

    let records = store.dedup_records().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].duplicate_lead_id, b_id);
    assert_eq!(records[0].canonical_lead_id, a_id);
    assert!(records[0].similarity >= 0.85);
}

#[tokio::test]
async fn different_city_is_not_a_duplicate() {
    let store = LeadStore::open_in_memory().await.unwrap();
    let a = lead(
        "Riverside Hospital Expansion",
        "https://a.example.com/ca",
        "Riverside",
    );
    store.upsert(a, Utc::now()).await.unwrap();

    let mut b = lead(
        "Riverside Hospital Expansion",
        "https://a.example.com/oh",
        "Columbus",
    );
    b.location.state = Some("OH".to_string());
    let outcome = store.upsert(b, Utc::now()).await.unwrap();
    assert!(matches!(outcome, UpsertOutcome::Inserted(_)));
    assert_eq!(store.count().await.unwrap(), 2);
}

#[tokio::test]
async fn duplicate_of_settled_lead_writes_record_only() {
    let store = LeadStore::open_in_memory().await.unwrap();
    let now = Utc::now();
    let a = lead("Arena Renovation", "https://a.example.com/arena", "Seattle");
    let UpsertOutcome::Inserted(a_id) = store.upsert(a, now).await.unwrap() else {
        panic!("expected insert");
    };
    for status in [
        LeadStatus::Processing,
        LeadStatus::Validated,
        LeadStatus::Enriched,
    ] {
        store.transition(&a_id, status, now).await.unwrap();
    }

    let b = lead(
        "Arena Renovation",
        "https://b.example.org/arena-story",
        "Seattle",
    );
    let outcome = store.upsert(b, now).await.unwrap();
    assert!(matches!(outcome, UpsertOutcome::Duplicate { canonical, .. } if canonical == a_id));
    assert_eq!(store.count().await.unwrap(), 1);

    // The canonical's enriched state was not disturbed.
    let canonical = store.get(&a_id).await.unwrap();
    assert_eq!(canonical.status, LeadStatus::Enriched);
}

#[tokio::test]
async fn status_transitions_follow_the_dag() {
    let store = LeadStore::open_in_memory().await.unwrap();
    let now = Utc::now();
    let UpsertOutcome::Inserted(id) = store
        .upsert(lead("T", "https://a.example.com/t", "Seattle"), now)
        .await
        .unwrap()
    else {
        panic!("expected insert");
    };

    // Skipping validation is refused.
    let result = store.transition(&id, LeadStatus::Validated, now).await;
    assert!(matches!(result, Err(StoreError::Transition { .. })));

    for status in [
        LeadStatus::Processing,
        LeadStatus::Validated,
        LeadStatus::Enriched,
        LeadStatus::Exported,
        LeadStatus::Archived,
    ] {
        store.transition(&id, status, now).await.unwrap();
    }

    // Terminal: nothing further.
    let result = store.transition(&id, LeadStatus::Rejected, now).await;
    assert!(matches!(result, Err(StoreError::Transition { .. })));

    let history = store.status_history(&id).await.unwrap();
    assert_eq!(history.len(), 5);
    assert_eq!(history[0].0, LeadStatus::New);
    assert_eq!(history[4].1, LeadStatus::Archived);
}

#[tokio::test]
async fn export_accounting() {
    let store = LeadStore::open_in_memory().await.unwrap();
    let now = Utc::now();
    let UpsertOutcome::Inserted(id) = store
        .upsert(lead("E", "https://a.example.com/e", "Seattle"), now)
        .await
        .unwrap()
    else {
        panic!("expected insert");
    };
    for status in [
        LeadStatus::Processing,
        LeadStatus::Validated,
        LeadStatus::Enriched,
    ] {
        store.transition(&id, status, now).await.unwrap();
    }

    // A failed window bumps the counter.
    assert_eq!(
        store.record_export_attempt(&id, "crm 429", now).await.unwrap(),
        1
    );
    assert_eq!(
        store.record_export_attempt(&id, "crm 429", now).await.unwrap(),
        2
    );
    assert_eq!(store.export_attempts(&id).await.unwrap(), 2);
    assert_eq!(store.list_exportable(10).await.unwrap().len(), 1);

    // Success stores ids, advances status, clears the counter.
    let mut ids = HashMap::new();
    ids.insert("deal".to_string(), "deal-991".to_string());
    ids.insert("company".to_string(), "co-14".to_string());
    store.mark_exported(&id, &ids, now).await.unwrap();

    let exported = store.get(&id).await.unwrap();
    assert_eq!(exported.status, LeadStatus::Exported);
    assert_eq!(exported.export_record_ids.get("deal").unwrap(), "deal-991");
    assert_eq!(store.export_attempts(&id).await.unwrap(), 0);
    assert!(store.list_exportable(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn source_state_roundtrip() {
    let store = LeadStore::open_in_memory().await.unwrap();
    let id = SourceId::new("feed-a").unwrap();
    let at = Utc::now();

    assert_eq!(store.record_source_failure(&id).await.unwrap(), 1);
    assert_eq!(store.record_source_failure(&id).await.unwrap(), 2);

    store
        .record_source_success(&id, at, Some("\"v2\""), None)
        .await
        .unwrap();

    let states = store.load_source_states().await.unwrap();
    assert_eq!(states.len(), 1);
    assert_eq!(states[0].source_id, id);
    assert_eq!(states[0].consecutive_failures, 0);
    assert_eq!(states[0].etag.as_deref(), Some("\"v2\""));
    assert!(states[0].last_success_at.is_some());
}

#[tokio::test]
async fn enrichment_cache_survives_roundtrip() {
    let store = LeadStore::open_in_memory().await.unwrap();
    let now = Utc::now();
    let entries = vec![
        (
            CacheKey::new("domains", "sound builders"),
            Some(ProviderValue::Domain("soundbuilders.com".to_string())),
            Duration::from_secs(600),
        ),
        (
            CacheKey::new("domains", "ghost co"),
            None,
            Duration::from_secs(60),
        ),
    ];
    store.save_enrichment_cache(&entries, now).await.unwrap();

    let loaded = store.load_enrichment_cache(now).await.unwrap();
    assert_eq!(loaded.len(), 2);
    let domain = loaded
        .iter()
        .find(|(key, _, _)| key.key == "sound builders")
        .unwrap();
    assert_eq!(
        domain.1,
        Some(ProviderValue::Domain("soundbuilders.com".to_string()))
    );

    // Entries past their TTL are dropped on load.
    let much_later = now + ChronoDuration::hours(2);
    assert!(store
        .load_enrichment_cache(much_later)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn archive_sweep_only_touches_old_exported() {
    let store = LeadStore::open_in_memory().await.unwrap();
    let long_ago = Utc::now() - ChronoDuration::days(400);
    let UpsertOutcome::Inserted(old_id) = store
        .upsert(lead("Old", "https://a.example.com/old", "Seattle"), long_ago)
        .await
        .unwrap()
    else {
        panic!("expected insert");
    };
    for status in [
        LeadStatus::Processing,
        LeadStatus::Validated,
        LeadStatus::Enriched,
        LeadStatus::Exported,
    ] {
        store.transition(&old_id, status, long_ago).await.unwrap();
    }
    store
        .upsert(lead("Fresh", "https://a.example.com/fresh", "Tacoma"), Utc::now())
        .await
        .unwrap();

    let horizon = Utc::now() - ChronoDuration::days(90);
    let archived = store
        .archive_exported_older_than(horizon, Utc::now())
        .await
        .unwrap();
    assert_eq!(archived, 1);
    assert_eq!(store.get(&old_id).await.unwrap().status, LeadStatus::Archived);
    assert_eq!(
        store.count_by_status(LeadStatus::New).await.unwrap(),
        1
    );
}

#[tokio::test]
async fn concurrent_upserts_through_writer_never_race() {
    let store = LeadStore::open_in_memory().await.unwrap();
    let (handle, task) = StoreWriter::spawn(store.clone());

    let mut joins = Vec::new();
    for i in 0..8 {
        let handle = handle.clone();
        joins.push(tokio::spawn(async move {
            // Same project mention from eight "sources" at once.
            let mut candidate = lead(
                "Riverside Hospital Expansion",
                &format!("https://mirror{i}.example.com/riverside"),
                "Riverside",
            );
            candidate.description = format!("mirror {i}");
            handle.upsert(candidate, Utc::now()).await
        }));
    }
    for join in joins {
        join.await.unwrap().unwrap();
    }

    assert_eq!(store.count().await.unwrap(), 1);
    drop(handle);
    task.await.unwrap();
}
