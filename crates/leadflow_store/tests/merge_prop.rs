//! Conservative merge property: merging B into A never overwrites any
//! non-null field of A.

use chrono::Utc;
use leadflow_types::{
    Company, Contact, Lead, LeadId, LeadStatus, Location, MarketSector, MoneyCents, Priority,
    ProjectStage, SourceId, SquareFeet,
};
use proptest::option;
use proptest::prelude::*;
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct FieldBag {
    description: Option<String>,
    city: Option<String>,
    state: Option<String>,
    value: Option<i64>,
    size: Option<i64>,
    company: Option<String>,
    contact: Option<String>,
}

fn field_bag() -> impl Strategy<Value = FieldBag> {
    (
        option::of("[a-z]{1,12}"),
        option::of("[A-Z][a-z]{1,10}"),
        option::of("[A-Z]{2}"),
        option::of(1_000i64..1_000_000_000),
        option::of(100i64..1_000_000),
        option::of("[A-Z][a-z]{1,10} Builders"),
        option::of("[a-z]{1,8}@example\\.com"),
    )
        .prop_map(
            |(description, city, state, value, size, company, contact)| FieldBag {
                description,
                city,
                state,
                value,
                size,
                company,
                contact,
            },
        )
}

fn lead_from(bag: &FieldBag) -> Lead {
    Lead {
        lead_id: LeadId::new(),
        source_id: SourceId::new("prop").unwrap(),
        source_url: "https://example.com/p".to_string(),
        source_record_id: None,
        title: "Project".to_string(),
        description: bag.description.clone().unwrap_or_default(),
        market_sector: MarketSector::Other,
        location: Location {
            city: bag.city.clone(),
            state: bag.state.clone(),
            ..Location::default()
        },
        project_stage: ProjectStage::Unknown,
        estimated_value: bag.value.map(MoneyCents),
        estimated_size: bag.size.map(SquareFeet),
        published_at: None,
        confidence_score: 0.8,
        quality_score: 0,
        priority: Priority::Medium,
        win_probability: 0.0,
        company: bag.company.clone().map(|name| Company {
            name,
            ..Company::default()
        }),
        contacts: bag
            .contact
            .clone()
            .map(|email| {
                vec![Contact {
                    name: "Contact".to_string(),
                    role: None,
                    email: Some(email),
                    phone: None,
                }]
            })
            .unwrap_or_default(),
        status: LeadStatus::New,
        notes: String::new(),
        first_seen_at: Utc::now(),
        last_updated_at: Utc::now(),
        export_record_ids: HashMap::new(),
    }
}

proptest! {
    #[test]
    fn merge_never_overwrites_non_null(a_bag in field_bag(), b_bag in field_bag()) {
        let mut a = lead_from(&a_bag);
        let b = lead_from(&b_bag);
        let before = a.clone();

        a.merge_missing_from(&b);

        if !before.description.is_empty() {
            prop_assert_eq!(&a.description, &before.description);
        }
        if before.location.city.is_some() {
            prop_assert_eq!(&a.location.city, &before.location.city);
        }
        if before.location.state.is_some() {
            prop_assert_eq!(&a.location.state, &before.location.state);
        }
        if before.estimated_value.is_some() {
            prop_assert_eq!(a.estimated_value, before.estimated_value);
        }
        if before.estimated_size.is_some() {
            prop_assert_eq!(a.estimated_size, before.estimated_size);
        }
        if let Some(company) = &before.company {
            prop_assert_eq!(&a.company.as_ref().unwrap().name, &company.name);
        }
        // Existing contacts all survive.
        for contact in &before.contacts {
            prop_assert!(a.contacts.iter().any(|c| c.email == contact.email));
        }
    }
}
