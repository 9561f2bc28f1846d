//! Built-in keyword tables.
//!
//! These are starting vocabularies for the firm's target markets; real
//! deployments override them from configuration. Kept here so the shell's
//! default config and the test suite agree on one baseline.

use leadflow_types::{
    ClassifyConfig, MarketSector, ProjectStage, SectorKeyword, StageKeyword, TargetRegion,
};

pub fn default_classify_config() -> ClassifyConfig {
    let mut config = ClassifyConfig::default();
    config.sector_keywords = default_sector_keywords();
    config.stage_keywords = default_stage_keywords();
    config
}

pub fn default_sector_keywords(
) -> std::collections::HashMap<MarketSector, Vec<SectorKeyword>> {
    let mut tables = std::collections::HashMap::new();
    tables.insert(
        MarketSector::Healthcare,
        vec![
            SectorKeyword::new("hospital", 3.0),
            SectorKeyword::new("medical center", 3.0),
            SectorKeyword::new("clinic", 2.0),
            SectorKeyword::new("medical office", 2.0),
            SectorKeyword::new("surgery center", 2.0),
            SectorKeyword::new("health", 1.0),
        ],
    );
    tables.insert(
        MarketSector::HigherEducation,
        vec![
            SectorKeyword::new("university", 3.0),
            SectorKeyword::new("college", 2.5),
            SectorKeyword::new("campus", 2.0),
            SectorKeyword::new("dormitory", 2.0),
            SectorKeyword::new("student housing", 2.0),
            SectorKeyword::new("lecture hall", 1.5),
        ],
    );
    tables.insert(
        MarketSector::Energy,
        vec![
            SectorKeyword::new("solar", 2.5),
            SectorKeyword::new("substation", 2.5),
            SectorKeyword::new("wind farm", 2.5),
            SectorKeyword::new("battery storage", 2.5),
            SectorKeyword::new("power plant", 3.0),
            SectorKeyword::new("transmission", 1.5),
        ],
    );
    tables.insert(
        MarketSector::Entertainment,
        vec![
            SectorKeyword::new("stadium", 3.0),
            SectorKeyword::new("arena", 2.5),
            SectorKeyword::new("theater", 2.0),
            SectorKeyword::new("casino", 2.5),
            SectorKeyword::new("resort", 2.0),
            SectorKeyword::new("amphitheater", 2.0),
        ],
    );
    tables.insert(
        MarketSector::Commercial,
        vec![
            SectorKeyword::new("office building", 2.5),
            SectorKeyword::new("office", 1.5),
            SectorKeyword::new("retail", 2.0),
            SectorKeyword::new("warehouse", 2.0),
            SectorKeyword::new("mixed-use", 2.0),
            SectorKeyword::new("distribution center", 2.0),
            SectorKeyword::new("hotel", 1.5),
        ],
    );
    tables
}

pub fn default_stage_keywords() -> Vec<StageKeyword> {
    [
        ("proposed", ProjectStage::Conceptual),
        ("concept", ProjectStage::Conceptual),
        ("feasibility", ProjectStage::Conceptual),
        ("vision", ProjectStage::Conceptual),
        ("planning", ProjectStage::Planning),
        ("design", ProjectStage::Planning),
        ("construction", ProjectStage::Planning),
        ("permit application", ProjectStage::Planning),
        ("approved", ProjectStage::Approval),
        ("permit issued", ProjectStage::Approval),
        ("council vote", ProjectStage::Approval),
        ("zoning", ProjectStage::Approval),
        ("funded", ProjectStage::Funding),
        ("bond measure", ProjectStage::Funding),
        ("financing", ProjectStage::Funding),
        ("budget approved", ProjectStage::Funding),
        ("groundbreaking", ProjectStage::Implementation),
        ("under construction", ProjectStage::Implementation),
        ("broke ground", ProjectStage::Implementation),
        ("topping out", ProjectStage::Implementation),
    ]
    .into_iter()
    .map(|(term, stage)| StageKeyword {
        term: term.to_string(),
        stage,
    })
    .collect()
}

/// Pacific Northwest defaults used by the sample configs.
pub fn default_target_regions() -> Vec<TargetRegion> {
    vec![
        TargetRegion::city("Seattle"),
        TargetRegion::city("Tacoma"),
        TargetRegion::city("Bellevue"),
        TargetRegion::city("Spokane"),
        TargetRegion::state("WA"),
        TargetRegion::state("OR"),
        TargetRegion::state("ID"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tables_cover_every_sector() {
        let tables = default_sector_keywords();
        for sector in MarketSector::ALL {
            if *sector == MarketSector::Other {
                continue;
            }
            assert!(tables.contains_key(sector), "missing table for {sector}");
        }
    }

    #[test]
    fn test_stage_keywords_have_no_duplicates() {
        let keywords = default_stage_keywords();
        let mut terms: Vec<&str> = keywords.iter().map(|k| k.term.as_str()).collect();
        terms.sort_unstable();
        terms.dedup();
        assert_eq!(terms.len(), keywords.len());
    }
}
