//! Project stage identification.

use leadflow_types::{ClassifyConfig, ProjectStage};

/// Outcome of stage matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageMatch {
    pub stage: ProjectStage,
    pub matched: bool,
}

/// Earliest-matching stage wins: the firm prefers leads it can still
/// influence, so when a text mentions both planning and implementation
/// cues the lead is filed under planning.
pub fn identify_stage(text: &str, config: &ClassifyConfig) -> StageMatch {
    let lowered = text.to_lowercase();
    let mut earliest: Option<ProjectStage> = None;
    for keyword in &config.stage_keywords {
        if !lowered.contains(&keyword.term.to_lowercase()) {
            continue;
        }
        earliest = Some(match earliest {
            Some(current) => current.min(keyword.stage),
            None => keyword.stage,
        });
    }
    match earliest {
        Some(stage) => StageMatch {
            stage,
            matched: true,
        },
        None => StageMatch {
            stage: ProjectStage::Unknown,
            matched: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables;

    #[test]
    fn test_construction_keyword_is_planning() {
        let config = tables::default_classify_config();
        let result = identify_stage("New Office Building Construction", &config);
        assert_eq!(result.stage, ProjectStage::Planning);
        assert!(result.matched);
    }

    #[test]
    fn test_earliest_stage_wins() {
        let config = tables::default_classify_config();
        let result = identify_stage(
            "groundbreaking scheduled once the proposed design is approved",
            &config,
        );
        assert_eq!(result.stage, ProjectStage::Conceptual);
    }

    #[test]
    fn test_no_match_is_unknown() {
        let config = tables::default_classify_config();
        let result = identify_stage("nothing relevant", &config);
        assert_eq!(result.stage, ProjectStage::Unknown);
        assert!(!result.matched);
    }
}
