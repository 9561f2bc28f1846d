//! Weighted-keyword sector classification.

use leadflow_types::{ClassifyConfig, MarketSector};

/// Outcome of sector scoring: the winner and its raw score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectorMatch {
    pub sector: MarketSector,
    pub score: f64,
}

/// Score every sector vocabulary against the text; the highest non-zero
/// score wins, ties break by the configured priority order, and no match
/// at all lands in `Other`.
pub fn classify_sector(text: &str, config: &ClassifyConfig) -> SectorMatch {
    let lowered = text.to_lowercase();

    let mut best: Option<SectorMatch> = None;
    for sector in sectors_in_priority_order(config) {
        let Some(keywords) = config.sector_keywords.get(&sector) else {
            continue;
        };
        let mut score = 0.0;
        for keyword in keywords {
            if contains_term(&lowered, &keyword.term) {
                score += keyword.weight;
            }
        }
        if score <= 0.0 {
            continue;
        }
        // Strictly-greater keeps the earlier (higher priority) sector on
        // ties.
        let better = match best {
            Some(current) => score > current.score,
            None => true,
        };
        if better {
            best = Some(SectorMatch { sector, score });
        }
    }

    best.unwrap_or(SectorMatch {
        sector: MarketSector::Other,
        score: 0.0,
    })
}

/// Priority list first, then any configured sectors it omits.
fn sectors_in_priority_order(config: &ClassifyConfig) -> Vec<MarketSector> {
    let mut order = config.sector_priority.clone();
    for sector in config.sector_keywords.keys() {
        if !order.contains(sector) {
            order.push(*sector);
        }
    }
    order
}

/// Case-insensitive whole-phrase containment. Multi-word terms match as
/// phrases; single words respect token boundaries so "arena" does not
/// match "Carenatics".
fn contains_term(lowered: &str, term: &str) -> bool {
    let term = term.to_lowercase();
    let mut start = 0;
    while let Some(found) = lowered[start..].find(&term) {
        let at = start + found;
        let end = at + term.len();
        let before_ok = at == 0
            || !lowered[..at]
                .chars()
                .next_back()
                .map(char::is_alphanumeric)
                .unwrap_or(false);
        let after_ok = end == lowered.len()
            || !lowered[end..]
                .chars()
                .next()
                .map(char::is_alphanumeric)
                .unwrap_or(false);
        if before_ok && after_ok {
            return true;
        }
        start = at + 1;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables;
    use leadflow_types::SectorKeyword;

    #[test]
    fn test_healthcare_beats_commercial() {
        let config = tables::default_classify_config();
        let result = classify_sector(
            "Riverside Hospital expansion adds a new medical office building",
            &config,
        );
        assert_eq!(result.sector, MarketSector::Healthcare);
        assert!(result.score > 0.0);
    }

    #[test]
    fn test_no_match_is_other() {
        let config = tables::default_classify_config();
        let result = classify_sector("quarterly earnings call transcript", &config);
        assert_eq!(result.sector, MarketSector::Other);
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn test_tie_breaks_by_priority_order() {
        let mut config = ClassifyConfig::default();
        config
            .sector_keywords
            .insert(MarketSector::Energy, vec![SectorKeyword::new("plant", 2.0)]);
        config.sector_keywords.insert(
            MarketSector::Entertainment,
            vec![SectorKeyword::new("venue", 2.0)],
        );
        // Both match with identical weight; energy precedes entertainment
        // in the default priority list.
        let result = classify_sector("a venue near the plant", &config);
        assert_eq!(result.sector, MarketSector::Energy);
    }

    #[test]
    fn test_token_boundaries() {
        assert!(contains_term("new arena downtown", "arena"));
        assert!(!contains_term("the carenatics group", "arena"));
        assert!(contains_term("mixed-use development", "mixed-use"));
    }
}
