//! Lightweight entity tagging over title + description.
//!
//! No learned model: organizations are capitalized token runs ending in a
//! configured marker word, locations are "City, ST" shapes plus marker
//! matches. Output is a deterministic function of the input text and the
//! loaded marker tables.

use leadflow_types::ClassifyConfig;
use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entities {
    pub organizations: Vec<String>,
    pub locations: Vec<String>,
}

/// Built-in organization suffixes; config markers extend this set.
const ORG_SUFFIXES: &[&str] = &[
    "inc", "llc", "corp", "company", "group", "partners", "builders", "construction",
    "development", "developers", "university", "college", "health", "hospital", "authority",
    "district",
];

fn city_state_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // "Seattle, WA" / "Coeur d'Alene, ID"
        Regex::new(r"\b([A-Z][A-Za-z'\.]+(?: [A-Z][A-Za-z'\.]+)*),\s*([A-Z]{2})\b")
            .expect("city/state pattern is valid")
    })
}

pub fn tag_entities(text: &str, config: &ClassifyConfig) -> Entities {
    let mut entities = Entities::default();

    for caps in city_state_pattern().captures_iter(text) {
        let location = format!("{}, {}", &caps[1], &caps[2]);
        if !entities.locations.contains(&location) {
            entities.locations.push(location);
        }
    }

    let lowered = text.to_lowercase();
    for marker in &config.location_markers {
        if lowered.contains(&marker.to_lowercase()) && !entities.locations.contains(marker) {
            entities.locations.push(marker.clone());
        }
    }

    // Walk capitalized runs; a run whose last token is a marker is an org.
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let mut run: Vec<&str> = Vec::new();
    for token in tokens.iter().chain(std::iter::once(&"")) {
        let word = token.trim_matches(|c: char| !c.is_alphanumeric());
        let capitalized = word.chars().next().map(char::is_uppercase).unwrap_or(false);
        if capitalized {
            run.push(word);
            continue;
        }
        if run.len() >= 2 {
            let last = run.last().unwrap_or(&"").to_lowercase();
            let is_org = ORG_SUFFIXES.contains(&last.as_str())
                || config
                    .organization_markers
                    .iter()
                    .any(|m| m.eq_ignore_ascii_case(&last));
            if is_org {
                let name = run.join(" ");
                if !entities.organizations.contains(&name) {
                    entities.organizations.push(name);
                }
            }
        }
        run.clear();
    }

    entities
}
