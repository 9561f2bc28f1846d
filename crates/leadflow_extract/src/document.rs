//! Document-text extraction via configured regex patterns.

use crate::error::ExtractError;
use crate::normalize;
use leadflow_types::{CandidateLead, PatternHints, RawPayload, Source};
use regex::Regex;

pub(crate) fn extract_document(
    source: &Source,
    payload: &RawPayload,
) -> Result<Vec<CandidateLead>, ExtractError> {
    let hints = source
        .hints
        .patterns
        .as_ref()
        .ok_or_else(|| ExtractError::BadHints("document source without patterns".into()))?;

    let patterns = CompiledPatterns::compile(hints)?;
    let text = payload.body_text();

    let chunks: Vec<&str> = match &patterns.record_split {
        Some(split) => split.split(&text).collect(),
        None => vec![text.as_ref()],
    };

    let mut candidates = Vec::new();
    for chunk in chunks {
        let Some(title_caps) = patterns.title.captures(chunk) else {
            continue;
        };
        let title = named_or_whole(&title_caps, "title");

        let location_text = patterns
            .location
            .as_ref()
            .and_then(|re| re.captures(chunk))
            .map(|caps| named_or_whole(&caps, "location"))
            .filter(|t| !t.is_empty());
        let estimated_value = patterns
            .value
            .as_ref()
            .and_then(|re| re.captures(chunk))
            .map(|caps| named_or_whole(&caps, "value"))
            .and_then(|text| normalize::parse_money(&text));
        let published_at = patterns
            .date
            .as_ref()
            .and_then(|re| re.captures(chunk))
            .map(|caps| named_or_whole(&caps, "date"))
            .and_then(|text| normalize::parse_date(&text));

        candidates.push(CandidateLead {
            title: normalize::clean_text(&title),
            description: normalize::clean_text(chunk),
            source_url: source.url.clone(),
            location_text,
            estimated_value,
            published_at,
            ..CandidateLead::default()
        });
    }
    Ok(candidates)
}

struct CompiledPatterns {
    record_split: Option<Regex>,
    title: Regex,
    location: Option<Regex>,
    value: Option<Regex>,
    date: Option<Regex>,
}

impl CompiledPatterns {
    fn compile(hints: &PatternHints) -> Result<Self, ExtractError> {
        Ok(Self {
            record_split: compile_opt(hints.record_split.as_deref())?,
            title: compile(&hints.title)?,
            location: compile_opt(hints.location.as_deref())?,
            value: compile_opt(hints.value.as_deref())?,
            date: compile_opt(hints.date.as_deref())?,
        })
    }
}

fn compile(pattern: &str) -> Result<Regex, ExtractError> {
    Regex::new(pattern).map_err(|e| ExtractError::BadHints(format!("bad pattern: {e}")))
}

fn compile_opt(pattern: Option<&str>) -> Result<Option<Regex>, ExtractError> {
    pattern.map(compile).transpose()
}

fn named_or_whole(caps: &regex::Captures<'_>, group: &str) -> String {
    caps.name(group)
        .or_else(|| caps.get(caps.len().saturating_sub(1)))
        .or_else(|| caps.get(0))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}
