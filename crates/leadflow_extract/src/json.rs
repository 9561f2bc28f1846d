//! JSON API extraction driven by dotted field paths.

use crate::error::ExtractError;
use crate::normalize;
use leadflow_types::{CandidateLead, JsonHints, RawPayload, Source};
use serde_json::Value;

pub(crate) fn extract_json(
    source: &Source,
    payload: &RawPayload,
) -> Result<Vec<CandidateLead>, ExtractError> {
    let hints = source
        .hints
        .json
        .as_ref()
        .ok_or_else(|| ExtractError::BadHints("json source without field paths".into()))?;

    let root: Value = serde_json::from_slice(&payload.body)
        .map_err(|e| ExtractError::shape(format!("json parse failed: {e}"), &payload.body))?;

    let items = locate_items(&root, &hints.items)
        .ok_or_else(|| ExtractError::shape(format!("no array at '{}'", hints.items), &payload.body))?;

    let mut candidates = Vec::with_capacity(items.len());
    for item in items {
        let title = path_string(item, &hints.title).unwrap_or_default();
        let description = hints
            .description
            .as_deref()
            .and_then(|p| path_string(item, p))
            .unwrap_or_default();
        let link = hints
            .link
            .as_deref()
            .and_then(|p| path_string(item, p))
            .and_then(|href| normalize::resolve_url(&source.url, &href))
            .unwrap_or_else(|| source.url.clone());
        let record_id = hints.record_id.as_deref().and_then(|p| path_string(item, p));
        let published_at = hints
            .date
            .as_deref()
            .and_then(|p| path_string(item, p))
            .and_then(|text| normalize::parse_date(&text));
        let location_text = hints
            .location
            .as_deref()
            .and_then(|p| path_string(item, p))
            .filter(|t| !t.is_empty());
        let estimated_value = hints
            .value
            .as_deref()
            .and_then(|p| path_value(item, p))
            .and_then(money_from_value);
        let estimated_size = hints
            .size
            .as_deref()
            .and_then(|p| path_value(item, p))
            .and_then(|v| match v {
                Value::Number(n) => n.as_i64().map(leadflow_types::SquareFeet),
                Value::String(s) => normalize::parse_area(s),
                _ => None,
            });

        candidates.push(CandidateLead {
            title: normalize::clean_text(&title),
            description: normalize::clean_text(&description),
            source_url: link,
            source_record_id: record_id,
            published_at,
            location_text,
            estimated_value,
            estimated_size,
            ..CandidateLead::default()
        });
    }
    Ok(candidates)
}

/// Walk to the array of records. An empty path means the root itself.
fn locate_items<'a>(root: &'a Value, path: &str) -> Option<Vec<&'a Value>> {
    let target = if path.is_empty() {
        root
    } else {
        navigate(root, path)?
    };
    target.as_array().map(|a| a.iter().collect())
}

/// Follow a dotted path; a segment written `name[]` flattens through the
/// named array (used for nested record lists).
fn navigate<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.') {
        let (key, is_array) = match segment.strip_suffix("[]") {
            Some(key) => (key, true),
            None => (segment, false),
        };
        current = current.get(key)?;
        if is_array {
            current = current.as_array()?.first()?;
        }
    }
    Some(current)
}

fn path_value<'a>(item: &'a Value, path: &str) -> Option<&'a Value> {
    navigate(item, path)
}

fn path_string(item: &Value, path: &str) -> Option<String> {
    match navigate(item, path)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn money_from_value(value: &Value) -> Option<leadflow_types::MoneyCents> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .map(|dollars| leadflow_types::MoneyCents((dollars * 100.0).round() as i64)),
        Value::String(s) => normalize::parse_money(s),
        _ => None,
    }
}
