//! HTML extraction driven by the source's CSS selector hints.

use crate::error::ExtractError;
use crate::normalize;
use leadflow_types::{CandidateLead, HtmlHints, RawPayload, Source};
use scraper::{ElementRef, Html, Selector};

pub(crate) fn extract_html(
    source: &Source,
    payload: &RawPayload,
) -> Result<Vec<CandidateLead>, ExtractError> {
    let hints = source
        .hints
        .html
        .as_ref()
        .ok_or_else(|| ExtractError::BadHints("html source without selector hints".into()))?;

    let selectors = CompiledSelectors::compile(hints)?;
    let document = Html::parse_document(&payload.body_text());

    let mut candidates = Vec::new();
    for item in document.select(&selectors.item) {
        let title = selectors
            .title
            .as_ref()
            .map(|s| select_text(item, s))
            .unwrap_or_else(|| normalize::clean_text(&item.text().collect::<String>()));
        let description = selectors
            .description
            .as_ref()
            .map(|s| select_text(item, s))
            .unwrap_or_default();
        let link = selectors
            .link
            .as_ref()
            .and_then(|s| select_href(item, s))
            .and_then(|href| normalize::resolve_url(&source.url, &href))
            .unwrap_or_else(|| source.url.clone());
        let published_at = selectors
            .date
            .as_ref()
            .map(|s| select_text(item, s))
            .and_then(|text| normalize::parse_date(&text));
        let location_text = selectors
            .location
            .as_ref()
            .map(|s| select_text(item, s))
            .filter(|t| !t.is_empty());
        let estimated_value = selectors
            .value
            .as_ref()
            .map(|s| select_text(item, s))
            .and_then(|text| normalize::parse_money(&text));

        candidates.push(CandidateLead {
            title,
            description,
            source_url: link,
            published_at,
            location_text,
            estimated_value,
            ..CandidateLead::default()
        });
    }
    Ok(candidates)
}

struct CompiledSelectors {
    item: Selector,
    title: Option<Selector>,
    description: Option<Selector>,
    link: Option<Selector>,
    date: Option<Selector>,
    location: Option<Selector>,
    value: Option<Selector>,
}

impl CompiledSelectors {
    fn compile(hints: &HtmlHints) -> Result<Self, ExtractError> {
        Ok(Self {
            item: compile(&hints.item)?,
            title: compile_opt(hints.title.as_deref())?,
            description: compile_opt(hints.description.as_deref())?,
            link: compile_opt(hints.link.as_deref())?,
            date: compile_opt(hints.date.as_deref())?,
            location: compile_opt(hints.location.as_deref())?,
            value: compile_opt(hints.value.as_deref())?,
        })
    }
}

fn compile(selector: &str) -> Result<Selector, ExtractError> {
    Selector::parse(selector)
        .map_err(|e| ExtractError::BadHints(format!("bad selector '{selector}': {e}")))
}

fn compile_opt(selector: Option<&str>) -> Result<Option<Selector>, ExtractError> {
    selector.map(compile).transpose()
}

fn select_text(item: ElementRef<'_>, selector: &Selector) -> String {
    item.select(selector)
        .next()
        .map(|el| normalize::clean_text(&el.text().collect::<String>()))
        .unwrap_or_default()
}

fn select_href(item: ElementRef<'_>, selector: &Selector) -> Option<String> {
    item.select(selector)
        .next()
        .and_then(|el| el.value().attr("href"))
        .map(str::to_string)
}
