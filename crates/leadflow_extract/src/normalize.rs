//! Field normalization shared by all extractors.
//!
//! Everything downstream assumes these canonical forms: collapsed
//! whitespace, absolute URLs, UTC timestamps, money in cents, area in
//! square feet.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use leadflow_types::{MoneyCents, SquareFeet};
use url::Url;

/// Collapse runs of whitespace to single spaces and trim.
pub fn clean_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            pending_space = !out.is_empty();
        } else {
            if pending_space {
                out.push(' ');
                pending_space = false;
            }
            out.push(c);
        }
    }
    out
}

/// Resolve a possibly-relative href against the source's base URL.
pub fn resolve_url(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    if let Ok(absolute) = Url::parse(href) {
        return Some(absolute.to_string());
    }
    Url::parse(base)
        .ok()
        .and_then(|base| base.join(href).ok())
        .map(|u| u.to_string())
}

/// Best-effort money parse: strips currency symbols and separators,
/// understands `M`/`million`/`B`/`billion`/`K` suffixes. Returns `None`
/// rather than guessing when no digits are present.
pub fn parse_money(text: &str) -> Option<MoneyCents> {
    let lowered = text.to_lowercase();
    let mut digits = String::new();
    let mut seen_digit = false;
    for c in lowered.chars() {
        match c {
            '0'..='9' => {
                digits.push(c);
                seen_digit = true;
            }
            '.' if seen_digit && !digits.contains('.') => digits.push(c),
            ',' | '$' | ' ' => {}
            _ => {
                if seen_digit {
                    break;
                }
            }
        }
    }
    if !seen_digit {
        return None;
    }
    let amount: f64 = digits.parse().ok()?;

    let multiplier = if lowered.contains("billion") || suffix_is(&lowered, 'b') {
        1_000_000_000.0
    } else if lowered.contains("million") || suffix_is(&lowered, 'm') {
        1_000_000.0
    } else if lowered.contains("thousand") || suffix_is(&lowered, 'k') {
        1_000.0
    } else {
        1.0
    };

    let cents = (amount * multiplier * 100.0).round();
    if !cents.is_finite() || cents < 0.0 || cents > i64::MAX as f64 {
        return None;
    }
    Some(MoneyCents(cents as i64))
}

/// Whether the first alphabetic character after the number is `suffix`,
/// as in "$5M" or "2.5b".
fn suffix_is(lowered: &str, suffix: char) -> bool {
    lowered
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .find(|c| c.is_alphabetic())
        .map(|c| c == suffix)
        .unwrap_or(false)
}

/// Best-effort area parse for strings like "120,000 sq ft".
pub fn parse_area(text: &str) -> Option<SquareFeet> {
    let lowered = text.to_lowercase();
    if !(lowered.contains("sq") || lowered.contains("square") || lowered.contains("sf")) {
        return None;
    }
    let digits: String = lowered
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();
    let value: i64 = digits.parse().ok()?;
    Some(SquareFeet(value))
}

/// Canonicalize a date string to UTC. Accepts RFC 3339, RFC 2822, and the
/// date formats that show up in permit portals and news sites. Date-only
/// values become midnight UTC.
pub fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    for format in ["%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y", "%B %d, %Y", "%b %d, %Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return date
                .and_hms_opt(0, 0, 0)
                .map(|naive| Utc.from_utc_datetime(&naive));
        }
    }
    None
}

/// Split "Seattle, WA" style location text into (city, state).
pub fn split_location(text: &str) -> (Option<String>, Option<String>) {
    let cleaned = clean_text(text);
    if cleaned.is_empty() {
        return (None, None);
    }
    match cleaned.split_once(',') {
        Some((city, state)) => {
            let city = clean_text(city);
            let state = clean_text(state);
            (
                (!city.is_empty()).then_some(city),
                (!state.is_empty()).then_some(state),
            )
        }
        None => (Some(cleaned), None),
    }
}
