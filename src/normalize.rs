//! Shared field coercions used by the source adapters. Every function here is
//! pure and total: invalid input yields a defined default, never an error.

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;

/// Trim and collapse internal whitespace
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cleaned text, or None when nothing is left after cleanup
pub fn optional_text(text: &str) -> Option<String> {
    let cleaned = clean_text(text);
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Parse an NTSB API timestamp into a date. The API has been observed to
/// return both full timestamps and bare dates.
pub fn parse_api_date(raw: &str) -> Option<NaiveDate> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.fZ", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(stamp) = NaiveDateTime::parse_from_str(text, format) {
            return Some(stamp.date());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()
}

/// Parse the listing date format used by the ASN table, e.g. "14-MAR-2023"
pub fn parse_listing_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%d-%b-%Y").ok()
}

/// Fatality count from a raw JSON field: an integer, a numeric string, or a
/// "killed/aboard" compound string. Anything else coerces to 0.
pub fn coerce_fatalities(raw: Option<&Value>) -> u32 {
    match raw {
        Some(Value::Number(n)) => n
            .as_u64()
            .map(|v| v.min(u64::from(u32::MAX)) as u32)
            .unwrap_or(0),
        Some(Value::String(s)) => fatalities_from_text(s),
        _ => 0,
    }
}

/// Fatality count from listing text. Only the numerator of a "killed/aboard"
/// pair is retained; non-digit content coerces to 0.
pub fn fatalities_from_text(text: &str) -> u32 {
    text.split('/')
        .next()
        .unwrap_or("")
        .trim()
        .parse()
        .unwrap_or(0)
}

/// "<origin> to <destination>", or empty when either leg is unknown
pub fn compose_route(origin: &str, destination: &str) -> String {
    let origin = clean_text(origin);
    let destination = clean_text(destination);
    if origin.is_empty() || destination.is_empty() {
        return String::new();
    }
    format!("{} to {}", origin, destination)
}

/// Join city/state/country into one location string, skipping missing parts
pub fn compose_location(city: &str, state: &str, country: &str) -> String {
    [city, state, country]
        .iter()
        .map(|part| clean_text(part))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}
