//! Timestamp extraction from free-text log lines
//!
//! Lines coming out of object storage carry no structured timestamp, so the
//! analyzer looks for one of a few literal formats in the text itself. A miss
//! is never an error: malformed or unrecognised timestamps simply yield `None`.

use crate::events::Timestamp;
use chrono::{DateTime, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

static ISO_8601: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:?\d{2})?")
        .expect("ISO-8601 timestamp regex is valid")
});

static US_DATE_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\d{2}/\d{2}/\d{4} \d{2}:\d{2}:\d{2}\b").expect("MM/DD/YYYY regex is valid")
});

static SLASHED_DATE_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\d{4}/\d{2}/\d{2} \d{2}:\d{2}:\d{2}\b").expect("YYYY/MM/DD regex is valid")
});

/// Find the first recognised timestamp in `line`, normalized to UTC
///
/// Formats are tried in order: ISO-8601 (optional fraction, optional `Z` or
/// offset; no offset means UTC), `MM/DD/YYYY HH:MM:SS`, `YYYY/MM/DD HH:MM:SS`.
/// Within a format every occurrence is tried left to right, and a format
/// whose occurrences never form a valid date falls through to the next one.
pub fn extract_timestamp(line: &str) -> Option<Timestamp> {
    let formats: [(&Regex, fn(&str) -> Option<Timestamp>); 3] = [
        (&*ISO_8601, parse_iso_8601),
        (&*US_DATE_TIME, parse_us_date_time),
        (&*SLASHED_DATE_TIME, parse_slashed_date_time),
    ];

    formats.iter().find_map(|(pattern, parse)| {
        pattern
            .find_iter(line)
            .find_map(|literal| parse(literal.as_str()))
    })
}

fn parse_iso_8601(literal: &str) -> Option<Timestamp> {
    if let Some(naive) = literal.strip_suffix('Z') {
        return parse_naive(naive, "%Y-%m-%dT%H:%M:%S%.f");
    }

    // Offsets start after the `T`; a '-' before it belongs to the date
    let time_start = literal.find('T')?;
    match literal[time_start..].find(|c: char| c == '+' || c == '-') {
        Some(offset_start) => {
            let (date_time, offset) = literal.split_at(time_start + offset_start);
            let offset = if offset.contains(':') {
                offset.to_string()
            } else {
                format!("{}:{}", &offset[..3], &offset[3..])
            };
            DateTime::parse_from_rfc3339(&format!("{}{}", date_time, offset))
                .ok()
                .map(|parsed| parsed.with_timezone(&Utc))
        }
        None => parse_naive(literal, "%Y-%m-%dT%H:%M:%S%.f"),
    }
}

fn parse_us_date_time(literal: &str) -> Option<Timestamp> {
    parse_naive(literal, "%m/%d/%Y %H:%M:%S")
}

fn parse_slashed_date_time(literal: &str) -> Option<Timestamp> {
    parse_naive(literal, "%Y/%m/%d %H:%M:%S")
}

fn parse_naive(literal: &str, format: &str) -> Option<Timestamp> {
    NaiveDateTime::parse_from_str(literal, format)
        .ok()
        .map(|naive| naive.and_utc())
}
