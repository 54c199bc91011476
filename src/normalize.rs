//! Normalization of track fields for the report.
//!
//! Every function here is total: missing or malformed data yields an empty
//! string, never an error, so one bad record cannot break a monthly report.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{Artists, Track};

// ============================================================================
// REGEX PATTERNS
// ============================================================================

/// ISRC layout per ISO 3901: country (2 letters), registrant (3 alphanumerics),
/// year of reference (2 digits), designation code (5 digits).
///
/// Only the layout is checked. The country prefix is not matched against the
/// ISO 3166 list and registrant codes are not looked up in any registry.
pub static ISRC_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]{2}[A-Z0-9]{3}[0-9]{2}[0-9]{5}$").unwrap());

/// Legacy "ISRC" prefix mentioned in the IFPI ISRC handbook.
const ISRC_LEGACY_PREFIX: &str = "ISRC";

/// Creator roles in `works` that count as composer.
const COMPOSER_ROLES: &[&str] = &["C", "Composer", "W", "Writer"];

// ============================================================================
// FIELD EXTRACTION
// ============================================================================

/// Artist string: credit list joined by ", ", else a bare `artists` string,
/// else `artist`, else the capitalized `Artist` key.
pub fn artist(track: &Track) -> String {
    match &track.artists {
        Some(Artists::Credits(credits)) => credits
            .iter()
            .filter_map(|c| c.name.as_deref())
            .collect::<Vec<_>>()
            .join(", "),
        Some(Artists::Name(name)) => name.clone(),
        None => track
            .artist
            .as_ref()
            .or(track.artist_legacy.as_ref())
            .cloned()
            .unwrap_or_default(),
    }
}

/// Composers from `contributors.composers`, joined by ", ".
pub fn contributor_composers(track: &Track) -> String {
    track
        .contributors
        .as_ref()
        .and_then(|c| c.composers.as_ref())
        .map(|composers| composers.join(", "))
        .unwrap_or_default()
}

/// Composer and writer credits from `works`, joined by ", ".
pub fn works_composers(track: &Track) -> String {
    track
        .works
        .iter()
        .flatten()
        .flat_map(|work| work.creators.iter())
        .filter(|creator| {
            creator
                .role
                .as_deref()
                .is_some_and(|role| COMPOSER_ROLES.contains(&role))
        })
        .map(|creator| creator.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Composer string. Credits from `works` win when the contributor list is
/// empty or merely repeats the artist.
pub fn composer(track: &Track, artist: &str) -> String {
    let composer = contributor_composers(track);
    let from_works = works_composers(track);
    if !from_works.is_empty() && (composer.is_empty() || composer == artist) {
        return from_works;
    }
    composer
}

/// Normalize a raw ISRC: strip the legacy prefix and any whitespace, then
/// validate. Invalid codes become empty.
pub fn normalize_isrc(raw: &str) -> String {
    let code = raw.strip_prefix(ISRC_LEGACY_PREFIX).unwrap_or(raw);
    let code: String = code.chars().filter(|c| !c.is_whitespace()).collect();
    if is_valid_isrc(&code) {
        code
    } else {
        String::new()
    }
}

pub fn is_valid_isrc(code: &str) -> bool {
    ISRC_PATTERN.is_match(code)
}

/// ISRC from `external_ids.isrc`, falling back to the top-level `isrc`.
pub fn isrc(track: &Track) -> String {
    let raw = track
        .external_ids
        .as_ref()
        .and_then(|ids| ids.isrc.as_ref())
        .and_then(|isrc| isrc.code())
        .or_else(|| track.isrc.as_ref().and_then(|isrc| isrc.code()));
    raw.map(normalize_isrc).unwrap_or_default()
}

/// Reformat `YYYY-MM-DD` to `YYYYMMDD`.
///
/// Anything else is dropped: a bare year cannot be expressed at day
/// precision without guessing.
pub fn release_date(raw: &str) -> String {
    if raw.chars().count() != 10 {
        return String::new();
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|d| d.format("%Y%m%d").to_string())
        .unwrap_or_default()
}

/// Format a duration in seconds as `hh:mm:ss`; hours are not wrapped.
pub fn format_duration(seconds: u64) -> String {
    let (hours, remainder) = (seconds / 3600, seconds % 3600);
    let (minutes, seconds) = (remainder / 60, remainder % 60);
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}
