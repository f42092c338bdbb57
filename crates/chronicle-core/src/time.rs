//! Canonical timestamp handling.
//!
//! Every timestamp in the ledger is UTC, second precision, RFC 3339 with a
//! trailing `Z`. Because the format is fixed, chronological order and
//! lexicographic order agree — the store compares timestamps as strings.

use chrono::{DateTime, SecondsFormat, Utc};

/// Current UTC time in canonical form (`2025-01-01T12:00:00Z`).
pub fn utc_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Today's UTC date (`2025-01-01`), used for date-scoped identifiers.
pub fn utc_today() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

/// Parse an RFC 3339 timestamp, accepting both `Z` and numeric offsets.
///
/// Returns `None` for empty or malformed input.
pub fn parse_utc(value: &str) -> Option<DateTime<Utc>> {
    let cleaned = value.trim();
    if cleaned.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(cleaned)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Canonicalize a timestamp to the storage form.
///
/// Returns `None` if the input does not parse.
pub fn normalize_timestamp(value: &str) -> Option<String> {
    parse_utc(value).map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
