//! Input validation for session/context workflows.
//!
//! Pure functions: each either returns a normalized value or a
//! [`ValidationError`] naming the offending field and, for choice fields,
//! the accepted universe of values. Nothing here touches storage — the
//! lifecycle engine validates before opening any transaction.

use chrono::Utc;
use thiserror::Error;

use crate::time::parse_utc;
use crate::types::{CaptureCategory, SessionType};

/// Maximum characters accepted for capture content.
pub const MAX_CAPTURE_LENGTH: usize = 1000;
/// Maximum characters accepted for a single next-step note.
pub const MAX_NEXT_STEP_LENGTH: usize = 500;

/// Alias accepted for the `context` capture category.
const CONTEXT_NOTE_ALIAS: &str = "context-note";

/// A rejected input.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Required field was empty after trimming.
    #[error("{field} must be provided")]
    Missing {
        /// Name of the offending field.
        field: &'static str,
    },

    /// Value is not a member of the field's closed set.
    #[error("invalid {field} '{value}'; valid options: {allowed}")]
    InvalidChoice {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected input, as given.
        value: String,
        /// Comma-separated accepted values.
        allowed: String,
    },

    /// Value exceeds the field's character ceiling.
    #[error("{field} '{snippet}' exceeds {limit} characters")]
    TooLong {
        /// Name of the offending field.
        field: &'static str,
        /// Leading characters of the rejected value.
        snippet: String,
        /// The ceiling that was exceeded.
        limit: usize,
    },
}

/// Convenience alias for validation results.
pub type Result<T> = std::result::Result<T, ValidationError>;

fn require_text(value: &str, field: &'static str) -> Result<String> {
    let cleaned = value.trim();
    if cleaned.is_empty() {
        return Err(ValidationError::Missing { field });
    }
    Ok(cleaned.to_string())
}

fn snippet(value: &str) -> String {
    let mut head: String = value.chars().take(25).collect();
    if value.chars().count() > 25 {
        head.push_str("...");
    }
    head
}

/// Normalize a session type: trim, lower-case, match the closed set.
pub fn normalize_session_type(value: &str) -> Result<SessionType> {
    let cleaned = value.trim().to_lowercase();
    if cleaned.is_empty() {
        return Err(ValidationError::Missing {
            field: "session type",
        });
    }
    cleaned
        .parse::<SessionType>()
        .map_err(|()| ValidationError::InvalidChoice {
            field: "session type",
            value: value.to_string(),
            allowed: allowed_session_types(),
        })
}

/// Normalize a capture category: trim, lower-case, match the closed set.
///
/// `context-note` is accepted as an alias for `context`.
pub fn normalize_capture_category(value: &str) -> Result<CaptureCategory> {
    let cleaned = value.trim().to_lowercase();
    if cleaned.is_empty() {
        return Err(ValidationError::Missing { field: "category" });
    }
    if cleaned == CONTEXT_NOTE_ALIAS {
        return Ok(CaptureCategory::Context);
    }
    cleaned
        .parse::<CaptureCategory>()
        .map_err(|()| ValidationError::InvalidChoice {
            field: "category",
            value: value.to_string(),
            allowed: allowed_capture_categories(),
        })
}

/// Normalize a session title: non-empty after trimming.
pub fn normalize_title(value: &str) -> Result<String> {
    require_text(value, "title")
}

/// Normalize a closing summary: non-empty after trimming.
pub fn normalize_summary(value: &str) -> Result<String> {
    require_text(value, "summary")
}

/// Normalize capture content: non-empty and at most [`MAX_CAPTURE_LENGTH`].
pub fn normalize_capture_content(value: &str) -> Result<String> {
    let cleaned = require_text(value, "content")?;
    if cleaned.chars().count() > MAX_CAPTURE_LENGTH {
        return Err(ValidationError::TooLong {
            field: "content",
            snippet: snippet(&cleaned),
            limit: MAX_CAPTURE_LENGTH,
        });
    }
    Ok(cleaned)
}

/// Normalize a list of next-step notes.
///
/// Blank notes are silently dropped; a surviving note above
/// [`MAX_NEXT_STEP_LENGTH`] is rejected, never truncated.
pub fn normalize_next_steps(next_steps: Option<&[String]>) -> Result<Vec<String>> {
    let Some(notes) = next_steps else {
        return Ok(Vec::new());
    };
    let mut cleaned = Vec::new();
    for raw in notes {
        let note = raw.trim();
        if note.is_empty() {
            continue;
        }
        if note.chars().count() > MAX_NEXT_STEP_LENGTH {
            return Err(ValidationError::TooLong {
                field: "next step",
                snippet: snippet(note),
                limit: MAX_NEXT_STEP_LENGTH,
            });
        }
        cleaned.push(note.to_string());
    }
    Ok(cleaned)
}

/// Report whether a session has been idle at or past the staleness threshold.
///
/// Returns `(is_stale, elapsed_whole_hours)`. Elapsed hours are clamped to
/// zero when the start timestamp is in the future (clock skew). Absent or
/// unparseable timestamps report `(false, None)`.
pub fn detect_stale_session(
    started_at: Option<&str>,
    threshold_hours: i64,
) -> (bool, Option<i64>) {
    let Some(parsed) = started_at.and_then(parse_utc) else {
        return (false, None);
    };
    let hours = (Utc::now() - parsed).num_hours().max(0);
    (hours >= threshold_hours, Some(hours))
}

fn allowed_session_types() -> String {
    SessionType::ALL
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn allowed_capture_categories() -> String {
    CaptureCategory::ALL
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
