//! Closed domain enums and the [`Capture`] record.
//!
//! Every enum variant carries an exact `#[serde(rename)]` matching the
//! canonical lower-case string stored in the database, so rows written by
//! earlier tooling deserialize without translation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Kinds of work a session can represent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionType {
    /// Bringing a new agent or collaborator up to speed.
    #[serde(rename = "onboarding")]
    Onboarding,
    /// Planning upcoming work.
    #[serde(rename = "planning")]
    Planning,
    /// Reviewing completed work.
    #[serde(rename = "review")]
    Review,
    /// Open-ended investigation.
    #[serde(rename = "research")]
    Research,
    /// Short status sync.
    #[serde(rename = "check-in")]
    CheckIn,
    /// Anything that does not fit the other types.
    #[serde(rename = "custom")]
    Custom,
}

impl SessionType {
    /// All session types, in canonical order.
    pub const ALL: [SessionType; 6] = [
        SessionType::Onboarding,
        SessionType::Planning,
        SessionType::Review,
        SessionType::Research,
        SessionType::CheckIn,
        SessionType::Custom,
    ];

    /// Canonical lower-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            SessionType::Onboarding => "onboarding",
            SessionType::Planning => "planning",
            SessionType::Review => "review",
            SessionType::Research => "research",
            SessionType::CheckIn => "check-in",
            SessionType::Custom => "custom",
        }
    }
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SessionType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or(())
    }
}

/// Categories an insight capture can belong to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CaptureCategory {
    /// A decision that was made.
    #[serde(rename = "decision")]
    Decision,
    /// Something learned along the way.
    #[serde(rename = "learning")]
    Learning,
    /// A constraint the work must respect.
    #[serde(rename = "constraint")]
    Constraint,
    /// Background context worth keeping.
    #[serde(rename = "context")]
    Context,
    /// Work to pick up later.
    #[serde(rename = "next-step")]
    NextStep,
}

impl CaptureCategory {
    /// All capture categories, in canonical order.
    pub const ALL: [CaptureCategory; 5] = [
        CaptureCategory::Decision,
        CaptureCategory::Learning,
        CaptureCategory::Constraint,
        CaptureCategory::Context,
        CaptureCategory::NextStep,
    ];

    /// Canonical lower-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            CaptureCategory::Decision => "decision",
            CaptureCategory::Learning => "learning",
            CaptureCategory::Constraint => "constraint",
            CaptureCategory::Context => "context",
            CaptureCategory::NextStep => "next-step",
        }
    }

    /// Whether entries of this category are annotated with the originating
    /// session identifier when folded into the master aggregate.
    pub fn is_session_referenced(self) -> bool {
        matches!(self, CaptureCategory::Decision | CaptureCategory::Learning)
    }
}

impl fmt::Display for CaptureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaptureCategory {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CaptureCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or(())
    }
}

/// Session lifecycle status. Transitions are monotone: `active → completed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionStatus {
    /// Accepting captures.
    #[serde(rename = "active")]
    Active,
    /// Finalized; immutable from here on.
    #[serde(rename = "completed")]
    Completed,
}

impl SessionStatus {
    /// Canonical lower-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SessionStatus::Active),
            "completed" => Ok(SessionStatus::Completed),
            _ => Err(()),
        }
    }
}

/// Lifecycle actions mirrored into the append-only event log.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionAction {
    /// Session created.
    #[serde(rename = "start")]
    Start,
    /// Insight captured.
    #[serde(rename = "capture")]
    Capture,
    /// Session finalized.
    #[serde(rename = "complete")]
    Complete,
}

impl SessionAction {
    /// Canonical lower-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            SessionAction::Start => "start",
            SessionAction::Capture => "capture",
            SessionAction::Complete => "complete",
        }
    }
}

impl fmt::Display for SessionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One categorized insight recorded during an active session.
///
/// Captures are append-only facts: once written they are never mutated or
/// deleted. Correcting one means recording a new capture.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capture {
    /// When the insight was recorded (canonical UTC).
    pub timestamp: String,
    /// Category from the closed set.
    pub category: CaptureCategory,
    /// Free-text content, validated non-empty and length-bounded.
    pub content: String,
    /// Optional free-text annotation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl Capture {
    /// Lenient parse of a stored capture value.
    ///
    /// Rows written by earlier tooling may carry entries with unknown
    /// categories or blank content; those yield `None` and are skipped by
    /// the folds rather than failing the whole session.
    pub fn from_value(value: &Value) -> Option<Capture> {
        let category = value
            .get("category")?
            .as_str()?
            .trim()
            .to_lowercase()
            .parse::<CaptureCategory>()
            .ok()?;
        let content = value.get("content")?.as_str()?.trim().to_string();
        if content.is_empty() {
            return None;
        }
        let timestamp = value
            .get("timestamp")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let context = value
            .get("context")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from);
        Some(Capture {
            timestamp,
            category,
            content,
            context,
        })
    }

    /// Parse a serialized capture sequence, skipping malformed entries.
    pub fn parse_list(raw: &str) -> Vec<Capture> {
        let Ok(Value::Array(items)) = serde_json::from_str::<Value>(raw) else {
            return Vec::new();
        };
        items.iter().filter_map(Capture::from_value).collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
