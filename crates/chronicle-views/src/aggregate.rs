//! The pure fold from ordered session records to aggregate lists.
//!
//! [`fold_sessions`] is deterministic in its ordered input: every keyed
//! structure is a `BTreeMap`, so folding the same prefix of history twice
//! yields byte-identical serialized output. No clock, no randomness, no
//! reads — the builder does the fetching, this module only folds.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use chronicle_core::{Capture, CaptureCategory};
use chronicle_store::row_types::SessionRow;

/// Cap on the pending-next-steps list in a reconstructed view.
const PENDING_NEXT_STEPS_LIMIT: usize = 25;

/// Sprint bucket used for sessions without a sprint tag.
const UNSPECIFIED_SPRINT: &str = "unspecified";

/// A completed session parsed into fold-ready form.
#[derive(Clone, Debug)]
pub struct SessionRecord {
    /// Session ID.
    pub id: String,
    /// Session type.
    pub session_type: String,
    /// Session title.
    pub title: String,
    /// Sprint/grouping tag.
    pub sprint_id: Option<String>,
    /// Start timestamp.
    pub started_at: String,
    /// Completion timestamp.
    pub completed_at: Option<String>,
    /// Closing summary.
    pub summary: Option<String>,
    /// Parsed captures (malformed stored entries already skipped).
    pub captures: Vec<Capture>,
    /// Parsed next-step notes.
    pub next_steps: Vec<String>,
    /// Domain declared in session metadata, if any.
    pub domain: Option<String>,
}

impl SessionRecord {
    /// Parse a raw session row. JSON columns are parsed leniently — a
    /// malformed column yields an empty list rather than a failure, so one
    /// damaged row cannot poison a reconstruction.
    pub fn from_row(row: &SessionRow) -> SessionRecord {
        let metadata: Option<Value> = row
            .metadata
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok());
        let domain = metadata.as_ref().and_then(|meta| {
            meta.get("domain")
                .or_else(|| meta.get("project_domain"))
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        });
        let next_steps: Vec<String> = row
            .next_steps
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default();

        SessionRecord {
            id: row.id.clone(),
            session_type: row.session_type.clone(),
            title: row.title.clone(),
            sprint_id: row.sprint_id.clone(),
            started_at: row.started_at.clone(),
            completed_at: row.completed_at.clone(),
            summary: row.summary.clone(),
            captures: Capture::parse_list(&row.captures),
            next_steps,
            domain,
        }
    }

    /// Effective timestamp: completion time, falling back to start time.
    pub fn effective_timestamp(&self) -> &str {
        self.completed_at.as_deref().unwrap_or(&self.started_at)
    }
}

/// Per-sprint tally of sessions and insight counts.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SprintTally {
    /// Sessions attributed to the sprint.
    pub sessions: u64,
    /// Decision captures recorded in those sessions.
    pub decisions: u64,
    /// Learning captures recorded in those sessions.
    pub learnings: u64,
    /// Constraint captures recorded in those sessions.
    pub constraints: u64,
}

/// Digest of one session in the reconstructed recent list.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionDigest {
    /// Session ID.
    pub id: String,
    /// Session type.
    pub session_type: String,
    /// Session title.
    pub title: String,
    /// Sprint tag (absent for untagged sessions).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sprint_id: Option<String>,
    /// Completion timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    /// Closing summary.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Total captures counted for the session.
    pub capture_count: u64,
    /// Per-category capture counts (only categories that occurred).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub captures: BTreeMap<String, u64>,
    /// Domain from session metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

/// Output of one fold over an ordered session sequence.
#[derive(Clone, Debug, Default)]
pub struct Aggregates {
    /// Session-referenced decisions, in fold order.
    pub decisions: Vec<String>,
    /// Session-referenced learnings, in fold order.
    pub learnings: Vec<String>,
    /// Case-insensitively deduplicated constraints.
    pub constraints: Vec<String>,
    /// Context notes, verbatim.
    pub context_notes: Vec<String>,
    /// Pending next steps (`"{id}: {note}"`), most recent tail.
    pub next_steps: Vec<String>,
    /// Capture counts per category across all folded sessions.
    pub capture_totals: BTreeMap<String, u64>,
    /// Per-sprint tallies.
    pub by_sprint: BTreeMap<String, SprintTally>,
    /// Session digests, most recent first.
    pub recent_sessions: Vec<SessionDigest>,
    /// Effective timestamp of the last folded session.
    pub last_activity: Option<String>,
    /// Count of sprints with an explicit tag.
    pub sprint_count: u64,
}

/// Fold an ordered sequence of completed sessions into aggregate form.
pub fn fold_sessions(records: &[SessionRecord]) -> Aggregates {
    let mut agg = Aggregates::default();
    let mut constraint_seen: BTreeSet<String> = BTreeSet::new();
    let mut tagged_sprints: BTreeSet<String> = BTreeSet::new();

    for record in records {
        agg.last_activity = Some(record.effective_timestamp().to_string());
        let sprint_key = record
            .sprint_id
            .clone()
            .unwrap_or_else(|| UNSPECIFIED_SPRINT.to_string());
        if sprint_key != UNSPECIFIED_SPRINT {
            let _ = tagged_sprints.insert(sprint_key.clone());
        }

        let mut session_counts: BTreeMap<String, u64> = BTreeMap::new();
        for capture in &record.captures {
            let category = capture.category.as_str().to_string();
            *session_counts.entry(category.clone()).or_insert(0) += 1;
            *agg.capture_totals.entry(category).or_insert(0) += 1;

            let content = capture.content.as_str();
            match capture.category {
                CaptureCategory::Decision => {
                    agg.decisions.push(with_session_reference(content, &record.id));
                }
                CaptureCategory::Learning => {
                    agg.learnings.push(with_session_reference(content, &record.id));
                }
                CaptureCategory::Constraint => {
                    let normalized = content.to_lowercase();
                    if constraint_seen.insert(normalized) {
                        agg.constraints.push(content.to_string());
                    }
                }
                CaptureCategory::Context => agg.context_notes.push(content.to_string()),
                CaptureCategory::NextStep => {}
            }
        }

        for step in &record.next_steps {
            let step = step.trim();
            if !step.is_empty() {
                agg.next_steps.push(format!("{}: {step}", record.id));
            }
        }

        let tally = agg.by_sprint.entry(sprint_key).or_default();
        tally.sessions += 1;
        tally.decisions += session_counts.get("decision").copied().unwrap_or(0);
        tally.learnings += session_counts.get("learning").copied().unwrap_or(0);
        tally.constraints += session_counts.get("constraint").copied().unwrap_or(0);

        agg.recent_sessions.push(SessionDigest {
            id: record.id.clone(),
            session_type: record.session_type.clone(),
            title: record.title.clone(),
            sprint_id: record.sprint_id.clone(),
            completed_at: record.completed_at.clone(),
            summary: record.summary.clone(),
            capture_count: session_counts.values().sum(),
            captures: session_counts,
            domain: record.domain.clone(),
        });
    }

    agg.recent_sessions.reverse();
    if agg.next_steps.len() > PENDING_NEXT_STEPS_LIMIT {
        let excess = agg.next_steps.len() - PENDING_NEXT_STEPS_LIMIT;
        let _ = agg.next_steps.drain(..excess);
    }
    agg.sprint_count = tagged_sprints.len() as u64;
    agg
}

/// Annotate an insight with its originating session, exactly once.
fn with_session_reference(content: &str, session_id: &str) -> String {
    if content.contains(session_id) {
        content.to_string()
    } else {
        format!("{content} (from {session_id})")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
