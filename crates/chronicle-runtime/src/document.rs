//! Typed in-memory shapes of the two context documents.
//!
//! The project and master documents are trees of known substructures plus a
//! `flatten`ed spillover map, so fields written by other tooling survive a
//! read-modify-write cycle untouched. Every capped list goes through
//! [`push_bounded`] / [`extend_unique_bounded`] — append, then evict from
//! the front down to the cap, newest entries always retained.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use chronicle_core::{Capture, SessionAction, SessionType};

/// Name of the project-scoped context document.
pub const PROJECT_CONTEXT: &str = "project_context";
/// Name of the cross-project master context document.
pub const MASTER_CONTEXT: &str = "master_context";

/// Append `entry`, then evict from the front until the list is at `cap`.
pub fn push_bounded<T>(list: &mut Vec<T>, entry: T, cap: usize) {
    list.push(entry);
    if list.len() > cap {
        let excess = list.len() - cap;
        let _ = list.drain(..excess);
    }
}

/// Append each entry not already present, then trim to `cap` from the front.
pub fn extend_unique_bounded(list: &mut Vec<String>, entries: &[String], cap: usize) {
    for entry in entries {
        if !list.contains(entry) {
            list.push(entry.clone());
        }
    }
    if list.len() > cap {
        let excess = list.len() - cap;
        let _ = list.drain(..excess);
    }
}

/// Health block carried by both context documents.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ContextHealth {
    /// Timestamp of the most recent mutation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_update: Option<String>,
    /// Sessions counted since the document was last reset.
    #[serde(default)]
    pub sessions_since_reset: u64,
    /// Serialized document size in KiB, rounded to two decimals.
    #[serde(default)]
    pub size_kb: f64,
    /// Advisory size ceiling in KiB.
    #[serde(default)]
    pub size_limit_kb: u32,
}

/// Cached copy of the currently active session inside the project document.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActiveSession {
    /// Session ID.
    pub id: String,
    /// Session type.
    pub session_type: SessionType,
    /// Session title.
    pub title: String,
    /// Owning agent.
    pub agent: String,
    /// Start timestamp.
    pub started_at: String,
    /// Sprint/grouping tag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sprint_id: Option<String>,
    /// Mirror of the captures recorded so far.
    #[serde(default)]
    pub captures: Vec<Capture>,
}

/// One bounded session-history entry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Session ID.
    pub session: String,
    /// Session type (string form; rows predating the closed enum survive).
    pub session_type: String,
    /// Acting agent.
    pub agent: String,
    /// Short human summary of the action.
    pub summary: String,
    /// Which lifecycle action this records.
    pub action: SessionAction,
    /// Timestamp of the action.
    pub ts: String,
}

/// Digest of one completed session, kept in both documents' recent lists.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecentSessionEntry {
    /// Session ID.
    pub id: String,
    /// Session type.
    pub session_type: String,
    /// Session title.
    pub title: String,
    /// Closing summary.
    pub summary: String,
    /// Completion timestamp.
    pub completed_at: String,
    /// Total captures recorded during the session.
    pub capture_count: u64,
    /// Per-category capture counts (only categories that occurred).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub captures: BTreeMap<String, u64>,
}

/// The project document's working-memory substructure.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WorkingMemory {
    /// Pointer to the currently active session, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_session: Option<ActiveSession>,
    /// Bounded history of lifecycle actions.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub session_history: Vec<HistoryEntry>,
    /// Bounded pending next-step notes (`"{session_id}: {note}"`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub next_steps: Vec<String>,
    /// Bounded recent-session digests.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recent_sessions: Vec<RecentSessionEntry>,
    /// Timestamp of the most recent lifecycle action.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_session: Option<String>,
    /// Count of sessions started.
    #[serde(default)]
    pub session_count: u64,
}

/// The project-scoped context document.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProjectContext {
    /// Working-memory substructure.
    #[serde(default)]
    pub working_memory: WorkingMemory,
    /// Health block.
    #[serde(default)]
    pub context_health: ContextHealth,
    /// Fields owned by other tooling, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The master document's resume substructure.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NextSessionContext {
    /// Bounded resume notes (`"{session_id}: {note}"`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub when_we_resume: Vec<String>,
    /// Fields owned by other tooling, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The cross-project master context document.
///
/// Insight lists are mutated only as part of session completion; captures
/// staged in the project document never appear here until their session
/// completes successfully.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MasterContext {
    /// Decisions, annotated with their originating session.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decisions_made: Vec<String>,
    /// Learnings, annotated with their originating session.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub learnings: Vec<String>,
    /// Constraints, deduplicated case-insensitively.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<String>,
    /// Context notes, stored verbatim.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context_notes: Vec<String>,
    /// Resume substructure.
    #[serde(default)]
    pub next_session_context: NextSessionContext,
    /// Bounded recent-session digests (top-level, unlike the project doc).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recent_sessions: Vec<RecentSessionEntry>,
    /// Health block.
    #[serde(default)]
    pub context_health: ContextHealth,
    /// Fields owned by other tooling, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Access to a document's health block, for the shared refresh path.
pub trait HasHealth {
    /// Mutable health block.
    fn health_mut(&mut self) -> &mut ContextHealth;
}

impl HasHealth for ProjectContext {
    fn health_mut(&mut self) -> &mut ContextHealth {
        &mut self.context_health
    }
}

impl HasHealth for MasterContext {
    fn health_mut(&mut self) -> &mut ContextHealth {
        &mut self.context_health
    }
}

/// Recompute a document's health block after a mutation.
///
/// Deterministic in the document's serialized content: size is the UTF-8
/// byte length of the serialized tree in KiB, rounded to two decimals.
/// Never cached — callers refresh after every mutation.
pub fn refresh_health<D>(
    doc: &mut D,
    ts: &str,
    increment_sessions: bool,
    size_limit_kb: u32,
) -> serde_json::Result<()>
where
    D: Serialize + HasHealth,
{
    {
        let health = doc.health_mut();
        if increment_sessions {
            health.sessions_since_reset += 1;
        }
        health.last_update = Some(ts.to_string());
        if health.size_limit_kb == 0 {
            health.size_limit_kb = size_limit_kb;
        }
    }
    let serialized = serde_json::to_string(doc)?;
    let size_kb = serialized.len() as f64 / 1024.0;
    doc.health_mut().size_kb = (size_kb * 100.0).round() / 100.0;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn push_bounded_evicts_oldest() {
        let mut list = Vec::new();
        for n in 0..7 {
            push_bounded(&mut list, n, 5);
        }
        assert_eq!(list, vec![2, 3, 4, 5, 6]);
    }

    #[test]
    fn push_bounded_under_cap_keeps_everything() {
        let mut list = vec![1, 2];
        push_bounded(&mut list, 3, 5);
        assert_eq!(list, vec![1, 2, 3]);
    }

    #[test]
    fn extend_unique_bounded_skips_duplicates() {
        let mut list = vec!["a".to_string()];
        extend_unique_bounded(
            &mut list,
            &["a".to_string(), "b".to_string(), "b".to_string()],
            10,
        );
        assert_eq!(list, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn extend_unique_bounded_trims_front() {
        let mut list: Vec<String> = (0..5).map(|n| n.to_string()).collect();
        extend_unique_bounded(&mut list, &["5".to_string(), "6".to_string()], 4);
        assert_eq!(
            list,
            vec!["3".to_string(), "4".to_string(), "5".to_string(), "6".to_string()]
        );
    }

    proptest! {
        #[test]
        fn bounded_lists_never_exceed_cap(
            entries in proptest::collection::vec(0u32..1000, 0..200),
            cap in 1usize..20,
        ) {
            let mut list = Vec::new();
            for entry in &entries {
                push_bounded(&mut list, *entry, cap);
                prop_assert!(list.len() <= cap);
            }
            // Newest entries are always the retained ones.
            let expected: Vec<u32> = entries
                .iter()
                .copied()
                .skip(entries.len().saturating_sub(cap))
                .collect();
            prop_assert_eq!(list, expected);
        }
    }

    #[test]
    fn empty_documents_serialize_compactly() {
        let project = ProjectContext::default();
        let json = serde_json::to_value(&project).unwrap();
        // Empty bounded lists are omitted entirely.
        assert!(json["working_memory"].get("session_history").is_none());
        assert!(json["working_memory"].get("active_session").is_none());

        let master = MasterContext::default();
        let json = serde_json::to_value(&master).unwrap();
        assert!(json.get("decisions_made").is_none());
    }

    #[test]
    fn unknown_fields_survive_round_trip() {
        let raw = serde_json::json!({
            "working_memory": {"session_count": 3},
            "context_health": {"sessions_since_reset": 3},
            "project_identity": {"name": "Widget Factory"},
        });
        let doc: ProjectContext = serde_json::from_value(raw).unwrap();
        assert_eq!(doc.working_memory.session_count, 3);

        let back = serde_json::to_value(&doc).unwrap();
        assert_eq!(back["project_identity"]["name"], "Widget Factory");
    }

    #[test]
    fn refresh_health_stamps_and_measures() {
        let mut doc = MasterContext::default();
        refresh_health(&mut doc, "2025-01-01T09:00:00Z", true, 100).unwrap();

        assert_eq!(
            doc.context_health.last_update.as_deref(),
            Some("2025-01-01T09:00:00Z")
        );
        assert_eq!(doc.context_health.sessions_since_reset, 1);
        assert_eq!(doc.context_health.size_limit_kb, 100);
        assert!(doc.context_health.size_kb > 0.0);
    }

    #[test]
    fn refresh_health_without_increment_keeps_counter() {
        let mut doc = MasterContext::default();
        refresh_health(&mut doc, "2025-01-01T09:00:00Z", true, 100).unwrap();
        refresh_health(&mut doc, "2025-01-01T10:00:00Z", false, 100).unwrap();

        assert_eq!(doc.context_health.sessions_since_reset, 1);
        assert_eq!(
            doc.context_health.last_update.as_deref(),
            Some("2025-01-01T10:00:00Z")
        );
    }

    #[test]
    fn refresh_health_preserves_existing_size_limit() {
        let mut doc = MasterContext::default();
        doc.context_health.size_limit_kb = 64;
        refresh_health(&mut doc, "2025-01-01T09:00:00Z", false, 100).unwrap();
        assert_eq!(doc.context_health.size_limit_kb, 64);
    }

    #[test]
    fn size_kb_is_two_decimal_kib() {
        let mut doc = MasterContext::default();
        doc.context_notes = vec!["x".repeat(2048)];
        refresh_health(&mut doc, "2025-01-01T09:00:00Z", false, 100).unwrap();

        // Recompute by hand from the serialized form.
        let serialized = serde_json::to_string(&doc).unwrap();
        let expected = ((serialized.len() as f64 / 1024.0) * 100.0).round() / 100.0;
        assert!((doc.context_health.size_kb - expected).abs() < 0.02);
        assert!(doc.context_health.size_kb >= 2.0);
    }
}
