//! Projection of lifecycle actions onto the context documents.
//!
//! These are the delta-application rules: the lifecycle engine decides WHAT
//! happened inside its transaction, then calls into here to fold the effect
//! into the project and master trees. Master insight lists change only at
//! completion — captures staged in the project document are invisible to the
//! master aggregate until their session completes.

use std::collections::BTreeMap;

use chronicle_core::{Capture, CaptureCategory, SessionAction};

use crate::document::{
    ActiveSession, HistoryEntry, MasterContext, ProjectContext, RecentSessionEntry,
    extend_unique_bounded, push_bounded,
};

/// Annotate an insight with its originating session, exactly once.
///
/// If the session ID already appears anywhere in the text, the text is kept
/// as-is — never double-annotated.
pub fn with_session_reference(content: &str, session_id: &str) -> String {
    let cleaned = content.trim();
    if cleaned.contains(session_id) {
        cleaned.to_string()
    } else {
        format!("{cleaned} (from {session_id})")
    }
}

/// Case-insensitive membership test used for constraint dedup.
fn constraint_exists(existing: &[String], candidate: &str) -> bool {
    let normalized = candidate.trim().to_lowercase();
    existing
        .iter()
        .any(|item| item.trim().to_lowercase() == normalized)
}

/// Prefix next-step notes with their session ID.
fn prefixed_notes(session_id: &str, notes: &[String]) -> Vec<String> {
    notes
        .iter()
        .map(|note| format!("{session_id}: {note}"))
        .collect()
}

impl ProjectContext {
    /// Point working memory at a freshly started session.
    pub fn note_started(&mut self, session: ActiveSession) {
        self.working_memory.active_session = Some(session);
    }

    /// Drop the active pointer, but only if it still points at `session_id`.
    pub fn clear_active_if(&mut self, session_id: &str) {
        if self
            .working_memory
            .active_session
            .as_ref()
            .is_some_and(|active| active.id == session_id)
        {
            self.working_memory.active_session = None;
        }
    }

    /// Mirror a capture into the cached active session, if it is the one
    /// being captured into.
    pub fn cache_capture(&mut self, session_id: &str, capture: &Capture) {
        if let Some(active) = self.working_memory.active_session.as_mut() {
            if active.id == session_id {
                active.captures.push(capture.clone());
            }
        }
    }

    /// Append a bounded session-history entry and advance the action stamp.
    pub fn record_history(&mut self, entry: HistoryEntry, cap: usize) {
        let working = &mut self.working_memory;
        working.last_session = Some(entry.ts.clone());
        if entry.action == SessionAction::Start {
            working.session_count += 1;
        }
        push_bounded(&mut working.session_history, entry, cap);
    }

    /// Append a recent-session digest under working memory.
    pub fn push_recent(&mut self, entry: RecentSessionEntry, cap: usize) {
        push_bounded(&mut self.working_memory.recent_sessions, entry, cap);
    }

    /// Record deduplicated, session-prefixed pending next steps.
    pub fn record_next_steps(&mut self, session_id: &str, notes: &[String], cap: usize) {
        extend_unique_bounded(
            &mut self.working_memory.next_steps,
            &prefixed_notes(session_id, notes),
            cap,
        );
    }
}

impl MasterContext {
    /// Fold a completed session's captures into the aggregate insight lists.
    ///
    /// Category rules:
    /// - `decision` / `learning` → annotated with the originating session
    /// - `constraint` → case-insensitive dedup, stored verbatim
    /// - `context` → appended to notes without a session reference
    /// - `next-step` → resume list, deduplicated and session-prefixed
    ///
    /// Returns per-category counts of the captures that were folded.
    pub fn absorb_captures(
        &mut self,
        session_id: &str,
        captures: &[Capture],
        resume_cap: usize,
    ) -> BTreeMap<CaptureCategory, u64> {
        let mut counts: BTreeMap<CaptureCategory, u64> = BTreeMap::new();

        for capture in captures {
            let content = capture.content.trim();
            if content.is_empty() {
                continue;
            }
            *counts.entry(capture.category).or_insert(0) += 1;

            match capture.category {
                CaptureCategory::Decision => self
                    .decisions_made
                    .push(with_session_reference(content, session_id)),
                CaptureCategory::Learning => self
                    .learnings
                    .push(with_session_reference(content, session_id)),
                CaptureCategory::Constraint => {
                    if !constraint_exists(&self.constraints, content) {
                        self.constraints.push(content.to_string());
                    }
                }
                CaptureCategory::Context => self.context_notes.push(content.to_string()),
                CaptureCategory::NextStep => {
                    let resume = &mut self.next_session_context.when_we_resume;
                    extend_unique_bounded(
                        resume,
                        &[format!("{session_id}: {content}")],
                        resume_cap,
                    );
                }
            }
        }

        counts
    }

    /// Append a recent-session digest at the document's top level.
    pub fn push_recent(&mut self, entry: RecentSessionEntry, cap: usize) {
        push_bounded(&mut self.recent_sessions, entry, cap);
    }

    /// Record deduplicated, session-prefixed resume notes.
    pub fn record_resume_notes(&mut self, session_id: &str, notes: &[String], cap: usize) {
        extend_unique_bounded(
            &mut self.next_session_context.when_we_resume,
            &prefixed_notes(session_id, notes),
            cap,
        );
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chronicle_core::SessionType;

    const SID: &str = "PS-2025-01-01-001";

    fn capture(category: CaptureCategory, content: &str) -> Capture {
        Capture {
            timestamp: "2025-01-01T09:30:00Z".into(),
            category,
            content: content.into(),
            context: None,
        }
    }

    fn active_session() -> ActiveSession {
        ActiveSession {
            id: SID.into(),
            session_type: SessionType::Planning,
            title: "Design API".into(),
            agent: "assistant".into(),
            started_at: "2025-01-01T09:00:00Z".into(),
            sprint_id: None,
            captures: Vec::new(),
        }
    }

    fn history(action: SessionAction, ts: &str) -> HistoryEntry {
        HistoryEntry {
            session: SID.into(),
            session_type: "planning".into(),
            agent: "assistant".into(),
            summary: "Started Design API".into(),
            action,
            ts: ts.into(),
        }
    }

    #[test]
    fn session_reference_added_once() {
        assert_eq!(
            with_session_reference("Use REST", SID),
            format!("Use REST (from {SID})")
        );
        // Already references the session — never double-annotated.
        let annotated = format!("Use REST (from {SID})");
        assert_eq!(with_session_reference(&annotated, SID), annotated);
        let inline = format!("Per {SID} we chose REST");
        assert_eq!(with_session_reference(&inline, SID), inline);
    }

    #[test]
    fn clear_active_only_when_matching() {
        let mut doc = ProjectContext::default();
        doc.note_started(active_session());

        doc.clear_active_if("PS-2025-01-01-999");
        assert!(doc.working_memory.active_session.is_some());

        doc.clear_active_if(SID);
        assert!(doc.working_memory.active_session.is_none());
    }

    #[test]
    fn cache_capture_only_for_tracked_session() {
        let mut doc = ProjectContext::default();
        doc.note_started(active_session());

        doc.cache_capture("PS-2025-01-01-999", &capture(CaptureCategory::Decision, "other"));
        doc.cache_capture(SID, &capture(CaptureCategory::Decision, "Use REST"));

        let cached = &doc.working_memory.active_session.as_ref().unwrap().captures;
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].content, "Use REST");
    }

    #[test]
    fn history_counts_starts_only() {
        let mut doc = ProjectContext::default();
        doc.record_history(history(SessionAction::Start, "2025-01-01T09:00:00Z"), 50);
        doc.record_history(history(SessionAction::Capture, "2025-01-01T09:30:00Z"), 50);
        doc.record_history(history(SessionAction::Complete, "2025-01-01T10:00:00Z"), 50);

        assert_eq!(doc.working_memory.session_count, 1);
        assert_eq!(doc.working_memory.session_history.len(), 3);
        assert_eq!(
            doc.working_memory.last_session.as_deref(),
            Some("2025-01-01T10:00:00Z")
        );
    }

    #[test]
    fn history_is_bounded() {
        let mut doc = ProjectContext::default();
        for n in 0..60 {
            doc.record_history(history(SessionAction::Capture, &format!("t{n}")), 50);
        }
        assert_eq!(doc.working_memory.session_history.len(), 50);
        assert_eq!(doc.working_memory.session_history[0].ts, "t10");
    }

    #[test]
    fn absorb_annotates_decisions_and_learnings() {
        let mut master = MasterContext::default();
        let counts = master.absorb_captures(
            SID,
            &[
                capture(CaptureCategory::Decision, "Use REST"),
                capture(CaptureCategory::Learning, "SQLite WAL is enough"),
            ],
            25,
        );

        assert_eq!(master.decisions_made, vec![format!("Use REST (from {SID})")]);
        assert_eq!(
            master.learnings,
            vec![format!("SQLite WAL is enough (from {SID})")]
        );
        assert_eq!(counts.get(&CaptureCategory::Decision), Some(&1));
        assert_eq!(counts.get(&CaptureCategory::Learning), Some(&1));
    }

    #[test]
    fn absorb_dedups_constraints_case_insensitively() {
        let mut master = MasterContext::default();
        let _ = master.absorb_captures(
            SID,
            &[capture(CaptureCategory::Constraint, "must support 10k rps")],
            25,
        );
        let counts = master.absorb_captures(
            "PS-2025-01-02-001",
            &[capture(CaptureCategory::Constraint, "Must Support 10K RPS")],
            25,
        );

        // Second casing variant is counted but adds no entry.
        assert_eq!(master.constraints, vec!["must support 10k rps".to_string()]);
        assert_eq!(counts.get(&CaptureCategory::Constraint), Some(&1));
    }

    #[test]
    fn absorb_leaves_context_notes_unannotated() {
        let mut master = MasterContext::default();
        let _ = master.absorb_captures(
            SID,
            &[capture(CaptureCategory::Context, "Team prefers trunk-based flow")],
            25,
        );
        assert_eq!(
            master.context_notes,
            vec!["Team prefers trunk-based flow".to_string()]
        );
    }

    #[test]
    fn absorb_routes_next_steps_to_resume_list() {
        let mut master = MasterContext::default();
        let _ = master.absorb_captures(
            SID,
            &[
                capture(CaptureCategory::NextStep, "Draft OpenAPI spec"),
                capture(CaptureCategory::NextStep, "Draft OpenAPI spec"),
            ],
            25,
        );
        assert_eq!(
            master.next_session_context.when_we_resume,
            vec![format!("{SID}: Draft OpenAPI spec")]
        );
    }

    #[test]
    fn absorb_empty_capture_list_changes_nothing() {
        let mut master = MasterContext::default();
        let counts = master.absorb_captures(SID, &[], 25);
        assert!(counts.is_empty());
        assert!(master.decisions_made.is_empty());
        assert!(master.constraints.is_empty());
    }

    #[test]
    fn next_steps_dedup_across_documents() {
        let mut project = ProjectContext::default();
        let notes = vec!["Draft OpenAPI spec".to_string()];
        project.record_next_steps(SID, &notes, 25);
        project.record_next_steps(SID, &notes, 25);

        assert_eq!(
            project.working_memory.next_steps,
            vec![format!("{SID}: Draft OpenAPI spec")]
        );

        let mut master = MasterContext::default();
        master.record_resume_notes(SID, &notes, 25);
        master.record_resume_notes(SID, &notes, 25);
        assert_eq!(
            master.next_session_context.when_we_resume,
            vec![format!("{SID}: Draft OpenAPI spec")]
        );
    }

    #[test]
    fn recent_lists_respect_their_caps() {
        let mut project = ProjectContext::default();
        let mut master = MasterContext::default();
        for n in 0..30 {
            let entry = RecentSessionEntry {
                id: format!("PS-2025-01-01-{n:03}"),
                session_type: "planning".into(),
                title: "t".into(),
                summary: "s".into(),
                completed_at: format!("2025-01-01T{:02}:00:00Z", n % 24),
                capture_count: 0,
                captures: BTreeMap::new(),
            };
            project.push_recent(entry.clone(), 25);
            master.push_recent(entry, 10);
        }
        assert_eq!(project.working_memory.recent_sessions.len(), 25);
        assert_eq!(master.recent_sessions.len(), 10);
        // Newest retained.
        assert_eq!(
            master.recent_sessions.last().unwrap().id,
            "PS-2025-01-01-029"
        );
        assert_eq!(master.recent_sessions[0].id, "PS-2025-01-01-020");
    }
}
