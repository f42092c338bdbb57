//! Session repository — row-level CRUD for the `sessions` table.
//!
//! Lifecycle rules (who may start, what may be captured) live in the runtime
//! crate; this layer only persists and fetches rows. Timestamps are stored
//! in canonical UTC form, so `ORDER BY` on them is chronological.

use rusqlite::{Connection, OptionalExtension, params};

use crate::errors::Result;
use crate::row_types::SessionRow;

/// Options for inserting a new session row.
pub struct InsertSessionOptions<'a> {
    /// Date-scoped session ID allocated by the caller.
    pub id: &'a str,
    /// Canonical session type.
    pub session_type: &'a str,
    /// Validated title.
    pub title: &'a str,
    /// Optional sprint/grouping tag.
    pub sprint_id: Option<&'a str>,
    /// Start timestamp.
    pub started_at: &'a str,
    /// Owning agent.
    pub agent: &'a str,
    /// Opaque metadata as a serialized JSON object.
    pub metadata: Option<&'a str>,
}

/// Options for listing sessions.
#[derive(Default)]
pub struct ListSessionsOptions<'a> {
    /// Filter by status (`active` | `completed`).
    pub status: Option<&'a str>,
    /// Maximum results.
    pub limit: Option<i64>,
}

/// Session repository — stateless, every method takes `&Connection`.
pub struct SessionRepo;

impl SessionRepo {
    /// Insert a new session row with status `active` and an empty capture
    /// sequence.
    pub fn insert(conn: &Connection, opts: &InsertSessionOptions<'_>) -> Result<SessionRow> {
        let _ = conn.execute(
            "INSERT INTO sessions (id, type, title, sprint_id, started_at, agent, status,
                                   captures, next_steps, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'active', '[]', NULL, ?7)",
            params![
                opts.id,
                opts.session_type,
                opts.title,
                opts.sprint_id,
                opts.started_at,
                opts.agent,
                opts.metadata,
            ],
        )?;

        Ok(SessionRow {
            id: opts.id.to_string(),
            session_type: opts.session_type.to_string(),
            title: opts.title.to_string(),
            sprint_id: opts.sprint_id.map(String::from),
            started_at: opts.started_at.to_string(),
            completed_at: None,
            agent: opts.agent.to_string(),
            status: "active".to_string(),
            captures: "[]".to_string(),
            next_steps: None,
            summary: None,
            metadata: opts.metadata.map(String::from),
        })
    }

    /// Get session by ID.
    pub fn get_by_id(conn: &Connection, session_id: &str) -> Result<Option<SessionRow>> {
        let row = conn
            .query_row(
                "SELECT id, type, title, sprint_id, started_at, completed_at, agent, status,
                        captures, next_steps, summary, metadata
                   FROM sessions WHERE id = ?1",
                params![session_id],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// The currently active session, if any.
    ///
    /// The schema does not enforce uniqueness of `active` rows; the runtime
    /// does. If several exist (a repaired database), the most recently
    /// started wins.
    pub fn active(conn: &Connection) -> Result<Option<SessionRow>> {
        let row = conn
            .query_row(
                "SELECT id, type, title, sprint_id, started_at, completed_at, agent, status,
                        captures, next_steps, summary, metadata
                   FROM sessions WHERE status = 'active'
                  ORDER BY started_at DESC, id DESC LIMIT 1",
                [],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Highest existing session ID sharing a date prefix
    /// (e.g. `PS-2025-01-01-`), used for monotone per-day allocation.
    pub fn latest_id_with_prefix(conn: &Connection, prefix: &str) -> Result<Option<String>> {
        let pattern = format!("{prefix}%");
        let row = conn
            .query_row(
                "SELECT id FROM sessions WHERE id LIKE ?1 ORDER BY id DESC LIMIT 1",
                params![pattern],
                |row| row.get(0),
            )
            .optional()?;
        Ok(row)
    }

    /// Replace the serialized capture sequence.
    pub fn update_captures(conn: &Connection, session_id: &str, captures: &str) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE sessions SET captures = ?1 WHERE id = ?2",
            params![captures, session_id],
        )?;
        Ok(changed > 0)
    }

    /// Transition a session to `completed`, stamping completion time,
    /// summary and next steps.
    pub fn mark_completed(
        conn: &Connection,
        session_id: &str,
        completed_at: &str,
        summary: &str,
        next_steps: Option<&str>,
    ) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE sessions
                SET status = 'completed', completed_at = ?1, summary = ?2, next_steps = ?3
              WHERE id = ?4",
            params![completed_at, summary, next_steps, session_id],
        )?;
        Ok(changed > 0)
    }

    /// List sessions, most recently started first.
    pub fn list(conn: &Connection, opts: &ListSessionsOptions<'_>) -> Result<Vec<SessionRow>> {
        use std::fmt::Write;
        let mut sql = String::from(
            "SELECT id, type, title, sprint_id, started_at, completed_at, agent, status,
                    captures, next_steps, summary, metadata
               FROM sessions WHERE 1=1",
        );
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(status) = opts.status {
            let _ = write!(sql, " AND status = ?{}", param_values.len() + 1);
            param_values.push(Box::new(status.to_string()));
        }
        sql.push_str(" ORDER BY started_at DESC, id DESC");
        if let Some(limit) = opts.limit {
            let _ = write!(sql, " LIMIT {limit}");
        }

        let mut stmt = conn.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(Box::as_ref).collect();
        let rows = stmt
            .query_map(params_refs.as_slice(), Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Completed sessions ordered ascending by effective timestamp
    /// (`COALESCE(completed_at, started_at)`), optionally bounded by an
    /// `as_of` ceiling, limited to `fetch_limit` rows.
    ///
    /// This is the Historical View Builder's only read path — it never
    /// touches the live context documents.
    pub fn completed_ascending(
        conn: &Connection,
        as_of: Option<&str>,
        fetch_limit: i64,
    ) -> Result<Vec<SessionRow>> {
        let sql = "SELECT id, type, title, sprint_id, started_at, completed_at, agent, status,
                          captures, next_steps, summary, metadata
                     FROM sessions
                    WHERE status = 'completed'
                      AND (?1 IS NULL OR COALESCE(completed_at, started_at) <= ?1)
                    ORDER BY COALESCE(completed_at, started_at), id
                    LIMIT ?2";
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params![as_of, fetch_limit.max(1)], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Effective timestamp of one session, used to resolve `as_of` by ID.
    pub fn effective_timestamp(conn: &Connection, session_id: &str) -> Result<Option<String>> {
        let ts = conn
            .query_row(
                "SELECT COALESCE(completed_at, started_at) FROM sessions WHERE id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(ts)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRow> {
        Ok(SessionRow {
            id: row.get(0)?,
            session_type: row.get(1)?,
            title: row.get(2)?,
            sprint_id: row.get(3)?,
            started_at: row.get(4)?,
            completed_at: row.get(5)?,
            agent: row.get(6)?,
            status: row.get(7)?,
            captures: row.get(8)?,
            next_steps: row.get(9)?,
            summary: row.get(10)?,
            metadata: row.get(11)?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;
    use crate::migrations::run_migrations;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    fn insert_default(conn: &Connection, id: &str, started_at: &str) -> SessionRow {
        SessionRepo::insert(
            conn,
            &InsertSessionOptions {
                id,
                session_type: "planning",
                title: "Design API",
                sprint_id: None,
                started_at,
                agent: "assistant",
                metadata: None,
            },
        )
        .unwrap()
    }

    #[test]
    fn insert_and_get() {
        let conn = setup();
        let inserted = insert_default(&conn, "PS-2025-01-01-001", "2025-01-01T09:00:00Z");
        assert_eq!(inserted.status, "active");
        assert_eq!(inserted.captures, "[]");

        let found = SessionRepo::get_by_id(&conn, "PS-2025-01-01-001")
            .unwrap()
            .unwrap();
        assert_eq!(found.session_type, "planning");
        assert_eq!(found.title, "Design API");
        assert!(found.completed_at.is_none());
    }

    #[test]
    fn get_by_id_not_found() {
        let conn = setup();
        assert!(SessionRepo::get_by_id(&conn, "PS-2025-01-01-404")
            .unwrap()
            .is_none());
    }

    #[test]
    fn duplicate_id_rejected() {
        let conn = setup();
        insert_default(&conn, "PS-2025-01-01-001", "2025-01-01T09:00:00Z");
        let result = SessionRepo::insert(
            &conn,
            &InsertSessionOptions {
                id: "PS-2025-01-01-001",
                session_type: "review",
                title: "Duplicate",
                sprint_id: None,
                started_at: "2025-01-01T10:00:00Z",
                agent: "assistant",
                metadata: None,
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn active_lookup() {
        let conn = setup();
        assert!(SessionRepo::active(&conn).unwrap().is_none());

        insert_default(&conn, "PS-2025-01-01-001", "2025-01-01T09:00:00Z");
        let active = SessionRepo::active(&conn).unwrap().unwrap();
        assert_eq!(active.id, "PS-2025-01-01-001");

        SessionRepo::mark_completed(
            &conn,
            "PS-2025-01-01-001",
            "2025-01-01T10:00:00Z",
            "done",
            None,
        )
        .unwrap();
        assert!(SessionRepo::active(&conn).unwrap().is_none());
    }

    #[test]
    fn latest_id_with_prefix_scans_same_day_only() {
        let conn = setup();
        insert_default(&conn, "PS-2025-01-01-001", "2025-01-01T09:00:00Z");
        SessionRepo::mark_completed(
            &conn,
            "PS-2025-01-01-001",
            "2025-01-01T09:30:00Z",
            "done",
            None,
        )
        .unwrap();
        insert_default(&conn, "PS-2025-01-01-002", "2025-01-01T10:00:00Z");
        SessionRepo::mark_completed(
            &conn,
            "PS-2025-01-01-002",
            "2025-01-01T10:30:00Z",
            "done",
            None,
        )
        .unwrap();
        insert_default(&conn, "PS-2025-01-02-001", "2025-01-02T09:00:00Z");

        let latest = SessionRepo::latest_id_with_prefix(&conn, "PS-2025-01-01-").unwrap();
        assert_eq!(latest.as_deref(), Some("PS-2025-01-01-002"));

        let other_day = SessionRepo::latest_id_with_prefix(&conn, "PS-2025-01-03-").unwrap();
        assert!(other_day.is_none());
    }

    #[test]
    fn update_captures_replaces_sequence() {
        let conn = setup();
        insert_default(&conn, "PS-2025-01-01-001", "2025-01-01T09:00:00Z");
        assert!(SessionRepo::update_captures(
            &conn,
            "PS-2025-01-01-001",
            r#"[{"category":"decision","content":"Use REST"}]"#
        )
        .unwrap());

        let found = SessionRepo::get_by_id(&conn, "PS-2025-01-01-001")
            .unwrap()
            .unwrap();
        assert!(found.captures.contains("Use REST"));
    }

    #[test]
    fn mark_completed_stamps_everything() {
        let conn = setup();
        insert_default(&conn, "PS-2025-01-01-001", "2025-01-01T09:00:00Z");
        assert!(SessionRepo::mark_completed(
            &conn,
            "PS-2025-01-01-001",
            "2025-01-01T17:00:00Z",
            "Initial design approved",
            Some(r#"["Draft OpenAPI spec"]"#),
        )
        .unwrap());

        let found = SessionRepo::get_by_id(&conn, "PS-2025-01-01-001")
            .unwrap()
            .unwrap();
        assert_eq!(found.status, "completed");
        assert_eq!(found.completed_at.as_deref(), Some("2025-01-01T17:00:00Z"));
        assert_eq!(found.summary.as_deref(), Some("Initial design approved"));
        assert!(found.next_steps.unwrap().contains("Draft OpenAPI spec"));
    }

    #[test]
    fn mark_completed_missing_session_changes_nothing() {
        let conn = setup();
        assert!(!SessionRepo::mark_completed(
            &conn,
            "PS-2025-01-01-404",
            "2025-01-01T17:00:00Z",
            "summary",
            None,
        )
        .unwrap());
    }

    #[test]
    fn list_filters_by_status() {
        let conn = setup();
        insert_default(&conn, "PS-2025-01-01-001", "2025-01-01T09:00:00Z");
        SessionRepo::mark_completed(
            &conn,
            "PS-2025-01-01-001",
            "2025-01-01T10:00:00Z",
            "done",
            None,
        )
        .unwrap();
        insert_default(&conn, "PS-2025-01-01-002", "2025-01-01T11:00:00Z");

        let all = SessionRepo::list(&conn, &ListSessionsOptions::default()).unwrap();
        assert_eq!(all.len(), 2);
        // Most recently started first.
        assert_eq!(all[0].id, "PS-2025-01-01-002");

        let completed = SessionRepo::list(
            &conn,
            &ListSessionsOptions {
                status: Some("completed"),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].id, "PS-2025-01-01-001");
    }

    #[test]
    fn completed_ascending_orders_by_effective_timestamp() {
        let conn = setup();
        // Completed out of start order: the second-started completes first.
        insert_default(&conn, "PS-2025-01-01-001", "2025-01-01T09:00:00Z");
        insert_default(&conn, "PS-2025-01-01-002", "2025-01-01T10:00:00Z");
        SessionRepo::mark_completed(
            &conn,
            "PS-2025-01-01-002",
            "2025-01-01T11:00:00Z",
            "second",
            None,
        )
        .unwrap();
        SessionRepo::mark_completed(
            &conn,
            "PS-2025-01-01-001",
            "2025-01-01T12:00:00Z",
            "first",
            None,
        )
        .unwrap();

        let rows = SessionRepo::completed_ascending(&conn, None, 250).unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["PS-2025-01-01-002", "PS-2025-01-01-001"]);
    }

    #[test]
    fn completed_ascending_applies_as_of_ceiling() {
        let conn = setup();
        insert_default(&conn, "PS-2025-01-01-001", "2025-01-01T09:00:00Z");
        SessionRepo::mark_completed(
            &conn,
            "PS-2025-01-01-001",
            "2025-01-01T10:00:00Z",
            "early",
            None,
        )
        .unwrap();
        insert_default(&conn, "PS-2025-01-01-002", "2025-01-01T11:00:00Z");
        SessionRepo::mark_completed(
            &conn,
            "PS-2025-01-01-002",
            "2025-01-01T12:00:00Z",
            "late",
            None,
        )
        .unwrap();

        let rows =
            SessionRepo::completed_ascending(&conn, Some("2025-01-01T10:00:00Z"), 250).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "PS-2025-01-01-001");
    }

    #[test]
    fn completed_ascending_excludes_active() {
        let conn = setup();
        insert_default(&conn, "PS-2025-01-01-001", "2025-01-01T09:00:00Z");
        let rows = SessionRepo::completed_ascending(&conn, None, 250).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn effective_timestamp_resolution() {
        let conn = setup();
        insert_default(&conn, "PS-2025-01-01-001", "2025-01-01T09:00:00Z");
        assert_eq!(
            SessionRepo::effective_timestamp(&conn, "PS-2025-01-01-001")
                .unwrap()
                .as_deref(),
            Some("2025-01-01T09:00:00Z")
        );

        SessionRepo::mark_completed(
            &conn,
            "PS-2025-01-01-001",
            "2025-01-01T17:00:00Z",
            "done",
            None,
        )
        .unwrap();
        assert_eq!(
            SessionRepo::effective_timestamp(&conn, "PS-2025-01-01-001")
                .unwrap()
                .as_deref(),
            Some("2025-01-01T17:00:00Z")
        );

        assert!(SessionRepo::effective_timestamp(&conn, "PS-2025-01-01-404")
            .unwrap()
            .is_none());
    }
}
