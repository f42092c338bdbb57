//! Event repository — the append-only `session_events` audit log.
//!
//! Every lifecycle transition is mirrored here exactly once. Rows are
//! write-once: schema triggers reject `UPDATE` and `DELETE`, so the log can
//! always be replayed to audit what happened.

use rusqlite::{Connection, params};
use serde::Serialize;

use crate::errors::Result;
use crate::row_types::EventRow;

/// A lifecycle event to append. Serialized in full into `raw_event`.
#[derive(Clone, Debug, Serialize)]
pub struct NewEvent<'a> {
    /// Event timestamp.
    pub ts: &'a str,
    /// Acting agent.
    pub agent: &'a str,
    /// Session the event belongs to.
    pub session_id: &'a str,
    /// Action kind (`start` | `capture` | `complete`).
    pub action: &'a str,
    /// Resulting session status.
    pub status: &'a str,
    /// Short human summary.
    pub summary: Option<&'a str>,
    /// Optional hint (sprint tag, capture context, joined next steps).
    pub next_hint: Option<&'a str>,
}

/// Event repository — stateless, every method takes `&Connection`.
pub struct EventRepo;

impl EventRepo {
    /// Append one event, returning its assigned rowid.
    pub fn append(conn: &Connection, event: &NewEvent<'_>) -> Result<i64> {
        let raw_event = serde_json::to_string(event)?;
        let _ = conn.execute(
            "INSERT INTO session_events (ts, agent, session_id, action, status, summary,
                                         next_hint, raw_event)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                event.ts,
                event.agent,
                event.session_id,
                event.action,
                event.status,
                event.summary,
                event.next_hint,
                raw_event,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// All events for one session, in append order.
    pub fn list_for_session(conn: &Connection, session_id: &str) -> Result<Vec<EventRow>> {
        let mut stmt = conn.prepare(
            "SELECT id, ts, agent, session_id, action, status, summary, next_hint, raw_event
               FROM session_events WHERE session_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![session_id], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Most recent events across all sessions, newest first.
    pub fn recent(conn: &Connection, limit: i64) -> Result<Vec<EventRow>> {
        let mut stmt = conn.prepare(
            "SELECT id, ts, agent, session_id, action, status, summary, next_hint, raw_event
               FROM session_events ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit.max(1)], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Number of events recorded for one session.
    pub fn count_for_session(conn: &Connection, session_id: &str) -> Result<i64> {
        let count = conn.query_row(
            "SELECT COUNT(*) FROM session_events WHERE session_id = ?1",
            params![session_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EventRow> {
        Ok(EventRow {
            id: row.get(0)?,
            ts: row.get(1)?,
            agent: row.get(2)?,
            session_id: row.get(3)?,
            action: row.get(4)?,
            status: row.get(5)?,
            summary: row.get(6)?,
            next_hint: row.get(7)?,
            raw_event: row.get(8)?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
