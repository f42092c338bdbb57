//! Context repository — the named document get/set API.
//!
//! Documents are stored as opaque serialized payloads under a unique name.
//! A write may request a snapshot: the PRIOR version (if any) is copied to
//! `context_snapshots` with a source label before being overwritten, so an
//! audit trail of document states survives in-place mutation.

use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;

use crate::errors::Result;
use crate::row_types::{ContextRow, SnapshotRow};

/// Options for writing a context document.
pub struct SetContextOptions<'a> {
    /// Document name.
    pub name: &'a str,
    /// New payload.
    pub payload: &'a Value,
    /// Session responsible for the write.
    pub session_id: Option<&'a str>,
    /// Write timestamp.
    pub updated_at: &'a str,
    /// Snapshot the prior version before overwriting.
    pub snapshot: bool,
    /// Label identifying what triggered the snapshot.
    pub snapshot_source: Option<&'a str>,
}

/// Context repository — stateless, every method takes `&Connection`.
pub struct ContextRepo;

impl ContextRepo {
    /// Get a document's parsed payload, or `None` if it has never been set.
    pub fn get(conn: &Connection, name: &str) -> Result<Option<Value>> {
        let raw: Option<String> = conn
            .query_row(
                "SELECT payload FROM contexts WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        match raw {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    /// Get a document's raw row, including bookkeeping columns.
    pub fn get_row(conn: &Connection, name: &str) -> Result<Option<ContextRow>> {
        let row = conn
            .query_row(
                "SELECT name, payload, session_id, updated_at FROM contexts WHERE name = ?1",
                params![name],
                |row| {
                    Ok(ContextRow {
                        name: row.get(0)?,
                        payload: row.get(1)?,
                        session_id: row.get(2)?,
                        updated_at: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Write a document, optionally snapshotting the prior version first.
    pub fn set(conn: &Connection, opts: &SetContextOptions<'_>) -> Result<()> {
        if opts.snapshot {
            if let Some(prior) = Self::get_row(conn, opts.name)? {
                let _ = conn.execute(
                    "INSERT INTO context_snapshots (name, payload, session_id, source, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        prior.name,
                        prior.payload,
                        prior.session_id,
                        opts.snapshot_source,
                        opts.updated_at,
                    ],
                )?;
            }
        }

        let serialized = serde_json::to_string(opts.payload)?;
        let _ = conn.execute(
            "INSERT INTO contexts (name, payload, session_id, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (name) DO UPDATE
                SET payload = excluded.payload,
                    session_id = excluded.session_id,
                    updated_at = excluded.updated_at",
            params![opts.name, serialized, opts.session_id, opts.updated_at],
        )?;
        Ok(())
    }

    /// Snapshots of one document, newest first.
    pub fn snapshots(conn: &Connection, name: &str, limit: i64) -> Result<Vec<SnapshotRow>> {
        let mut stmt = conn.prepare(
            "SELECT id, name, payload, session_id, source, created_at
               FROM context_snapshots WHERE name = ?1 ORDER BY id DESC LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![name, limit.max(1)], |row| {
                Ok(SnapshotRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    payload: row.get(2)?,
                    session_id: row.get(3)?,
                    source: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
