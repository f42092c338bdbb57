//! Schema health checks.
//!
//! A cheap preflight used before lifecycle operations: verifies the required
//! tables exist and the schema version is current. Does not validate row
//! contents.

use rusqlite::Connection;

use crate::errors::Result;
use crate::migrations::{current_version, latest_version};

/// Tables the ledger cannot operate without.
const REQUIRED_TABLES: [&str; 4] = ["sessions", "session_events", "contexts", "context_snapshots"];

/// Outcome of a health check.
#[derive(Debug)]
pub struct HealthReport {
    /// Whether the schema is usable.
    pub ok: bool,
    /// Human-readable diagnostic when not ok.
    pub message: Option<String>,
    /// Applied schema version.
    pub schema_version: u32,
}

/// Verify the schema is present and current.
pub fn check(conn: &Connection) -> Result<HealthReport> {
    for table in REQUIRED_TABLES {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            rusqlite::params![table],
            |row| row.get(0),
        )?;
        if !exists {
            return Ok(HealthReport {
                ok: false,
                message: Some(format!("missing table: {table}")),
                schema_version: 0,
            });
        }
    }

    let version = current_version(conn)?;
    if version < latest_version() {
        return Ok(HealthReport {
            ok: false,
            message: Some(format!(
                "schema version {version} behind latest {}",
                latest_version()
            )),
            schema_version: version,
        });
    }

    Ok(HealthReport {
        ok: true,
        message: None,
        schema_version: version,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
