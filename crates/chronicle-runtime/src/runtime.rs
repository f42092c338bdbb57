//! The session lifecycle engine.
//!
//! [`SessionRuntime`] owns the state machine (`none → active → completed`)
//! and the transactional write path for start/capture/complete. Each
//! operation runs in two phases:
//!
//! 1. **Transaction**: precondition checks, row mutation and the audit-log
//!    append, all inside one `SQLite` transaction — any error rolls the
//!    whole thing back.
//! 2. **Projection**: the committed effect is folded into the project and
//!    master context documents and persisted with a snapshot of the prior
//!    versions.
//!
//! A crash between the phases leaves the documents stale but the session
//! and event log authoritative; the historical view builder reconstructs
//! aggregates from the log alone, so staleness is always recoverable.

use rusqlite::Connection;
use serde_json::Value;
use tracing::{debug, info, instrument};

use chronicle_core::{
    Capture, SessionStatus, detect_stale_session, normalize_capture_category,
    normalize_capture_content, normalize_next_steps, normalize_session_type, normalize_summary,
    normalize_title,
    time::{utc_now, utc_today},
};
use chronicle_store::health::{self, HealthReport};
use chronicle_store::repositories::context::{ContextRepo, SetContextOptions};
use chronicle_store::repositories::event::{EventRepo, NewEvent};
use chronicle_store::repositories::session::{
    InsertSessionOptions, ListSessionsOptions, SessionRepo,
};
use chronicle_store::row_types::{EventRow, SessionRow};
use chronicle_store::{
    ConnectionConfig, ConnectionPool, PooledConnection, StoreError, new_file, new_in_memory,
    run_migrations,
};

use crate::config::RuntimeConfig;
use crate::document::{
    ActiveSession, HistoryEntry, MASTER_CONTEXT, MasterContext, PROJECT_CONTEXT, ProjectContext,
    RecentSessionEntry, refresh_health,
};
use crate::errors::{ConflictKind, Result, RuntimeError};

/// Prefix shared by every session identifier.
const SESSION_ID_PREFIX: &str = "PS";

/// Snapshot label for routine document writes.
const SNAPSHOT_SOURCE_DEFAULT: &str = "session_runtime";

/// Options for starting a session.
pub struct StartOptions<'a> {
    /// Session type (validated against the closed set).
    pub session_type: &'a str,
    /// Session title.
    pub title: &'a str,
    /// Owning agent.
    pub agent: &'a str,
    /// Optional sprint/grouping tag.
    pub sprint_id: Option<&'a str>,
    /// Optional opaque metadata.
    pub metadata: Option<&'a Value>,
}

/// Options for capturing an insight.
pub struct CaptureOptions<'a> {
    /// Session to capture into.
    pub session_id: &'a str,
    /// Capture category (validated against the closed set).
    pub category: &'a str,
    /// Free-text content.
    pub content: &'a str,
    /// Optional free-text annotation.
    pub context: Option<&'a str>,
    /// Acting agent.
    pub agent: &'a str,
}

/// Options for completing a session.
pub struct CompleteOptions<'a> {
    /// Session to complete.
    pub session_id: &'a str,
    /// Closing summary.
    pub summary: &'a str,
    /// Optional next-step notes.
    pub next_steps: Option<&'a [String]>,
    /// Acting agent.
    pub agent: &'a str,
}

/// The lifecycle engine and system of record for sessions.
pub struct SessionRuntime {
    pool: ConnectionPool,
    config: RuntimeConfig,
}

impl SessionRuntime {
    /// Wrap an existing pool. Assumes migrations have been run.
    pub fn new(pool: ConnectionPool, config: RuntimeConfig) -> Self {
        Self { pool, config }
    }

    /// Open (or create) a file-backed ledger and run pending migrations.
    pub fn open(path: &str, config: RuntimeConfig) -> Result<Self> {
        let pool = new_file(path, &ConnectionConfig::default())?;
        let _ = run_migrations(&*pool.get().map_err(StoreError::from)?)?;
        Ok(Self::new(pool, config))
    }

    /// Open a fresh in-memory ledger (for tests) and run migrations.
    pub fn open_in_memory(config: RuntimeConfig) -> Result<Self> {
        let pool = new_in_memory(&ConnectionConfig::default())?;
        let _ = run_migrations(&*pool.get().map_err(StoreError::from)?)?;
        Ok(Self::new(pool, config))
    }

    /// The active configuration.
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Check the backing schema is present and current.
    pub fn health(&self) -> Result<HealthReport> {
        let conn = self.conn()?;
        Ok(health::check(&conn)?)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Lifecycle operations
    // ─────────────────────────────────────────────────────────────────────

    /// Start a new session, returning its date-scoped identifier.
    ///
    /// Fails with a lifecycle conflict if any session is currently active;
    /// the conflict message distinguishes a stale blocker (idle past the
    /// configured threshold) from a fresh one.
    #[instrument(skip(self, opts), fields(session_type = opts.session_type, agent = opts.agent))]
    pub fn start_session(&self, opts: &StartOptions<'_>) -> Result<String> {
        let session_type = normalize_session_type(opts.session_type)?;
        let title = normalize_title(opts.title)?;
        let metadata = opts
            .metadata
            .map(serde_json::to_string)
            .transpose()
            .map_err(StoreError::from)?;

        let conn = self.conn()?;
        let started_at = utc_now();

        // Phase 1: the active-session precondition is checked inside the
        // same transaction that inserts the new row.
        let tx = conn.unchecked_transaction().map_err(StoreError::from)?;
        if let Some(blocking) = SessionRepo::active(&tx)? {
            return Err(self.active_session_conflict(&blocking));
        }
        let session_id = allocate_session_id(&tx)?;
        let _ = SessionRepo::insert(
            &tx,
            &InsertSessionOptions {
                id: &session_id,
                session_type: session_type.as_str(),
                title: &title,
                sprint_id: opts.sprint_id,
                started_at: &started_at,
                agent: opts.agent,
                metadata: metadata.as_deref(),
            },
        )?;
        let _ = EventRepo::append(
            &tx,
            &NewEvent {
                ts: &started_at,
                agent: opts.agent,
                session_id: &session_id,
                action: "start",
                status: "active",
                summary: Some(&title),
                next_hint: opts.sprint_id,
            },
        )?;
        tx.commit().map_err(StoreError::from)?;
        debug!(session_id = %session_id, "session started");

        // Phase 2: project the start onto both documents.
        let mut project = self.load_project(&conn)?;
        let mut master = self.load_master(&conn)?;
        project.note_started(ActiveSession {
            id: session_id.clone(),
            session_type,
            title: title.clone(),
            agent: opts.agent.to_string(),
            started_at: started_at.clone(),
            sprint_id: opts.sprint_id.map(String::from),
            captures: Vec::new(),
        });
        project.record_history(
            HistoryEntry {
                session: session_id.clone(),
                session_type: session_type.as_str().to_string(),
                agent: opts.agent.to_string(),
                summary: format!("Started {title}"),
                action: chronicle_core::SessionAction::Start,
                ts: started_at.clone(),
            },
            self.config.session_history_limit,
        );
        self.refresh_both(&mut project, &mut master, &started_at, true)?;
        self.persist_contexts(&conn, &project, &master, &session_id, None)?;

        Ok(session_id)
    }

    /// Capture an insight into an active session.
    ///
    /// Fails distinctly for a missing session versus one that exists but is
    /// no longer active. The master document's insight lists are untouched;
    /// only its health stamp moves, for observability.
    #[instrument(skip(self, opts), fields(session_id = opts.session_id, category = opts.category))]
    pub fn capture_insight(&self, opts: &CaptureOptions<'_>) -> Result<()> {
        let category = normalize_capture_category(opts.category)?;
        let content = normalize_capture_content(opts.content)?;
        let context = opts
            .context
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from);

        let capture = Capture {
            timestamp: utc_now(),
            category,
            content,
            context,
        };

        let conn = self.conn()?;
        let tx = conn.unchecked_transaction().map_err(StoreError::from)?;
        let row = SessionRepo::get_by_id(&tx, opts.session_id)?
            .ok_or_else(|| missing_session(opts.session_id))?;
        if row.status != SessionStatus::Active.as_str() {
            return Err(not_active(
                opts.session_id,
                "only active sessions accept new captures",
            ));
        }

        // Append to the stored sequence; legacy entries pass through verbatim.
        let mut stored: Vec<Value> = serde_json::from_str(&row.captures).unwrap_or_default();
        stored.push(serde_json::to_value(&capture).map_err(StoreError::from)?);
        let serialized = serde_json::to_string(&stored).map_err(StoreError::from)?;
        let _ = SessionRepo::update_captures(&tx, opts.session_id, &serialized)?;

        let summary = format!("[{}] {}", category.as_str(), capture.content);
        let _ = EventRepo::append(
            &tx,
            &NewEvent {
                ts: &capture.timestamp,
                agent: opts.agent,
                session_id: opts.session_id,
                action: "capture",
                status: "active",
                summary: Some(&summary),
                next_hint: capture.context.as_deref(),
            },
        )?;
        tx.commit().map_err(StoreError::from)?;
        debug!(session_id = %opts.session_id, category = %category, "insight captured");

        // Phase 2: mirror into the project document, stamp both healths.
        let mut project = self.load_project(&conn)?;
        let mut master = self.load_master(&conn)?;
        project.cache_capture(opts.session_id, &capture);
        project.record_history(
            HistoryEntry {
                session: opts.session_id.to_string(),
                session_type: row.session_type.clone(),
                agent: opts.agent.to_string(),
                summary: format!("Captured {category}"),
                action: chronicle_core::SessionAction::Capture,
                ts: capture.timestamp.clone(),
            },
            self.config.session_history_limit,
        );
        self.refresh_both(&mut project, &mut master, &capture.timestamp, false)?;
        self.persist_contexts(&conn, &project, &master, opts.session_id, None)?;

        Ok(())
    }

    /// Complete an active session and fold its captures into the master
    /// aggregate.
    ///
    /// Completion is terminal: the session accepts no further mutation, and
    /// it is not idempotent — confirm status with [`Self::get_session`]
    /// before retrying.
    #[instrument(skip(self, opts), fields(session_id = opts.session_id, agent = opts.agent))]
    pub fn complete_session(&self, opts: &CompleteOptions<'_>) -> Result<()> {
        let summary = normalize_summary(opts.summary)?;
        let next_steps = normalize_next_steps(opts.next_steps)?;

        let conn = self.conn()?;
        let completed_at = utc_now();

        let tx = conn.unchecked_transaction().map_err(StoreError::from)?;
        let row = SessionRepo::get_by_id(&tx, opts.session_id)?
            .ok_or_else(|| missing_session(opts.session_id))?;
        if row.status != SessionStatus::Active.as_str() {
            return Err(not_active(
                opts.session_id,
                "only active sessions can be completed",
            ));
        }
        let captures = Capture::parse_list(&row.captures);

        let next_steps_json = if next_steps.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&next_steps).map_err(StoreError::from)?)
        };
        let _ = SessionRepo::mark_completed(
            &tx,
            opts.session_id,
            &completed_at,
            &summary,
            next_steps_json.as_deref(),
        )?;

        let joined_steps = if next_steps.is_empty() {
            None
        } else {
            Some(next_steps.join("; "))
        };
        let _ = EventRepo::append(
            &tx,
            &NewEvent {
                ts: &completed_at,
                agent: opts.agent,
                session_id: opts.session_id,
                action: "complete",
                status: "completed",
                summary: Some(&summary),
                next_hint: joined_steps.as_deref(),
            },
        )?;
        tx.commit().map_err(StoreError::from)?;

        // Phase 2: clear the pointer, aggregate into master, digest into
        // both recent lists, record next steps, bump health.
        let mut project = self.load_project(&conn)?;
        let mut master = self.load_master(&conn)?;

        project.clear_active_if(opts.session_id);
        project.record_history(
            HistoryEntry {
                session: opts.session_id.to_string(),
                session_type: row.session_type.clone(),
                agent: opts.agent.to_string(),
                summary: summary.clone(),
                action: chronicle_core::SessionAction::Complete,
                ts: completed_at.clone(),
            },
            self.config.session_history_limit,
        );

        let counts =
            master.absorb_captures(opts.session_id, &captures, self.config.next_steps_limit);
        let digest = RecentSessionEntry {
            id: opts.session_id.to_string(),
            session_type: row.session_type.clone(),
            title: row.title.clone(),
            summary: summary.clone(),
            completed_at: completed_at.clone(),
            capture_count: counts.values().sum(),
            captures: counts
                .iter()
                .map(|(category, count)| (category.as_str().to_string(), *count))
                .collect(),
        };
        project.push_recent(digest.clone(), self.config.project_recent_limit);
        master.push_recent(digest, self.config.master_recent_limit);

        if !next_steps.is_empty() {
            project.record_next_steps(opts.session_id, &next_steps, self.config.next_steps_limit);
            master.record_resume_notes(opts.session_id, &next_steps, self.config.next_steps_limit);
        }

        self.refresh_both(&mut project, &mut master, &completed_at, true)?;
        let snapshot_source = format!("session_complete:{}", opts.session_id);
        self.persist_contexts(
            &conn,
            &project,
            &master,
            opts.session_id,
            Some(&snapshot_source),
        )?;

        info!(
            session_id = %opts.session_id,
            captures = captures.len(),
            "session completed"
        );
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Read surface
    // ─────────────────────────────────────────────────────────────────────

    /// Fetch one session row by ID.
    pub fn get_session(&self, session_id: &str) -> Result<Option<SessionRow>> {
        let conn = self.conn()?;
        Ok(SessionRepo::get_by_id(&conn, session_id)?)
    }

    /// List sessions, most recently started first.
    pub fn list_sessions(
        &self,
        status: Option<SessionStatus>,
        limit: Option<i64>,
    ) -> Result<Vec<SessionRow>> {
        let conn = self.conn()?;
        Ok(SessionRepo::list(
            &conn,
            &ListSessionsOptions {
                status: status.map(SessionStatus::as_str),
                limit,
            },
        )?)
    }

    /// The audit log for one session, in append order.
    pub fn session_events(&self, session_id: &str) -> Result<Vec<EventRow>> {
        let conn = self.conn()?;
        Ok(EventRepo::list_for_session(&conn, session_id)?)
    }

    /// The most recent audit-log entries across all sessions.
    pub fn recent_events(&self, limit: i64) -> Result<Vec<EventRow>> {
        let conn = self.conn()?;
        Ok(EventRepo::recent(&conn, limit)?)
    }

    /// The live project context document.
    pub fn project_context(&self) -> Result<ProjectContext> {
        let conn = self.conn()?;
        self.load_project(&conn)
    }

    /// The live master context document.
    pub fn master_context(&self) -> Result<MasterContext> {
        let conn = self.conn()?;
        self.load_master(&conn)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Internal
    // ─────────────────────────────────────────────────────────────────────

    fn conn(&self) -> Result<PooledConnection> {
        self.pool.get().map_err(|e| StoreError::from(e).into())
    }

    fn load_project(&self, conn: &Connection) -> Result<ProjectContext> {
        match ContextRepo::get(conn, PROJECT_CONTEXT)? {
            Some(value) => Ok(serde_json::from_value(value).map_err(StoreError::from)?),
            None => Ok(ProjectContext::default()),
        }
    }

    fn load_master(&self, conn: &Connection) -> Result<MasterContext> {
        match ContextRepo::get(conn, MASTER_CONTEXT)? {
            Some(value) => Ok(serde_json::from_value(value).map_err(StoreError::from)?),
            None => Ok(MasterContext::default()),
        }
    }

    fn refresh_both(
        &self,
        project: &mut ProjectContext,
        master: &mut MasterContext,
        ts: &str,
        increment_sessions: bool,
    ) -> Result<()> {
        let limit = self.config.context_size_limit_kb;
        refresh_health(project, ts, increment_sessions, limit).map_err(StoreError::from)?;
        refresh_health(master, ts, increment_sessions, limit).map_err(StoreError::from)?;
        Ok(())
    }

    fn persist_contexts(
        &self,
        conn: &Connection,
        project: &ProjectContext,
        master: &MasterContext,
        session_id: &str,
        snapshot_source: Option<&str>,
    ) -> Result<()> {
        let source = snapshot_source.unwrap_or(SNAPSHOT_SOURCE_DEFAULT);
        let updated_at = utc_now();
        let project_payload = serde_json::to_value(project).map_err(StoreError::from)?;
        let master_payload = serde_json::to_value(master).map_err(StoreError::from)?;

        ContextRepo::set(
            conn,
            &SetContextOptions {
                name: PROJECT_CONTEXT,
                payload: &project_payload,
                session_id: Some(session_id),
                updated_at: &updated_at,
                snapshot: true,
                snapshot_source: Some(source),
            },
        )?;
        ContextRepo::set(
            conn,
            &SetContextOptions {
                name: MASTER_CONTEXT,
                payload: &master_payload,
                session_id: Some(session_id),
                updated_at: &updated_at,
                snapshot: true,
                snapshot_source: Some(source),
            },
        )?;
        Ok(())
    }

    fn active_session_conflict(&self, blocking: &SessionRow) -> RuntimeError {
        let (stale, hours) = detect_stale_session(
            Some(&blocking.started_at),
            self.config.stale_threshold_hours,
        );
        if stale {
            let idle = hours.unwrap_or(self.config.stale_threshold_hours);
            RuntimeError::conflict(
                ConflictKind::AlreadyActive,
                format!(
                    "active session {} has been idle for {idle}h",
                    blocking.id
                ),
                format!(
                    "the session looks abandoned; complete {} with a wrap-up summary, or keep capturing into it",
                    blocking.id
                ),
            )
        } else {
            RuntimeError::conflict(
                ConflictKind::AlreadyActive,
                format!("active session {} already exists", blocking.id),
                format!(
                    "resume capturing into {} or complete it before starting another session",
                    blocking.id
                ),
            )
        }
    }
}

/// Allocate the next date-scoped session ID inside the current transaction.
///
/// Format: `PS-{YYYY-MM-DD}-{NNN}`. The sequence restarts each calendar day
/// and is derived by scanning the highest existing ID with today's prefix.
fn allocate_session_id(conn: &Connection) -> Result<String> {
    let prefix = format!("{SESSION_ID_PREFIX}-{}-", utc_today());
    let last = SessionRepo::latest_id_with_prefix(conn, &prefix)?;
    let last_counter = last
        .as_deref()
        .and_then(|id| id.rsplit('-').next())
        .and_then(|suffix| suffix.parse::<u32>().ok())
        .unwrap_or(0);
    Ok(format!("{prefix}{:03}", last_counter + 1))
}

fn missing_session(session_id: &str) -> RuntimeError {
    RuntimeError::conflict(
        ConflictKind::NotFound,
        format!("session {session_id} does not exist"),
        "list sessions to find a valid identifier".to_string(),
    )
}

fn not_active(session_id: &str, hint: &str) -> RuntimeError {
    RuntimeError::conflict(
        ConflictKind::NotActive,
        format!("session {session_id} is not active"),
        hint.to_string(),
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use assert_matches::assert_matches;

    fn runtime() -> SessionRuntime {
        SessionRuntime::open_in_memory(RuntimeConfig::default()).unwrap()
    }

    fn start(rt: &SessionRuntime, title: &str) -> String {
        rt.start_session(&StartOptions {
            session_type: "planning",
            title,
            agent: "assistant",
            sprint_id: None,
            metadata: None,
        })
        .unwrap()
    }

    #[test]
    fn allocated_ids_are_date_scoped_and_sequential() {
        let rt = runtime();
        let first = start(&rt, "First");
        rt.complete_session(&CompleteOptions {
            session_id: &first,
            summary: "done",
            next_steps: None,
            agent: "assistant",
        })
        .unwrap();
        let second = start(&rt, "Second");

        let prefix = format!("PS-{}-", utc_today());
        assert_eq!(first, format!("{prefix}001"));
        assert_eq!(second, format!("{prefix}002"));
    }

    #[test]
    fn start_while_active_is_a_conflict() {
        let rt = runtime();
        let id = start(&rt, "First");

        let err = rt
            .start_session(&StartOptions {
                session_type: "review",
                title: "Second",
                agent: "assistant",
                sprint_id: None,
                metadata: None,
            })
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.conflict_kind(), Some(ConflictKind::AlreadyActive));
        assert!(err.to_string().contains(&id));
        assert!(err.hint().unwrap().contains(&id));
    }

    #[test]
    fn stale_blocker_gets_idle_hours_in_message() {
        let rt = SessionRuntime::open_in_memory(RuntimeConfig {
            stale_threshold_hours: 0,
            ..RuntimeConfig::default()
        })
        .unwrap();
        let id = start(&rt, "Old work");

        let err = rt
            .start_session(&StartOptions {
                session_type: "planning",
                title: "New work",
                agent: "assistant",
                sprint_id: None,
                metadata: None,
            })
            .unwrap_err();

        assert_eq!(err.conflict_kind(), Some(ConflictKind::AlreadyActive));
        assert!(err.to_string().contains("idle for"), "got: {err}");
        assert!(err.hint().unwrap().contains(&id));
    }

    #[test]
    fn validation_failures_touch_nothing() {
        let rt = runtime();
        let id = start(&rt, "Design API");

        let err = rt
            .capture_insight(&CaptureOptions {
                session_id: &id,
                category: "idea",
                content: "Use REST",
                context: None,
                agent: "assistant",
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        // Nothing persisted: only the start event exists.
        assert_eq!(rt.session_events(&id).unwrap().len(), 1);
        let row = rt.get_session(&id).unwrap().unwrap();
        assert_eq!(row.captures, "[]");
    }

    #[test]
    fn capture_into_missing_session_is_not_found() {
        let rt = runtime();
        let err = rt
            .capture_insight(&CaptureOptions {
                session_id: "PS-2025-01-01-404",
                category: "decision",
                content: "Use REST",
                context: None,
                agent: "assistant",
            })
            .unwrap_err();
        assert_eq!(err.conflict_kind(), Some(ConflictKind::NotFound));
    }

    #[test]
    fn capture_into_completed_session_is_not_active() {
        let rt = runtime();
        let id = start(&rt, "Design API");
        rt.complete_session(&CompleteOptions {
            session_id: &id,
            summary: "done",
            next_steps: None,
            agent: "assistant",
        })
        .unwrap();

        let err = rt
            .capture_insight(&CaptureOptions {
                session_id: &id,
                category: "decision",
                content: "too late",
                context: None,
                agent: "assistant",
            })
            .unwrap_err();
        assert_eq!(err.conflict_kind(), Some(ConflictKind::NotActive));
        assert_matches!(err, RuntimeError::Conflict { .. });
    }

    #[test]
    fn complete_is_terminal() {
        let rt = runtime();
        let id = start(&rt, "Design API");
        rt.complete_session(&CompleteOptions {
            session_id: &id,
            summary: "done",
            next_steps: None,
            agent: "assistant",
        })
        .unwrap();

        let err = rt
            .complete_session(&CompleteOptions {
                session_id: &id,
                summary: "done again",
                next_steps: None,
                agent: "assistant",
            })
            .unwrap_err();
        assert_eq!(err.conflict_kind(), Some(ConflictKind::NotActive));
    }

    #[test]
    fn health_reports_migrated_schema() {
        let rt = runtime();
        let report = rt.health().unwrap();
        assert!(report.ok);
    }

    #[test]
    fn open_creates_and_migrates_a_file_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        let rt = SessionRuntime::open(path.to_str().unwrap(), RuntimeConfig::default()).unwrap();

        assert!(rt.health().unwrap().ok);
        let id = start(&rt, "File backed");
        assert!(rt.get_session(&id).unwrap().is_some());
    }
}
