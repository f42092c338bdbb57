//! Historical aggregate view reconstruction.
//!
//! [`build`] replays completed sessions from the store — and ONLY the
//! store's session rows, never the live context documents — so a view as of
//! any past point is reproducible regardless of projection staleness.
//!
//! `as_of` accepts either a timestamp or a session identifier. Resolving an
//! identifier pins the cut to that session's effective timestamp, and any
//! other session sharing that exact timestamp whose ID sorts after the
//! reference is excluded, making the cut deterministic under ties.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use chronicle_core::time::normalize_timestamp;
use chronicle_store::repositories::session::SessionRepo;

use crate::aggregate::{Aggregates, SessionDigest, SessionRecord, SprintTally, fold_sessions};
use crate::errors::{Result, ViewError};

/// Fetch ceiling on completed sessions considered per reconstruction.
pub const SESSION_FETCH_LIMIT: i64 = 250;

/// Prefix marking an `as_of` value as a session identifier.
const SESSION_ID_MARKER: &str = "PS-";

/// Filter parameters for view reconstruction.
#[derive(Clone, Debug)]
pub struct ViewFilters {
    /// Cut point: a timestamp or a session ID. `None` means "now".
    pub as_of: Option<String>,
    /// Keep only sessions whose metadata declares this domain.
    pub domain: Option<String>,
    /// Cap on the recent-sessions list in the output.
    pub recent_limit: usize,
}

impl Default for ViewFilters {
    fn default() -> Self {
        Self {
            as_of: None,
            domain: None,
            recent_limit: 10,
        }
    }
}

/// Parameters echoed back in the reconstructed view.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ViewParameters {
    /// The resolved cut timestamp (or last activity when unbounded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub as_of: Option<String>,
    /// The active domain filter, or `all`.
    pub domain: String,
    /// The recent-sessions cap that was applied.
    pub recent_limit: usize,
    /// Number of sessions that survived filtering.
    pub sessions_considered: usize,
}

/// Activity metrics derived from the folded sessions.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActivityMetrics {
    /// Sessions folded into the view.
    pub session_count: usize,
    /// Distinct explicit sprint tags seen.
    pub sprint_count: u64,
    /// Effective timestamp of the most recent folded session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<String>,
}

/// Aggregated insight totals.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AggregatedInsights {
    /// Total decision entries.
    pub total_decisions: usize,
    /// Total learning entries.
    pub total_learnings: usize,
    /// Total deduplicated constraints.
    pub total_constraints: usize,
    /// Capture counts per category.
    pub capture_totals: BTreeMap<String, u64>,
    /// Per-sprint tallies.
    pub by_sprint: BTreeMap<String, SprintTally>,
}

/// A reconstructed aggregate view.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AggregateView {
    /// Echo of the filters that produced this view.
    pub view_parameters: ViewParameters,
    /// Activity metrics.
    pub activity: ActivityMetrics,
    /// Insight totals.
    pub aggregated_insights: AggregatedInsights,
    /// Session-referenced decisions, in fold order.
    pub decisions_made: Vec<String>,
    /// Session-referenced learnings, in fold order.
    pub learnings: Vec<String>,
    /// Deduplicated constraints.
    pub constraints: Vec<String>,
    /// Context notes, verbatim.
    pub context_notes: Vec<String>,
    /// Session digests, most recent first, capped at `recent_limit`.
    pub recent_sessions: Vec<SessionDigest>,
    /// Pending next steps (`"{id}: {note}"`).
    pub pending_next_steps: Vec<String>,
}

/// A resolved `as_of` cut point.
struct ResolvedAsOf {
    timestamp: String,
    session_id: Option<String>,
}

/// Build an aggregate view from completed sessions.
pub fn build(conn: &Connection, filters: &ViewFilters) -> Result<AggregateView> {
    let resolved = match filters.as_of.as_deref() {
        Some(raw) => Some(resolve_as_of(conn, raw)?),
        None => None,
    };
    let as_of_ts = resolved.as_ref().map(|r| r.timestamp.clone());
    let domain = filters
        .domain
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let rows = SessionRepo::completed_ascending(conn, as_of_ts.as_deref(), SESSION_FETCH_LIMIT)?;
    let records: Vec<SessionRecord> = rows
        .iter()
        .map(SessionRecord::from_row)
        .filter(|rec| survives_filters(rec, domain, resolved.as_ref()))
        .collect();
    debug!(
        fetched = rows.len(),
        considered = records.len(),
        "reconstructing aggregate view"
    );

    let aggregates = fold_sessions(&records);
    let recent_limit = filters.recent_limit.max(1);
    Ok(assemble(aggregates, &records, as_of_ts, domain, recent_limit))
}

fn assemble(
    aggregates: Aggregates,
    records: &[SessionRecord],
    as_of_ts: Option<String>,
    domain: Option<&str>,
    recent_limit: usize,
) -> AggregateView {
    let Aggregates {
        decisions,
        learnings,
        constraints,
        context_notes,
        next_steps,
        capture_totals,
        by_sprint,
        recent_sessions,
        last_activity,
        sprint_count,
    } = aggregates;

    AggregateView {
        view_parameters: ViewParameters {
            as_of: as_of_ts.or_else(|| last_activity.clone()),
            domain: domain.unwrap_or("all").to_string(),
            recent_limit,
            sessions_considered: records.len(),
        },
        activity: ActivityMetrics {
            session_count: records.len(),
            sprint_count,
            last_activity,
        },
        aggregated_insights: AggregatedInsights {
            total_decisions: decisions.len(),
            total_learnings: learnings.len(),
            total_constraints: constraints.len(),
            capture_totals,
            by_sprint,
        },
        decisions_made: decisions,
        learnings,
        constraints,
        context_notes,
        recent_sessions: recent_sessions.into_iter().take(recent_limit).collect(),
        pending_next_steps: next_steps,
    }
}

/// Domain filter plus the same-timestamp ID tie-break.
fn survives_filters(
    record: &SessionRecord,
    domain: Option<&str>,
    resolved: Option<&ResolvedAsOf>,
) -> bool {
    if let Some(wanted) = domain {
        // Sessions with no declared domain are excluded while filtering.
        match record.domain.as_deref() {
            Some(declared) if declared.to_lowercase() == wanted.to_lowercase() => {}
            _ => return false,
        }
    }

    if let Some(resolved) = resolved {
        if let Some(ref_id) = resolved.session_id.as_deref() {
            if record.effective_timestamp() == resolved.timestamp && record.id.as_str() > ref_id {
                return false;
            }
        }
    }

    true
}

/// Resolve an `as_of` value to a concrete cut point.
fn resolve_as_of(conn: &Connection, raw: &str) -> Result<ResolvedAsOf> {
    let candidate = raw.trim();
    if candidate.is_empty() {
        return Err(ViewError::InvalidTimestamp(raw.to_string()));
    }

    if candidate
        .to_ascii_uppercase()
        .starts_with(SESSION_ID_MARKER)
    {
        let timestamp = SessionRepo::effective_timestamp(conn, candidate)?
            .ok_or_else(|| ViewError::UnknownSession(candidate.to_string()))?;
        return Ok(ResolvedAsOf {
            timestamp,
            session_id: Some(candidate.to_string()),
        });
    }

    let timestamp = normalize_timestamp(candidate)
        .ok_or_else(|| ViewError::InvalidTimestamp(candidate.to_string()))?;
    Ok(ResolvedAsOf {
        timestamp,
        session_id: None,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
