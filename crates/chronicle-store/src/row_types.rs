//! Database row types for mapping between `SQLite` rows and Rust structs.
//!
//! These represent the raw database row shape — serialized JSON columns stay
//! `String` here. Conversion to domain types (capture lists, typed context
//! documents) happens in the layers above.

use serde::{Deserialize, Serialize};

/// Raw session row from the `sessions` table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionRow {
    /// Session ID (`PS-{YYYY-MM-DD}-{NNN}`).
    pub id: String,
    /// Session type (canonical lower-case).
    pub session_type: String,
    /// Session title.
    pub title: String,
    /// Sprint/grouping tag.
    pub sprint_id: Option<String>,
    /// Start timestamp.
    pub started_at: String,
    /// Completion timestamp (null while active).
    pub completed_at: Option<String>,
    /// Owning agent.
    pub agent: String,
    /// Lifecycle status (`active` | `completed`).
    pub status: String,
    /// Capture sequence as a JSON array string.
    pub captures: String,
    /// Next-step notes as a JSON array string.
    pub next_steps: Option<String>,
    /// Closing summary.
    pub summary: Option<String>,
    /// Opaque metadata as a JSON object string.
    pub metadata: Option<String>,
}

impl SessionRow {
    /// Effective timestamp for ordering: completion time, falling back to
    /// start time while no completion stamp exists.
    pub fn effective_timestamp(&self) -> &str {
        self.completed_at.as_deref().unwrap_or(&self.started_at)
    }
}

/// Raw audit-log row from the `session_events` table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventRow {
    /// Rowid of the event (assigned by the store).
    pub id: i64,
    /// Event timestamp.
    pub ts: String,
    /// Acting agent.
    pub agent: String,
    /// Session the event belongs to.
    pub session_id: String,
    /// Action kind (`start` | `capture` | `complete`).
    pub action: String,
    /// Resulting session status.
    pub status: String,
    /// Short human summary.
    pub summary: Option<String>,
    /// Optional hint (sprint tag, capture context, joined next steps).
    pub next_hint: Option<String>,
    /// Full serialized event payload.
    pub raw_event: String,
}

/// Raw context-document row from the `contexts` table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContextRow {
    /// Document name (`project_context` | `master_context`).
    pub name: String,
    /// Serialized document payload.
    pub payload: String,
    /// Session that last touched the document.
    pub session_id: Option<String>,
    /// Last write timestamp.
    pub updated_at: String,
}

/// Raw snapshot row from the `context_snapshots` table.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SnapshotRow {
    /// Snapshot rowid.
    pub id: i64,
    /// Document name the snapshot belongs to.
    pub name: String,
    /// Serialized payload at snapshot time.
    pub payload: String,
    /// Session that triggered the write.
    pub session_id: Option<String>,
    /// Label identifying what triggered the snapshot.
    pub source: Option<String>,
    /// Snapshot timestamp.
    pub created_at: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
