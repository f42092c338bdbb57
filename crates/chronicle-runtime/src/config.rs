//! Runtime configuration.
//!
//! Every bounded list in the context documents is capped here, alongside the
//! staleness threshold. Defaults match the sizes the documents were tuned
//! for; tests shrink them to exercise eviction cheaply.

/// Tunables for the lifecycle engine and projection updater.
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    /// Hours of idleness after which an active session counts as stale.
    pub stale_threshold_hours: i64,
    /// Cap on the project document's session-history list.
    pub session_history_limit: usize,
    /// Cap on pending next-step lists (project) and resume lists (master).
    pub next_steps_limit: usize,
    /// Cap on the project document's recent-session digests.
    pub project_recent_limit: usize,
    /// Cap on the master document's recent-session digests.
    pub master_recent_limit: usize,
    /// Advisory size ceiling recorded in each document's health block (KiB).
    pub context_size_limit_kb: u32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            stale_threshold_hours: 24,
            session_history_limit: 50,
            next_steps_limit: 25,
            project_recent_limit: 25,
            master_recent_limit: 10,
            context_size_limit_kb: 100,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
