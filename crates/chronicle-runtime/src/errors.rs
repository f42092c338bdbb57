//! Error types for the lifecycle engine.
//!
//! [`RuntimeError`] is a tagged union of the three failure classes callers
//! must be able to branch on: validation failures (bad input, nothing
//! persisted, fix and retry), lifecycle conflicts (the state machine said
//! no, with a human-actionable hint), and store failures (anything the
//! storage layer threw, wrapped with one generic diagnostic). Use
//! [`RuntimeError::kind`] to branch without matching variant payloads.

use thiserror::Error;

use chronicle_core::ValidationError;
use chronicle_store::StoreError;

/// Broad error class, for branching on cause.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Input failed validation; nothing was persisted.
    Validation,
    /// A lifecycle rule was violated.
    Conflict,
    /// The storage layer failed.
    Store,
}

/// Which lifecycle rule a conflict violated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConflictKind {
    /// Another session is already active.
    AlreadyActive,
    /// The referenced session does not exist.
    NotFound,
    /// The referenced session exists but is not active.
    NotActive,
}

/// Errors surfaced by lifecycle operations.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Input failed validation before any persistence was attempted.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A lifecycle rule was violated.
    #[error("{message}")]
    Conflict {
        /// Which rule was violated.
        kind: ConflictKind,
        /// Human-readable description.
        message: String,
        /// Actionable advice for getting unstuck.
        hint: Option<String>,
    },

    /// The storage layer failed. Deliberately coarse — storage internals
    /// are not this crate's concern.
    #[error("store failure: {source}")]
    Store {
        /// The underlying storage error.
        #[source]
        source: StoreError,
        /// Generic diagnostic advice.
        hint: &'static str,
    },
}

impl RuntimeError {
    /// The broad class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RuntimeError::Validation(_) => ErrorKind::Validation,
            RuntimeError::Conflict { .. } => ErrorKind::Conflict,
            RuntimeError::Store { .. } => ErrorKind::Store,
        }
    }

    /// The actionable hint, when one exists.
    pub fn hint(&self) -> Option<&str> {
        match self {
            RuntimeError::Validation(_) => None,
            RuntimeError::Conflict { hint, .. } => hint.as_deref(),
            RuntimeError::Store { hint, .. } => Some(hint),
        }
    }

    /// The conflict rule, for conflict errors.
    pub fn conflict_kind(&self) -> Option<ConflictKind> {
        match self {
            RuntimeError::Conflict { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub(crate) fn conflict(kind: ConflictKind, message: String, hint: String) -> Self {
        RuntimeError::Conflict {
            kind,
            message,
            hint: Some(hint),
        }
    }
}

impl From<StoreError> for RuntimeError {
    fn from(source: StoreError) -> Self {
        RuntimeError::Store {
            source,
            hint: "verify the ledger database file is accessible and its schema is migrated",
        }
    }
}

impl From<rusqlite::Error> for RuntimeError {
    fn from(source: rusqlite::Error) -> Self {
        StoreError::from(source).into()
    }
}

impl From<serde_json::Error> for RuntimeError {
    fn from(source: serde_json::Error) -> Self {
        StoreError::from(source).into()
    }
}

/// Convenience type alias for lifecycle results.
pub type Result<T> = std::result::Result<T, RuntimeError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
