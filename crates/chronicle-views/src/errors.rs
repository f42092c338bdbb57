//! Error types for view construction and export.

use thiserror::Error;

use chronicle_store::StoreError;

/// Errors that can occur while building or exporting an aggregate view.
#[derive(Debug, Error)]
pub enum ViewError {
    /// The storage layer failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// An `as_of` session ID did not resolve to a known session.
    #[error("session {0} not found for as_of filter")]
    UnknownSession(String),

    /// An `as_of` value was neither a session ID nor a parseable timestamp.
    #[error("invalid timestamp '{0}'; use ISO-8601 or a session ID")]
    InvalidTimestamp(String),

    /// The requested export format is not supported.
    #[error("unsupported export format '{0}'")]
    UnsupportedFormat(String),

    /// YAML serialization failed.
    #[error("yaml export failed: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization failed.
    #[error("json export failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for ViewError {
    fn from(source: rusqlite::Error) -> Self {
        ViewError::Store(StoreError::from(source))
    }
}

/// Convenience type alias for view results.
pub type Result<T> = std::result::Result<T, ViewError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
