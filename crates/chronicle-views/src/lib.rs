//! # chronicle-views
//!
//! Historical aggregate view reconstruction for the Chronicle ledger.
//!
//! - **[`builder`]**: replay completed sessions as of a timestamp or
//!   session ID, optionally filtered by domain — independent of the live
//!   context documents, so reconstruction always works even when the
//!   projections are stale
//! - **[`aggregate`]**: the deterministic pure fold from ordered session
//!   records to insight lists, sprint tallies and digests
//! - **[`export`]**: JSON / YAML / Markdown rendering of a view

#![deny(unsafe_code)]

pub mod aggregate;
pub mod builder;
pub mod errors;
pub mod export;

pub use aggregate::{SessionDigest, SessionRecord, SprintTally, fold_sessions};
pub use builder::{
    ActivityMetrics, AggregateView, AggregatedInsights, SESSION_FETCH_LIMIT, ViewFilters,
    ViewParameters, build,
};
pub use errors::{Result, ViewError};
pub use export::{ExportFormat, export_view};
