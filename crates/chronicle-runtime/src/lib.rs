//! # chronicle-runtime
//!
//! The session lifecycle engine and context projection updater.
//!
//! - **[`runtime`]**: the state machine (`none → active → completed`) and
//!   the transactional write path for start/capture/complete
//! - **[`projection`]**: delta application onto the project and master
//!   context documents, including the master aggregation/dedup rules
//! - **[`document`]**: typed context trees with bounded-list helpers and
//!   deterministic health recomputation
//! - **[`errors`]**: the tagged validation | conflict | store error type
//! - **[`config`]**: staleness threshold and bounded-list caps

#![deny(unsafe_code)]

pub mod config;
pub mod document;
pub mod errors;
pub mod projection;
pub mod runtime;

pub use config::RuntimeConfig;
pub use document::{
    ActiveSession, ContextHealth, HistoryEntry, MASTER_CONTEXT, MasterContext, PROJECT_CONTEXT,
    ProjectContext, RecentSessionEntry, WorkingMemory,
};
pub use errors::{ConflictKind, ErrorKind, Result, RuntimeError};
pub use runtime::{CaptureOptions, CompleteOptions, SessionRuntime, StartOptions};
