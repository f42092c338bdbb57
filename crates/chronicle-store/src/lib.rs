//! # chronicle-store
//!
//! `SQLite` backing store for the Chronicle session ledger.
//!
//! - **[`connection`]**: `r2d2` connection pool with WAL mode, foreign keys
//!   and busy-timeout pragmas applied to every connection
//! - **[`migrations`]**: version-tracked schema evolution, embedded at
//!   compile time and run transactionally
//! - **[`row_types`]**: raw database row structs for `rusqlite` row mapping
//! - **[`repositories`]**: stateless repository structs — each method takes
//!   `&Connection` and executes SQL; no shared mutable state
//! - **[`health`]**: schema presence/version checks
//!
//! The store persists three things: `sessions` rows, the append-only
//! `session_events` audit log, and named context documents with optional
//! prior-version snapshots. It knows nothing about lifecycle rules — that
//! is the runtime crate's job.

#![deny(unsafe_code)]

pub mod connection;
pub mod errors;
pub mod health;
pub mod migrations;
pub mod repositories;
pub mod row_types;

pub use connection::{
    ConnectionConfig, ConnectionPool, PooledConnection, PragmaState, new_file, new_in_memory,
    verify_pragmas,
};
pub use errors::{Result, StoreError};
pub use migrations::{current_version, latest_version, run_migrations};
