//! # chronicle-core
//!
//! Domain types and input validation for the Chronicle session ledger.
//!
//! - **Closed enums**: session types, capture categories, statuses and
//!   lifecycle actions with exact serde renames
//! - **Validator**: pure normalization/rejection functions — no state,
//!   no side effects
//! - **Time helpers**: canonical UTC second-precision timestamps

#![deny(unsafe_code)]

pub mod time;
pub mod types;
pub mod validate;

pub use types::{Capture, CaptureCategory, SessionAction, SessionStatus, SessionType};
pub use validate::{
    MAX_CAPTURE_LENGTH, MAX_NEXT_STEP_LENGTH, ValidationError, detect_stale_session,
    normalize_capture_category, normalize_capture_content, normalize_next_steps,
    normalize_session_type, normalize_summary, normalize_title,
};
