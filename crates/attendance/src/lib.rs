//! Attendance QR Session Library
//!
//! Core of the campus attendance flow: an owner generates a short-lived,
//! class-bound session code that is rendered as a QR image, and participants
//! scan it to record exactly one attendance row per (user, session).
//!
//! # Architecture
//!
//! ```text
//! SessionGenerator (owner side)
//! ├── validates the class name
//! ├── asks the backend to create the session (one call)
//! └── owns the CountdownHandle for the active code
//!     └── CountdownActor (1s ticks, expires exactly once)
//!
//! ScanReconcilerActor (participant side)
//! ├── owns the Camera and its frame stream
//! ├── decodes the first code it sees (codec)
//! └── reconciles it with the backend into Success / Error
//! ```
//!
//! The backend is the source of truth for expiry and for the
//! one-record-per-user uniqueness constraint; the client only mirrors
//! them for display.
//!
//! # Modules
//!
//! - [`codec`] - `ATTEND-` session code encode/decode
//! - [`countdown`] - Countdown actor for the active code
//! - [`generator`] - Owner-side session generation
//! - [`reconciler`] - Participant-side scan state machine
//! - [`backend`] - Backend trait and HTTP binding
//! - [`camera`] - Camera capture seam
//! - [`auth`] - Signed-in identity
//! - [`config`] - Configuration from environment
//! - [`errors`] - Error taxonomy with client-safe messages

pub mod auth;
pub mod backend;
pub mod camera;
pub mod codec;
pub mod config;
pub mod countdown;
pub mod errors;
pub mod generator;
pub mod models;
pub mod notice;
pub mod observability;
pub mod reconciler;

pub use auth::{AuthContext, Identity};
pub use backend::{AttendanceBackend, BackendError, RecordOutcome};
pub use codec::{SessionCode, SessionToken};
pub use errors::AttendanceError;
pub use models::{AttendanceRecord, AttendanceSession, AttendanceStatus};
