//! Observability for the attendance flow.
//!
//! All instrumentation uses `#[instrument(skip_all)]` with explicit safe
//! fields. Access tokens and the anon key are never recorded. Metric labels
//! are bounded:
//! - `outcome`: scan outcomes and `AttendanceError::error_code()` values
//! - `operation`: the four backend operations
//! - `status`: success, error
//!
//! # Metrics
//!
//! | Metric | Type | Labels | Purpose |
//! |--------|------|--------|---------|
//! | `attendance_sessions_generated_total` | Counter | `outcome` | Session generation attempts |
//! | `attendance_scans_total` | Counter | `outcome` | Terminal scan outcomes |
//! | `attendance_countdown_expired_total` | Counter | none | Codes that ran out locally |
//! | `attendance_backend_latency_seconds` | Histogram | `operation`, `status` | Backend call latency |
//!
//! The library only emits through the `metrics` facade; the embedding
//! application decides whether to install a recorder.

pub mod metrics;
