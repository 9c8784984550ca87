//! Attendance backend.
//!
//! The backend owns session creation, code validation, and the
//! one-record-per-(user, session) constraint. [`AttendanceBackend`] is the
//! seam the generator and reconciler call through; [`http::HttpBackend`] is
//! the production binding.

pub mod http;
mod payload;

use crate::auth::Identity;
use crate::codec::SessionCode;
use crate::models::AttendanceRecord;
use crate::observability::metrics;
use chrono::{DateTime, Utc};
use common::types::UserId;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Backend call failures.
///
/// Messages may include backend detail and are for logs only.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Access token missing, expired, or rejected.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Request parameters rejected.
    #[error("validation rejected: {0}")]
    Validation(String),

    /// Session code unknown or inactive.
    #[error("invalid code")]
    InvalidCode(Option<String>),

    /// Session window has passed.
    #[error("code expired")]
    Expired(Option<String>),

    /// Any other business rejection.
    #[error("rejected: {0}")]
    Rejected(String),

    /// Network or server failure.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// Response did not match the expected shape.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Call did not complete within the configured bound.
    #[error("request timed out")]
    Timeout,
}

/// Session as returned by the backend, before client-side checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedSession {
    /// Raw code text; the generator validates it.
    pub session_code: String,
    pub class_name: String,
    pub owner_id: UserId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Result of recording a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// A new record was written.
    Recorded { class_name: String },
    /// A record for this user and session already existed; nothing written.
    AlreadyRecorded { class_name: String },
}

impl RecordOutcome {
    #[must_use]
    pub fn recorded(&self) -> bool {
        matches!(self, RecordOutcome::Recorded { .. })
    }

    #[must_use]
    pub fn already_recorded(&self) -> bool {
        matches!(self, RecordOutcome::AlreadyRecorded { .. })
    }

    #[must_use]
    pub fn class_name(&self) -> &str {
        match self {
            RecordOutcome::Recorded { class_name } | RecordOutcome::AlreadyRecorded { class_name } => {
                class_name
            }
        }
    }
}

/// Backend operations (enables mocking).
#[async_trait::async_trait]
pub trait AttendanceBackend: Send + Sync {
    /// Create a session owned by `owner` for `class_name`.
    async fn create_attendance_session(
        &self,
        owner: &Identity,
        class_name: &str,
        duration: Duration,
    ) -> Result<CreatedSession, BackendError>;

    /// Validate `code` and record attendance for `participant`.
    ///
    /// Check-and-insert is atomic on the backend; concurrent calls for the
    /// same user and code produce at most one record.
    async fn validate_and_record_attendance(
        &self,
        participant: &Identity,
        code: &SessionCode,
    ) -> Result<RecordOutcome, BackendError>;

    /// Look up an existing record for `participant` and `code`.
    async fn find_record(
        &self,
        participant: &Identity,
        code: &SessionCode,
    ) -> Result<Option<AttendanceRecord>, BackendError>;

    /// All records for `code`, oldest first. Owner only.
    async fn list_session_records(
        &self,
        owner: &Identity,
        code: &SessionCode,
    ) -> Result<Vec<AttendanceRecord>, BackendError>;
}

/// Run a backend call under `limit`, recording its latency.
pub(crate) async fn bounded<T, F>(
    operation: &'static str,
    limit: Duration,
    call: F,
) -> Result<T, BackendError>
where
    F: Future<Output = Result<T, BackendError>>,
{
    let started = Instant::now();
    let result = if let Ok(result) = tokio::time::timeout(limit, call).await {
        result
    } else {
        tracing::warn!(
            target: "attendance.backend",
            operation,
            timeout_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
            "Backend call timed out"
        );
        Err(BackendError::Timeout)
    };
    metrics::record_backend_latency(operation, started.elapsed(), result.is_ok());
    result
}
