//! Attendance domain records.

use crate::codec::SessionCode;
use chrono::{DateTime, Utc};
use common::types::UserId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status stored on an attendance record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
}

impl AttendanceStatus {
    /// Human-readable label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "Present",
            AttendanceStatus::Absent => "Absent",
            AttendanceStatus::Late => "Late",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A session created by its owner.
///
/// `expires_at` is always after `created_at`; sessions are only built from
/// backend responses that pass that check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceSession {
    pub session_code: SessionCode,
    pub class_name: String,
    pub owner_id: UserId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
}

impl AttendanceSession {
    /// Whether the backend-issued validity window has passed at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Length of the validity window.
    #[must_use]
    pub fn validity(&self) -> chrono::Duration {
        self.expires_at - self.created_at
    }
}

/// One participant's check-in for one session.
///
/// The backend keeps at most one record per (`user_id`, `session_code`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub user_id: UserId,
    pub session_code: SessionCode,
    pub class_name: String,
    pub status: AttendanceStatus,
    pub checked_in_at: DateTime<Utc>,
}
