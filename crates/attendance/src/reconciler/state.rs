//! Scan states and check-in results.

use crate::codec::SessionCode;
use crate::errors::AttendanceError;
use crate::notice::Notice;
use common::types::UserId;

/// How a successful scan was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckInKind {
    /// A new record was written.
    MarkedPresent,
    /// The participant had already checked in; nothing was written.
    AlreadyCheckedIn,
}

impl CheckInKind {
    /// Metric label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CheckInKind::MarkedPresent => "marked_present",
            CheckInKind::AlreadyCheckedIn => "already_checked_in",
        }
    }
}

/// A successful check-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckIn {
    pub user_id: UserId,
    pub session_code: SessionCode,
    pub class_name: String,
    pub kind: CheckInKind,
}

impl CheckIn {
    #[must_use]
    pub fn already_recorded(&self) -> bool {
        self.kind == CheckInKind::AlreadyCheckedIn
    }

    /// Text shown to the participant.
    #[must_use]
    pub fn message(&self) -> String {
        match self.kind {
            CheckInKind::MarkedPresent => {
                format!("Successfully checked in for {}", self.class_name)
            }
            CheckInKind::AlreadyCheckedIn => {
                format!("You have already checked in for {}", self.class_name)
            }
        }
    }
}

/// Participant-side scan state.
///
/// ```text
/// Idle ──start──> Scanning ──code──> Processing ──> Success | Error
///   ^                │                                 │
///   └──stop/reset────┘<──────────────reset─────────────┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Scanning,
    /// A code was captured and is being reconciled; carries the raw text.
    Processing { code: String },
    Success(CheckIn),
    Error(AttendanceError),
}

impl ScanState {
    /// `Success` and `Error` are terminal until an explicit restart.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanState::Success(_) | ScanState::Error(_))
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            ScanState::Idle => "idle",
            ScanState::Scanning => "scanning",
            ScanState::Processing { .. } => "processing",
            ScanState::Success(_) => "success",
            ScanState::Error(_) => "error",
        }
    }

    /// Notice to show for a terminal state.
    #[must_use]
    pub fn notice(&self) -> Option<Notice> {
        match self {
            ScanState::Success(check_in) => Some(Notice::check_in(check_in)),
            ScanState::Error(err) => Some(Notice::from(err)),
            ScanState::Idle | ScanState::Scanning | ScanState::Processing { .. } => None,
        }
    }

    /// Outcome label for terminal states.
    pub(crate) fn outcome(&self) -> Option<&'static str> {
        match self {
            ScanState::Success(check_in) => Some(check_in.kind.as_str()),
            ScanState::Error(err) => Some(err.error_code()),
            ScanState::Idle | ScanState::Scanning | ScanState::Processing { .. } => None,
        }
    }
}
