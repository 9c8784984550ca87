//! User-facing notices.
//!
//! A notice is the transient message shown after an operation finishes.
//! Titles and descriptions are derived from results, never built ad hoc at
//! call sites.

use crate::errors::AttendanceError;
use crate::generator::CurrentSession;
use crate::reconciler::{CheckIn, CheckInKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeSeverity {
    Info,
    Success,
    Destructive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub description: String,
    pub severity: NoticeSeverity,
}

impl Notice {
    /// Notice for a freshly generated session.
    #[must_use]
    pub fn session_generated(current: &CurrentSession) -> Self {
        Self {
            title: "QR Code Generated".to_string(),
            description: format!(
                "Students can now scan to mark attendance for {}",
                current.session().class_name
            ),
            severity: NoticeSeverity::Success,
        }
    }

    /// Notice for a finished check-in.
    #[must_use]
    pub fn check_in(check_in: &CheckIn) -> Self {
        match check_in.kind {
            CheckInKind::MarkedPresent => Self {
                title: "Attendance Marked!".to_string(),
                description: check_in.message(),
                severity: NoticeSeverity::Success,
            },
            CheckInKind::AlreadyCheckedIn => Self {
                title: "Already Checked In".to_string(),
                description: check_in.message(),
                severity: NoticeSeverity::Info,
            },
        }
    }
}

impl From<&AttendanceError> for Notice {
    fn from(err: &AttendanceError) -> Self {
        Self {
            title: err.title().to_string(),
            description: err.client_message(),
            severity: NoticeSeverity::Destructive,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::codec::FormatError;
    use common::types::UserId;

    fn check_in(kind: CheckInKind) -> CheckIn {
        CheckIn {
            user_id: UserId::new(),
            session_code: "ATTEND-CS201-Ab12Cd-1".parse().unwrap(),
            class_name: "CS201".to_string(),
            kind,
        }
    }

    #[test]
    fn test_marked_present_notice() {
        let notice = Notice::check_in(&check_in(CheckInKind::MarkedPresent));
        assert_eq!(notice.title, "Attendance Marked!");
        assert_eq!(notice.description, "Successfully checked in for CS201");
        assert_eq!(notice.severity, NoticeSeverity::Success);
    }

    #[test]
    fn test_already_checked_in_notice_is_distinct() {
        let notice = Notice::check_in(&check_in(CheckInKind::AlreadyCheckedIn));
        assert_eq!(notice.title, "Already Checked In");
        assert_eq!(notice.description, "You have already checked in for CS201");
        assert_eq!(notice.severity, NoticeSeverity::Info);
    }

    #[test]
    fn test_error_notice_is_destructive() {
        let err = AttendanceError::Format(FormatError::MissingPrefix);
        let notice = Notice::from(&err);
        assert_eq!(notice.title, "Invalid QR Code");
        assert_eq!(
            notice.description,
            "This QR code is not a valid attendance code."
        );
        assert_eq!(notice.severity, NoticeSeverity::Destructive);
    }

    #[test]
    fn test_camera_error_notice() {
        let notice = Notice::from(&AttendanceError::CameraAccess("NotAllowedError".into()));
        assert_eq!(notice.title, "Camera Error");
        assert!(!notice.description.contains("NotAllowedError"));
    }
}
