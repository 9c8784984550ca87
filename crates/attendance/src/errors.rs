//! Attendance error types.
//!
//! Every failure the owner or participant can see is one of these variants.
//! `client_message()` is what gets shown; internal detail only goes to logs.

use crate::backend::BackendError;
use crate::codec::FormatError;
use thiserror::Error;

/// Message shown when the backend rejects a code without saying why.
pub const DEFAULT_REJECTION_MESSAGE: &str = "Invalid or expired code";

/// Why a class name was not accepted for session generation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClassNameViolation {
    #[error("Please enter a class name to generate a QR code")]
    Required,

    #[error("Class name must be at most {max} characters")]
    TooLong { max: usize },

    #[error("Class name contains an invalid character: {0:?}")]
    InvalidCharacter(char),
}

/// Attendance error type.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AttendanceError {
    /// Owner input rejected before any backend call.
    #[error("Validation failed: {0}")]
    Validation(#[from] ClassNameViolation),

    /// No signed-in identity, or its access token has expired.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Camera could not be started or its stream was lost.
    #[error("Camera access failed: {0}")]
    CameraAccess(String),

    /// Scanned text is not a session code.
    #[error("Malformed attendance code: {0}")]
    Format(#[from] FormatError),

    /// Backend says the session has expired.
    #[error("Attendance code expired")]
    Expired { reason: Option<String> },

    /// Backend rejected the code for any other reason.
    #[error("Attendance code rejected")]
    InvalidCode { reason: Option<String> },

    /// Backend unreachable, timed out, or answered with an unexpected shape.
    #[error("Backend error: {0}")]
    Backend(String),

    /// Session creation failed after input validation passed.
    #[error("Session generation failed: {0}")]
    GenerationFailed(String),
}

impl AttendanceError {
    /// Map a backend failure that happened while recording a scan.
    #[must_use]
    pub fn from_scan_backend(err: BackendError) -> Self {
        match err {
            BackendError::Unauthorized(_) => AttendanceError::NotAuthenticated,
            BackendError::Expired(reason) => AttendanceError::Expired { reason },
            BackendError::InvalidCode(reason) => AttendanceError::InvalidCode { reason },
            BackendError::Rejected(reason) | BackendError::Validation(reason) => {
                AttendanceError::InvalidCode {
                    reason: Some(reason),
                }
            }
            other @ (BackendError::Unavailable(_)
            | BackendError::MalformedResponse(_)
            | BackendError::Timeout) => AttendanceError::Backend(other.to_string()),
        }
    }

    /// Map a backend failure that happened while creating a session.
    #[must_use]
    pub fn from_generation_backend(err: BackendError) -> Self {
        match err {
            BackendError::Unauthorized(_) => AttendanceError::NotAuthenticated,
            other => AttendanceError::GenerationFailed(other.to_string()),
        }
    }

    /// Map a backend failure that happened while listing a session's records.
    #[must_use]
    pub fn from_roster_backend(err: BackendError) -> Self {
        match err {
            BackendError::Unauthorized(_) => AttendanceError::NotAuthenticated,
            other => AttendanceError::Backend(other.to_string()),
        }
    }

    /// Stable code for logs and metric labels.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            AttendanceError::Validation(_) => "validation",
            AttendanceError::NotAuthenticated => "not_authenticated",
            AttendanceError::CameraAccess(_) => "camera_access",
            AttendanceError::Format(_) => "format",
            AttendanceError::Expired { .. } => "expired",
            AttendanceError::InvalidCode { .. } => "invalid_code",
            AttendanceError::Backend(_) => "backend",
            AttendanceError::GenerationFailed(_) => "generation_failed",
        }
    }

    /// Short title for a notice.
    #[must_use]
    pub fn title(&self) -> &'static str {
        match self {
            AttendanceError::Validation(ClassNameViolation::Required) => "Class name required",
            AttendanceError::Validation(_) => "Invalid class name",
            AttendanceError::NotAuthenticated => "Sign in required",
            AttendanceError::CameraAccess(_) => "Camera Error",
            AttendanceError::Format(_) => "Invalid QR Code",
            AttendanceError::Expired { .. } => "Code Expired",
            AttendanceError::InvalidCode { .. } => "Check-in Failed",
            AttendanceError::Backend(_) => "Service Unavailable",
            AttendanceError::GenerationFailed(_) => "Generation Failed",
        }
    }

    /// Returns a client-safe error message (no internal details).
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            AttendanceError::Validation(violation) => violation.to_string(),
            AttendanceError::NotAuthenticated => "Please sign in to continue".to_string(),
            AttendanceError::CameraAccess(_) => {
                "Could not access camera. Please check permissions.".to_string()
            }
            AttendanceError::Format(_) => {
                "This QR code is not a valid attendance code.".to_string()
            }
            AttendanceError::Expired { reason } => reason
                .clone()
                .unwrap_or_else(|| "This attendance code has expired".to_string()),
            AttendanceError::InvalidCode { reason } => reason
                .clone()
                .unwrap_or_else(|| DEFAULT_REJECTION_MESSAGE.to_string()),
            AttendanceError::Backend(_) => {
                "Could not reach the attendance service. Please try again.".to_string()
            }
            AttendanceError::GenerationFailed(_) => {
                "Failed to generate QR code. Please try again.".to_string()
            }
        }
    }
}
