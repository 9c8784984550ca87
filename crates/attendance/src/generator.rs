//! Owner-side session generation.
//!
//! The generator turns a class name into an active session: it checks the
//! owner is signed in, validates the name, asks the backend to create the
//! session, validates the code the backend issued, and starts a countdown
//! for it. Generating again replaces the current session and cancels its
//! countdown. A failed attempt leaves the current session untouched.

use crate::auth::AuthContext;
use crate::backend::{bounded, AttendanceBackend, CreatedSession};
use crate::codec::{SessionCode, MAX_CLASS_SLUG_LENGTH};
use crate::countdown::{CountdownHandle, DEFAULT_COUNTDOWN_SECONDS};
use crate::errors::{AttendanceError, ClassNameViolation};
use crate::models::{AttendanceRecord, AttendanceSession};
use crate::observability::metrics;
use common::types::UserId;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Maximum class name length accepted from the owner.
pub const MAX_CLASS_NAME_LENGTH: usize = MAX_CLASS_SLUG_LENGTH;

/// Default bound on a single backend call.
pub const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_secs(15);

/// Generator settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorSettings {
    pub session_duration_seconds: u32,
    pub backend_timeout: Duration,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            session_duration_seconds: DEFAULT_COUNTDOWN_SECONDS,
            backend_timeout: DEFAULT_BACKEND_TIMEOUT,
        }
    }
}

/// Validate and trim an owner-supplied class name.
///
/// Accepts ASCII letters, digits, spaces, `-` and `_`, at most
/// [`MAX_CLASS_NAME_LENGTH`] characters after trimming.
///
/// # Errors
///
/// Returns the first [`ClassNameViolation`] found.
pub fn validate_class_name(raw: &str) -> Result<&str, ClassNameViolation> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ClassNameViolation::Required);
    }
    if trimmed.chars().count() > MAX_CLASS_NAME_LENGTH {
        return Err(ClassNameViolation::TooLong {
            max: MAX_CLASS_NAME_LENGTH,
        });
    }
    if let Some(bad) = trimmed
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_')))
    {
        return Err(ClassNameViolation::InvalidCharacter(bad));
    }
    Ok(trimmed)
}

/// The session currently on display, with its countdown.
#[derive(Debug)]
pub struct CurrentSession {
    session: AttendanceSession,
    countdown: CountdownHandle,
}

impl CurrentSession {
    #[must_use]
    pub fn session(&self) -> &AttendanceSession {
        &self.session
    }

    #[must_use]
    pub fn code(&self) -> &SessionCode {
        &self.session.session_code
    }

    #[must_use]
    pub fn countdown(&self) -> &CountdownHandle {
        &self.countdown
    }

    pub fn countdown_mut(&mut self) -> &mut CountdownHandle {
        &mut self.countdown
    }

    /// Active until the countdown expires.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.session.is_active && !self.countdown.is_expired()
    }
}

/// Owner-side session generator.
pub struct SessionGenerator {
    backend: Arc<dyn AttendanceBackend>,
    auth: AuthContext,
    settings: GeneratorSettings,
    current: Option<CurrentSession>,
}

impl SessionGenerator {
    #[must_use]
    pub fn new(
        backend: Arc<dyn AttendanceBackend>,
        auth: AuthContext,
        settings: GeneratorSettings,
    ) -> Self {
        Self {
            backend,
            auth,
            settings,
            current: None,
        }
    }

    /// Create a new session for `class_name` and make it current.
    ///
    /// Exactly one backend call is made when the owner is signed in and the
    /// name is valid; none otherwise.
    ///
    /// # Errors
    ///
    /// - `NotAuthenticated` - nobody signed in, or the backend refused the token
    /// - `Validation` - class name empty, too long, or with invalid characters
    /// - `GenerationFailed` - backend failed, timed out, or issued an unusable session
    #[instrument(skip_all, name = "attendance.generator.generate")]
    pub async fn generate(&mut self, class_name: &str) -> Result<&CurrentSession, AttendanceError> {
        match self.try_generate(class_name).await {
            Ok(current) => {
                metrics::record_session_generated("success");
                info!(
                    target: "attendance.generator",
                    session_code = %current.session.session_code,
                    expires_at = %current.session.expires_at,
                    "Attendance session generated"
                );
                if let Some(previous) = self.current.take() {
                    debug!(
                        target: "attendance.generator",
                        session_code = %previous.session.session_code,
                        "Replaced previous session"
                    );
                    previous.countdown.cancel();
                }
                Ok(self.current.insert(current))
            }
            Err(e) => {
                metrics::record_session_generated(e.error_code());
                warn!(
                    target: "attendance.generator",
                    error_code = e.error_code(),
                    error = %e,
                    "Attendance session generation failed"
                );
                Err(e)
            }
        }
    }

    async fn try_generate(&self, class_name: &str) -> Result<CurrentSession, AttendanceError> {
        let owner = self.auth.require()?;
        let class_name = validate_class_name(class_name)?;

        let duration = Duration::from_secs(u64::from(self.settings.session_duration_seconds));
        let created = bounded(
            "create_attendance_session",
            self.settings.backend_timeout,
            self.backend
                .create_attendance_session(&owner, class_name, duration),
        )
        .await
        .map_err(AttendanceError::from_generation_backend)?;

        let session = accept_created_session(created, owner.user_id(), duration)?;
        let countdown = CountdownHandle::start(
            session.session_code.clone(),
            self.settings.session_duration_seconds,
        );
        Ok(CurrentSession { session, countdown })
    }

    /// The current session, if one has been generated.
    #[must_use]
    pub fn current(&self) -> Option<&CurrentSession> {
        self.current.as_ref()
    }

    pub fn current_mut(&mut self) -> Option<&mut CurrentSession> {
        self.current.as_mut()
    }

    /// Whether there is a session whose countdown has not run out.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.current.as_ref().is_some_and(CurrentSession::is_active)
    }

    /// Drop the current session and cancel its countdown.
    pub fn clear(&mut self) {
        if let Some(previous) = self.current.take() {
            previous.countdown.cancel();
        }
    }

    /// Records checked in to the current session, oldest first.
    ///
    /// Empty when no session has been generated.
    ///
    /// # Errors
    ///
    /// - `NotAuthenticated` - nobody signed in, or the backend refused the token
    /// - `Backend` - the backend call failed or was rejected
    #[instrument(skip_all, name = "attendance.generator.roster")]
    pub async fn roster(&self) -> Result<Vec<AttendanceRecord>, AttendanceError> {
        let owner = self.auth.require()?;
        let Some(current) = &self.current else {
            return Ok(Vec::new());
        };

        bounded(
            "list_session_records",
            self.settings.backend_timeout,
            self.backend.list_session_records(&owner, current.code()),
        )
        .await
        .map_err(AttendanceError::from_roster_backend)
    }
}

fn accept_created_session(
    created: CreatedSession,
    owner_id: UserId,
    duration: Duration,
) -> Result<AttendanceSession, AttendanceError> {
    let session_code: SessionCode = created.session_code.parse().map_err(|e| {
        error!(target: "attendance.generator", error = %e, "Backend issued a malformed session code");
        AttendanceError::GenerationFailed(format!("backend issued a malformed session code: {e}"))
    })?;

    if created.owner_id != owner_id {
        error!(target: "attendance.generator", "Backend issued a session owned by another user");
        return Err(AttendanceError::GenerationFailed(
            "session owner does not match the signed-in user".into(),
        ));
    }

    if created.expires_at <= created.created_at {
        return Err(AttendanceError::GenerationFailed(
            "session expires before it is created".into(),
        ));
    }

    let window = (created.expires_at - created.created_at).to_std().ok();
    if window != Some(duration) {
        warn!(
            target: "attendance.generator",
            requested_secs = duration.as_secs(),
            issued_secs = window.map(|w| w.as_secs()),
            "Backend issued a different validity window than requested"
        );
    }

    Ok(AttendanceSession {
        session_code,
        class_name: created.class_name,
        owner_id: created.owner_id,
        created_at: created.created_at,
        expires_at: created.expires_at,
        is_active: true,
    })
}
