//! In-memory attendance backend.
//!
//! Behaves like the real backend for the parts the client depends on:
//! - issues `ATTEND-` codes through the codec
//! - enforces the session window against its own clock
//! - check-and-insert under one lock, so at most one record exists per
//!   (user, session)
//!
//! The clock can be moved forward independently of tokio time, which lets
//! tests expire a session on the "server" while the local countdown is
//! still running.
//!
//! # Example
//!
//! ```rust,ignore
//! let backend = InMemoryBackend::new();
//! let code = backend.seed_session(TEST_OWNER, "CS201");
//! backend.advance_clock(chrono::Duration::seconds(301));
//! // validate_and_record_attendance now returns Expired
//! ```

use attendance::backend::{AttendanceBackend, BackendError, CreatedSession, RecordOutcome};
use attendance::codec::{SessionCode, SessionToken};
use attendance::{AttendanceRecord, AttendanceStatus, Identity};
use chrono::{DateTime, Utc};
use common::types::UserId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Rejection message for unknown codes.
pub const UNKNOWN_CODE_MESSAGE: &str = "This attendance code does not exist";

/// Rejection message for closed sessions.
pub const CLOSED_SESSION_MESSAGE: &str = "This attendance session is closed";

/// Rejection message for expired sessions.
pub const EXPIRED_MESSAGE: &str = "This attendance code has expired";

#[derive(Debug, Clone)]
enum Mode {
    Normal,
    /// Every call waits forever.
    Hanging,
    /// Session creation fails with this error.
    FailingCreates(BackendError),
    /// Session creation returns this code text instead of a real one.
    IssuingCode(String),
    /// Roster reads fail with this error.
    FailingLists(BackendError),
}

#[derive(Debug, Clone)]
struct StoredSession {
    class_name: String,
    owner_id: UserId,
    expires_at: DateTime<Utc>,
    is_active: bool,
}

#[derive(Debug, Default)]
struct BackendState {
    sessions: HashMap<String, StoredSession>,
    records: Vec<AttendanceRecord>,
    clock_offset: chrono::Duration,
}

/// In-memory backend for tests.
#[derive(Debug)]
pub struct InMemoryBackend {
    mode: Mode,
    state: Mutex<BackendState>,
    create_calls: AtomicUsize,
    validate_calls: AtomicUsize,
    find_calls: AtomicUsize,
    list_calls: AtomicUsize,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    /// Create a backend that behaves normally.
    pub fn new() -> Self {
        Self::with_mode(Mode::Normal)
    }

    /// Create a backend where every call hangs.
    pub fn hanging() -> Self {
        Self::with_mode(Mode::Hanging)
    }

    /// Create a backend whose session creation fails with `error`.
    pub fn failing_creates(error: BackendError) -> Self {
        Self::with_mode(Mode::FailingCreates(error))
    }

    /// Create a backend whose roster reads fail with `error`.
    pub fn failing_lists(error: BackendError) -> Self {
        Self::with_mode(Mode::FailingLists(error))
    }

    /// Create a backend that issues `code` verbatim on session creation.
    pub fn issuing_code(code: &str) -> Self {
        Self::with_mode(Mode::IssuingCode(code.to_string()))
    }

    fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            state: Mutex::new(BackendState::default()),
            create_calls: AtomicUsize::new(0),
            validate_calls: AtomicUsize::new(0),
            find_calls: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
        }
    }

    /// Backend clock.
    pub fn now(&self) -> DateTime<Utc> {
        Utc::now() + self.state.lock().unwrap().clock_offset
    }

    /// Move the backend clock forward.
    pub fn advance_clock(&self, by: chrono::Duration) {
        self.state.lock().unwrap().clock_offset += by;
    }

    /// Create a session directly, without counting a backend call.
    pub fn seed_session(&self, owner_id: UserId, class_name: &str) -> SessionCode {
        self.insert_session(owner_id, class_name, Duration::from_secs(300))
            .session_code
            .parse()
            .expect("seeded code should parse")
    }

    /// Close a session so further scans are rejected.
    pub fn close_session(&self, code: &SessionCode) {
        if let Some(session) = self.state.lock().unwrap().sessions.get_mut(code.as_str()) {
            session.is_active = false;
        }
    }

    /// Snapshot of all records.
    pub fn records(&self) -> Vec<AttendanceRecord> {
        self.state.lock().unwrap().records.clone()
    }

    /// Number of records for `code`.
    pub fn record_count(&self, code: &SessionCode) -> usize {
        self.state
            .lock()
            .unwrap()
            .records
            .iter()
            .filter(|r| &r.session_code == code)
            .count()
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn validate_calls(&self) -> usize {
        self.validate_calls.load(Ordering::SeqCst)
    }

    pub fn find_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Total calls across all operations.
    pub fn total_calls(&self) -> usize {
        self.create_calls() + self.validate_calls() + self.find_calls() + self.list_calls()
    }

    fn insert_session(
        &self,
        owner_id: UserId,
        class_name: &str,
        duration: Duration,
    ) -> CreatedSession {
        let created_at = self.now();
        let expires_at = created_at
            + chrono::Duration::from_std(duration).expect("duration should fit chrono");
        let session_code = SessionToken::issue(class_name, created_at)
            .and_then(|token| token.encode())
            .expect("test class name should encode")
            .to_string();

        self.state.lock().unwrap().sessions.insert(
            session_code.clone(),
            StoredSession {
                class_name: class_name.to_string(),
                owner_id,
                expires_at,
                is_active: true,
            },
        );

        CreatedSession {
            session_code,
            class_name: class_name.to_string(),
            owner_id,
            created_at,
            expires_at,
        }
    }

    async fn maybe_hang(&self) {
        if matches!(self.mode, Mode::Hanging) {
            std::future::pending::<()>().await;
        }
    }
}

#[async_trait::async_trait]
impl AttendanceBackend for InMemoryBackend {
    async fn create_attendance_session(
        &self,
        owner: &Identity,
        class_name: &str,
        duration: Duration,
    ) -> Result<CreatedSession, BackendError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_hang().await;

        match &self.mode {
            Mode::FailingCreates(error) => Err(error.clone()),
            Mode::IssuingCode(code) => {
                let created_at = self.now();
                Ok(CreatedSession {
                    session_code: code.clone(),
                    class_name: class_name.to_string(),
                    owner_id: owner.user_id(),
                    created_at,
                    expires_at: created_at
                        + chrono::Duration::from_std(duration).expect("duration should fit"),
                })
            }
            Mode::Normal | Mode::Hanging | Mode::FailingLists(_) => {
                Ok(self.insert_session(owner.user_id(), class_name, duration))
            }
        }
    }

    async fn validate_and_record_attendance(
        &self,
        participant: &Identity,
        code: &SessionCode,
    ) -> Result<RecordOutcome, BackendError> {
        self.validate_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_hang().await;

        let now = self.now();
        let mut state = self.state.lock().unwrap();

        let session = state
            .sessions
            .get(code.as_str())
            .cloned()
            .ok_or_else(|| BackendError::InvalidCode(Some(UNKNOWN_CODE_MESSAGE.to_string())))?;
        if !session.is_active {
            return Err(BackendError::InvalidCode(Some(
                CLOSED_SESSION_MESSAGE.to_string(),
            )));
        }
        if now >= session.expires_at {
            return Err(BackendError::Expired(Some(EXPIRED_MESSAGE.to_string())));
        }

        let exists = state
            .records
            .iter()
            .any(|r| r.user_id == participant.user_id() && &r.session_code == code);
        if exists {
            return Ok(RecordOutcome::AlreadyRecorded {
                class_name: session.class_name,
            });
        }

        state.records.push(AttendanceRecord {
            user_id: participant.user_id(),
            session_code: code.clone(),
            class_name: session.class_name.clone(),
            status: AttendanceStatus::Present,
            checked_in_at: now,
        });
        Ok(RecordOutcome::Recorded {
            class_name: session.class_name,
        })
    }

    async fn find_record(
        &self,
        participant: &Identity,
        code: &SessionCode,
    ) -> Result<Option<AttendanceRecord>, BackendError> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_hang().await;

        Ok(self
            .state
            .lock()
            .unwrap()
            .records
            .iter()
            .find(|r| r.user_id == participant.user_id() && &r.session_code == code)
            .cloned())
    }

    async fn list_session_records(
        &self,
        owner: &Identity,
        code: &SessionCode,
    ) -> Result<Vec<AttendanceRecord>, BackendError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_hang().await;
        if let Mode::FailingLists(error) = &self.mode {
            return Err(error.clone());
        }

        let state = self.state.lock().unwrap();
        match state.sessions.get(code.as_str()) {
            Some(session) if session.owner_id != owner.user_id() => Err(
                BackendError::Unauthorized("only the session owner can list records".to_string()),
            ),
            _ => {
                let mut records: Vec<_> = state
                    .records
                    .iter()
                    .filter(|r| &r.session_code == code)
                    .cloned()
                    .collect();
                records.sort_by_key(|r| r.checked_in_at);
                Ok(records)
            }
        }
    }
}
