//! Integration tests for participant-side scan reconciliation.
//!
//! Each test spawns a `ScanReconcilerActor` with a scripted camera and the
//! in-memory backend, then observes the published scan state.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]

use attendance::backend::AttendanceBackend;
use attendance::camera::FrameScan;
use attendance::generator::{GeneratorSettings, SessionGenerator};
use attendance::codec::{FormatError, SessionCode};
use attendance::notice::NoticeSeverity;
use attendance::reconciler::{
    CheckIn, CheckInKind, ReconcilerError, ReconcilerSettings, ScanReconcilerActor,
    ScanReconcilerHandle, ScanState,
};
use attendance::{AttendanceError, AuthContext};
use attendance_test_utils::mock_backend::{
    CLOSED_SESSION_MESSAGE, EXPIRED_MESSAGE, UNKNOWN_CODE_MESSAGE,
};
use attendance_test_utils::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

fn spawn_reconciler(
    camera: ScriptedCamera,
    backend: &Arc<InMemoryBackend>,
    auth: AuthContext,
    settings: ReconcilerSettings,
) -> (ScanReconcilerHandle, JoinHandle<()>) {
    let backend: Arc<dyn AttendanceBackend> = backend.clone();
    ScanReconcilerActor::spawn(Box::new(camera), backend, auth, settings)
}

/// Start a reconciler whose camera sees `frames`, and wait for the outcome.
async fn scan_once(
    frames: Vec<FrameScan>,
    backend: &Arc<InMemoryBackend>,
    auth: AuthContext,
    settings: ReconcilerSettings,
) -> (ScanState, CameraController) {
    let (camera, controller) = ScriptedCamera::with_frames(frames);
    let (handle, _task) = spawn_reconciler(camera, backend, auth, settings);

    handle.start().await.unwrap();
    let outcome = handle.wait_for_outcome().await.unwrap();
    (outcome, controller)
}

fn code_frame(code: &SessionCode) -> FrameScan {
    FrameScan::Code(code.to_string())
}

fn no_precheck() -> ReconcilerSettings {
    ReconcilerSettings {
        precheck_existing: false,
        ..ReconcilerSettings::default()
    }
}

// ============================================================================
// Successful check-in
// ============================================================================

#[tokio::test]
async fn test_scan_marks_participant_present() {
    let backend = Arc::new(InMemoryBackend::new());
    let code = backend.seed_session(TEST_OWNER, TEST_CLASS_NAME);

    let (outcome, controller) = scan_once(
        vec![FrameScan::NoCode, FrameScan::NoCode, code_frame(&code)],
        &backend,
        signed_in_as(TEST_USER_ALICE),
        ReconcilerSettings::default(),
    )
    .await;

    assert_eq!(
        outcome,
        ScanState::Success(CheckIn {
            user_id: TEST_USER_ALICE,
            session_code: code.clone(),
            class_name: TEST_CLASS_NAME.to_string(),
            kind: CheckInKind::MarkedPresent,
        })
    );
    let notice = outcome.notice().unwrap();
    assert_eq!(notice.title, "Attendance Marked!");
    assert_eq!(
        notice.description,
        "Successfully checked in for CS201 Data Structures"
    );
    assert_eq!(notice.severity, NoticeSeverity::Success);

    let records = backend.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].user_id, TEST_USER_ALICE);
    assert_eq!(records[0].session_code, code);
    assert!(!controller.is_active());
    assert_eq!(controller.stop_calls(), 1);
}

#[tokio::test]
async fn test_two_participants_each_get_a_record() {
    let backend = Arc::new(InMemoryBackend::new());
    let code = backend.seed_session(TEST_OWNER, TEST_CLASS_NAME);

    for user in [TEST_USER_ALICE, TEST_USER_BOB] {
        let (outcome, _) = scan_once(
            vec![code_frame(&code)],
            &backend,
            signed_in_as(user),
            ReconcilerSettings::default(),
        )
        .await;
        assert!(matches!(
            outcome,
            ScanState::Success(CheckIn { kind: CheckInKind::MarkedPresent, .. })
        ));
    }

    assert_eq!(backend.record_count(&code), 2);
}

#[tokio::test]
async fn test_only_first_code_in_a_burst_is_processed() {
    let backend = Arc::new(InMemoryBackend::new());
    let first = backend.seed_session(TEST_OWNER, TEST_CLASS_NAME);
    let second = backend.seed_session(TEST_OWNER, TEST_CLASS_NAME_SHORT);

    let (outcome, _) = scan_once(
        vec![code_frame(&first), code_frame(&second), code_frame(&first)],
        &backend,
        signed_in_as(TEST_USER_ALICE),
        no_precheck(),
    )
    .await;

    assert!(matches!(outcome, ScanState::Success(ref c) if c.session_code == first));
    assert_eq!(backend.validate_calls(), 1);
    assert_eq!(backend.record_count(&first), 1);
    assert_eq!(backend.record_count(&second), 0);
}

// ============================================================================
// Duplicate scans
// ============================================================================

#[tokio::test]
async fn test_duplicate_scan_is_already_checked_in() {
    let backend = Arc::new(InMemoryBackend::new());
    let code = backend.seed_session(TEST_OWNER, TEST_CLASS_NAME);

    let (first, _) = scan_once(
        vec![code_frame(&code)],
        &backend,
        signed_in_as(TEST_USER_ALICE),
        ReconcilerSettings::default(),
    )
    .await;
    let (second, _) = scan_once(
        vec![code_frame(&code)],
        &backend,
        signed_in_as(TEST_USER_ALICE),
        ReconcilerSettings::default(),
    )
    .await;

    assert!(matches!(first, ScanState::Success(ref c) if !c.already_recorded()));
    let ScanState::Success(check_in) = &second else {
        panic!("expected success, got {second:?}");
    };
    assert_eq!(check_in.kind, CheckInKind::AlreadyCheckedIn);
    assert_eq!(
        check_in.message(),
        "You have already checked in for CS201 Data Structures"
    );
    assert_eq!(second.notice().unwrap().severity, NoticeSeverity::Info);

    assert_eq!(backend.record_count(&code), 1);
    assert_eq!(backend.find_calls(), 2);
    assert_eq!(backend.validate_calls(), 2);
}

/// Record a check-in for Alice, let `invalidate` end the session on the
/// backend, then rescan with default settings.
async fn rescan_after(invalidate: impl FnOnce(&InMemoryBackend, &SessionCode)) -> ScanState {
    let backend = Arc::new(InMemoryBackend::new());
    let code = backend.seed_session(TEST_OWNER, TEST_CLASS_NAME);

    let (first, _) = scan_once(
        vec![code_frame(&code)],
        &backend,
        signed_in_as(TEST_USER_ALICE),
        ReconcilerSettings::default(),
    )
    .await;
    assert!(matches!(first, ScanState::Success(ref c) if !c.already_recorded()));

    invalidate(backend.as_ref(), &code);

    let (second, _) = scan_once(
        vec![code_frame(&code)],
        &backend,
        signed_in_as(TEST_USER_ALICE),
        ReconcilerSettings::default(),
    )
    .await;
    assert_eq!(backend.record_count(&code), 1);
    assert_eq!(backend.validate_calls(), 2);
    second
}

#[tokio::test]
async fn test_rescan_after_expiry_is_rejected_despite_existing_record() {
    let outcome = rescan_after(|backend, _| {
        backend.advance_clock(chrono::Duration::seconds(301));
    })
    .await;

    assert_eq!(
        outcome,
        ScanState::Error(AttendanceError::Expired {
            reason: Some(EXPIRED_MESSAGE.to_string())
        })
    );
}

#[tokio::test]
async fn test_rescan_after_close_is_rejected_despite_existing_record() {
    let outcome = rescan_after(|backend, code| backend.close_session(code)).await;

    assert_eq!(
        outcome,
        ScanState::Error(AttendanceError::InvalidCode {
            reason: Some(CLOSED_SESSION_MESSAGE.to_string())
        })
    );
}

#[tokio::test]
async fn test_duplicate_scan_without_precheck_relies_on_backend() {
    let backend = Arc::new(InMemoryBackend::new());
    let code = backend.seed_session(TEST_OWNER, TEST_CLASS_NAME);

    for expected in [CheckInKind::MarkedPresent, CheckInKind::AlreadyCheckedIn] {
        let (outcome, _) = scan_once(
            vec![code_frame(&code)],
            &backend,
            signed_in_as(TEST_USER_ALICE),
            no_precheck(),
        )
        .await;
        assert!(matches!(outcome, ScanState::Success(ref c) if c.kind == expected));
    }

    assert_eq!(backend.record_count(&code), 1);
    assert_eq!(backend.find_calls(), 0);
    assert_eq!(backend.validate_calls(), 2);
}

// ============================================================================
// Rejected codes
// ============================================================================

#[tokio::test]
async fn test_expired_code_is_rejected() {
    let backend = Arc::new(InMemoryBackend::new());
    let code = backend.seed_session(TEST_OWNER, TEST_CLASS_NAME);
    backend.advance_clock(chrono::Duration::seconds(301));

    let (outcome, _) = scan_once(
        vec![code_frame(&code)],
        &backend,
        signed_in_as(TEST_USER_ALICE),
        ReconcilerSettings::default(),
    )
    .await;

    let ScanState::Error(err) = &outcome else {
        panic!("expected error, got {outcome:?}");
    };
    assert_eq!(
        err,
        &AttendanceError::Expired {
            reason: Some(EXPIRED_MESSAGE.to_string())
        }
    );
    assert_eq!(err.title(), "Code Expired");
    assert_eq!(outcome.notice().unwrap().severity, NoticeSeverity::Destructive);
    assert_eq!(backend.record_count(&code), 0);
}

#[tokio::test]
async fn test_backend_expiry_wins_over_running_countdown() {
    let backend = Arc::new(InMemoryBackend::new());
    let owner_backend: Arc<dyn AttendanceBackend> = backend.clone();
    let mut generator = SessionGenerator::new(
        owner_backend,
        signed_in_as(TEST_OWNER),
        GeneratorSettings::default(),
    );
    let code = generator.generate(TEST_CLASS_NAME).await.unwrap().code().clone();

    backend.advance_clock(chrono::Duration::seconds(301));
    let current = generator.current().unwrap();
    assert!(current.countdown().state().is_running());
    assert!(current.is_active());

    let (outcome, _) = scan_once(
        vec![code_frame(&code)],
        &backend,
        signed_in_as(TEST_USER_ALICE),
        ReconcilerSettings::default(),
    )
    .await;

    assert!(matches!(
        outcome,
        ScanState::Error(AttendanceError::Expired { .. })
    ));
    assert_eq!(backend.record_count(&code), 0);
}

#[tokio::test]
async fn test_closed_session_is_rejected() {
    let backend = Arc::new(InMemoryBackend::new());
    let code = backend.seed_session(TEST_OWNER, TEST_CLASS_NAME);
    backend.close_session(&code);

    let (outcome, _) = scan_once(
        vec![code_frame(&code)],
        &backend,
        signed_in_as(TEST_USER_ALICE),
        no_precheck(),
    )
    .await;

    assert!(matches!(
        outcome,
        ScanState::Error(AttendanceError::InvalidCode { .. })
    ));
    assert_eq!(backend.record_count(&code), 0);
}

#[tokio::test]
async fn test_unknown_code_is_rejected_by_backend() {
    let backend = Arc::new(InMemoryBackend::new());

    let (outcome, _) = scan_once(
        vec![FrameScan::Code("ATTEND-CS201-Ab12Cd-1700000000000".to_string())],
        &backend,
        signed_in_as(TEST_USER_ALICE),
        no_precheck(),
    )
    .await;

    let ScanState::Error(err) = outcome else {
        panic!("expected error");
    };
    assert_eq!(err.client_message(), UNKNOWN_CODE_MESSAGE);
    assert_eq!(backend.validate_calls(), 1);
}

#[tokio::test]
async fn test_foreign_qr_code_never_reaches_backend() {
    let backend = Arc::new(InMemoryBackend::new());

    let (outcome, _) = scan_once(
        vec![FrameScan::Code("https://example.com/menu".to_string())],
        &backend,
        signed_in_as(TEST_USER_ALICE),
        ReconcilerSettings::default(),
    )
    .await;

    assert_eq!(
        outcome,
        ScanState::Error(AttendanceError::Format(FormatError::MissingPrefix))
    );
    assert_eq!(
        outcome.notice().unwrap().description,
        "This QR code is not a valid attendance code."
    );
    assert_eq!(backend.total_calls(), 0);
}

#[tokio::test]
async fn test_signed_out_participant_is_rejected() {
    let backend = Arc::new(InMemoryBackend::new());
    let code = backend.seed_session(TEST_OWNER, TEST_CLASS_NAME);

    let (outcome, _) = scan_once(
        vec![code_frame(&code)],
        &backend,
        AuthContext::anonymous(),
        ReconcilerSettings::default(),
    )
    .await;

    assert_eq!(outcome, ScanState::Error(AttendanceError::NotAuthenticated));
    assert_eq!(backend.total_calls(), 0);
}

#[tokio::test]
async fn test_sign_in_after_spawn_is_picked_up() {
    let backend = Arc::new(InMemoryBackend::new());
    let code = backend.seed_session(TEST_OWNER, TEST_CLASS_NAME);
    let auth = AuthContext::anonymous();
    let (camera, controller) = ScriptedCamera::new();
    let (handle, _task) =
        spawn_reconciler(camera, &backend, auth.clone(), ReconcilerSettings::default());

    auth.sign_in(identity_for(TEST_USER_CHARLIE));
    handle.start().await.unwrap();
    assert!(controller.push_code(code.as_str()));

    let outcome = handle.wait_for_outcome().await.unwrap();
    assert!(matches!(outcome, ScanState::Success(ref c) if c.user_id == TEST_USER_CHARLIE));
}

// ============================================================================
// Backend failures
// ============================================================================

#[tokio::test]
async fn test_hanging_backend_ends_in_error_after_timeout() {
    let backend = Arc::new(InMemoryBackend::hanging());
    let code = backend.seed_session(TEST_OWNER, TEST_CLASS_NAME);
    let (camera, controller) = ScriptedCamera::with_frames(vec![code_frame(&code)]);
    let settings = ReconcilerSettings {
        backend_timeout: Duration::from_millis(50),
        precheck_existing: false,
        ..ReconcilerSettings::default()
    };
    let (handle, _task) =
        spawn_reconciler(camera, &backend, signed_in_as(TEST_USER_ALICE), settings);

    let mut states = handle.subscribe();
    handle.start().await.unwrap();

    let processing = states
        .wait_for(|s| matches!(s, ScanState::Processing { .. }))
        .await
        .unwrap()
        .clone();
    assert_eq!(
        processing,
        ScanState::Processing {
            code: code.to_string()
        }
    );
    assert!(!controller.is_active());

    let outcome = handle.wait_for_outcome().await.unwrap();
    let ScanState::Error(err) = outcome else {
        panic!("expected error");
    };
    assert!(matches!(err, AttendanceError::Backend(_)));
    assert_eq!(err.title(), "Service Unavailable");
}

// ============================================================================
// Camera lifecycle
// ============================================================================

#[tokio::test]
async fn test_denied_camera_is_camera_error() {
    let backend = Arc::new(InMemoryBackend::new());
    let (camera, controller) = ScriptedCamera::denied();
    let (handle, _task) = spawn_reconciler(
        camera,
        &backend,
        signed_in_as(TEST_USER_ALICE),
        ReconcilerSettings::default(),
    );

    let state = handle.start().await.unwrap();

    let ScanState::Error(err) = &state else {
        panic!("expected error, got {state:?}");
    };
    assert!(matches!(err, AttendanceError::CameraAccess(_)));
    assert_eq!(
        err.client_message(),
        "Could not access camera. Please check permissions."
    );
    assert_eq!(handle.state(), state);
    assert_eq!(controller.start_calls(), 1);
    assert!(!controller.is_active());
}

#[tokio::test]
async fn test_start_while_scanning_is_noop() {
    let backend = Arc::new(InMemoryBackend::new());
    let (camera, controller) = ScriptedCamera::new();
    let (handle, _task) = spawn_reconciler(
        camera,
        &backend,
        signed_in_as(TEST_USER_ALICE),
        ReconcilerSettings::default(),
    );

    assert_eq!(handle.start().await.unwrap(), ScanState::Scanning);
    assert_eq!(handle.start().await.unwrap(), ScanState::Scanning);
    assert_eq!(controller.start_calls(), 1);
}

#[tokio::test]
async fn test_stop_releases_camera_and_returns_to_idle() {
    let backend = Arc::new(InMemoryBackend::new());
    let (camera, controller) = ScriptedCamera::new();
    let (handle, _task) = spawn_reconciler(
        camera,
        &backend,
        signed_in_as(TEST_USER_ALICE),
        ReconcilerSettings::default(),
    );

    handle.start().await.unwrap();
    assert!(controller.is_active());
    assert!(controller.push_no_code());

    assert_eq!(handle.stop().await.unwrap(), ScanState::Idle);
    assert!(!controller.is_active());
    assert_eq!(controller.stop_calls(), 1);
    assert!(!controller.push_code("ATTEND-CS201-Ab12Cd-1700000000000"));
    assert_eq!(backend.total_calls(), 0);
}

#[tokio::test]
async fn test_lost_camera_is_camera_error() {
    let backend = Arc::new(InMemoryBackend::new());
    let (camera, controller) = ScriptedCamera::new();
    let (handle, _task) = spawn_reconciler(
        camera,
        &backend,
        signed_in_as(TEST_USER_ALICE),
        ReconcilerSettings::default(),
    );

    handle.start().await.unwrap();
    controller.lose_camera();

    let outcome = handle.wait_for_outcome().await.unwrap();
    assert!(matches!(
        outcome,
        ScanState::Error(AttendanceError::CameraAccess(_))
    ));
    assert!(!controller.is_active());
}

#[tokio::test]
async fn test_restart_after_success_scans_again() {
    let backend = Arc::new(InMemoryBackend::new());
    let first = backend.seed_session(TEST_OWNER, TEST_CLASS_NAME);
    let second = backend.seed_session(TEST_OWNER, TEST_CLASS_NAME_SHORT);
    let (camera, controller) = ScriptedCamera::with_frames(vec![code_frame(&first)]);
    let (handle, _task) = spawn_reconciler(
        camera,
        &backend,
        signed_in_as(TEST_USER_ALICE),
        ReconcilerSettings::default(),
    );

    handle.start().await.unwrap();
    assert!(matches!(
        handle.wait_for_outcome().await.unwrap(),
        ScanState::Success(_)
    ));

    assert_eq!(handle.start().await.unwrap(), ScanState::Scanning);
    assert!(controller.push_code(second.as_str()));
    let outcome = handle.wait_for_outcome().await.unwrap();

    assert!(matches!(outcome, ScanState::Success(ref c) if c.session_code == second));
    assert_eq!(controller.start_calls(), 2);
    assert_eq!(backend.records().len(), 2);
}

#[tokio::test]
async fn test_reset_clears_terminal_state() {
    let backend = Arc::new(InMemoryBackend::new());
    let (camera, _controller) =
        ScriptedCamera::with_frames(vec![FrameScan::Code("not a code".to_string())]);
    let (handle, _task) = spawn_reconciler(
        camera,
        &backend,
        signed_in_as(TEST_USER_ALICE),
        ReconcilerSettings::default(),
    );

    handle.start().await.unwrap();
    assert!(handle.wait_for_outcome().await.unwrap().is_terminal());

    assert_eq!(handle.reset().await.unwrap(), ScanState::Idle);
    assert_eq!(handle.state(), ScanState::Idle);
}

#[tokio::test]
async fn test_shutdown_releases_camera() {
    let backend = Arc::new(InMemoryBackend::new());
    let (camera, controller) = ScriptedCamera::new();
    let (handle, task) = spawn_reconciler(
        camera,
        &backend,
        signed_in_as(TEST_USER_ALICE),
        ReconcilerSettings::default(),
    );

    handle.start().await.unwrap();
    assert!(controller.is_active());

    handle.shutdown();
    task.await.unwrap();

    assert!(!controller.is_active());
    assert!(!handle.is_running());
    assert_eq!(handle.start().await, Err(ReconcilerError::Stopped));
}

#[tokio::test]
async fn test_shutdown_while_processing_abandons_backend_call() {
    let backend = Arc::new(InMemoryBackend::hanging());
    let code = backend.seed_session(TEST_OWNER, TEST_CLASS_NAME);
    let (camera, controller) = ScriptedCamera::with_frames(vec![code_frame(&code)]);
    let (handle, task) = spawn_reconciler(
        camera,
        &backend,
        signed_in_as(TEST_USER_ALICE),
        ReconcilerSettings::default(),
    );

    let mut states = handle.subscribe();
    handle.start().await.unwrap();
    states
        .wait_for(|s| matches!(s, ScanState::Processing { .. }))
        .await
        .unwrap();

    handle.shutdown();
    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("reconciler should exit without waiting for the backend")
        .unwrap();

    assert!(!controller.is_active());
    assert!(matches!(handle.state(), ScanState::Processing { .. }));
}

#[tokio::test]
async fn test_dropping_handles_releases_camera() {
    let backend = Arc::new(InMemoryBackend::new());
    let (camera, controller) = ScriptedCamera::new();
    let (handle, task) = spawn_reconciler(
        camera,
        &backend,
        signed_in_as(TEST_USER_ALICE),
        ReconcilerSettings::default(),
    );

    handle.start().await.unwrap();
    drop(handle);
    task.await.unwrap();

    assert!(!controller.is_active());
}
