//! Participant-side scan reconciliation.
//!
//! `ScanReconcilerActor` owns the camera and drives the scan state machine:
//!
//! - `start` opens the camera and moves to `Scanning`
//! - frames without a code are ignored
//! - the first decoded code stops the camera and moves to `Processing`;
//!   later frames are never read
//! - the code is decoded locally, then recorded through the backend, ending
//!   in `Success` or `Error`
//!
//! Terminal states stay until `start` (restart) or `reset`. The camera is
//! released on every exit path: stop, reset, shutdown, or all handles
//! dropped.

mod state;

pub use state::{CheckIn, CheckInKind, ScanState};

use crate::auth::{AuthContext, Identity};
use crate::backend::{bounded, AttendanceBackend};
use crate::camera::{Camera, CaptureSettings, FrameScan};
use crate::codec::SessionCode;
use crate::errors::AttendanceError;
use crate::generator::DEFAULT_BACKEND_TIMEOUT;
use crate::observability::metrics;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

/// Command channel buffer size.
const RECONCILER_CHANNEL_BUFFER: usize = 16;

/// Reconciler settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilerSettings {
    /// Bound on each backend call.
    pub backend_timeout: Duration,
    /// Look up an existing record before recording. Only logged; the
    /// recording call always runs and decides the outcome.
    pub precheck_existing: bool,
    pub capture: CaptureSettings,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            backend_timeout: DEFAULT_BACKEND_TIMEOUT,
            precheck_existing: true,
            capture: CaptureSettings::default(),
        }
    }
}

/// Errors from talking to the reconciler task itself.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ReconcilerError {
    #[error("scan reconciler has stopped")]
    Stopped,
}

enum ReconcilerMessage {
    Start {
        respond_to: oneshot::Sender<ScanState>,
    },
    Stop {
        respond_to: oneshot::Sender<ScanState>,
    },
    Reset {
        respond_to: oneshot::Sender<ScanState>,
    },
}

/// Handle to a running scan reconciler.
#[derive(Clone, Debug)]
pub struct ScanReconcilerHandle {
    sender: mpsc::Sender<ReconcilerMessage>,
    state_rx: watch::Receiver<ScanState>,
    cancel_token: CancellationToken,
}

impl ScanReconcilerHandle {
    /// Open the camera and start scanning.
    ///
    /// No-op while already scanning or processing; restarts from a terminal
    /// state. Returns the resulting state, which is `Error` if the camera
    /// could not be opened.
    ///
    /// # Errors
    ///
    /// Returns `ReconcilerError::Stopped` if the reconciler task has exited.
    pub async fn start(&self) -> Result<ScanState, ReconcilerError> {
        self.request(|respond_to| ReconcilerMessage::Start { respond_to })
            .await
    }

    /// Stop scanning and release the camera.
    ///
    /// # Errors
    ///
    /// Returns `ReconcilerError::Stopped` if the reconciler task has exited.
    pub async fn stop(&self) -> Result<ScanState, ReconcilerError> {
        self.request(|respond_to| ReconcilerMessage::Stop { respond_to })
            .await
    }

    /// Release the camera and return to `Idle` from any state.
    ///
    /// # Errors
    ///
    /// Returns `ReconcilerError::Stopped` if the reconciler task has exited.
    pub async fn reset(&self) -> Result<ScanState, ReconcilerError> {
        self.request(|respond_to| ReconcilerMessage::Reset { respond_to })
            .await
    }

    async fn request(
        &self,
        message: impl FnOnce(oneshot::Sender<ScanState>) -> ReconcilerMessage,
    ) -> Result<ScanState, ReconcilerError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(message(tx))
            .await
            .map_err(|_| ReconcilerError::Stopped)?;
        rx.await.map_err(|_| ReconcilerError::Stopped)
    }

    /// Latest published state.
    #[must_use]
    pub fn state(&self) -> ScanState {
        self.state_rx.borrow().clone()
    }

    /// Watch every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ScanState> {
        self.state_rx.clone()
    }

    /// Wait until the current scan reaches `Success` or `Error`.
    ///
    /// # Errors
    ///
    /// Returns `ReconcilerError::Stopped` if the task exits first.
    pub async fn wait_for_outcome(&self) -> Result<ScanState, ReconcilerError> {
        let mut rx = self.state_rx.clone();
        let state = rx
            .wait_for(ScanState::is_terminal)
            .await
            .map_err(|_| ReconcilerError::Stopped)?;
        Ok(state.clone())
    }

    /// Stop the reconciler task. The camera is released before it exits and
    /// an in-flight backend call is abandoned.
    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.sender.is_closed()
    }
}

/// Scan reconciler task.
pub struct ScanReconcilerActor {
    camera: Box<dyn Camera>,
    backend: Arc<dyn AttendanceBackend>,
    auth: AuthContext,
    settings: ReconcilerSettings,
    receiver: mpsc::Receiver<ReconcilerMessage>,
    frames: Option<mpsc::Receiver<FrameScan>>,
    state_tx: watch::Sender<ScanState>,
    cancel_token: CancellationToken,
}

impl ScanReconcilerActor {
    /// Spawn a reconciler owning `camera`.
    pub fn spawn(
        camera: Box<dyn Camera>,
        backend: Arc<dyn AttendanceBackend>,
        auth: AuthContext,
        settings: ReconcilerSettings,
    ) -> (ScanReconcilerHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(RECONCILER_CHANNEL_BUFFER);
        let (state_tx, state_rx) = watch::channel(ScanState::Idle);
        let cancel_token = CancellationToken::new();

        let actor = Self {
            camera,
            backend,
            auth,
            settings,
            receiver,
            frames: None,
            state_tx,
            cancel_token: cancel_token.clone(),
        };
        let task_handle = tokio::spawn(actor.run());

        let handle = ScanReconcilerHandle {
            sender,
            state_rx,
            cancel_token,
        };
        (handle, task_handle)
    }

    #[instrument(skip_all, name = "attendance.reconciler")]
    async fn run(mut self) {
        debug!(target: "attendance.reconciler", "Scan reconciler started");

        loop {
            tokio::select! {
                biased;

                () = self.cancel_token.cancelled() => {
                    debug!(target: "attendance.reconciler", "Scan reconciler cancelled");
                    break;
                }

                msg = self.receiver.recv() => {
                    let Some(msg) = msg else {
                        debug!(target: "attendance.reconciler", "All handles dropped");
                        break;
                    };
                    self.handle_message(msg).await;
                }

                frame = recv_frame(&mut self.frames) => {
                    self.handle_frame(frame).await;
                }
            }
        }

        self.release_camera().await;
        debug!(target: "attendance.reconciler", "Scan reconciler stopped");
    }

    async fn handle_message(&mut self, msg: ReconcilerMessage) {
        match msg {
            ReconcilerMessage::Start { respond_to } => {
                let current = self.state_tx.borrow().clone();
                let state = match current {
                    ScanState::Scanning | ScanState::Processing { .. } => current,
                    ScanState::Idle | ScanState::Success(_) | ScanState::Error(_) => {
                        self.start_scanning().await
                    }
                };
                let _ = respond_to.send(state);
            }
            ReconcilerMessage::Stop { respond_to } => {
                self.release_camera().await;
                if *self.state_tx.borrow() == ScanState::Scanning {
                    self.publish(ScanState::Idle);
                }
                let _ = respond_to.send(self.state_tx.borrow().clone());
            }
            ReconcilerMessage::Reset { respond_to } => {
                self.release_camera().await;
                self.publish(ScanState::Idle);
                let _ = respond_to.send(ScanState::Idle);
            }
        }
    }

    async fn start_scanning(&mut self) -> ScanState {
        match self.camera.start(&self.settings.capture).await {
            Ok(frames) => {
                self.frames = Some(frames);
                info!(target: "attendance.reconciler", fps = self.settings.capture.fps, "Scanning started");
                self.publish(ScanState::Scanning);
                ScanState::Scanning
            }
            Err(e) => {
                warn!(target: "attendance.reconciler", error = %e, "Camera failed to start");
                let state = ScanState::Error(AttendanceError::CameraAccess(e.to_string()));
                self.finish(state.clone());
                state
            }
        }
    }

    async fn handle_frame(&mut self, frame: Option<FrameScan>) {
        match frame {
            Some(FrameScan::NoCode) => {
                trace!(target: "attendance.reconciler", "No code in frame");
            }
            Some(FrameScan::Code(raw)) => {
                // Stop reading frames before anything else so later codes are dropped.
                self.release_camera().await;
                self.publish(ScanState::Processing { code: raw.clone() });

                let outcome = tokio::select! {
                    biased;

                    () = self.cancel_token.cancelled() => {
                        debug!(target: "attendance.reconciler", "Cancelled while processing");
                        return;
                    }

                    outcome = self.reconcile(&raw) => outcome,
                };
                self.finish(outcome);
            }
            None => {
                warn!(target: "attendance.reconciler", "Camera stream ended while scanning");
                self.release_camera().await;
                self.finish(ScanState::Error(AttendanceError::CameraAccess(
                    "camera stream ended".to_string(),
                )));
            }
        }
    }

    /// Turn a captured code into a terminal state.
    async fn reconcile(&self, raw: &str) -> ScanState {
        let code: SessionCode = match raw.parse() {
            Ok(code) => code,
            Err(e) => {
                debug!(target: "attendance.reconciler", error = %e, "Scanned text is not a session code");
                return ScanState::Error(AttendanceError::Format(e));
            }
        };

        let Some(participant) = self.auth.current() else {
            return ScanState::Error(AttendanceError::NotAuthenticated);
        };

        if self.settings.precheck_existing && self.has_existing_record(&participant, &code).await {
            debug!(
                target: "attendance.reconciler",
                session_code = %code,
                "Existing record found, backend decides the outcome"
            );
        }

        let recorded = bounded(
            "validate_and_record_attendance",
            self.settings.backend_timeout,
            self.backend
                .validate_and_record_attendance(&participant, &code),
        )
        .await;

        match recorded {
            Ok(outcome) => {
                let kind = if outcome.already_recorded() {
                    CheckInKind::AlreadyCheckedIn
                } else {
                    CheckInKind::MarkedPresent
                };
                let class_name = display_class_name(outcome.class_name(), &code);
                ScanState::Success(CheckIn {
                    user_id: participant.user_id(),
                    session_code: code,
                    class_name,
                    kind,
                })
            }
            Err(e) => ScanState::Error(AttendanceError::from_scan_backend(e)),
        }
    }

    /// Look up an existing record. Advisory only: a hit never ends the scan,
    /// since the session may have expired or closed since it was recorded.
    async fn has_existing_record(&self, participant: &Identity, code: &SessionCode) -> bool {
        match bounded(
            "find_record",
            self.settings.backend_timeout,
            self.backend.find_record(participant, code),
        )
        .await
        {
            Ok(record) => record.is_some(),
            Err(e) => {
                debug!(
                    target: "attendance.reconciler",
                    error = %e,
                    "Existing-record lookup failed, recording anyway"
                );
                false
            }
        }
    }

    async fn release_camera(&mut self) {
        self.frames = None;
        if self.camera.is_active() {
            self.camera.stop().await;
            debug!(target: "attendance.reconciler", "Camera released");
        }
    }

    fn finish(&self, state: ScanState) {
        if let Some(outcome) = state.outcome() {
            metrics::record_scan_outcome(outcome);
            info!(target: "attendance.reconciler", outcome, "Scan finished");
        }
        self.publish(state);
    }

    fn publish(&self, state: ScanState) {
        self.state_tx.send_replace(state);
    }
}

async fn recv_frame(frames: &mut Option<mpsc::Receiver<FrameScan>>) -> Option<FrameScan> {
    match frames {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

fn display_class_name(reported: &str, code: &SessionCode) -> String {
    let reported = reported.trim();
    if reported.is_empty() {
        code.token().display_name()
    } else {
        reported.to_string()
    }
}
