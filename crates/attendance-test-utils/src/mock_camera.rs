//! Scripted camera.
//!
//! [`ScriptedCamera`] is handed to the reconciler; the paired
//! [`CameraController`] stays with the test and pushes frames into the
//! running capture, or simulates losing the device.

use attendance::camera::{Camera, CameraError, CaptureSettings, FrameScan, FRAME_CHANNEL_BUFFER};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

#[derive(Debug, Default)]
struct Shared {
    sender: Mutex<Option<mpsc::Sender<FrameScan>>>,
    active: AtomicBool,
    start_calls: AtomicUsize,
    stop_calls: AtomicUsize,
}

/// Camera that replays a fixed script and then waits for pushed frames.
#[derive(Debug)]
pub struct ScriptedCamera {
    shared: Arc<Shared>,
    script: Vec<FrameScan>,
    denial: Option<CameraError>,
}

/// Test-side handle to a [`ScriptedCamera`].
#[derive(Debug, Clone)]
pub struct CameraController {
    shared: Arc<Shared>,
}

impl ScriptedCamera {
    /// Camera with no scripted frames.
    pub fn new() -> (Self, CameraController) {
        Self::with_frames(Vec::new())
    }

    /// Camera that delivers `frames` as soon as the first capture starts.
    pub fn with_frames(frames: Vec<FrameScan>) -> (Self, CameraController) {
        let shared = Arc::new(Shared::default());
        (
            Self {
                shared: Arc::clone(&shared),
                script: frames,
                denial: None,
            },
            CameraController { shared },
        )
    }

    /// Camera whose permission is always denied.
    pub fn denied() -> (Self, CameraController) {
        let (mut camera, controller) = Self::new();
        camera.denial = Some(CameraError::PermissionDenied(
            "NotAllowedError: Permission denied".to_string(),
        ));
        (camera, controller)
    }
}

#[async_trait::async_trait]
impl Camera for ScriptedCamera {
    async fn start(
        &mut self,
        _settings: &CaptureSettings,
    ) -> Result<mpsc::Receiver<FrameScan>, CameraError> {
        self.shared.start_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(denial) = &self.denial {
            return Err(denial.clone());
        }

        let (tx, rx) = mpsc::channel(FRAME_CHANNEL_BUFFER.max(self.script.len()));
        for frame in std::mem::take(&mut self.script) {
            tx.try_send(frame).expect("script fits the frame buffer");
        }
        *self.shared.sender.lock().unwrap() = Some(tx);
        self.shared.active.store(true, Ordering::SeqCst);
        Ok(rx)
    }

    async fn stop(&mut self) {
        self.shared.stop_calls.fetch_add(1, Ordering::SeqCst);
        self.shared.sender.lock().unwrap().take();
        self.shared.active.store(false, Ordering::SeqCst);
    }

    fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::SeqCst)
    }
}

impl CameraController {
    /// Push a decoded QR payload into the running capture.
    ///
    /// Returns false if no capture is running.
    pub fn push_code(&self, payload: &str) -> bool {
        self.push(FrameScan::Code(payload.to_string()))
    }

    /// Push an empty frame.
    pub fn push_no_code(&self) -> bool {
        self.push(FrameScan::NoCode)
    }

    /// Close the frame stream without a `stop` call, as if the device vanished.
    pub fn lose_camera(&self) {
        self.shared.sender.lock().unwrap().take();
    }

    pub fn start_calls(&self) -> usize {
        self.shared.start_calls.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> usize {
        self.shared.stop_calls.load(Ordering::SeqCst)
    }

    pub fn is_active(&self) -> bool {
        self.shared.active.load(Ordering::SeqCst)
    }

    fn push(&self, frame: FrameScan) -> bool {
        match self.shared.sender.lock().unwrap().as_ref() {
            Some(tx) => tx.try_send(frame).is_ok(),
            None => false,
        }
    }
}
