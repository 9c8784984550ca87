//! Camera capture seam.
//!
//! A camera implementation decodes QR frames on its own and streams the
//! result of each frame over an mpsc channel. The scan reconciler owns the
//! camera exclusively and is the only caller of `start`/`stop`.

use thiserror::Error;
use tokio::sync::mpsc;

/// Suggested buffer for a camera's frame channel.
pub const FRAME_CHANNEL_BUFFER: usize = 32;

/// Outcome of decoding one camera frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameScan {
    /// No QR code found in the frame. Routine; never surfaced to the user.
    NoCode,
    /// A QR code was found; carries its text payload.
    Code(String),
}

/// Which camera to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Facing {
    /// Rear camera on phones.
    #[default]
    Environment,
    User,
}

/// Capture parameters handed to the camera on start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureSettings {
    /// Frames decoded per second.
    pub fps: u32,
    /// Side of the square scan region, in pixels.
    pub scan_box: u32,
    pub facing: Facing,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            fps: 10,
            scan_box: 250,
            facing: Facing::Environment,
        }
    }
}

/// Camera start failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CameraError {
    #[error("camera permission denied: {0}")]
    PermissionDenied(String),

    #[error("camera unavailable: {0}")]
    Unavailable(String),
}

/// A frame source with QR decoding.
#[async_trait::async_trait]
pub trait Camera: Send + Sync {
    /// Start capturing. The returned receiver yields one [`FrameScan`] per
    /// decoded frame and closes if the camera is lost.
    async fn start(
        &mut self,
        settings: &CaptureSettings,
    ) -> Result<mpsc::Receiver<FrameScan>, CameraError>;

    /// Stop capturing and release the device. Idempotent.
    async fn stop(&mut self);

    fn is_active(&self) -> bool;
}
