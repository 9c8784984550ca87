//! # Attendance Test Utilities
//!
//! Mocks and fixtures for testing the attendance flow without a real
//! backend or camera.
//!
//! ## Modules
//!
//! - `mock_backend` - In-memory backend enforcing one record per (user, session)
//! - `mock_camera` - Scripted camera with a controller for pushing frames
//! - `test_ids` - Fixed user ids and class names
//! - `token_builders` - Unsigned access tokens and identities
//!
//! ## Usage
//!
//! ```rust,ignore
//! use attendance_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let backend = Arc::new(InMemoryBackend::new());
//!     let code = backend.seed_session(TEST_OWNER, "CS201");
//!
//!     let (camera, controller) = ScriptedCamera::with_frames(vec![
//!         FrameScan::NoCode,
//!         FrameScan::Code(code.to_string()),
//!     ]);
//!     let auth = signed_in_as(TEST_USER_ALICE);
//!     // Spawn a ScanReconcilerActor with camera, backend, auth...
//! }
//! ```

pub mod mock_backend;
pub mod mock_camera;
pub mod test_ids;
pub mod token_builders;

pub use mock_backend::InMemoryBackend;
pub use mock_camera::{CameraController, ScriptedCamera};
pub use test_ids::*;
pub use token_builders::{identity_for, signed_in_as, TestAccessTokenBuilder};
