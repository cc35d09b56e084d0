//! Camera sources.
//!
//! This module provides the camera abstraction the frame scanner owns:
//! - `Camera`: something that can be asked for a stream
//! - `CameraStream`: an open stream with tracks, a current frame and
//!   optional torch control
//! - Stub camera (testing, demos)
//! - Still-image camera (feature: ingest-image)
//!
//! Sources MUST NOT:
//! - Store frames to disk
//! - Forward frames anywhere but the scanner
//! - Log frame content

#[cfg(feature = "ingest-image")]
pub mod image;
pub mod stub;

#[cfg(feature = "ingest-image")]
pub use self::image::ImageCamera;
pub use stub::{StubCamera, StubCameraProbe};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::frame::VideoFrame;
use crate::ScanError;

/// Preferred camera direction.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FacingMode {
    /// Rear camera.
    #[default]
    Environment,
    /// Front camera.
    User,
}

/// Stream constraints passed to `Camera::open`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CameraRequest {
    pub facing_mode: FacingMode,
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub audio: bool,
}

impl Default for CameraRequest {
    fn default() -> Self {
        Self {
            facing_mode: FacingMode::Environment,
            ideal_width: 1280,
            ideal_height: 720,
            audio: false,
        }
    }
}

/// A camera that can be asked for a stream.
pub trait Camera: Send {
    /// Request a stream.
    ///
    /// Failures are classified: `PermissionDenied`, `NoCameraFound`,
    /// `CapabilityUnsupported` (no camera API) or `CameraUnavailable`.
    fn open(&mut self, request: &CameraRequest) -> Result<Box<dyn CameraStream>, ScanError>;
}

/// An open camera stream. Exclusively owned by the frame scanner.
pub trait CameraStream: Send {
    /// The frame currently displayed, if one has arrived yet.
    fn current_frame(&mut self) -> Option<VideoFrame>;

    /// Stop every track and release the device. Must tolerate repeat calls.
    fn stop_tracks(&mut self);

    /// Whether the active video track exposes a torch.
    fn torch_supported(&self) -> bool {
        false
    }

    /// Apply the torch constraint.
    fn apply_torch(&mut self, _on: bool) -> Result<()> {
        anyhow::bail!("torch not supported by this track")
    }
}
