//! Synthetic camera for tests and demos.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};

use crate::frame::VideoFrame;
use crate::ingest::{Camera, CameraRequest, CameraStream};
use crate::ScanError;

#[derive(Clone, Debug)]
enum OpenFailure {
    PermissionDenied,
    NoCamera,
    NoCameraApi,
}

/// Shared counters observing a `StubCamera` after it moved into a scanner.
#[derive(Clone, Debug, Default)]
pub struct StubCameraProbe {
    opens: Arc<AtomicUsize>,
    live_streams: Arc<AtomicUsize>,
    torch_on: Arc<AtomicBool>,
}

impl StubCameraProbe {
    /// Successful and failed `open` calls.
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Streams opened and not yet stopped.
    pub fn live_streams(&self) -> usize {
        self.live_streams.load(Ordering::SeqCst)
    }

    pub fn torch_on(&self) -> bool {
        self.torch_on.load(Ordering::SeqCst)
    }
}

/// Camera producing synthetic frames.
///
/// Without explicit frames it emits a uniform grey frame at the requested
/// ideal resolution.
pub struct StubCamera {
    frames: Vec<VideoFrame>,
    failures: Vec<OpenFailure>,
    torch: bool,
    probe: StubCameraProbe,
}

impl StubCamera {
    pub fn new() -> Self {
        Self {
            frames: Vec::new(),
            failures: Vec::new(),
            torch: false,
            probe: StubCameraProbe::default(),
        }
    }

    /// Cycle through `frames` instead of the grey default.
    pub fn with_frames(mut self, frames: Vec<VideoFrame>) -> Self {
        self.frames = frames;
        self
    }

    /// Expose a torch on the video track.
    pub fn with_torch(mut self) -> Self {
        self.torch = true;
        self
    }

    /// Deny permission for the next `times` open attempts.
    pub fn deny_permission(mut self, times: usize) -> Self {
        self.failures
            .extend(std::iter::repeat(OpenFailure::PermissionDenied).take(times));
        self
    }

    /// Behave as a host with no video input device.
    pub fn without_device(mut self) -> Self {
        self.failures.push(OpenFailure::NoCamera);
        self
    }

    /// Behave as a host with no camera API at all.
    pub fn without_camera_api(mut self) -> Self {
        self.failures.push(OpenFailure::NoCameraApi);
        self
    }

    pub fn probe(&self) -> StubCameraProbe {
        self.probe.clone()
    }
}

impl Default for StubCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl Camera for StubCamera {
    fn open(&mut self, request: &CameraRequest) -> Result<Box<dyn CameraStream>, ScanError> {
        self.probe.opens.fetch_add(1, Ordering::SeqCst);
        if !self.failures.is_empty() {
            return Err(match self.failures.remove(0) {
                OpenFailure::PermissionDenied => ScanError::PermissionDenied,
                OpenFailure::NoCamera => ScanError::NoCameraFound,
                OpenFailure::NoCameraApi => ScanError::CapabilityUnsupported(
                    "camera API not available".to_string(),
                ),
            });
        }

        let frames = if self.frames.is_empty() {
            let frame =
                VideoFrame::solid(request.ideal_width, request.ideal_height, [128, 128, 128, 255], 0)
                    .map_err(|e| ScanError::CameraUnavailable(e.to_string()))?;
            vec![frame]
        } else {
            self.frames.clone()
        };

        self.probe.live_streams.fetch_add(1, Ordering::SeqCst);
        log::info!(
            "StubCamera: opened {:?} stream ({} frames)",
            request.facing_mode,
            frames.len()
        );
        Ok(Box::new(StubStream {
            frames,
            next: 0,
            torch: self.torch,
            stopped: false,
            probe: self.probe.clone(),
        }))
    }
}

struct StubStream {
    frames: Vec<VideoFrame>,
    next: usize,
    torch: bool,
    stopped: bool,
    probe: StubCameraProbe,
}

impl CameraStream for StubStream {
    fn current_frame(&mut self) -> Option<VideoFrame> {
        if self.stopped || self.frames.is_empty() {
            return None;
        }
        let frame = self.frames[self.next % self.frames.len()].clone();
        self.next += 1;
        Some(frame)
    }

    fn stop_tracks(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.probe.torch_on.store(false, Ordering::SeqCst);
        self.probe.live_streams.fetch_sub(1, Ordering::SeqCst);
    }

    fn torch_supported(&self) -> bool {
        self.torch && !self.stopped
    }

    fn apply_torch(&mut self, on: bool) -> Result<()> {
        if !self.torch_supported() {
            return Err(anyhow!("torch not supported by this track"));
        }
        self.probe.torch_on.store(on, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for StubStream {
    fn drop(&mut self) {
        self.stop_tracks();
    }
}
