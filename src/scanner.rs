//! Frame scanner.
//!
//! Owns the camera stream and decides, per frame tick, whether to run a
//! detection attempt. The environment calls `on_frame(timestamp_ms)` on every
//! displayed frame; attempts are throttled to one per detect interval no
//! matter how fast frames arrive.
//!
//! State machine:
//!
//! ```text
//! Idle --start--> Acquiring --ok--> Active --stop/hidden/signal--> Idle
//!                     |
//!                     +--error--> Idle
//! any --teardown--> Stopped
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::detect::DetectionBackend;
use crate::frame::{ScanFrame, MAX_SCAN_WIDTH};
use crate::ingest::{Camera, CameraRequest, CameraStream};
use crate::ScanError;

/// Minimum spacing between two detection attempts.
pub const DEFAULT_DETECT_INTERVAL_MS: u64 = 200;

/// Cross-thread request to stop scanning.
///
/// Raised by visibility watchers, teardown hooks or signal handlers. The
/// scanner honours it before the next attempt and discards any result of an
/// attempt that was in flight when it was raised.
#[derive(Clone, Debug, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScannerState {
    Idle,
    Acquiring,
    Active,
    /// Torn down; the scanner cannot be restarted.
    Stopped,
}

/// Outcome of one frame tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Tick {
    /// The scanner is not running.
    Inactive,
    /// Too soon after the previous attempt.
    Skipped,
    /// An attempt ran and found nothing.
    NothingFound,
    /// An attempt produced a non-empty raw payload.
    Detected(String),
    /// An attempt produced a payload after scanning was stopped.
    Discarded,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TorchStatus {
    On,
    Off,
    NotAvailable,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScannerStats {
    pub attempts: u64,
    pub skipped: u64,
    pub detections: u64,
    pub discarded: u64,
}

/// Scanner tuning.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScannerSettings {
    pub detect_interval_ms: u64,
    pub max_scan_width: u32,
    pub camera: CameraRequest,
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self {
            detect_interval_ms: DEFAULT_DETECT_INTERVAL_MS,
            max_scan_width: MAX_SCAN_WIDTH,
            camera: CameraRequest::default(),
        }
    }
}

pub struct FrameScanner {
    camera: Box<dyn Camera>,
    backend: DetectionBackend,
    settings: ScannerSettings,
    state: ScannerState,
    stream: Option<Box<dyn CameraStream>>,
    last_attempt_ms: Option<u64>,
    attempt_in_flight: bool,
    retry_armed: bool,
    stop_signal: StopSignal,
    stats: ScannerStats,
}

impl FrameScanner {
    pub fn new<C: Camera + 'static>(
        camera: C,
        backend: DetectionBackend,
        settings: ScannerSettings,
    ) -> Self {
        let settings = ScannerSettings {
            max_scan_width: settings.max_scan_width.clamp(1, MAX_SCAN_WIDTH),
            ..settings
        };
        Self {
            camera: Box::new(camera),
            backend,
            settings,
            state: ScannerState::Idle,
            stream: None,
            last_attempt_ms: None,
            attempt_in_flight: false,
            retry_armed: false,
            stop_signal: StopSignal::new(),
            stats: ScannerStats::default(),
        }
    }

    /// Use an existing stop handle, e.g. one already wired to a signal handler.
    pub fn with_stop_signal(mut self, signal: StopSignal) -> Self {
        self.stop_signal = signal;
        self
    }

    pub fn state(&self) -> ScannerState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == ScannerState::Active
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn stats(&self) -> ScannerStats {
        self.stats
    }

    /// Handle for raising a stop from elsewhere.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop_signal.clone()
    }

    /// True while a permission failure waits for the next user gesture.
    pub fn retry_armed(&self) -> bool {
        self.retry_armed
    }

    /// Acquire the camera stream and begin scanning.
    pub fn start(&mut self) -> Result<(), ScanError> {
        match self.state {
            ScannerState::Active | ScannerState::Acquiring => return Ok(()),
            ScannerState::Stopped => {
                return Err(ScanError::CameraUnavailable(
                    "scanner has been torn down".to_string(),
                ))
            }
            ScannerState::Idle => {}
        }

        self.stop_signal.reset();
        self.state = ScannerState::Acquiring;
        match self.camera.open(&self.settings.camera) {
            Ok(stream) => {
                self.stream = Some(stream);
                self.state = ScannerState::Active;
                self.last_attempt_ms = None;
                self.retry_armed = false;
                log::info!(
                    "scanner active (backend={}, interval={}ms)",
                    self.backend.name(),
                    self.settings.detect_interval_ms
                );
                Ok(())
            }
            Err(e) => {
                self.state = ScannerState::Idle;
                if e == ScanError::PermissionDenied {
                    self.retry_armed = true;
                }
                log::warn!("camera acquisition failed: {}", e);
                Err(e)
            }
        }
    }

    /// One-shot retry after a permission denial. Returns `None` when no retry
    /// was armed.
    pub fn user_gesture(&mut self) -> Option<Result<(), ScanError>> {
        if !self.retry_armed {
            return None;
        }
        self.retry_armed = false;
        log::info!("retrying camera acquisition after user gesture");
        Some(self.start())
    }

    /// Frame tick from the environment.
    pub fn on_frame(&mut self, timestamp_ms: u64) -> Tick {
        if self.state != ScannerState::Active {
            return Tick::Inactive;
        }
        if self.stop_signal.is_raised() {
            self.force_stop("stop signal raised");
            return Tick::Inactive;
        }
        if self.attempt_in_flight {
            self.stats.skipped += 1;
            return Tick::Skipped;
        }
        if let Some(last) = self.last_attempt_ms {
            if timestamp_ms.saturating_sub(last) < self.settings.detect_interval_ms {
                self.stats.skipped += 1;
                return Tick::Skipped;
            }
        }

        self.last_attempt_ms = Some(timestamp_ms);
        self.attempt_in_flight = true;
        let found = self.attempt();
        self.attempt_in_flight = false;
        self.stats.attempts += 1;

        if self.stop_signal.is_raised() {
            self.force_stop("stop signal raised during detection");
        }
        if self.state != ScannerState::Active {
            if found.is_some() {
                self.stats.discarded += 1;
                log::debug!("discarding detection from a stopped scanner");
                return Tick::Discarded;
            }
            return Tick::Inactive;
        }

        match found {
            Some(raw) => {
                self.stats.detections += 1;
                log::debug!("detected payload ({} bytes)", raw.len());
                Tick::Detected(raw)
            }
            None => Tick::NothingFound,
        }
    }

    /// Run one detection attempt on the current frame.
    fn attempt(&mut self) -> Option<String> {
        let stream = self.stream.as_mut()?;
        let frame = stream.current_frame()?;

        match &mut self.backend {
            DetectionBackend::Native(detector) => match detector.detect(&frame) {
                Ok(codes) => codes
                    .into_iter()
                    .map(|code| code.raw_value)
                    .find(|value| !value.is_empty()),
                Err(e) => {
                    log::debug!("native detection failed: {}", e);
                    None
                }
            },
            DetectionBackend::Software(decoder) => {
                let scan = ScanFrame::capture(&frame, self.settings.max_scan_width);
                decoder
                    .decode_rgba(scan.pixels(), scan.width, scan.height)
                    .filter(|value| !value.is_empty())
            }
        }
    }

    /// Halt the loop and release the camera. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop_tracks();
            log::info!("camera released");
        }
        if self.state != ScannerState::Stopped {
            self.state = ScannerState::Idle;
        }
        self.last_attempt_ms = None;
    }

    fn force_stop(&mut self, reason: &str) {
        log::info!("forcing scanner stop: {}", reason);
        self.stop();
    }

    /// Hidden pages must not hold the camera.
    pub fn on_visibility_change(&mut self, visible: bool) {
        if !visible && self.state == ScannerState::Active {
            self.force_stop("page hidden");
        }
    }

    /// Final stop; the scanner cannot be started again.
    pub fn teardown(&mut self) {
        self.stop();
        self.retry_armed = false;
        self.state = ScannerState::Stopped;
    }

    pub fn torch_available(&self) -> bool {
        self.stream
            .as_ref()
            .map(|stream| stream.torch_supported())
            .unwrap_or(false)
    }

    /// Switch the torch. Never fails; unsupported or rejected requests
    /// report `NotAvailable`.
    pub fn set_torch(&mut self, on: bool) -> TorchStatus {
        let Some(stream) = self.stream.as_mut() else {
            return TorchStatus::NotAvailable;
        };
        if !stream.torch_supported() {
            return TorchStatus::NotAvailable;
        }
        match stream.apply_torch(on) {
            Ok(()) if on => TorchStatus::On,
            Ok(()) => TorchStatus::Off,
            Err(e) => {
                log::warn!("torch constraint rejected: {}", e);
                TorchStatus::NotAvailable
            }
        }
    }
}

impl Drop for FrameScanner {
    fn drop(&mut self) {
        self.stop();
    }
}
