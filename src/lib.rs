//! Identity Scanner
//!
//! This crate implements the core of a camera-driven identity scanner: optical
//! codes are acquired from a live camera, decoded into identity/contact records
//! and retained in a deduplicating store.
//!
//! # Architecture
//!
//! 1. **Capability probing**: exactly one detection backend (native or software)
//!    is chosen at startup, together with the secure-context precondition.
//! 2. **Frame scanning**: the environment drives `on_frame(timestamp)`; the
//!    scanner throttles detection attempts and never overlaps them.
//! 3. **Payload decoding**: an ordered cascade of grammars turns one raw string
//!    into a `Record` (markup, numeric secure payload, JSON, key-value, delimited).
//! 4. **Record storage**: field-wise merge keyed by a derived identity key,
//!    most-recently-seen first, with snapshot persistence.
//!
//! # Module Structure
//!
//! - `detect`: backend traits, capability prober, bundled backends
//! - `frame`: video frame handles and capped-width scan buffers
//! - `ingest`: camera abstraction and camera sources
//! - `scanner`: frame scanner state machine
//! - `decode`: payload decoder cascade
//! - `record`: record type and dedup keys
//! - `store`: record store and snapshot persistence
//! - `session`: scan session wiring it all together
//! - `config`: JSON file + environment configuration
//! - `cli`: the `idscan` command line

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;

pub mod cli;
pub mod config;
pub mod decode;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod record;
pub mod scanner;
pub mod session;
pub mod store;

pub use config::ScannerConfig;
pub use decode::{Inflater, PayloadDecoder};
pub use detect::{
    Capabilities, CapabilityProber, CodeFormat, DetectedCode, DetectionBackend, NativeDetector,
    SoftwareDecoder,
};
pub use frame::{ScanFrame, VideoFrame, MAX_SCAN_WIDTH};
pub use ingest::{Camera, CameraRequest, CameraStream, FacingMode, StubCamera};
pub use record::{KeyProfile, Record, Source};
pub use scanner::{FrameScanner, ScannerState, StopSignal, Tick, TorchStatus};
pub use session::{ScanOutcome, ScanSession};
pub use store::{
    InMemorySnapshotStore, RecordStore, SnapshotEntry, SnapshotStore, SqliteSnapshotStore,
    UpsertOutcome,
};

// -------------------- Scan Errors --------------------

/// Classified scan failure.
///
/// Capability, permission and camera errors halt scanning. Everything on the
/// decode path is reported and the loop carries on with the next frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScanError {
    /// No detection backend, or the context is not allowed to open a camera.
    CapabilityUnsupported(String),
    /// The user or platform denied camera access. Re-armed on the next gesture.
    PermissionDenied,
    /// No camera device is attached.
    NoCameraFound,
    /// Any other camera acquisition failure.
    CameraUnavailable(String),
    /// A numeric secure payload was found but inflate is not available here.
    DecodeCapabilityMissing,
    /// No grammar accepted the payload.
    UnrecognizedFormat,
    /// The payload parsed but carries nothing to key the record on.
    NoIdentityKey,
}

impl ScanError {
    pub fn code(&self) -> &'static str {
        match self {
            ScanError::CapabilityUnsupported(_) => "CAPABILITY_UNSUPPORTED",
            ScanError::PermissionDenied => "PERMISSION_DENIED",
            ScanError::NoCameraFound => "NO_CAMERA_FOUND",
            ScanError::CameraUnavailable(_) => "CAMERA_UNAVAILABLE",
            ScanError::DecodeCapabilityMissing => "DECODE_CAPABILITY_MISSING",
            ScanError::UnrecognizedFormat => "UNRECOGNIZED_FORMAT",
            ScanError::NoIdentityKey => "NO_IDENTITY_KEY",
        }
    }

    /// True when scanning cannot start or continue.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ScanError::CapabilityUnsupported(_)
                | ScanError::PermissionDenied
                | ScanError::NoCameraFound
                | ScanError::CameraUnavailable(_)
        )
    }
}

impl std::fmt::Display for ScanError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanError::CapabilityUnsupported(reason) => {
                write!(f, "{}: {}", self.code(), reason)
            }
            ScanError::PermissionDenied => {
                write!(f, "{}: camera access was denied", self.code())
            }
            ScanError::NoCameraFound => write!(f, "{}: no camera device found", self.code()),
            ScanError::CameraUnavailable(reason) => write!(f, "{}: {}", self.code(), reason),
            ScanError::DecodeCapabilityMissing => write!(
                f,
                "{}: secure payload needs inflate support, which this build lacks",
                self.code()
            ),
            ScanError::UnrecognizedFormat => {
                write!(f, "{}: payload matched no known format", self.code())
            }
            ScanError::NoIdentityKey => write!(
                f,
                "{}: record has no identity field to key on",
                self.code()
            ),
        }
    }
}

impl std::error::Error for ScanError {}

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> Result<u64> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_millis() as u64)
}
