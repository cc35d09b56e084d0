use anyhow::Result;

use crate::frame::VideoFrame;

/// Optical code symbologies a native detector may report.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CodeFormat {
    Qr,
    DataMatrix,
    Pdf417,
}

impl CodeFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            CodeFormat::Qr => "qr_code",
            CodeFormat::DataMatrix => "data_matrix",
            CodeFormat::Pdf417 => "pdf417",
        }
    }
}

/// One code found by a native detector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DetectedCode {
    pub format: CodeFormat,
    pub raw_value: String,
}

/// Platform-provided detector operating directly on video frames.
///
/// # Audit Boundary
///
/// Implementations receive the live frame handle and MUST NOT retain it past
/// the `detect` call.
pub trait NativeDetector: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Symbologies this detector can recognize.
    fn supported_formats(&self) -> Vec<CodeFormat>;

    /// Restrict detection to `formats`.
    fn configure(&mut self, formats: &[CodeFormat]) -> Result<()>;

    /// Detect codes in the frame. An empty list means nothing was found.
    fn detect(&mut self, frame: &VideoFrame) -> Result<Vec<DetectedCode>>;
}

/// Pure-software fallback decoding an RGBA pixel buffer.
pub trait SoftwareDecoder: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Decode at most one code from `rgba`. Implementations must treat the
    /// pixel slice as read-only and ephemeral.
    fn decode_rgba(&mut self, rgba: &[u8], width: u32, height: u32) -> Option<String>;
}

/// The one detection backend active for a session.
pub enum DetectionBackend {
    Native(Box<dyn NativeDetector>),
    Software(Box<dyn SoftwareDecoder>),
}

impl DetectionBackend {
    pub fn name(&self) -> &'static str {
        match self {
            DetectionBackend::Native(detector) => detector.name(),
            DetectionBackend::Software(decoder) => decoder.name(),
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, DetectionBackend::Native(_))
    }
}

impl std::fmt::Debug for DetectionBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectionBackend::Native(detector) => write!(f, "Native({})", detector.name()),
            DetectionBackend::Software(decoder) => write!(f, "Software({})", decoder.name()),
        }
    }
}
