mod backend;
pub mod backends;
mod registry;

pub use backend::{CodeFormat, DetectedCode, DetectionBackend, NativeDetector, SoftwareDecoder};
pub use backends::{ScriptedNativeDetector, ScriptedSoftwareDecoder};
pub use registry::{Capabilities, CapabilityProber};
