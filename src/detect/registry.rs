use crate::ScanError;

use super::backend::{CodeFormat, DetectionBackend, NativeDetector, SoftwareDecoder};

/// Startup capability report for the execution environment.
///
/// The prober is filled with whatever the environment offers, then consumed
/// once by `probe()`. Nothing is retried.
#[derive(Default)]
pub struct CapabilityProber {
    secure_context: bool,
    native: Option<Box<dyn NativeDetector>>,
    software: Option<Box<dyn SoftwareDecoder>>,
}

impl CapabilityProber {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the context may request camera access at all.
    pub fn secure_context(mut self, secure: bool) -> Self {
        self.secure_context = secure;
        self
    }

    /// Register the platform's native detector, if one exists.
    pub fn with_native<D: NativeDetector + 'static>(mut self, detector: D) -> Self {
        self.native = Some(Box::new(detector));
        self
    }

    /// Register the software fallback decoder, if one is bundled.
    pub fn with_software<S: SoftwareDecoder + 'static>(mut self, decoder: S) -> Self {
        self.software = Some(Box::new(decoder));
        self
    }

    /// Pick the backend: native (configured for QR) first, then software.
    pub fn probe(self) -> Capabilities {
        let mut backend = None;

        if let Some(mut native) = self.native {
            let formats = native.supported_formats();
            if !formats.contains(&CodeFormat::Qr) {
                let names: Vec<&str> = formats.iter().map(CodeFormat::as_str).collect();
                log::warn!(
                    "native detector {} cannot read QR codes (supports: {})",
                    native.name(),
                    names.join(", ")
                );
            } else if let Err(e) = native.configure(&[CodeFormat::Qr]) {
                log::warn!("native detector {} rejected QR config: {}", native.name(), e);
            } else {
                backend = Some(DetectionBackend::Native(native));
            }
        }

        if backend.is_none() {
            backend = self.software.map(DetectionBackend::Software);
        }

        match &backend {
            Some(selected) => log::info!("detection backend: {:?}", selected),
            None => log::warn!("no detection backend available"),
        }

        Capabilities {
            secure_context: self.secure_context,
            backend,
        }
    }
}

/// Result of probing. Both the backend and the secure context are required
/// to start scanning.
#[derive(Debug)]
pub struct Capabilities {
    pub secure_context: bool,
    pub backend: Option<DetectionBackend>,
}

impl Capabilities {
    pub fn backend_name(&self) -> Option<&'static str> {
        self.backend.as_ref().map(DetectionBackend::name)
    }

    pub fn can_scan(&self) -> bool {
        self.secure_context && self.backend.is_some()
    }

    /// Take the selected backend, failing when scanning is not possible.
    pub fn into_backend(self) -> Result<DetectionBackend, ScanError> {
        if !self.secure_context {
            return Err(ScanError::CapabilityUnsupported(
                "camera access requires a secure context".to_string(),
            ));
        }
        self.backend.ok_or_else(|| {
            ScanError::CapabilityUnsupported("no code detection backend available".to_string())
        })
    }
}
