use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use crate::detect::backend::{CodeFormat, DetectedCode, NativeDetector, SoftwareDecoder};
use crate::frame::VideoFrame;
use crate::scanner::StopSignal;

/// Native detector replaying a fixed script, for tests and demos.
///
/// Each `detect` call consumes one step. An exhausted script finds nothing.
pub struct ScriptedNativeDetector {
    steps: VecDeque<Result<Vec<String>, String>>,
    formats: Vec<CodeFormat>,
    configured: Arc<Mutex<Vec<CodeFormat>>>,
    calls: Arc<AtomicUsize>,
    raise_on_detect: Option<StopSignal>,
}

impl ScriptedNativeDetector {
    pub fn new(steps: Vec<Vec<&str>>) -> Self {
        Self {
            steps: steps
                .into_iter()
                .map(|values| Ok(values.into_iter().map(str::to_string).collect()))
                .collect(),
            formats: vec![CodeFormat::Qr, CodeFormat::DataMatrix],
            configured: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(AtomicUsize::new(0)),
            raise_on_detect: None,
        }
    }

    pub fn with_formats(mut self, formats: Vec<CodeFormat>) -> Self {
        self.formats = formats;
        self
    }

    /// Append a step that fails with `message`.
    pub fn then_fail(mut self, message: &str) -> Self {
        self.steps.push_back(Err(message.to_string()));
        self
    }

    /// Raise `signal` while a detection is in flight, as a teardown would.
    pub fn raise_on_detect(mut self, signal: StopSignal) -> Self {
        self.raise_on_detect = Some(signal);
        self
    }

    /// Shared view of the formats passed to `configure`.
    pub fn configured_formats(&self) -> Arc<Mutex<Vec<CodeFormat>>> {
        self.configured.clone()
    }

    /// Shared counter of `detect` calls.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

impl NativeDetector for ScriptedNativeDetector {
    fn name(&self) -> &'static str {
        "scripted-native"
    }

    fn supported_formats(&self) -> Vec<CodeFormat> {
        self.formats.clone()
    }

    fn configure(&mut self, formats: &[CodeFormat]) -> Result<()> {
        let mut configured = self
            .configured
            .lock()
            .map_err(|_| anyhow!("configured formats lock poisoned"))?;
        *configured = formats.to_vec();
        Ok(())
    }

    fn detect(&mut self, _frame: &VideoFrame) -> Result<Vec<DetectedCode>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(signal) = &self.raise_on_detect {
            signal.raise();
        }
        match self.steps.pop_front() {
            Some(Ok(values)) => Ok(values
                .into_iter()
                .map(|raw_value| DetectedCode {
                    format: CodeFormat::Qr,
                    raw_value,
                })
                .collect()),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Ok(Vec::new()),
        }
    }
}

/// Software decoder replaying a fixed script and recording buffer sizes.
pub struct ScriptedSoftwareDecoder {
    steps: VecDeque<Option<String>>,
    seen_sizes: Arc<Mutex<Vec<(u32, u32)>>>,
}

impl ScriptedSoftwareDecoder {
    pub fn new(steps: Vec<Option<&str>>) -> Self {
        Self {
            steps: steps
                .into_iter()
                .map(|step| step.map(str::to_string))
                .collect(),
            seen_sizes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Shared view of the `(width, height)` of every buffer decoded.
    pub fn seen_sizes(&self) -> Arc<Mutex<Vec<(u32, u32)>>> {
        self.seen_sizes.clone()
    }
}

impl SoftwareDecoder for ScriptedSoftwareDecoder {
    fn name(&self) -> &'static str {
        "scripted-software"
    }

    fn decode_rgba(&mut self, rgba: &[u8], width: u32, height: u32) -> Option<String> {
        debug_assert_eq!(rgba.len(), width as usize * height as usize * 4);
        if let Ok(mut sizes) = self.seen_sizes.lock() {
            sizes.push((width, height));
        }
        self.steps.pop_front().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_script_is_consumed_in_order() {
        let frame = VideoFrame::solid(4, 4, [0, 0, 0, 255], 0).unwrap();
        let mut detector = ScriptedNativeDetector::new(vec![vec![], vec!["", "abc"]])
            .then_fail("camera glitch");
        let calls = detector.call_counter();

        assert!(detector.detect(&frame).unwrap().is_empty());
        let found = detector.detect(&frame).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[1].raw_value, "abc");
        assert!(detector.detect(&frame).is_err());
        assert!(detector.detect(&frame).unwrap().is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn software_script_records_sizes() {
        let mut decoder = ScriptedSoftwareDecoder::new(vec![None, Some("hit")]);
        let sizes = decoder.seen_sizes();
        assert_eq!(decoder.decode_rgba(&[0u8; 16], 2, 2), None);
        assert_eq!(decoder.decode_rgba(&[0u8; 4], 1, 1).as_deref(), Some("hit"));
        assert_eq!(decoder.decode_rgba(&[0u8; 4], 1, 1), None);
        assert_eq!(*sizes.lock().unwrap(), vec![(2, 2), (1, 1), (1, 1)]);
    }
}
