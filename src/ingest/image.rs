//! Still-image camera (feature: ingest-image).
//!
//! Presents a decoded PNG/JPEG as a camera whose every frame is that image.
//! Useful for scanning printed codes from photos with the same loop a live
//! camera uses.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::frame::VideoFrame;
use crate::ingest::{Camera, CameraRequest, CameraStream};
use crate::ScanError;

pub struct ImageCamera {
    path: PathBuf,
}

impl ImageCamera {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl Camera for ImageCamera {
    fn open(&mut self, _request: &CameraRequest) -> Result<Box<dyn CameraStream>, ScanError> {
        if !self.path.exists() {
            return Err(ScanError::NoCameraFound);
        }
        let decoded = ::image::open(&self.path).map_err(|e| {
            ScanError::CameraUnavailable(format!("failed to decode {}: {}", self.path.display(), e))
        })?;
        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();
        let frame = VideoFrame::from_rgba(width, height, rgba.into_raw(), 0)
            .map_err(|e| ScanError::CameraUnavailable(e.to_string()))?;
        log::info!(
            "ImageCamera: {} ({}x{})",
            self.path.display(),
            width,
            height
        );
        Ok(Box::new(ImageStream { frame: Some(frame) }))
    }
}

struct ImageStream {
    frame: Option<VideoFrame>,
}

impl CameraStream for ImageStream {
    fn current_frame(&mut self) -> Option<VideoFrame> {
        self.frame.clone()
    }

    fn stop_tracks(&mut self) {
        self.frame = None;
    }
}
