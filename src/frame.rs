//! Frame handles and scan buffers.
//!
//! - `VideoFrame`: the camera's current frame, handed to native detectors as-is.
//! - `ScanFrame`: a downscaled RGBA copy for software decoders. Created per
//!   detection attempt and zeroized on drop; never stored.

use anyhow::{anyhow, Result};
use zeroize::Zeroize;

/// Hard cap on the working width of software scan buffers.
pub const MAX_SCAN_WIDTH: u32 = 640;

const RGBA_CHANNELS: usize = 4;

// ----------------------------------------------------------------------------
// VideoFrame: live camera frame handle
// ----------------------------------------------------------------------------

/// Current frame of a camera stream.
#[derive(Clone)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    /// Capture time in stream milliseconds.
    pub timestamp_ms: u64,
    rgba: Vec<u8>,
}

impl VideoFrame {
    /// Wrap RGBA8 pixels. The buffer length must match the dimensions.
    pub fn from_rgba(width: u32, height: u32, rgba: Vec<u8>, timestamp_ms: u64) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(RGBA_CHANNELS))
            .ok_or_else(|| anyhow!("RGBA frame dimensions overflow"))?;
        if width == 0 || height == 0 {
            return Err(anyhow!("frame dimensions must be non-zero"));
        }
        if rgba.len() != expected {
            return Err(anyhow!(
                "RGBA frame length mismatch: expected {}, got {}",
                expected,
                rgba.len()
            ));
        }
        Ok(Self {
            width,
            height,
            timestamp_ms,
            rgba,
        })
    }

    /// Uniformly filled frame, used by synthetic cameras.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4], timestamp_ms: u64) -> Result<Self> {
        let pixels = rgba.repeat((width as usize) * (height as usize));
        Self::from_rgba(width, height, pixels, timestamp_ms)
    }

    pub fn rgba(&self) -> &[u8] {
        &self.rgba
    }
}

impl std::fmt::Debug for VideoFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("timestamp_ms", &self.timestamp_ms)
            .finish_non_exhaustive()
    }
}

// ----------------------------------------------------------------------------
// ScanFrame: capped-width working buffer
// ----------------------------------------------------------------------------

/// Ephemeral RGBA buffer for one software detection attempt.
///
/// Not `Clone`; the pixels are wiped when the frame is dropped.
pub struct ScanFrame {
    pub width: u32,
    pub height: u32,
    pixels: Vec<u8>,
}

impl ScanFrame {
    /// Downscale `frame` to at most `max_width` pixels wide, preserving aspect
    /// ratio. Frames already narrow enough are copied unchanged.
    pub fn capture(frame: &VideoFrame, max_width: u32) -> Self {
        let max_width = max_width.max(1);
        if frame.width <= max_width {
            return Self {
                width: frame.width,
                height: frame.height,
                pixels: frame.rgba.clone(),
            };
        }

        let width = max_width;
        let scaled = (frame.height as u64 * width as u64) / frame.width as u64;
        let height = (scaled as u32).max(1);

        let src_w = frame.width as usize;
        let mut pixels = Vec::with_capacity(width as usize * height as usize * RGBA_CHANNELS);
        for y in 0..height as u64 {
            let src_y = (y * frame.height as u64 / height as u64) as usize;
            for x in 0..width as u64 {
                let src_x = (x * frame.width as u64 / width as u64) as usize;
                let offset = (src_y * src_w + src_x) * RGBA_CHANNELS;
                pixels.extend_from_slice(&frame.rgba[offset..offset + RGBA_CHANNELS]);
            }
        }

        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

impl Drop for ScanFrame {
    fn drop(&mut self) {
        self.pixels.zeroize();
    }
}
