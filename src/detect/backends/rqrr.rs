use crate::detect::backend::SoftwareDecoder;

/// Pure-Rust QR decoder (rqrr) over an RGBA buffer.
///
/// Converts to 8-bit luma, locates grids and returns the first grid that
/// decodes to non-empty text.
#[derive(Default)]
pub struct RqrrDecoder;

impl RqrrDecoder {
    pub fn new() -> Self {
        Self
    }
}

fn luma(rgba: &[u8]) -> Vec<u8> {
    rgba.chunks_exact(4)
        .map(|px| {
            let y = 299 * px[0] as u32 + 587 * px[1] as u32 + 114 * px[2] as u32;
            (y / 1000) as u8
        })
        .collect()
}

impl SoftwareDecoder for RqrrDecoder {
    fn name(&self) -> &'static str {
        "rqrr"
    }

    fn decode_rgba(&mut self, rgba: &[u8], width: u32, height: u32) -> Option<String> {
        let w = width as usize;
        let h = height as usize;
        let gray = luma(rgba);
        if gray.len() != w * h {
            log::debug!("rqrr: buffer does not match {}x{}", width, height);
            return None;
        }

        let mut prepared =
            ::rqrr::PreparedImage::prepare_from_greyscale(w, h, |x, y| gray[y * w + x]);
        for grid in prepared.detect_grids() {
            match grid.decode() {
                Ok((_meta, content)) if !content.is_empty() => return Some(content),
                Ok(_) => {}
                Err(e) => log::debug!("rqrr: grid failed to decode: {:?}", e),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luma_weights() {
        assert_eq!(luma(&[255, 255, 255, 255, 0, 0, 0, 255]), vec![255, 0]);
        assert_eq!(luma(&[255, 0, 0, 255]), vec![76]);
    }

    #[test]
    fn blank_frame_has_no_code() {
        let mut decoder = RqrrDecoder::new();
        let rgba = vec![255u8; 64 * 64 * 4];
        assert_eq!(decoder.decode_rgba(&rgba, 64, 64), None);
    }
}
