//! Captured frame types.

use bytes::Bytes;

use crate::error::CaptureError;
use crate::CaptureResult;

/// Byte order of a 4-channel captured pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Blue, green, red, alpha (GDI).
    Bgra8,

    /// Red, green, blue, alpha (xcap, `image`).
    Rgba8,
}

/// A captured screen region.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// Packed 4-byte pixels, top-down rows, no padding.
    pub data: Bytes,

    /// Frame width in pixels.
    pub width: u32,

    /// Frame height in pixels.
    pub height: u32,

    /// Channel order of `data`.
    pub format: PixelFormat,
}

impl CapturedFrame {
    /// Create a new captured frame.
    pub fn new(data: Bytes, width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            data,
            width,
            height,
            format,
        }
    }

    /// Expected buffer size for a 4-byte-per-pixel frame.
    pub fn buffer_size(width: u32, height: u32) -> usize {
        width as usize * height as usize * 4
    }

    /// Validate that the frame data matches expected dimensions.
    pub fn is_valid(&self) -> bool {
        self.data.len() == Self::buffer_size(self.width, self.height)
    }

    /// Convert to packed BGR24, dropping the alpha channel.
    pub fn to_bgr24(&self) -> CaptureResult<Vec<u8>> {
        if !self.is_valid() {
            return Err(CaptureError::FrameConversion(format!(
                "expected {} bytes for {}x{}, got {}",
                Self::buffer_size(self.width, self.height),
                self.width,
                self.height,
                self.data.len()
            )));
        }

        let mut out = Vec::with_capacity(self.width as usize * self.height as usize * 3);
        match self.format {
            PixelFormat::Bgra8 => {
                for px in self.data.chunks_exact(4) {
                    out.extend_from_slice(&px[..3]);
                }
            }
            PixelFormat::Rgba8 => {
                for px in self.data.chunks_exact(4) {
                    out.extend_from_slice(&[px[2], px[1], px[0]]);
                }
            }
        }
        Ok(out)
    }
}
