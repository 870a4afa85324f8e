//! Screen pixel grabbing.

use gifcap_ipc::CaptureRegion;

use crate::frame::CapturedFrame;
use crate::CaptureResult;

/// A source of pixels for a physical screen region.
pub trait ScreenGrabber: Send {
    /// Grab the pixels inside `region`.
    ///
    /// The returned frame always has the exact size of the region.
    fn grab(&mut self, region: &CaptureRegion) -> CaptureResult<CapturedFrame>;

    /// Get grabber name for diagnostics.
    fn name(&self) -> &'static str;
}

/// Create the grabber for the current platform.
#[cfg(windows)]
pub fn platform_grabber() -> CaptureResult<Box<dyn ScreenGrabber>> {
    Ok(Box::new(gdi::GdiGrabber::new()))
}

/// Create the grabber for the current platform.
#[cfg(all(not(windows), feature = "xcap"))]
pub fn platform_grabber() -> CaptureResult<Box<dyn ScreenGrabber>> {
    Ok(Box::new(xcap_grabber::XcapGrabber::new()))
}

/// Create the grabber for the current platform (stub without a backend).
#[cfg(all(not(windows), not(feature = "xcap")))]
pub fn platform_grabber() -> CaptureResult<Box<dyn ScreenGrabber>> {
    Err(crate::CaptureError::NotSupported(
        "Screen grabbing requires Windows or the `xcap` feature".into(),
    ))
}

#[cfg(windows)]
mod gdi {
    use bytes::Bytes;
    use tracing::trace;
    use windows::Win32::Foundation::HWND;
    use windows::Win32::Graphics::Gdi::{
        BitBlt, CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject, GetDC,
        GetDIBits, ReleaseDC, SelectObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, CAPTUREBLT,
        DIB_RGB_COLORS, RGBQUAD, ROP_CODE, SRCCOPY,
    };

    use gifcap_ipc::CaptureRegion;

    use super::ScreenGrabber;
    use crate::error::CaptureError;
    use crate::frame::{CapturedFrame, PixelFormat};
    use crate::CaptureResult;

    /// GDI `BitBlt` grabber for the virtual desktop.
    ///
    /// Device contexts are created and released within each grab, so the
    /// grabber holds no thread-affine handles.
    #[derive(Debug, Default)]
    pub struct GdiGrabber;

    impl GdiGrabber {
        pub fn new() -> Self {
            Self
        }
    }

    impl ScreenGrabber for GdiGrabber {
        fn grab(&mut self, region: &CaptureRegion) -> CaptureResult<CapturedFrame> {
            let width = region.width as i32;
            let height = region.height as i32;
            let mut buffer = vec![0u8; CapturedFrame::buffer_size(region.width, region.height)];

            unsafe {
                let screen_dc = GetDC(HWND::default());
                if screen_dc.is_invalid() {
                    return Err(CaptureError::WindowsApi {
                        message: "GetDC failed".to_string(),
                        source: None,
                    });
                }
                let mem_dc = CreateCompatibleDC(screen_dc);
                let bitmap = CreateCompatibleBitmap(screen_dc, width, height);
                let old_bitmap = SelectObject(mem_dc, bitmap);

                let blit = BitBlt(
                    mem_dc,
                    0,
                    0,
                    width,
                    height,
                    screen_dc,
                    region.left,
                    region.top,
                    ROP_CODE(SRCCOPY.0 | CAPTUREBLT.0),
                );

                let mut bmi = BITMAPINFO {
                    bmiHeader: BITMAPINFOHEADER {
                        biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                        biWidth: width,
                        // Negative height requests top-down rows.
                        biHeight: -height,
                        biPlanes: 1,
                        biBitCount: 32,
                        biCompression: BI_RGB.0,
                        ..Default::default()
                    },
                    bmiColors: [RGBQUAD::default()],
                };

                let lines = if blit.is_ok() {
                    GetDIBits(
                        mem_dc,
                        bitmap,
                        0,
                        height as u32,
                        Some(buffer.as_mut_ptr() as *mut std::ffi::c_void),
                        &mut bmi,
                        DIB_RGB_COLORS,
                    )
                } else {
                    0
                };

                SelectObject(mem_dc, old_bitmap);
                let _ = DeleteObject(bitmap);
                let _ = DeleteDC(mem_dc);
                ReleaseDC(HWND::default(), screen_dc);

                blit?;
                if lines != height {
                    return Err(CaptureError::Grab(format!(
                        "GetDIBits copied {} of {} lines",
                        lines, height
                    )));
                }
            }

            trace!(left = region.left, top = region.top, width, height, "GDI grab");
            Ok(CapturedFrame::new(
                Bytes::from(buffer),
                region.width,
                region.height,
                PixelFormat::Bgra8,
            ))
        }

        fn name(&self) -> &'static str {
            "gdi"
        }
    }
}

#[cfg(all(not(windows), feature = "xcap"))]
mod xcap_grabber {
    use bytes::Bytes;
    use tracing::trace;
    use xcap::image::imageops;
    use xcap::Monitor;

    use gifcap_ipc::CaptureRegion;

    use super::ScreenGrabber;
    use crate::error::CaptureError;
    use crate::frame::{CapturedFrame, PixelFormat};
    use crate::CaptureResult;

    /// Grabber compositing the region from per-monitor screenshots.
    #[derive(Debug, Default)]
    pub struct XcapGrabber;

    impl XcapGrabber {
        pub fn new() -> Self {
            Self
        }
    }

    impl ScreenGrabber for XcapGrabber {
        fn grab(&mut self, region: &CaptureRegion) -> CaptureResult<CapturedFrame> {
            let monitors = Monitor::all().map_err(|e| CaptureError::Grab(e.to_string()))?;
            let stride = region.width as usize * 4;
            let mut buffer = vec![0u8; CapturedFrame::buffer_size(region.width, region.height)];
            let mut covered = false;

            for monitor in &monitors {
                let mx = monitor.x().unwrap_or(0) as i64;
                let my = monitor.y().unwrap_or(0) as i64;
                let mw = monitor.width().unwrap_or(0) as i64;
                let mh = monitor.height().unwrap_or(0) as i64;

                let left = (region.left as i64).max(mx);
                let top = (region.top as i64).max(my);
                let right = region.right().min(mx + mw);
                let bottom = region.bottom().min(my + mh);
                if right <= left || bottom <= top {
                    continue;
                }

                let shot = monitor
                    .capture_image()
                    .map_err(|e| CaptureError::Grab(e.to_string()))?;
                let part = imageops::crop_imm(
                    &shot,
                    (left - mx) as u32,
                    (top - my) as u32,
                    (right - left) as u32,
                    (bottom - top) as u32,
                )
                .to_image();
                if part.width() == 0 || part.height() == 0 {
                    continue;
                }

                let part_stride = part.width() as usize * 4;
                let dst_x = (left - region.left as i64) as usize * 4;
                let dst_y = (top - region.top as i64) as usize;
                for (row, src) in part.as_raw().chunks_exact(part_stride).enumerate() {
                    let start = (dst_y + row) * stride + dst_x;
                    buffer[start..start + part_stride].copy_from_slice(src);
                }
                covered = true;
            }

            if !covered {
                return Err(CaptureError::Grab(format!(
                    "region {:?} is not on any monitor",
                    region
                )));
            }

            trace!(left = region.left, top = region.top, "xcap grab");
            Ok(CapturedFrame::new(
                Bytes::from(buffer),
                region.width,
                region.height,
                PixelFormat::Rgba8,
            ))
        }

        fn name(&self) -> &'static str {
            "xcap"
        }
    }
}
