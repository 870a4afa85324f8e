//! Common types shared by the UI layer and the capture core.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A rectangle drawn by the user, in logical (DPI-independent) units.
///
/// Width and height may be negative while a drag is in progress; call
/// [`SelectionRect::normalized`] before using it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl SelectionRect {
    /// Create a new selection rectangle.
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build a normalized rectangle spanning two drag points.
    pub fn from_corners(a: (i32, i32), b: (i32, i32)) -> Self {
        Self {
            x: a.0.min(b.0),
            y: a.1.min(b.1),
            width: saturating_i32(a.0.abs_diff(b.0)),
            height: saturating_i32(a.1.abs_diff(b.1)),
        }
    }

    /// Return the same rectangle with non-negative width and height.
    ///
    /// Coordinates that would leave the `i32` range saturate.
    pub fn normalized(&self) -> Self {
        let (x, width) = if self.width < 0 {
            (self.x.saturating_add(self.width), self.width.saturating_neg())
        } else {
            (self.x, self.width)
        };
        let (y, height) = if self.height < 0 {
            (self.y.saturating_add(self.height), self.height.saturating_neg())
        } else {
            (self.y, self.height)
        };
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Returns true if the rectangle covers no area.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

fn saturating_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// A rectangle in physical pixels, absolute on the virtual desktop.
///
/// Width and height are always at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CaptureRegion {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

impl CaptureRegion {
    /// Create a new capture region. Zero extents are raised to 1.
    pub fn new(left: i32, top: i32, width: u32, height: u32) -> Self {
        Self {
            left,
            top,
            width: width.max(1),
            height: height.max(1),
        }
    }

    /// Exclusive right edge.
    pub fn right(&self) -> i64 {
        self.left as i64 + self.width as i64
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> i64 {
        self.top as i64 + self.height as i64
    }

    /// Returns true if `other` lies entirely within this region.
    pub fn contains_region(&self, other: &CaptureRegion) -> bool {
        other.left >= self.left
            && other.top >= self.top
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }
}

/// A physical display as reported by the window system.
///
/// `left`/`top` is the monitor origin as the OS reports it and is treated
/// as already physical. `width`/`height` are physical pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorDescriptor {
    /// Monitor name or device path.
    pub name: String,

    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,

    /// DPI scaling ratio, never below 1.0.
    pub scale_factor: f64,

    /// Whether this is the primary monitor.
    pub is_primary: bool,
}

impl MonitorDescriptor {
    /// Create a new monitor descriptor. Scale factors below 1.0 (or not
    /// finite) are treated as 1.0.
    pub fn new(left: i32, top: i32, width: u32, height: u32, scale_factor: f64) -> Self {
        let scale_factor = if scale_factor.is_finite() && scale_factor >= 1.0 {
            scale_factor
        } else {
            1.0
        };

        Self {
            name: String::new(),
            left,
            top,
            width,
            height,
            scale_factor,
            is_primary: false,
        }
    }

    /// Mark this monitor as the primary one.
    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self
    }

    /// Attach a display name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Width in logical units.
    pub fn logical_width(&self) -> f64 {
        self.width as f64 / self.scale_factor
    }

    /// Height in logical units.
    pub fn logical_height(&self) -> f64 {
        self.height as f64 / self.scale_factor
    }

    /// Returns true if the logical point lies on this monitor.
    pub fn contains_logical(&self, x: i64, y: i64) -> bool {
        let dx = (x - self.left as i64) as f64;
        let dy = (y - self.top as i64) as f64;
        dx >= 0.0 && dy >= 0.0 && dx < self.logical_width() && dy < self.logical_height()
    }

    /// Full monitor bounds as a logical selection.
    pub fn logical_bounds(&self) -> SelectionRect {
        SelectionRect::new(
            self.left,
            self.top,
            self.logical_width().round() as i32,
            self.logical_height().round() as i32,
        )
    }
}

/// Container used for recorded video files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoFormat {
    /// H.264 in MP4, encoded by an external ffmpeg process.
    #[default]
    Mp4,

    /// Motion-JPEG in AVI, written in-process.
    Avi,
}

impl VideoFormat {
    /// File extension without the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Avi => "avi",
        }
    }

    /// Infer the container from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "mp4" => Some(Self::Mp4),
            "avi" => Some(Self::Avi),
            _ => None,
        }
    }
}

/// Invalid configuration values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Frame rate outside the supported range.
    #[error("Frame rate must be between 1 and {max}, got {value}")]
    FrameRate { value: u32, max: u32 },

    /// JPEG quality outside 1..=100.
    #[error("JPEG quality must be between 1 and 100, got {0}")]
    JpegQuality(u8),

    /// Clipboard retry count of zero.
    #[error("Clipboard open attempts must be at least 1")]
    ClipboardAttempts,
}

/// Recorder configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Capture and GIF frame rate.
    pub fps: u32,

    /// Pixels trimmed from every side of the selection so the overlay
    /// border is not recorded.
    pub inset_pixels: u32,

    /// Container for recorded video.
    pub video_format: VideoFormat,

    /// Quality of Motion-JPEG frames (AVI only).
    pub jpeg_quality: u8,

    /// Explicit ffmpeg binary; discovered on PATH when absent.
    pub ffmpeg_path: Option<PathBuf>,

    /// Root directory for `video/`, `gif/` and `logs/`.
    pub output_root: Option<PathBuf>,

    /// How many times to try opening the clipboard.
    pub clipboard_open_attempts: u32,

    /// Delay between clipboard open attempts in milliseconds.
    pub clipboard_retry_delay_ms: u64,
}

impl RecorderConfig {
    /// Highest supported frame rate.
    pub const MAX_FPS: u32 = 60;

    /// Validate value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fps == 0 || self.fps > Self::MAX_FPS {
            return Err(ConfigError::FrameRate {
                value: self.fps,
                max: Self::MAX_FPS,
            });
        }
        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(ConfigError::JpegQuality(self.jpeg_quality));
        }
        if self.clipboard_open_attempts == 0 {
            return Err(ConfigError::ClipboardAttempts);
        }
        Ok(())
    }

    /// Delay between clipboard open attempts.
    pub fn clipboard_retry_delay(&self) -> Duration {
        Duration::from_millis(self.clipboard_retry_delay_ms)
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            fps: 10,
            inset_pixels: 3,
            video_format: VideoFormat::Mp4,
            jpeg_quality: 85,
            ffmpeg_path: None,
            output_root: None,
            clipboard_open_attempts: 5,
            clipboard_retry_delay_ms: 50,
        }
    }
}
