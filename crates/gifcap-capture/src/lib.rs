//! Screen region capture for gifcap.
//!
//! This crate resolves user selections to physical capture regions on a
//! multi-monitor desktop and grabs the pixels inside them.

mod error;
mod frame;
mod geometry;
mod grabber;
mod monitor;

pub use error::CaptureError;
pub use frame::{CapturedFrame, PixelFormat};
pub use geometry::{resolve_unscaled, MonitorLayout};
pub use grabber::{platform_grabber, ScreenGrabber};
pub use monitor::{
    enable_dpi_awareness, enumerate_monitors, MonitorSource, StaticMonitors, SystemMonitors,
};

/// Result type for capture operations.
pub type CaptureResult<T> = Result<T, CaptureError>;
