//! Error types for the capture module.

use thiserror::Error;

/// Errors that can occur during capture operations.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Windows API error.
    #[error("Windows API error: {message}")]
    WindowsApi {
        message: String,
        #[cfg(windows)]
        #[source]
        source: Option<windows::core::Error>,
    },

    /// The window system reported no monitors.
    #[error("No monitors available")]
    NoMonitors,

    /// Pixel grab failed.
    #[error("Screen grab failed: {0}")]
    Grab(String),

    /// Frame conversion error.
    #[error("Frame conversion error: {0}")]
    FrameConversion(String),

    /// Screen capture not supported on this system.
    #[error("Screen capture not supported: {0}")]
    NotSupported(String),
}

#[cfg(windows)]
impl From<windows::core::Error> for CaptureError {
    fn from(err: windows::core::Error) -> Self {
        Self::WindowsApi {
            message: err.message().to_string(),
            source: Some(err),
        }
    }
}
