//! Error types for the clipboard module.

use thiserror::Error;

/// Errors that can occur while publishing to the clipboard.
#[derive(Debug, Error)]
pub enum ClipboardError {
    /// Windows API error.
    #[error("Windows API error: {message}")]
    WindowsApi {
        message: String,
        #[cfg(windows)]
        #[source]
        source: Option<windows::core::Error>,
    },

    /// Another process kept the clipboard open.
    #[error("Clipboard busy after {attempts} attempts")]
    Busy { attempts: u32 },

    /// A clipboard entry was rejected.
    #[error("Failed to set clipboard format {format}: {message}")]
    SetData { format: u32, message: String },

    /// A custom format could not be registered.
    #[error("Failed to register clipboard format {0:?}")]
    RegisterFormat(String),

    /// Text clipboard error.
    #[error("Text clipboard error: {0}")]
    Text(String),

    /// Image decoding error.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(windows)]
impl From<windows::core::Error> for ClipboardError {
    fn from(err: windows::core::Error) -> Self {
        Self::WindowsApi {
            message: err.message().to_string(),
            source: Some(err),
        }
    }
}
