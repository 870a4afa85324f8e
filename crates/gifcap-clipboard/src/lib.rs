//! Clipboard publishing for gifcap.
//!
//! On Windows a produced GIF is offered as a file drop, then as raw GIF
//! bytes, then as a bitmap of its first frame with the path as text. Each
//! format is placed in its own clipboard transaction and the first one that
//! lands wins. Elsewhere the absolute path is copied as plain text.

mod backend;
mod error;
mod formats;
#[cfg(test)]
mod mock;
mod transaction;
#[cfg(windows)]
mod win32;

pub use backend::{detect_backend, ClipboardBackend, RichClipboard};
#[cfg(not(windows))]
pub use backend::TextClipboard;
pub use error::ClipboardError;
pub use formats::{
    dib_from_rgb, drop_files, first_frame_dib, unicode_text, ClipboardEntry, ClipboardFormat,
    ClipboardPayload, ImageFormat, CF_DIB, CF_HDROP, CF_UNICODETEXT, GIF_FORMAT_NAME,
};
pub use transaction::{ClipboardApi, ClipboardConfig, ClipboardTransaction};
#[cfg(windows)]
pub use win32::Win32Clipboard;

/// Result type for clipboard operations.
pub type ClipboardResult<T> = Result<T, ClipboardError>;
