//! Clipboard backends.

use std::fs;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::{info, instrument, warn};

use crate::formats::{first_frame_dib, ClipboardPayload, ImageFormat};
use crate::transaction::{ClipboardApi, ClipboardConfig, ClipboardTransaction};
use crate::ClipboardResult;

/// Places produced files on the system clipboard.
///
/// Failures are logged and reported as `false`.
pub trait ClipboardBackend {
    /// Publish a file, preferring a file reference.
    fn publish(&mut self, path: &Path) -> bool;

    /// Publish image data only.
    fn publish_image(&mut self, path: &Path) -> bool;
}

/// Clipboard with rich formats, tried in priority order.
pub struct RichClipboard<A: ClipboardApi> {
    api: A,
    config: ClipboardConfig,
}

impl<A: ClipboardApi> RichClipboard<A> {
    /// Create a rich clipboard backend.
    pub fn new(api: A, config: ClipboardConfig) -> Self {
        Self { api, config }
    }

    /// The underlying clipboard.
    pub fn api(&self) -> &A {
        &self.api
    }

    fn place(&mut self, payload: &ClipboardPayload) -> ClipboardResult<()> {
        let mut transaction = ClipboardTransaction::begin(&mut self.api, &self.config)?;
        for entry in payload.entries() {
            match transaction.set(&entry) {
                Ok(()) => {}
                Err(e) if entry.required => return Err(e),
                Err(e) => warn!(payload = payload.name(), "Optional clipboard entry failed: {}", e),
            }
        }
        Ok(())
    }

    fn try_place(&mut self, payload: &ClipboardPayload) -> bool {
        match self.place(payload) {
            Ok(()) => {
                info!(payload = payload.name(), "Published to clipboard");
                true
            }
            Err(e) => {
                warn!(payload = payload.name(), "Clipboard format failed: {}", e);
                false
            }
        }
    }

    fn publish_formats(&mut self, path: &Path, with_file_drop: bool) -> bool {
        let Some(path) = existing_absolute(path) else {
            return false;
        };

        if with_file_drop && self.try_place(&ClipboardPayload::FileReference(path.clone())) {
            return true;
        }

        let bytes = match fs::read(&path) {
            Ok(bytes) => Bytes::from(bytes),
            Err(e) => {
                warn!(path = %path.display(), "Failed to read image: {}", e);
                return false;
            }
        };

        let gif = ClipboardPayload::ImageBytes {
            format: ImageFormat::Gif,
            bytes: bytes.clone(),
            source: path.clone(),
        };
        if self.try_place(&gif) {
            return true;
        }

        match first_frame_dib(&bytes) {
            Ok(dib) => self.try_place(&ClipboardPayload::ImageBytes {
                format: ImageFormat::Dib,
                bytes: dib,
                source: path,
            }),
            Err(e) => {
                warn!("Failed to decode first frame: {}", e);
                false
            }
        }
    }
}

impl<A: ClipboardApi> ClipboardBackend for RichClipboard<A> {
    #[instrument(name = "clipboard_publish", skip(self))]
    fn publish(&mut self, path: &Path) -> bool {
        self.publish_formats(path, true)
    }

    #[instrument(name = "clipboard_publish_image", skip(self))]
    fn publish_image(&mut self, path: &Path) -> bool {
        self.publish_formats(path, false)
    }
}

/// Clipboard holding the absolute file path as text.
#[cfg(not(windows))]
pub struct TextClipboard {
    clipboard: arboard::Clipboard,
}

#[cfg(not(windows))]
impl TextClipboard {
    /// Connect to the system clipboard.
    pub fn new() -> ClipboardResult<Self> {
        let clipboard =
            arboard::Clipboard::new().map_err(|e| crate::ClipboardError::Text(e.to_string()))?;
        Ok(Self { clipboard })
    }

    fn copy_path(&mut self, path: &Path) -> bool {
        let Some(path) = existing_absolute(path) else {
            return false;
        };
        let text = path.to_string_lossy().into_owned();
        match self.clipboard.set_text(text) {
            Ok(()) => {
                info!(path = %path.display(), "Copied path to clipboard");
                true
            }
            Err(e) => {
                warn!("Failed to copy path to clipboard: {}", e);
                false
            }
        }
    }
}

#[cfg(not(windows))]
impl ClipboardBackend for TextClipboard {
    #[instrument(name = "clipboard_publish", skip(self))]
    fn publish(&mut self, path: &Path) -> bool {
        self.copy_path(path)
    }

    #[instrument(name = "clipboard_publish_image", skip(self))]
    fn publish_image(&mut self, path: &Path) -> bool {
        self.copy_path(path)
    }
}

/// Select the clipboard backend for this platform.
#[cfg(windows)]
pub fn detect_backend(config: &ClipboardConfig) -> ClipboardResult<Box<dyn ClipboardBackend>> {
    info!("Using native rich clipboard");
    Ok(Box::new(RichClipboard::new(
        crate::win32::Win32Clipboard::new(),
        *config,
    )))
}

/// Select the clipboard backend for this platform.
#[cfg(not(windows))]
pub fn detect_backend(_config: &ClipboardConfig) -> ClipboardResult<Box<dyn ClipboardBackend>> {
    let backend = TextClipboard::new()?;
    info!("Using plain-text clipboard");
    Ok(Box::new(backend))
}

fn existing_absolute(path: &Path) -> Option<PathBuf> {
    let absolute = match std::path::absolute(path) {
        Ok(p) => p,
        Err(e) => {
            warn!(path = %path.display(), "Failed to resolve path: {}", e);
            return None;
        }
    };
    if !absolute.is_file() {
        warn!(path = %absolute.display(), "Nothing to publish");
        return None;
    }
    Some(absolute)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::{dib_from_rgb, drop_files, CF_DIB, CF_HDROP, CF_UNICODETEXT, GIF_FORMAT_NAME};
    use crate::mock::MockClipboard;
    use image::codecs::gif::GifEncoder;
    use image::{Delay, Frame, Rgb, RgbImage, Rgba, RgbaImage};
    use std::time::Duration;

    fn write_gif(dir: &Path) -> PathBuf {
        let path = dir.join("clip.gif");
        let mut bytes = Vec::new();
        {
            let mut encoder = GifEncoder::new(&mut bytes);
            let frame = RgbaImage::from_pixel(3, 2, Rgba([200, 10, 10, 255]));
            encoder
                .encode_frame(Frame::from_parts(frame, 0, 0, Delay::from_numer_denom_ms(100, 1)))
                .unwrap();
        }
        fs::write(&path, bytes).unwrap();
        path
    }

    fn rich(api: MockClipboard) -> RichClipboard<MockClipboard> {
        RichClipboard::new(
            api,
            ClipboardConfig {
                open_attempts: 5,
                retry_delay: Duration::ZERO,
            },
        )
    }

    #[test]
    fn test_file_drop_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_gif(dir.path());
        let mut clipboard = rich(MockClipboard::default());

        assert!(clipboard.publish(&path));

        let contents = &clipboard.api().contents;
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[&CF_HDROP], drop_files(&path).to_vec());
        assert!(!clipboard.api().is_open);
    }

    #[test]
    fn test_gif_format_when_file_drop_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_gif(dir.path());
        let mut clipboard = rich(MockClipboard::default().failing(CF_HDROP));

        assert!(clipboard.publish(&path));

        let gif_id = clipboard.api().registered_id(GIF_FORMAT_NAME).unwrap();
        let contents = &clipboard.api().contents;
        assert_eq!(contents.keys().copied().collect::<Vec<_>>(), vec![gif_id]);
        assert_eq!(contents[&gif_id], fs::read(&path).unwrap());
    }

    #[test]
    fn test_bitmap_and_text_when_others_fail() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_gif(dir.path());
        let mut clipboard = rich(
            MockClipboard::default()
                .failing(CF_HDROP)
                .failing_named(GIF_FORMAT_NAME),
        );

        assert!(clipboard.publish(&path));

        let contents = &clipboard.api().contents;
        assert_eq!(
            contents.keys().copied().collect::<Vec<_>>(),
            vec![CF_DIB, CF_UNICODETEXT]
        );

        let expected = dib_from_rgb(&RgbImage::from_pixel(3, 2, Rgb([200, 10, 10]))).unwrap();
        assert_eq!(contents[&CF_DIB].len(), expected.len());
        assert_eq!(&contents[&CF_DIB][..40], &expected[..40]);

        let text: Vec<u16> = contents[&CF_UNICODETEXT]
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        let absolute = std::path::absolute(&path).unwrap();
        assert_eq!(
            String::from_utf16(&text[..text.len() - 1]).unwrap(),
            absolute.to_string_lossy()
        );
        // One transaction per attempted format.
        assert_eq!(clipboard.api().open_calls, 3);
        assert_eq!(clipboard.api().close_calls, 3);
    }

    #[test]
    fn test_text_failure_does_not_fail_bitmap() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_gif(dir.path());
        let mut clipboard = rich(
            MockClipboard::default()
                .failing(CF_HDROP)
                .failing_named(GIF_FORMAT_NAME)
                .failing(CF_UNICODETEXT),
        );

        assert!(clipboard.publish(&path));
        let keys: Vec<u32> = clipboard.api().contents.keys().copied().collect();
        assert_eq!(keys, vec![CF_DIB]);
    }

    #[test]
    fn test_all_formats_fail() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_gif(dir.path());
        let mut clipboard = rich(
            MockClipboard::default()
                .failing(CF_HDROP)
                .failing_named(GIF_FORMAT_NAME)
                .failing(CF_DIB),
        );

        assert!(!clipboard.publish(&path));
        assert!(!clipboard.api().is_open);
    }

    #[test]
    fn test_publish_image_skips_file_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_gif(dir.path());
        let mut clipboard = rich(MockClipboard::default());

        assert!(clipboard.publish_image(&path));
        let gif_id = clipboard.api().registered_id(GIF_FORMAT_NAME).unwrap();
        assert!(clipboard.api().contents.contains_key(&gif_id));
        assert!(!clipboard.api().contents.contains_key(&CF_HDROP));
    }

    #[test]
    fn test_busy_clipboard_falls_through_and_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_gif(dir.path());
        let mut clipboard = rich(MockClipboard::busy_for(u32::MAX));

        assert!(!clipboard.publish(&path));
        // Five attempts for each of the three formats.
        assert_eq!(clipboard.api().open_calls, 15);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut clipboard = rich(MockClipboard::default());
        assert!(!clipboard.publish(&dir.path().join("missing.gif")));
        assert_eq!(clipboard.api().open_calls, 0);
    }
}
