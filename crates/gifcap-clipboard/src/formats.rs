//! Clipboard payloads and their binary encodings.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use bytes::{BufMut, Bytes, BytesMut};
use image::RgbImage;

use crate::ClipboardResult;

/// Device-independent bitmap.
pub const CF_DIB: u32 = 8;

/// UTF-16 text.
pub const CF_UNICODETEXT: u32 = 13;

/// File list, as produced by drag and drop.
pub const CF_HDROP: u32 = 15;

/// Name of the registered format carrying raw GIF bytes.
pub const GIF_FORMAT_NAME: &str = "GIF";

/// Size of the `DROPFILES` header.
const DROPFILES_HEADER_LEN: u32 = 20;

/// Size of the `BITMAPFILEHEADER` that precedes a DIB in a BMP file.
const BMP_FILE_HEADER_LEN: usize = 14;

/// A clipboard format, either predefined or registered by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipboardFormat {
    /// Predefined format id.
    Standard(u32),

    /// Format registered at runtime.
    Registered(&'static str),
}

/// One format/data pair placed on the clipboard.
#[derive(Debug, Clone)]
pub struct ClipboardEntry {
    pub format: ClipboardFormat,
    pub data: Bytes,

    /// Whether the payload fails without this entry.
    pub required: bool,
}

/// Encoding of image bytes placed on the clipboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// Raw animated GIF file contents.
    Gif,

    /// First frame as a device-independent bitmap.
    Dib,
}

/// What a single publish attempt puts on the clipboard.
#[derive(Debug, Clone)]
pub enum ClipboardPayload {
    /// A file drop list holding one absolute path.
    FileReference(PathBuf),

    /// Image data. For [`ImageFormat::Dib`] the `source` path is added as
    /// Unicode text.
    ImageBytes {
        format: ImageFormat,
        bytes: Bytes,
        source: PathBuf,
    },
}

impl ClipboardPayload {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::FileReference(_) => "file-drop",
            Self::ImageBytes {
                format: ImageFormat::Gif,
                ..
            } => "gif",
            Self::ImageBytes {
                format: ImageFormat::Dib,
                ..
            } => "bitmap+text",
        }
    }

    /// Clipboard entries for this payload, all set in one transaction.
    pub fn entries(&self) -> Vec<ClipboardEntry> {
        match self {
            Self::FileReference(path) => vec![ClipboardEntry {
                format: ClipboardFormat::Standard(CF_HDROP),
                data: drop_files(path),
                required: true,
            }],
            Self::ImageBytes {
                format: ImageFormat::Gif,
                bytes,
                ..
            } => vec![ClipboardEntry {
                format: ClipboardFormat::Registered(GIF_FORMAT_NAME),
                data: bytes.clone(),
                required: true,
            }],
            Self::ImageBytes {
                format: ImageFormat::Dib,
                bytes,
                source,
            } => vec![
                ClipboardEntry {
                    format: ClipboardFormat::Standard(CF_DIB),
                    data: bytes.clone(),
                    required: true,
                },
                ClipboardEntry {
                    format: ClipboardFormat::Standard(CF_UNICODETEXT),
                    data: unicode_text(&source.to_string_lossy()),
                    required: false,
                },
            ],
        }
    }
}

/// Encode a `DROPFILES` structure listing a single path.
///
/// Layout: `pFiles: u32 = 20`, `pt: 2 x i32 = 0`, `fNC: u32 = 0`,
/// `fWide: u32 = 1`, then the UTF-16LE path, its NUL, and the list NUL.
pub fn drop_files(path: &Path) -> Bytes {
    let wide: Vec<u16> = path.to_string_lossy().encode_utf16().collect();
    let mut buf = BytesMut::with_capacity(DROPFILES_HEADER_LEN as usize + (wide.len() + 2) * 2);

    buf.put_u32_le(DROPFILES_HEADER_LEN);
    buf.put_i32_le(0);
    buf.put_i32_le(0);
    buf.put_u32_le(0);
    buf.put_u32_le(1);
    for unit in wide {
        buf.put_u16_le(unit);
    }
    buf.put_u16_le(0);
    buf.put_u16_le(0);

    buf.freeze()
}

/// Encode NUL-terminated UTF-16LE text.
pub fn unicode_text(text: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity((text.len() + 1) * 2);
    for unit in text.encode_utf16() {
        buf.put_u16_le(unit);
    }
    buf.put_u16_le(0);
    buf.freeze()
}

/// Encode an RGB image as a 24-bit bottom-up DIB: a BMP file without its
/// `BITMAPFILEHEADER`.
pub fn dib_from_rgb(image: &RgbImage) -> ClipboardResult<Bytes> {
    let mut bmp = Cursor::new(Vec::new());
    image.write_to(&mut bmp, image::ImageFormat::Bmp)?;
    let bmp = bmp.into_inner();
    Ok(Bytes::copy_from_slice(
        bmp.get(BMP_FILE_HEADER_LEN..).unwrap_or_default(),
    ))
}

/// Decode the first frame of a GIF and encode it as a DIB.
pub fn first_frame_dib(gif: &[u8]) -> ClipboardResult<Bytes> {
    let frame = image::load_from_memory_with_format(gif, image::ImageFormat::Gif)?;
    dib_from_rgb(&frame.to_rgb8())
}
