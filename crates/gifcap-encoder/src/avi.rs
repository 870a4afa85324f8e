//! Motion-JPEG in AVI, written and read in-process.
//!
//! File layout:
//! - `RIFF 'AVI '`
//!   - `LIST 'hdrl'`: `avih` main header, `LIST 'strl'` with `strh` and
//!     `strf` (a `BITMAPINFOHEADER` with `MJPG` compression)
//!   - `LIST 'movi'`: one `00dc` chunk per JPEG frame, padded to even size
//!   - `idx1`: one 16-byte entry per frame, offsets relative to `movi`
//!
//! Frame counts and sizes are patched into the headers on finish.

use std::fs::{self, File};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bytes::{BufMut, BytesMut};
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageFormat, RgbImage};
use tracing::{debug, info, instrument, warn};

use crate::error::EncoderError;
use crate::{EncoderResult, VideoWriter, VideoWriterConfig};

const AVIF_HASINDEX: u32 = 0x10;
const AVIIF_KEYFRAME: u32 = 0x10;

const MAIN_HEADER_LEN: u32 = 56;
const STREAM_HEADER_LEN: u32 = 56;
const BITMAP_HEADER_LEN: u32 = 40;

// Absolute offsets of fields patched on finish.
const RIFF_SIZE_OFFSET: u64 = 4;
const AVIH_TOTAL_FRAMES_OFFSET: u64 = 48;
const AVIH_BUFFER_SIZE_OFFSET: u64 = 60;
const STRH_LENGTH_OFFSET: u64 = 140;
const STRH_BUFFER_SIZE_OFFSET: u64 = 144;
const MOVI_SIZE_OFFSET: u64 = 216;
const MOVI_FOURCC_OFFSET: u64 = 220;
const HEADER_LEN: u64 = 224;

/// In-process Motion-JPEG AVI writer.
pub struct MjpegAviWriter {
    out: Option<BufWriter<File>>,
    path: PathBuf,
    config: VideoWriterConfig,
    position: u64,
    index: Vec<IndexEntry>,
    largest_frame: u32,
    rgb: Vec<u8>,
    jpeg: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
struct IndexEntry {
    offset: u32,
    size: u32,
}

impl MjpegAviWriter {
    /// Create the file and write the headers.
    #[instrument(name = "avi_writer_create", skip(config))]
    pub fn create(path: &Path, config: VideoWriterConfig) -> EncoderResult<Self> {
        config.validate()?;
        if config.jpeg_quality == 0 || config.jpeg_quality > 100 {
            return Err(EncoderError::InvalidInput(format!(
                "JPEG quality {}",
                config.jpeg_quality
            )));
        }

        let mut out = BufWriter::new(File::create(path)?);
        let header = build_header(&config);
        debug_assert_eq!(header.len() as u64, HEADER_LEN);
        out.write_all(&header)?;

        debug!(
            width = config.width,
            height = config.height,
            fps = config.fps,
            quality = config.jpeg_quality,
            "AVI writer created"
        );

        Ok(Self {
            out: Some(out),
            path: path.to_path_buf(),
            config,
            position: HEADER_LEN,
            index: Vec::new(),
            largest_frame: 0,
            rgb: Vec::with_capacity(config.frame_len()),
            jpeg: Vec::new(),
        })
    }

    fn write_index_and_patch(&mut self, out: &mut BufWriter<File>) -> EncoderResult<()> {
        let movi_end = self.position;

        let mut idx = BytesMut::with_capacity(8 + self.index.len() * 16);
        idx.put_slice(b"idx1");
        idx.put_u32_le((self.index.len() * 16) as u32);
        for entry in &self.index {
            idx.put_slice(b"00dc");
            idx.put_u32_le(AVIIF_KEYFRAME);
            idx.put_u32_le(entry.offset);
            idx.put_u32_le(entry.size);
        }
        out.write_all(&idx)?;
        let file_end = movi_end + idx.len() as u64;

        let frames = self.index.len() as u32;
        patch_u32(out, RIFF_SIZE_OFFSET, (file_end - 8) as u32)?;
        patch_u32(out, AVIH_TOTAL_FRAMES_OFFSET, frames)?;
        patch_u32(out, AVIH_BUFFER_SIZE_OFFSET, self.largest_frame)?;
        patch_u32(out, STRH_LENGTH_OFFSET, frames)?;
        patch_u32(out, STRH_BUFFER_SIZE_OFFSET, self.largest_frame)?;
        patch_u32(out, MOVI_SIZE_OFFSET, (movi_end - MOVI_FOURCC_OFFSET) as u32)?;

        out.flush()?;
        out.get_ref().sync_all()?;
        Ok(())
    }
}

impl VideoWriter for MjpegAviWriter {
    fn write_frame(&mut self, bgr24: &[u8]) -> EncoderResult<()> {
        self.config.check_frame(bgr24)?;
        let out = self.out.as_mut().ok_or(EncoderError::AlreadyFinished)?;

        self.rgb.clear();
        for px in bgr24.chunks_exact(3) {
            self.rgb.extend_from_slice(&[px[2], px[1], px[0]]);
        }

        self.jpeg.clear();
        JpegEncoder::new_with_quality(&mut self.jpeg, self.config.jpeg_quality).encode(
            &self.rgb,
            self.config.width,
            self.config.height,
            ExtendedColorType::Rgb8,
        )?;

        let size = self.jpeg.len() as u32;
        let mut chunk_header = BytesMut::with_capacity(8);
        chunk_header.put_slice(b"00dc");
        chunk_header.put_u32_le(size);
        out.write_all(&chunk_header)?;
        out.write_all(&self.jpeg)?;
        let mut written = 8 + size as u64;
        if size % 2 == 1 {
            out.write_all(&[0])?;
            written += 1;
        }

        self.index.push(IndexEntry {
            offset: (self.position - MOVI_FOURCC_OFFSET) as u32,
            size,
        });
        self.position += written;
        self.largest_frame = self.largest_frame.max(size);
        Ok(())
    }

    fn finish(&mut self) -> EncoderResult<()> {
        let Some(mut out) = self.out.take() else {
            return Ok(());
        };
        self.write_index_and_patch(&mut out)?;
        info!(
            frames = self.index.len(),
            path = %self.path.display(),
            "AVI writer finished"
        );
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.index.len() as u64
    }

    fn name(&self) -> &'static str {
        "mjpeg-avi"
    }
}

impl Drop for MjpegAviWriter {
    fn drop(&mut self) {
        if self.out.is_some() {
            if let Err(e) = self.finish() {
                warn!("AVI writer finish on drop failed: {}", e);
            }
        }
    }
}

fn build_header(config: &VideoWriterConfig) -> BytesMut {
    let mut buf = BytesMut::with_capacity(HEADER_LEN as usize);
    let frame_bytes = config.frame_len() as u32;

    buf.put_slice(b"RIFF");
    buf.put_u32_le(0); // patched
    buf.put_slice(b"AVI ");

    let strl_len = 4 + (8 + STREAM_HEADER_LEN) + (8 + BITMAP_HEADER_LEN);
    let hdrl_len = 4 + (8 + MAIN_HEADER_LEN) + (8 + strl_len);
    buf.put_slice(b"LIST");
    buf.put_u32_le(hdrl_len);
    buf.put_slice(b"hdrl");

    buf.put_slice(b"avih");
    buf.put_u32_le(MAIN_HEADER_LEN);
    buf.put_u32_le(1_000_000 / config.fps); // microseconds per frame
    buf.put_u32_le(frame_bytes.saturating_mul(config.fps)); // max bytes per second
    buf.put_u32_le(0); // padding granularity
    buf.put_u32_le(AVIF_HASINDEX);
    buf.put_u32_le(0); // total frames, patched
    buf.put_u32_le(0); // initial frames
    buf.put_u32_le(1); // streams
    buf.put_u32_le(0); // suggested buffer size, patched
    buf.put_u32_le(config.width);
    buf.put_u32_le(config.height);
    buf.put_bytes(0, 16); // reserved

    buf.put_slice(b"LIST");
    buf.put_u32_le(strl_len);
    buf.put_slice(b"strl");

    buf.put_slice(b"strh");
    buf.put_u32_le(STREAM_HEADER_LEN);
    buf.put_slice(b"vids");
    buf.put_slice(b"MJPG");
    buf.put_u32_le(0); // flags
    buf.put_u16_le(0); // priority
    buf.put_u16_le(0); // language
    buf.put_u32_le(0); // initial frames
    buf.put_u32_le(1); // scale
    buf.put_u32_le(config.fps); // rate
    buf.put_u32_le(0); // start
    buf.put_u32_le(0); // length, patched
    buf.put_u32_le(0); // suggested buffer size, patched
    buf.put_u32_le(u32::MAX); // quality: driver default
    buf.put_u32_le(0); // sample size
    buf.put_i16_le(0);
    buf.put_i16_le(0);
    buf.put_i16_le(config.width.min(i16::MAX as u32) as i16);
    buf.put_i16_le(config.height.min(i16::MAX as u32) as i16);

    buf.put_slice(b"strf");
    buf.put_u32_le(BITMAP_HEADER_LEN);
    buf.put_u32_le(BITMAP_HEADER_LEN);
    buf.put_i32_le(config.width as i32);
    buf.put_i32_le(config.height as i32);
    buf.put_u16_le(1); // planes
    buf.put_u16_le(24); // bit count
    buf.put_slice(b"MJPG");
    buf.put_u32_le(frame_bytes);
    buf.put_bytes(0, 16); // resolution and palette fields

    buf.put_slice(b"LIST");
    buf.put_u32_le(4); // patched
    buf.put_slice(b"movi");

    buf
}

fn patch_u32(out: &mut BufWriter<File>, offset: u64, value: u32) -> std::io::Result<()> {
    out.seek(SeekFrom::Start(offset))?;
    out.write_all(&value.to_le_bytes())
}

/// Reader for Motion-JPEG AVI files.
pub struct AviReader {
    data: Vec<u8>,
    width: u32,
    height: u32,
    micros_per_frame: u32,
    frames: Vec<(usize, usize)>,
}

impl AviReader {
    /// Read and index an AVI file.
    #[instrument(name = "avi_reader_open")]
    pub fn open(path: &Path) -> EncoderResult<Self> {
        if !path.is_file() {
            return Err(EncoderError::InputMissing(path.to_path_buf()));
        }
        Self::parse(fs::read(path)?)
    }

    /// Index an in-memory AVI file.
    pub fn parse(data: Vec<u8>) -> EncoderResult<Self> {
        if data.len() < 12 || &data[0..4] != b"RIFF" || &data[8..12] != b"AVI " {
            return Err(EncoderError::UnsupportedContainer(
                "not a RIFF AVI file".into(),
            ));
        }

        let mut reader = Self {
            data,
            width: 0,
            height: 0,
            micros_per_frame: 0,
            frames: Vec::new(),
        };
        let riff_end = (12 + read_u32(&reader.data, 4)? as usize - 4).min(reader.data.len());
        reader.walk(12, riff_end)?;

        if reader.width == 0 || reader.height == 0 {
            return Err(EncoderError::MalformedContainer(
                "missing main header".into(),
            ));
        }

        debug!(
            width = reader.width,
            height = reader.height,
            frames = reader.frames.len(),
            "Indexed AVI"
        );
        Ok(reader)
    }

    fn walk(&mut self, mut pos: usize, end: usize) -> EncoderResult<()> {
        while pos + 8 <= end {
            let id: [u8; 4] = self.data[pos..pos + 4]
                .try_into()
                .map_err(|_| EncoderError::MalformedContainer("truncated chunk id".into()))?;
            let size = read_u32(&self.data, pos + 4)? as usize;
            let body = pos + 8;
            let body_end = body
                .checked_add(size)
                .filter(|&e| e <= self.data.len())
                .ok_or_else(|| {
                    EncoderError::MalformedContainer(format!(
                        "chunk {} overruns file",
                        String::from_utf8_lossy(&id)
                    ))
                })?;

            match &id {
                b"LIST" if size >= 4 => self.walk(body + 4, body_end)?,
                b"avih" => {
                    self.micros_per_frame = read_u32(&self.data, body)?;
                    self.width = read_u32(&self.data, body + 32)?;
                    self.height = read_u32(&self.data, body + 36)?;
                }
                b"strh" => {
                    if self.data.get(body..body + 4) == Some(&b"vids"[..])
                        && self.data.get(body + 4..body + 8) != Some(&b"MJPG"[..])
                    {
                        return Err(EncoderError::UnsupportedContainer(
                            "video stream is not Motion-JPEG".into(),
                        ));
                    }
                }
                [_, _, b'd', b'c'] => self.frames.push((body, size)),
                _ => {}
            }

            pos = body_end + (size & 1);
        }
        Ok(())
    }

    /// Frame width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Frame height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Frame rate stored in the main header, if any.
    pub fn fps(&self) -> Option<f64> {
        (self.micros_per_frame > 0).then(|| 1_000_000.0 / self.micros_per_frame as f64)
    }

    /// Number of video frames.
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Decode frames in order.
    pub fn frames(&self) -> impl Iterator<Item = EncoderResult<RgbImage>> + '_ {
        self.frames.iter().map(move |&(start, len)| {
            let jpeg = &self.data[start..start + len];
            let image = image::load_from_memory_with_format(jpeg, ImageFormat::Jpeg)?;
            Ok(image.to_rgb8())
        })
    }
}

fn read_u32(data: &[u8], at: usize) -> EncoderResult<u32> {
    data.get(at..at + 4)
        .and_then(|b| b.try_into().ok())
        .map(u32::from_le_bytes)
        .ok_or_else(|| EncoderError::MalformedContainer(format!("truncated at {}", at)))
}
