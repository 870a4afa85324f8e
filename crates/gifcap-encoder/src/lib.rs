//! Video writing and video-to-GIF conversion.
//!
//! Recordings are written either by piping raw frames into an external
//! ffmpeg process (H.264 in MP4) or in-process as Motion-JPEG in AVI. The
//! [`Converter`] turns a recording into a looping GIF, preferring ffmpeg and
//! falling back to the in-process AVI decoder and GIF encoder.

mod avi;
mod convert;
mod error;
mod ffmpeg;
mod gif;

pub use avi::{AviReader, MjpegAviWriter};
pub use convert::{ConversionJob, Converter};
pub use error::EncoderError;
pub use ffmpeg::{gif_transcode_command, locate_ffmpeg, FfmpegWriter, FFMPEG_ENV_VAR};
pub use gif::encode_gif;

use std::path::Path;

use gifcap_ipc::VideoFormat;
use tracing::info;

/// Result type for encoder operations.
pub type EncoderResult<T> = Result<T, EncoderError>;

/// Video writer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoWriterConfig {
    /// Width in pixels.
    pub width: u32,

    /// Height in pixels.
    pub height: u32,

    /// Frames per second.
    pub fps: u32,

    /// Motion-JPEG quality, 1..=100.
    pub jpeg_quality: u8,
}

impl VideoWriterConfig {
    /// Create a configuration with the default JPEG quality.
    pub fn new(width: u32, height: u32, fps: u32) -> Self {
        Self {
            width,
            height,
            fps,
            jpeg_quality: 85,
        }
    }

    /// Size of one packed BGR24 frame.
    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    fn validate(&self) -> EncoderResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(EncoderError::InvalidInput(format!(
                "frame size {}x{}",
                self.width, self.height
            )));
        }
        if self.fps == 0 {
            return Err(EncoderError::InvalidInput("frame rate 0".into()));
        }
        Ok(())
    }

    fn check_frame(&self, bgr24: &[u8]) -> EncoderResult<()> {
        if bgr24.len() != self.frame_len() {
            return Err(EncoderError::InvalidInput(format!(
                "expected {} bytes for {}x{}, got {}",
                self.frame_len(),
                self.width,
                self.height,
                bgr24.len()
            )));
        }
        Ok(())
    }
}

/// Trait for video writers.
pub trait VideoWriter: Send {
    /// Append one packed BGR24 frame.
    fn write_frame(&mut self, bgr24: &[u8]) -> EncoderResult<()>;

    /// Flush and close the file. Safe to call more than once.
    fn finish(&mut self) -> EncoderResult<()>;

    /// Number of frames written so far.
    fn frames_written(&self) -> u64;

    /// Fail if the writer can no longer accept frames.
    ///
    /// Called after the first frame; external encoders may reject their
    /// arguments only once input arrives.
    fn check_alive(&mut self) -> EncoderResult<()> {
        Ok(())
    }

    /// Get writer name for diagnostics.
    fn name(&self) -> &'static str;
}

/// Open a writer for `path`, choosing the container from its extension.
///
/// `.avi` is written in-process; `.mp4` needs an ffmpeg binary.
pub fn open_video_writer(
    path: &Path,
    config: VideoWriterConfig,
    ffmpeg: Option<&Path>,
) -> EncoderResult<Box<dyn VideoWriter>> {
    let format = VideoFormat::from_path(path)
        .ok_or_else(|| EncoderError::UnsupportedContainer(path.display().to_string()))?;

    let writer: Box<dyn VideoWriter> = match format {
        VideoFormat::Avi => Box::new(MjpegAviWriter::create(path, config)?),
        VideoFormat::Mp4 => {
            let ffmpeg = ffmpeg.ok_or(EncoderError::FfmpegNotFound)?;
            Box::new(FfmpegWriter::spawn(ffmpeg, path, config)?)
        }
    };

    info!(
        writer = writer.name(),
        width = config.width,
        height = config.height,
        fps = config.fps,
        "Opened video writer"
    );
    Ok(writer)
}
