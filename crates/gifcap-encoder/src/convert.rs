//! Video to animated GIF conversion.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use crate::avi::AviReader;
use crate::error::EncoderError;
use crate::ffmpeg::{gif_transcode_command, locate_ffmpeg};
use crate::gif::encode_gif;
use crate::EncoderResult;

/// A single video-to-GIF conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionJob {
    /// Recorded video.
    pub input_video_path: PathBuf,

    /// GIF to produce.
    pub output_image_path: PathBuf,

    /// GIF frame rate.
    pub frames_per_second: u32,
}

impl ConversionJob {
    /// Create a new conversion job.
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>, fps: u32) -> Self {
        Self {
            input_video_path: input.into(),
            output_image_path: output.into(),
            frames_per_second: fps,
        }
    }
}

/// Converts recordings to looping GIFs.
///
/// ffmpeg is used when available. Without it, AVI recordings are decoded
/// and re-encoded in-process.
#[derive(Debug, Clone, Default)]
pub struct Converter {
    ffmpeg: Option<PathBuf>,
}

impl Converter {
    /// Locate ffmpeg once and build a converter.
    pub fn detect(configured: Option<&Path>) -> Self {
        Self::with_ffmpeg(locate_ffmpeg(configured))
    }

    /// Build a converter with an explicit ffmpeg (or none).
    pub fn with_ffmpeg(ffmpeg: Option<PathBuf>) -> Self {
        Self { ffmpeg }
    }

    /// The ffmpeg binary in use, if any.
    pub fn ffmpeg(&self) -> Option<&Path> {
        self.ffmpeg.as_deref()
    }

    /// Run a conversion. Returns true if the output GIF was produced.
    ///
    /// Failures are logged. A failed run leaves no output file behind.
    #[instrument(name = "convert", skip(self, job), fields(
        input = %job.input_video_path.display(),
        output = %job.output_image_path.display(),
        fps = job.frames_per_second,
    ))]
    pub fn convert(&self, job: &ConversionJob) -> bool {
        match self.run(job) {
            Ok(strategy) => {
                info!(strategy, "Conversion finished");
                true
            }
            Err(e) => {
                warn!("Conversion failed: {}", e);
                false
            }
        }
    }

    /// Convenience wrapper around [`Converter::convert`].
    pub fn convert_paths(&self, input: &Path, output: &Path, fps: u32) -> bool {
        self.convert(&ConversionJob::new(input, output, fps))
    }

    fn run(&self, job: &ConversionJob) -> EncoderResult<&'static str> {
        let fps = job.frames_per_second;
        if fps == 0 {
            return Err(EncoderError::InvalidInput("frame rate 0".into()));
        }
        if !job.input_video_path.is_file() {
            return Err(EncoderError::InputMissing(job.input_video_path.clone()));
        }

        let output = &job.output_image_path;
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let partial = partial_path(output);
        let result = match &self.ffmpeg {
            Some(ffmpeg) => {
                transcode_with_ffmpeg(ffmpeg, &job.input_video_path, &partial, fps).map(|_| "ffmpeg")
            }
            None => {
                transcode_in_process(&job.input_video_path, &partial, fps).map(|_| "in-process")
            }
        };

        let result = result.and_then(|strategy| {
            fs::rename(&partial, output)?;
            Ok(strategy)
        });
        if result.is_err() && partial.exists() {
            if let Err(e) = fs::remove_file(&partial) {
                warn!("Failed to remove partial output: {}", e);
            }
        }
        result
    }
}

/// Hidden sibling file that receives output until it is complete.
fn partial_path(output: &Path) -> PathBuf {
    let name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output.gif".to_string());
    output.with_file_name(format!(".{}.part", name))
}

fn transcode_with_ffmpeg(ffmpeg: &Path, input: &Path, output: &Path, fps: u32) -> EncoderResult<()> {
    debug!(ffmpeg = %ffmpeg.display(), "Transcoding with ffmpeg");
    let status = gif_transcode_command(ffmpeg, input, output, fps)
        .status()
        .map_err(EncoderError::FfmpegSpawn)?;

    if !status.success() {
        return Err(EncoderError::FfmpegFailed(status.to_string()));
    }
    if !output.is_file() {
        return Err(EncoderError::FfmpegFailed("no output written".into()));
    }
    Ok(())
}

fn transcode_in_process(input: &Path, output: &Path, fps: u32) -> EncoderResult<()> {
    debug!("Transcoding in-process");
    let reader = AviReader::open(input)?;
    let gif = encode_gif(reader.frames(), fps)?;
    fs::write(output, gif)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avi::MjpegAviWriter;
    use crate::{VideoWriter, VideoWriterConfig};

    fn record_avi(path: &Path, frames: usize) {
        let config = VideoWriterConfig::new(16, 12, 10);
        let mut writer = MjpegAviWriter::create(path, config).unwrap();
        for i in 0..frames {
            let frame = vec![(i * 40) as u8; config.frame_len()];
            writer.write_frame(&frame).unwrap();
        }
        writer.finish().unwrap();
    }

    fn dir_is_clean(dir: &Path, expected: usize) -> bool {
        fs::read_dir(dir).unwrap().count() == expected
    }

    #[test]
    fn test_in_process_conversion() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("clip.avi");
        let output = dir.path().join("gif").join("clip.gif");
        record_avi(&input, 4);

        let converter = Converter::with_ffmpeg(None);
        assert!(converter.convert_paths(&input, &output, 10));

        let bytes = fs::read(&output).unwrap();
        assert_eq!(&bytes[..6], b"GIF89a");
        assert!(dir_is_clean(&dir.path().join("gif"), 1));
    }

    #[test]
    fn test_conversion_is_repeatable() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("clip.avi");
        let output = dir.path().join("clip.gif");
        record_avi(&input, 2);

        let converter = Converter::with_ffmpeg(None);
        assert!(converter.convert_paths(&input, &output, 10));
        let first = fs::read(&output).unwrap();
        assert!(converter.convert_paths(&input, &output, 10));
        assert_eq!(fs::read(&output).unwrap(), first);
    }

    #[test]
    fn test_zero_frame_input_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("empty.avi");
        let output = dir.path().join("empty.gif");
        record_avi(&input, 0);

        assert!(!Converter::with_ffmpeg(None).convert_paths(&input, &output, 10));
        assert!(!output.exists());
        assert!(dir_is_clean(dir.path(), 1));
    }

    #[test]
    fn test_corrupt_input_fails_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("broken.avi");
        let output = dir.path().join("broken.gif");
        fs::write(&input, b"RIFF\x10\x00\x00\x00AVI junkjunk").unwrap();

        assert!(!Converter::with_ffmpeg(None).convert_paths(&input, &output, 10));
        assert!(!output.exists());
        assert!(dir_is_clean(dir.path(), 1));
    }

    #[test]
    fn test_missing_input_and_zero_fps() {
        let dir = tempfile::tempdir().unwrap();
        let converter = Converter::with_ffmpeg(None);
        let output = dir.path().join("out.gif");

        assert!(!converter.convert_paths(&dir.path().join("nope.avi"), &output, 10));

        let input = dir.path().join("clip.avi");
        record_avi(&input, 1);
        assert!(!converter.convert_paths(&input, &output, 0));
        assert!(!output.exists());
    }

    #[test]
    fn test_failing_ffmpeg_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("clip.avi");
        let output = dir.path().join("clip.gif");
        record_avi(&input, 2);

        // A binary that cannot be spawned counts as a failed transcode,
        // without falling back to the in-process path.
        let converter = Converter::with_ffmpeg(Some(dir.path().join("no-such-ffmpeg")));
        assert!(!converter.convert_paths(&input, &output, 10));
        assert!(!output.exists());
    }

    #[test]
    fn test_partial_path_is_hidden_sibling() {
        assert_eq!(
            partial_path(Path::new("gif/a.gif")),
            PathBuf::from("gif/.a.gif.part")
        );
    }
}
