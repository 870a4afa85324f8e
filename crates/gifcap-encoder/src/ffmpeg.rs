//! External ffmpeg process integration.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use crate::error::EncoderError;
use crate::{EncoderResult, VideoWriter, VideoWriterConfig};

/// Environment variable naming an explicit ffmpeg binary.
pub const FFMPEG_ENV_VAR: &str = "GIFCAP_FFMPEG";

/// How long ffmpeg gets to reject its first frame.
const STARTUP_GRACE: Duration = Duration::from_millis(250);
const STARTUP_POLL: Duration = Duration::from_millis(25);

/// Locate an ffmpeg binary.
///
/// Looks at the configured override, then [`FFMPEG_ENV_VAR`], then `PATH`.
pub fn locate_ffmpeg(configured: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = configured {
        if path.is_file() {
            return Some(path.to_path_buf());
        }
        warn!(path = %path.display(), "Configured ffmpeg does not exist");
    }

    if let Some(path) = std::env::var_os(FFMPEG_ENV_VAR).map(PathBuf::from) {
        if path.is_file() {
            return Some(path);
        }
        warn!(path = %path.display(), "{} does not point to a file", FFMPEG_ENV_VAR);
    }

    match which::which("ffmpeg") {
        Ok(path) => {
            debug!(path = %path.display(), "Found ffmpeg on PATH");
            Some(path)
        }
        Err(_) => {
            info!("ffmpeg not found, in-process fallbacks will be used");
            None
        }
    }
}

/// Build the ffmpeg command that transcodes a video to a looping GIF.
pub fn gif_transcode_command(ffmpeg: &Path, input: &Path, output: &Path, fps: u32) -> Command {
    let mut command = Command::new(ffmpeg);
    command
        .args(["-hide_banner", "-loglevel", "error", "-y", "-i"])
        .arg(input)
        .args([
            "-vf",
            &format!("fps={},scale=iw:ih:flags=lanczos", fps),
            "-loop",
            "0",
            "-f",
            "gif",
        ])
        .arg(output)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    command
}

/// H.264/MP4 writer feeding raw BGR24 frames to ffmpeg over stdin.
pub struct FfmpegWriter {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    path: PathBuf,
    config: VideoWriterConfig,
    frames: u64,
}

impl FfmpegWriter {
    /// Spawn ffmpeg writing to `path`.
    #[instrument(name = "ffmpeg_writer_spawn", skip(config))]
    pub fn spawn(ffmpeg: &Path, path: &Path, config: VideoWriterConfig) -> EncoderResult<Self> {
        config.validate()?;

        // Surface a bad output path here rather than as an ffmpeg exit code.
        File::create(path)?;

        // 4:2:0 subsampling needs even dimensions.
        let pix_fmt = if config.width % 2 == 0 && config.height % 2 == 0 {
            "yuv420p"
        } else {
            "yuv444p"
        };

        let mut child = Command::new(ffmpeg)
            .args([
                "-hide_banner",
                "-loglevel",
                "error",
                "-y",
                "-f",
                "rawvideo",
                "-pix_fmt",
                "bgr24",
                "-s",
                &format!("{}x{}", config.width, config.height),
                "-r",
                &config.fps.to_string(),
                "-i",
                "pipe:0",
                "-an",
                "-c:v",
                "libx264",
                "-preset",
                "veryfast",
                "-pix_fmt",
                pix_fmt,
            ])
            .arg(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(EncoderError::FfmpegSpawn)?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| EncoderError::FfmpegFailed("stdin not captured".into()))?;

        debug!(pix_fmt, "ffmpeg writer started");

        Ok(Self {
            child: Some(child),
            stdin: Some(stdin),
            path: path.to_path_buf(),
            config,
            frames: 0,
        })
    }
}

impl VideoWriter for FfmpegWriter {
    fn write_frame(&mut self, bgr24: &[u8]) -> EncoderResult<()> {
        self.config.check_frame(bgr24)?;
        let stdin = self.stdin.as_mut().ok_or(EncoderError::AlreadyFinished)?;
        stdin.write_all(bgr24)?;
        self.frames += 1;
        Ok(())
    }

    fn finish(&mut self) -> EncoderResult<()> {
        // Closing stdin signals end of stream.
        drop(self.stdin.take());

        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        let status = child.wait()?;
        if !status.success() {
            return Err(EncoderError::FfmpegFailed(status.to_string()));
        }

        info!(frames = self.frames, path = %self.path.display(), "ffmpeg writer finished");
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.frames
    }

    fn check_alive(&mut self) -> EncoderResult<()> {
        let Some(child) = self.child.as_mut() else {
            return Err(EncoderError::AlreadyFinished);
        };

        let deadline = Instant::now() + STARTUP_GRACE;
        loop {
            if let Some(status) = child.try_wait()? {
                self.child = None;
                drop(self.stdin.take());
                return Err(EncoderError::FfmpegFailed(format!("exited early: {}", status)));
            }
            if Instant::now() >= deadline {
                return Ok(());
            }
            thread::sleep(STARTUP_POLL);
        }
    }

    fn name(&self) -> &'static str {
        "ffmpeg-h264"
    }
}

impl Drop for FfmpegWriter {
    fn drop(&mut self) {
        if self.child.is_some() {
            if let Err(e) = self.finish() {
                warn!("ffmpeg writer finish on drop failed: {}", e);
            }
        }
    }
}
