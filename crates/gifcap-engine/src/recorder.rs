//! Frame capture loop.
//!
//! A [`Recorder`] owns at most one [`RecordingSession`]. Starting a session
//! grabs and writes a probe frame on the caller's thread, then hands the
//! grabber and video writer to a dedicated capture thread that runs until
//! [`Recorder::stop`] raises the stop flag.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use tracing::{debug, error, info, instrument, warn};

use gifcap_capture::{platform_grabber, CaptureResult, ScreenGrabber};
use gifcap_encoder::{open_video_writer, VideoWriter, VideoWriterConfig};
use gifcap_ipc::{CaptureRegion, RecorderState};

use crate::error::RecorderError;
use crate::RecorderResult;

/// Opens a screen grabber for a new session.
pub type GrabberFactory = Arc<dyn Fn() -> CaptureResult<Box<dyn ScreenGrabber>> + Send + Sync>;

/// Grabber factory for the current platform.
pub fn platform_grabber_factory() -> GrabberFactory {
    Arc::new(platform_grabber)
}

/// Video writer options shared by all sessions.
#[derive(Debug, Clone, Default)]
pub struct WriterSettings {
    /// ffmpeg binary for MP4 output.
    pub ffmpeg: Option<PathBuf>,

    /// Motion-JPEG quality for AVI output; the writer default when `None`.
    pub jpeg_quality: Option<u8>,
}

/// An active recording.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingSession {
    /// Physical region being captured.
    pub capture_region: CaptureRegion,

    /// Capture frame rate.
    pub frames_per_second: u32,

    /// Video file being written.
    pub output_path: PathBuf,

    /// Wall-clock start time.
    pub started_at: DateTime<Local>,
}

/// Result of [`Recorder::start`].
#[derive(Debug)]
pub enum StartOutcome {
    /// A new session is recording.
    Started(RecordingSession),

    /// A session was already active and was left untouched.
    AlreadyRecording,
}

/// A session that has been stopped and finalized.
#[derive(Debug)]
pub struct FinishedRecording {
    /// The stopped session.
    pub session: RecordingSession,

    /// Frames in the video file, including the probe frame.
    pub frames_written: u64,

    /// Recording duration.
    pub elapsed: Duration,

    /// Error that ended the capture loop early, if any.
    pub error: Option<RecorderError>,
}

/// What the capture thread reports when it exits.
struct LoopReport {
    frames_written: u64,
    error: Option<RecorderError>,
}

struct ActiveSession {
    session: RecordingSession,
    started: Instant,
    should_stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<LoopReport>>,
}

/// Records a screen region to a video file.
pub struct Recorder {
    grabber_factory: GrabberFactory,
    writer_settings: WriterSettings,
    active: Mutex<Option<ActiveSession>>,
}

impl Recorder {
    /// Create a recorder.
    pub fn new(grabber_factory: GrabberFactory, writer_settings: WriterSettings) -> Self {
        Self {
            grabber_factory,
            writer_settings,
            active: Mutex::new(None),
        }
    }

    /// Start recording `region` to `output_path`.
    #[instrument(name = "recorder_start", skip(self, output_path), fields(output = %output_path.display()))]
    pub fn start(
        &self,
        region: CaptureRegion,
        fps: u32,
        output_path: &Path,
    ) -> RecorderResult<StartOutcome> {
        let mut active = self.active.lock();
        if let Some(current) = active.as_ref() {
            warn!(
                output = %current.session.output_path.display(),
                "Already recording, ignoring start"
            );
            return Ok(StartOutcome::AlreadyRecording);
        }
        if fps == 0 {
            return Err(RecorderError::InvalidFrameRate(fps));
        }

        info!(
            left = region.left,
            top = region.top,
            width = region.width,
            height = region.height,
            fps,
            "Starting recording"
        );

        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut grabber = (self.grabber_factory)()?;
        let mut config = VideoWriterConfig::new(region.width, region.height, fps);
        if let Some(quality) = self.writer_settings.jpeg_quality {
            config.jpeg_quality = quality;
        }
        let mut writer =
            open_video_writer(output_path, config, self.writer_settings.ffmpeg.as_deref())?;

        // Frame 0 doubles as a check that the region can be grabbed and the
        // writer accepts frames.
        let probe_at = Instant::now();
        let probe = capture_frame(grabber.as_mut(), writer.as_mut(), &region)
            .and_then(|()| writer.check_alive().map_err(RecorderError::from));
        if let Err(e) = probe {
            error!("Probe frame failed: {}", e);
            discard_output(writer, output_path);
            return Err(e);
        }
        debug!(grabber = grabber.name(), writer = writer.name(), "Probe frame written");

        let session = RecordingSession {
            capture_region: region,
            frames_per_second: fps,
            output_path: output_path.to_path_buf(),
            started_at: Local::now(),
        };

        let should_stop = Arc::new(AtomicBool::new(false));
        let loop_stop = Arc::clone(&should_stop);
        let handle = thread::Builder::new()
            .name("gifcap-capture".into())
            .spawn(move || capture_loop(grabber, writer, region, fps, probe_at, loop_stop));
        let handle = match handle {
            Ok(handle) => handle,
            Err(e) => {
                // The writer was finalized when the closure dropped.
                error!("Failed to spawn capture thread: {}", e);
                remove_output(output_path);
                return Err(RecorderError::Thread(e.to_string()));
            }
        };

        *active = Some(ActiveSession {
            session: session.clone(),
            started: probe_at,
            should_stop,
            thread: Some(handle),
        });

        Ok(StartOutcome::Started(session))
    }

    /// Stop the active session and finalize its video file.
    ///
    /// Returns `None` without touching anything if nothing is recording.
    #[instrument(name = "recorder_stop", skip(self))]
    pub fn stop(&self) -> Option<FinishedRecording> {
        let mut current = self.active.lock().take()?;

        current.should_stop.store(true, Ordering::SeqCst);
        let report = match current.thread.take().map(JoinHandle::join) {
            Some(Ok(report)) => report,
            Some(Err(_)) => LoopReport {
                frames_written: 0,
                error: Some(RecorderError::Thread("capture thread panicked".into())),
            },
            None => LoopReport {
                frames_written: 0,
                error: None,
            },
        };

        let elapsed = current.started.elapsed();
        info!(
            frames = report.frames_written,
            elapsed_ms = elapsed.as_millis() as u64,
            "Recording stopped"
        );

        Some(FinishedRecording {
            session: current.session,
            frames_written: report.frames_written,
            elapsed,
            error: report.error,
        })
    }

    /// Whether a session is active.
    pub fn is_recording(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Current state.
    pub fn state(&self) -> RecorderState {
        if self.is_recording() {
            RecorderState::Recording
        } else {
            RecorderState::Idle
        }
    }

    /// The active session, if any.
    pub fn active_session(&self) -> Option<RecordingSession> {
        self.active.lock().as_ref().map(|a| a.session.clone())
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if let Some(finished) = self.stop() {
            debug!(
                output = %finished.session.output_path.display(),
                "Recording stopped on drop"
            );
        }
    }
}

/// Grab one frame and append it to the video.
fn capture_frame(
    grabber: &mut dyn ScreenGrabber,
    writer: &mut dyn VideoWriter,
    region: &CaptureRegion,
) -> RecorderResult<()> {
    let frame = grabber.grab(region)?;
    let bgr = frame.to_bgr24()?;
    writer.write_frame(&bgr)?;
    Ok(())
}

/// Close and delete the output of a session that never started.
fn discard_output(mut writer: Box<dyn VideoWriter>, path: &Path) {
    if let Err(e) = writer.finish() {
        debug!("Writer close after failed probe: {}", e);
    }
    drop(writer);
    remove_output(path);
}

fn remove_output(path: &Path) {
    if path.exists() {
        if let Err(e) = fs::remove_file(path) {
            warn!(path = %path.display(), "Failed to remove output: {}", e);
        }
    }
}

/// Capture thread body.
fn capture_loop(
    mut grabber: Box<dyn ScreenGrabber>,
    mut writer: Box<dyn VideoWriter>,
    region: CaptureRegion,
    fps: u32,
    probe_at: Instant,
    should_stop: Arc<AtomicBool>,
) -> LoopReport {
    debug!("Capture loop starting");
    let interval = Duration::from_secs_f64(1.0 / fps as f64);
    let mut error = None;
    let mut frame_start = probe_at;

    loop {
        // Slow iterations run back to back; no frame is skipped.
        if let Some(remaining) = interval.checked_sub(frame_start.elapsed()) {
            thread::sleep(remaining);
        }
        if should_stop.load(Ordering::SeqCst) {
            break;
        }

        frame_start = Instant::now();
        if let Err(e) = capture_frame(grabber.as_mut(), writer.as_mut(), &region) {
            error!("Capture loop ended: {}", e);
            error = Some(e);
            break;
        }
    }

    if let Err(e) = writer.finish() {
        error!("Failed to finalize video: {}", e);
        if error.is_none() {
            error = Some(e.into());
        }
    }

    let frames_written = writer.frames_written();
    debug!(frames_written, "Capture loop exited");
    LoopReport {
        frames_written,
        error,
    }
}
