//! Engine facade used by the selection UI.

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use crossbeam_channel::Sender;
use tracing::{debug, error, info, instrument, warn};

use gifcap_capture::{resolve_unscaled, MonitorLayout, MonitorSource, SystemMonitors};
use gifcap_clipboard::{detect_backend, ClipboardBackend};
use gifcap_encoder::Converter;
use gifcap_ipc::{CaptureRegion, EngineEvent, RecorderState, SelectionRect, VideoFormat};

use crate::context::AppContext;
use crate::recorder::{
    platform_grabber_factory, GrabberFactory, Recorder, RecordingSession, StartOutcome,
    WriterSettings,
};

/// Collaborators the engine talks to.
pub struct EngineParts {
    pub monitors: Box<dyn MonitorSource>,
    pub grabber_factory: GrabberFactory,
    pub converter: Converter,

    /// `None` when no clipboard is available.
    pub clipboard: Option<Box<dyn ClipboardBackend>>,
}

impl EngineParts {
    /// The window system's monitors, grabber and clipboard.
    pub fn system(context: &AppContext) -> Self {
        let converter = Converter::detect(context.config().ffmpeg_path.as_deref());
        let clipboard = match detect_backend(&context.clipboard_config()) {
            Ok(backend) => Some(backend),
            Err(e) => {
                warn!("Clipboard unavailable: {}", e);
                None
            }
        };
        Self {
            monitors: Box::new(SystemMonitors),
            grabber_factory: platform_grabber_factory(),
            converter,
            clipboard,
        }
    }
}

/// Paths produced by [`Engine::finish_recording`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineOutcome {
    /// Finalized video, if a session was recording.
    pub video: Option<PathBuf>,

    /// GIF, if the conversion succeeded.
    pub gif: Option<PathBuf>,

    /// Whether the GIF reached the clipboard.
    pub published: bool,
}

/// The gifcap core: region resolution, recording, conversion and
/// clipboard publishing.
///
/// The clipboard backend is tied to the thread that created it, so the
/// engine stays on the UI thread.
pub struct Engine {
    context: AppContext,
    monitors: Box<dyn MonitorSource>,
    recorder: Recorder,
    converter: Converter,
    clipboard: RefCell<Option<Box<dyn ClipboardBackend>>>,
    event_tx: Sender<EngineEvent>,
}

impl Engine {
    /// Create an engine backed by the window system.
    pub fn new(context: AppContext, event_tx: Sender<EngineEvent>) -> Self {
        let parts = EngineParts::system(&context);
        Self::with_parts(context, parts, event_tx)
    }

    /// Create an engine from explicit collaborators.
    pub fn with_parts(context: AppContext, parts: EngineParts, event_tx: Sender<EngineEvent>) -> Self {
        let writer_settings = WriterSettings {
            ffmpeg: parts.converter.ffmpeg().map(Path::to_path_buf),
            jpeg_quality: Some(context.config().jpeg_quality),
        };
        match parts.converter.ffmpeg() {
            Some(ffmpeg) => info!(ffmpeg = %ffmpeg.display(), "Using ffmpeg"),
            None => info!("ffmpeg not found, recording AVI and converting in-process"),
        }

        Self {
            recorder: Recorder::new(parts.grabber_factory, writer_settings),
            monitors: parts.monitors,
            converter: parts.converter,
            clipboard: RefCell::new(parts.clipboard),
            context,
            event_tx,
        }
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    /// Current recorder state.
    pub fn state(&self) -> RecorderState {
        self.recorder.state()
    }

    /// The active session, if any.
    pub fn active_session(&self) -> Option<RecordingSession> {
        self.recorder.active_session()
    }

    /// Resolve a selection and start recording it.
    ///
    /// An empty or absent selection records the whole primary monitor.
    /// `output` defaults to a timestamped file under `video/`.
    #[instrument(name = "start_session", skip(self, output))]
    pub fn start_session(
        &self,
        selection: Option<SelectionRect>,
        fps: u32,
        output: Option<&Path>,
    ) -> Option<RecordingSession> {
        let region = self.resolve_region(selection)?;
        self.start_region(region, fps, output)
    }

    /// Start recording an already resolved physical region.
    pub fn start_region(
        &self,
        region: CaptureRegion,
        fps: u32,
        output: Option<&Path>,
    ) -> Option<RecordingSession> {
        let output = match output {
            Some(path) => path.to_path_buf(),
            None => self.context.layout().video_path(self.video_format()),
        };

        match self.recorder.start(region, fps, &output) {
            Ok(StartOutcome::Started(session)) => {
                self.send_event(EngineEvent::RecordingStarted {
                    region,
                    output: session.output_path.clone(),
                });
                self.send_state_change(RecorderState::Idle, RecorderState::Recording);
                Some(session)
            }
            Ok(StartOutcome::AlreadyRecording) => None,
            Err(e) => {
                error!("Failed to start recording: {}", e);
                self.send_event(EngineEvent::Error {
                    message: format!("Failed to start recording: {}", e),
                });
                None
            }
        }
    }

    /// Stop recording. Returns the finalized video, or `None` if nothing was
    /// recording or no file was produced.
    #[instrument(name = "stop_session", skip(self))]
    pub fn stop_session(&self) -> Option<PathBuf> {
        let finished = self.recorder.stop()?;
        self.send_state_change(RecorderState::Recording, RecorderState::Idle);

        if let Some(e) = &finished.error {
            warn!("Recording ended early: {}", e);
            self.send_event(EngineEvent::Error {
                message: format!("Recording ended early: {}", e),
            });
        }

        let path = finished.session.output_path;
        let output = (finished.frames_written > 0 && path.is_file()).then_some(path);
        self.send_event(EngineEvent::RecordingStopped {
            output: output.clone(),
            frames: finished.frames_written,
        });
        output
    }

    /// Convert a video to a looping GIF.
    pub fn convert(&self, input: &Path, output: &Path, fps: u32) -> bool {
        let success = self.converter.convert_paths(input, output, fps);
        self.send_event(EngineEvent::ConversionFinished {
            output: output.to_path_buf(),
            success,
        });
        success
    }

    /// Place a file on the clipboard, preferring a file reference.
    pub fn publish(&self, path: &Path) -> bool {
        self.publish_with(path, |backend, path| backend.publish(path))
    }

    /// Place a file's image data on the clipboard.
    pub fn publish_image(&self, path: &Path) -> bool {
        self.publish_with(path, |backend, path| backend.publish_image(path))
    }

    /// Stop, convert to a GIF under `gif/`, and publish it.
    #[instrument(name = "finish_recording", skip(self))]
    pub fn finish_recording(&self, fps: u32) -> PipelineOutcome {
        let mut outcome = PipelineOutcome::default();

        let Some(video) = self.stop_session() else {
            return outcome;
        };
        outcome.video = Some(video.clone());

        let gif = self.context.layout().gif_path();
        if !self.convert(&video, &gif, fps) {
            return outcome;
        }
        outcome.published = self.publish(&gif);
        outcome.gif = Some(gif);
        outcome
    }

    fn resolve_region(&self, selection: Option<SelectionRect>) -> Option<CaptureRegion> {
        let inset = self.context.config().inset_pixels;
        match self.monitors.monitors().and_then(MonitorLayout::new) {
            Ok(layout) => Some(layout.resolve(selection, inset)),
            Err(e) => {
                warn!("Monitor layout unavailable, using unscaled coordinates: {}", e);
                match selection.filter(|s| !s.is_empty()) {
                    Some(selection) => Some(resolve_unscaled(selection, inset)),
                    None => {
                        self.send_event(EngineEvent::Error {
                            message: format!("No region to record: {}", e),
                        });
                        None
                    }
                }
            }
        }
    }

    /// MP4 needs ffmpeg; record AVI without it.
    fn video_format(&self) -> VideoFormat {
        let configured = self.context.config().video_format;
        if configured == VideoFormat::Mp4 && self.converter.ffmpeg().is_none() {
            debug!("Falling back to AVI");
            return VideoFormat::Avi;
        }
        configured
    }

    fn publish_with(
        &self,
        path: &Path,
        publish: impl FnOnce(&mut dyn ClipboardBackend, &Path) -> bool,
    ) -> bool {
        let success = match self.clipboard.borrow_mut().as_deref_mut() {
            Some(backend) => publish(backend, path),
            None => {
                warn!("No clipboard backend");
                false
            }
        };
        self.send_event(EngineEvent::Published {
            path: path.to_path_buf(),
            success,
        });
        success
    }

    fn send_state_change(&self, previous: RecorderState, current: RecorderState) {
        self.send_event(EngineEvent::StateChanged { previous, current });
    }

    fn send_event(&self, event: EngineEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            warn!("Failed to send event: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use parking_lot::Mutex;

    use gifcap_capture::{CaptureError, CaptureResult, StaticMonitors};
    use gifcap_ipc::{event_channel, MonitorDescriptor, RecorderConfig};

    use crate::recorder::tests::synthetic_factory;

    /// Clipboard that records what was published.
    struct RecordingClipboard {
        published: Arc<Mutex<Vec<PathBuf>>>,
    }

    impl ClipboardBackend for RecordingClipboard {
        fn publish(&mut self, path: &Path) -> bool {
            self.published.lock().push(path.to_path_buf());
            true
        }

        fn publish_image(&mut self, path: &Path) -> bool {
            self.publish(path)
        }
    }

    struct NoMonitors;

    impl MonitorSource for NoMonitors {
        fn monitors(&self) -> CaptureResult<Vec<MonitorDescriptor>> {
            Err(CaptureError::NoMonitors)
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        engine: Engine,
        events: crossbeam_channel::Receiver<EngineEvent>,
        published: Arc<Mutex<Vec<PathBuf>>>,
    }

    fn fixture(monitors: Box<dyn MonitorSource>) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let config = RecorderConfig {
            video_format: VideoFormat::Avi,
            ..Default::default()
        };
        let context = AppContext::new(dir.path(), config).unwrap();
        let published = Arc::new(Mutex::new(Vec::new()));
        let (factory, _) = synthetic_factory(None);
        let parts = EngineParts {
            monitors,
            grabber_factory: factory,
            converter: Converter::with_ffmpeg(None),
            clipboard: Some(Box::new(RecordingClipboard {
                published: Arc::clone(&published),
            })),
        };
        let (event_tx, events) = event_channel();
        Fixture {
            _dir: dir,
            engine: Engine::with_parts(context, parts, event_tx),
            events,
            published,
        }
    }

    fn one_monitor() -> Box<dyn MonitorSource> {
        Box::new(StaticMonitors(vec![
            MonitorDescriptor::new(0, 0, 1920, 1080, 1.0).primary(),
        ]))
    }

    #[test]
    fn test_pipeline_records_converts_and_publishes() {
        let f = fixture(one_monitor());

        let session = f
            .engine
            .start_session(Some(SelectionRect::new(10, 20, 50, 40)), 10, None)
            .unwrap();
        assert_eq!(session.capture_region, CaptureRegion::new(13, 23, 44, 34));
        assert!(session.output_path.starts_with(f.engine.context().layout().video_dir()));
        assert_eq!(f.engine.state(), RecorderState::Recording);

        thread::sleep(Duration::from_millis(250));
        let outcome = f.engine.finish_recording(10);

        assert_eq!(outcome.video.as_deref(), Some(session.output_path.as_path()));
        let gif = outcome.gif.unwrap();
        assert!(gif.starts_with(f.engine.context().layout().gif_dir()));
        assert!(gif.is_file());
        assert!(outcome.published);
        assert_eq!(*f.published.lock(), vec![gif]);
        assert_eq!(f.engine.state(), RecorderState::Idle);

        let kinds: Vec<&'static str> = f
            .events
            .try_iter()
            .map(|e| match e {
                EngineEvent::StateChanged { .. } => "state",
                EngineEvent::RecordingStarted { .. } => "started",
                EngineEvent::RecordingStopped { .. } => "stopped",
                EngineEvent::ConversionFinished { .. } => "converted",
                EngineEvent::Published { .. } => "published",
                EngineEvent::Error { .. } => "error",
            })
            .collect();
        assert_eq!(
            kinds,
            vec!["started", "state", "state", "stopped", "converted", "published"]
        );
    }

    #[test]
    fn test_stop_session_when_idle() {
        let f = fixture(one_monitor());
        assert!(f.engine.stop_session().is_none());
        assert_eq!(f.engine.finish_recording(10), PipelineOutcome::default());
        assert!(f.events.try_iter().next().is_none());
    }

    #[test]
    fn test_second_start_ignored() {
        let f = fixture(one_monitor());
        let first = f.engine.start_session(None, 10, None).unwrap();
        assert_eq!(first.capture_region, CaptureRegion::new(3, 3, 1914, 1074));

        let dir = f.engine.context().layout().video_dir();
        assert!(f
            .engine
            .start_session(None, 10, Some(&dir.join("other.avi")))
            .is_none());
        assert_eq!(f.engine.active_session().unwrap().output_path, first.output_path);

        assert_eq!(f.engine.stop_session(), Some(first.output_path));
        assert!(!dir.join("other.avi").exists());
    }

    #[test]
    fn test_geometry_failure_falls_back_to_unscaled() {
        let f = fixture(Box::new(NoMonitors));
        let session = f
            .engine
            .start_session(Some(SelectionRect::new(100, 100, 40, 30)), 10, None)
            .unwrap();
        assert_eq!(session.capture_region, CaptureRegion::new(103, 103, 34, 24));
        f.engine.stop_session();

        assert!(f.engine.start_session(None, 10, None).is_none());
    }

    #[test]
    fn test_convert_failure_reported() {
        let f = fixture(one_monitor());
        let dir = f.engine.context().layout().gif_dir();
        assert!(!f.engine.convert(&dir.join("missing.avi"), &dir.join("out.gif"), 10));
        assert!(matches!(
            f.events.try_recv(),
            Ok(EngineEvent::ConversionFinished { success: false, .. })
        ));
    }

    #[test]
    fn test_publish_without_clipboard() {
        let dir = tempfile::tempdir().unwrap();
        let context = AppContext::new(dir.path(), RecorderConfig::default()).unwrap();
        let (factory, _) = synthetic_factory(None);
        let parts = EngineParts {
            monitors: one_monitor(),
            grabber_factory: factory,
            converter: Converter::with_ffmpeg(None),
            clipboard: None,
        };
        let (event_tx, _events) = event_channel();
        let engine = Engine::with_parts(context, parts, event_tx);

        let file = dir.path().join("a.gif");
        std::fs::write(&file, b"GIF89a").unwrap();
        assert!(!engine.publish(&file));
        assert!(!engine.publish_image(&file));
    }

    #[test]
    fn test_mp4_without_ffmpeg_records_avi() {
        let dir = tempfile::tempdir().unwrap();
        let context = AppContext::new(dir.path(), RecorderConfig::default()).unwrap();
        let (factory, _) = synthetic_factory(None);
        let parts = EngineParts {
            monitors: one_monitor(),
            grabber_factory: factory,
            converter: Converter::with_ffmpeg(None),
            clipboard: None,
        };
        let (event_tx, _events) = event_channel();
        let engine = Engine::with_parts(context, parts, event_tx);

        let session = engine
            .start_session(Some(SelectionRect::new(0, 0, 20, 20)), 10, None)
            .unwrap();
        assert_eq!(
            session.output_path.extension().and_then(|e| e.to_str()),
            Some("avi")
        );
        assert!(engine.stop_session().is_some());
    }
}
