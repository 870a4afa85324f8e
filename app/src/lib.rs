//! gifcap application library.
//!
//! The selection overlay and toolbar are separate front ends; this crate
//! wires logging and the engine together and runs a fixed headless
//! scenario through the whole record, convert, publish pipeline.

use std::backtrace::Backtrace;
use std::fs::OpenOptions;
use std::panic;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use crossbeam_channel::Receiver;
use tracing::{error, info, warn};
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{reload, Registry};

use gifcap_engine::{Engine, PipelineOutcome};
use gifcap_ipc::{CaptureRegion, EngineEvent};

/// Log file inside the log directory.
pub const LOG_FILE_NAME: &str = "gifcap.log";

type FileLayer = Option<Box<dyn Layer<Registry> + Send + Sync>>;

/// Handle to the global subscriber for attaching the log file later.
pub struct LogHandle {
    file: reload::Handle<FileLayer, Registry>,
}

impl LogHandle {
    /// Also write every event to `<log_dir>/gifcap.log`.
    pub fn attach_file(&self, log_dir: &Path) -> anyhow::Result<PathBuf> {
        let path = log_dir.join(LOG_FILE_NAME);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;

        let layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .boxed();
        self.file
            .reload(Some(layer))
            .context("failed to attach log file")?;
        Ok(path)
    }
}

/// Initialize logging to stderr.
///
/// The log file lives in the output directory, which is only known once
/// the configuration is loaded; attach it with [`LogHandle::attach_file`].
pub fn init_logging() -> anyhow::Result<LogHandle> {
    let (file_layer, file) = reload::Layer::new(FileLayer::None);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "gifcap=debug,gifcap_lib=debug,gifcap_engine=debug,gifcap_capture=debug,gifcap_encoder=debug,gifcap_clipboard=debug".into()
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .context("logging already initialized")?;
    Ok(LogHandle { file })
}

/// Log panics, with a backtrace, through `tracing`.
pub fn install_panic_hook() {
    panic::set_hook(Box::new(|info| {
        let thread = thread::current();
        let backtrace = Backtrace::force_capture();
        error!(
            thread = thread.name().unwrap_or("<unnamed>"),
            "Unexpected crash: {}\n{}",
            info,
            backtrace
        );
    }));
}

/// A fixed recording run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scenario {
    pub region: CaptureRegion,
    pub fps: u32,
    pub duration: Duration,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            region: CaptureRegion::new(0, 0, 320, 240),
            fps: 10,
            duration: Duration::from_millis(2200),
        }
    }
}

/// How far a scenario got.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioResult {
    /// The GIF was produced and published.
    Completed(PipelineOutcome),

    /// A stage failed.
    Failed {
        stage: &'static str,
        outcome: PipelineOutcome,
    },
}

impl ScenarioResult {
    /// Process exit code.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Completed(_) => 0,
            Self::Failed { .. } => 1,
        }
    }
}

/// Record the scenario's region, then stop, convert and publish.
pub fn run_scenario(engine: &Engine, scenario: &Scenario) -> ScenarioResult {
    info!(?scenario, "Running scenario");

    let Some(session) = engine.start_region(scenario.region, scenario.fps, None) else {
        return ScenarioResult::Failed {
            stage: "record",
            outcome: PipelineOutcome::default(),
        };
    };
    info!(output = %session.output_path.display(), "Recording");

    thread::sleep(scenario.duration);
    let outcome = engine.finish_recording(scenario.fps);

    let stage = if outcome.video.is_none() {
        "record"
    } else if outcome.gif.is_none() {
        "convert"
    } else if !outcome.published {
        "publish"
    } else {
        return ScenarioResult::Completed(outcome);
    };
    ScenarioResult::Failed { stage, outcome }
}

/// Log the events the engine emitted, as a notification area would show them.
pub fn drain_events(events: &Receiver<EngineEvent>) {
    for event in events.try_iter() {
        match event.failure_notice() {
            Some(notice) => warn!(?event, "{}", notice),
            None => info!(?event, "Engine event"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use gifcap_capture::{CaptureResult, CapturedFrame, PixelFormat, ScreenGrabber, StaticMonitors};
    use gifcap_encoder::Converter;
    use gifcap_engine::{AppContext, EngineParts};
    use gifcap_ipc::{event_channel, MonitorDescriptor, RecorderConfig, VideoFormat};

    struct GreyGrabber;

    impl ScreenGrabber for GreyGrabber {
        fn grab(&mut self, region: &CaptureRegion) -> CaptureResult<CapturedFrame> {
            let data = vec![128u8; CapturedFrame::buffer_size(region.width, region.height)];
            Ok(CapturedFrame::new(
                data.into(),
                region.width,
                region.height,
                PixelFormat::Rgba8,
            ))
        }

        fn name(&self) -> &'static str {
            "grey"
        }
    }

    fn engine(dir: &Path) -> (Engine, Receiver<EngineEvent>) {
        let config = RecorderConfig {
            video_format: VideoFormat::Avi,
            ..Default::default()
        };
        let context = AppContext::new(dir, config).unwrap();
        let parts = EngineParts {
            monitors: Box::new(StaticMonitors(vec![
                MonitorDescriptor::new(0, 0, 640, 480, 1.0).primary(),
            ])),
            grabber_factory: Arc::new(|| Ok(Box::new(GreyGrabber) as Box<dyn ScreenGrabber>)),
            converter: Converter::with_ffmpeg(None),
            clipboard: None,
        };
        let (event_tx, events) = event_channel();
        (Engine::with_parts(context, parts, event_tx), events)
    }

    #[test]
    fn test_scenario_without_clipboard_fails_at_publish() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, events) = engine(dir.path());
        let scenario = Scenario {
            duration: Duration::from_millis(250),
            ..Default::default()
        };

        let result = run_scenario(&engine, &scenario);
        match &result {
            ScenarioResult::Failed { stage, outcome } => {
                assert_eq!(*stage, "publish");
                assert!(outcome.video.as_ref().unwrap().is_file());
                assert!(outcome.gif.as_ref().unwrap().is_file());
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(result.exit_code(), 1);
        drain_events(&events);
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_default_scenario() {
        let scenario = Scenario::default();
        assert_eq!(scenario.region, CaptureRegion::new(0, 0, 320, 240));
        assert_eq!(scenario.fps, 10);
        assert_eq!(scenario.duration, Duration::from_millis(2200));
    }
}
