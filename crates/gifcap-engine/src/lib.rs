//! Core orchestration for gifcap.
//!
//! This crate ties the capture, encoder and clipboard crates together:
//! a [`Recorder`] runs the frame capture loop, and the [`Engine`] exposes
//! the operations the selection UI calls (start, stop, convert, publish).

mod context;
mod error;
mod orchestrator;
mod recorder;

pub use context::{AppContext, OutputLayout, CONFIG_FILE_NAME, HOME_ENV_VAR};
pub use error::RecorderError;
pub use orchestrator::{Engine, EngineParts, PipelineOutcome};
pub use recorder::{
    platform_grabber_factory, FinishedRecording, GrabberFactory, Recorder, RecordingSession,
    StartOutcome, WriterSettings,
};

/// Result type for recorder operations.
pub type RecorderResult<T> = Result<T, RecorderError>;

