//! Events sent from the core to the UI.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::state::RecorderState;
use crate::types::CaptureRegion;

/// Events that the core can send to the UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EngineEvent {
    /// Recorder state has changed.
    StateChanged {
        /// Previous state.
        previous: RecorderState,

        /// Current state.
        current: RecorderState,
    },

    /// A recording session started.
    RecordingStarted {
        /// Physical region being captured.
        region: CaptureRegion,

        /// Video file being written.
        output: PathBuf,
    },

    /// A recording session ended and its video file was finalized.
    RecordingStopped {
        /// Video file, if any frames were recorded.
        output: Option<PathBuf>,

        /// Number of frames written.
        frames: u64,
    },

    /// A video-to-GIF conversion finished.
    ConversionFinished {
        /// Target image path.
        output: PathBuf,

        /// Whether the conversion succeeded.
        success: bool,
    },

    /// The clipboard publisher finished.
    Published {
        /// Published file.
        path: PathBuf,

        /// Whether any clipboard format was accepted.
        success: bool,
    },

    /// Error occurred.
    Error {
        /// Error message.
        message: String,
    },
}

impl EngineEvent {
    /// Returns a short user-facing notification for failures, if any.
    pub fn failure_notice(&self) -> Option<&'static str> {
        match self {
            Self::RecordingStopped { output: None, .. } => Some("No recording produced"),
            Self::ConversionFinished { success: false, .. } => Some("Failed to convert to GIF"),
            Self::Published { success: false, .. } => Some("Failed to copy to clipboard"),
            _ => None,
        }
    }
}
