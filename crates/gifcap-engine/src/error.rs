//! Error types for the engine.

use std::path::PathBuf;

use thiserror::Error;

use gifcap_capture::CaptureError;
use gifcap_encoder::EncoderError;
use gifcap_ipc::ConfigError;

/// Errors that can occur while recording or loading configuration.
#[derive(Debug, Error)]
pub enum RecorderError {
    /// Frame rate of zero.
    #[error("Invalid frame rate: {0}")]
    InvalidFrameRate(u32),

    /// Screen capture error.
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    /// Video writing error.
    #[error("Encoder error: {0}")]
    Encoder(#[from] EncoderError),

    /// Invalid configuration values.
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Configuration file could not be parsed.
    #[error("Failed to parse {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The capture thread could not be started or panicked.
    #[error("Capture thread error: {0}")]
    Thread(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
