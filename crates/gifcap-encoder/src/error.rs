//! Error types for the encoder module.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during encoding and conversion.
#[derive(Debug, Error)]
pub enum EncoderError {
    /// No ffmpeg binary could be located.
    #[error("ffmpeg not found")]
    FfmpegNotFound,

    /// ffmpeg could not be started.
    #[error("Failed to spawn ffmpeg: {0}")]
    FfmpegSpawn(#[source] std::io::Error),

    /// ffmpeg exited unsuccessfully.
    #[error("ffmpeg failed: {0}")]
    FfmpegFailed(String),

    /// The output extension names no supported container.
    #[error("Unsupported container: {0}")]
    UnsupportedContainer(String),

    /// The container could not be parsed.
    #[error("Malformed container: {0}")]
    MalformedContainer(String),

    /// The input produced no frames.
    #[error("No frames to encode")]
    NoFrames,

    /// Input file does not exist.
    #[error("Input not found: {}", .0.display())]
    InputMissing(PathBuf),

    /// Invalid input data.
    #[error("Invalid input data: {0}")]
    InvalidInput(String),

    /// The writer was already finalized.
    #[error("Writer already finished")]
    AlreadyFinished,

    /// Image codec error.
    #[error("Image codec error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
