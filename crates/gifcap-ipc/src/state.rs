//! Recorder state machine types.

use serde::{Deserialize, Serialize};

/// The lifecycle state of the frame capture loop.
///
/// The recorder only ever moves `Idle → Recording → Idle`; there is no
/// intermediate stopping state visible to callers because `stop` blocks
/// until the capture thread has exited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecorderState {
    /// No session is active.
    #[default]
    Idle,

    /// A capture thread is running.
    Recording,
}
