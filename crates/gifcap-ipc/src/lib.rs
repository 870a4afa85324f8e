//! Shared value types for gifcap.
//!
//! This crate defines the data exchanged between the selection UI (overlay,
//! toolbar) and the capture core: rectangles in both coordinate spaces,
//! monitor descriptors, recorder configuration, and the events the core
//! reports back.

mod events;
mod state;
mod types;

pub use events::EngineEvent;
pub use state::RecorderState;
pub use types::{
    CaptureRegion, ConfigError, MonitorDescriptor, RecorderConfig, SelectionRect, VideoFormat,
};

use crossbeam_channel::{Receiver, Sender};

/// Channel capacity for events (core → UI).
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Creates a bounded event channel.
pub fn event_channel() -> (Sender<EngineEvent>, Receiver<EngineEvent>) {
    crossbeam_channel::bounded(EVENT_CHANNEL_CAPACITY)
}
