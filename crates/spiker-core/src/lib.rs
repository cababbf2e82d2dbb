//! Spiker-Core: data model for multichannel biosignal sessions
//!
//! Channels, the session that owns them, the event log recorded alongside,
//! and event-aligned extraction over the session timeline.

pub mod channel;
pub mod epochs;
pub mod error;
pub mod events;
pub mod session;

pub use channel::{Channel, ChannelDefaults, ChannelStats, IntervalView, Passband, WHOLE_BUFFER};
pub use epochs::{AveragedTrace, EventEpochs, EventWindow, Snippet};
pub use error::{ChannelFailure, SpikerError, SpikerResult};
pub use events::{events_path_for, EventMap};
pub use session::{Session, SessionInfo};
