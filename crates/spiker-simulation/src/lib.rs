//! Spiker-Simulation: synthetic biosignal recordings
//!
//! Seeded multichannel recordings with labeled events, for tests and demos.

pub mod recording;
pub mod waveforms;

pub use recording::{
    render_event_log, EventTrainConfig, RecordingConfig, RecordingSimulator, SimulatedRecording,
};
pub use waveforms::Waveform;
