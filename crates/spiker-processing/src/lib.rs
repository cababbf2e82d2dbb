//! Spiker-Processing: channel transforms for biosignal sessions
//!
//! Zero-phase filtering, decimation, normalization, bulk dispatch across a
//! session, configurable pipelines and spectral views.

pub mod config;
pub mod decimation;
pub mod design;
pub mod filters;
pub mod normalize;
pub mod pipeline;
pub mod processor;
pub mod session_ops;
pub mod spectrum;

pub use config::{
    DecimationConfig, FilterDefaults, PipelineConfig, ProcessingConfig, SpectrumConfig, StageConfig,
};
pub use decimation::Decimator;
pub use filters::{Biquad, Cutoff, FilterKind, FilterSpec, Sos, ZeroPhaseFilter};
pub use normalize::{Normalization, Normalizer};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use processor::{ChannelProcessor, ChannelTransform, ProcessorType};
pub use session_ops::SessionTransform;
pub use spectrum::{SessionSpectra, SpectralAnalyzer, Spectrogram, Spectrum};
