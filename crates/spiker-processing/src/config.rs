//! Configuration management for channel processing

use crate::filters::{Cutoff, FilterKind, FilterSpec, DEFAULT_FILTER_ORDER};
use crate::normalize::Normalization;
use serde::{Deserialize, Serialize};
use spiker_core::{ChannelDefaults, SpikerError, SpikerResult};
use std::path::Path;

/// Global processing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Defaults for channel filters
    pub filter: FilterDefaults,
    /// Anti-alias design used by decimation
    pub decimation: DecimationConfig,
    /// Segmenting for spectral views
    pub spectrum: SpectrumConfig,
    /// Construction defaults for new channels
    pub channel: ChannelDefaults,
    /// Named processing chains
    pub pipelines: Vec<PipelineConfig>,
}

/// Filter parameters used when a request leaves them out
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterDefaults {
    /// Butterworth order of each pass
    pub order: usize,
}

/// Chebyshev type I anti-alias design
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecimationConfig {
    pub order: usize,
    /// Passband ripple (dB)
    pub ripple_db: f64,
    /// Cutoff as a fraction of the decimated Nyquist
    pub cutoff_ratio: f64,
}

/// Segment sizes for PSD and spectrogram estimates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrumConfig {
    /// Samples per FFT segment
    pub segment_len: usize,
    /// Overlap between Welch segments
    pub psd_overlap: usize,
    /// Overlap between spectrogram columns
    pub spectrogram_overlap: usize,
}

/// One ordered processing chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    /// Stages in execution order
    pub stages: Vec<StageConfig>,
}

/// A single pipeline stage as written in configuration files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "lowercase")]
pub enum StageConfig {
    Filter {
        /// Filter kind name or short code (`hp`, `lp`, `n`, `bp`, `br`)
        kind: String,
        cutoff: Cutoff,
        #[serde(default)]
        order: Option<usize>,
    },
    Decimate {
        factor: usize,
    },
    Normalize {
        /// `mean`, `std` or `scalar`
        kind: String,
        #[serde(default)]
        value: Option<f64>,
    },
}

impl StageConfig {
    /// Resolve a filter stage into a filter specification
    pub fn filter_spec(&self, defaults: &FilterDefaults) -> SpikerResult<Option<FilterSpec>> {
        match self {
            StageConfig::Filter { kind, cutoff, order } => {
                let kind: FilterKind = kind.parse()?;
                Ok(Some(FilterSpec {
                    kind,
                    cutoff: *cutoff,
                    order: order.unwrap_or(defaults.order),
                }))
            }
            _ => Ok(None),
        }
    }

    /// Resolve a normalize stage
    pub fn normalization(&self) -> SpikerResult<Option<Normalization>> {
        match self {
            StageConfig::Normalize { kind, value } => Normalization::parse(kind, *value).map(Some),
            _ => Ok(None),
        }
    }
}

impl ProcessingConfig {
    /// Parse configuration from JSON text
    pub fn from_json_str(json: &str) -> SpikerResult<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| SpikerError::Config {
            message: format!("Failed to deserialize configuration: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> SpikerResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| SpikerError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        tracing::debug!(path = %path.display(), "loading processing configuration");
        Self::from_json_str(&text)
    }

    /// Export configuration to JSON
    pub fn to_json(&self) -> SpikerResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| SpikerError::Config {
            message: format!("Failed to serialize configuration: {}", e),
        })
    }

    /// Validate entire configuration
    pub fn validate(&self) -> SpikerResult<()> {
        self.filter.validate()?;
        self.decimation.validate()?;
        self.spectrum.validate()?;

        for pipeline in &self.pipelines {
            pipeline.validate(&self.filter)?;
        }
        Ok(())
    }

    /// Get pipeline configuration by name
    pub fn get_pipeline(&self, name: &str) -> Option<&PipelineConfig> {
        self.pipelines.iter().find(|p| p.name == name)
    }
}

impl PipelineConfig {
    pub fn validate(&self, defaults: &FilterDefaults) -> SpikerResult<()> {
        if self.name.is_empty() {
            return Err(config_error("Pipeline name cannot be empty".to_string()));
        }
        if self.stages.is_empty() {
            return Err(config_error(format!("Pipeline '{}' has no stages", self.name)));
        }

        for (position, stage) in self.stages.iter().enumerate() {
            let invalid = |e: SpikerError| {
                config_error(format!("Pipeline '{}' stage {}: {}", self.name, position, e))
            };
            match stage {
                StageConfig::Filter { .. } => {
                    if let Some(spec) = stage.filter_spec(defaults).map_err(invalid)? {
                        if spec.order == 0 && spec.kind != FilterKind::Notch {
                            return Err(invalid(SpikerError::InvalidFilterOrder { order: 0 }));
                        }
                    }
                }
                StageConfig::Decimate { factor } => {
                    if *factor == 0 {
                        return Err(invalid(SpikerError::InvalidDecimationFactor { factor: 0 }));
                    }
                }
                StageConfig::Normalize { .. } => {
                    stage.normalization().map_err(invalid)?;
                }
            }
        }
        Ok(())
    }
}

impl FilterDefaults {
    pub fn validate(&self) -> SpikerResult<()> {
        if self.order == 0 {
            return Err(config_error("Filter order must be greater than 0".to_string()));
        }
        Ok(())
    }
}

impl DecimationConfig {
    pub fn validate(&self) -> SpikerResult<()> {
        if self.order == 0 {
            return Err(config_error("Anti-alias order must be greater than 0".to_string()));
        }
        if !(self.ripple_db.is_finite() && self.ripple_db > 0.0) {
            return Err(config_error("Anti-alias ripple must be positive".to_string()));
        }
        if !(self.cutoff_ratio > 0.0 && self.cutoff_ratio < 1.0) {
            return Err(config_error("Anti-alias cutoff ratio must lie in (0, 1)".to_string()));
        }
        Ok(())
    }
}

impl SpectrumConfig {
    pub fn validate(&self) -> SpikerResult<()> {
        if self.segment_len == 0 {
            return Err(config_error("Spectral segment length must be greater than 0".to_string()));
        }
        if self.psd_overlap >= self.segment_len || self.spectrogram_overlap >= self.segment_len {
            return Err(config_error(
                "Segment overlap must be shorter than the segment".to_string(),
            ));
        }
        Ok(())
    }

    /// Hop between consecutive Welch segments
    pub fn psd_step(&self) -> usize {
        self.segment_len - self.psd_overlap
    }

    /// Hop between consecutive spectrogram columns
    pub fn spectrogram_step(&self) -> usize {
        self.segment_len - self.spectrogram_overlap
    }
}

fn config_error(message: String) -> SpikerError {
    SpikerError::Config { message }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            filter: FilterDefaults::default(),
            decimation: DecimationConfig::default(),
            spectrum: SpectrumConfig::default(),
            channel: ChannelDefaults::default(),
            pipelines: Vec::new(),
        }
    }
}

impl Default for FilterDefaults {
    fn default() -> Self {
        Self { order: DEFAULT_FILTER_ORDER }
    }
}

impl Default for DecimationConfig {
    fn default() -> Self {
        Self { order: 8, ripple_db: 0.05, cutoff_ratio: 0.8 }
    }
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self { segment_len: 256, psd_overlap: 0, spectrogram_overlap: 128 }
    }
}
