//! Core channel processor trait and the channel transform surface

use crate::decimation::Decimator;
use crate::filters::{FilterSpec, ZeroPhaseFilter};
use crate::normalize::{Normalization, Normalizer};
use serde::{Deserialize, Serialize};
use spiker_core::{Channel, SpikerResult};

/// Core trait for all channel processors.
///
/// A processor never mutates its input: it returns the channel's next state
/// or an error, leaving the caller free to keep the original.
pub trait ChannelProcessor: Send + Sync {
    /// Process a channel and return the transformed copy
    fn process(&self, input: &Channel) -> SpikerResult<Channel>;

    /// Get processor name/identifier
    fn name(&self) -> &str;

    /// Get processor type for pipeline organization
    fn processor_type(&self) -> ProcessorType {
        ProcessorType::Filter
    }
}

/// Types of channel processors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessorType {
    /// Frequency-selective filters
    Filter,
    /// Rate changes
    Resampler,
    /// Amplitude scaling
    Scaling,
    /// Ordered chain of other processors
    Chain,
}

/// Transforms available directly on a [`Channel`]
pub trait ChannelTransform {
    /// Zero-phase filter; see [`FilterSpec`]
    fn filter(&self, spec: &FilterSpec) -> SpikerResult<Channel>;

    /// Anti-aliased downsampling by `factor`
    fn decimate(&self, factor: usize) -> SpikerResult<Channel>;

    /// Amplitude normalization
    fn normalize(&self, normalization: Normalization) -> SpikerResult<Channel>;
}

impl ChannelTransform for Channel {
    fn filter(&self, spec: &FilterSpec) -> SpikerResult<Channel> {
        ZeroPhaseFilter::new(*spec).process(self)
    }

    fn decimate(&self, factor: usize) -> SpikerResult<Channel> {
        Decimator::new(factor)?.process(self)
    }

    fn normalize(&self, normalization: Normalization) -> SpikerResult<Channel> {
        Normalizer::new(normalization).process(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::FilterKind;
    use spiker_core::SpikerError;

    #[test]
    fn test_transforms_leave_input_untouched() {
        let samples: Vec<f64> = (0..200).map(|i| (i as f64 * 0.3).sin()).collect();
        let channel = Channel::new(samples.clone(), 200.0).unwrap();

        let filtered = channel.filter(&FilterSpec::lowpass(20.0)).unwrap();
        let decimated = channel.decimate(2).unwrap();
        let scaled = channel.normalize(Normalization::Scalar(2.0)).unwrap();

        assert_eq!(channel.samples(), samples.as_slice());
        assert_eq!(filtered.len(), 200);
        assert_eq!(decimated.len(), 100);
        assert_eq!(scaled.samples()[1], 2.0 * samples[1]);
    }

    #[test]
    fn test_kind_from_name() {
        let kind: FilterKind = "hp".parse().unwrap();
        let channel = Channel::new(vec![0.0; 64], 100.0).unwrap();
        let err = channel.filter(&FilterSpec::new(kind, 80.0)).unwrap_err();
        assert!(matches!(err, SpikerError::FrequencyRange { nyquist, .. } if nyquist == 50.0));
    }

    #[test]
    fn test_processor_types() {
        assert_eq!(
            ZeroPhaseFilter::new(FilterSpec::lowpass(1.0)).processor_type(),
            ProcessorType::Filter
        );
        assert_eq!(Decimator::new(2).unwrap().processor_type(), ProcessorType::Resampler);
        assert_eq!(Normalizer::new(Normalization::Mean).processor_type(), ProcessorType::Scaling);
    }
}
