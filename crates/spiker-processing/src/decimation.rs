//! Anti-aliased downsampling

use crate::config::DecimationConfig;
use crate::design::{self, BandForm};
use crate::filters::Sos;
use crate::processor::{ChannelProcessor, ProcessorType};
use spiker_core::{Channel, Passband, SpikerError, SpikerResult};

/// Reduces a channel's rate by an integer factor.
///
/// A Chebyshev type I low-pass below the new Nyquist is applied forward and
/// backward before every `factor`-th sample is kept.
#[derive(Debug, Clone)]
pub struct Decimator {
    factor: usize,
    config: DecimationConfig,
    name: String,
}

impl Decimator {
    pub fn new(factor: usize) -> SpikerResult<Self> {
        Self::with_config(factor, DecimationConfig::default())
    }

    pub fn with_config(factor: usize, config: DecimationConfig) -> SpikerResult<Self> {
        if factor == 0 {
            return Err(SpikerError::InvalidDecimationFactor { factor });
        }
        config.validate()?;
        Ok(Self { factor, config, name: format!("decimate x{}", factor) })
    }

    pub fn factor(&self) -> usize {
        self.factor
    }

    /// Anti-alias filter for this factor
    pub fn anti_alias(&self) -> Sos {
        design::chebyshev1(
            self.config.order,
            self.config.ripple_db,
            BandForm::Lowpass(self.config.cutoff_ratio / self.factor as f64),
        )
    }
}

impl ChannelProcessor for Decimator {
    fn process(&self, input: &Channel) -> SpikerResult<Channel> {
        if self.factor == 1 {
            return Ok(input.clone());
        }

        let new_rate = input.sample_rate() / self.factor as f64;
        let new_nyquist = new_rate / 2.0;

        let current = input.passband();
        let passband = if current.high > new_nyquist {
            tracing::warn!(
                high = current.high,
                new_nyquist,
                "passband high edge clamped to the decimated Nyquist"
            );
            Passband::new(current.low, new_nyquist)
        } else {
            current
        };

        let filtered = self.anti_alias().filtfilt(input.samples());
        let kept: Vec<f64> = filtered
            .into_iter()
            .step_by(self.factor)
            .take(input.len() / self.factor)
            .collect();

        tracing::debug!(
            factor = self.factor,
            from = input.sample_rate(),
            to = new_rate,
            samples = kept.len(),
            "decimated channel"
        );
        input.with_state(kept, new_rate, passband)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn processor_type(&self) -> ProcessorType {
        ProcessorType::Resampler
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn tone(freq: f64, fs: f64, n: usize) -> Vec<f64> {
        (0..n).map(|i| (2.0 * PI * freq * i as f64 / fs).sin()).collect()
    }

    #[test]
    fn test_length_law() {
        for (n, factor) in [(1000usize, 4usize), (1001, 4), (3, 4), (10, 3), (999, 10)] {
            let channel = Channel::new(tone(5.0, 1000.0, n), 1000.0).unwrap();
            let out = Decimator::new(factor).unwrap().process(&channel).unwrap();
            assert_eq!(out.len(), n / factor);
            assert_eq!(out.sample_rate(), 1000.0 / factor as f64);
        }
    }

    #[test]
    fn test_factor_one_and_zero() {
        let channel = Channel::new(tone(5.0, 1000.0, 100), 1000.0).unwrap();
        assert_eq!(Decimator::new(1).unwrap().process(&channel).unwrap(), channel);
        assert!(matches!(
            Decimator::new(0),
            Err(SpikerError::InvalidDecimationFactor { factor: 0 })
        ));
    }

    #[test]
    fn test_passband_clamped() {
        let channel = Channel::new(tone(5.0, 1000.0, 1000), 1000.0).unwrap();
        let out = Decimator::new(4).unwrap().process(&channel).unwrap();
        assert_eq!(out.passband(), Passband::new(0.0, 125.0));
        assert_eq!(out.nyquist(), 125.0);
    }

    #[test]
    fn test_clamp_collapsing_passband_fails() {
        let channel = Channel::new(tone(5.0, 1000.0, 1000), 1000.0)
            .unwrap()
            .with_state(tone(5.0, 1000.0, 1000), 1000.0, Passband::new(200.0, 400.0))
            .unwrap();
        assert!(matches!(
            Decimator::new(4).unwrap().process(&channel),
            Err(SpikerError::FrequencyRange { .. })
        ));
    }

    #[test]
    fn test_in_band_tone_survives_alias_removed() {
        let fs = 1000.0;
        let slow = Channel::new(tone(10.0, fs, 4000), fs).unwrap();
        let out = Decimator::new(4).unwrap().process(&slow).unwrap();
        let expected = tone(10.0, 250.0, 1000);
        for i in 100..900 {
            assert!((out.samples()[i] - expected[i]).abs() < 0.02, "sample {}", i);
        }

        // 240 Hz would alias to 10 Hz without the anti-alias stage
        let fast = Channel::new(tone(240.0, fs, 4000), fs).unwrap();
        let out = Decimator::new(4).unwrap().process(&fast).unwrap();
        let peak = out.samples()[100..900].iter().fold(0.0f64, |m, x| m.max(x.abs()));
        assert!(peak < 0.01, "aliased peak {}", peak);
    }
}
