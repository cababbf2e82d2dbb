//! Amplitude normalization

use crate::processor::{ChannelProcessor, ProcessorType};
use serde::{Deserialize, Serialize};
use spiker_core::channel::{mean, population_std};
use spiker_core::{Channel, SpikerError, SpikerResult};

/// How to rescale a channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Normalization {
    /// Subtract the mean
    Mean,
    /// Divide by the population standard deviation
    Std,
    /// Multiply by a fixed factor
    Scalar(f64),
}

impl Normalization {
    /// Resolve a kind name and optional value.
    ///
    /// `value` is only consulted for `scalar`.
    pub fn parse(kind: &str, value: Option<f64>) -> SpikerResult<Self> {
        match kind.trim().to_ascii_lowercase().as_str() {
            "mean" => Ok(Normalization::Mean),
            "std" => Ok(Normalization::Std),
            "scalar" => {
                let factor = value.ok_or(SpikerError::InvalidNormalizationValue {
                    reason: "scalar normalization requires a value",
                })?;
                Normalization::scalar(factor)
            }
            _ => Err(SpikerError::UnknownNormalization { kind: kind.to_string() }),
        }
    }

    pub fn scalar(factor: f64) -> SpikerResult<Self> {
        if !factor.is_finite() {
            return Err(SpikerError::InvalidNormalizationValue {
                reason: "scalar factor must be finite",
            });
        }
        Ok(Normalization::Scalar(factor))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Normalization::Mean => "mean",
            Normalization::Std => "std",
            Normalization::Scalar(_) => "scalar",
        }
    }

    /// Rescaled copy of `data`
    pub fn apply(&self, data: &[f64]) -> SpikerResult<Vec<f64>> {
        match *self {
            Normalization::Mean => {
                let offset = mean(data);
                Ok(data.iter().map(|x| x - offset).collect())
            }
            Normalization::Std => {
                if data.is_empty() {
                    return Err(SpikerError::DegenerateSignal { reason: "empty buffer" });
                }
                let std = population_std(data);
                if std == 0.0 || !std.is_finite() {
                    return Err(SpikerError::DegenerateSignal {
                        reason: "zero standard deviation",
                    });
                }
                let gain = 1.0 / std;
                Ok(data.iter().map(|x| x * gain).collect())
            }
            Normalization::Scalar(factor) => {
                if !factor.is_finite() {
                    return Err(SpikerError::InvalidNormalizationValue {
                        reason: "scalar factor must be finite",
                    });
                }
                Ok(data.iter().map(|x| x * factor).collect())
            }
        }
    }
}

/// Channel processor applying a [`Normalization`]
#[derive(Debug, Clone)]
pub struct Normalizer {
    normalization: Normalization,
}

impl Normalizer {
    pub fn new(normalization: Normalization) -> Self {
        Self { normalization }
    }
}

impl ChannelProcessor for Normalizer {
    fn process(&self, input: &Channel) -> SpikerResult<Channel> {
        tracing::debug!(kind = self.normalization.name(), "normalize channel");
        let scaled = self.normalization.apply(input.samples())?;
        input.with_state(scaled, input.sample_rate(), input.passband())
    }

    fn name(&self) -> &str {
        self.normalization.name()
    }

    fn processor_type(&self) -> ProcessorType {
        ProcessorType::Scaling
    }
}
