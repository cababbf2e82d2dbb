//! Channel: one sample buffer with its rate and filter bookkeeping

use crate::error::{SpikerError, SpikerResult};
use serde::{Deserialize, Serialize};

/// Interval sentinel meaning "the whole buffer"
pub const WHOLE_BUFFER: (f64, f64) = (0.0, 0.0);

/// Rounding error, in ulps of the position, below which a sample position is
/// snapped to the nearest integer
const INDEX_SNAP_ULPS: f64 = 4.0;

/// Convert a time in seconds to a sample position at `sample_rate`.
///
/// Floors toward negative infinity, except that products lying within
/// floating-point noise of an integer are taken as that integer: `0.8 * 1000`
/// computed as `799.9999999999999` addresses sample 800.
pub fn seconds_to_index(seconds: f64, sample_rate: f64) -> i64 {
    let position = seconds * sample_rate;
    let nearest = position.round();
    if (position - nearest).abs() <= INDEX_SNAP_ULPS * f64::EPSILON * position.abs().max(1.0) {
        nearest as i64
    } else {
        position.floor() as i64
    }
}

/// Clip a signed index into `[0, len]`
pub(crate) fn clip_index(index: i64, len: usize) -> usize {
    index.clamp(0, len as i64) as usize
}

/// The `[low, high]` Hz window a channel's content is believed to occupy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Passband {
    pub low: f64,
    pub high: f64,
}

impl Passband {
    pub fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    /// Unfiltered passband for a rate: `[0, sample_rate / 2]`
    pub fn full(sample_rate: f64) -> Self {
        Self { low: 0.0, high: sample_rate / 2.0 }
    }

    /// Check `0 <= low < high <= nyquist`
    pub fn validate(&self, nyquist: f64) -> SpikerResult<()> {
        if !self.low.is_finite() || self.low < 0.0 {
            return Err(SpikerError::FrequencyRange {
                frequency: self.low,
                nyquist,
                reason: "passband low edge must be non-negative",
            });
        }
        if !self.high.is_finite() || self.high > nyquist {
            return Err(SpikerError::FrequencyRange {
                frequency: self.high,
                nyquist,
                reason: "passband high edge must not exceed Nyquist",
            });
        }
        if self.low >= self.high {
            return Err(SpikerError::FrequencyRange {
                frequency: self.low,
                nyquist,
                reason: "passband low edge must lie below the high edge",
            });
        }
        Ok(())
    }
}

/// Construction defaults for channels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelDefaults {
    /// Display label
    pub label: String,
    /// Display color
    pub color: String,
    /// Initial passband; `None` means `[0, nyquist]`
    pub passband: Option<Passband>,
}

impl Default for ChannelDefaults {
    fn default() -> Self {
        Self {
            label: "channel".to_string(),
            color: "k".to_string(),
            passband: None,
        }
    }
}

/// One time series of amplitude samples at a fixed rate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ChannelRecord")]
pub struct Channel {
    samples: Vec<f64>,
    sample_rate: f64,
    passband: Passband,
    label: String,
    color: String,
}

/// Unvalidated serialized form of a [`Channel`]
#[derive(Deserialize)]
struct ChannelRecord {
    samples: Vec<f64>,
    sample_rate: f64,
    passband: Passband,
    label: String,
    color: String,
}

impl TryFrom<ChannelRecord> for Channel {
    type Error = SpikerError;

    fn try_from(record: ChannelRecord) -> SpikerResult<Self> {
        let defaults = ChannelDefaults {
            label: record.label,
            color: record.color,
            passband: Some(record.passband),
        };
        Channel::with_defaults(record.samples, record.sample_rate, &defaults)
    }
}

impl Channel {
    /// Create a channel with the default label, color and passband
    pub fn new(samples: Vec<f64>, sample_rate: f64) -> SpikerResult<Self> {
        Self::with_defaults(samples, sample_rate, &ChannelDefaults::default())
    }

    /// Create a channel from explicit construction defaults
    pub fn with_defaults(
        samples: Vec<f64>,
        sample_rate: f64,
        defaults: &ChannelDefaults,
    ) -> SpikerResult<Self> {
        validate_sample_rate(sample_rate)?;
        let passband = defaults.passband.unwrap_or_else(|| Passband::full(sample_rate));
        passband.validate(sample_rate / 2.0)?;

        Ok(Channel {
            samples,
            sample_rate,
            passband,
            label: defaults.label.clone(),
            color: defaults.color.clone(),
        })
    }

    /// Build the next state of this channel, keeping its display metadata.
    ///
    /// Validates the rate and passband before anything is constructed, so a
    /// rejected transform never produces a half-updated channel.
    pub fn with_state(
        &self,
        samples: Vec<f64>,
        sample_rate: f64,
        passband: Passband,
    ) -> SpikerResult<Self> {
        validate_sample_rate(sample_rate)?;
        passband.validate(sample_rate / 2.0)?;

        Ok(Channel {
            samples,
            sample_rate,
            passband,
            label: self.label.clone(),
            color: self.color.clone(),
        })
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f64> {
        self.samples
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn passband(&self) -> Passband {
        self.passband
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Highest representable frequency, `sample_rate / 2`
    pub fn nyquist(&self) -> f64 {
        self.sample_rate / 2.0
    }

    /// Signal duration in seconds
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate
    }

    /// Time of every sample, `i / sample_rate`
    pub fn time_vector(&self) -> Vec<f64> {
        let dt = 1.0 / self.sample_rate;
        (0..self.samples.len()).map(|i| i as f64 * dt).collect()
    }

    /// Basic statistics over the whole buffer
    pub fn stats(&self) -> ChannelStats {
        ChannelStats::calculate(&self.samples)
    }

    /// Population standard deviation over `interval` seconds.
    ///
    /// `WHOLE_BUFFER` selects every sample; other intervals address samples
    /// `floor(start * fs) .. floor(end * fs)`, clipped to the buffer.
    pub fn std_deviation(&self, interval: (f64, f64)) -> SpikerResult<f64> {
        if interval == WHOLE_BUFFER {
            if self.samples.is_empty() {
                return Err(SpikerError::DegenerateSignal {
                    reason: "standard deviation of an empty buffer",
                });
            }
            return Ok(population_std(&self.samples));
        }

        let view = self.interval(interval.0, interval.1);
        if view.samples.is_empty() {
            return Err(SpikerError::InvalidInterval {
                start: interval.0,
                end: interval.1,
            });
        }
        Ok(population_std(view.samples))
    }

    /// Samples and their times between `start` and `end` seconds
    pub fn interval(&self, start: f64, end: f64) -> IntervalView<'_> {
        let len = self.samples.len();
        let first = clip_index(seconds_to_index(start, self.sample_rate), len);
        let last = clip_index(seconds_to_index(end, self.sample_rate), len).max(first);
        let dt = 1.0 / self.sample_rate;

        IntervalView {
            start_index: first,
            time: (first..last).map(|i| i as f64 * dt).collect(),
            samples: &self.samples[first..last],
        }
    }
}

/// Borrowed slice of a channel over a time interval
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalView<'a> {
    /// Buffer index of the first sample
    pub start_index: usize,
    /// Absolute time of each sample
    pub time: Vec<f64>,
    /// The samples themselves
    pub samples: &'a [f64],
}

fn validate_sample_rate(rate: f64) -> SpikerResult<()> {
    if rate.is_finite() && rate > 0.0 {
        Ok(())
    } else {
        Err(SpikerError::InvalidSampleRate { rate })
    }
}

/// Arithmetic mean; zero for an empty slice
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Population standard deviation (ddof = 0); zero for an empty slice
pub fn population_std(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let mean = mean(data);
    let variance = data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / data.len() as f64;
    variance.sqrt()
}

/// Basic statistics for a signal channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelStats {
    pub mean: f64,
    pub rms: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub peak_to_peak: f64,
}

impl ChannelStats {
    pub fn calculate(data: &[f64]) -> Self {
        if data.is_empty() {
            return Self {
                mean: 0.0,
                rms: 0.0,
                std_dev: 0.0,
                min: 0.0,
                max: 0.0,
                peak_to_peak: 0.0,
            };
        }

        let sum_sq: f64 = data.iter().map(|x| x * x).sum();
        let rms = (sum_sq / data.len() as f64).sqrt();

        let min = data.iter().fold(f64::INFINITY, |a, &b| a.min(b));
        let max = data.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));

        Self {
            mean: mean(data),
            rms,
            std_dev: population_std(data),
            min,
            max,
            peak_to_peak: max - min,
        }
    }
}
