//! Zero-phase IIR filtering of channels

use crate::design::{self, BandForm};
use crate::processor::ChannelProcessor;
use serde::{Deserialize, Serialize};
use spiker_core::{Channel, Passband, SpikerError, SpikerResult};
use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

/// Default Butterworth order for channel filters
pub const DEFAULT_FILTER_ORDER: usize = 2;

/// Filter response kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    Highpass,
    Lowpass,
    /// Second-order notch with a frequency-derived quality factor
    Notch,
    Bandpass,
    Bandreject,
}

impl FilterKind {
    pub fn name(&self) -> &'static str {
        match self {
            FilterKind::Highpass => "highpass",
            FilterKind::Lowpass => "lowpass",
            FilterKind::Notch => "notch",
            FilterKind::Bandpass => "bandpass",
            FilterKind::Bandreject => "bandreject",
        }
    }

    /// Kinds that take a `[low, high]` pair
    pub fn is_band(&self) -> bool {
        matches!(self, FilterKind::Bandpass | FilterKind::Bandreject)
    }
}

impl FromStr for FilterKind {
    type Err = SpikerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "highpass" | "hp" => Ok(FilterKind::Highpass),
            "lowpass" | "lp" => Ok(FilterKind::Lowpass),
            "notch" | "n" => Ok(FilterKind::Notch),
            "bandpass" | "bp" => Ok(FilterKind::Bandpass),
            "bandreject" | "bandstop" | "br" => Ok(FilterKind::Bandreject),
            _ => Err(SpikerError::UnknownFilterKind { kind: s.to_string() }),
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Cutoff frequency (Hz): one edge or a `[low, high]` band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cutoff {
    Single(f64),
    Band(f64, f64),
}

impl Cutoff {
    fn first(&self) -> f64 {
        match *self {
            Cutoff::Single(f) | Cutoff::Band(f, _) => f,
        }
    }
}

impl From<f64> for Cutoff {
    fn from(value: f64) -> Self {
        Cutoff::Single(value)
    }
}

impl From<(f64, f64)> for Cutoff {
    fn from((low, high): (f64, f64)) -> Self {
        Cutoff::Band(low, high)
    }
}

impl From<[f64; 2]> for Cutoff {
    fn from([low, high]: [f64; 2]) -> Self {
        Cutoff::Band(low, high)
    }
}

/// What to filter and how hard
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub kind: FilterKind,
    pub cutoff: Cutoff,
    /// Butterworth order of each pass (ignored by the notch)
    #[serde(default = "default_order")]
    pub order: usize,
}

fn default_order() -> usize {
    DEFAULT_FILTER_ORDER
}

impl FilterSpec {
    pub fn new(kind: FilterKind, cutoff: impl Into<Cutoff>) -> Self {
        Self { kind, cutoff: cutoff.into(), order: DEFAULT_FILTER_ORDER }
    }

    pub fn highpass(cutoff: f64) -> Self {
        Self::new(FilterKind::Highpass, cutoff)
    }

    pub fn lowpass(cutoff: f64) -> Self {
        Self::new(FilterKind::Lowpass, cutoff)
    }

    pub fn notch(cutoff: f64) -> Self {
        Self::new(FilterKind::Notch, cutoff)
    }

    pub fn bandpass(low: f64, high: f64) -> Self {
        Self::new(FilterKind::Bandpass, (low, high))
    }

    pub fn bandreject(low: f64, high: f64) -> Self {
        Self::new(FilterKind::Bandreject, (low, high))
    }

    pub fn with_order(mut self, order: usize) -> Self {
        self.order = order;
        self
    }

    /// Check the cutoff against a channel's Nyquist frequency
    pub fn validate(&self, nyquist: f64) -> SpikerResult<()> {
        if self.order == 0 && self.kind != FilterKind::Notch {
            return Err(SpikerError::InvalidFilterOrder { order: self.order });
        }

        match (self.kind.is_band(), self.cutoff) {
            (false, Cutoff::Single(f)) => {
                check_edge(f, nyquist)?;
                if self.kind == FilterKind::Notch && f <= 1.0 {
                    return Err(SpikerError::NotchDomain { cutoff: f });
                }
                Ok(())
            }
            (true, Cutoff::Band(low, high)) => {
                check_edge(low, nyquist)?;
                check_edge(high, nyquist)?;
                if low >= high {
                    return Err(SpikerError::FrequencyRange {
                        frequency: low,
                        nyquist,
                        reason: "band low edge must lie below the high edge",
                    });
                }
                Ok(())
            }
            (false, cutoff) => Err(SpikerError::FrequencyRange {
                frequency: cutoff.first(),
                nyquist,
                reason: "single-edge filter given a frequency band",
            }),
            (true, cutoff) => Err(SpikerError::FrequencyRange {
                frequency: cutoff.first(),
                nyquist,
                reason: "band filter requires a [low, high] pair",
            }),
        }
    }

    /// Validate and design second-order sections for `sample_rate`
    pub fn design(&self, sample_rate: f64) -> SpikerResult<Sos> {
        let nyquist = sample_rate / 2.0;
        self.validate(nyquist)?;

        let sos = match (self.kind, self.cutoff) {
            (FilterKind::Notch, Cutoff::Single(f)) => {
                design::iir_notch(f / nyquist, notch_quality(f))
            }
            (FilterKind::Highpass, Cutoff::Single(f)) => {
                design::butterworth(self.order, BandForm::Highpass(f / nyquist))
            }
            (FilterKind::Lowpass, Cutoff::Single(f)) => {
                design::butterworth(self.order, BandForm::Lowpass(f / nyquist))
            }
            (FilterKind::Bandpass, Cutoff::Band(low, high)) => {
                design::butterworth(self.order, BandForm::Bandpass(low / nyquist, high / nyquist))
            }
            (FilterKind::Bandreject, Cutoff::Band(low, high)) => {
                design::butterworth(self.order, BandForm::Bandstop(low / nyquist, high / nyquist))
            }
            // shape mismatches were rejected by validate
            (_, cutoff) => {
                return Err(SpikerError::FrequencyRange {
                    frequency: cutoff.first(),
                    nyquist,
                    reason: "cutoff shape does not match filter kind",
                })
            }
        };
        Ok(sos)
    }

    /// Passband recorded after this filter has been applied.
    ///
    /// A band reject records the rejected band verbatim.
    pub fn next_passband(&self, current: Passband) -> Passband {
        match (self.kind, self.cutoff) {
            (FilterKind::Highpass, Cutoff::Single(f)) => Passband::new(f, current.high),
            (FilterKind::Lowpass, Cutoff::Single(f)) => Passband::new(current.low, f),
            (FilterKind::Bandpass | FilterKind::Bandreject, Cutoff::Band(low, high)) => {
                Passband::new(low, high)
            }
            _ => current,
        }
    }
}

fn check_edge(frequency: f64, nyquist: f64) -> SpikerResult<()> {
    if !frequency.is_finite() || frequency <= 0.0 {
        return Err(SpikerError::FrequencyRange {
            frequency,
            nyquist,
            reason: "cutoff must be positive",
        });
    }
    if frequency >= nyquist {
        return Err(SpikerError::FrequencyRange {
            frequency,
            nyquist,
            reason: "cutoff must lie below Nyquist",
        });
    }
    Ok(())
}

/// Notch quality factor, defined for `cutoff > 1`
pub fn notch_quality(cutoff: f64) -> f64 {
    ((cutoff + 1.0) * (cutoff - 1.0)).sqrt() / 2.0
}

/// One second-order section, `a0` normalized to 1
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Biquad {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl Biquad {
    pub fn new(b0: f64, b1: f64, b2: f64, a1: f64, a2: f64) -> Self {
        Self { b0, b1, b2, a1, a2 }
    }

    /// Transposed direct form II step
    #[inline]
    fn step(&self, x: f64, state: &mut [f64; 2]) -> f64 {
        let y = self.b0 * x + state[0];
        state[0] = self.b1 * x - self.a1 * y + state[1];
        state[1] = self.b2 * x - self.a2 * y;
        y
    }

    fn dc_gain(&self) -> f64 {
        (self.b0 + self.b1 + self.b2) / (1.0 + self.a1 + self.a2)
    }

    /// State a unit step settles to
    fn step_state(&self) -> [f64; 2] {
        let g = self.dc_gain();
        let z2 = self.b2 - self.a2 * g;
        [self.b1 - self.a1 * g + z2, z2]
    }
}

/// Cascade of second-order sections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sos {
    sections: Vec<Biquad>,
}

impl Sos {
    pub fn new(sections: Vec<Biquad>) -> Self {
        Self { sections }
    }

    pub fn sections(&self) -> &[Biquad] {
        &self.sections
    }

    /// Magnitude response at `w` (1.0 == Nyquist)
    pub fn gain_at(&self, w: f64) -> f64 {
        let z = num_complex::Complex64::from_polar(1.0, -PI * w);
        let z2 = z * z;
        self.sections
            .iter()
            .map(|s| ((s.b0 + s.b1 * z + s.b2 * z2) / (1.0 + s.a1 * z + s.a2 * z2)).norm())
            .product()
    }

    /// Causal filtering from rest
    pub fn filter(&self, data: &[f64]) -> Vec<f64> {
        let mut state = vec![[0.0; 2]; self.sections.len()];
        self.run(data, &mut state)
    }

    fn run(&self, data: &[f64], state: &mut [[f64; 2]]) -> Vec<f64> {
        data.iter()
            .map(|&x| {
                self.sections
                    .iter()
                    .zip(state.iter_mut())
                    .fold(x, |acc, (section, z)| section.step(acc, z))
            })
            .collect()
    }

    /// Per-section state for a unit step held since the start
    fn step_response_state(&self) -> Vec<[f64; 2]> {
        let mut scale = 1.0;
        self.sections
            .iter()
            .map(|section| {
                let [z1, z2] = section.step_state();
                let state = [z1 * scale, z2 * scale];
                scale *= section.dc_gain();
                state
            })
            .collect()
    }

    /// Samples of odd extension added at each end before filtering
    pub fn pad_len(&self) -> usize {
        let trailing_b = self.sections.iter().filter(|s| s.b2 == 0.0).count();
        let trailing_a = self.sections.iter().filter(|s| s.a2 == 0.0).count();
        3 * (2 * self.sections.len() + 1 - trailing_b.min(trailing_a))
    }

    /// Forward-backward filtering with odd edge extension.
    ///
    /// Output has the input's length and no phase shift. Inputs shorter than
    /// the usual padding get `len - 1` samples of extension instead.
    pub fn filtfilt(&self, data: &[f64]) -> Vec<f64> {
        if data.is_empty() {
            return Vec::new();
        }

        let edge = self.pad_len().min(data.len() - 1);
        let extended = odd_extend(data, edge);
        let zi = self.step_response_state();

        let mut state: Vec<[f64; 2]> = scaled_state(&zi, extended[0]);
        let mut forward = self.run(&extended, &mut state);
        forward.reverse();

        let mut state = scaled_state(&zi, forward[0]);
        let mut output = self.run(&forward, &mut state);
        output.reverse();

        output.drain(..edge);
        output.truncate(data.len());
        output
    }
}

fn scaled_state(zi: &[[f64; 2]], by: f64) -> Vec<[f64; 2]> {
    zi.iter().map(|[z1, z2]| [z1 * by, z2 * by]).collect()
}

/// Point-reflect `edge` samples about each end
fn odd_extend(data: &[f64], edge: usize) -> Vec<f64> {
    let n = data.len();
    let (first, last) = (data[0], data[n - 1]);

    let mut extended = Vec::with_capacity(n + 2 * edge);
    extended.extend((1..=edge).rev().map(|i| 2.0 * first - data[i]));
    extended.extend_from_slice(data);
    extended.extend((1..=edge).map(|i| 2.0 * last - data[n - 1 - i]));
    extended
}

/// Channel processor applying one zero-phase filter
#[derive(Debug, Clone)]
pub struct ZeroPhaseFilter {
    spec: FilterSpec,
    name: String,
}

impl ZeroPhaseFilter {
    pub fn new(spec: FilterSpec) -> Self {
        let name = format!("{} {:?}", spec.kind, spec.cutoff);
        Self { spec, name }
    }

    pub fn spec(&self) -> &FilterSpec {
        &self.spec
    }
}

impl ChannelProcessor for ZeroPhaseFilter {
    fn process(&self, input: &Channel) -> SpikerResult<Channel> {
        let sos = self.spec.design(input.sample_rate())?;
        let passband = self.spec.next_passband(input.passband());

        tracing::debug!(
            kind = %self.spec.kind,
            cutoff = ?self.spec.cutoff,
            order = self.spec.order,
            sample_rate = input.sample_rate(),
            "zero-phase filter"
        );

        let filtered = sos.filtfilt(input.samples());
        input.with_state(filtered, input.sample_rate(), passband)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(freq: f64, fs: f64, n: usize) -> Vec<f64> {
        (0..n).map(|i| (2.0 * PI * freq * i as f64 / fs).sin()).collect()
    }

    fn rms(data: &[f64]) -> f64 {
        (data.iter().map(|x| x * x).sum::<f64>() / data.len() as f64).sqrt()
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("bp".parse::<FilterKind>().unwrap(), FilterKind::Bandpass);
        assert_eq!("Lowpass".parse::<FilterKind>().unwrap(), FilterKind::Lowpass);
        assert_eq!("bandstop".parse::<FilterKind>().unwrap(), FilterKind::Bandreject);
        assert_eq!("n".parse::<FilterKind>().unwrap(), FilterKind::Notch);
        assert!(matches!(
            "comb".parse::<FilterKind>(),
            Err(SpikerError::UnknownFilterKind { .. })
        ));
    }

    #[test]
    fn test_nyquist_guard() {
        let channel = Channel::new(vec![0.0; 100], 1000.0).unwrap();
        let err = ZeroPhaseFilter::new(FilterSpec::lowpass(600.0)).process(&channel).unwrap_err();
        match err {
            SpikerError::FrequencyRange { frequency, nyquist, .. } => {
                assert_eq!(frequency, 600.0);
                assert_eq!(nyquist, 500.0);
            }
            other => panic!("unexpected error {:?}", other),
        }

        assert!(FilterSpec::highpass(500.0).validate(500.0).is_err());
        assert!(FilterSpec::highpass(0.0).validate(500.0).is_err());
        assert!(FilterSpec::bandpass(100.0, 50.0).validate(500.0).is_err());
        assert!(FilterSpec::new(FilterKind::Bandpass, 50.0).validate(500.0).is_err());
        assert!(FilterSpec::new(FilterKind::Lowpass, (1.0, 2.0)).validate(500.0).is_err());
        assert!(matches!(
            FilterSpec::lowpass(50.0).with_order(0).validate(500.0),
            Err(SpikerError::InvalidFilterOrder { order: 0 })
        ));
    }

    #[test]
    fn test_notch_domain() {
        assert!(matches!(
            FilterSpec::notch(1.0).validate(500.0),
            Err(SpikerError::NotchDomain { .. })
        ));
        assert!((notch_quality(60.0) - (61.0f64 * 59.0).sqrt() / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_length_preserved() {
        let spec = FilterSpec::bandpass(5.0, 40.0).with_order(4);
        for n in [1usize, 2, 7, 50, 1000] {
            let channel = Channel::new(tone(10.0, 250.0, n), 250.0).unwrap();
            let out = ZeroPhaseFilter::new(spec).process(&channel).unwrap();
            assert_eq!(out.len(), n);
        }
        let empty = Channel::new(Vec::new(), 250.0).unwrap();
        assert!(ZeroPhaseFilter::new(spec).process(&empty).unwrap().is_empty());
    }

    #[test]
    fn test_filtfilt_keeps_constant() {
        let sos = design::butterworth(2, BandForm::Lowpass(0.1));
        let out = sos.filtfilt(&[3.0; 200]);
        assert!(out.iter().all(|v| (v - 3.0).abs() < 1e-9));
    }

    #[test]
    fn test_lowpass_attenuates_high_tone() {
        let fs = 1000.0;
        let mixed: Vec<f64> = tone(5.0, fs, 2000)
            .iter()
            .zip(tone(200.0, fs, 2000))
            .map(|(a, b)| a + b)
            .collect();
        let channel = Channel::new(mixed, fs).unwrap();
        let out = ZeroPhaseFilter::new(FilterSpec::lowpass(30.0).with_order(4))
            .process(&channel)
            .unwrap();

        let reference = tone(5.0, fs, 2000);
        let residual: Vec<f64> = out.samples()[200..1800]
            .iter()
            .zip(&reference[200..1800])
            .map(|(a, b)| a - b)
            .collect();
        assert!(rms(&residual) < 0.01, "residual rms {}", rms(&residual));
    }

    #[test]
    fn test_zero_phase_alignment() {
        // a symmetric pulse stays centred after forward-backward filtering
        let mut data = vec![0.0; 401];
        data[200] = 1.0;
        let out = design::butterworth(2, BandForm::Lowpass(0.1)).filtfilt(&data);
        let peak = out
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, 200);
        assert!((out[190] - out[210]).abs() < 1e-6);
    }

    #[test]
    fn test_passband_bookkeeping() {
        let channel = Channel::new(tone(10.0, 1000.0, 500), 1000.0).unwrap();

        let hp = ZeroPhaseFilter::new(FilterSpec::highpass(1.0)).process(&channel).unwrap();
        assert_eq!(hp.passband(), Passband::new(1.0, 500.0));

        let lp = ZeroPhaseFilter::new(FilterSpec::lowpass(100.0)).process(&hp).unwrap();
        assert_eq!(lp.passband(), Passband::new(1.0, 100.0));

        let notched = ZeroPhaseFilter::new(FilterSpec::notch(60.0)).process(&lp).unwrap();
        assert_eq!(notched.passband(), lp.passband());

        let br = ZeroPhaseFilter::new(FilterSpec::bandreject(55.0, 65.0)).process(&lp).unwrap();
        assert_eq!(br.passband(), Passband::new(55.0, 65.0));

        // a highpass above the current high edge would break low < high
        assert!(matches!(
            ZeroPhaseFilter::new(FilterSpec::highpass(200.0)).process(&lp),
            Err(SpikerError::FrequencyRange { .. })
        ));
    }

    #[test]
    fn test_notch_removes_line_noise() {
        let fs = 1000.0;
        let channel = Channel::new(tone(60.0, fs, 4000), fs).unwrap();
        let out = ZeroPhaseFilter::new(FilterSpec::notch(60.0)).process(&channel).unwrap();
        assert!(rms(&out.samples()[1000..3000]) < 0.05);
    }
}
