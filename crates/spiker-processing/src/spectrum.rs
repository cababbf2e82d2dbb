//! Spectral views of a channel
//!
//! Magnitude spectrum, Welch power spectral density and spectrogram, all
//! one-sided and Hann windowed.

use crate::config::SpectrumConfig;
use realfft::RealFftPlanner;
use serde::{Deserialize, Serialize};
use spiker_core::{Session, SpikerError, SpikerResult};
use std::f64::consts::PI;

/// Values on a one-sided frequency axis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spectrum {
    /// Bin frequencies in Hz
    pub frequencies: Vec<f64>,
    pub values: Vec<f64>,
}

/// Power density per segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spectrogram {
    pub frequencies: Vec<f64>,
    /// Segment centre times in seconds
    pub times: Vec<f64>,
    /// One column of density values per segment
    pub columns: Vec<Vec<f64>>,
}

/// Symmetric Hann window of `len` points
pub fn hann(len: usize) -> Vec<f64> {
    if len <= 1 {
        return vec![1.0; len];
    }
    let denom = (len - 1) as f64;
    (0..len).map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / denom).cos()).collect()
}

/// Spectral estimator with a cached FFT planner
pub struct SpectralAnalyzer {
    config: SpectrumConfig,
    planner: RealFftPlanner<f64>,
}

impl SpectralAnalyzer {
    pub fn new(config: SpectrumConfig) -> SpikerResult<Self> {
        config.validate()?;
        Ok(Self { config, planner: RealFftPlanner::new() })
    }

    pub fn config(&self) -> &SpectrumConfig {
        &self.config
    }

    /// |FFT| of the whole Hann-windowed slice, scaled by the window sum
    pub fn magnitude_spectrum(&mut self, data: &[f64], sample_rate: f64) -> SpikerResult<Spectrum> {
        ensure_samples(data)?;
        let window = hann(data.len());
        let scale = window.iter().sum::<f64>();

        let values = self
            .one_sided_fft(data, &window)?
            .into_iter()
            .map(|power| power.sqrt() / scale)
            .collect();

        Ok(Spectrum { frequencies: bin_frequencies(data.len(), sample_rate), values })
    }

    /// Welch estimate: mean of segment periodograms (units²/Hz)
    pub fn psd(&mut self, data: &[f64], sample_rate: f64) -> SpikerResult<Spectrum> {
        let step = self.config.psd_step();
        let columns = self.periodograms(data, sample_rate, step)?;
        let count = columns.len() as f64;

        let bins = columns.first().map_or(0, Vec::len);
        let values = (0..bins)
            .map(|k| columns.iter().map(|c| c[k]).sum::<f64>() / count)
            .collect();

        Ok(Spectrum {
            frequencies: bin_frequencies(self.config.segment_len, sample_rate),
            values,
        })
    }

    /// Periodogram of each overlapping segment
    pub fn spectrogram(&mut self, data: &[f64], sample_rate: f64) -> SpikerResult<Spectrogram> {
        let step = self.config.spectrogram_step();
        let columns = self.periodograms(data, sample_rate, step)?;
        let half = self.config.segment_len as f64 / 2.0;
        let times = (0..columns.len())
            .map(|i| (half + (i * step) as f64) / sample_rate)
            .collect();

        Ok(Spectrogram {
            frequencies: bin_frequencies(self.config.segment_len, sample_rate),
            times,
            columns,
        })
    }

    fn periodograms(
        &mut self,
        data: &[f64],
        sample_rate: f64,
        step: usize,
    ) -> SpikerResult<Vec<Vec<f64>>> {
        ensure_samples(data)?;
        let nfft = self.config.segment_len;
        let overlap = nfft - step;

        let mut padded = data.to_vec();
        if padded.len() < nfft {
            padded.resize(nfft, 0.0);
        }
        let segments = (padded.len() - overlap) / step;

        let window = hann(nfft);
        let scale = sample_rate * window.iter().map(|w| w * w).sum::<f64>();
        // bins other than DC (and Nyquist for even lengths) carry both halves
        let doubled_end = if nfft % 2 == 0 { nfft / 2 } else { nfft / 2 + 1 };

        (0..segments)
            .map(|s| {
                let frame = &padded[s * step..s * step + nfft];
                let mut column = self.one_sided_fft(frame, &window)?;
                for (k, value) in column.iter_mut().enumerate() {
                    *value /= scale;
                    if k >= 1 && k < doubled_end {
                        *value *= 2.0;
                    }
                }
                Ok(column)
            })
            .collect()
    }

    /// Squared magnitude of the one-sided FFT of `frame * window`
    fn one_sided_fft(&mut self, frame: &[f64], window: &[f64]) -> SpikerResult<Vec<f64>> {
        let fft = self.planner.plan_fft_forward(frame.len());
        let mut input: Vec<f64> = frame.iter().zip(window).map(|(x, w)| x * w).collect();
        let mut output = fft.make_output_vec();

        fft.process(&mut input, &mut output)
            .map_err(|e| SpikerError::ShapeMismatch { reason: e.to_string() })?;
        Ok(output.iter().map(|c| c.norm_sqr()).collect())
    }
}

impl Default for SpectralAnalyzer {
    fn default() -> Self {
        Self { config: SpectrumConfig::default(), planner: RealFftPlanner::new() }
    }
}

fn ensure_samples(data: &[f64]) -> SpikerResult<()> {
    if data.is_empty() {
        return Err(SpikerError::DegenerateSignal { reason: "no samples to analyse" });
    }
    Ok(())
}

fn bin_frequencies(nfft: usize, sample_rate: f64) -> Vec<f64> {
    (0..=nfft / 2).map(|k| k as f64 * sample_rate / nfft as f64).collect()
}

/// Spectral views over `[lbound, rbound)` seconds of one session channel.
///
/// `rbound: None` runs to the end of the channel. The `_with` variants take
/// their segmenting from a [`SpectrumConfig`]; the others use its defaults.
pub trait SessionSpectra {
    fn magnitude_spectrum(
        &self,
        channel_index: usize,
        lbound: f64,
        rbound: Option<f64>,
    ) -> SpikerResult<Spectrum>;

    fn psd_with(
        &self,
        config: &SpectrumConfig,
        channel_index: usize,
        lbound: f64,
        rbound: Option<f64>,
    ) -> SpikerResult<Spectrum>;

    fn spectrogram_with(
        &self,
        config: &SpectrumConfig,
        channel_index: usize,
        lbound: f64,
        rbound: Option<f64>,
    ) -> SpikerResult<Spectrogram>;

    fn psd(
        &self,
        channel_index: usize,
        lbound: f64,
        rbound: Option<f64>,
    ) -> SpikerResult<Spectrum> {
        self.psd_with(&SpectrumConfig::default(), channel_index, lbound, rbound)
    }

    fn spectrogram(
        &self,
        channel_index: usize,
        lbound: f64,
        rbound: Option<f64>,
    ) -> SpikerResult<Spectrogram> {
        self.spectrogram_with(&SpectrumConfig::default(), channel_index, lbound, rbound)
    }
}

fn spectral_slice(
    session: &Session,
    channel_index: usize,
    lbound: f64,
    rbound: Option<f64>,
) -> SpikerResult<(&[f64], f64)> {
    let channel = session.channel(channel_index)?;
    let end = rbound.unwrap_or_else(|| channel.duration());
    let view = channel.interval(lbound, end);
    if view.samples.is_empty() {
        return Err(SpikerError::InvalidInterval { start: lbound, end });
    }
    Ok((view.samples, channel.sample_rate()))
}

impl SessionSpectra for Session {
    fn magnitude_spectrum(
        &self,
        channel_index: usize,
        lbound: f64,
        rbound: Option<f64>,
    ) -> SpikerResult<Spectrum> {
        let (samples, fs) = spectral_slice(self, channel_index, lbound, rbound)?;
        SpectralAnalyzer::default().magnitude_spectrum(samples, fs)
    }

    fn psd_with(
        &self,
        config: &SpectrumConfig,
        channel_index: usize,
        lbound: f64,
        rbound: Option<f64>,
    ) -> SpikerResult<Spectrum> {
        let (samples, fs) = spectral_slice(self, channel_index, lbound, rbound)?;
        SpectralAnalyzer::new(*config)?.psd(samples, fs)
    }

    fn spectrogram_with(
        &self,
        config: &SpectrumConfig,
        channel_index: usize,
        lbound: f64,
        rbound: Option<f64>,
    ) -> SpikerResult<Spectrogram> {
        let (samples, fs) = spectral_slice(self, channel_index, lbound, rbound)?;
        SpectralAnalyzer::new(*config)?.spectrogram(samples, fs)
    }
}
