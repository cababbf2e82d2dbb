//! Synthetic multichannel recordings with an event log

use crate::waveforms::Waveform;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use spiker_core::{
    Channel, ChannelDefaults, EventMap, Session, SessionInfo, SpikerError, SpikerResult,
};

/// Header written at the top of generated event logs
pub const EVENT_LOG_HEADER: &str =
    "# Marker IDs can be arbitrary strings.\n# Marker ID,\tTime (in s)\n";

/// Configuration for recording simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingConfig {
    /// Sampling rate in Hz
    pub sample_rate: f64,
    /// Recording length in seconds
    pub duration: f64,
    pub channel_count: usize,
    /// Ongoing components present on every channel
    pub background: Vec<Waveform>,
    /// Gaussian noise standard deviation (0.0 = no noise)
    pub noise_std: f64,
    /// Power line interference (50/60Hz)
    pub powerline_freq: Option<f64>,
    pub events: Vec<EventTrainConfig>,
    /// Random seed for reproducibility
    pub seed: Option<u64>,
}

/// A train of repeated, labeled events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventTrainConfig {
    /// Single-character marker written to the log
    pub label: char,
    /// Time of the first event in seconds
    pub onset: f64,
    /// Mean spacing between events in seconds
    pub interval: f64,
    /// Uniform spacing jitter, `±jitter` seconds
    pub jitter: f64,
    /// Response added to every channel after each event
    pub response: Option<Waveform>,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            sample_rate: 1000.0,
            duration: 10.0,
            channel_count: 2,
            background: vec![Waveform::Sine { frequency: 10.0, amplitude: 0.5, phase: 0.0 }],
            noise_std: 0.05,
            powerline_freq: Some(60.0),
            events: vec![EventTrainConfig {
                label: 'A',
                onset: 0.5,
                interval: 1.0,
                jitter: 0.1,
                response: Some(Waveform::Gaussian { latency: 0.1, width: 0.02, amplitude: 2.0 }),
            }],
            seed: None,
        }
    }
}

impl RecordingConfig {
    pub fn validate(&self) -> SpikerResult<()> {
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(SpikerError::InvalidSampleRate { rate: self.sample_rate });
        }
        if !(self.duration.is_finite() && self.duration > 0.0) {
            return Err(SpikerError::Config {
                message: "Recording duration must be positive".to_string(),
            });
        }
        if self.channel_count == 0 {
            return Err(SpikerError::Config {
                message: "Channel count must be greater than 0".to_string(),
            });
        }
        for train in &self.events {
            if !(train.interval > 0.0 && train.jitter >= 0.0 && train.jitter < train.interval) {
                return Err(SpikerError::Config {
                    message: format!(
                        "Event train '{}' needs interval > jitter >= 0",
                        train.label
                    ),
                });
            }
            if !(train.onset.is_finite() && train.onset >= 0.0) {
                return Err(SpikerError::Config {
                    message: format!("Event train '{}' onset must be non-negative", train.label),
                });
            }
        }
        Ok(())
    }
}

/// Output of one simulation run
#[derive(Debug, Clone)]
pub struct SimulatedRecording {
    /// Channels with the event map attached
    pub session: Session,
    /// The same events as plaintext event-log contents
    pub event_log: String,
}

/// Recording simulator
pub struct RecordingSimulator {
    config: RecordingConfig,
    rng: StdRng,
    noise: Normal<f64>,
}

impl RecordingSimulator {
    /// Create new simulator with configuration
    pub fn new(config: RecordingConfig) -> SpikerResult<Self> {
        config.validate()?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let noise = Normal::new(0.0, config.noise_std).map_err(|e| SpikerError::Config {
            message: format!("Failed to create normal distribution: {}", e),
        })?;

        Ok(Self { config, rng, noise })
    }

    pub fn config(&self) -> &RecordingConfig {
        &self.config
    }

    /// Generate a full recording
    pub fn generate(&mut self) -> SpikerResult<SimulatedRecording> {
        let events = self.event_times();
        let fs = self.config.sample_rate;
        let len = (self.config.duration * fs) as usize;

        let mut channels = Vec::with_capacity(self.config.channel_count);
        for index in 0..self.config.channel_count {
            let samples = self.channel_samples(len, &events);
            let defaults = ChannelDefaults {
                label: format!("channel {}", index),
                ..ChannelDefaults::default()
            };
            channels.push(Channel::with_defaults(samples, fs, &defaults)?);
        }

        let event_log = render_event_log(&events);
        let event_map = EventMap::from_groups(
            events.iter().map(|(label, times)| (label.to_string(), times.clone())),
        )?;

        tracing::debug!(
            channels = channels.len(),
            samples = len,
            events = event_map.marker_count(),
            "simulated recording"
        );

        let info = SessionInfo { subject: Some("simulated".to_string()), ..SessionInfo::default() };
        let session = Session::from_channels(fs, channels)?.with_events(event_map).with_info(info);
        Ok(SimulatedRecording { session, event_log })
    }

    /// Event timestamps per train, in configuration order
    fn event_times(&mut self) -> Vec<(char, Vec<f64>)> {
        let duration = self.config.duration;
        let trains = self.config.events.clone();

        trains
            .into_iter()
            .map(|train| {
                let mut times = Vec::new();
                let mut t = train.onset;
                while t < duration {
                    times.push(t);
                    let jitter = if train.jitter > 0.0 {
                        self.rng.gen_range(-train.jitter..=train.jitter)
                    } else {
                        0.0
                    };
                    t += train.interval + jitter;
                }
                (train.label, times)
            })
            .collect()
    }

    fn channel_samples(&mut self, len: usize, events: &[(char, Vec<f64>)]) -> Vec<f64> {
        let fs = self.config.sample_rate;
        let mut samples: Vec<f64> = (0..len)
            .map(|i| {
                let t = i as f64 / fs;
                let mut value: f64 = self.config.background.iter().map(|w| w.value_at(t)).sum();
                if let Some(freq) = self.config.powerline_freq {
                    value += 0.05 * (2.0 * std::f64::consts::PI * freq * t).sin();
                }
                value + self.noise.sample(&mut self.rng)
            })
            .collect();

        for (train, (_, times)) in self.config.events.iter().zip(events) {
            let Some(response) = train.response else { continue };
            let reach = response.support().unwrap_or(self.config.duration);
            for &onset in times {
                let first = (onset * fs).ceil() as usize;
                let last = (((onset + reach) * fs).ceil() as usize).min(len);
                for (i, sample) in samples.iter_mut().enumerate().take(last).skip(first) {
                    *sample += response.value_at(i as f64 / fs - onset);
                }
            }
        }
        samples
    }
}

/// Event-log text for the given trains, records sorted by time
pub fn render_event_log(events: &[(char, Vec<f64>)]) -> String {
    let mut records: Vec<(f64, char)> = events
        .iter()
        .flat_map(|(label, times)| times.iter().map(move |&t| (t, *label)))
        .collect();
    records.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut log = String::from(EVENT_LOG_HEADER);
    for (t, label) in records {
        log.push_str(&format!("{},\t{}\n", label, t));
    }
    log
}
