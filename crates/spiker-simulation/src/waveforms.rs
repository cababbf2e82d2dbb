//! Deterministic waveform building blocks for synthetic recordings

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// A noiseless signal component
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Waveform {
    /// Ongoing oscillation
    Sine {
        frequency: f64,
        amplitude: f64,
        #[serde(default)]
        phase: f64,
    },
    /// Oscillation that starts at `t = 0` and decays exponentially
    DampedSine {
        frequency: f64,
        amplitude: f64,
        /// Decay time constant in seconds
        decay: f64,
    },
    /// Gaussian bump peaking at `latency`
    Gaussian {
        latency: f64,
        /// Standard deviation in seconds
        width: f64,
        amplitude: f64,
    },
}

impl Waveform {
    /// Value at `time` seconds
    pub fn value_at(&self, time: f64) -> f64 {
        match *self {
            Waveform::Sine { frequency, amplitude, phase } => {
                amplitude * (2.0 * PI * frequency * time + phase).sin()
            }
            Waveform::DampedSine { frequency, amplitude, decay } => {
                if time < 0.0 || decay <= 0.0 {
                    0.0
                } else {
                    amplitude * (-time / decay).exp() * (2.0 * PI * frequency * time).sin()
                }
            }
            Waveform::Gaussian { latency, width, amplitude } => {
                if width <= 0.0 {
                    return 0.0;
                }
                let z = (time - latency) / width;
                amplitude * (-0.5 * z * z).exp()
            }
        }
    }

    /// Seconds after onset beyond which the component is negligible
    pub fn support(&self) -> Option<f64> {
        match *self {
            Waveform::Sine { .. } => None,
            Waveform::DampedSine { decay, .. } => Some(10.0 * decay.max(0.0)),
            Waveform::Gaussian { latency, width, .. } => Some(latency + 6.0 * width.max(0.0)),
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Waveform::Sine { .. } => "Sinusoid",
            Waveform::DampedSine { .. } => "Damped oscillation",
            Waveform::Gaussian { .. } => "Gaussian bump",
        }
    }

    /// Common presets
    pub fn presets() -> Vec<(&'static str, Waveform)> {
        vec![
            ("Alpha Rhythm", Waveform::Sine { frequency: 10.0, amplitude: 1.0, phase: 0.0 }),
            ("Line Noise", Waveform::Sine { frequency: 60.0, amplitude: 0.05, phase: 0.0 }),
            ("Slow Drift", Waveform::Sine { frequency: 0.1, amplitude: 0.2, phase: 0.0 }),
            ("Evoked Potential", Waveform::Gaussian { latency: 0.1, width: 0.02, amplitude: 2.0 }),
            (
                "Ringing Response",
                Waveform::DampedSine { frequency: 20.0, amplitude: 1.5, decay: 0.05 },
            ),
        ]
    }
}
