//! Error handling for the spiker workspace
//!
//! Every failure is a deterministic input-validation condition raised to the
//! immediate caller; nothing in the core retries or recovers locally.

use core::fmt;

/// Result type alias for spiker operations
pub type SpikerResult<T> = Result<T, SpikerError>;

/// Error type for all channel, session and event operations
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum SpikerError {
    /// Cutoff frequency outside the Nyquist-bounded domain
    FrequencyRange {
        /// Offending frequency in Hz
        frequency: f64,
        /// Nyquist bound of the channel (sample_rate / 2)
        nyquist: f64,
        /// What was violated
        reason: &'static str,
    },

    /// Notch quality factor is only defined above 1 Hz
    NotchDomain {
        /// Requested notch frequency
        cutoff: f64,
    },

    /// Filter kind name not recognised
    UnknownFilterKind {
        /// Name that failed to parse
        kind: String,
    },

    /// Normalization kind name not recognised
    UnknownNormalization {
        /// Name that failed to parse
        kind: String,
    },

    /// Scalar normalization without a usable value
    InvalidNormalizationValue {
        /// Description of the problem
        reason: &'static str,
    },

    /// Signal cannot be scaled (zero variance or empty)
    DegenerateSignal {
        /// Description of the degenerate condition
        reason: &'static str,
    },

    /// Event label absent from the event map
    UnknownEvent {
        /// Requested label
        label: String,
    },

    /// Channel index out of range
    ChannelIndex {
        /// Requested index
        index: usize,
        /// Number of channels in the session
        count: usize,
    },

    /// Filter order of zero
    InvalidFilterOrder {
        /// Requested order
        order: usize,
    },

    /// Decimation factor of zero
    InvalidDecimationFactor {
        /// Requested factor
        factor: usize,
    },

    /// Sample rate that is not a positive finite number
    InvalidSampleRate {
        /// Provided rate
        rate: f64,
    },

    /// Time interval that selects no samples
    InvalidInterval {
        /// Interval start in seconds
        start: f64,
        /// Interval end in seconds
        end: f64,
    },

    /// Event window bounds that do not describe a positive duration
    InvalidWindow {
        /// Seconds before the event
        lbound: f64,
        /// Seconds after the event
        rbound: f64,
    },

    /// Malformed event log line
    EventLogFormat {
        /// 1-based line number in the log
        line: usize,
        /// Description of the format issue
        reason: String,
    },

    /// Raw sample buffer does not match the requested layout
    ShapeMismatch {
        /// Description of the mismatch
        reason: String,
    },

    /// One or more channels failed during a bulk operation
    ChannelFailures {
        /// Failed channel indices with their causes, in index order
        failures: Vec<ChannelFailure>,
    },

    /// File system error while reading input
    Io {
        /// Path being accessed
        path: String,
        /// Underlying error message
        reason: String,
    },

    /// Configuration could not be parsed or validated
    Config {
        /// Description of the configuration error
        message: String,
    },
}

/// A single channel's failure inside a bulk operation
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelFailure {
    /// Index of the channel that failed
    pub index: usize,
    /// Why it failed
    pub error: SpikerError,
}

impl SpikerError {
    /// Channel indices reported by a bulk failure (empty for other errors)
    pub fn failed_indices(&self) -> Vec<usize> {
        match self {
            SpikerError::ChannelFailures { failures } => {
                failures.iter().map(|f| f.index).collect()
            }
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for SpikerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpikerError::FrequencyRange { frequency, nyquist, reason } => {
                write!(f, "Frequency {} Hz out of range (Nyquist {} Hz): {}",
                       frequency, nyquist, reason)
            }
            SpikerError::NotchDomain { cutoff } => {
                write!(f, "Notch frequency must exceed 1 Hz to derive a quality factor, got {}",
                       cutoff)
            }
            SpikerError::UnknownFilterKind { kind } => {
                write!(f, "Unknown filter kind '{}'", kind)
            }
            SpikerError::UnknownNormalization { kind } => {
                write!(f, "Unknown normalization kind '{}'", kind)
            }
            SpikerError::InvalidNormalizationValue { reason } => {
                write!(f, "Invalid normalization value: {}", reason)
            }
            SpikerError::DegenerateSignal { reason } => {
                write!(f, "Degenerate signal: {}", reason)
            }
            SpikerError::UnknownEvent { label } => {
                write!(f, "Unknown event label '{}'", label)
            }
            SpikerError::ChannelIndex { index, count } => {
                write!(f, "Channel index {} out of range for {} channel(s)", index, count)
            }
            SpikerError::InvalidFilterOrder { order } => {
                write!(f, "Invalid filter order {}", order)
            }
            SpikerError::InvalidDecimationFactor { factor } => {
                write!(f, "Invalid decimation factor {}", factor)
            }
            SpikerError::InvalidSampleRate { rate } => {
                write!(f, "Invalid sample rate {} Hz", rate)
            }
            SpikerError::InvalidInterval { start, end } => {
                write!(f, "Interval [{}, {}]s selects no samples", start, end)
            }
            SpikerError::InvalidWindow { lbound, rbound } => {
                write!(f, "Invalid event window: {}s before, {}s after", lbound, rbound)
            }
            SpikerError::EventLogFormat { line, reason } => {
                write!(f, "Event log line {}: {}", line, reason)
            }
            SpikerError::ShapeMismatch { reason } => {
                write!(f, "Shape mismatch: {}", reason)
            }
            SpikerError::ChannelFailures { failures } => {
                write!(f, "Operation failed on channel(s)")?;
                for failure in failures {
                    write!(f, " [{}: {}]", failure.index, failure.error)?;
                }
                Ok(())
            }
            SpikerError::Io { path, reason } => {
                write!(f, "I/O error on {}: {}", path, reason)
            }
            SpikerError::Config { message } => {
                write!(f, "Configuration error: {}", message)
            }
        }
    }
}

impl std::error::Error for SpikerError {}
