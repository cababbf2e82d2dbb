//! Event-aligned extraction and averaging
//!
//! For every timestamp of an event label a window
//! `[floor((t - lbound) * fs), floor((t + rbound) * fs))` is cut from one
//! channel at that channel's current rate. Windows reaching past either end
//! of the buffer are clipped, never padded, and flagged. Averages use only
//! unclipped snippets.

use crate::channel::{clip_index, seconds_to_index, Channel};
use crate::error::{SpikerError, SpikerResult};
use crate::session::Session;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Seconds of signal kept before and after each event
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EventWindow {
    pub lbound: f64,
    pub rbound: f64,
}

impl EventWindow {
    pub fn new(lbound: f64, rbound: f64) -> SpikerResult<Self> {
        if !lbound.is_finite() || !rbound.is_finite() || lbound + rbound <= 0.0 {
            return Err(SpikerError::InvalidWindow { lbound, rbound });
        }
        Ok(Self { lbound, rbound })
    }

    /// Unclipped sample range for an event at `timestamp`
    pub fn sample_range(&self, timestamp: f64, sample_rate: f64) -> (i64, i64) {
        (
            seconds_to_index(timestamp - self.lbound, sample_rate),
            seconds_to_index(timestamp + self.rbound, sample_rate),
        )
    }

    /// Reference axis shared by all occurrences: `floor((l + r) * fs)` points
    /// from 0 at spacing `1 / fs`
    pub fn time_axis(&self, sample_rate: f64) -> Vec<f64> {
        let len = seconds_to_index(self.lbound + self.rbound, sample_rate).max(0) as usize;
        (0..len).map(|i| i as f64 / sample_rate).collect()
    }
}

/// Signal cut around one event occurrence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snippet {
    /// Event time in seconds
    pub timestamp: f64,
    /// Requested window start index (may be negative)
    pub requested_start: i64,
    /// Requested window end index, exclusive (may exceed the buffer)
    pub requested_end: i64,
    /// Buffer index of the first kept sample
    pub start: usize,
    pub samples: Vec<f64>,
    /// True when the window reached outside the buffer
    pub clipped: bool,
}

/// All occurrences of one event label cut from one channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEpochs {
    pub label: String,
    pub channel_index: usize,
    /// Channel rate the indices were computed at
    pub sample_rate: f64,
    pub window: EventWindow,
    pub time_axis: Vec<f64>,
    pub snippets: Vec<Snippet>,
}

/// Elementwise mean of the unclipped snippets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AveragedTrace {
    pub time_axis: Vec<f64>,
    pub mean: Vec<f64>,
    /// Occurrences that contributed
    pub included: usize,
    /// Clipped occurrences left out
    pub excluded: usize,
}

impl EventEpochs {
    /// Cut every occurrence of `label` out of `channel`
    pub fn extract(
        channel: &Channel,
        channel_index: usize,
        label: &str,
        timestamps: &[f64],
        window: EventWindow,
    ) -> Self {
        let fs = channel.sample_rate();
        let len = channel.len();

        let snippets: Vec<Snippet> = timestamps
            .iter()
            .map(|&timestamp| {
                let (requested_start, requested_end) = window.sample_range(timestamp, fs);
                let start = clip_index(requested_start, len);
                let end = clip_index(requested_end, len).max(start);
                let clipped = requested_start < 0 || requested_end > len as i64;
                if clipped {
                    tracing::warn!(
                        label,
                        channel = channel_index,
                        timestamp,
                        "event window clipped at recording edge"
                    );
                }

                Snippet {
                    timestamp,
                    requested_start,
                    requested_end,
                    start,
                    samples: channel.samples()[start..end].to_vec(),
                    clipped,
                }
            })
            .collect();

        EventEpochs {
            label: label.to_string(),
            channel_index,
            sample_rate: fs,
            window,
            time_axis: window.time_axis(fs),
            snippets,
        }
    }

    pub fn len(&self) -> usize {
        self.snippets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }

    /// Snippets whose window lay fully inside the buffer
    pub fn complete(&self) -> impl Iterator<Item = &Snippet> {
        self.snippets.iter().filter(|s| !s.clipped)
    }

    /// Length every complete snippet can be truncated to
    fn common_len(&self) -> usize {
        self.complete()
            .map(|s| s.samples.len())
            .min()
            .map_or(0, |shortest| shortest.min(self.time_axis.len()))
    }

    /// Complete snippets stacked as `[occurrences x samples]`
    pub fn matrix(&self) -> Array2<f64> {
        let width = self.common_len();
        let rows: Vec<&Snippet> = self.complete().collect();
        Array2::from_shape_fn((rows.len(), width), |(r, c)| rows[r].samples[c])
    }

    /// Elementwise mean over complete snippets.
    ///
    /// Clipped snippets are left out; with no complete snippet the trace is
    /// empty.
    pub fn average(&self) -> AveragedTrace {
        let stacked = self.matrix();
        let included = stacked.nrows();
        let width = stacked.ncols();

        let mean = if included == 0 {
            Vec::new()
        } else {
            stacked.sum_axis(ndarray::Axis(0)).mapv(|v| v / included as f64).to_vec()
        };

        AveragedTrace {
            time_axis: self.time_axis[..width.min(self.time_axis.len())].to_vec(),
            mean,
            included,
            excluded: self.snippets.len() - included,
        }
    }
}

impl Session {
    /// Cut every occurrence of `label` out of channel `channel_index`
    pub fn event_epochs(
        &self,
        label: &str,
        window: EventWindow,
        channel_index: usize,
    ) -> SpikerResult<EventEpochs> {
        let timestamps = self.events().timestamps(label)?;
        let channel = self.channel(channel_index)?;
        Ok(EventEpochs::extract(channel, channel_index, label, timestamps, window))
    }

    /// Epochs for several channels, each at its own current rate
    pub fn event_epochs_for(
        &self,
        label: &str,
        window: EventWindow,
        channel_indices: &[usize],
    ) -> SpikerResult<Vec<EventEpochs>> {
        channel_indices
            .iter()
            .map(|&index| self.event_epochs(label, window, index))
            .collect()
    }

    /// Event-locked average of one channel
    pub fn event_average(
        &self,
        label: &str,
        window: EventWindow,
        channel_index: usize,
    ) -> SpikerResult<AveragedTrace> {
        Ok(self.event_epochs(label, window, channel_index)?.average())
    }
}
