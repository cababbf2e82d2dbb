//! Session: an ordered set of channels sharing one recording and event log

use crate::channel::{Channel, ChannelDefaults};
use crate::error::{SpikerError, SpikerResult};
use crate::events::EventMap;
use chrono::NaiveDateTime;
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Identification metadata carried alongside the data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Session identifier; a fresh UUID unless set by the caller
    pub session_id: String,
    pub subject: Option<String>,
    pub datetime: Option<NaiveDateTime>,
    /// Source recording, if the samples came from a file
    pub data_path: Option<PathBuf>,
    /// Source event log, if any
    pub events_path: Option<PathBuf>,
}

impl Default for SessionInfo {
    fn default() -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            subject: None,
            datetime: None,
            data_path: None,
            events_path: None,
        }
    }
}

impl SessionInfo {
    /// Recording start parsed from names like
    /// `BYB_Recording_2021-06-18_16.14.32.wav`
    pub fn datetime_from_recording_name(name: &str) -> Option<NaiveDateTime> {
        let file_name = name.rsplit(['/', '\\']).next().unwrap_or(name);
        let stem = file_name
            .rsplit_once('.')
            .map(|(stem, ext)| if ext.chars().all(char::is_alphabetic) { stem } else { file_name })
            .unwrap_or(file_name);

        // date and time are the last two underscore-separated fields
        let mut fields = stem.rsplitn(3, '_');
        let time = fields.next()?;
        let date = fields.next()?;
        NaiveDateTime::parse_from_str(&format!("{} {}", date, time), "%Y-%m-%d %H.%M.%S").ok()
    }
}

/// A collection of channels plus the event log recorded with them
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    channels: Vec<Channel>,
    events: EventMap,
    sample_rate: f64,
    info: SessionInfo,
}

impl Session {
    /// Assemble a session from existing channels recorded at `sample_rate`
    pub fn from_channels(sample_rate: f64, channels: Vec<Channel>) -> SpikerResult<Self> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(SpikerError::InvalidSampleRate { rate: sample_rate });
        }
        Ok(Session {
            channels,
            events: EventMap::new(),
            sample_rate,
            info: SessionInfo::default(),
        })
    }

    /// One channel from a 1-D buffer
    pub fn from_mono(
        sample_rate: f64,
        samples: Vec<f64>,
        defaults: &ChannelDefaults,
    ) -> SpikerResult<Self> {
        let channel = Channel::with_defaults(samples, sample_rate, defaults)?;
        Self::from_channels(sample_rate, vec![channel])
    }

    /// One channel per column of a `[samples x channels]` matrix
    pub fn from_matrix(
        sample_rate: f64,
        data: ArrayView2<'_, f64>,
        defaults: &ChannelDefaults,
    ) -> SpikerResult<Self> {
        let channels = data
            .columns()
            .into_iter()
            .map(|column| Channel::with_defaults(column.to_vec(), sample_rate, defaults))
            .collect::<SpikerResult<Vec<_>>>()?;

        tracing::debug!(
            channels = channels.len(),
            samples = data.nrows(),
            sample_rate,
            "session built from sample matrix"
        );
        Self::from_channels(sample_rate, channels)
    }

    /// Channels from interleaved frames `[s0c0, s0c1, ..., s1c0, ...]`
    pub fn from_interleaved(
        sample_rate: f64,
        data: &[f64],
        channel_count: usize,
        defaults: &ChannelDefaults,
    ) -> SpikerResult<Self> {
        if channel_count == 0 || data.len() % channel_count != 0 {
            return Err(SpikerError::ShapeMismatch {
                reason: format!(
                    "{} interleaved values cannot be split into {} channel(s)",
                    data.len(),
                    channel_count
                ),
            });
        }

        let frames = data.len() / channel_count;
        let matrix = ArrayView2::from_shape((frames, channel_count), data).map_err(|e| {
            SpikerError::ShapeMismatch { reason: e.to_string() }
        })?;
        Self::from_matrix(sample_rate, matrix, defaults)
    }

    pub fn with_events(mut self, events: EventMap) -> Self {
        self.events = events;
        self
    }

    pub fn with_info(mut self, info: SessionInfo) -> Self {
        self.info = info;
        self
    }

    /// Replace the event map wholesale
    pub fn set_events(&mut self, events: EventMap) {
        self.events = events;
    }

    pub fn events(&self) -> &EventMap {
        &self.events
    }

    pub fn info(&self) -> &SessionInfo {
        &self.info
    }

    pub fn info_mut(&mut self) -> &mut SessionInfo {
        &mut self.info
    }

    /// Rate recorded at construction; channels may have diverged since
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn channel(&self, index: usize) -> SpikerResult<&Channel> {
        self.channels.get(index).ok_or(SpikerError::ChannelIndex {
            index,
            count: self.channels.len(),
        })
    }

    /// Sample buffers of every channel, in index order
    pub fn channel_data(&self) -> Vec<&[f64]> {
        self.channels.iter().map(Channel::samples).collect()
    }

    /// Resolve an optional channel index to the list of targeted indices
    pub fn target_indices(&self, channel_index: Option<usize>) -> SpikerResult<Vec<usize>> {
        match channel_index {
            Some(index) => {
                self.channel(index)?;
                Ok(vec![index])
            }
            None => Ok((0..self.channels.len()).collect()),
        }
    }

    /// Swap in the next state of channel `index`, returning the previous one
    pub fn replace_channel(&mut self, index: usize, channel: Channel) -> SpikerResult<Channel> {
        let count = self.channels.len();
        let slot = self
            .channels
            .get_mut(index)
            .ok_or(SpikerError::ChannelIndex { index, count })?;
        Ok(std::mem::replace(slot, channel))
    }

    /// Replace every channel at once
    pub fn set_channels(&mut self, channels: Vec<Channel>) {
        self.channels = channels;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use ndarray::Array2;

    #[test]
    fn test_from_matrix_one_channel_per_column() {
        let data = Array2::from_shape_fn((100, 3), |(i, c)| (i * 10 + c) as f64);
        let session =
            Session::from_matrix(1000.0, data.view(), &ChannelDefaults::default()).unwrap();

        assert_eq!(session.channel_count(), 3);
        assert_eq!(session.channel(2).unwrap().samples()[1], 12.0);
        assert_eq!(session.channel(0).unwrap().len(), 100);
    }

    #[test]
    fn test_from_interleaved() {
        let data: Vec<f64> = (0..8).map(|i| i as f64).collect();
        let session =
            Session::from_interleaved(10.0, &data, 2, &ChannelDefaults::default()).unwrap();

        assert_eq!(session.channel(0).unwrap().samples(), &[0.0, 2.0, 4.0, 6.0]);
        assert_eq!(session.channel(1).unwrap().samples(), &[1.0, 3.0, 5.0, 7.0]);

        assert!(matches!(
            Session::from_interleaved(10.0, &data, 3, &ChannelDefaults::default()),
            Err(SpikerError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_channel_index_errors() {
        let session =
            Session::from_mono(100.0, vec![0.0; 10], &ChannelDefaults::default()).unwrap();

        assert_eq!(
            session.channel(1).unwrap_err(),
            SpikerError::ChannelIndex { index: 1, count: 1 }
        );
        assert_eq!(session.target_indices(None).unwrap(), vec![0]);
        assert!(session.target_indices(Some(4)).is_err());
    }

    #[test]
    fn test_replace_channel_in_place() {
        let mut session = Session::from_interleaved(
            10.0,
            &[0.0, 1.0, 2.0, 3.0],
            2,
            &ChannelDefaults::default(),
        )
        .unwrap();

        let next = Channel::new(vec![9.0], 5.0).unwrap();
        let previous = session.replace_channel(1, next).unwrap();

        assert_eq!(previous.samples(), &[1.0, 3.0]);
        assert_eq!(session.channel_count(), 2);
        assert_eq!(session.channel(1).unwrap().sample_rate(), 5.0);
        assert_eq!(session.sample_rate(), 10.0);
    }

    #[test]
    fn test_datetime_from_recording_name() {
        let dt = SessionInfo::datetime_from_recording_name(
            "/content/BYB_Recording_2021-06-18_16.14.32.wav",
        )
        .unwrap();

        assert_eq!((dt.year(), dt.month(), dt.day()), (2021, 6, 18));
        assert_eq!((dt.hour(), dt.minute(), dt.second()), (16, 14, 32));
        assert!(SessionInfo::datetime_from_recording_name("notes.wav").is_none());
    }

    #[test]
    fn test_session_ids_are_unique() {
        assert_ne!(SessionInfo::default().session_id, SessionInfo::default().session_id);
    }
}
