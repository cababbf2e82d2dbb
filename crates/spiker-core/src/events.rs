//! Event map: labeled, timestamped markers on the session timeline
//!
//! Event logs are plaintext: two header lines, then one
//! `<label-char>,<seconds>,...` record per line.

use crate::error::{SpikerError, SpikerResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::{Path, PathBuf};

/// Number of header lines preceding event records
pub const EVENT_LOG_HEADER_LINES: usize = 2;

/// Mapping from event label to ascending timestamps in seconds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventMap {
    events: BTreeMap<String, Vec<f64>>,
}

impl EventMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from already-grouped timestamps, sorting each label's list
    pub fn from_groups<I, L>(groups: I) -> SpikerResult<Self>
    where
        I: IntoIterator<Item = (L, Vec<f64>)>,
        L: Into<String>,
    {
        let mut events = BTreeMap::new();
        for (label, mut timestamps) in groups {
            if let Some(bad) = timestamps.iter().find(|t| !t.is_finite() || **t < 0.0) {
                return Err(SpikerError::EventLogFormat {
                    line: 0,
                    reason: format!("timestamp {} must be finite and non-negative", bad),
                });
            }
            timestamps.sort_by(f64::total_cmp);
            events.insert(label.into(), timestamps);
        }
        Ok(Self { events })
    }

    /// Parse event log text
    pub fn parse(text: &str) -> SpikerResult<Self> {
        Self::from_reader(text.as_bytes())
    }

    /// Parse an event log from any buffered reader
    pub fn from_reader<R: BufRead>(reader: R) -> SpikerResult<Self> {
        let mut events: BTreeMap<String, Vec<f64>> = BTreeMap::new();

        for (idx, line) in reader.lines().enumerate() {
            let line_no = idx + 1;
            let line = line.map_err(|e| SpikerError::EventLogFormat {
                line: line_no,
                reason: e.to_string(),
            })?;
            if idx < EVENT_LOG_HEADER_LINES || line.trim().is_empty() {
                continue;
            }

            let (label, timestamp) = parse_record(&line, line_no)?;
            events.entry(label).or_default().push(timestamp);
        }

        for timestamps in events.values_mut() {
            timestamps.sort_by(f64::total_cmp);
        }

        tracing::debug!(labels = events.len(), "parsed event log");
        Ok(Self { events })
    }

    /// Read and parse an event log file
    pub fn from_path(path: impl AsRef<Path>) -> SpikerResult<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| SpikerError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// Timestamps for `label`, ascending
    pub fn timestamps(&self, label: &str) -> SpikerResult<&[f64]> {
        self.events
            .get(label)
            .map(Vec::as_slice)
            .ok_or_else(|| SpikerError::UnknownEvent { label: label.to_string() })
    }

    pub fn contains(&self, label: &str) -> bool {
        self.events.contains_key(label)
    }

    /// Labels in sorted order
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.events.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Total number of markers across all labels
    pub fn marker_count(&self) -> usize {
        self.events.values().map(Vec::len).sum()
    }

    /// Per-label markers falling inside `[start, end]` seconds.
    /// Labels with no markers in range are still listed, with an empty vector.
    pub fn markers_between(&self, start: f64, end: f64) -> BTreeMap<&str, Vec<f64>> {
        self.events
            .iter()
            .map(|(label, timestamps)| {
                let inside = timestamps
                    .iter()
                    .copied()
                    .filter(|t| *t >= start && *t <= end)
                    .collect();
                (label.as_str(), inside)
            })
            .collect()
    }
}

fn parse_record(line: &str, line_no: usize) -> SpikerResult<(String, f64)> {
    let label = line
        .chars()
        .next()
        .map(String::from)
        .ok_or_else(|| SpikerError::EventLogFormat {
            line: line_no,
            reason: "missing label".to_string(),
        })?;

    let field = line.split(',').nth(1).ok_or_else(|| SpikerError::EventLogFormat {
        line: line_no,
        reason: "missing timestamp field".to_string(),
    })?;

    let timestamp: f64 = field.trim().parse().map_err(|_| SpikerError::EventLogFormat {
        line: line_no,
        reason: format!("timestamp '{}' is not a number", field.trim()),
    })?;

    if !timestamp.is_finite() || timestamp < 0.0 {
        return Err(SpikerError::EventLogFormat {
            line: line_no,
            reason: format!("timestamp {} must be finite and non-negative", timestamp),
        });
    }

    Ok((label, timestamp))
}

/// Conventional event log location for a recording: `<stem>-events.txt`
/// next to the data file.
pub fn events_path_for(data_path: impl AsRef<Path>) -> PathBuf {
    let data_path = data_path.as_ref();
    let stem = data_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    data_path.with_file_name(format!("{}-events.txt", stem))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const LOG: &str = "# Marker IDs can be arbitrary strings.\n\
                       # Marker ID,\tTime (in s)\n\
                       1,\t2.5\n\
                       2,\t1.25\n\
                       1,\t0.75\n\
                       \n\
                       2,\t3.0,extra\n";

    #[test]
    fn test_parse_groups_and_sorts() {
        let events = EventMap::parse(LOG).unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events.timestamps("1").unwrap(), &[0.75, 2.5]);
        assert_eq!(events.timestamps("2").unwrap(), &[1.25, 3.0]);
        assert_eq!(events.marker_count(), 4);
        assert_eq!(events.labels().collect::<Vec<_>>(), vec!["1", "2"]);
    }

    #[test]
    fn test_unknown_label() {
        let events = EventMap::parse(LOG).unwrap();
        assert_eq!(
            events.timestamps("9"),
            Err(SpikerError::UnknownEvent { label: "9".to_string() })
        );
    }

    #[test]
    fn test_bad_records_report_line() {
        let err = EventMap::parse("h1\nh2\nA,0.5\nB,abc\n").unwrap_err();
        assert!(matches!(err, SpikerError::EventLogFormat { line: 4, .. }));

        let err = EventMap::parse("h1\nh2\nA,-1.0\n").unwrap_err();
        assert!(matches!(err, SpikerError::EventLogFormat { line: 3, .. }));

        let err = EventMap::parse("h1\nh2\nA\n").unwrap_err();
        assert!(matches!(err, SpikerError::EventLogFormat { line: 3, .. }));
    }

    #[test]
    fn test_header_only_log_is_empty() {
        let events = EventMap::parse("header\nheader\n").unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_from_groups_sorts_and_validates() {
        let events = EventMap::from_groups(vec![("A", vec![0.7, 0.5])]).unwrap();
        assert_eq!(events.timestamps("A").unwrap(), &[0.5, 0.7]);

        assert!(EventMap::from_groups(vec![("A", vec![f64::NAN])]).is_err());
    }

    #[test]
    fn test_markers_between() {
        let events = EventMap::parse(LOG).unwrap();
        let markers = events.markers_between(1.0, 2.5);

        assert_eq!(markers["1"], vec![2.5]);
        assert_eq!(markers["2"], vec![1.25]);
    }

    #[test]
    fn test_from_path_and_events_path() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("BYB_Recording_2021-06-18_16.14.32.wav");
        let log_path = events_path_for(&data);
        assert_eq!(
            log_path.file_name().unwrap().to_str().unwrap(),
            "BYB_Recording_2021-06-18_16.14.32-events.txt"
        );

        let mut file = std::fs::File::create(&log_path).unwrap();
        file.write_all(LOG.as_bytes()).unwrap();

        let events = EventMap::from_path(&log_path).unwrap();
        assert_eq!(events.marker_count(), 4);

        assert!(matches!(
            EventMap::from_path(dir.path().join("missing.txt")),
            Err(SpikerError::Io { .. })
        ));
    }
}
