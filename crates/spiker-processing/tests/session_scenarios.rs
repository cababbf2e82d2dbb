//! End-to-end scenarios across the core, processing and simulation crates

use spiker_core::{events_path_for, EventMap, EventWindow, SpikerError, WHOLE_BUFFER};
use spiker_processing::{
    ChannelTransform, FilterSpec, Normalization, ProcessingConfig, SessionSpectra,
    SessionTransform,
};
use spiker_simulation::{EventTrainConfig, RecordingConfig, RecordingSimulator, Waveform};

fn evoked_config(seed: u64) -> RecordingConfig {
    RecordingConfig {
        sample_rate: 1000.0,
        duration: 12.0,
        channel_count: 3,
        background: vec![Waveform::Sine { frequency: 8.0, amplitude: 0.3, phase: 0.0 }],
        noise_std: 0.2,
        powerline_freq: Some(60.0),
        events: vec![EventTrainConfig {
            label: 'A',
            onset: 0.7,
            interval: 0.9,
            jitter: 0.15,
            response: Some(Waveform::Gaussian { latency: 0.15, width: 0.02, amplitude: 2.0 }),
        }],
        seed: Some(seed),
    }
}

fn simulated_session(seed: u64) -> spiker_core::Session {
    RecordingSimulator::new(evoked_config(seed)).unwrap().generate().unwrap().session
}

#[test]
fn evoked_response_survives_cleanup_and_averaging() {
    let mut session = simulated_session(11);

    session.filter_all(&FilterSpec::notch(60.0), None).unwrap();
    session.filter_all(&FilterSpec::bandpass(1.0, 40.0), None).unwrap();
    session.decimate_all(4, None).unwrap();
    for channel in session.channels() {
        assert_eq!(channel.sample_rate(), 250.0);
        assert_eq!(channel.len(), 3000);
    }

    let window = EventWindow::new(0.1, 0.4).unwrap();
    let average = session.event_average("A", window, 2).unwrap();
    assert_eq!(average.time_axis.len(), 125);
    assert!(average.included >= 10);

    // evoked peak sits `latency` after the event, i.e. lbound + 0.15 into the window
    let (peak_at, peak) = average
        .time_axis
        .iter()
        .zip(&average.mean)
        .fold((0.0, f64::MIN), |best, (&t, &v)| if v > best.1 { (t, v) } else { best });
    assert!((peak_at - 0.25).abs() < 0.02, "peak at {}", peak_at);
    assert!(peak > 1.0, "peak {}", peak);
}

#[test]
fn bulk_failure_is_isolated_to_one_channel() {
    let mut session = simulated_session(3);
    session.decimate_all(10, Some(1)).unwrap();
    let untouched = session.channel(1).unwrap().clone();

    let err = session.filter_all(&FilterSpec::lowpass(100.0), None).unwrap_err();
    match &err {
        SpikerError::ChannelFailures { failures } => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].index, 1);
            assert!(matches!(failures[0].error, SpikerError::FrequencyRange { .. }));
        }
        other => panic!("unexpected error {:?}", other),
    }

    assert_eq!(session.channel(1).unwrap(), &untouched);
    assert_eq!(session.channel(0).unwrap().passband().high, 100.0);
    assert_eq!(session.channel(2).unwrap().passband().high, 100.0);
}

#[test]
fn event_log_file_drives_extraction() {
    let recording = RecordingSimulator::new(evoked_config(5)).unwrap().generate().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let data_path = dir.path().join("BYB_Recording_2021-06-18_16.14.32.wav");
    let events_path = events_path_for(&data_path);
    std::fs::write(&events_path, &recording.event_log).unwrap();

    let mut session = recording.session;
    session.set_events(EventMap::from_path(&events_path).unwrap());
    let expected = session.events().timestamps("A").unwrap().len();

    let epochs = session
        .event_epochs("A", EventWindow::new(0.2, 0.2).unwrap(), 0)
        .unwrap();
    assert_eq!(epochs.len(), expected);
    assert!(epochs.snippets.iter().filter(|s| !s.clipped).all(|s| s.samples.len() == 400));
}

#[test]
fn epochs_follow_each_channel_rate_after_decimation() {
    let data: Vec<f64> = (0..2000).map(|i| (i / 2) as f64).collect();
    let mut session = spiker_core::Session::from_interleaved(
        1000.0,
        &data,
        2,
        &spiker_core::ChannelDefaults::default(),
    )
    .unwrap()
    .with_events(EventMap::from_groups(vec![("A", vec![0.5, 0.7])]).unwrap());

    session.decimate_all(2, Some(0)).unwrap();
    let window = EventWindow::new(0.1, 0.1).unwrap();

    let slow = session.event_epochs("A", window, 0).unwrap();
    let fast = session.event_epochs("A", window, 1).unwrap();
    assert!(slow.snippets.iter().all(|s| s.samples.len() == 100));
    assert!(fast.snippets.iter().all(|s| s.samples.len() == 200));
    assert_eq!(fast.snippets[1].start, 600);
}

#[test]
fn normalization_and_spectra_on_a_simulated_session() {
    let mut session = simulated_session(9);

    session.normalize_all(Normalization::Mean, None).unwrap();
    session.normalize_all(Normalization::Std, Some(0)).unwrap();
    let stds = session.std_all(WHOLE_BUFFER, Some(0)).unwrap();
    assert!((stds[0] - 1.0).abs() < 1e-9);

    let means: Vec<f64> = session.channels().iter().map(|c| c.stats().mean).collect();
    assert!(means.iter().all(|m| m.abs() < 1e-9));

    let psd = session.psd(1, 1.0, Some(9.0)).unwrap();
    assert_eq!(psd.frequencies.len(), 129);

    // a channel-level transform never touches the session copy
    let before = session.channel(2).unwrap().clone();
    let scaled = before.normalize(Normalization::Scalar(3.0)).unwrap();
    assert_eq!(session.channel(2).unwrap(), &before);
    assert_eq!(scaled.len(), before.len());
}

#[test]
fn loaded_config_drives_channel_defaults_and_spectra() {
    let config = ProcessingConfig::from_json_str(
        r#"{
            "channel": {
                "label": "EMG",
                "color": "r",
                "passband": { "low": 10.0, "high": 400.0 }
            },
            "spectrum": { "segment_len": 128 }
        }"#,
    )
    .unwrap();

    let data: Vec<f64> = (0..4000).map(|i| ((i / 2) as f64 * 0.05).sin()).collect();
    let session =
        spiker_core::Session::from_interleaved(1000.0, &data, 2, &config.channel).unwrap();

    for channel in session.channels() {
        assert_eq!(channel.label(), "EMG");
        assert_eq!(channel.color(), "r");
        assert_eq!(channel.passband(), spiker_core::Passband::new(10.0, 400.0));
    }

    let psd = session.psd_with(&config.spectrum, 1, 0.0, None).unwrap();
    assert_eq!(psd.frequencies.len(), 65);
    assert_eq!(session.psd(1, 0.0, None).unwrap().frequencies.len(), 129);
}
