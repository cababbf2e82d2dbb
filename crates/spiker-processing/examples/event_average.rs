//! Simulate a two-channel recording, clean it up and average the evoked
//! response around every `A` marker.

use anyhow::Context;
use spiker_core::{EventMap, EventWindow, Session, WHOLE_BUFFER};
use spiker_processing::{
    FilterSpec, Normalization, ProcessingConfig, Pipeline, SessionSpectra, SessionTransform,
};
use spiker_simulation::{RecordingConfig, RecordingSimulator};

const PROCESSING: &str = r#"{
    "channel": { "label": "EEG", "color": "b" },
    "spectrum": { "segment_len": 512 },
    "pipelines": [
        {
            "name": "evoked",
            "stages": [
                { "stage": "filter", "kind": "bp", "cutoff": [0.5, 40.0], "order": 2 },
                { "stage": "decimate", "factor": 4 }
            ]
        }
    ]
}"#;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let processing = ProcessingConfig::from_json_str(PROCESSING)?;

    let config = RecordingConfig { seed: Some(2024), ..RecordingConfig::default() };
    let recording = RecordingSimulator::new(config)?.generate()?;

    // re-ingest the raw frames so channels pick up the configured defaults
    let simulated = &recording.session;
    let frames = interleave(simulated);
    let mut session = Session::from_interleaved(
        simulated.sample_rate(),
        &frames,
        simulated.channel_count(),
        &processing.channel,
    )?;

    // the event log round-trips through its text form
    let dir = tempfile::tempdir()?;
    let log_path = dir.path().join("recording-events.txt");
    std::fs::write(&log_path, &recording.event_log)?;
    session.set_events(EventMap::from_path(&log_path)?);

    println!(
        "session {}: {} channel(s), {} event(s)",
        session.info().session_id,
        session.channel_count(),
        session.events().marker_count()
    );

    session.filter_all(&FilterSpec::notch(60.0), None)?;

    Pipeline::named(&processing, "evoked")?.run(&mut session, None)?;
    session.normalize_all(Normalization::Mean, None)?;

    for (index, std) in session.std_all(WHOLE_BUFFER, None)?.iter().enumerate() {
        println!("channel {} std after cleanup: {:.4}", index, std);
    }

    let window = EventWindow::new(0.1, 0.4)?;
    for index in 0..session.channel_count() {
        let average = session
            .event_average("A", window, index)
            .with_context(|| format!("averaging channel {}", index))?;
        let (peak_at, peak) = average
            .time_axis
            .iter()
            .zip(&average.mean)
            .fold((0.0, f64::MIN), |best, (&t, &v)| if v > best.1 { (t, v) } else { best });

        println!(
            "{} {}: {} event(s) averaged, {} clipped, peak {:.3} at {:.3}s after window start",
            session.channel(index)?.label(),
            index,
            average.included,
            average.excluded,
            peak,
            peak_at
        );
    }

    let psd = session.psd_with(&processing.spectrum, 0, 0.0, None)?;
    let (dominant, _) = psd
        .frequencies
        .iter()
        .zip(&psd.values)
        .fold((0.0, f64::MIN), |best, (&f, &p)| if p > best.1 { (f, p) } else { best });
    println!("channel 0 dominant frequency: {:.1} Hz", dominant);

    Ok(())
}

fn interleave(session: &Session) -> Vec<f64> {
    let frames = session.channels().iter().map(|c| c.len()).min().unwrap_or(0);
    (0..frames)
        .flat_map(|i| session.channels().iter().map(move |c| c.samples()[i]))
        .collect()
}
