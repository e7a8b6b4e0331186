//! End-to-end recording through the WAV sink on an offline engine.

use mixtap::{
    AudioFormat, AudioGraph, AudioTime, FailurePolicy, GraphError, MIXER_BUS, OfflineEngine,
    PcmBuffer, RecordingError, RecordingSidecar, SampleEncoding, SineSource, WavSinkFactory,
};
use std::path::Path;
use tempfile::tempdir;

const BUFFER_FRAMES: usize = 4096;

fn running_engine() -> OfflineEngine {
    let mut engine = OfflineEngine::new(AudioFormat::float32(44_100, 2));
    engine.start();
    engine
}

fn feed_silence(sidecar: &mut RecordingSidecar<OfflineEngine>, from: usize, buffers: usize) {
    let buffer = PcmBuffer::silence(BUFFER_FRAMES, 2);
    for i in from..from + buffers {
        let time = AudioTime::new((i * BUFFER_FRAMES) as u64, 44_100);
        assert!(sidecar.graph_mut().deliver(MIXER_BUS, &buffer, time));
    }
}

fn frames_in(path: &Path) -> u32 {
    hound::WavReader::open(path).unwrap().duration()
}

#[test]
fn fresh_sidecar_is_not_recording() {
    let sidecar = RecordingSidecar::new(OfflineEngine::new(AudioFormat::default()));
    assert!(!sidecar.is_recording());
}

#[test]
fn records_exactly_the_delivered_frames() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("out.wav");
    let mut sidecar = RecordingSidecar::new(running_engine());

    sidecar
        .start_recording_with_format(&path, AudioFormat::float32(44_100, 2))
        .unwrap();
    feed_silence(&mut sidecar, 0, 10);
    let summary = sidecar.stop_recording().unwrap().unwrap();

    assert!(!sidecar.is_recording());
    assert_eq!(summary.buffers_written, 10);
    assert_eq!(summary.dropped_buffers, 0);
    assert_eq!(frames_in(&path), (10 * BUFFER_FRAMES) as u32);

    let reader = hound::WavReader::open(&path).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.channels, 2);
    assert_eq!(spec.sample_rate, 44_100);
}

#[test]
fn duplicate_start_keeps_recording_into_the_first_file() {
    let dir = tempdir().unwrap();
    let first = dir.path().join("first.wav");
    let second = dir.path().join("second.wav");
    let mut sidecar = RecordingSidecar::new(running_engine());

    sidecar.start_recording(&first).unwrap();
    feed_silence(&mut sidecar, 0, 3);
    assert!(matches!(
        sidecar.start_recording(&second),
        Err(RecordingError::AlreadyRecording)
    ));
    feed_silence(&mut sidecar, 3, 2);
    sidecar.stop_recording().unwrap();

    assert!(!second.exists());
    assert_eq!(frames_in(&first), (5 * BUFFER_FRAMES) as u32);
}

#[test]
fn stop_without_recording_is_rejected_and_harmless() {
    let mut sidecar = RecordingSidecar::new(running_engine());
    assert!(matches!(
        sidecar.stop_recording(),
        Err(RecordingError::NotRecording)
    ));
    assert!(!sidecar.is_recording());
}

#[test]
fn stopped_graph_never_creates_a_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("never.wav");
    let mut sidecar = RecordingSidecar::new(OfflineEngine::new(AudioFormat::default()));

    assert!(matches!(
        sidecar.start_recording(&path),
        Err(RecordingError::GraphNotRunning)
    ));
    assert!(!sidecar.is_recording());
    assert!(!path.exists());
}

#[test]
fn missing_directory_leaves_sidecar_idle() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("no-such-dir").join("out.wav");
    let mut sidecar = RecordingSidecar::new(running_engine());

    let err = sidecar.start_recording(&path).unwrap_err();
    assert!(matches!(err, RecordingError::SinkCreationFailed { .. }));
    assert!(!sidecar.is_recording());
    assert!(!sidecar.graph().tap_installed(MIXER_BUS));
}

#[test]
fn lenient_policy_mirrors_silent_toggle() {
    let dir = tempdir().unwrap();
    let bad = dir.path().join("no-such-dir").join("out.wav");
    let good = dir.path().join("out.wav");
    let mut sidecar = RecordingSidecar::new(running_engine()).with_policy(FailurePolicy::Lenient);

    sidecar.start_recording(&bad).unwrap();
    assert!(!sidecar.is_recording());
    assert_eq!(sidecar.stop_recording().unwrap(), None);

    sidecar.start_recording(&good).unwrap();
    assert!(sidecar.is_recording());
    assert!(sidecar.stop_recording().unwrap().is_some());
}

#[test]
fn rendered_mix_is_recorded_through_the_tap() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tone.wav");
    let mut engine = running_engine();
    engine.add_source(Box::new(SineSource::new(440.0, 0.5)));
    let mut sidecar = RecordingSidecar::new(engine);

    sidecar.start_recording(&path).unwrap();
    for _ in 0..10 {
        sidecar.graph_mut().render(1000).unwrap();
    }
    let summary = sidecar.stop_recording().unwrap().unwrap();

    // Two full 4096-frame blocks plus the 1808-frame tail flushed on stop.
    assert_eq!(summary.buffers_written, 3);
    assert_eq!(summary.frames_written, 10_000);
    assert_eq!(frames_in(&path), 10_000);

    let mut reader = hound::WavReader::open(&path).unwrap();
    let peak = reader
        .samples::<f32>()
        .map(|s| s.unwrap().abs())
        .fold(0.0f32, f32::max);
    assert!(peak > 0.4 && peak <= 0.5);
}

#[test]
fn explicit_integer_format_is_honoured() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("int24.wav");
    let mut sidecar = RecordingSidecar::new(running_engine());

    let format = AudioFormat::new(44_100, 2, SampleEncoding::Int24);
    sidecar.start_recording_with_format(&path, format).unwrap();
    feed_silence(&mut sidecar, 0, 2);
    let summary = sidecar.stop_recording().unwrap().unwrap();
    assert_eq!(summary.format, format);

    let reader = hound::WavReader::open(&path).unwrap();
    assert_eq!(reader.spec().bits_per_sample, 24);
    assert_eq!(reader.duration(), (2 * BUFFER_FRAMES) as u32);
}

#[test]
fn flag_tracks_successful_start_and_stop_sequences() {
    let dir = tempdir().unwrap();
    let mut sidecar = RecordingSidecar::new(running_engine());
    let mut expected = false;

    // Deterministic pseudo-random mix of start and stop calls.
    let mut seed: u32 = 0x5eed;
    for step in 0..64 {
        seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        if (seed >> 16) & 1 == 0 {
            let path = dir.path().join(format!("take-{step}.wav"));
            let result = sidecar.start_recording(&path);
            assert_eq!(result.is_ok(), !expected);
            expected = true;
        } else {
            let result = sidecar.stop_recording();
            assert_eq!(result.is_ok(), expected);
            expected = false;
        }
        assert_eq!(sidecar.is_recording(), expected);
        assert_eq!(sidecar.graph().tap_installed(MIXER_BUS), expected);
    }
}

#[test]
fn tap_uses_output_node_format() {
    let engine = running_engine();
    let output = engine.output_format(MIXER_BUS).unwrap();
    let mut sidecar = RecordingSidecar::new(engine);

    let dir = tempdir().unwrap();
    let err = sidecar
        .start_recording_with_format(dir.path().join("x.wav"), AudioFormat::float32(48_000, 2))
        .unwrap_err();
    match err {
        RecordingError::IncompatibleFormat { tap, .. } => assert_eq!(tap, output),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn buffers_that_do_not_fit_the_writer_queue_are_counted_as_dropped() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("small-queue.wav");
    let factory = WavSinkFactory::with_queue_frames(BUFFER_FRAMES / 4);
    let mut sidecar = RecordingSidecar::with_factory(running_engine(), factory);

    sidecar.start_recording(&path).unwrap();
    feed_silence(&mut sidecar, 0, 3);
    let summary = sidecar.stop_recording().unwrap().unwrap();

    assert_eq!(summary.dropped_buffers, 3);
    assert_eq!(summary.buffers_written, 0);
    assert!(!sidecar.is_recording());
    assert_eq!(frames_in(&path), 0);
}

#[test]
fn oversized_tap_buffer_is_rejected_without_a_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("huge.wav");
    let mut sidecar = RecordingSidecar::new(running_engine())
        .with_tap_buffer_size(usize::MAX / 2);

    let err = sidecar.start_recording(&path).unwrap_err();
    assert!(matches!(
        err,
        RecordingError::Graph(GraphError::InvalidBufferSize(_))
    ));
    assert!(!sidecar.is_recording());
    assert!(!path.exists());
}
