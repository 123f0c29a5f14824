use std::time::{Duration, Instant};

use singalong_core::{
    Algorithm, AudioBlock, EngineConfig, MatchTier, Monitor, PitchClass, PitchDetector,
    frequency_to_note,
};

const SAMPLE_RATE: u32 = 48_000;
const WINDOW: usize = 4096;

fn generate_sine(freq: f32, amplitude: f32) -> Vec<f32> {
    (0..WINDOW)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            amplitude * (2.0 * std::f32::consts::PI * freq * t).sin()
        })
        .collect()
}

#[test]
fn sine_at_a4_is_detected_named_and_matched() {
    let block = AudioBlock::new(generate_sine(440.0, 0.5), SAMPLE_RATE).unwrap();

    // Estimator stage, for each algorithm on its own.
    for algorithm in Algorithm::ALL {
        let detection = PitchDetector::new(vec![algorithm], WINDOW)
            .detect(&block)
            .unwrap_or_else(|| panic!("{algorithm} found no pitch"));
        assert!(
            (detection.frequency - 440.0).abs() <= 4.0,
            "{algorithm} estimated {} Hz",
            detection.frequency
        );

        let note = frequency_to_note(detection.frequency).unwrap();
        assert_eq!(note.pitch_class, PitchClass::A);
        assert_eq!(note.octave, 4);
        assert!(note.cents.abs() <= 10, "{algorithm}: {} cents", note.cents);
    }

    // Whole pipeline against a reference fixed at 440 Hz.
    let reference = AudioBlock::new(generate_sine(440.0, 0.1), SAMPLE_RATE).unwrap();
    let mut monitor = Monitor::new(&EngineConfig::default()).unwrap();
    let start = Instant::now();
    monitor.start(start);

    let report = monitor
        .frame(Some(&block), Some(&reference), start + Duration::from_millis(16))
        .unwrap()
        .unwrap();

    let singer_note = report.singer.and_then(|frame| frame.note).unwrap();
    assert_eq!(singer_note.to_string(), "A4");

    let result = report.comparison.result().unwrap();
    assert_eq!(result.tier, MatchTier::Perfect);
    assert!(result.percent > 95.0, "match {}%", result.percent);
    assert!(result.adjust.is_none());
}

#[test]
fn octave_error_is_reported_as_no_match() {
    let singer = AudioBlock::new(generate_sine(880.0, 0.5), SAMPLE_RATE).unwrap();
    let reference = AudioBlock::new(generate_sine(440.0, 0.5), SAMPLE_RATE).unwrap();

    let mut monitor = Monitor::new(&EngineConfig::default()).unwrap();
    monitor.start(Instant::now());
    let report = monitor
        .frame(Some(&singer), Some(&reference), Instant::now())
        .unwrap()
        .unwrap();

    let result = report.comparison.result().unwrap();
    assert_ne!(result.tier, MatchTier::Perfect);
    assert!((result.cents - 1200.0).abs() < 20.0, "{} cents", result.cents);
}

#[test]
fn forced_algorithm_drives_both_sources() {
    let mut config = EngineConfig::default();
    config.force_algorithm(Algorithm::Spectral);

    let mut monitor = Monitor::new(&config).unwrap();
    monitor.start(Instant::now());
    let block = AudioBlock::new(generate_sine(330.0, 0.5), SAMPLE_RATE).unwrap();
    let report = monitor
        .frame(Some(&block), Some(&block), Instant::now())
        .unwrap()
        .unwrap();

    for frame in [report.singer, report.reference] {
        let detection = frame.and_then(|f| f.detection).unwrap();
        assert_eq!(detection.algorithm, Algorithm::Spectral);
    }
}
