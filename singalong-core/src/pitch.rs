//! # Pitch Detection Module
//!
//! This module estimates the fundamental frequency of one block of audio.
//! Three interchangeable estimators are provided, all refined to sub-sample
//! (or sub-bin) precision with the same parabolic interpolation:
//!
//! - **Autocorrelation**: a difference-based correlation
//!   `corr(τ) = 1 − Σ|x[i] − x[i+τ]| / M` over the first half of the block.
//!   Cheapest of the three.
//! - **YIN**: cumulative-mean-normalized squared difference with absolute
//!   threshold and descent to the local minimum. Most accurate on voice and
//!   more robust than autocorrelation on harmonic-rich material.
//! - **Spectral**: smoothed peak picking on a dB magnitude spectrum inside the
//!   vocal band. A fallback for polyphonic or noisy captured audio.
//!
//! `PitchDetector` runs an ordered list of these, returning the first
//! estimate that falls inside the plausible frequency range.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::audio::AudioBlock;
use crate::config::{EngineConfig, FrequencyRange, SourceConfig, SpectralSettings, VocalBand};
use crate::error::Error;
use crate::fft::SpectrumAnalyzer;

/// Default YIN acceptance threshold for the normalized difference.
pub const DEFAULT_YIN_THRESHOLD: f32 = 0.15;
/// Default acceptance threshold for the difference-based correlation.
pub const DEFAULT_AUTOCORRELATION_THRESHOLD: f32 = 0.9;

/// A pitch estimation algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    Autocorrelation,
    Yin,
    Spectral,
}

impl Algorithm {
    pub const ALL: [Algorithm; 3] = [Algorithm::Yin, Algorithm::Autocorrelation, Algorithm::Spectral];

    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Autocorrelation => "autocorrelation",
            Algorithm::Yin => "yin",
            Algorithm::Spectral => "spectral",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "autocorrelation" | "acf" => Ok(Algorithm::Autocorrelation),
            "yin" => Ok(Algorithm::Yin),
            "spectral" | "fft" => Ok(Algorithm::Spectral),
            other => Err(Error::InvalidConfig(format!("unknown algorithm `{other}`"))),
        }
    }
}

/// A frequency estimate for one block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    /// Estimated fundamental in Hz.
    pub frequency: f32,
    /// Algorithm-specific clarity in 0..=1 (1 − d′ for YIN, the correlation
    /// for autocorrelation, peak height above the floor for spectral).
    pub clarity: f32,
    pub algorithm: Algorithm,
}

/// Refines an extremum at `index` by fitting a parabola through its two
/// neighbours. Works for maxima and minima alike.
///
/// Returns the unrefined index at the array edges or when the three points
/// are collinear.
pub fn parabolic_interpolation(values: &[f32], index: usize) -> f32 {
    if index == 0 || index + 1 >= values.len() {
        return index as f32;
    }
    let y1 = values[index - 1];
    let y2 = values[index];
    let y3 = values[index + 1];

    let denominator = y1 - 2.0 * y2 + y3;
    if denominator.abs() < f32::EPSILON {
        return index as f32;
    }
    let shift = (y1 - y3) / (2.0 * denominator);
    if !shift.is_finite() || shift.abs() > 1.0 {
        return index as f32;
    }
    index as f32 + shift
}

/// Difference-based autocorrelation.
///
/// Lags are scanned upward from 1 and the first local maximum whose
/// correlation exceeds `threshold` wins; the scan stops there. Lag 0 is never
/// a candidate.
///
/// # Returns
/// * `Some((frequency, correlation))` - Refined estimate and its correlation
/// * `None` - No lag qualified
pub fn autocorrelation(signal: &[f32], sample_rate: u32, threshold: f32) -> Option<(f32, f32)> {
    let half = signal.len() / 2;
    if half < 3 || sample_rate == 0 {
        return None;
    }

    let mut correlations = Vec::with_capacity(half);
    for tau in 0..half {
        let difference: f32 = (0..half)
            .map(|i| (signal[i] - signal[i + tau]).abs())
            .sum();
        correlations.push(1.0 - difference / half as f32);

        // Lag tau - 1 can be judged once its right neighbour exists.
        if tau >= 2 {
            let candidate = tau - 1;
            let value = correlations[candidate];
            if value > threshold
                && value > correlations[candidate - 1]
                && value >= correlations[tau]
            {
                let lag = parabolic_interpolation(&correlations, candidate);
                let frequency = sample_rate as f32 / lag;
                return frequency
                    .is_finite()
                    .then_some((frequency, value.clamp(0.0, 1.0)));
            }
        }
    }
    None
}

/// YIN pitch detection over the first half of the block.
///
/// # Returns
/// * `Some((frequency, clarity))` - Refined estimate, clarity = 1 − d′(τ)
/// * `None` - d′ never dropped below `threshold`
pub fn yin(signal: &[f32], sample_rate: u32, threshold: f32) -> Option<(f32, f32)> {
    let half = signal.len() / 2;
    if half < 3 || sample_rate == 0 {
        return None;
    }
    let mut yin_buffer = vec![0.0f32; half];

    // Squared difference function.
    for tau in 1..half {
        let mut diff = 0.0;
        for i in 0..half {
            let delta = signal[i] - signal[i + tau];
            diff += delta * delta;
        }
        yin_buffer[tau] = diff;
    }

    // Cumulative mean normalized difference.
    yin_buffer[0] = 1.0;
    let mut running_sum = 0.0;
    for tau in 1..half {
        running_sum += yin_buffer[tau];
        if running_sum > 0.0 {
            yin_buffer[tau] *= tau as f32 / running_sum;
        } else {
            yin_buffer[tau] = 1.0;
        }
    }

    // Absolute threshold, then walk down to the bottom of that dip.
    let mut period = None;
    for tau in 2..half {
        if yin_buffer[tau] < threshold {
            let mut best = tau;
            while best + 1 < half && yin_buffer[best + 1] < yin_buffer[best] {
                best += 1;
            }
            period = Some(best);
            break;
        }
    }
    let period = period?;

    let refined = parabolic_interpolation(&yin_buffer, period);
    let frequency = sample_rate as f32 / refined;
    let clarity = (1.0 - yin_buffer[period]).clamp(0.0, 1.0);

    frequency.is_finite().then_some((frequency, clarity))
}

/// Picks the dominant peak of a dB spectrum inside `band`.
///
/// `spectrum_db` holds the lower half of an FFT, so each bin is
/// `sample_rate / (2 · spectrum_db.len())` Hz wide. The band is scanned with a
/// symmetric moving average of linear magnitude to find the loudest region.
/// The strongest bin of that region must be a local maximum above
/// `settings.floor_db`; it is refined across its own neighbours.
///
/// Averaging must stay linear: in dB the empty bins beside a Hann main lobe
/// dominate and sink quiet tones under the floor.
///
/// # Returns
/// * `Some((frequency, clarity))` - Clarity is the peak height above the
///   floor, normalized so 0 dB reads as 1.0
/// * `None` - Nothing in the band rose above the floor
pub fn spectral_peak(
    spectrum_db: &[f32],
    sample_rate: u32,
    band: VocalBand,
    settings: SpectralSettings,
) -> Option<(f32, f32)> {
    let len = spectrum_db.len();
    if len < 3 || sample_rate == 0 {
        return None;
    }
    let bin_width = sample_rate as f32 / (2.0 * len as f32);
    let first = ((band.low_hz / bin_width).ceil() as usize).max(1);
    let last = ((band.high_hz / bin_width).floor() as usize).min(len - 2);
    if first > last {
        return None;
    }

    let magnitudes: Vec<f32> = spectrum_db
        .iter()
        .map(|db| 10.0_f32.powf(db / 20.0))
        .collect();
    let radius = settings.smoothing_radius;
    let smoothed = |bin: usize| -> f32 {
        let start = bin.saturating_sub(radius);
        let end = (bin + radius).min(len - 1);
        let window = &magnitudes[start..=end];
        window.iter().sum::<f32>() / window.len() as f32
    };

    let mut loudest: Option<(usize, f32)> = None;
    for bin in first..=last {
        let value = smoothed(bin);
        if loudest.is_none_or(|(_, best)| value > best) {
            loudest = Some((bin, value));
        }
    }
    let (centre, _) = loudest?;

    let start = centre.saturating_sub(radius).max(first);
    let end = (centre + radius).min(last);
    let peak = (start..=end).max_by(|&a, &b| spectrum_db[a].total_cmp(&spectrum_db[b]))?;
    let level = spectrum_db[peak];

    // A skirt leaking in from outside the band rises towards the edge
    // without ever turning over.
    let turns_over = level >= spectrum_db[peak - 1] && level >= spectrum_db[peak + 1];
    if level <= settings.floor_db || !turns_over {
        return None;
    }

    let frequency = parabolic_interpolation(spectrum_db, peak) * bin_width;

    let clarity = if settings.floor_db < 0.0 {
        ((level - settings.floor_db) / -settings.floor_db).clamp(0.0, 1.0)
    } else {
        1.0
    };

    (frequency.is_finite() && frequency > 0.0).then_some((frequency, clarity))
}

/// A configured pitch detector for one source.
///
/// Holds no per-call state: the same block always yields the same estimate.
#[derive(Debug, Clone)]
pub struct PitchDetector {
    algorithms: Vec<Algorithm>,
    range: FrequencyRange,
    yin_threshold: f32,
    autocorrelation_threshold: f32,
    spectral: SpectralSettings,
    band: VocalBand,
    analyzer: Option<SpectrumAnalyzer>,
}

impl PitchDetector {
    /// Creates a detector trying `algorithms` in order, with default
    /// thresholds, range and vocal band.
    pub fn new(algorithms: impl Into<Vec<Algorithm>>, window_size: usize) -> Self {
        let algorithms = algorithms.into();
        let analyzer = algorithms
            .contains(&Algorithm::Spectral)
            .then(|| SpectrumAnalyzer::new(window_size));
        Self {
            algorithms,
            range: FrequencyRange::default(),
            yin_threshold: DEFAULT_YIN_THRESHOLD,
            autocorrelation_threshold: DEFAULT_AUTOCORRELATION_THRESHOLD,
            spectral: SpectralSettings::default(),
            band: VocalBand::default(),
            analyzer,
        }
    }

    /// Builds the detector for one source of an engine configuration.
    ///
    /// A vocal-filtered source tries spectral picking first, since its stream
    /// has already been shaped towards the vocal band.
    pub fn from_config(config: &EngineConfig, source: &SourceConfig) -> Self {
        let mut algorithms = source.algorithms.clone();
        if source.vocal_filter {
            if let Some(position) = algorithms.iter().position(|a| *a == Algorithm::Spectral) {
                let spectral = algorithms.remove(position);
                algorithms.insert(0, spectral);
            }
        }

        let mut detector = Self::new(algorithms, config.window_size);
        detector.range = config.frequency_range;
        detector.yin_threshold = config.yin.threshold;
        detector.autocorrelation_threshold = config.autocorrelation.threshold;
        detector.spectral = config.spectral;
        detector.band = config.vocal_band;
        detector
    }

    pub fn with_range(mut self, range: FrequencyRange) -> Self {
        self.range = range;
        self
    }

    pub fn set_yin_threshold(&mut self, threshold: f32) {
        self.yin_threshold = threshold;
    }

    pub fn set_autocorrelation_threshold(&mut self, threshold: f32) {
        self.autocorrelation_threshold = threshold;
    }

    /// Moves the spectral search band, e.g. after the user drags a slider.
    pub fn set_band(&mut self, band: VocalBand) {
        self.band = band;
    }

    pub fn algorithms(&self) -> &[Algorithm] {
        &self.algorithms
    }

    pub fn range(&self) -> FrequencyRange {
        self.range
    }

    /// Runs the algorithms in order and returns the first in-range estimate.
    pub fn detect(&self, block: &AudioBlock) -> Option<Detection> {
        for (attempt, &algorithm) in self.algorithms.iter().enumerate() {
            if let Some(detection) = self.estimate(algorithm, block) {
                if attempt > 0 {
                    tracing::trace!(%algorithm, attempt, "fallback estimator succeeded");
                }
                return Some(detection);
            }
        }
        None
    }

    /// Runs a single algorithm. Estimates outside the plausible range are
    /// discarded.
    pub fn estimate(&self, algorithm: Algorithm, block: &AudioBlock) -> Option<Detection> {
        let samples = block.samples();
        let sample_rate = block.sample_rate();

        let (frequency, clarity) = match algorithm {
            Algorithm::Autocorrelation => {
                autocorrelation(samples, sample_rate, self.autocorrelation_threshold)?
            }
            Algorithm::Yin => yin(samples, sample_rate, self.yin_threshold)?,
            Algorithm::Spectral => {
                let spectrum = match &self.analyzer {
                    Some(analyzer) if analyzer.size() == samples.len() => {
                        analyzer.decibels(samples)
                    }
                    _ => SpectrumAnalyzer::new(samples.len()).decibels(samples),
                };
                spectral_peak(&spectrum, sample_rate, self.band, self.spectral)?
            }
        };

        if !self.range.contains(frequency) {
            tracing::trace!(%algorithm, frequency, "estimate outside plausible range");
            return None;
        }

        Some(Detection {
            frequency,
            clarity,
            algorithm,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: usize = 4096;

    fn generate_tone(sample_rate: u32, freq: f32, amplitude: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                amplitude * (2.0 * std::f32::consts::PI * freq * t).sin()
            })
            .collect()
    }

    fn generate_sine(sample_rate: u32, freq: f32, len: usize) -> Vec<f32> {
        generate_tone(sample_rate, freq, 0.8, len)
    }

    fn sine_block(sample_rate: u32, freq: f32) -> AudioBlock {
        AudioBlock::new(generate_sine(sample_rate, freq, WINDOW), sample_rate).unwrap()
    }

    fn assert_within_one_percent(expected: f32, actual: f32, algorithm: Algorithm) {
        let error_percent = ((actual - expected) / expected).abs() * 100.0;
        assert!(
            error_percent < 1.0,
            "{algorithm}: expected {expected} Hz, got {actual} Hz ({error_percent}% error)"
        );
    }

    #[test]
    fn every_algorithm_tracks_pure_sines() {
        for algorithm in Algorithm::ALL {
            let detector = PitchDetector::new(vec![algorithm], WINDOW);
            for freq in [220.0, 440.0, 880.0] {
                let block = sine_block(44_100, freq);
                let detection = detector
                    .detect(&block)
                    .unwrap_or_else(|| panic!("{algorithm} missed {freq} Hz"));
                assert_eq!(detection.algorithm, algorithm);
                assert_within_one_percent(freq, detection.frequency, algorithm);
                assert!(detection.clarity > 0.0 && detection.clarity <= 1.0);
            }
        }
    }

    #[test]
    fn silence_yields_no_pitch() {
        let silence = vec![0.0; WINDOW];
        assert!(autocorrelation(&silence, 44_100, 0.9).is_none());
        assert!(yin(&silence, 44_100, 0.15).is_none());

        let spectrum = SpectrumAnalyzer::new(WINDOW).decibels(&silence);
        assert!(spectral_peak(&spectrum, 44_100, VocalBand::default(), SpectralSettings::default())
            .is_none());

        let block = AudioBlock::new(silence, 44_100).unwrap();
        let detector = PitchDetector::new(Algorithm::ALL.to_vec(), WINDOW);
        assert!(detector.detect(&block).is_none());
    }

    #[test]
    fn tones_above_the_range_are_discarded() {
        // 3 kHz is a valid period for the lag scan but not a plausible voice.
        let block = sine_block(44_100, 3000.0);
        for algorithm in Algorithm::ALL {
            let detector = PitchDetector::new(vec![algorithm], WINDOW);
            assert!(
                detector.detect(&block).is_none(),
                "{algorithm} should discard 3 kHz"
            );
        }

        // The raw estimators still see the true period, so the policy is what rejects it.
        let (raw, _) = yin(block.samples(), 44_100, DEFAULT_YIN_THRESHOLD).unwrap();
        assert!(raw > 2000.0);
    }

    #[test]
    fn detection_is_repeatable() {
        let block = sine_block(48_000, 330.0);
        let detector = PitchDetector::new(Algorithm::ALL.to_vec(), WINDOW);
        let first = detector.detect(&block);
        let second = detector.detect(&block);
        assert!(first.is_some());
        assert_eq!(first, second);
    }

    #[test]
    fn falls_back_when_first_algorithm_fails() {
        let block = sine_block(44_100, 440.0);
        let mut detector = PitchDetector::new(vec![Algorithm::Yin, Algorithm::Autocorrelation], WINDOW);
        // No real signal gets d′ this close to zero.
        detector.set_yin_threshold(1e-9);

        let detection = detector.detect(&block).expect("autocorrelation fallback");
        assert_eq!(detection.algorithm, Algorithm::Autocorrelation);
        assert_within_one_percent(440.0, detection.frequency, detection.algorithm);
    }

    #[test]
    fn vocal_filtered_source_tries_spectral_first() {
        let config = EngineConfig::default();
        let mut source = config.reference.clone();
        source.vocal_filter = true;

        let detector = PitchDetector::from_config(&config, &source);
        assert_eq!(detector.algorithms()[0], Algorithm::Spectral);

        let detection = detector.detect(&sine_block(44_100, 440.0)).unwrap();
        assert_eq!(detection.algorithm, Algorithm::Spectral);
    }

    #[test]
    fn spectral_hears_quiet_tones_above_each_gate() {
        let detector = PitchDetector::new(vec![Algorithm::Spectral], WINDOW);
        for gate in [
            SourceConfig::singer().gate_threshold,
            SourceConfig::reference().gate_threshold,
        ] {
            // A sine's RMS is its amplitude over √2.
            let amplitude = gate * 1.1 * std::f32::consts::SQRT_2;
            for sample_rate in [44_100, 48_000] {
                for freq in [110.0, 220.0, 440.0, 880.0] {
                    let samples = generate_tone(sample_rate, freq, amplitude, WINDOW);
                    let block = AudioBlock::new(samples, sample_rate).unwrap();
                    let detection = detector.detect(&block).unwrap_or_else(|| {
                        panic!("missed {freq} Hz at {sample_rate} Hz just above gate {gate}")
                    });
                    assert_within_one_percent(freq, detection.frequency, Algorithm::Spectral);
                    assert!(detection.clarity > 0.0);
                }
            }
        }
    }

    #[test]
    fn spectral_peak_stays_silent_below_the_floor() {
        let settings = SpectralSettings::default();
        let spectrum = vec![settings.floor_db - 5.0; WINDOW / 2];
        assert!(spectral_peak(&spectrum, 44_100, VocalBand::default(), settings).is_none());
    }

    #[test]
    fn spectral_search_respects_band() {
        let mut detector = PitchDetector::new(vec![Algorithm::Spectral], WINDOW);
        detector.set_band(VocalBand {
            low_hz: 600.0,
            high_hz: 1200.0,
        });
        // The only energy sits below the band.
        for sample_rate in [44_100, 48_000] {
            assert!(detector.detect(&sine_block(sample_rate, 440.0)).is_none());
        }
    }

    #[test]
    fn parabolic_interpolation_finds_vertex() {
        // y = (x - 2.3)^2 sampled at 1, 2, 3 has its minimum at 2.3.
        let values: Vec<f32> = (0..5).map(|x| (x as f32 - 2.3).powi(2)).collect();
        assert!((parabolic_interpolation(&values, 2) - 2.3).abs() < 1e-4);

        // Maxima work the same way.
        let peak: Vec<f32> = (0..5).map(|x| -(x as f32 - 1.8).powi(2)).collect();
        assert!((parabolic_interpolation(&peak, 2) - 1.8).abs() < 1e-4);
    }

    #[test]
    fn parabolic_interpolation_guards_flat_and_edges() {
        assert_eq!(parabolic_interpolation(&[0.5, 0.5, 0.5], 1), 1.0);
        assert_eq!(parabolic_interpolation(&[0.1, 0.2, 0.3], 0), 0.0);
        assert_eq!(parabolic_interpolation(&[0.1, 0.2, 0.3], 2), 2.0);
    }

    #[test]
    fn algorithm_names_round_trip() {
        for algorithm in Algorithm::ALL {
            assert_eq!(algorithm.as_str().parse::<Algorithm>().unwrap(), algorithm);
        }
        assert!("mpm".parse::<Algorithm>().is_err());
    }
}
