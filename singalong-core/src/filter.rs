//! Vocal band filter.
//!
//! A streaming chain of four biquads that shapes captured media audio towards
//! a singing voice before pitch analysis: highpass at the band's low edge,
//! lowpass at its high edge, a presence boost around 350 Hz and a narrow notch
//! on 60 Hz mains hum. Coefficients follow the Audio EQ Cookbook.

use std::f64::consts::PI;

use crate::config::VocalBand;

const EDGE_Q: f64 = 0.7;
const PRESENCE_HZ: f64 = 350.0;
const PRESENCE_Q: f64 = 0.5;
const PRESENCE_GAIN_DB: f64 = 6.0;
const HUM_HZ: f64 = 60.0;
const HUM_Q: f64 = 30.0;

/// Normalized biquad coefficients (a0 = 1).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

struct Prewarp {
    cos_omega: f64,
    alpha: f64,
}

fn prewarp(frequency: f64, q: f64, sample_rate: f64) -> Prewarp {
    // Q below 0.5 makes alpha blow up near DC.
    let q = q.max(0.5);
    let frequency = frequency.clamp(1.0, sample_rate * 0.49);
    let omega = 2.0 * PI * frequency / sample_rate;
    Prewarp {
        cos_omega: omega.cos(),
        alpha: omega.sin() / (2.0 * q),
    }
}

impl BiquadCoeffs {
    fn normalized(b0: f64, b1: f64, b2: f64, a0: f64, a1: f64, a2: f64) -> Self {
        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// # Arguments
    /// * `cutoff` - Cutoff frequency in Hz
    /// * `q` - Q factor, 0.707 is Butterworth
    /// * `sample_rate` - Audio sample rate in Hz
    pub fn lowpass(cutoff: f64, q: f64, sample_rate: f64) -> Self {
        let Prewarp { cos_omega, alpha } = prewarp(cutoff, q, sample_rate);
        Self::normalized(
            (1.0 - cos_omega) / 2.0,
            1.0 - cos_omega,
            (1.0 - cos_omega) / 2.0,
            1.0 + alpha,
            -2.0 * cos_omega,
            1.0 - alpha,
        )
    }

    pub fn highpass(cutoff: f64, q: f64, sample_rate: f64) -> Self {
        let Prewarp { cos_omega, alpha } = prewarp(cutoff, q, sample_rate);
        Self::normalized(
            (1.0 + cos_omega) / 2.0,
            -(1.0 + cos_omega),
            (1.0 + cos_omega) / 2.0,
            1.0 + alpha,
            -2.0 * cos_omega,
            1.0 - alpha,
        )
    }

    /// Peaking EQ; positive `db_gain` boosts.
    pub fn peaking(frequency: f64, q: f64, db_gain: f64, sample_rate: f64) -> Self {
        let Prewarp { cos_omega, alpha } = prewarp(frequency, q, sample_rate);
        let a = 10.0_f64.powf(db_gain / 40.0);
        Self::normalized(
            1.0 + alpha * a,
            -2.0 * cos_omega,
            1.0 - alpha * a,
            1.0 + alpha / a,
            -2.0 * cos_omega,
            1.0 - alpha / a,
        )
    }

    /// Band-reject filter centred on `center`.
    pub fn notch(center: f64, q: f64, sample_rate: f64) -> Self {
        let Prewarp { cos_omega, alpha } = prewarp(center, q, sample_rate);
        Self::normalized(
            1.0,
            -2.0 * cos_omega,
            1.0,
            1.0 + alpha,
            -2.0 * cos_omega,
            1.0 - alpha,
        )
    }
}

/// Direct form I biquad with its own delay line.
#[derive(Debug, Clone)]
pub struct BiquadFilter {
    coeffs: BiquadCoeffs,
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
}

impl BiquadFilter {
    pub fn new(coeffs: BiquadCoeffs) -> Self {
        Self {
            coeffs,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    /// Swaps coefficients without clearing the delay line.
    pub fn set_coeffs(&mut self, coeffs: BiquadCoeffs) {
        self.coeffs = coeffs;
    }

    pub fn reset(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }

    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        let c = &self.coeffs;
        let output = c.b0 * input + c.b1 * self.x1 + c.b2 * self.x2 - c.a1 * self.y1 - c.a2 * self.y2;

        self.x2 = self.x1;
        self.x1 = input;
        self.y2 = self.y1;
        self.y1 = output;
        output
    }
}

/// The vocal filter chain for one stream.
///
/// State carries over between calls to [`VocalFilter::process`], so feed it
/// consecutive chunks of the same stream.
#[derive(Debug, Clone)]
pub struct VocalFilter {
    band: VocalBand,
    sample_rate: f64,
    stages: [BiquadFilter; 4],
}

impl VocalFilter {
    pub fn new(band: VocalBand, sample_rate: u32) -> Self {
        let sample_rate = f64::from(sample_rate.max(1));
        let stages = Self::coefficients(band, sample_rate).map(BiquadFilter::new);
        Self {
            band,
            sample_rate,
            stages,
        }
    }

    fn coefficients(band: VocalBand, sample_rate: f64) -> [BiquadCoeffs; 4] {
        [
            BiquadCoeffs::highpass(f64::from(band.low_hz), EDGE_Q, sample_rate),
            BiquadCoeffs::lowpass(f64::from(band.high_hz), EDGE_Q, sample_rate),
            BiquadCoeffs::peaking(PRESENCE_HZ, PRESENCE_Q, PRESENCE_GAIN_DB, sample_rate),
            BiquadCoeffs::notch(HUM_HZ, HUM_Q, sample_rate),
        ]
    }

    pub fn band(&self) -> VocalBand {
        self.band
    }

    /// Moves the band edges while the stream keeps running.
    pub fn set_band(&mut self, band: VocalBand) {
        self.band = band;
        let coeffs = Self::coefficients(band, self.sample_rate);
        for (stage, coeffs) in self.stages.iter_mut().zip(coeffs) {
            stage.set_coeffs(coeffs);
        }
    }

    /// Filters `samples` in place.
    pub fn process(&mut self, samples: &mut [f32]) {
        for sample in samples.iter_mut() {
            let mut value = f64::from(*sample);
            for stage in self.stages.iter_mut() {
                value = stage.process(value);
            }
            *sample = value as f32;
        }
    }

    pub fn reset(&mut self) {
        for stage in self.stages.iter_mut() {
            stage.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::rms;

    const SAMPLE_RATE: u32 = 48_000;

    /// RMS of a filtered one-second tone, measured over its last quarter.
    fn settled_rms(filter: &mut VocalFilter, freq: f32) -> f32 {
        let mut tone: Vec<f32> = (0..SAMPLE_RATE as usize)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / SAMPLE_RATE as f32).sin())
            .collect();
        filter.reset();
        filter.process(&mut tone);
        rms(&tone[tone.len() * 3 / 4..])
    }

    #[test]
    fn voice_band_passes_rumble_does_not() {
        let mut filter = VocalFilter::new(VocalBand::default(), SAMPLE_RATE);
        let voice = settled_rms(&mut filter, 300.0);
        let rumble = settled_rms(&mut filter, 30.0);
        let hiss = settled_rms(&mut filter, 5000.0);
        assert!(voice > 4.0 * rumble, "voice {voice}, rumble {rumble}");
        assert!(voice > 4.0 * hiss, "voice {voice}, hiss {hiss}");
    }

    #[test]
    fn mains_hum_is_notched() {
        let mut filter = VocalFilter::new(VocalBand::default(), SAMPLE_RATE);
        let hum = settled_rms(&mut filter, 60.0);
        assert!(hum < 0.05, "60 Hz hum left at {hum}");
    }

    #[test]
    fn moving_the_band_changes_the_response() {
        let mut filter = VocalFilter::new(VocalBand::default(), SAMPLE_RATE);
        let before = settled_rms(&mut filter, 150.0);

        let electronic = crate::config::VocalPreset::Electronic.band();
        filter.set_band(electronic);
        assert_eq!(filter.band(), electronic);
        let after = settled_rms(&mut filter, 100.0);
        assert!(after < before, "100 Hz at {after} should sit below 150 Hz at {before}");
    }

    #[test]
    fn peaking_boost_has_unity_gain_far_away() {
        let coeffs = BiquadCoeffs::peaking(350.0, 0.5, 6.0, 48_000.0);
        // DC gain of a biquad is the ratio of coefficient sums.
        let dc = (coeffs.b0 + coeffs.b1 + coeffs.b2) / (1.0 + coeffs.a1 + coeffs.a2);
        assert!((dc - 1.0).abs() < 1e-9);
    }
}
