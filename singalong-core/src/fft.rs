//! # Fast Fourier Transform (FFT) Module
//!
//! This module turns a block of samples into the dB magnitude spectrum used by
//! spectral peak picking.
//!
//! ## Features
//! - High-performance FFT using RustFFT, planned once per window size
//! - DC offset removal and Hann windowing for reduced spectral leakage
//! - dB magnitudes scaled by 1/N, half spectrum up to Nyquist

use std::sync::Arc;

use rustfft::{Fft, FftPlanner, num_complex::Complex};

/// Quietest level reported; weaker bins, including empty ones, are clamped here.
pub const MIN_DECIBELS: f32 = -100.0;

/// Removes the DC offset from a signal by making its average value zero.
fn remove_dc_offset(signal: &mut [f32]) {
    let len = signal.len();
    if len == 0 {
        return;
    }
    let avg = signal.iter().sum::<f32>() / len as f32;
    if avg.abs() > 1e-6 {
        for sample in signal.iter_mut() {
            *sample -= avg;
        }
    }
}

/// Applies a Hann window to the input buffer to reduce spectral leakage.
fn apply_hann_window(buffer: &mut [f32]) {
    let n = buffer.len();
    if n < 2 {
        return;
    }
    let n_minus_1 = (n - 1) as f32;
    for (i, sample) in buffer.iter_mut().enumerate() {
        let multiplier = 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n_minus_1).cos());
        *sample *= multiplier;
    }
}

/// A forward FFT planned for one window size.
#[derive(Clone)]
pub struct SpectrumAnalyzer {
    size: usize,
    fft: Arc<dyn Fft<f32>>,
}

impl std::fmt::Debug for SpectrumAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectrumAnalyzer")
            .field("size", &self.size)
            .finish()
    }
}

impl SpectrumAnalyzer {
    pub fn new(size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size);
        Self { size, fft }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Performs a forward FFT on a signal and returns the complex spectrum.
    ///
    /// The signal is DC-corrected and Hann-windowed first. Signals shorter than
    /// the planned size are zero-padded; longer ones are truncated.
    pub fn perform_fft(&self, signal: &[f32]) -> Vec<Complex<f32>> {
        let mut processed_signal = signal[..signal.len().min(self.size)].to_vec();
        remove_dc_offset(&mut processed_signal);
        apply_hann_window(&mut processed_signal);

        let mut buffer: Vec<Complex<f32>> = processed_signal
            .into_iter()
            .map(|sample| Complex { re: sample, im: 0.0 })
            .collect();
        buffer.resize(self.size, Complex { re: 0.0, im: 0.0 });

        self.fft.process(&mut buffer);
        buffer
    }

    /// Magnitude spectrum in dB, `size / 2` bins of width `sample_rate / size`.
    pub fn decibels(&self, signal: &[f32]) -> Vec<f32> {
        spectrum_to_decibels(&self.perform_fft(signal))
    }
}

/// Converts the lower half of a complex spectrum to dB, scaled by 1/N.
pub fn spectrum_to_decibels(spectrum: &[Complex<f32>]) -> Vec<f32> {
    let scale = 1.0 / spectrum.len() as f32;
    spectrum
        .iter()
        .take(spectrum.len() / 2)
        .map(|c| {
            let magnitude = c.norm() * scale;
            if magnitude > 0.0 {
                (20.0 * magnitude.log10()).max(MIN_DECIBELS)
            } else {
                MIN_DECIBELS
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sine_peaks_in_expected_bin() {
        let size = 1024;
        let sample_rate = 8192.0;
        // 512 Hz lands exactly on bin 64 at 8 Hz per bin.
        let signal: Vec<f32> = (0..size)
            .map(|i| (2.0 * std::f32::consts::PI * 512.0 * i as f32 / sample_rate).sin())
            .collect();

        let analyzer = SpectrumAnalyzer::new(size);
        let db = analyzer.decibels(&signal);
        assert_eq!(db.len(), size / 2);

        let peak = db
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i);
        assert_eq!(peak, Some(64));
    }

    #[test]
    fn silence_reports_floor() {
        let analyzer = SpectrumAnalyzer::new(256);
        let db = analyzer.decibels(&[0.0; 256]);
        assert!(db.iter().all(|&v| v == MIN_DECIBELS));
    }

    #[test]
    fn dc_offset_does_not_leak_into_spectrum() {
        let analyzer = SpectrumAnalyzer::new(512);
        let db = analyzer.decibels(&[0.5; 512]);
        assert_eq!(db[0], MIN_DECIBELS, "DC bin should be removed");
    }
}
