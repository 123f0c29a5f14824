//! # Signal Gate
//!
//! Measures block energy and decides whether a block is loud enough to be
//! worth a pitch estimate. Thresholds are per source: a microphone in a room
//! has a far higher noise floor than cleanly captured media audio.

/// RMS at which the level meter reads 100%.
const FULL_SCALE_RMS: f32 = 0.1;

/// Root-mean-square of a block. Returns 0.0 for an empty slice.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|&s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}

/// Energy of one block as seen by the gate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalLevel {
    pub rms: f32,
    /// Level for metering, `rms` scaled to 0..=100.
    pub percent: f32,
    pub threshold: f32,
}

impl SignalLevel {
    /// True when the block is at or above the gate threshold.
    pub fn is_signal(&self) -> bool {
        self.rms >= self.threshold
    }
}

/// An RMS noise gate with a source-specific threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalGate {
    threshold: f32,
}

impl SignalGate {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold: threshold.max(0.0),
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: f32) {
        self.threshold = threshold.max(0.0);
    }

    pub fn measure(&self, samples: &[f32]) -> SignalLevel {
        let rms = rms(samples);
        SignalLevel {
            rms,
            percent: (rms / FULL_SCALE_RMS * 100.0).min(100.0),
            threshold: self.threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_is_not_signal() {
        let gate = SignalGate::new(0.008);
        let level = gate.measure(&[0.0; 4096]);
        assert_eq!(level.rms, 0.0);
        assert_eq!(level.percent, 0.0);
        assert!(!level.is_signal());
    }

    #[test]
    fn rms_of_full_scale_square_wave_is_one() {
        let square: Vec<f32> = (0..64).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        assert!((rms(&square) - 1.0).abs() < 1e-6);
        assert_eq!(rms(&[]), 0.0);
    }

    #[test]
    fn threshold_depends_on_source() {
        // Quiet but clean line-level audio.
        let quiet = vec![0.002_f32; 1024];

        let microphone = SignalGate::new(0.008);
        let line_in = SignalGate::new(0.0005);

        assert!(!microphone.measure(&quiet).is_signal());
        assert!(line_in.measure(&quiet).is_signal());
    }

    #[test]
    fn meter_percent_saturates() {
        let gate = SignalGate::new(0.01);
        assert!((gate.measure(&[0.05; 128]).percent - 50.0).abs() < 1e-3);
        assert_eq!(gate.measure(&[0.5; 128]).percent, 100.0);
    }

    #[test]
    fn negative_threshold_is_clamped() {
        let mut gate = SignalGate::new(-1.0);
        assert_eq!(gate.threshold(), 0.0);
        gate.set_threshold(0.25);
        assert_eq!(gate.threshold(), 0.25);
    }
}
