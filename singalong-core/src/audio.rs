//! # Audio Input Module
//!
//! This module defines the unit of work handed to the analysis pipeline and
//! the microphone capture that produces it.
//!
//! ## Features
//! - `AudioBlock`: a validated block of mono samples plus its sample rate
//! - `SlidingWindow`: keeps the most recent N samples of a continuous stream
//! - Microphone capture through CPAL, mixed down to mono
//!
//! Capture streams raw chunks of whatever size the device delivers. The frame
//! loop pushes them into a `SlidingWindow` and reads a snapshot once per frame,
//! so consecutive blocks overlap the way an analyser tap does.

use std::collections::VecDeque;

use anyhow::{Context, Result as AnyResult, anyhow};
use cpal::SupportedStreamConfigRange;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::Sender;

use crate::error::{Error, Result};

/// Sample rate requested from the input device when it offers a choice.
pub const PREFERRED_SAMPLE_RATE: u32 = 48_000;

/// A contiguous slice of one channel's waveform, normalized to [-1, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBlock {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioBlock {
    /// Builds a block, rejecting input that can only come from a broken source:
    /// no samples, a zero sample rate, or NaN/infinite samples.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(Error::ZeroSampleRate);
        }
        if samples.is_empty() {
            return Err(Error::EmptyBlock);
        }
        if let Some(index) = samples.iter().position(|s| !s.is_finite()) {
            return Err(Error::NonFiniteSample { index });
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Fails unless the block holds exactly `expected` samples.
    pub fn ensure_len(&self, expected: usize) -> Result<()> {
        if self.samples.len() != expected {
            return Err(Error::BlockLength {
                expected,
                actual: self.samples.len(),
            });
        }
        Ok(())
    }
}

/// Holds the most recent `capacity` samples of a stream.
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    buffer: VecDeque<f32>,
    capacity: usize,
}

impl SlidingWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends new samples, discarding the oldest ones beyond capacity.
    pub fn push(&mut self, samples: &[f32]) {
        let skip = samples.len().saturating_sub(self.capacity);
        for &sample in &samples[skip..] {
            if self.buffer.len() == self.capacity {
                self.buffer.pop_front();
            }
            self.buffer.push_back(sample);
        }
    }

    pub fn is_full(&self) -> bool {
        self.buffer.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Copies out the current window, or `None` until it has filled once.
    pub fn snapshot(&self) -> Option<Vec<f32>> {
        if !self.is_full() {
            return None;
        }
        Some(self.buffer.iter().copied().collect())
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

/// Starts audio capture from the default input device.
///
/// This function:
/// 1. Selects the default audio input device
/// 2. Picks an f32 configuration, preferring mono and `PREFERRED_SAMPLE_RATE`
/// 3. Streams mono chunks to `sender` from the device callback
///
/// # Returns
/// * `Ok((stream, sample_rate))` - Audio stream handle and sample rate
/// * `Err(e)` - Error if no usable device or format exists
pub fn start_audio_capture(sender: Sender<Vec<f32>>) -> AnyResult<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("No input device available"))?;

    let device_name = device.name()?;
    tracing::info!(device = %device_name, "using audio input device");

    let configs = device.supported_input_configs()?.collect::<Vec<_>>();
    let supported_config = find_supported_config(configs, PREFERRED_SAMPLE_RATE)
        .ok_or_else(|| anyhow!("No suitable f32 input format found"))?;

    let rate = PREFERRED_SAMPLE_RATE.clamp(
        supported_config.min_sample_rate().0,
        supported_config.max_sample_rate().0,
    );
    let config = supported_config.with_sample_rate(cpal::SampleRate(rate));
    let sample_rate = config.sample_rate().0;
    let channels = config.channels() as usize;
    let config: cpal::StreamConfig = config.into();

    tracing::info!(sample_rate, channels, "selected input format");

    let err_fn = |err| tracing::warn!("an error occurred on the audio stream: {}", err);

    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let mono = mix_to_mono(data, channels);
                // A full channel means the frame loop is behind; dropping is fine
                // because only the most recent window is ever analysed.
                let _ = sender.try_send(mono);
            },
            err_fn,
            None,
        )
        .context("failed to build input stream")?;

    stream.play().context("failed to start input stream")?;

    Ok((stream, sample_rate))
}

/// Averages interleaved frames down to a single channel.
pub fn mix_to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Finds the best supported f32 configuration for the target sample rate,
/// preferring fewer channels, then the smallest distance to `target_rate`.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let min = c.min_sample_rate().0;
            let max = c.max_sample_rate().0;
            let rate_distance = if (min..=max).contains(&target_rate) {
                0
            } else {
                target_rate.abs_diff(min).min(target_rate.abs_diff(max))
            };
            (c.channels(), rate_distance)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_rejects_malformed_input() {
        assert!(matches!(
            AudioBlock::new(vec![0.0; 16], 0),
            Err(Error::ZeroSampleRate)
        ));
        assert!(matches!(
            AudioBlock::new(Vec::new(), 44_100),
            Err(Error::EmptyBlock)
        ));

        let mut samples = vec![0.0; 16];
        samples[7] = f32::NAN;
        assert!(matches!(
            AudioBlock::new(samples, 44_100),
            Err(Error::NonFiniteSample { index: 7 })
        ));
    }

    #[test]
    fn block_length_is_checked_against_window() {
        let block = AudioBlock::new(vec![0.0; 1024], 44_100).unwrap();
        assert!(block.ensure_len(1024).is_ok());
        assert!(matches!(
            block.ensure_len(2048),
            Err(Error::BlockLength {
                expected: 2048,
                actual: 1024
            })
        ));
    }

    #[test]
    fn sliding_window_keeps_most_recent_samples() {
        let mut window = SlidingWindow::new(4);
        window.push(&[1.0, 2.0, 3.0]);
        assert!(window.snapshot().is_none());

        window.push(&[4.0, 5.0]);
        assert_eq!(window.snapshot(), Some(vec![2.0, 3.0, 4.0, 5.0]));

        // A chunk longer than the window only keeps its tail.
        window.push(&[6.0, 7.0, 8.0, 9.0, 10.0, 11.0]);
        assert_eq!(window.snapshot(), Some(vec![8.0, 9.0, 10.0, 11.0]));

        window.clear();
        assert!(!window.is_full());
    }

    #[test]
    fn stereo_is_averaged_to_mono() {
        let mono = mix_to_mono(&[1.0, 0.0, 0.5, 0.5, -1.0, 1.0], 2);
        assert_eq!(mono, vec![0.5, 0.5, 0.0]);
        assert_eq!(mix_to_mono(&[0.25, 0.5], 1), vec![0.25, 0.5]);
    }
}
