//! Audio sources feeding the monitor: the live microphone, a WAV file played
//! back against the clock, and a synthesized reference tone.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use singalong_core::audio::{SlidingWindow, mix_to_mono};
use singalong_core::filter::VocalFilter;
use singalong_core::{AudioBlock, EngineConfig, NoteResult, VocalBand};

/// Most recent window of microphone audio.
pub struct MicSource {
    window: SlidingWindow,
    sample_rate: u32,
    filter: Option<VocalFilter>,
}

impl MicSource {
    pub fn new(window_size: usize, sample_rate: u32) -> Self {
        Self {
            window: SlidingWindow::new(window_size),
            sample_rate,
            filter: None,
        }
    }

    /// Runs every incoming chunk through the vocal filter from now on.
    pub fn with_vocal_filter(mut self, band: VocalBand) -> Self {
        self.filter = Some(VocalFilter::new(band, self.sample_rate));
        self
    }

    pub fn push(&mut self, mut chunk: Vec<f32>) {
        if let Some(filter) = self.filter.as_mut() {
            filter.process(&mut chunk);
        }
        self.window.push(&chunk);
    }

    /// The current window, once enough audio has arrived.
    pub fn block(&self) -> Result<Option<AudioBlock>> {
        self.window
            .snapshot()
            .map(|samples| AudioBlock::new(samples, self.sample_rate))
            .transpose()
            .context("microphone produced a malformed block")
    }
}

/// A mono WAV file, read fully into memory.
#[derive(Debug, Clone)]
pub struct WavSource {
    samples: Vec<f32>,
    sample_rate: u32,
    window_size: usize,
}

impl WavSource {
    /// Loads integer or float PCM of any channel count, mixed down to mono.
    pub fn load(path: &Path, window_size: usize) -> Result<Self> {
        let mut reader = hound::WavReader::open(path)
            .with_context(|| format!("failed to open WAV file '{}'", path.display()))?;
        let spec = reader.spec();

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<std::result::Result<_, _>>()
                .context("failed to read float samples")?,
            hound::SampleFormat::Int => {
                if !(1..=32).contains(&spec.bits_per_sample) {
                    bail!("unsupported bit depth: {} bits", spec.bits_per_sample);
                }
                let scale = 1.0 / (1_i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|sample| sample.map(|s| s as f32 * scale))
                    .collect::<std::result::Result<_, _>>()
                    .context("failed to read integer samples")?
            }
        };

        let samples = mix_to_mono(&interleaved, spec.channels as usize);
        tracing::info!(
            path = %path.display(),
            sample_rate = spec.sample_rate,
            channels = spec.channels,
            seconds = samples.len() as f64 / f64::from(spec.sample_rate.max(1)),
            "loaded WAV source"
        );

        Ok(Self {
            samples,
            sample_rate: spec.sample_rate,
            window_size,
        })
    }

    pub fn from_samples(samples: Vec<f32>, sample_rate: u32, window_size: usize) -> Self {
        Self {
            samples,
            sample_rate,
            window_size,
        }
    }

    /// Filters the whole file once, as a live filter would have.
    pub fn apply_vocal_filter(&mut self, band: VocalBand) {
        VocalFilter::new(band, self.sample_rate).process(&mut self.samples);
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Length in samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples.len() as f64 / f64::from(self.sample_rate.max(1)))
    }

    /// The window ending `at` into the file. `None` before the first full
    /// window and after the end.
    pub fn block_at(&self, at: Duration) -> Result<Option<AudioBlock>> {
        let end = (at.as_secs_f64() * f64::from(self.sample_rate)).round() as usize;
        if end < self.window_size || end > self.samples.len() {
            return Ok(None);
        }
        let samples = self.samples[end - self.window_size..end].to_vec();
        Ok(Some(AudioBlock::new(samples, self.sample_rate)?))
    }
}

/// A steady sine wave standing in for a reference singer.
#[derive(Debug, Clone, Copy)]
pub struct ToneSource {
    frequency: f32,
    amplitude: f32,
    sample_rate: u32,
    window_size: usize,
}

impl ToneSource {
    pub fn new(frequency: f32, sample_rate: u32, window_size: usize) -> Self {
        Self {
            frequency,
            amplitude: 0.25,
            sample_rate,
            window_size,
        }
    }

    /// The window ending `at`, phase-continuous with every other call.
    pub fn block_at(&self, at: Duration) -> Result<Option<AudioBlock>> {
        let end = (at.as_secs_f64() * f64::from(self.sample_rate)).round() as u64;
        let start = end.saturating_sub(self.window_size as u64);
        let step = f64::from(self.frequency) / f64::from(self.sample_rate);
        let samples = (start..start + self.window_size as u64)
            .map(|n| {
                // Reduce the phase to one cycle so long runs keep their precision.
                let phase = (n as f64 * step).fract();
                self.amplitude * (2.0 * std::f64::consts::PI * phase).sin() as f32
            })
            .collect();
        Ok(Some(AudioBlock::new(samples, self.sample_rate)?))
    }
}

/// The secondary source a singer is compared against.
#[derive(Debug, Clone)]
pub enum Reference {
    Wav(WavSource),
    Tone(ToneSource),
}

impl Reference {
    pub fn block_at(&self, at: Duration) -> Result<Option<AudioBlock>> {
        match self {
            Reference::Wav(source) => source.block_at(at),
            Reference::Tone(source) => source.block_at(at),
        }
    }
}

/// A reference as given on the command line.
#[derive(Debug, Clone, PartialEq)]
pub enum ReferenceSpec {
    Wav(PathBuf),
    Note(NoteResult),
}

impl ReferenceSpec {
    /// Opens the reference. A note becomes a tone at `sample_rate`; a WAV
    /// keeps its own rate and is vocal-filtered if the reference source asks
    /// for it.
    pub fn open(&self, sample_rate: u32, config: &EngineConfig) -> Result<Reference> {
        match self {
            ReferenceSpec::Wav(path) => {
                let mut source = WavSource::load(path, config.window_size)?;
                if config.reference.vocal_filter {
                    source.apply_vocal_filter(config.vocal_band);
                }
                Ok(Reference::Wav(source))
            }
            ReferenceSpec::Note(note) => {
                tracing::info!(%note, frequency = note.frequency(), "synthesizing reference tone");
                Ok(Reference::Tone(ToneSource::new(
                    note.frequency(),
                    sample_rate,
                    config.window_size,
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, channels: u16, frames: &[f32]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &sample in frames {
            writer.write_sample((sample * i16::MAX as f32) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn stereo_wav_is_mixed_down() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        // Left at +0.5, right at -0.5: the mono mix is silent.
        let frames: Vec<f32> = (0..2000).flat_map(|_| [0.5, -0.5]).collect();
        write_wav(&path, 2, &frames);

        let source = WavSource::load(&path, 256).unwrap();
        assert_eq!(source.sample_rate(), 8000);
        assert_eq!(source.duration(), Duration::from_millis(250));

        let block = source.block_at(Duration::from_millis(100)).unwrap().unwrap();
        assert_eq!(block.len(), 256);
        assert!(block.samples().iter().all(|s| s.abs() < 1e-3));
    }

    #[test]
    fn wav_blocks_exist_only_inside_the_file() {
        let source = WavSource::from_samples(vec![0.1; 1000], 1000, 256);
        assert!(source.block_at(Duration::from_millis(100)).unwrap().is_none());
        assert!(source.block_at(Duration::from_millis(256)).unwrap().is_some());
        assert!(source.block_at(Duration::from_millis(1000)).unwrap().is_some());
        assert!(source.block_at(Duration::from_millis(1001)).unwrap().is_none());
    }

    #[test]
    fn missing_wav_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(WavSource::load(&dir.path().join("absent.wav"), 256).is_err());
    }

    #[test]
    fn tone_is_phase_continuous() {
        let tone = ToneSource::new(440.0, 48_000, 64);
        let early = tone.block_at(Duration::from_millis(10)).unwrap().unwrap();
        // One sample later the window shifts left by exactly one sample.
        let later = tone
            .block_at(Duration::from_nanos(10_000_000 + 1_000_000_000 / 48_000))
            .unwrap()
            .unwrap();
        assert_eq!(early.samples()[1..], later.samples()[..63]);
    }

    #[test]
    fn note_reference_becomes_a_tone() {
        let config = EngineConfig::default();
        let spec = ReferenceSpec::Note("A4".parse().unwrap());
        let reference = spec.open(48_000, &config).unwrap();
        assert!(matches!(reference, Reference::Tone(_)));

        let block = reference.block_at(Duration::from_secs(1)).unwrap().unwrap();
        assert_eq!(block.len(), config.window_size);
        assert_eq!(block.sample_rate(), 48_000);
    }

    #[test]
    fn mic_waits_for_a_full_window() {
        let mut mic = MicSource::new(128, 48_000);
        mic.push(vec![0.0; 100]);
        assert!(mic.block().unwrap().is_none());
        mic.push(vec![0.0; 100]);
        assert_eq!(mic.block().unwrap().map(|b| b.len()), Some(128));
    }
}
