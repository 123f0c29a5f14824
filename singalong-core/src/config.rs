//! # Engine Configuration
//!
//! Process-wide settings for the analysis pipeline: window size, thresholds,
//! the vocal band and per-source detection chains. None of the numbers here
//! are universal; they are starting points meant to be tuned per deployment
//! and per input device.
//!
//! Configurations round-trip through pretty-printed JSON so a calibrated
//! setup can be saved and reloaded.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};
use crate::pitch::{Algorithm, DEFAULT_AUTOCORRELATION_THRESHOLD, DEFAULT_YIN_THRESHOLD};

pub const DEFAULT_WINDOW_SIZE: usize = 4096;
pub const MIN_WINDOW_SIZE: usize = 256;
pub const MAX_WINDOW_SIZE: usize = 32768;

/// Estimates outside this range are discarded rather than reported.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyRange {
    pub min_hz: f32,
    pub max_hz: f32,
}

impl Default for FrequencyRange {
    fn default() -> Self {
        Self {
            min_hz: 60.0,
            max_hz: 2000.0,
        }
    }
}

impl FrequencyRange {
    pub fn contains(&self, frequency: f32) -> bool {
        frequency >= self.min_hz && frequency <= self.max_hz
    }
}

/// Low/high edges of the band where a singing voice's fundamental lives.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VocalBand {
    pub low_hz: f32,
    pub high_hz: f32,
}

impl Default for VocalBand {
    fn default() -> Self {
        VocalPreset::Default.band()
    }
}

/// Band presets for common kinds of accompaniment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VocalPreset {
    Default,
    /// Cuts bass guitar and kick drum.
    RockPop,
    /// Wider band for sparse acoustic arrangements.
    Ballad,
    /// Low voices over a beat.
    HipHop,
    /// Cuts synth bass.
    Electronic,
}

impl VocalPreset {
    pub const ALL: [VocalPreset; 5] = [
        VocalPreset::Default,
        VocalPreset::RockPop,
        VocalPreset::Ballad,
        VocalPreset::HipHop,
        VocalPreset::Electronic,
    ];

    pub fn band(&self) -> VocalBand {
        let (low_hz, high_hz) = match self {
            VocalPreset::Default => (80.0, 1000.0),
            VocalPreset::RockPop => (100.0, 800.0),
            VocalPreset::Ballad => (80.0, 1200.0),
            VocalPreset::HipHop => (60.0, 600.0),
            VocalPreset::Electronic => (150.0, 1000.0),
        };
        VocalBand { low_hz, high_hz }
    }

    pub fn name(&self) -> &'static str {
        match self {
            VocalPreset::Default => "default",
            VocalPreset::RockPop => "rock_pop",
            VocalPreset::Ballad => "ballad",
            VocalPreset::HipHop => "hip_hop",
            VocalPreset::Electronic => "electronic",
        }
    }
}

impl std::str::FromStr for VocalPreset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.to_ascii_lowercase().replace('-', "_");
        VocalPreset::ALL
            .into_iter()
            .find(|preset| preset.name() == name)
            .ok_or_else(|| Error::InvalidConfig(format!("unknown vocal preset `{s}`")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct YinSettings {
    pub threshold: f32,
}

impl Default for YinSettings {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_YIN_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutocorrelationSettings {
    pub threshold: f32,
}

impl Default for AutocorrelationSettings {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_AUTOCORRELATION_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectralSettings {
    /// Peaks at or below this level are ignored. Sits under the spectrum of
    /// a sine at the quietest default gate.
    pub floor_db: f32,
    /// Half-width of the moving average that locates the loudest region.
    pub smoothing_radius: usize,
}

impl Default for SpectralSettings {
    fn default() -> Self {
        Self {
            floor_db: -90.0,
            smoothing_radius: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparisonSettings {
    /// Below this many cents apart the two voices count as a perfect match.
    pub perfect_cents: f32,
    /// Below this many cents apart they count as close.
    pub close_cents: f32,
    /// Cents difference at which the match percentage reaches zero.
    pub match_range_cents: f32,
}

impl Default for ComparisonSettings {
    fn default() -> Self {
        Self {
            perfect_cents: 10.0,
            close_cents: 30.0,
            match_range_cents: 100.0,
        }
    }
}

/// Per-source gate and detection chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// RMS below which a block counts as silence.
    pub gate_threshold: f32,
    /// Algorithms tried in order until one yields an in-range estimate.
    pub algorithms: Vec<Algorithm>,
    /// Run the stream through the vocal filter before analysis.
    #[serde(default)]
    pub vocal_filter: bool,
}

impl SourceConfig {
    /// Defaults for a microphone in an ordinary room.
    pub fn singer() -> Self {
        Self {
            gate_threshold: 0.008,
            algorithms: vec![Algorithm::Yin, Algorithm::Autocorrelation],
            vocal_filter: false,
        }
    }

    /// Defaults for clean media audio, which may carry accompaniment.
    pub fn reference() -> Self {
        Self {
            gate_threshold: 0.0005,
            algorithms: vec![
                Algorithm::Yin,
                Algorithm::Autocorrelation,
                Algorithm::Spectral,
            ],
            vocal_filter: false,
        }
    }
}

/// A source as written in a config file; absent fields keep the defaults
/// of whichever source it overrides.
#[derive(Debug, Deserialize)]
struct SourceOverrides {
    gate_threshold: Option<f32>,
    algorithms: Option<Vec<Algorithm>>,
    vocal_filter: Option<bool>,
}

impl SourceOverrides {
    fn apply(self, defaults: SourceConfig) -> SourceConfig {
        SourceConfig {
            gate_threshold: self.gate_threshold.unwrap_or(defaults.gate_threshold),
            algorithms: self.algorithms.unwrap_or(defaults.algorithms),
            vocal_filter: self.vocal_filter.unwrap_or(defaults.vocal_filter),
        }
    }
}

fn singer_overrides<'de, D>(deserializer: D) -> std::result::Result<SourceConfig, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(SourceOverrides::deserialize(deserializer)?.apply(SourceConfig::singer()))
}

fn reference_overrides<'de, D>(deserializer: D) -> std::result::Result<SourceConfig, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(SourceOverrides::deserialize(deserializer)?.apply(SourceConfig::reference()))
}

/// Complete configuration for the analysis engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Samples per analysis block.
    pub window_size: usize,
    pub frequency_range: FrequencyRange,
    pub yin: YinSettings,
    pub autocorrelation: AutocorrelationSettings,
    pub spectral: SpectralSettings,
    pub vocal_band: VocalBand,
    #[serde(deserialize_with = "singer_overrides")]
    pub singer: SourceConfig,
    #[serde(deserialize_with = "reference_overrides")]
    pub reference: SourceConfig,
    pub comparison: ComparisonSettings,
    /// Points kept by the rolling pitch timeline.
    pub timeline_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            frequency_range: FrequencyRange::default(),
            yin: YinSettings::default(),
            autocorrelation: AutocorrelationSettings::default(),
            spectral: SpectralSettings::default(),
            vocal_band: VocalBand::default(),
            singer: SourceConfig::singer(),
            reference: SourceConfig::reference(),
            comparison: ComparisonSettings::default(),
            timeline_capacity: 200,
        }
    }
}

impl EngineConfig {
    /// Replaces both detection chains with a single algorithm.
    pub fn force_algorithm(&mut self, algorithm: Algorithm) {
        self.singer.algorithms = vec![algorithm];
        self.reference.algorithms = vec![algorithm];
    }

    pub fn validate(&self) -> Result<()> {
        if !self.window_size.is_power_of_two()
            || !(MIN_WINDOW_SIZE..=MAX_WINDOW_SIZE).contains(&self.window_size)
        {
            return Err(Error::InvalidWindowSize(self.window_size));
        }

        let range = self.frequency_range;
        if !(range.min_hz > 0.0 && range.min_hz < range.max_hz) {
            return Err(invalid(format!(
                "frequency range {}..{} Hz is empty",
                range.min_hz, range.max_hz
            )));
        }

        let band = self.vocal_band;
        if !(band.low_hz > 0.0 && band.low_hz < band.high_hz) {
            return Err(invalid(format!(
                "vocal band {}..{} Hz is empty",
                band.low_hz, band.high_hz
            )));
        }

        for (name, threshold) in [
            ("yin", self.yin.threshold),
            ("autocorrelation", self.autocorrelation.threshold),
        ] {
            if !(threshold > 0.0 && threshold < 1.0) {
                return Err(invalid(format!(
                    "{name} threshold {threshold} must lie strictly between 0 and 1"
                )));
            }
        }

        for (name, source) in [("singer", &self.singer), ("reference", &self.reference)] {
            if source.algorithms.is_empty() {
                return Err(invalid(format!("{name} has no detection algorithms")));
            }
            if !(source.gate_threshold >= 0.0 && source.gate_threshold.is_finite()) {
                return Err(invalid(format!(
                    "{name} gate threshold {} must be a non-negative number",
                    source.gate_threshold
                )));
            }
        }

        let comparison = self.comparison;
        if !(comparison.perfect_cents > 0.0
            && comparison.perfect_cents <= comparison.close_cents
            && comparison.match_range_cents > 0.0)
        {
            return Err(invalid(
                "comparison tiers must satisfy 0 < perfect <= close and a positive match range"
                    .to_string(),
            ));
        }

        if self.timeline_capacity == 0 {
            return Err(invalid("timeline capacity must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Loads and validates a configuration from a JSON file. Missing fields
    /// take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut data = String::new();
        file.read_to_string(&mut data)?;
        let config: EngineConfig = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Saves the configuration to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json_string = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json_string.as_bytes())?;
        Ok(())
    }
}

fn invalid(message: String) -> Error {
    Error::InvalidConfig(message)
}
