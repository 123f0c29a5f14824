//! # Musical Tuning Module
//!
//! This module maps frequencies to equal-tempered notes and back.
//! It handles note name conversions, frequency calculations, and cent
//! deviation measurements referenced to A4 = 440 Hz.
//!
//! ## Features
//! - Frequency to note name, octave and signed cents (sharp positive)
//! - Note name parsing with sharps or flats ("A4", "C#3", "Bb2", "B-1")
//! - Equal temperament frequency calculations
//! - Cent difference between two frequencies

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Concert pitch reference.
pub const A4_HZ: f64 = 440.0;

/// C0, 4.75 octaves below A4. Every note number counts semitones up from here.
static C0_HZ: Lazy<f64> = Lazy::new(|| A4_HZ * 2.0_f64.powf(-4.75));

/// One of the twelve chromatic pitch classes, starting at C.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PitchClass {
    C,
    CSharp,
    D,
    DSharp,
    E,
    F,
    FSharp,
    G,
    GSharp,
    A,
    ASharp,
    B,
}

impl PitchClass {
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::CSharp,
        PitchClass::D,
        PitchClass::DSharp,
        PitchClass::E,
        PitchClass::F,
        PitchClass::FSharp,
        PitchClass::G,
        PitchClass::GSharp,
        PitchClass::A,
        PitchClass::ASharp,
        PitchClass::B,
    ];

    /// Position in the chromatic scale, C = 0.
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Wraps any semitone count onto a pitch class; negative values count
    /// down from C.
    pub fn from_semitone(semitone: i32) -> Self {
        Self::ALL[semitone.rem_euclid(12) as usize]
    }

    /// Sharp-spelled name, e.g. "C#".
    pub fn name(&self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::CSharp => "C#",
            PitchClass::D => "D",
            PitchClass::DSharp => "D#",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::FSharp => "F#",
            PitchClass::G => "G",
            PitchClass::GSharp => "G#",
            PitchClass::A => "A",
            PitchClass::ASharp => "A#",
            PitchClass::B => "B",
        }
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Accepted spellings of each pitch class, sharps and flats.
static PITCH_CLASS_NAMES: Lazy<BTreeMap<&'static str, PitchClass>> = Lazy::new(|| {
    let flats = [
        ("Db", PitchClass::CSharp),
        ("Eb", PitchClass::DSharp),
        ("Gb", PitchClass::FSharp),
        ("Ab", PitchClass::GSharp),
        ("Bb", PitchClass::ASharp),
    ];
    PitchClass::ALL
        .iter()
        .map(|pc| (pc.name(), *pc))
        .chain(flats)
        .collect()
});

/// The nearest equal-tempered note to a frequency and how far off it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NoteResult {
    pub pitch_class: PitchClass,
    pub octave: i32,
    /// Deviation from the note in cents, roughly -50..=50. Positive is sharp.
    pub cents: i32,
}

impl NoteResult {
    pub fn name(&self) -> &'static str {
        self.pitch_class.name()
    }

    /// Semitones above C0.
    pub fn semitone(&self) -> i32 {
        self.octave * 12 + self.pitch_class.index() as i32
    }

    /// Exact equal-tempered frequency of the note, ignoring `cents`.
    pub fn frequency(&self) -> f32 {
        note_frequency(self.pitch_class, self.octave)
    }
}

impl fmt::Display for NoteResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.pitch_class, self.octave)
    }
}

impl FromStr for NoteResult {
    type Err = Error;

    /// Parses a note name such as "A4", "C#3", "Bb2" or "B-1" (cents = 0).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let split = trimmed
            .find(|c: char| c == '-' || c.is_ascii_digit())
            .ok_or_else(|| Error::UnknownNote(s.to_string()))?;
        let (name, octave) = trimmed.split_at(split);

        let mut letters = name.chars();
        let normalized: String = letters
            .next()
            .map(|first| first.to_ascii_uppercase())
            .into_iter()
            .chain(letters)
            .collect();

        let pitch_class = PITCH_CLASS_NAMES
            .get(normalized.as_str())
            .copied()
            .ok_or_else(|| Error::UnknownNote(s.to_string()))?;
        let octave = octave
            .parse::<i32>()
            .map_err(|_| Error::UnknownNote(s.to_string()))?;

        Ok(NoteResult {
            pitch_class,
            octave,
            cents: 0,
        })
    }
}

/// Maps a frequency to its nearest note.
///
/// # Returns
/// * `Some(note)` - Nearest note and signed cents deviation
/// * `None` - The frequency is zero, negative or not finite
pub fn frequency_to_note(frequency: f32) -> Option<NoteResult> {
    if !(frequency.is_finite() && frequency > 0.0) {
        return None;
    }
    let half_steps = 12.0 * (frequency as f64 / *C0_HZ).log2();
    let nearest = half_steps.round();
    let semitone = nearest as i32;

    Some(NoteResult {
        pitch_class: PitchClass::from_semitone(semitone),
        octave: semitone.div_euclid(12),
        cents: ((half_steps - nearest) * 100.0).round() as i32,
    })
}

/// Equal-tempered frequency of a note.
pub fn note_frequency(pitch_class: PitchClass, octave: i32) -> f32 {
    let semitone = octave * 12 + pitch_class.index() as i32;
    (*C0_HZ * 2.0_f64.powf(semitone as f64 / 12.0)) as f32
}

/// Calculates the deviation of `freq` from `target_freq` in cents.
///
/// - 100 cents = 1 semitone
/// - 1200 cents = 1 octave
/// - Positive values indicate sharpness, negative values indicate flatness
pub fn calculate_cents_deviation(freq: f32, target_freq: f32) -> f32 {
    (1200.0 * (freq as f64 / target_freq as f64).log2()) as f32
}
