//! # Pitch Comparison
//!
//! Couples the singer and reference estimates of one frame into feedback: a
//! cents difference, a match percentage and a qualitative tier with a
//! direction hint. Both the percentage and the tier are derived in the cents
//! domain, so an octave apart never reads as a good match.

use std::fmt;

use crate::config::ComparisonSettings;
use crate::tuning::calculate_cents_deviation;

/// How close the singer is to the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchTier {
    Perfect,
    Close,
    NoMatch,
}

impl MatchTier {
    pub fn label(&self) -> &'static str {
        match self {
            MatchTier::Perfect => "perfect match",
            MatchTier::Close => "close",
            MatchTier::NoMatch => "no match",
        }
    }
}

impl fmt::Display for MatchTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which way the singer should move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Adjust {
    /// Singer is flat.
    Raise,
    /// Singer is sharp.
    Lower,
}

impl fmt::Display for Adjust {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Adjust::Raise => f.write_str("raise"),
            Adjust::Lower => f.write_str("lower"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchResult {
    /// Singer relative to reference, positive when the singer is sharp.
    pub cents: f32,
    /// 0..=100, falling linearly to zero at the configured match range.
    pub percent: f32,
    pub tier: MatchTier,
    /// `None` for a perfect match.
    pub adjust: Option<Adjust>,
}

impl MatchResult {
    /// Size of the difference in semitones.
    pub fn semitones(&self) -> f32 {
        self.cents.abs() / 100.0
    }
}

/// Outcome of comparing one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Comparison {
    /// Neither source has a pitch.
    Idle,
    /// The singer has a pitch; the reference is silent.
    WaitingForReference,
    /// The reference has a pitch; the singer is silent.
    WaitingForSinger,
    Matched(MatchResult),
}

impl Comparison {
    pub fn result(&self) -> Option<&MatchResult> {
        match self {
            Comparison::Matched(result) => Some(result),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Comparator {
    settings: ComparisonSettings,
}

impl Comparator {
    pub fn new(settings: ComparisonSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> ComparisonSettings {
        self.settings
    }

    /// Compares whatever each source produced this frame. A missing or
    /// non-positive frequency counts as no pitch.
    pub fn compare(&self, singer_hz: Option<f32>, reference_hz: Option<f32>) -> Comparison {
        let present = |f: Option<f32>| f.filter(|hz| hz.is_finite() && *hz > 0.0);
        match (present(singer_hz), present(reference_hz)) {
            (Some(singer), Some(reference)) => {
                Comparison::Matched(self.compare_frequencies(singer, reference))
            }
            (Some(_), None) => Comparison::WaitingForReference,
            (None, Some(_)) => Comparison::WaitingForSinger,
            (None, None) => Comparison::Idle,
        }
    }

    /// Compares two positive frequencies.
    pub fn compare_frequencies(&self, singer_hz: f32, reference_hz: f32) -> MatchResult {
        let cents = calculate_cents_deviation(singer_hz, reference_hz);
        let distance = cents.abs();
        let percent =
            (100.0 - distance / self.settings.match_range_cents * 100.0).clamp(0.0, 100.0);

        let tier = if distance < self.settings.perfect_cents {
            MatchTier::Perfect
        } else if distance < self.settings.close_cents {
            MatchTier::Close
        } else {
            MatchTier::NoMatch
        };

        let adjust = match tier {
            MatchTier::Perfect => None,
            _ if cents > 0.0 => Some(Adjust::Lower),
            _ => Some(Adjust::Raise),
        };

        MatchResult {
            cents,
            percent,
            tier,
            adjust,
        }
    }
}
