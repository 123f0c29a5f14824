//! # Status Line
//!
//! Plain-text rendering of one frame: note, cent meter and level per source,
//! followed by the comparison.
//!
//! ## Features
//! - Cent meter spanning -50 to +50 cents with in-tune / near / off zones
//! - Level bar from the gate's meter percentage
//! - Waiting messages when only one source is pitched

use singalong_core::{Comparison, FrameReport, MatchTier, SourceFrame};

/// The meter shows deviations from -50 to +50 cents.
const METER_RANGE: f32 = 50.0;
const METER_WIDTH: usize = 21;
const LEVEL_WIDTH: usize = 10;

/// Accuracy zone of a cent deviation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeterZone {
    InTune,
    Near,
    Off,
}

impl MeterZone {
    pub fn from_cents(cents: f32) -> Self {
        if cents.abs() < 5.0 {
            MeterZone::InTune
        } else if cents.abs() < 20.0 {
            MeterZone::Near
        } else {
            MeterZone::Off
        }
    }

    fn needle(&self) -> char {
        match self {
            MeterZone::InTune => '#',
            MeterZone::Near => '+',
            MeterZone::Off => 'x',
        }
    }
}

/// A fixed-width text meter with `|` at zero and the needle at `cents`.
pub fn cent_meter(cents: Option<f32>) -> String {
    let center = METER_WIDTH / 2;
    let mut cells = vec!['-'; METER_WIDTH];
    cells[center] = '|';

    if let Some(c) = cents {
        let clamped = c.clamp(-METER_RANGE, METER_RANGE);
        let position = ((clamped + METER_RANGE) / (2.0 * METER_RANGE) * (METER_WIDTH - 1) as f32)
            .round() as usize;
        cells[position.min(METER_WIDTH - 1)] = MeterZone::from_cents(c).needle();
    }
    format!("[{}]", cells.into_iter().collect::<String>())
}

pub fn level_bar(percent: f32) -> String {
    let filled = ((percent.clamp(0.0, 100.0) / 100.0) * LEVEL_WIDTH as f32).round() as usize;
    format!("{}{}", "=".repeat(filled), " ".repeat(LEVEL_WIDTH - filled))
}

/// Note and frequency of one source, or why there is none.
pub fn source_text(frame: Option<&SourceFrame>) -> String {
    let Some(frame) = frame else {
        return "no input".to_string();
    };
    match (frame.note, frame.detection) {
        (Some(note), Some(detection)) => format!(
            "{:<4}{:+3}c {:7.1} Hz",
            note.to_string(),
            note.cents,
            detection.frequency
        ),
        _ if !frame.level.is_signal() => "silent".to_string(),
        _ => "no pitch".to_string(),
    }
}

pub fn comparison_text(comparison: &Comparison) -> String {
    match comparison {
        Comparison::Idle => "waiting for audio".to_string(),
        Comparison::WaitingForReference => "waiting for reference".to_string(),
        Comparison::WaitingForSinger => "sing to compare".to_string(),
        Comparison::Matched(result) => match (result.tier, result.adjust) {
            (MatchTier::Perfect, _) | (_, None) => {
                format!("{:3.0}% {}", result.percent, result.tier)
            }
            (tier, Some(adjust)) => format!(
                "{:3.0}% {}, {} by {:.1} semitones",
                result.percent,
                tier,
                adjust,
                result.semitones()
            ),
        },
    }
}

/// One line summarizing a frame.
pub fn status_line(report: &FrameReport) -> String {
    let singer = report.singer.as_ref();
    let cents = singer.and_then(|f| f.note).map(|n| n.cents as f32);
    let level = singer.map_or(0.0, |f| f.level.percent);
    format!(
        "{:>7.2}s  you {:<22} {} {}  ref {:<22} {}",
        report.elapsed.as_secs_f32(),
        source_text(singer),
        cent_meter(cents),
        level_bar(level),
        source_text(report.reference.as_ref()),
        comparison_text(&report.comparison),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use singalong_core::{Comparator, SignalGate};

    #[test]
    fn meter_needle_tracks_cents() {
        assert_eq!(cent_meter(None), "[----------|----------]");
        assert_eq!(cent_meter(Some(0.0)), "[----------#----------]");
        assert_eq!(cent_meter(Some(-50.0)), "[x---------|----------]");
        assert_eq!(cent_meter(Some(80.0)), "[----------|---------x]");
        assert_eq!(cent_meter(Some(10.0)), "[----------|-+--------]");
    }

    #[test]
    fn zones_follow_accuracy() {
        assert_eq!(MeterZone::from_cents(-4.9), MeterZone::InTune);
        assert_eq!(MeterZone::from_cents(12.0), MeterZone::Near);
        assert_eq!(MeterZone::from_cents(-35.0), MeterZone::Off);
    }

    #[test]
    fn level_bar_is_fixed_width() {
        assert_eq!(level_bar(0.0), "          ");
        assert_eq!(level_bar(50.0), "=====     ");
        assert_eq!(level_bar(250.0), "==========");
    }

    #[test]
    fn comparison_messages() {
        let comparator = Comparator::default();
        assert_eq!(comparison_text(&comparator.compare(None, None)), "waiting for audio");
        assert_eq!(
            comparison_text(&comparator.compare(None, Some(220.0))),
            "sing to compare"
        );
        assert_eq!(
            comparison_text(&comparator.compare(Some(440.0), Some(440.0))),
            "100% perfect match"
        );
        let flat = comparison_text(&comparator.compare(Some(415.3), Some(440.0)));
        assert!(flat.contains("raise by 1.0 semitones"), "{flat}");
    }

    #[test]
    fn silent_source_is_labelled() {
        let frame = SourceFrame {
            level: SignalGate::new(0.01).measure(&[0.0; 64]),
            detection: None,
            note: None,
        };
        assert_eq!(source_text(Some(&frame)), "silent");
        assert_eq!(source_text(None), "no input");
    }
}
