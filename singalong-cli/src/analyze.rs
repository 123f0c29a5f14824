//! Offline analysis of a recording, frame by frame at the live frame rate.

use std::io::Write;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::Serialize;
use singalong_core::{Comparison, EngineConfig, Monitor};

use crate::render;
use crate::sources::{Reference, WavSource};

/// Frames analysed per second of audio.
const FRAMES_PER_SECOND: u32 = 60;

/// Totals over a whole recording.
///
/// Cents are measured against the reference when one is given, otherwise
/// against the nearest equal-tempered note.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub frames: usize,
    pub voiced_frames: usize,
    pub compared_frames: usize,
    pub perfect_frames: usize,
    pub mean_abs_cents: Option<f32>,
    pub perfect_share: Option<f32>,
}

/// Runs every frame of `singer` through a monitor, writing one status line
/// per frame to `out` unless `quiet`.
pub fn analyze(
    config: &EngineConfig,
    singer: &WavSource,
    reference: Option<&Reference>,
    quiet: bool,
    out: &mut impl Write,
) -> Result<Summary> {
    let mut monitor = Monitor::new(config)?;
    let sample_rate = singer.sample_rate();
    let hop = (sample_rate / FRAMES_PER_SECOND).max(1) as usize;

    let start = Instant::now();
    monitor.start(start);

    let mut summary = Summary::default();
    let mut cents_total = 0.0_f32;
    let mut position = config.window_size;

    while position <= singer.len() {
        let at = Duration::from_secs_f64(position as f64 / f64::from(sample_rate));
        position += hop;

        let singer_block = singer.block_at(at)?;
        let reference_block = match reference {
            Some(source) => source.block_at(at)?,
            None => None,
        };
        let Some(report) = monitor
            .frame(singer_block.as_ref(), reference_block.as_ref(), start + at)
            .with_context(|| format!("frame at {:.3}s", at.as_secs_f64()))?
        else {
            break;
        };

        summary.frames += 1;
        let singer_note = report.singer.and_then(|frame| frame.note);
        if singer_note.is_some() {
            summary.voiced_frames += 1;
        }

        let cents = match (&report.comparison, reference) {
            (Comparison::Matched(result), _) => Some(result.cents),
            (_, None) => singer_note.map(|note| note.cents as f32),
            _ => None,
        };
        if let Some(cents) = cents {
            summary.compared_frames += 1;
            cents_total += cents.abs();
            if cents.abs() < config.comparison.perfect_cents {
                summary.perfect_frames += 1;
            }
        }

        if !quiet {
            writeln!(out, "{}", render::status_line(&report))?;
        }
    }
    monitor.stop();

    if summary.compared_frames > 0 {
        let compared = summary.compared_frames as f32;
        summary.mean_abs_cents = Some(cents_total / compared);
        summary.perfect_share = Some(summary.perfect_frames as f32 / compared);
    }
    tracing::info!(
        frames = summary.frames,
        voiced = summary.voiced_frames,
        "analysis finished"
    );
    Ok(summary)
}

/// Human-readable summary.
pub fn summary_text(summary: &Summary) -> String {
    let mut text = format!(
        "frames: {}  voiced: {}  compared: {}",
        summary.frames, summary.voiced_frames, summary.compared_frames
    );
    if let (Some(mean), Some(share)) = (summary.mean_abs_cents, summary.perfect_share) {
        text.push_str(&format!(
            "  mean |cents|: {:.1}  perfect: {:.0}%",
            mean,
            share * 100.0
        ));
    }
    text
}
