//! # Monitoring Session
//!
//! Wires the pipeline together for each frame:
//! gate → pitch detector → note mapper per source, then the comparator and
//! the rolling timeline across both sources.
//!
//! ## Features
//! - Independent pipeline per source, with its own threshold and algorithm chain
//! - Explicit Idle/Running state; a stopped monitor ignores frames
//! - Malformed blocks abort the frame with an error, silence never does

use std::time::{Duration, Instant};

use crate::audio::AudioBlock;
use crate::compare::{Comparator, Comparison};
use crate::config::{EngineConfig, SourceConfig, VocalBand};
use crate::error::Result;
use crate::gate::{SignalGate, SignalLevel};
use crate::pitch::{Detection, PitchDetector};
use crate::timeline::PitchTimeline;
use crate::tuning::{NoteResult, frequency_to_note};

/// What one source produced in one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceFrame {
    pub level: SignalLevel,
    /// `None` when the block was gated or no algorithm found a pitch.
    pub detection: Option<Detection>,
    pub note: Option<NoteResult>,
}

impl SourceFrame {
    pub fn frequency(&self) -> Option<f32> {
        self.detection.map(|d| d.frequency)
    }
}

/// Gate, detector and note mapping for a single input.
#[derive(Debug, Clone)]
pub struct SourcePipeline {
    gate: SignalGate,
    detector: PitchDetector,
    window_size: usize,
}

impl SourcePipeline {
    pub fn new(config: &EngineConfig, source: &SourceConfig) -> Self {
        Self {
            gate: SignalGate::new(source.gate_threshold),
            detector: PitchDetector::from_config(config, source),
            window_size: config.window_size,
        }
    }

    pub fn gate(&self) -> &SignalGate {
        &self.gate
    }

    pub fn set_gate_threshold(&mut self, threshold: f32) {
        self.gate.set_threshold(threshold);
    }

    pub fn detector(&self) -> &PitchDetector {
        &self.detector
    }

    pub fn set_band(&mut self, band: VocalBand) {
        self.detector.set_band(band);
    }

    /// Runs one block through the pipeline.
    ///
    /// # Returns
    /// * `Ok(frame)` - Level, and the pitch and note if the block carried one
    /// * `Err(Error::BlockLength)` - The block does not match the analysis window
    pub fn process(&self, block: &AudioBlock) -> Result<SourceFrame> {
        block.ensure_len(self.window_size)?;

        let level = self.gate.measure(block.samples());
        if !level.is_signal() {
            return Ok(SourceFrame {
                level,
                detection: None,
                note: None,
            });
        }

        let detection = self.detector.detect(block);
        let note = detection.and_then(|d| frequency_to_note(d.frequency));
        Ok(SourceFrame {
            level,
            detection,
            note,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Running { started: Instant },
}

/// Everything produced by one frame of a running monitor.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    /// Time since monitoring started.
    pub elapsed: Duration,
    /// `None` when the singer source supplied no block this frame.
    pub singer: Option<SourceFrame>,
    pub reference: Option<SourceFrame>,
    pub comparison: Comparison,
}

/// Drives the singer and reference pipelines frame by frame.
#[derive(Debug, Clone)]
pub struct Monitor {
    singer: SourcePipeline,
    reference: SourcePipeline,
    comparator: Comparator,
    timeline: PitchTimeline,
    state: MonitorState,
}

impl Monitor {
    /// Builds an idle monitor from a validated configuration.
    pub fn new(config: &EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            singer: SourcePipeline::new(config, &config.singer),
            reference: SourcePipeline::new(config, &config.reference),
            comparator: Comparator::new(config.comparison),
            timeline: PitchTimeline::new(config.timeline_capacity),
            state: MonitorState::Idle,
        })
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, MonitorState::Running { .. })
    }

    /// Starts (or restarts) monitoring with an empty timeline.
    pub fn start(&mut self, now: Instant) {
        self.timeline.clear();
        self.state = MonitorState::Running { started: now };
        tracing::info!("monitoring started");
    }

    /// Stops monitoring. Frames after this are ignored.
    pub fn stop(&mut self) {
        if self.is_running() {
            tracing::info!(points = self.timeline.len(), "monitoring stopped");
        }
        self.state = MonitorState::Idle;
    }

    pub fn timeline(&self) -> &PitchTimeline {
        &self.timeline
    }

    pub fn singer(&self) -> &SourcePipeline {
        &self.singer
    }

    pub fn singer_mut(&mut self) -> &mut SourcePipeline {
        &mut self.singer
    }

    pub fn reference(&self) -> &SourcePipeline {
        &self.reference
    }

    pub fn reference_mut(&mut self) -> &mut SourcePipeline {
        &mut self.reference
    }

    /// Moves the spectral search band on both sources.
    pub fn set_band(&mut self, band: VocalBand) {
        self.singer.set_band(band);
        self.reference.set_band(band);
    }

    /// Processes one frame.
    ///
    /// Each source that supplied a block runs through its own pipeline; the
    /// results are compared and, if either side has a pitch, appended to the
    /// timeline.
    ///
    /// # Returns
    /// * `Ok(None)` - The monitor is idle
    /// * `Ok(Some(report))` - The frame's results
    /// * `Err(_)` - A block was malformed; nothing is recorded for this frame
    pub fn frame(
        &mut self,
        singer: Option<&AudioBlock>,
        reference: Option<&AudioBlock>,
        now: Instant,
    ) -> Result<Option<FrameReport>> {
        let MonitorState::Running { started } = self.state else {
            return Ok(None);
        };
        let elapsed = now.saturating_duration_since(started);

        let singer = singer.map(|block| self.singer.process(block)).transpose()?;
        let reference = reference
            .map(|block| self.reference.process(block))
            .transpose()?;

        let singer_hz = singer.and_then(|frame| frame.frequency());
        let reference_hz = reference.and_then(|frame| frame.frequency());
        let comparison = self.comparator.compare(singer_hz, reference_hz);
        self.timeline.push(elapsed, singer_hz, reference_hz);

        tracing::debug!(
            elapsed_ms = elapsed.as_millis() as u64,
            ?singer_hz,
            ?reference_hz,
            ?comparison,
            "frame"
        );

        Ok(Some(FrameReport {
            elapsed,
            singer,
            reference,
            comparison,
        }))
    }
}
