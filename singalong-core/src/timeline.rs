//! Rolling history of recent pitch pairs, for scrolling pitch plots.

use std::collections::VecDeque;
use std::time::Duration;

/// Lowest frequency on the plot axis (C2).
pub const AXIS_LOW_HZ: f32 = 65.41;
/// Highest frequency on the plot axis (B6).
pub const AXIS_HIGH_HZ: f32 = 1975.53;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimelinePoint {
    /// Time since monitoring started.
    pub at: Duration,
    pub singer_hz: Option<f32>,
    pub reference_hz: Option<f32>,
}

/// Bounded FIFO of timeline points. The oldest point is dropped once full.
#[derive(Debug, Clone)]
pub struct PitchTimeline {
    points: VecDeque<TimelinePoint>,
    capacity: usize,
}

impl PitchTimeline {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a point if at least one side has a pitch. Returns whether a
    /// point was recorded.
    pub fn push(&mut self, at: Duration, singer_hz: Option<f32>, reference_hz: Option<f32>) -> bool {
        if singer_hz.is_none() && reference_hz.is_none() {
            return false;
        }
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(TimelinePoint {
            at,
            singer_hz,
            reference_hz,
        });
        true
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Points from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &TimelinePoint> {
        self.points.iter()
    }

    pub fn latest(&self) -> Option<&TimelinePoint> {
        self.points.back()
    }
}

/// Position of `frequency` on a log2 axis from C2 (0.0) to B6 (1.0), clamped.
/// `None` for frequencies that are not positive.
pub fn log_position(frequency: f32) -> Option<f32> {
    if !(frequency.is_finite() && frequency > 0.0) {
        return None;
    }
    let span = (AXIS_HIGH_HZ / AXIS_LOW_HZ).log2();
    Some(((frequency / AXIS_LOW_HZ).log2() / span).clamp(0.0, 1.0))
}
