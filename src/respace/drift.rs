#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriftZone {
    /// `|drift| < bound`, only zero-sum reallocation
    Within,
    /// Output is ahead of the input, copies have to be removed
    Over,
    /// Output is behind the input, copies have to be added
    Under,
}

/// Tracks how far the written frames are from the input position of the window head.
///
/// The value is recomputed once per `period` cycles, corrections shift the cached value in between.
#[derive(Debug, Clone)]
pub struct DriftTracker {
    drift: i64,
    period: usize,
    countdown: usize,
}

impl DriftTracker {
    pub fn new(period: usize) -> Self {
        Self { drift: 0, period: period.max(1), countdown: 0 }
    }

    pub fn drift(&self) -> i64 {
        self.drift
    }

    /// Counts one cycle, recomputing the drift on the first cycle and every `period` after.
    /// Returns true if the drift was recomputed.
    pub fn tick(&mut self, frames_written: usize, head_source_index: usize) -> bool {
        self.countdown = self.countdown.saturating_sub(1);
        if self.countdown > 0 {
            return false;
        }
        self.drift = frames_written as i64 - head_source_index as i64;
        self.countdown = self.period;
        true
    }

    pub fn zone(&self, bound: usize) -> DriftZone {
        let bound = bound as i64;
        if self.drift.abs() < bound {
            DriftZone::Within
        } else if self.drift >= bound {
            DriftZone::Over
        } else {
            DriftZone::Under
        }
    }

    pub(crate) fn shift(&mut self, delta: i64) {
        self.drift += delta;
    }
}
