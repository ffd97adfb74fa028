#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdState {
    /// Large change needed before a frame counts as new
    Strict,
    /// Less change needed for a new frame, used once the current representative has enough copies
    Relaxed,
}

/// Decides whether a frame repeats the current representative
#[derive(Debug, Clone)]
pub struct AdaptiveThreshold {
    strict: f64,
    relaxed: f64,
    state: ThresholdState,
}

impl AdaptiveThreshold {
    pub fn new(strict: f64, relaxed: f64) -> Self {
        Self { strict, relaxed, state: ThresholdState::Strict }
    }

    pub fn state(&self) -> ThresholdState {
        self.state
    }

    pub fn current(&self) -> f64 {
        match self.state {
            ThresholdState::Strict => self.strict,
            ThresholdState::Relaxed => self.relaxed,
        }
    }

    pub fn matches(&self, dissimilarity: f64) -> bool {
        dissimilarity < self.current()
    }

    /// Called after a match raised the representative's count to `count`
    pub fn on_match(&mut self, count: usize, duplicate_count: usize) {
        if count == duplicate_count {
            self.state = ThresholdState::Relaxed;
        }
    }

    /// Called on every mismatch, new representatives always start strict
    pub fn on_new_frame(&mut self) {
        self.state = ThresholdState::Strict;
    }
}
