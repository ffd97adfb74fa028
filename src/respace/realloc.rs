use std::collections::VecDeque;
use crate::respace::drift::{DriftTracker, DriftZone};
use crate::respace::window::{Representative, Window};

/// Copies moved by one adjustment pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adjustment {
    pub zone: DriftZone,
    /// Moved between representatives, the total stays the same
    pub donated: usize,
    /// Removed to pull the output back towards the input
    pub trimmed: usize,
    /// Added to catch the output up with the input
    pub padded: usize,
}

/// Redistributes how often the buffered representatives get written
#[derive(Debug, Clone)]
pub struct Reallocator {
    duplicate_count: usize,
    adjustment_bound: usize,
}

impl Reallocator {
    pub fn new(duplicate_count: usize, adjustment_bound: usize) -> Self {
        Self {
            duplicate_count: duplicate_count.max(1),
            adjustment_bound: adjustment_bound.max(1),
        }
    }

    /// Runs the correction matching the current drift. Called once per cycle before the head is written.
    pub fn adjust<F>(&self, window: &mut Window<F>, drift: &mut DriftTracker) -> Adjustment {
        let zone = drift.zone(self.adjustment_bound);
        let mut adjustment = Adjustment { zone, donated: 0, trimmed: 0, padded: 0 };
        match zone {
            DriftZone::Within => adjustment.donated = self.rebalance(window),
            DriftZone::Over => adjustment.trimmed = self.trim(window, drift),
            DriftZone::Under => adjustment.padded = self.pad(window, drift),
        }
        adjustment
    }

    /// Tops up the middle representative with copies taken from its peers.
    ///
    /// Peers above the duplicate target give first, then peers that were less distinct when detected.
    /// Donors are searched tail to head, never taking a peer below one copy.
    pub fn rebalance<F>(&self, window: &mut Window<F>) -> usize {
        let entries = window.entries_mut();
        let target = entries.len() / 2;
        let mut moved = 0;
        while entries.get(target).is_some_and(|r| r.count < self.duplicate_count) {
            let Some(donor) = self.find_donor(entries, target) else { break };
            entries[donor].count -= 1;
            entries[target].count += 1;
            moved += 1;
        }
        moved
    }

    fn find_donor<F>(&self, entries: &VecDeque<Representative<F>>, target: usize) -> Option<usize> {
        let priority = entries[target].priority;
        let peers = || (0..entries.len()).rev().filter(move |&i| i != target);
        peers()
            .find(|&i| entries[i].count > self.duplicate_count)
            .or_else(|| peers().find(|&i| entries[i].priority < priority && entries[i].count > 1))
    }

    /// Removes surplus copies head to tail until the drift is back under the bound
    pub fn trim<F>(&self, window: &mut Window<F>, drift: &mut DriftTracker) -> usize {
        let bound = self.adjustment_bound as i64;
        let mut trimmed = 0;
        for representative in window.entries_mut().iter_mut() {
            if drift.drift() < bound {
                break;
            }
            while representative.count > self.duplicate_count && drift.drift() >= bound {
                representative.count -= 1;
                drift.shift(-1);
                trimmed += 1;
            }
        }
        trimmed
    }

    /// Adds copies to representatives below the target, head to tail, until the drift is back under the bound
    pub fn pad<F>(&self, window: &mut Window<F>, drift: &mut DriftTracker) -> usize {
        let bound = self.adjustment_bound as i64;
        let mut padded = 0;
        for representative in window.entries_mut().iter_mut() {
            if drift.drift().abs() < bound {
                break;
            }
            while representative.count < self.duplicate_count && drift.drift().abs() >= bound {
                representative.count += 1;
                drift.shift(1);
                padded += 1;
            }
        }
        padded
    }
}
