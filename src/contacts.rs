//! Tick-level contact bookkeeping
//!
//! The world reports which shape pairs touch after each step; gameplay
//! callbacks want transitions. The tracker diffs the touching set
//! against the previous tick: a pair's first touching tick produces a
//! begin, every touching tick (the first included) produces a during,
//! and the first tick after separation produces an end.

use std::collections::BTreeSet;

use crate::physics::PairKey;

/// Contact transitions for one tick, in stable pair order.
#[derive(Debug, Default)]
pub struct ContactDiff {
    pub began: Vec<PairKey>,
    pub during: Vec<PairKey>,
    pub ended: Vec<PairKey>,
}

/// Diffs touching shape pairs across ticks.
#[derive(Debug, Default)]
pub struct ContactTracker {
    touching: BTreeSet<PairKey>,
}

impl ContactTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Absorb this tick's touching set and report transitions.
    pub fn update(&mut self, current: BTreeSet<PairKey>) -> ContactDiff {
        let began = current.difference(&self.touching).copied().collect();
        let ended = self.touching.difference(&current).copied().collect();
        let during = current.iter().copied().collect();
        self.touching = current;
        ContactDiff {
            began,
            during,
            ended,
        }
    }

    pub fn is_touching(&self, key: &PairKey) -> bool {
        self.touching.contains(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::BodyHandle;

    fn key(a: u32, b: u32) -> PairKey {
        (BodyHandle(a), 0, BodyHandle(b), 0)
    }

    #[test]
    fn test_begin_during_end_counts_over_overlap_window() {
        let mut tracker = ContactTracker::new();
        let pair = key(0, 1);

        let mut begins = 0;
        let mut durings = 0;
        let mut ends = 0;
        // Touching on ticks 3..=7 of a 10 tick run
        for tick in 0..10 {
            let mut current = BTreeSet::new();
            if (3..=7).contains(&tick) {
                current.insert(pair);
            }
            let diff = tracker.update(current);
            begins += diff.began.len();
            durings += diff.during.len();
            ends += diff.ended.len();
        }
        assert_eq!(begins, 1);
        assert_eq!(durings, 5);
        assert_eq!(ends, 1);
    }

    #[test]
    fn test_retouch_reports_new_begin() {
        let mut tracker = ContactTracker::new();
        let pair = key(0, 1);
        tracker.update(BTreeSet::from([pair]));
        tracker.update(BTreeSet::new());
        let diff = tracker.update(BTreeSet::from([pair]));
        assert_eq!(diff.began, vec![pair]);
    }

    #[test]
    fn test_vanished_pair_reports_end() {
        let mut tracker = ContactTracker::new();
        let pair = key(0, 1);
        let other = key(2, 3);
        tracker.update(BTreeSet::from([pair, other]));
        // The pair's body was removed from the world outright
        let diff = tracker.update(BTreeSet::from([other]));
        assert_eq!(diff.ended, vec![pair]);
        assert!(tracker.is_touching(&other));
    }
}
