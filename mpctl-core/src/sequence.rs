//! Inbound sequence tracking
//!
//! Counts lost frames by comparing each received sequence number with the
//! expected one. Tracking is purely informational: every frame ahead of the
//! expected number is accepted, only frames from behind it are dropped.

use tracing::{debug, warn};

use crate::constants::SEQUENCE_JUMP_THRESHOLD;

/// Largest forward distance still treated as "ahead" in 16-bit serial arithmetic
const FORWARD_WINDOW: u16 = 0x7FFF;

/// Result of observing one sequence number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// Exactly the expected number
    InOrder,

    /// Ahead by at most the jump threshold
    Gap { missing: u16 },

    /// Ahead by more than the jump threshold
    Jump { missing: u16 },

    /// Behind the expected number; the frame is skipped
    Stale { behind: u16 },
}

impl Observation {
    /// Whether the frame should still be delivered
    pub fn is_accepted(&self) -> bool {
        !matches!(self, Self::Stale { .. })
    }
}

/// Sequence state for one inbound stream
#[derive(Debug, Clone)]
pub struct SequenceTracker {
    expected_next: u16,
    missing_count: u32,
    jump_threshold: u16,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::with_jump_threshold(SEQUENCE_JUMP_THRESHOLD)
    }

    pub fn with_jump_threshold(jump_threshold: u16) -> Self {
        Self {
            expected_next: 0,
            missing_count: 0,
            jump_threshold,
        }
    }

    /// Next sequence number expected from the remote side
    pub fn expected_next(&self) -> u16 {
        self.expected_next
    }

    /// Cumulative number of frames detected as lost
    pub fn missing_count(&self) -> u32 {
        self.missing_count
    }

    pub fn jump_threshold(&self) -> u16 {
        self.jump_threshold
    }

    /// Record a received sequence number
    pub fn observe(&mut self, seq: u16) -> Observation {
        let diff = seq.wrapping_sub(self.expected_next);

        if diff == 0 {
            self.expected_next = self.expected_next.wrapping_add(1);
            return Observation::InOrder;
        }

        if diff > FORWARD_WINDOW {
            let behind = self.expected_next.wrapping_sub(seq);
            debug!(seq, expected = self.expected_next, behind, "Stale sequence number");
            return Observation::Stale { behind };
        }

        self.missing_count = self.missing_count.saturating_add(diff as u32);
        let expected = self.expected_next;
        self.expected_next = seq.wrapping_add(1);

        if diff <= self.jump_threshold {
            debug!(seq, expected, missing = diff, "Sequence gap");
            Observation::Gap { missing: diff }
        } else {
            warn!(seq, expected, missing = diff, "Large sequence jump");
            Observation::Jump { missing: diff }
        }
    }

    /// Restart expectations at sequence 0
    ///
    /// The lost-frame counter is cumulative and survives a reset.
    pub fn reset(&mut self) {
        debug!(previous = self.expected_next, "Resetting expected sequence number");
        self.expected_next = 0;
    }

    /// Start expecting an arbitrary sequence number (used in testing)
    #[cfg(test)]
    pub(crate) fn expecting(expected_next: u16) -> Self {
        Self {
            expected_next,
            ..Self::new()
        }
    }
}

impl Default for SequenceTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_in_order() {
        let mut tracker = SequenceTracker::new();

        for seq in 0..10 {
            assert_eq!(tracker.observe(seq), Observation::InOrder);
        }

        assert_eq!(tracker.expected_next(), 10);
        assert_eq!(tracker.missing_count(), 0);
    }

    #[test]
    fn test_small_gap() {
        let mut tracker = SequenceTracker::new();

        tracker.observe(0);
        tracker.observe(1);
        tracker.observe(2);
        let observation = tracker.observe(5);

        assert_eq!(observation, Observation::Gap { missing: 2 });
        assert!(observation.is_accepted());
        assert_eq!(tracker.missing_count(), 2);
        assert_eq!(tracker.expected_next(), 6);
    }

    #[test]
    fn test_large_jump_counted_like_gap() {
        let mut tracker = SequenceTracker::new();

        let observation = tracker.observe(100);

        assert_eq!(observation, Observation::Jump { missing: 100 });
        assert!(observation.is_accepted());
        assert_eq!(tracker.missing_count(), 100);
        assert_eq!(tracker.expected_next(), 101);
    }

    #[test]
    fn test_threshold_boundary() {
        let mut tracker = SequenceTracker::new();
        assert_eq!(tracker.observe(3), Observation::Gap { missing: 3 });
        assert_eq!(tracker.observe(8), Observation::Jump { missing: 4 });
    }

    #[test]
    fn test_stale_is_rejected() {
        let mut tracker = SequenceTracker::new();
        for seq in 0..5 {
            tracker.observe(seq);
        }

        let observation = tracker.observe(2);

        assert_eq!(observation, Observation::Stale { behind: 3 });
        assert!(!observation.is_accepted());
        assert_eq!(tracker.expected_next(), 5);
        assert_eq!(tracker.missing_count(), 0);
    }

    #[test]
    fn test_wraparound_is_in_order() {
        let mut tracker = SequenceTracker::expecting(65534);
        assert_eq!(tracker.observe(65534), Observation::InOrder);

        assert_eq!(tracker.observe(65535), Observation::InOrder);
        assert_eq!(tracker.observe(0), Observation::InOrder);
        assert_eq!(tracker.expected_next(), 1);
    }

    #[test]
    fn test_gap_across_wraparound() {
        let mut tracker = SequenceTracker::expecting(65535);

        assert_eq!(tracker.observe(1), Observation::Gap { missing: 2 });
        assert_eq!(tracker.expected_next(), 2);
    }

    #[test]
    fn test_one_behind_is_stale() {
        let mut tracker = SequenceTracker::expecting(65535);
        assert_eq!(tracker.observe(65534), Observation::Stale { behind: 1 });
    }

    #[test]
    fn test_reset_keeps_missing_count() {
        let mut tracker = SequenceTracker::new();
        tracker.observe(10);

        tracker.reset();

        assert_eq!(tracker.expected_next(), 0);
        assert_eq!(tracker.missing_count(), 10);
        assert_eq!(tracker.observe(0), Observation::InOrder);
    }
}
