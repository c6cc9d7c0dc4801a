#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Exclusive correspondence between a keypoint of frame0 and one of frame1
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StereoMatch {
    pub frame0_index: usize,
    pub frame1_index: usize,
    /// Fraction of agreeing descriptor bits, in (0, 1]
    pub score: f64,
}

/// Result of claiming a frame1 keypoint for a frame0 keypoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    Accepted,
    /// The previous claimant lost the keypoint and became an inferior match
    Preempted(usize),
    Rejected,
}

/// Counters collected while matching one frame pair
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MatchingStats {
    pub attempted: usize,
    pub without_prediction: usize,
    pub window_escalations: usize,
    pub empty_windows: usize,
    pub ratio_test_rejections: usize,
    pub initial_matches: usize,
    pub preemptions: usize,
    pub inferior_iterations: usize,
    pub inferior_resolved: usize,
    pub final_matches: usize,
}
