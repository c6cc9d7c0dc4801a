//! Frame to frame keypoint matching along predicted epipolar bands.
//!
//! Frame1 keypoints are indexed by row so that each frame0 keypoint is only
//! compared with the keypoints near its predicted row. Matches are exclusive:
//! a frame1 keypoint is held by at most one frame0 keypoint, and a better
//! scoring keypoint may take it over, after which the loser is retried from
//! the candidates it was already scored against.

pub mod builder;
pub mod camera;
pub mod candidates;
pub mod config;
pub mod error;
pub mod matcher;
pub mod row_index;
pub mod types;

pub use builder::MatcherBuilder;
pub use camera::{PinholeCamera, PredictedPositions, Rotation, RotationPredictor, StereoGeometry, IDENTITY_ROTATION};
pub use candidates::{Candidate, CandidateTracker};
pub use config::MatcherConfig;
pub use error::{ContractViolation, MatchError, MatchResult};
pub use matcher::{matching_score, ratio_test, StereoMatcher};
pub use row_index::{RowIndex, SortedKeypoint};
pub use types::{ClaimOutcome, MatchingStats, StereoMatch};

pub use stereo_core::{hamming_distance, Descriptor, FrameError, Keypoint, KeypointFrame, VisualFrame};
