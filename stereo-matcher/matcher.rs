use log::{debug, trace};
use rayon::prelude::*;
use stereo_core::{hamming_distance, KeypointFrame};

use crate::camera::StereoGeometry;
use crate::candidates::{Candidate, CandidateTracker};
use crate::config::MatcherConfig;
use crate::error::{MatchError, MatchResult};
use crate::row_index::RowIndex;
use crate::types::{ClaimOutcome, MatchingStats, StereoMatch};

/// Fraction of agreeing bits. Larger means a more likely true match.
#[inline]
pub fn matching_score(num_matching_bits: u32, descriptor_size_bits: u32) -> f64 {
    num_matching_bits as f64 / descriptor_size_bits as f64
}

/// Lowe's ratio test on Hamming distances. Returns true if the closest
/// candidate is distinctive enough.
///
/// A second closest distance above the descriptor size means there was no
/// second candidate, and a zero second distance cannot be divided by; both
/// pass.
pub fn ratio_test(descriptor_size_bits: u32, distance_closest: u32, distance_second_closest: u32, lowe_ratio: f64) -> bool {
    debug_assert!(distance_closest <= distance_second_closest);
    if distance_second_closest > descriptor_size_bits || distance_second_closest == 0 {
        return true;
    }
    (distance_closest as f64 / distance_second_closest as f64) < lowe_ratio
}

/// Frame to frame matcher restricting the search to a band of rows around
/// each keypoint's predicted position.
///
/// The initial pass matches every frame0 keypoint against the frame1
/// keypoints in its band, escalating the band once if it is empty. A match may
/// take a frame1 keypoint away from a weaker earlier match; the loser becomes
/// an inferior match. Inferior matches are then retried for a bounded number
/// of passes against the candidates already scored in the initial pass, with a
/// stricter threshold in place of the ratio test. The resulting matches are
/// exclusive.
#[derive(Debug, Clone)]
pub struct StereoMatcher<G> {
    geometry: G,
    config: MatcherConfig,
}

impl<G: StereoGeometry> StereoMatcher<G> {
    pub fn new(geometry: G, config: MatcherConfig) -> MatchResult<Self> {
        config.validate()?;
        let image_height = geometry.image_height();
        if image_height == 0 {
            return Err(MatchError::InvalidImageHeight(image_height));
        }
        Ok(Self { geometry, config })
    }

    pub fn with_defaults(geometry: G) -> MatchResult<Self> {
        Self::new(geometry, MatcherConfig::default())
    }

    pub fn geometry(&self) -> &G {
        &self.geometry
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Rows of the frame1 image, as reported by the geometry
    pub fn image_height(&self) -> u32 {
        self.geometry.image_height()
    }

    /// Exclusive matches between `frame0` and `frame1`, ordered by frame0 index
    pub fn match_frames<F0, F1>(&self, frame0: &F0, frame1: &F1) -> MatchResult<Vec<StereoMatch>>
    where
        F0: KeypointFrame + ?Sized,
        F1: KeypointFrame + ?Sized,
    {
        self.match_frames_with_stats(frame0, frame1).map(|(matches, _)| matches)
    }

    /// Like `match_frames`, also returning counters of the run
    pub fn match_frames_with_stats<F0, F1>(&self, frame0: &F0, frame1: &F1) -> MatchResult<(Vec<StereoMatch>, MatchingStats)>
    where
        F0: KeypointFrame + ?Sized,
        F1: KeypointFrame + ?Sized,
    {
        let frame0_bits = frame0.descriptor_size_bits();
        let frame1_bits = frame1.descriptor_size_bits();
        if frame0_bits != frame1_bits {
            return Err(MatchError::DescriptorSizeMismatch { frame0_bits, frame1_bits });
        }

        let mut run = MatchingRun {
            geometry: &self.geometry,
            config: &self.config,
            frame0,
            frame1,
            descriptor_size_bits: frame0_bits,
            index: RowIndex::build(frame1, self.geometry.image_height())?,
            tracker: CandidateTracker::new(frame0.num_keypoints(), frame1.num_keypoints()),
            stats: MatchingStats::default(),
        };

        if frame0.num_keypoints() > 0 && !run.index.is_empty() {
            for idx_k in 0..frame0.num_keypoints() {
                run.match_keypoint(idx_k)?;
            }

            for _ in 0..self.config.max_inferior_iterations {
                if run.tracker.num_inferior() == 0 {
                    break;
                }
                run.stats.inferior_iterations += 1;
                if !run.match_inferior_matches()? {
                    break;
                }
            }
        }

        let MatchingRun { tracker, mut stats, .. } = run;
        let matches = tracker.into_matches();
        stats.final_matches = matches.len();
        debug!(
            "matched {}/{} keypoints ({} initial, {} preempted, {} inferior resolved in {} passes)",
            stats.final_matches,
            frame0.num_keypoints(),
            stats.initial_matches,
            stats.preemptions,
            stats.inferior_resolved,
            stats.inferior_iterations
        );
        Ok((matches, stats))
    }

    /// Matches independent frame pairs in parallel; results keep the input order
    pub fn match_batch<F0, F1>(&self, pairs: &[(F0, F1)]) -> Vec<MatchResult<Vec<StereoMatch>>>
    where
        G: Sync,
        F0: KeypointFrame + Sync,
        F1: KeypointFrame + Sync,
    {
        pairs
            .par_iter()
            .map(|(frame0, frame1)| self.match_frames(frame0, frame1))
            .collect()
    }
}

/// Working state of a single `match_frames` call
struct MatchingRun<'a, G: ?Sized, F0: ?Sized, F1: ?Sized> {
    geometry: &'a G,
    config: &'a MatcherConfig,
    frame0: &'a F0,
    frame1: &'a F1,
    descriptor_size_bits: u32,
    index: RowIndex,
    tracker: CandidateTracker,
    stats: MatchingStats,
}

impl<G, F0, F1> MatchingRun<'_, G, F0, F1>
where
    G: StereoGeometry + ?Sized,
    F0: KeypointFrame + ?Sized,
    F1: KeypointFrame + ?Sized,
{
    /// Initial matcher: tries once to match keypoint `idx_k` of frame0, and may
    /// take the frame1 keypoint away from a weaker match
    fn match_keypoint(&mut self, idx_k: usize) -> MatchResult<()> {
        self.stats.attempted += 1;
        let keypoint = self.frame0.keypoint(idx_k);
        let predicted_row = match self.geometry.predict_keypoint(idx_k, &keypoint) {
            Some((x, y)) if x.is_finite() && y.is_finite() => y,
            _ => {
                self.stats.without_prediction += 1;
                return Ok(());
            }
        };

        let mut window = self.index.query(predicted_row, self.config.initial_half_window_px)?;
        if window.is_empty() {
            trace!("keypoint {}: empty band at row {:.1}, escalating", idx_k, predicted_row);
            self.stats.window_escalations += 1;
            window = self.index.query(predicted_row, self.config.escalated_half_window_px)?;
            if window.is_empty() {
                self.stats.empty_windows += 1;
                return Ok(());
            }
        }

        let bits = self.descriptor_size_bits;
        let descriptor_k = self.frame0.descriptor(idx_k);
        let mut distance_closest = bits + 1;
        let mut distance_second_closest = bits + 1;
        let mut best_frame1_index = None;

        for candidate in &self.index.sorted_view()[window] {
            let distance = hamming_distance(descriptor_k, self.frame1.descriptor(candidate.index));
            let num_matching_bits = bits.saturating_sub(distance);
            // Fully disagreeing descriptors can never clear a threshold
            if num_matching_bits > 0 {
                self.tracker
                    .record_candidate(idx_k, candidate.index, matching_score(num_matching_bits, bits))?;
            }

            if distance < distance_closest {
                distance_second_closest = distance_closest;
                distance_closest = distance;
                best_frame1_index = Some(candidate.index);
            } else if distance < distance_second_closest {
                distance_second_closest = distance;
            }
        }

        let Some(best_frame1_index) = best_frame1_index else {
            return Ok(());
        };
        let score = matching_score(bits - distance_closest, bits);
        if score <= self.config.relaxed_threshold {
            return Ok(());
        }
        if !ratio_test(bits, distance_closest, distance_second_closest, self.config.lowe_ratio) {
            self.stats.ratio_test_rejections += 1;
            return Ok(());
        }

        match self.tracker.claim(best_frame1_index, idx_k, score)? {
            ClaimOutcome::Accepted => self.stats.initial_matches += 1,
            ClaimOutcome::Preempted(evicted) => {
                trace!("keypoint {} takes frame1 keypoint {} from {}", idx_k, best_frame1_index, evicted);
                self.stats.initial_matches += 1;
                self.stats.preemptions += 1;
            }
            ClaimOutcome::Rejected => self.tracker.mark_inferior(idx_k),
        }
        Ok(())
    }

    /// Second matcher: retries every inferior keypoint against the frame1
    /// keypoints it was compared with in the initial pass. Returns true if any
    /// match was made.
    fn match_inferior_matches(&mut self) -> MatchResult<bool> {
        let strict_threshold = self.config.strict_threshold;
        let mut found = false;

        for idx_k in self.tracker.inferior_snapshot() {
            if !self.tracker.is_inferior(idx_k) {
                continue;
            }

            let tracker = &self.tracker;
            let best = tracker
                .candidates(idx_k)
                .iter()
                .filter(|c| c.score >= strict_threshold && tracker.is_claimable(c.frame1_index, idx_k, c.score))
                .fold(None, |best: Option<Candidate>, c| match best {
                    Some(b) if b.score >= c.score => Some(b),
                    _ => Some(*c),
                });

            let Some(best) = best else {
                // Claims only get stronger, so nothing left here can be won later
                self.tracker.unmark_inferior(idx_k);
                continue;
            };

            match self.tracker.claim(best.frame1_index, idx_k, best.score)? {
                ClaimOutcome::Accepted => {
                    found = true;
                    self.stats.inferior_resolved += 1;
                }
                ClaimOutcome::Preempted(evicted) => {
                    trace!("inferior keypoint {} takes frame1 keypoint {} from {}", idx_k, best.frame1_index, evicted);
                    found = true;
                    self.stats.inferior_resolved += 1;
                    self.stats.preemptions += 1;
                }
                ClaimOutcome::Rejected => {}
            }
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{PinholeCamera, PredictedPositions, RotationPredictor, IDENTITY_ROTATION};
    use std::sync::Arc;
    use stereo_core::{Keypoint, VisualFrame};

    /// 80-bit descriptor with the first `n` bits set
    fn desc(n: usize) -> [u8; 10] {
        let mut d = [0u8; 10];
        for bit in 0..n {
            d[bit / 8] |= 1 << (bit % 8);
        }
        d
    }

    fn frame(points: &[(f32, f32)], descriptors: &[[u8; 10]]) -> VisualFrame {
        let kps = points.iter().map(|&(x, y)| Keypoint::new(x, y)).collect();
        VisualFrame::from_descriptors(kps, descriptors).unwrap()
    }

    fn identity_matcher(frame0: &VisualFrame, height: u32) -> StereoMatcher<PredictedPositions> {
        StereoMatcher::with_defaults(PredictedPositions::identity(height, frame0.keypoints())).unwrap()
    }

    #[test]
    fn test_matching_score() {
        assert_eq!(matching_score(72, 80), 0.9);
        assert_eq!(matching_score(256, 256), 1.0);
        assert_eq!(matching_score(0, 256), 0.0);
    }

    #[test]
    fn test_ratio_test() {
        // No second candidate
        assert!(ratio_test(256, 10, 257, 0.8));
        // Zero second distance
        assert!(ratio_test(256, 0, 0, 0.8));
        assert!(ratio_test(256, 7, 10, 0.8));
        assert!(!ratio_test(256, 8, 10, 0.8));
        assert!(!ratio_test(256, 9, 10, 0.8));
    }

    #[test]
    fn test_image_height_from_constructor_geometry() {
        let camera = PinholeCamera::new(450.0, 450.0, 376.0, 300.0, 752, 600);
        let geometry = Arc::new(RotationPredictor::monocular(camera, IDENTITY_ROTATION));
        let matcher = StereoMatcher::with_defaults(Arc::clone(&geometry)).unwrap();
        assert_eq!(matcher.image_height(), 600);
        assert_eq!(matcher.geometry().camera1.height, 600);

        // A keypoint below row 480 is only reachable with the 600-row table
        let frame0 = frame(&[(100.0, 560.0)], &[desc(0)]);
        let frame1 = frame(&[(100.0, 562.0)], &[desc(2)]);
        let matches = matcher.match_frames(&frame0, &frame1).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!((matches[0].frame0_index, matches[0].frame1_index), (0, 0));
    }

    #[test]
    fn test_zero_height_geometry_rejected() {
        let result = StereoMatcher::with_defaults(PredictedPositions::new(0, Vec::new()));
        assert!(matches!(result, Err(MatchError::InvalidImageHeight(0))));
    }

    #[test]
    fn test_descriptor_size_mismatch() {
        let frame0 = frame(&[(10.0, 10.0)], &[desc(0)]);
        let frame1 = VisualFrame::from_descriptors(vec![Keypoint::new(10.0, 10.0)], &[[0u8; 32]]).unwrap();
        let matcher = identity_matcher(&frame0, 100);
        let result = matcher.match_frames(&frame0, &frame1);
        assert!(matches!(
            result,
            Err(MatchError::DescriptorSizeMismatch { frame0_bits: 80, frame1_bits: 256 })
        ));
    }

    #[test]
    fn test_empty_frames() {
        let empty = VisualFrame::new(Vec::new(), Vec::new(), 10).unwrap();
        let other = frame(&[(10.0, 10.0)], &[desc(0)]);
        let matcher = identity_matcher(&other, 100);

        assert!(matcher.match_frames(&empty, &other).unwrap().is_empty());
        assert!(matcher.match_frames(&other, &empty).unwrap().is_empty());
    }

    #[test]
    fn test_window_escalation() {
        // 15 rows away: outside the 10 px band, inside the 20 px band
        let frame0 = frame(&[(50.0, 100.0)], &[desc(0)]);
        let frame1 = frame(&[(50.0, 115.0)], &[desc(4)]);
        let matcher = identity_matcher(&frame0, 480);

        let (matches, stats) = matcher.match_frames_with_stats(&frame0, &frame1).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(stats.window_escalations, 1);
        assert_eq!(stats.empty_windows, 0);
    }

    #[test]
    fn test_no_candidates_after_escalation() {
        let frame0 = frame(&[(50.0, 100.0)], &[desc(0)]);
        let frame1 = frame(&[(50.0, 160.0)], &[desc(0)]);
        let matcher = identity_matcher(&frame0, 480);

        let (matches, stats) = matcher.match_frames_with_stats(&frame0, &frame1).unwrap();
        assert!(matches.is_empty());
        assert_eq!(stats.empty_windows, 1);
    }

    #[test]
    fn test_missing_prediction_leaves_keypoint_unmatched() {
        let frame0 = frame(&[(50.0, 100.0), (60.0, 200.0)], &[desc(0), desc(40)]);
        let frame1 = frame(&[(50.0, 100.0), (60.0, 200.0)], &[desc(0), desc(40)]);
        let geometry = PredictedPositions::new(480, vec![None, Some((60.0, 200.0))]);
        let matcher = StereoMatcher::with_defaults(geometry).unwrap();

        let (matches, stats) = matcher.match_frames_with_stats(&frame0, &frame1).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].frame0_index, 1);
        assert_eq!(stats.without_prediction, 1);
    }

    #[test]
    fn test_score_must_exceed_relaxed_threshold() {
        // 16 of 80 bits differ: score exactly 0.8, which does not exceed 0.8
        let frame0 = frame(&[(50.0, 100.0)], &[desc(0)]);
        let frame1 = frame(&[(50.0, 100.0)], &[desc(16)]);
        let matcher = identity_matcher(&frame0, 480);
        assert!(matcher.match_frames(&frame0, &frame1).unwrap().is_empty());
    }

    #[test]
    fn test_equal_scores_keep_first_claim() {
        let frame0 = frame(&[(50.0, 100.0), (70.0, 100.0)], &[desc(0), desc(0)]);
        let frame1 = frame(&[(60.0, 100.0)], &[desc(4)]);
        let matcher = identity_matcher(&frame0, 480);

        let (matches, stats) = matcher.match_frames_with_stats(&frame0, &frame1).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].frame0_index, 0);
        assert_eq!(stats.preemptions, 0);
    }

    #[test]
    fn test_zero_inferior_iterations_disables_second_pass() {
        // Keypoint 0 loses frame1 keypoint 0 to keypoint 1 and could fall back to frame1 keypoint 1
        let frame0 = frame(&[(50.0, 100.0), (70.0, 100.0)], &[desc(4), desc(0)]);
        let frame1 = frame(&[(60.0, 100.0), (61.0, 101.0)], &[desc(0), desc(12)]);
        let geometry = PredictedPositions::identity(480, frame0.keypoints());

        let with_second_pass = StereoMatcher::with_defaults(geometry.clone()).unwrap();
        let matches = with_second_pass.match_frames(&frame0, &frame1).unwrap();
        assert_eq!(matches.len(), 2);

        let cfg = MatcherConfig {
            max_inferior_iterations: 0,
            ..MatcherConfig::default()
        };
        let without_second_pass = StereoMatcher::new(geometry, cfg).unwrap();
        let matches = without_second_pass.match_frames(&frame0, &frame1).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].frame0_index, 1);
    }

    #[test]
    fn test_match_batch_keeps_order() {
        let frame0 = frame(&[(50.0, 100.0)], &[desc(0)]);
        let hit = frame(&[(50.0, 101.0)], &[desc(2)]);
        let miss = frame(&[(50.0, 300.0)], &[desc(2)]);
        let matcher = identity_matcher(&frame0, 480);

        let pairs = vec![(frame0.clone(), hit.clone()), (frame0.clone(), miss), (frame0, hit)];
        let results = matcher.match_batch(&pairs);
        let counts: Vec<usize> = results.into_iter().map(|r| r.unwrap().len()).collect();
        assert_eq!(counts, vec![1, 0, 1]);
    }
}
