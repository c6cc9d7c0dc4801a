use stereo_matcher::{
    MatcherBuilder, PredictedPositions, StereoMatch, StereoMatcher, VisualFrame, Keypoint,
};

/// Descriptor of `N` bytes with the given bit ranges set
fn bits<const N: usize>(ranges: &[std::ops::Range<usize>]) -> [u8; N] {
    let mut d = [0u8; N];
    for range in ranges {
        for bit in range.clone() {
            d[bit / 8] |= 1 << (bit % 8);
        }
    }
    d
}

fn frame<const N: usize>(points: &[(f32, f32)], descriptors: &[[u8; N]]) -> VisualFrame {
    let kps = points.iter().map(|&(x, y)| Keypoint::new(x, y)).collect();
    VisualFrame::from_descriptors(kps, descriptors).unwrap()
}

fn identity_matcher(frame0: &VisualFrame) -> StereoMatcher<PredictedPositions> {
    StereoMatcher::with_defaults(PredictedPositions::identity(480, frame0.keypoints())).unwrap()
}

fn pairs(matches: &[StereoMatch]) -> Vec<(usize, usize)> {
    matches.iter().map(|m| (m.frame0_index, m.frame1_index)).collect()
}

#[test]
fn test_unique_closest_match() {
    // 80-bit descriptors; frame1 keypoint 1 differs from frame0 keypoint 0 in 8 bits
    let frame0 = frame::<10>(
        &[(50.0, 100.0), (50.0, 200.0), (50.0, 300.0)],
        &[bits(&[]), bits(&[0..40]), bits(&[40..80])],
    );
    let frame1 = frame::<10>(
        &[(60.0, 400.0), (52.0, 102.0), (60.0, 450.0)],
        &[bits(&[0..40]), bits(&[0..8]), bits(&[40..80])],
    );

    let matches = identity_matcher(&frame0).match_frames(&frame0, &frame1).unwrap();
    assert_eq!(matches, vec![StereoMatch { frame0_index: 0, frame1_index: 1, score: 0.9 }]);
}

#[test]
fn test_ratio_test_vetoes_ambiguous_match() {
    // Distances 10 and 12: score 0.875 clears 0.8 but 10 / 12 >= 0.8
    let frame0 = frame::<10>(&[(50.0, 100.0)], &[bits(&[])]);
    let frame1 = frame::<10>(&[(40.0, 101.0), (60.0, 99.0)], &[bits(&[0..10]), bits(&[20..32])]);

    let matcher = identity_matcher(&frame0);
    let (matches, stats) = matcher.match_frames_with_stats(&frame0, &frame1).unwrap();
    assert!(matches.is_empty());
    assert_eq!(stats.ratio_test_rejections, 1);

    // Without the ambiguous second candidate the same keypoint matches
    let frame1 = frame::<10>(&[(40.0, 101.0)], &[bits(&[0..10])]);
    let matches = matcher.match_frames(&frame0, &frame1).unwrap();
    assert_eq!(pairs(&matches), vec![(0, 0)]);
}

#[test]
fn test_preempted_keypoint_without_fallback_stays_unmatched() {
    // 200-bit descriptors. Keypoint 0 scores 0.82 on frame1 keypoint 0, keypoint 1 scores 0.95.
    let frame0 = frame::<25>(&[(50.0, 100.0), (70.0, 100.0)], &[bits(&[0..36]), bits(&[100..110])]);
    let frame1 = frame::<25>(&[(55.0, 101.0), (65.0, 103.0)], &[bits(&[]), bits(&[36..96])]);

    let (matches, stats) = identity_matcher(&frame0)
        .match_frames_with_stats(&frame0, &frame1)
        .unwrap();
    assert_eq!(pairs(&matches), vec![(1, 0)]);
    assert!((matches[0].score - 0.95).abs() < 1e-12);
    assert_eq!(stats.preemptions, 1);
    assert_eq!(stats.inferior_resolved, 0);
}

#[test]
fn test_rejected_keypoint_without_fallback_stays_unmatched() {
    // Same as above with the stronger keypoint first, so the weaker claim is rejected
    let frame0 = frame::<25>(&[(70.0, 100.0), (50.0, 100.0)], &[bits(&[100..110]), bits(&[0..36])]);
    let frame1 = frame::<25>(&[(55.0, 101.0), (65.0, 103.0)], &[bits(&[]), bits(&[36..96])]);

    let (matches, stats) = identity_matcher(&frame0)
        .match_frames_with_stats(&frame0, &frame1)
        .unwrap();
    assert_eq!(pairs(&matches), vec![(0, 0)]);
    assert_eq!(stats.preemptions, 0);
    assert_eq!(stats.inferior_iterations, 1);
}

#[test]
fn test_preempted_keypoint_falls_back_to_strict_candidate() {
    // Keypoint 0: 0.90 on frame1 keypoint 0 and 0.86 on frame1 keypoint 1.
    // Keypoint 1: 0.95 on frame1 keypoint 0.
    let frame0 = frame::<25>(&[(50.0, 100.0), (70.0, 100.0)], &[bits(&[0..20]), bits(&[100..110])]);
    let frame1 = frame::<25>(&[(55.0, 101.0), (65.0, 103.0)], &[bits(&[]), bits(&[20..28])]);

    let (matches, stats) = identity_matcher(&frame0)
        .match_frames_with_stats(&frame0, &frame1)
        .unwrap();
    assert_eq!(pairs(&matches), vec![(0, 1), (1, 0)]);
    assert!((matches[0].score - 0.86).abs() < 1e-12);
    assert!((matches[1].score - 0.95).abs() < 1e-12);
    assert_eq!(stats.inferior_resolved, 1);
}

#[test]
fn test_fallback_at_strict_threshold_is_used() {
    // Keypoint 0's fallback scores exactly 170 / 200 = 0.85
    let frame0 = frame::<25>(&[(50.0, 100.0), (70.0, 100.0)], &[bits(&[0..20]), bits(&[100..110])]);
    let frame1 = frame::<25>(&[(55.0, 101.0), (65.0, 103.0)], &[bits(&[]), bits(&[20..30])]);

    let (matches, stats) = identity_matcher(&frame0)
        .match_frames_with_stats(&frame0, &frame1)
        .unwrap();
    assert_eq!(pairs(&matches), vec![(0, 1), (1, 0)]);
    assert_eq!(matches[0].score, 0.85);
    assert_eq!(stats.inferior_resolved, 1);
}

#[test]
fn test_fallback_below_strict_threshold_is_not_used() {
    // Keypoint 0's fallback scores 0.84: clears the relaxed but not the strict threshold
    let frame0 = frame::<25>(&[(50.0, 100.0), (70.0, 100.0)], &[bits(&[0..20]), bits(&[100..110])]);
    let frame1 = frame::<25>(&[(55.0, 101.0), (65.0, 103.0)], &[bits(&[]), bits(&[20..32])]);

    let matches = identity_matcher(&frame0).match_frames(&frame0, &frame1).unwrap();
    assert_eq!(pairs(&matches), vec![(1, 0)]);
}

#[test]
fn test_chain_of_preemptions_converges() {
    // Keypoint 2 takes frame1 keypoint 0 from keypoint 1, which then takes
    // frame1 keypoint 1 from keypoint 0, which finally settles on frame1 keypoint 2.
    let frame0 = frame::<25>(
        &[(50.0, 100.0), (60.0, 100.0), (70.0, 100.0)],
        &[bits(&[0..24, 40..60]), bits(&[0..8]), bits(&[190..194])],
    );
    let frame1 = frame::<25>(
        &[(55.0, 100.0), (65.0, 102.0), (75.0, 104.0)],
        &[bits(&[]), bits(&[0..24]), bits(&[0..24, 40..88])],
    );
    let geometry = PredictedPositions::identity(480, frame0.keypoints());

    let matcher = MatcherBuilder::new().build(geometry.clone()).unwrap();
    let (matches, stats) = matcher.match_frames_with_stats(&frame0, &frame1).unwrap();
    assert_eq!(pairs(&matches), vec![(0, 2), (1, 1), (2, 0)]);
    assert_eq!(stats.preemptions, 2);
    assert_eq!(stats.inferior_iterations, 2);

    // Capped at one pass, keypoint 0 is left without a match
    let matcher = MatcherBuilder::new().max_inferior_iterations(1).build(geometry).unwrap();
    let (matches, stats) = matcher.match_frames_with_stats(&frame0, &frame1).unwrap();
    assert_eq!(pairs(&matches), vec![(1, 1), (2, 0)]);
    assert_eq!(stats.inferior_iterations, 1);
}
