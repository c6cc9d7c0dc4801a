use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use stereo_matcher::{
    Descriptor, Keypoint, MatcherBuilder, IDENTITY_ROTATION, PinholeCamera, RotationPredictor, VisualFrame,
};

/// Frame1 sees the frame0 keypoints shifted sideways, nudged vertically and with a few bits flipped
fn synthetic_pair(n: usize) -> Result<(VisualFrame, VisualFrame), Box<dyn std::error::Error>> {
    let mut rng = StdRng::seed_from_u64(0x2545_f491);

    let mut kps0 = Vec::with_capacity(n);
    let mut kps1 = Vec::with_capacity(n);
    let mut desc0: Vec<Descriptor> = Vec::with_capacity(n);
    let mut desc1: Vec<Descriptor> = Vec::with_capacity(n);

    for _ in 0..n {
        let x = rng.gen_range(20.0..620.0f32);
        let y = rng.gen_range(20.0..460.0f32);
        let d: Descriptor = rng.r#gen();

        let mut d1 = d;
        for _ in 0..rng.gen_range(0..20) {
            let bit = rng.gen_range(0..256usize);
            d1[bit / 8] ^= 1 << (bit % 8);
        }
        let dy = rng.gen_range(-3.0..=3.0f32);

        kps0.push(Keypoint::new(x, y));
        kps1.push(Keypoint::new(x - 12.0, y + dy));
        desc0.push(d);
        desc1.push(d1);
    }

    Ok((VisualFrame::from_descriptors(kps0, &desc0)?, VisualFrame::from_descriptors(kps1, &desc1)?))
}

fn run_demo(builder: MatcherBuilder, frames: &(VisualFrame, VisualFrame), name: &str) -> Result<(), Box<dyn std::error::Error>> {
    println!("   {}", builder.summary());

    let camera = PinholeCamera::new(450.0, 450.0, 320.0, 240.0, 640, 480);
    let matcher = builder.build(RotationPredictor::monocular(camera, IDENTITY_ROTATION))?;

    let t0 = Instant::now();
    let (matches, stats) = matcher.match_frames_with_stats(&frames.0, &frames.1)?;
    let elapsed = t0.elapsed();

    println!("   [{}] {} matches in {:.2?}", name, matches.len(), elapsed);
    println!(
        "   escalations={} ratio_rejections={} preemptions={} resolved={}",
        stats.window_escalations, stats.ratio_test_rejections, stats.preemptions, stats.inferior_resolved
    );
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Stereo MatcherBuilder API Demo");
    println!("==============================\n");

    let frames = synthetic_pair(1500)?;
    println!("Synthetic pair: {} / {} keypoints", frames.0.len(), frames.1.len());

    println!("\nDemo 1: Defaults");
    run_demo(MatcherBuilder::new(), &frames, "default")?;

    println!("\nDemo 2: Wide baseline preset");
    run_demo(MatcherBuilder::new().preset_wide_baseline(), &frames, "wide_baseline")?;

    println!("\nDemo 3: Strict preset");
    run_demo(MatcherBuilder::new().preset_strict(), &frames, "strict")?;

    println!("\nDemo 4: Custom configuration");
    run_demo(
        MatcherBuilder::new()
            .relaxed_threshold(0.75)
            .lowe_ratio(0.85)
            .half_windows(4, 8)
            .max_inferior_iterations(5),
        &frames,
        "custom",
    )?;

    Ok(())
}
