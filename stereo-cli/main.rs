use std::time::Instant;

use log::info;
use stereo_cli::{load_config, CliError, CliResult, FramePairFile, StereoPipeline};
use stereo_core::default_threads;
use stereo_matcher::MatcherConfig;

const USAGE: &str = "usage: stereo-match <pair.json> [config.json|config.toml]";

fn run(args: &[String]) -> CliResult<()> {
    let pair_path = args.first().ok_or_else(|| CliError::Parse(USAGE.to_string()))?;
    let config = match args.get(1) {
        Some(path) => load_config(path)?,
        None => MatcherConfig::default(),
    };
    info!("{}", config.summary());

    let pair = FramePairFile::load(pair_path)?;
    let pipeline = StereoPipeline::new(config, default_threads())?;

    let t0 = Instant::now();
    let report = pipeline.run(&pair)?;
    info!("matched in {:.2?}", t0.elapsed());

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if let Err(e) = run(&args) {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
