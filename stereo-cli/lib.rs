use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};
use stereo_core::{init_thread_pool, FrameError, VisualFrame};
use stereo_matcher::{
    MatchError, MatcherConfig, MatchingStats, PinholeCamera, Rotation, RotationPredictor, StereoMatch, StereoMatcher,
    IDENTITY_ROTATION,
};

pub use stereo_core;
pub use stereo_matcher;

#[derive(Debug)]
pub enum CliError {
    Match(MatchError),
    Io(std::io::Error),
    Parse(String),
    ThreadPool(rayon::ThreadPoolBuildError),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Match(e) => write!(f, "Matching error: {}", e),
            CliError::Io(e) => write!(f, "I/O error: {}", e),
            CliError::Parse(e) => write!(f, "Parse error: {}", e),
            CliError::ThreadPool(e) => write!(f, "Thread pool error: {}", e),
        }
    }
}

impl std::error::Error for CliError {}

impl From<MatchError> for CliError {
    fn from(err: MatchError) -> Self {
        CliError::Match(err)
    }
}

impl From<FrameError> for CliError {
    fn from(err: FrameError) -> Self {
        CliError::Match(err.into())
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io(err)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::Parse(err.to_string())
    }
}

impl From<rayon::ThreadPoolBuildError> for CliError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        CliError::ThreadPool(err)
    }
}

pub type CliResult<T> = Result<T, CliError>;

fn default_rotation() -> Rotation {
    IDENTITY_ROTATION
}

/// Two frames plus the geometry relating them, as stored on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FramePairFile {
    pub camera0: PinholeCamera,
    /// Defaults to `camera0`
    #[serde(default)]
    pub camera1: Option<PinholeCamera>,
    #[serde(default = "default_rotation")]
    pub rotation_1_0: Rotation,
    pub frame0: VisualFrame,
    pub frame1: VisualFrame,
}

impl FramePairFile {
    /// Load and validate a pair from JSON text
    pub fn from_json(json: &str) -> CliResult<Self> {
        let pair: Self = serde_json::from_str(json)?;
        pair.frame0.validate()?;
        pair.frame1.validate()?;
        Ok(pair)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> CliResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn predictor(&self) -> RotationPredictor {
        RotationPredictor::new(self.camera0, self.camera1.unwrap_or(self.camera0), self.rotation_1_0)
    }
}

/// Matches written back out, together with the run counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchReport {
    pub matches: Vec<StereoMatch>,
    pub stats: MatchingStats,
}

/// Load a matcher configuration, choosing the format by file extension
pub fn load_config<P: AsRef<Path>>(path: P) -> CliResult<MatcherConfig> {
    let path = path.as_ref();
    let loaded = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => MatcherConfig::load_toml(path),
        _ => MatcherConfig::load_json(path),
    };
    loaded.map_err(|e| CliError::Parse(format!("{}: {}", path.display(), e)))
}

/// High-level matcher over frame pairs loaded from disk
pub struct StereoPipeline {
    config: MatcherConfig,
}

impl StereoPipeline {
    /// Create a pipeline and size the global thread pool for batch matching
    pub fn new(config: MatcherConfig, n_threads: usize) -> CliResult<Self> {
        config.validate()?;
        // The global pool can only be built once per process
        if let Err(e) = init_thread_pool(n_threads) {
            log::debug!("keeping existing thread pool: {}", e);
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Match a single pair
    pub fn run(&self, pair: &FramePairFile) -> CliResult<MatchReport> {
        let matcher = StereoMatcher::new(pair.predictor(), self.config.clone())?;
        let (matches, stats) = matcher.match_frames_with_stats(&pair.frame0, &pair.frame1)?;
        info!(
            "{} of {} frame0 keypoints matched against {} frame1 keypoints",
            matches.len(),
            pair.frame0.len(),
            pair.frame1.len()
        );
        Ok(MatchReport { matches, stats })
    }

    /// Match many pairs sharing one camera setup in parallel
    pub fn run_batch(&self, predictor: RotationPredictor, pairs: &[(VisualFrame, VisualFrame)]) -> CliResult<Vec<Vec<StereoMatch>>> {
        let matcher = StereoMatcher::new(predictor, self.config.clone())?;
        matcher
            .match_batch(pairs)
            .into_iter()
            .map(|r| r.map_err(CliError::from))
            .collect()
    }
}
