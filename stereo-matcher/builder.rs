use crate::camera::StereoGeometry;
use crate::config::MatcherConfig;
use crate::error::MatchResult;
use crate::matcher::StereoMatcher;

/// Builder for creating a `StereoMatcher`
#[derive(Debug, Clone, Default)]
pub struct MatcherBuilder {
    config: MatcherConfig,
}

impl MatcherBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the score an initial match must exceed
    pub fn relaxed_threshold(mut self, threshold: f64) -> Self {
        self.config.relaxed_threshold = threshold;
        self
    }

    /// Set the score an inferior keypoint's candidate must reach
    pub fn strict_threshold(mut self, threshold: f64) -> Self {
        self.config.strict_threshold = threshold;
        self
    }

    /// Set the Lowe ratio used by the initial pass
    pub fn lowe_ratio(mut self, ratio: f64) -> Self {
        self.config.lowe_ratio = ratio;
        self
    }

    /// Set the initial and escalated search band half heights
    pub fn half_windows(mut self, initial_px: u32, escalated_px: u32) -> Self {
        self.config.initial_half_window_px = initial_px;
        self.config.escalated_half_window_px = escalated_px;
        self
    }

    /// Set the cap on inferior match resolution passes
    pub fn max_inferior_iterations(mut self, iterations: usize) -> Self {
        self.config.max_inferior_iterations = iterations;
        self
    }

    /// Apply the wide baseline preset
    pub fn preset_wide_baseline(mut self) -> Self {
        self.config = MatcherConfig::wide_baseline_preset();
        self
    }

    /// Apply the strict preset
    pub fn preset_strict(mut self) -> Self {
        self.config = MatcherConfig::strict_preset();
        self
    }

    /// Build the `StereoMatcher` around the given geometry
    pub fn build<G: StereoGeometry>(self, geometry: G) -> MatchResult<StereoMatcher<G>> {
        StereoMatcher::new(geometry, self.config)
    }

    /// Generate a summary of the builder's configuration
    pub fn summary(&self) -> String {
        self.config.summary()
    }

    /// Create a builder from an existing `MatcherConfig`
    pub fn from_config(config: MatcherConfig) -> Self {
        Self { config }
    }

    /// Convert the builder into a `MatcherConfig`
    pub fn to_config(self) -> MatcherConfig {
        self.config
    }
}
