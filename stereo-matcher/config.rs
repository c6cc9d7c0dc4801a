use crate::builder::MatcherBuilder;
use crate::error::{MatchError, MatchResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Complete matcher configuration
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MatcherConfig {
    /// Minimum fraction of agreeing bits for an initial match (exclusive)
    pub relaxed_threshold: f64,
    /// Minimum fraction of agreeing bits when re-matching inferior keypoints
    pub strict_threshold: f64,
    /// Closest / second closest distance must stay below this
    pub lowe_ratio: f64,
    /// Search band half height in pixels
    pub initial_half_window_px: u32,
    /// Band half height for the single retry when the first band is empty
    pub escalated_half_window_px: u32,
    pub max_inferior_iterations: usize,
    /// Metadata
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub name: Option<String>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub description: Option<String>,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            relaxed_threshold: 0.8,
            strict_threshold: 0.85,
            lowe_ratio: 0.8,
            initial_half_window_px: 10,
            escalated_half_window_px: 20,
            max_inferior_iterations: 3,
            name: None,
            description: None,
        }
    }
}

impl MatcherConfig {
    /// Wider search bands for larger vertical disparities
    pub fn wide_baseline_preset() -> Self {
        Self {
            initial_half_window_px: 20,
            escalated_half_window_px: 40,
            name: Some("Wide Baseline".to_string()),
            description: Some("Tolerates larger vertical offsets between predicted and observed rows".to_string()),
            ..Self::default()
        }
    }

    /// Fewer, more confident matches
    pub fn strict_preset() -> Self {
        Self {
            relaxed_threshold: 0.85,
            strict_threshold: 0.9,
            lowe_ratio: 0.7,
            initial_half_window_px: 8,
            escalated_half_window_px: 16,
            name: Some("Strict".to_string()),
            description: Some("Higher score thresholds and a tighter ratio test".to_string()),
            ..Self::default()
        }
    }

    /// Add metadata to configuration
    pub fn with_metadata(mut self, name: &str, description: &str) -> Self {
        self.name = Some(name.to_string());
        self.description = Some(description.to_string());
        self
    }

    /// Convert to MatcherBuilder for further customization
    pub fn to_builder(self) -> MatcherBuilder {
        MatcherBuilder::from_config(self)
    }

    /// Generate human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "MatcherConfig: relaxed={:.2}, strict={:.2}, lowe={:.2}, window={}px/{}px, inferior_iterations={}",
            self.relaxed_threshold, self.strict_threshold, self.lowe_ratio,
            self.initial_half_window_px, self.escalated_half_window_px, self.max_inferior_iterations
        )
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> MatchResult<()> {
        let unit = |name: &'static str, value: f64| {
            if value > 0.0 && value <= 1.0 {
                Ok(())
            } else {
                Err(MatchError::InvalidThreshold { name, value })
            }
        };
        unit("relaxed_threshold", self.relaxed_threshold)?;
        unit("strict_threshold", self.strict_threshold)?;
        unit("lowe_ratio", self.lowe_ratio)?;
        if self.strict_threshold < self.relaxed_threshold {
            return Err(MatchError::InvalidThreshold {
                name: "strict_threshold",
                value: self.strict_threshold,
            });
        }
        if self.initial_half_window_px == 0 || self.escalated_half_window_px < self.initial_half_window_px {
            return Err(MatchError::InvalidWindow {
                initial: self.initial_half_window_px,
                escalated: self.escalated_half_window_px,
            });
        }
        Ok(())
    }

    /// Save configuration to JSON file
    #[cfg(feature = "serde")]
    pub fn save_json<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load configuration from JSON file
    #[cfg(feature = "serde")]
    pub fn load_json<P: AsRef<std::path::Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Save configuration to TOML file
    #[cfg(feature = "serde")]
    pub fn save_toml<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let toml = toml::to_string_pretty(self)?;
        std::fs::write(path, toml)?;
        Ok(())
    }

    /// Load configuration from TOML file
    #[cfg(feature = "serde")]
    pub fn load_toml<P: AsRef<std::path::Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Serialize to JSON string
    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON string
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to TOML string
    #[cfg(feature = "serde")]
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Deserialize from TOML string
    #[cfg(feature = "serde")]
    pub fn from_toml(toml_str: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }
}
