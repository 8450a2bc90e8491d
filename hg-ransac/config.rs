use crate::error::{HomographyError, HomographyResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// RANSAC settings for homography estimation
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RansacConfig {
    /// Maximum reprojection error (pixels) for a correspondence to count as inlier
    pub inlier_threshold: f64,
    /// Upper bound on the number of minimal-sample trials
    pub max_iters: usize,
    /// Probability of drawing at least one all-inlier sample; drives the adaptive trial budget
    pub confidence: f64,
    /// Draws per trial before giving up on finding a non-degenerate sample
    pub max_sample_attempts: usize,
    /// Seed of the per-run random generator
    pub seed: u64,
    /// Metadata
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub name: Option<String>,
}

impl Default for RansacConfig {
    fn default() -> Self {
        Self::balanced_preset()
    }
}

impl RansacConfig {
    /// Balanced preset: 3 px threshold, up to 2000 trials at 99.5% confidence
    pub fn balanced_preset() -> Self {
        Self {
            inlier_threshold: 3.0,
            max_iters: 2000,
            confidence: 0.995,
            max_sample_attempts: 100,
            seed: 0,
            name: None,
        }
    }

    /// Fewer trials and a looser threshold
    pub fn fast_preset() -> Self {
        Self {
            inlier_threshold: 5.0,
            max_iters: 500,
            confidence: 0.99,
            max_sample_attempts: 50,
            seed: 0,
            name: Some("Fast".to_string()),
        }
    }

    /// Tight threshold and a large trial budget for heavily contaminated matches
    pub fn precise_preset() -> Self {
        Self {
            inlier_threshold: 1.5,
            max_iters: 10_000,
            confidence: 0.999,
            max_sample_attempts: 200,
            seed: 0,
            name: Some("Precise".to_string()),
        }
    }

    /// Look up a preset by name (`fast`, `balanced`, `precise`)
    pub fn preset(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "fast" => Some(Self::fast_preset()),
            "balanced" | "default" => Some(Self::balanced_preset()),
            "precise" => Some(Self::precise_preset()),
            _ => None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Generate human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "RansacConfig{}: threshold={:.2}px, max_iters={}, confidence={}, seed={}",
            self.name.as_deref().map(|n| format!(" '{}'", n)).unwrap_or_default(),
            self.inlier_threshold,
            self.max_iters,
            self.confidence,
            self.seed
        )
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> HomographyResult<()> {
        if !self.inlier_threshold.is_finite() || self.inlier_threshold <= 0.0 {
            return Err(HomographyError::InvalidConfig(format!(
                "inlier_threshold must be > 0, got {}",
                self.inlier_threshold
            )));
        }
        if self.max_iters == 0 {
            return Err(HomographyError::InvalidConfig("max_iters must be > 0".to_string()));
        }
        if !(self.confidence > 0.0 && self.confidence < 1.0) {
            return Err(HomographyError::InvalidConfig(format!(
                "confidence must lie in (0, 1), got {}",
                self.confidence
            )));
        }
        if self.max_sample_attempts == 0 {
            return Err(HomographyError::InvalidConfig("max_sample_attempts must be > 0".to_string()));
        }
        Ok(())
    }

    /// Parse and validate a JSON document; missing fields take balanced defaults
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    #[cfg(feature = "serde")]
    pub fn from_toml(toml_str: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid() {
        for name in ["fast", "balanced", "precise", "DEFAULT"] {
            let cfg = RansacConfig::preset(name).unwrap();
            assert!(cfg.validate().is_ok(), "{}", cfg.summary());
        }
        assert!(RansacConfig::preset("turbo").is_none());
    }

    #[test]
    fn test_invalid_values() {
        let mut cfg = RansacConfig::default();
        cfg.inlier_threshold = 0.0;
        assert!(matches!(cfg.validate(), Err(HomographyError::InvalidConfig(_))));

        let mut cfg = RansacConfig::default();
        cfg.confidence = 1.0;
        assert!(matches!(cfg.validate(), Err(HomographyError::InvalidConfig(_))));

        let mut cfg = RansacConfig::default();
        cfg.max_iters = 0;
        assert!(matches!(cfg.validate(), Err(HomographyError::InvalidConfig(_))));
    }

    #[test]
    fn test_summary_mentions_name() {
        let cfg = RansacConfig::fast_preset().with_seed(7);
        let summary = cfg.summary();
        assert!(summary.contains("'Fast'"));
        assert!(summary.contains("seed=7"));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_toml_partial_document_uses_defaults() {
        let cfg = RansacConfig::from_toml("inlier_threshold = 2.5\nseed = 11\n").unwrap();
        assert_eq!(cfg.inlier_threshold, 2.5);
        assert_eq!(cfg.seed, 11);
        assert_eq!(cfg.max_iters, RansacConfig::default().max_iters);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_json_rejects_invalid() {
        assert!(RansacConfig::from_json(r#"{"confidence": 1.5}"#).is_err());
    }
}
