use crate::config::RansacConfig;
use crate::error::HomographyResult;
use crate::ransac::RansacEstimator;

/// Fluent builder for a `RansacEstimator`
#[derive(Debug, Clone, Default)]
pub struct EstimatorBuilder {
    config: RansacConfig,
}

impl EstimatorBuilder {
    /// Create a new builder with the balanced preset
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder from an existing configuration
    pub fn from_config(config: RansacConfig) -> Self {
        Self { config }
    }

    /// Set the inlier reprojection threshold in pixels
    pub fn inlier_threshold(mut self, threshold: f64) -> Self {
        self.config.inlier_threshold = threshold;
        self
    }

    /// Set the maximum number of RANSAC trials
    pub fn max_iters(mut self, max_iters: usize) -> Self {
        self.config.max_iters = max_iters;
        self
    }

    /// Set the confidence used to shrink the trial budget
    pub fn confidence(mut self, confidence: f64) -> Self {
        self.config.confidence = confidence;
        self
    }

    /// Set the number of draws per trial spent looking for a non-degenerate sample
    pub fn max_sample_attempts(mut self, attempts: usize) -> Self {
        self.config.max_sample_attempts = attempts;
        self
    }

    /// Set the random seed
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Apply the fast preset, keeping the current seed
    pub fn preset_fast(self) -> Self {
        self.apply_preset(RansacConfig::fast_preset())
    }

    /// Apply the balanced preset, keeping the current seed
    pub fn preset_balanced(self) -> Self {
        self.apply_preset(RansacConfig::balanced_preset())
    }

    /// Apply the precise preset, keeping the current seed
    pub fn preset_precise(self) -> Self {
        self.apply_preset(RansacConfig::precise_preset())
    }

    fn apply_preset(mut self, preset: RansacConfig) -> Self {
        let seed = self.config.seed;
        self.config = preset.with_seed(seed);
        self
    }

    /// Generate a summary of the builder's configuration
    pub fn summary(&self) -> String {
        self.config.summary()
    }

    /// Convert the builder into a `RansacConfig`
    pub fn to_config(self) -> RansacConfig {
        self.config
    }

    /// Validate and build the estimator
    pub fn build(self) -> HomographyResult<RansacEstimator> {
        RansacEstimator::new(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HomographyError;

    #[test]
    fn test_fluent_settings() {
        let estimator = EstimatorBuilder::new()
            .inlier_threshold(2.0)
            .max_iters(300)
            .confidence(0.98)
            .seed(5)
            .build()
            .unwrap();

        let cfg = estimator.config();
        assert_eq!(cfg.inlier_threshold, 2.0);
        assert_eq!(cfg.max_iters, 300);
        assert_eq!(cfg.confidence, 0.98);
        assert_eq!(cfg.seed, 5);
    }

    #[test]
    fn test_preset_keeps_seed() {
        let cfg = EstimatorBuilder::new().seed(42).preset_precise().to_config();
        assert_eq!(cfg.seed, 42);
        assert_eq!(cfg.max_iters, RansacConfig::precise_preset().max_iters);
    }

    #[test]
    fn test_build_validates() {
        let result = EstimatorBuilder::new().max_sample_attempts(0).build();
        assert!(matches!(result, Err(HomographyError::InvalidConfig(_))));
    }
}
