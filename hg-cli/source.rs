use std::path::Path;

use hg_core::FeatureSet;

use crate::keypoints;
use crate::RegistrationResult;

/// Supplies the keypoints and descriptors of one image.
///
/// Detectors and file loaders are interchangeable behind this trait.
/// `features` runs inside the timed feature stage, so implementations should
/// finish any file or network reads before a run starts.
pub trait FeatureSource {
    /// Short label used in logs
    fn name(&self) -> &str;

    fn features(&self) -> RegistrationResult<FeatureSet>;
}

/// Features computed ahead of time, held in memory
#[derive(Debug, Clone)]
pub struct PrecomputedFeatures {
    label: String,
    features: FeatureSet,
}

impl PrecomputedFeatures {
    pub fn in_memory(label: impl Into<String>, features: FeatureSet) -> Self {
        Self {
            label: label.into(),
            features,
        }
    }

    /// Read a keypoint file now, so later stages never touch the disk
    pub fn load<P: AsRef<Path>>(path: P) -> RegistrationResult<Self> {
        let path = path.as_ref();
        let features = keypoints::load_keypoints(path)?;
        Ok(Self::in_memory(path.display().to_string(), features))
    }
}

impl FeatureSource for PrecomputedFeatures {
    fn name(&self) -> &str {
        &self.label
    }

    fn features(&self) -> RegistrationResult<FeatureSet> {
        Ok(self.features.clone())
    }
}
