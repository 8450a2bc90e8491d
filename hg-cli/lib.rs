use hg_core::CoreError;
use hg_match::MatchError;
use hg_ransac::HomographyError;

pub mod config;
pub mod keypoints;
pub mod overlay;
pub mod pipeline;
pub mod report;
pub mod source;

pub use config::RegistrationConfig;
pub use pipeline::{register, FeaturesReady, HomographyComputed, Idle, Matched, Registration};
pub use report::ResultReport;
pub use source::{FeatureSource, PrecomputedFeatures};

pub use hg_core::{self, CandidateMatch, Correspondence, FeatureSet, Keypoint, Quadrilateral, ResultRecord, StageTiming};
pub use hg_match::{self, BruteForceMatcher, KnnMatcher, ParallelBruteForceMatcher};
pub use hg_ransac::{self, Homography, RansacConfig};

#[derive(Debug)]
pub enum RegistrationError {
    Core(CoreError),
    Match(MatchError),
    Homography(HomographyError),
    InvalidConfig(String),
    InvalidKeypointFile(String),
    Image(String),
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl std::fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistrationError::Core(e) => write!(f, "Input error: {}", e),
            RegistrationError::Match(e) => write!(f, "Matching error: {}", e),
            RegistrationError::Homography(e) => write!(f, "Homography error: {}", e),
            RegistrationError::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            RegistrationError::InvalidKeypointFile(msg) => write!(f, "Invalid keypoint file: {}", msg),
            RegistrationError::Image(msg) => write!(f, "Image error: {}", msg),
            RegistrationError::Io(e) => write!(f, "I/O error: {}", e),
            RegistrationError::Json(e) => write!(f, "JSON error: {}", e),
        }
    }
}

impl std::error::Error for RegistrationError {}

impl From<CoreError> for RegistrationError {
    fn from(err: CoreError) -> Self {
        RegistrationError::Core(err)
    }
}

impl From<MatchError> for RegistrationError {
    fn from(err: MatchError) -> Self {
        // Dimension problems surface the same way regardless of the stage that found them
        match err {
            MatchError::Core(e) => RegistrationError::Core(e),
            other => RegistrationError::Match(other),
        }
    }
}

impl From<HomographyError> for RegistrationError {
    fn from(err: HomographyError) -> Self {
        RegistrationError::Homography(err)
    }
}

impl From<std::io::Error> for RegistrationError {
    fn from(err: std::io::Error) -> Self {
        RegistrationError::Io(err)
    }
}

impl From<serde_json::Error> for RegistrationError {
    fn from(err: serde_json::Error) -> Self {
        RegistrationError::Json(err)
    }
}

pub type RegistrationResult<T> = Result<T, RegistrationError>;
