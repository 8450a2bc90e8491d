use hg_core::{CandidateMatch, CoreError, Correspondence, FeatureSet};
use log::debug;

mod matcher;

pub use matcher::{BruteForceMatcher, KnnMatcher, ParallelBruteForceMatcher};

#[derive(Debug)]
pub enum MatchError {
    /// Ratio must be finite and strictly positive
    InvalidRatio(f32),
    /// A candidate refers to a feature that does not exist
    InvalidMatchIndex { query_index: usize, train_index: usize, object_len: usize, scene_len: usize },
    Core(CoreError),
    ThreadPool(rayon::ThreadPoolBuildError),
}

impl std::fmt::Display for MatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchError::InvalidRatio(r) => {
                write!(f, "Invalid ratio: {} (must be finite and > 0)", r)
            }
            MatchError::InvalidMatchIndex { query_index, train_index, object_len, scene_len } => {
                write!(
                    f,
                    "Match index out of range: query {} of {}, train {} of {}",
                    query_index, object_len, train_index, scene_len
                )
            }
            MatchError::Core(e) => write!(f, "{}", e),
            MatchError::ThreadPool(e) => write!(f, "Thread pool error: {}", e),
        }
    }
}

impl std::error::Error for MatchError {}

impl From<CoreError> for MatchError {
    fn from(err: CoreError) -> Self {
        MatchError::Core(err)
    }
}

impl From<rayon::ThreadPoolBuildError> for MatchError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        MatchError::ThreadPool(err)
    }
}

pub type MatchResult<T> = Result<T, MatchError>;

/// Nearest-neighbour distance ratio test.
///
/// A candidate survives iff `best <= ratio * second`. Lower ratios keep
/// fewer, less ambiguous matches; a ratio of 1 keeps every candidate that has
/// a second neighbour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatioTest {
    ratio: f32,
}

impl RatioTest {
    pub fn new(ratio: f32) -> MatchResult<Self> {
        if !ratio.is_finite() || ratio <= 0.0 {
            return Err(MatchError::InvalidRatio(ratio));
        }
        Ok(Self { ratio })
    }

    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    /// Candidates without a second neighbour are never accepted
    pub fn accepts(&self, candidate: &CandidateMatch) -> bool {
        match candidate.second {
            Some(second) => candidate.best.distance <= self.ratio * second.distance,
            None => false,
        }
    }

    /// Keep the accepted candidates, in input order, as point correspondences
    pub fn filter(
        &self,
        candidates: &[CandidateMatch],
        object: &FeatureSet,
        scene: &FeatureSet,
    ) -> MatchResult<Vec<Correspondence>> {
        for candidate in candidates {
            validate_indices(candidate, object, scene)?;
        }

        let accepted: Vec<Correspondence> = candidates
            .iter()
            .filter(|c| self.accepts(c))
            .filter_map(|c| {
                let query = object.get(c.query_index)?;
                let train = scene.get(c.best.train_index)?;
                Some(Correspondence {
                    object: query.keypoint.pt,
                    scene: train.keypoint.pt,
                    query_index: c.query_index,
                    train_index: c.best.train_index,
                })
            })
            .collect();

        debug!(
            "RatioTest::filter ratio={} accepted {}/{} candidates",
            self.ratio,
            accepted.len(),
            candidates.len()
        );
        Ok(accepted)
    }
}

/// Shorthand for `RatioTest::new(ratio)?.filter(..)`
pub fn filter_correspondences(
    candidates: &[CandidateMatch],
    object: &FeatureSet,
    scene: &FeatureSet,
    ratio: f32,
) -> MatchResult<Vec<Correspondence>> {
    RatioTest::new(ratio)?.filter(candidates, object, scene)
}

fn validate_indices(candidate: &CandidateMatch, object: &FeatureSet, scene: &FeatureSet) -> MatchResult<()> {
    let out_of_range = |train_index: usize| MatchError::InvalidMatchIndex {
        query_index: candidate.query_index,
        train_index,
        object_len: object.len(),
        scene_len: scene.len(),
    };

    if candidate.query_index >= object.len() || candidate.best.train_index >= scene.len() {
        return Err(out_of_range(candidate.best.train_index));
    }
    if let Some(second) = candidate.second {
        if second.train_index >= scene.len() {
            return Err(out_of_range(second.train_index));
        }
    }
    Ok(())
}
