use std::time::{Duration, Instant};

use hg_core::{CandidateMatch, Correspondence, FeatureSet, Keypoint, Quadrilateral, ResultRecord, StageTiming};
use hg_match::{KnnMatcher, RatioTest};
use hg_ransac::{CornerProjector, Estimate, RansacEstimator};
use log::debug;

use crate::source::FeatureSource;
use crate::{RegistrationConfig, RegistrationResult};

/// Fresh run, nothing loaded yet
#[derive(Debug)]
pub struct Idle;

/// Object and scene features are paired and dimension-checked
#[derive(Debug)]
pub struct FeaturesReady {
    object: FeatureSet,
    scene: FeatureSet,
}

/// Ratio-test survivors, in candidate order
#[derive(Debug)]
pub struct Matched {
    correspondences: Vec<Correspondence>,
}

#[derive(Debug)]
pub struct HomographyComputed {
    correspondences: usize,
    estimate: Estimate,
}

/// One registration run.
///
/// Each stage consumes the run and returns it in the next state, so a run can
/// neither go backwards nor be reused once a stage has failed.
#[derive(Debug)]
pub struct Registration<S> {
    ratio: RatioTest,
    estimator: RansacEstimator,
    corners: Quadrilateral,
    timing: StageTiming,
    state: S,
}

impl<S> Registration<S> {
    fn advance<T>(self, state: T) -> Registration<T> {
        Registration {
            ratio: self.ratio,
            estimator: self.estimator,
            corners: self.corners,
            timing: self.timing,
            state,
        }
    }

    /// Stage durations recorded so far
    pub fn timing(&self) -> &StageTiming {
        &self.timing
    }

    pub fn corners(&self) -> &Quadrilateral {
        &self.corners
    }
}

impl Registration<Idle> {
    /// Start a run for an object whose reference corners are `corners`
    pub fn new(config: &RegistrationConfig, corners: Quadrilateral) -> RegistrationResult<Self> {
        config.validate()?;
        Ok(Self {
            ratio: RatioTest::new(config.ratio)?,
            estimator: RansacEstimator::new(config.ransac.clone())?,
            corners,
            timing: StageTiming::default(),
            state: Idle,
        })
    }

    /// Add time spent producing features outside this run, e.g. by an
    /// external detector whose output is loaded here
    pub fn with_reported_feature_time(mut self, elapsed: Duration) -> Self {
        self.timing.feature += elapsed;
        self
    }

    pub fn load_features(self, object: FeatureSet, scene: FeatureSet) -> RegistrationResult<Registration<FeaturesReady>> {
        let start = Instant::now();
        object.check_compatible(&scene)?;
        let elapsed = start.elapsed();
        Ok(self.features_ready(object, scene, elapsed))
    }

    /// Pair keypoints with row-major descriptor matrices of width `dim`
    pub fn load_raw_features(
        self,
        object_keypoints: Vec<Keypoint>,
        object_descriptors: &[f32],
        scene_keypoints: Vec<Keypoint>,
        scene_descriptors: &[f32],
        dim: usize,
    ) -> RegistrationResult<Registration<FeaturesReady>> {
        let start = Instant::now();
        let object = FeatureSet::from_parts(object_keypoints, object_descriptors, dim)?;
        let scene = FeatureSet::from_parts(scene_keypoints, scene_descriptors, dim)?;
        let elapsed = start.elapsed();
        Ok(self.features_ready(object, scene, elapsed))
    }

    pub fn extract_features(
        self,
        object: &dyn FeatureSource,
        scene: &dyn FeatureSource,
    ) -> RegistrationResult<Registration<FeaturesReady>> {
        let start = Instant::now();
        let object_set = object.features()?;
        let scene_set = scene.features()?;
        object_set.check_compatible(&scene_set)?;
        let elapsed = start.elapsed();
        debug!("Features from sources '{}' and '{}'", object.name(), scene.name());
        Ok(self.features_ready(object_set, scene_set, elapsed))
    }

    fn features_ready(mut self, object: FeatureSet, scene: FeatureSet, elapsed: Duration) -> Registration<FeaturesReady> {
        self.timing.feature += elapsed;
        debug!(
            "Features ready: {} object, {} scene, dim {} ({:?})",
            object.len(),
            scene.len(),
            object.dim().max(scene.dim()),
            self.timing.feature
        );
        self.advance(FeaturesReady { object, scene })
    }
}

impl Registration<FeaturesReady> {
    pub fn object(&self) -> &FeatureSet {
        &self.state.object
    }

    pub fn scene(&self) -> &FeatureSet {
        &self.state.scene
    }

    /// Ratio-test externally supplied top-2 candidates
    pub fn filter_candidates(mut self, candidates: &[CandidateMatch]) -> RegistrationResult<Registration<Matched>> {
        let start = Instant::now();
        let correspondences = self.ratio.filter(candidates, &self.state.object, &self.state.scene)?;
        self.timing.matching += start.elapsed();
        Ok(self.matched(correspondences))
    }

    /// Search top-2 candidates with `matcher`, then ratio-test them
    pub fn match_features(mut self, matcher: &dyn KnnMatcher) -> RegistrationResult<Registration<Matched>> {
        let start = Instant::now();
        let candidates = matcher.knn_match(&self.state.object, &self.state.scene)?;
        let correspondences = self.ratio.filter(&candidates, &self.state.object, &self.state.scene)?;
        self.timing.matching += start.elapsed();
        debug!("Matcher '{}' produced {} candidates", matcher.name(), candidates.len());
        Ok(self.matched(correspondences))
    }

    fn matched(self, correspondences: Vec<Correspondence>) -> Registration<Matched> {
        debug!(
            "Matched: {} correspondences ({:?})",
            correspondences.len(),
            self.timing.matching
        );
        self.advance(Matched { correspondences })
    }
}

impl Registration<Matched> {
    pub fn correspondences(&self) -> &[Correspondence] {
        &self.state.correspondences
    }

    pub fn estimate_homography(mut self) -> RegistrationResult<Registration<HomographyComputed>> {
        let start = Instant::now();
        let estimate = self.estimator.estimate(&self.state.correspondences)?;
        self.timing.homography += start.elapsed();
        debug!(
            "Homography: {}/{} inliers after {} trials ({:?})",
            estimate.inliers,
            self.state.correspondences.len(),
            estimate.trials,
            self.timing.homography
        );
        let correspondences = self.state.correspondences.len();
        Ok(self.advance(HomographyComputed { correspondences, estimate }))
    }
}

impl Registration<HomographyComputed> {
    pub fn estimate(&self) -> &Estimate {
        &self.state.estimate
    }

    /// Project the object corners and close the run.
    /// Projection time counts towards the homography stage.
    pub fn project_corners(mut self) -> RegistrationResult<ResultRecord> {
        let start = Instant::now();
        let quad = CornerProjector::project(&self.corners, &self.state.estimate.homography)?;
        self.timing.homography += start.elapsed();
        debug!("Projected corners: {:?}", quad.vertices());
        Ok(ResultRecord::new(
            quad,
            self.timing,
            self.state.correspondences,
            self.state.estimate.inliers,
        ))
    }
}

/// Run every stage over precomputed features and top-2 candidates
pub fn register(
    config: &RegistrationConfig,
    corners: Quadrilateral,
    object: FeatureSet,
    scene: FeatureSet,
    candidates: &[CandidateMatch],
) -> RegistrationResult<ResultRecord> {
    Registration::new(config, corners)?
        .load_features(object, scene)?
        .filter_candidates(candidates)?
        .estimate_homography()?
        .project_corners()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RegistrationError;
    use hg_core::{CoreError, Feature, Neighbor};
    use hg_match::BruteForceMatcher;
    use hg_ransac::HomographyError;

    /// Object points inside a 100x50 rectangle; the scene is shifted by (20, 30)
    const OBJECT_POINTS: [(f32, f32); 10] = [
        (10.0, 5.0),
        (90.0, 5.0),
        (50.0, 25.0),
        (20.0, 40.0),
        (80.0, 45.0),
        (35.0, 15.0),
        (65.0, 35.0),
        (5.0, 30.0),
        (95.0, 20.0),
        (45.0, 48.0),
    ];

    /// One-hot descriptors so that feature `i` of both sets match exactly
    fn create_test_features(shift: (f32, f32)) -> FeatureSet {
        let n = OBJECT_POINTS.len();
        let features = OBJECT_POINTS
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| {
                let mut descriptor = vec![0.0; n];
                descriptor[i] = 1.0;
                Feature::new(Keypoint::at(x + shift.0, y + shift.1), descriptor)
            })
            .collect();
        FeatureSet::from_features(features).unwrap()
    }

    fn create_test_candidates(n: usize) -> Vec<CandidateMatch> {
        (0..n)
            .map(|i| {
                CandidateMatch::new(
                    i,
                    Neighbor { train_index: i, distance: 0.1 },
                    Neighbor { train_index: (i + 1) % n, distance: 0.5 },
                )
            })
            .collect()
    }

    fn assert_translated(record: &ResultRecord) {
        let expected = [(20.0, 30.0), (120.0, 30.0), (120.0, 80.0), (20.0, 80.0)];
        for (v, (x, y)) in record.quad().vertices().iter().zip(expected) {
            assert!((v.x - x).abs() < 1e-3 && (v.y - y).abs() < 1e-3, "{:?} vs ({}, {})", v, x, y);
        }
    }

    #[test]
    fn test_register_with_candidates() {
        let config = RegistrationConfig::default().with_ratio(1.0);
        let record = register(
            &config,
            Quadrilateral::from_size(100.0, 50.0),
            create_test_features((0.0, 0.0)),
            create_test_features((20.0, 30.0)),
            &create_test_candidates(OBJECT_POINTS.len()),
        )
        .unwrap();

        assert_translated(&record);
        assert_eq!(record.correspondences(), 10);
        assert_eq!(record.inliers(), 10);
    }

    #[test]
    fn test_staged_run_with_matcher() {
        let run = Registration::new(&RegistrationConfig::default(), Quadrilateral::from_size(100.0, 50.0))
            .unwrap()
            .with_reported_feature_time(Duration::from_millis(5))
            .load_features(create_test_features((0.0, 0.0)), create_test_features((20.0, 30.0)))
            .unwrap();
        assert_eq!(run.object().len(), 10);
        assert!(run.timing().feature >= Duration::from_millis(5));

        // Exact matches at distance 0 pass any ratio
        let run = run.match_features(&BruteForceMatcher).unwrap();
        assert_eq!(run.correspondences().len(), 10);

        let run = run.estimate_homography().unwrap();
        assert_eq!(run.estimate().inlier_mask, vec![true; 10]);

        let record = run.project_corners().unwrap();
        assert_translated(&record);
        assert!(record.timing().total() >= Duration::from_millis(5));
    }

    #[test]
    fn test_load_raw_features() {
        let kps: Vec<Keypoint> = OBJECT_POINTS.iter().map(|&(x, y)| Keypoint::at(x, y)).collect();
        let descriptors: Vec<f32> = (0..kps.len() * 2).map(|i| i as f32).collect();
        let run = Registration::new(&RegistrationConfig::default(), Quadrilateral::from_size(100.0, 50.0))
            .unwrap()
            .load_raw_features(kps.clone(), &descriptors, kps, &descriptors, 2)
            .unwrap();
        assert_eq!(run.scene().dim(), 2);
        assert_eq!(run.scene().get(3).unwrap().descriptor, vec![6.0, 7.0]);
    }

    #[test]
    fn test_descriptor_row_mismatch() {
        let kps = vec![Keypoint::at(0.0, 0.0), Keypoint::at(1.0, 1.0)];
        let result = Registration::new(&RegistrationConfig::default(), Quadrilateral::from_size(1.0, 1.0))
            .unwrap()
            .load_raw_features(kps.clone(), &[0.0; 6], kps, &[0.0; 5], 3);
        assert!(matches!(
            result,
            Err(RegistrationError::Core(CoreError::DimensionMismatch { .. }))
        ));
    }

    #[test]
    fn test_dimension_mismatch_between_sets() {
        let object = FeatureSet::from_parts(vec![Keypoint::at(0.0, 0.0)], &[1.0, 2.0], 2).unwrap();
        let scene = FeatureSet::from_parts(vec![Keypoint::at(0.0, 0.0)], &[1.0, 2.0, 3.0], 3).unwrap();
        let result = Registration::new(&RegistrationConfig::default(), Quadrilateral::from_size(1.0, 1.0))
            .unwrap()
            .load_features(object, scene);
        assert!(matches!(
            result,
            Err(RegistrationError::Core(CoreError::DimensionMismatch { .. }))
        ));
    }

    #[test]
    fn test_too_few_correspondences() {
        let object = create_test_features((0.0, 0.0));
        let scene = create_test_features((20.0, 30.0));
        let candidates = &create_test_candidates(OBJECT_POINTS.len())[..3];
        let result = register(
            &RegistrationConfig::default().with_ratio(1.0),
            Quadrilateral::from_size(100.0, 50.0),
            object,
            scene,
            candidates,
        );
        assert!(matches!(
            result,
            Err(RegistrationError::Homography(HomographyError::InsufficientCorrespondences { needed: 4, got: 3 }))
        ));
    }

    #[test]
    fn test_strict_ratio_rejects_everything() {
        // best/second = 0.2, so a ratio of 0.1 accepts nothing
        let run = Registration::new(
            &RegistrationConfig::default().with_ratio(0.1),
            Quadrilateral::from_size(100.0, 50.0),
        )
        .unwrap()
        .load_features(create_test_features((0.0, 0.0)), create_test_features((20.0, 30.0)))
        .unwrap()
        .filter_candidates(&create_test_candidates(OBJECT_POINTS.len()))
        .unwrap();
        assert!(run.correspondences().is_empty());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = Registration::new(&RegistrationConfig::default().with_ratio(-1.0), Quadrilateral::from_size(1.0, 1.0));
        assert!(matches!(result, Err(RegistrationError::Match(_))));
    }

    #[test]
    fn test_out_of_range_candidate() {
        let candidates = vec![CandidateMatch::single(0, Neighbor { train_index: 42, distance: 0.0 })];
        let result = Registration::new(&RegistrationConfig::default(), Quadrilateral::from_size(1.0, 1.0))
            .unwrap()
            .load_features(create_test_features((0.0, 0.0)), create_test_features((0.0, 0.0)))
            .unwrap()
            .filter_candidates(&candidates);
        assert!(matches!(result, Err(RegistrationError::Match(_))));
    }
}
