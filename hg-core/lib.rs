use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq)]
pub enum CoreError {
    /// Descriptor rows, descriptor lengths or descriptor dimensions disagree
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },
}

impl std::fmt::Display for CoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoreError::DimensionMismatch { context, expected, actual } => {
                write!(f, "Dimension mismatch ({}): expected {}, got {}", context, expected, actual)
            }
        }
    }
}

impl std::error::Error for CoreError {}

pub type CoreResult<T> = Result<T, CoreError>;

/// 2D point in image coordinates (pixels)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Point2 {
    pub x: f32,
    pub y: f32,
}

impl Point2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point2) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Detected keypoint as delivered by the external detector
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Keypoint {
    pub pt: Point2,
    pub size: f32,
    pub angle: f32,
    pub response: f32,
    pub octave: i32,
    pub class_id: Option<i32>,
}

impl Keypoint {
    /// Keypoint at `(x, y)` with neutral metadata
    pub fn at(x: f32, y: f32) -> Self {
        Self {
            pt: Point2::new(x, y),
            size: 1.0,
            angle: -1.0,
            response: 0.0,
            octave: 0,
            class_id: None,
        }
    }
}

/// Keypoint bundled with its descriptor row
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub keypoint: Keypoint,
    pub descriptor: Vec<f32>,
}

impl Feature {
    pub fn new(keypoint: Keypoint, descriptor: Vec<f32>) -> Self {
        Self { keypoint, descriptor }
    }

    /// Squared L2 distance between two descriptors of equal length
    pub fn distance_sq(&self, other: &Feature) -> f32 {
        self.descriptor
            .iter()
            .zip(&other.descriptor)
            .map(|(a, b)| (a - b) * (a - b))
            .sum()
    }
}

/// All features of one image, sharing a single descriptor dimension
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureSet {
    features: Vec<Feature>,
    dim: usize,
}

impl FeatureSet {
    /// Pair keypoints with the rows of a row-major descriptor matrix.
    ///
    /// The matrix must hold exactly `keypoints.len()` rows of `dim` values.
    pub fn from_parts(keypoints: Vec<Keypoint>, descriptors: &[f32], dim: usize) -> CoreResult<Self> {
        if dim == 0 && !keypoints.is_empty() {
            return Err(CoreError::DimensionMismatch {
                context: "descriptor dimension",
                expected: 1,
                actual: 0,
            });
        }
        let expected_len = keypoints.len() * dim;
        if descriptors.len() != expected_len {
            return Err(CoreError::DimensionMismatch {
                context: "descriptor matrix length",
                expected: expected_len,
                actual: descriptors.len(),
            });
        }

        let features = keypoints
            .into_iter()
            .zip(descriptors.chunks_exact(dim.max(1)))
            .map(|(kp, row)| Feature::new(kp, row.to_vec()))
            .collect();

        Ok(Self { features, dim })
    }

    /// Build from already paired features; all descriptors must share one length
    pub fn from_features(features: Vec<Feature>) -> CoreResult<Self> {
        let dim = features.first().map_or(0, |f| f.descriptor.len());
        if let Some(bad) = features.iter().find(|f| f.descriptor.len() != dim) {
            return Err(CoreError::DimensionMismatch {
                context: "descriptor length",
                expected: dim,
                actual: bad.descriptor.len(),
            });
        }
        Ok(Self { features, dim })
    }

    /// Checks that descriptors of both sets can be compared.
    /// An empty set has no dimension and is compatible with anything.
    pub fn check_compatible(&self, other: &FeatureSet) -> CoreResult<()> {
        if self.is_empty() || other.is_empty() || self.dim == other.dim {
            return Ok(());
        }
        Err(CoreError::DimensionMismatch {
            context: "object vs scene descriptor dimension",
            expected: self.dim,
            actual: other.dim,
        })
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn get(&self, index: usize) -> Option<&Feature> {
        self.features.get(index)
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Feature> {
        self.features.iter()
    }
}

/// One of the nearest scene descriptors for a query
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Neighbor {
    pub train_index: usize,
    pub distance: f32,
}

impl Neighbor {
    pub const fn new(train_index: usize, distance: f32) -> Self {
        Self { train_index, distance }
    }
}

/// Top-2 nearest scene neighbours of one object descriptor.
/// `second` is `None` when the scene holds fewer than two descriptors.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CandidateMatch {
    pub query_index: usize,
    pub best: Neighbor,
    pub second: Option<Neighbor>,
}

impl CandidateMatch {
    pub fn new(query_index: usize, best: Neighbor, second: Neighbor) -> Self {
        Self { query_index, best, second: Some(second) }
    }

    pub fn single(query_index: usize, best: Neighbor) -> Self {
        Self { query_index, best, second: None }
    }

    /// Build from a distance-sorted neighbour list; `None` when it is empty
    pub fn from_knn(query_index: usize, neighbors: &[Neighbor]) -> Option<Self> {
        let best = *neighbors.first()?;
        Some(Self {
            query_index,
            best,
            second: neighbors.get(1).copied(),
        })
    }
}

/// Object point paired with the scene point it was matched to
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Correspondence {
    pub object: Point2,
    pub scene: Point2,
    pub query_index: usize,
    pub train_index: usize,
}

impl Correspondence {
    pub fn new(object: Point2, scene: Point2) -> Self {
        Self { object, scene, query_index: 0, train_index: 0 }
    }
}

/// Four ordered vertices: top-left, top-right, bottom-right, bottom-left
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Quadrilateral {
    vertices: [Point2; 4],
}

impl Quadrilateral {
    pub const fn new(vertices: [Point2; 4]) -> Self {
        Self { vertices }
    }

    /// Corners of a `width` x `height` object image
    pub fn from_size(width: f32, height: f32) -> Self {
        Self::new([
            Point2::new(0.0, 0.0),
            Point2::new(width, 0.0),
            Point2::new(width, height),
            Point2::new(0.0, height),
        ])
    }

    pub fn vertices(&self) -> &[Point2; 4] {
        &self.vertices
    }

    /// Consecutive vertex pairs, closing from the last vertex back to the first
    pub fn edges(&self) -> impl Iterator<Item = (Point2, Point2)> + '_ {
        (0..4).map(move |i| (self.vertices[i], self.vertices[(i + 1) % 4]))
    }
}

/// Elapsed time of the feature, matching and homography phases
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StageTiming {
    pub feature: Duration,
    pub matching: Duration,
    pub homography: Duration,
}

impl StageTiming {
    pub fn total(&self) -> Duration {
        self.feature + self.matching + self.homography
    }
}

/// Outcome of one registration run
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    quad: Quadrilateral,
    timing: StageTiming,
    correspondences: usize,
    inliers: usize,
}

impl ResultRecord {
    pub fn new(quad: Quadrilateral, timing: StageTiming, correspondences: usize, inliers: usize) -> Self {
        Self { quad, timing, correspondences, inliers }
    }

    /// Object corners projected into the scene
    pub fn quad(&self) -> &Quadrilateral {
        &self.quad
    }

    pub fn timing(&self) -> &StageTiming {
        &self.timing
    }

    /// Number of correspondences that survived the ratio test
    pub fn correspondences(&self) -> usize {
        self.correspondences
    }

    /// Number of correspondences consistent with the final homography
    pub fn inliers(&self) -> usize {
        self.inliers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_keypoints(n: usize) -> Vec<Keypoint> {
        (0..n).map(|i| Keypoint::at(i as f32, 2.0 * i as f32)).collect()
    }

    #[test]
    fn test_from_parts_pairs_rows() {
        let descriptors = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let set = FeatureSet::from_parts(create_test_keypoints(3), &descriptors, 2).unwrap();

        assert_eq!(set.len(), 3);
        assert_eq!(set.dim(), 2);
        assert_eq!(set.get(1).unwrap().descriptor, vec![2.0, 3.0]);
        assert_eq!(set.get(2).unwrap().keypoint.pt, Point2::new(2.0, 4.0));
    }

    #[test]
    fn test_from_parts_row_count_mismatch() {
        let descriptors = [0.0; 5];
        let result = FeatureSet::from_parts(create_test_keypoints(3), &descriptors, 2);
        assert!(matches!(result, Err(CoreError::DimensionMismatch { expected: 6, actual: 5, .. })));
    }

    #[test]
    fn test_from_parts_zero_dimension() {
        let result = FeatureSet::from_parts(create_test_keypoints(2), &[], 0);
        assert!(matches!(result, Err(CoreError::DimensionMismatch { .. })));

        // No keypoints, nothing to describe
        assert!(FeatureSet::from_parts(Vec::new(), &[], 0).is_ok());
    }

    #[test]
    fn test_from_features_uneven_lengths() {
        let features = vec![
            Feature::new(Keypoint::at(0.0, 0.0), vec![1.0; 4]),
            Feature::new(Keypoint::at(1.0, 0.0), vec![1.0; 3]),
        ];
        assert!(matches!(
            FeatureSet::from_features(features),
            Err(CoreError::DimensionMismatch { expected: 4, actual: 3, .. })
        ));
    }

    #[test]
    fn test_compatibility() {
        let a = FeatureSet::from_parts(create_test_keypoints(1), &[0.0; 64], 64).unwrap();
        let b = FeatureSet::from_parts(create_test_keypoints(1), &[0.0; 128], 128).unwrap();
        let empty = FeatureSet::default();

        assert!(a.check_compatible(&a).is_ok());
        assert!(a.check_compatible(&empty).is_ok());
        assert!(matches!(a.check_compatible(&b), Err(CoreError::DimensionMismatch { expected: 64, actual: 128, .. })));
    }

    #[test]
    fn test_descriptor_distance() {
        let a = Feature::new(Keypoint::at(0.0, 0.0), vec![0.0, 0.0]);
        let b = Feature::new(Keypoint::at(0.0, 0.0), vec![3.0, 4.0]);
        assert_eq!(a.distance_sq(&b), 25.0);
    }

    #[test]
    fn test_candidate_from_knn() {
        assert!(CandidateMatch::from_knn(0, &[]).is_none());

        let single = CandidateMatch::from_knn(3, &[Neighbor::new(1, 0.5)]).unwrap();
        assert_eq!(single.second, None);

        let pair = CandidateMatch::from_knn(3, &[Neighbor::new(1, 0.5), Neighbor::new(7, 0.9)]).unwrap();
        assert_eq!(pair.second, Some(Neighbor::new(7, 0.9)));
    }

    #[test]
    fn test_quadrilateral_edges_wrap() {
        let quad = Quadrilateral::from_size(100.0, 50.0);
        let edges: Vec<_> = quad.edges().collect();

        assert_eq!(edges.len(), 4);
        assert_eq!(edges[1], (Point2::new(100.0, 0.0), Point2::new(100.0, 50.0)));
        assert_eq!(edges[3], (Point2::new(0.0, 50.0), Point2::new(0.0, 0.0)));
    }

    #[test]
    fn test_timing_total() {
        let timing = StageTiming {
            feature: Duration::from_millis(3),
            matching: Duration::from_millis(5),
            homography: Duration::from_millis(7),
        };
        assert_eq!(timing.total(), Duration::from_millis(15));
    }
}
