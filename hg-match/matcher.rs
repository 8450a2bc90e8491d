use hg_core::{CandidateMatch, Feature, FeatureSet, Neighbor};
use log::debug;
use rayon::prelude::*;

use crate::MatchResult;

/// Finds the two nearest scene descriptors (L2) for every object descriptor.
///
/// Implementations are interchangeable at runtime; the registration core only
/// sees the resulting candidates.
pub trait KnnMatcher {
    /// Short backend name used in logs
    fn name(&self) -> &'static str;

    /// One candidate per object feature, in object order.
    /// Returns nothing when the scene is empty.
    fn knn_match(&self, object: &FeatureSet, scene: &FeatureSet) -> MatchResult<Vec<CandidateMatch>>;
}

/// Exhaustive single-threaded search
#[derive(Debug, Clone, Copy, Default)]
pub struct BruteForceMatcher;

impl KnnMatcher for BruteForceMatcher {
    fn name(&self) -> &'static str {
        "brute-force"
    }

    fn knn_match(&self, object: &FeatureSet, scene: &FeatureSet) -> MatchResult<Vec<CandidateMatch>> {
        object.check_compatible(scene)?;
        let candidates: Vec<CandidateMatch> = object
            .iter()
            .enumerate()
            .filter_map(|(i, query)| nearest_two(i, query, scene))
            .collect();
        debug!("BruteForceMatcher produced {} candidates", candidates.len());
        Ok(candidates)
    }
}

/// Exhaustive search with object descriptors spread over a local rayon pool
#[derive(Debug, Clone, Copy)]
pub struct ParallelBruteForceMatcher {
    n_threads: usize,
}

impl Default for ParallelBruteForceMatcher {
    fn default() -> Self {
        Self {
            n_threads: num_cpus::get().max(1),
        }
    }
}

impl ParallelBruteForceMatcher {
    pub fn new(n_threads: usize) -> Self {
        Self {
            n_threads: n_threads.max(1),
        }
    }

    pub fn threads(&self) -> usize {
        self.n_threads
    }
}

impl KnnMatcher for ParallelBruteForceMatcher {
    fn name(&self) -> &'static str {
        "parallel-brute-force"
    }

    fn knn_match(&self, object: &FeatureSet, scene: &FeatureSet) -> MatchResult<Vec<CandidateMatch>> {
        object.check_compatible(scene)?;

        // Local pool: concurrent runs must not share global state
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.n_threads)
            .build()?;

        let candidates: Vec<CandidateMatch> = pool.install(|| {
            object
                .features()
                .par_iter()
                .enumerate()
                .filter_map(|(i, query)| nearest_two(i, query, scene))
                .collect()
        });
        debug!(
            "ParallelBruteForceMatcher ({} threads) produced {} candidates",
            self.n_threads,
            candidates.len()
        );
        Ok(candidates)
    }
}

fn nearest_two(query_index: usize, query: &Feature, scene: &FeatureSet) -> Option<CandidateMatch> {
    let mut best: Option<Neighbor> = None;
    let mut second: Option<Neighbor> = None;

    for (train_index, train) in scene.iter().enumerate() {
        let d = query.distance_sq(train);
        match best {
            Some(b) if d >= b.distance => {
                if second.is_none_or(|s| d < s.distance) {
                    second = Some(Neighbor::new(train_index, d));
                }
            }
            _ => {
                second = best;
                best = Some(Neighbor::new(train_index, d));
            }
        }
    }

    // Distances were tracked squared
    let root = |n: Neighbor| Neighbor::new(n.train_index, n.distance.sqrt());
    let best = root(best?);
    Some(match second {
        Some(s) => CandidateMatch::new(query_index, best, root(s)),
        None => CandidateMatch::single(query_index, best),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hg_core::Keypoint;

    fn create_test_set(rows: &[[f32; 2]]) -> FeatureSet {
        let keypoints = (0..rows.len()).map(|i| Keypoint::at(i as f32, 0.0)).collect();
        let flat: Vec<f32> = rows.iter().flatten().copied().collect();
        FeatureSet::from_parts(keypoints, &flat, 2).unwrap()
    }

    #[test]
    fn test_brute_force_nearest_two() {
        let object = create_test_set(&[[0.0, 0.0], [10.0, 10.0]]);
        let scene = create_test_set(&[[3.0, 4.0], [1.0, 0.0], [10.0, 12.0]]);

        let candidates = BruteForceMatcher.knn_match(&object, &scene).unwrap();
        assert_eq!(candidates.len(), 2);

        assert_eq!(candidates[0].best, Neighbor::new(1, 1.0));
        assert_eq!(candidates[0].second, Some(Neighbor::new(0, 5.0)));
        assert_eq!(candidates[1].query_index, 1);
        assert_eq!(candidates[1].best, Neighbor::new(2, 2.0));
    }

    #[test]
    fn test_single_scene_feature() {
        let object = create_test_set(&[[0.0, 0.0]]);
        let scene = create_test_set(&[[1.0, 1.0]]);

        let candidates = BruteForceMatcher.knn_match(&object, &scene).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].second, None);
    }

    #[test]
    fn test_empty_scene() {
        let object = create_test_set(&[[0.0, 0.0]]);
        let candidates = BruteForceMatcher.knn_match(&object, &FeatureSet::default()).unwrap();
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_dimension_mismatch() {
        let object = create_test_set(&[[0.0, 0.0]]);
        let scene = FeatureSet::from_parts(vec![Keypoint::at(0.0, 0.0)], &[0.0; 3], 3).unwrap();
        assert!(matches!(
            BruteForceMatcher.knn_match(&object, &scene),
            Err(crate::MatchError::Core(_))
        ));
    }

    #[test]
    fn test_backends_agree() {
        let rows: Vec<[f32; 2]> = (0..50).map(|i| [(i * 7 % 13) as f32, (i * 5 % 11) as f32]).collect();
        let object = create_test_set(&rows[..20]);
        let scene = create_test_set(&rows[10..]);

        let serial = BruteForceMatcher.knn_match(&object, &scene).unwrap();
        let parallel = ParallelBruteForceMatcher::new(4).knn_match(&object, &scene).unwrap();
        assert_eq!(serial, parallel);
    }
}
