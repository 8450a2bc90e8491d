use hg_core::Correspondence;
use log::debug;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::RansacConfig;
use crate::dlt;
use crate::error::{HomographyError, HomographyResult};
use crate::homography::Homography;

/// Points needed to pin down the 8 degrees of freedom
pub const MIN_CORRESPONDENCES: usize = 4;

/// Result of a robust homography fit
#[derive(Debug, Clone, PartialEq)]
pub struct Estimate {
    pub homography: Homography,
    /// One flag per input correspondence, true for inliers of `homography`
    pub inlier_mask: Vec<bool>,
    pub inliers: usize,
    /// Minimal-sample trials actually spent
    pub trials: usize,
}

/// Best minimal-sample hypothesis seen so far
struct Hypothesis {
    homography: Homography,
    inliers: usize,
    error: f64,
    mask: Vec<bool>,
}

impl Hypothesis {
    /// More inliers win; equal support goes to the lower summed inlier error
    fn beats(&self, other: &Hypothesis) -> bool {
        self.inliers > other.inliers || (self.inliers == other.inliers && self.error < other.error)
    }
}

/// RANSAC homography estimator with a least-squares refit over the consensus set
#[derive(Debug, Clone, Default)]
pub struct RansacEstimator {
    config: RansacConfig,
}

impl RansacEstimator {
    pub fn new(config: RansacConfig) -> HomographyResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RansacConfig {
        &self.config
    }

    /// Fit a homography mapping object points onto scene points.
    ///
    /// Fails with `InsufficientCorrespondences` below four pairs and with
    /// `DegenerateGeometry` when no non-degenerate sample exists or the refit
    /// is singular.
    pub fn estimate(&self, correspondences: &[Correspondence]) -> HomographyResult<Estimate> {
        let n = correspondences.len();
        if n < MIN_CORRESPONDENCES {
            return Err(HomographyError::InsufficientCorrespondences {
                needed: MIN_CORRESPONDENCES,
                got: n,
            });
        }

        let src: Vec<[f64; 2]> = correspondences
            .iter()
            .map(|c| [c.object.x as f64, c.object.y as f64])
            .collect();
        let dst: Vec<[f64; 2]> = correspondences
            .iter()
            .map(|c| [c.scene.x as f64, c.scene.y as f64])
            .collect();

        if dlt::all_collinear(&src) || dlt::all_collinear(&dst) {
            return Err(HomographyError::DegenerateGeometry("all correspondences are collinear"));
        }

        let (best, trials) = self.search(&src, &dst)?;

        // Refit on the whole consensus set of the best minimal hypothesis
        let (inlier_src, inlier_dst): (Vec<[f64; 2]>, Vec<[f64; 2]>) = src
            .iter()
            .zip(&dst)
            .zip(&best.mask)
            .filter(|(_, inlier)| **inlier)
            .map(|((s, d), _)| (*s, *d))
            .unzip();

        let refined = dlt::solve_least_squares(&inlier_src, &inlier_dst)
            .ok_or(HomographyError::DegenerateGeometry("refined fit is singular"))?;

        let (inliers, _, inlier_mask) = self.score(&refined, &src, &dst);
        debug!(
            "RansacEstimator::estimate {} trials, minimal inliers {}/{}, refined inliers {}/{}",
            trials, best.inliers, n, inliers, n
        );

        Ok(Estimate {
            homography: refined,
            inlier_mask,
            inliers,
            trials,
        })
    }

    /// Draw minimal samples until the adaptive trial budget runs out
    fn search(&self, src: &[[f64; 2]], dst: &[[f64; 2]]) -> HomographyResult<(Hypothesis, usize)> {
        let n = src.len();
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut budget = self.config.max_iters;
        let mut best: Option<Hypothesis> = None;
        let mut trials = 0;

        while trials < budget {
            trials += 1;

            let Some(sample) = self.draw_sample(&mut rng, src, dst) else {
                continue;
            };
            let s4 = sample.map(|i| src[i]);
            let d4 = sample.map(|i| dst[i]);
            let Some(h) = dlt::solve_minimal(&s4, &d4) else {
                continue;
            };

            let candidate = self.hypothesis(h, src, dst);
            if best.as_ref().is_none_or(|b| candidate.beats(b)) {
                let outlier_ratio = (n - candidate.inliers) as f64 / n as f64;
                budget = budget.min(update_num_iters(
                    self.config.confidence,
                    outlier_ratio,
                    MIN_CORRESPONDENCES,
                    self.config.max_iters,
                ));
                best = Some(candidate);
            }
        }

        let best = best.ok_or(HomographyError::DegenerateGeometry(
            "no non-degenerate minimal sample within the trial budget",
        ))?;
        if best.inliers < MIN_CORRESPONDENCES {
            return Err(HomographyError::DegenerateGeometry("consensus set smaller than a minimal sample"));
        }
        debug!(
            "RansacEstimator::search best hypothesis {:?} with {} inliers",
            best.homography.matrix().as_slice(),
            best.inliers
        );
        Ok((best, trials))
    }

    /// Four distinct indices whose points are neither coincident nor
    /// three-collinear in either image
    fn draw_sample(&self, rng: &mut StdRng, src: &[[f64; 2]], dst: &[[f64; 2]]) -> Option<[usize; 4]> {
        for _ in 0..self.config.max_sample_attempts {
            let picked = rand::seq::index::sample(rng, src.len(), MIN_CORRESPONDENCES);
            let idx = [picked.index(0), picked.index(1), picked.index(2), picked.index(3)];
            if !dlt::is_degenerate_sample(&idx.map(|i| src[i])) && !dlt::is_degenerate_sample(&idx.map(|i| dst[i])) {
                return Some(idx);
            }
        }
        None
    }

    fn hypothesis(&self, homography: Homography, src: &[[f64; 2]], dst: &[[f64; 2]]) -> Hypothesis {
        let (inliers, error, mask) = self.score(&homography, src, dst);
        Hypothesis { homography, inliers, error, mask }
    }

    /// Inlier count, summed inlier error and inlier mask of `h`
    fn score(&self, h: &Homography, src: &[[f64; 2]], dst: &[[f64; 2]]) -> (usize, f64, Vec<bool>) {
        let mut count = 0usize;
        let mut error = 0.0f64;
        let mask: Vec<bool> = src
            .iter()
            .zip(dst)
            .map(|(s, d)| {
                let err = h.reprojection_error(s, d);
                let inlier = err < self.config.inlier_threshold;
                if inlier {
                    count += 1;
                    error += err;
                }
                inlier
            })
            .collect();
        (count, error, mask)
    }
}

/// Trials needed to draw one all-inlier sample of `model_points` with
/// probability `confidence`, given the current outlier ratio. Capped at `max_iters`.
pub fn update_num_iters(confidence: f64, outlier_ratio: f64, model_points: usize, max_iters: usize) -> usize {
    let ep = outlier_ratio.clamp(0.0, 1.0);
    let p = confidence.clamp(0.0, 1.0);

    let num = (1.0 - p).max(f64::MIN_POSITIVE);
    let denom = 1.0 - (1.0 - ep).powi(model_points as i32);
    if denom < f64::MIN_POSITIVE {
        return 0;
    }

    let num = num.ln();
    let denom = denom.ln();
    if denom >= 0.0 || -num >= max_iters as f64 * -denom {
        max_iters
    } else {
        (num / denom).round() as usize
    }
}

/// Shorthand for a one-off estimate with the given configuration
pub fn find_homography(correspondences: &[Correspondence], config: &RansacConfig) -> HomographyResult<Estimate> {
    RansacEstimator::new(config.clone())?.estimate(correspondences)
}
