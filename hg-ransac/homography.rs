use hg_core::Point2;
use nalgebra::{Matrix3, Vector3};

use crate::error::{HomographyError, HomographyResult};

/// Homogeneous weights with smaller magnitude are treated as zero
pub const MIN_HOMOGENEOUS_WEIGHT: f64 = 1e-12;

/// Largest `|det|` relative to Hadamard's bound that still counts as singular
pub const SINGULAR_DET_RATIO: f64 = 1e-10;

/// Planar perspective transform with `h[2][2] == 1`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography(Matrix3<f64>);

impl Homography {
    pub fn identity() -> Self {
        Self(Matrix3::identity())
    }

    pub fn translation(tx: f64, ty: f64) -> Self {
        Self(Matrix3::new(1.0, 0.0, tx, 0.0, 1.0, ty, 0.0, 0.0, 1.0))
    }

    /// Scale `m` so its bottom-right entry is 1.
    /// Fails when that entry is zero, since the matrix cannot be normalized.
    pub fn from_matrix(m: Matrix3<f64>) -> HomographyResult<Self> {
        let scale = m[(2, 2)];
        if scale.abs() < MIN_HOMOGENEOUS_WEIGHT || !m.iter().all(|v| v.is_finite()) {
            return Err(HomographyError::DegenerateGeometry("homography cannot be normalized"));
        }
        Ok(Self(m / scale))
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.0
    }

    /// Apply to `(x, y)`; `None` when the point maps to infinity
    pub fn apply(&self, x: f64, y: f64) -> Option<[f64; 2]> {
        let p = self.0 * Vector3::new(x, y, 1.0);
        if p[2].abs() < MIN_HOMOGENEOUS_WEIGHT {
            return None;
        }
        Some([p[0] / p[2], p[1] / p[2]])
    }

    pub fn transform_point(&self, p: Point2) -> Option<Point2> {
        self.apply(p.x as f64, p.y as f64)
            .map(|[x, y]| Point2::new(x as f32, y as f32))
    }

    /// Euclidean distance between `H(src)` and `dst`; infinite if `src` maps to infinity
    pub fn reprojection_error(&self, src: &[f64; 2], dst: &[f64; 2]) -> f64 {
        match self.apply(src[0], src[1]) {
            Some(p) => ((p[0] - dst[0]).powi(2) + (p[1] - dst[1]).powi(2)).sqrt(),
            None => f64::INFINITY,
        }
    }

    /// Entry-wise comparison; both matrices are already normalized
    pub fn approx_eq(&self, other: &Homography, epsilon: f64) -> bool {
        self.0
            .iter()
            .zip(other.0.iter())
            .all(|(a, b)| (a - b).abs() <= epsilon)
    }

    /// Singular when `|det|` is negligible next to the product of the column
    /// norms (Hadamard's bound), so uniform scaling does not change the verdict
    pub(crate) fn is_singular(&self) -> bool {
        let bound: f64 = self.0.column_iter().map(|c| c.norm()).product();
        bound <= f64::MIN_POSITIVE || self.0.determinant().abs() <= SINGULAR_DET_RATIO * bound
    }
}

impl Default for Homography {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_from_matrix_normalizes_scale() {
        let m = Matrix3::new(2.0, 0.0, 4.0, 0.0, 2.0, 6.0, 0.0, 0.0, 2.0);
        let h = Homography::from_matrix(m).unwrap();
        assert!(h.approx_eq(&Homography::translation(2.0, 3.0), 1e-12));
    }

    #[test]
    fn test_from_matrix_rejects_zero_corner() {
        let m = Matrix3::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0);
        assert!(matches!(Homography::from_matrix(m), Err(HomographyError::DegenerateGeometry(_))));
    }

    #[test]
    fn test_apply_perspective() {
        let h = Homography::from_matrix(Matrix3::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.01, 0.0, 1.0)).unwrap();
        let p = h.apply(100.0, 50.0).unwrap();
        assert_relative_eq!(p[0], 50.0, epsilon = 1e-12);
        assert_relative_eq!(p[1], 25.0, epsilon = 1e-12);

        // Line at infinity
        assert!(h.apply(-100.0, 0.0).is_none());
        assert_eq!(h.reprojection_error(&[-100.0, 0.0], &[0.0, 0.0]), f64::INFINITY);
    }

    #[test]
    fn test_strong_scale_down_is_not_singular() {
        // det = 1e-14, far below any absolute cut-off, yet perfectly invertible
        let h = Homography::from_matrix(Matrix3::new(1e-7, 0.0, 3.0, 0.0, 1e-7, 2.0, 0.0, 0.0, 1.0)).unwrap();
        assert!(!h.is_singular());
        assert!(!Homography::identity().is_singular());
    }

    #[test]
    fn test_rank_deficient_is_singular() {
        let h = Homography::from_matrix(Matrix3::new(1.0, 2.0, 3.0, 2.0, 4.0, 6.0, 0.0, 0.0, 1.0)).unwrap();
        assert!(h.is_singular());
    }

    #[test]
    fn test_reprojection_error() {
        let h = Homography::translation(3.0, 4.0);
        assert_relative_eq!(h.reprojection_error(&[0.0, 0.0], &[0.0, 0.0]), 5.0, epsilon = 1e-12);
    }
}
