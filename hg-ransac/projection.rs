use hg_core::{Point2, Quadrilateral};

use crate::error::{HomographyError, HomographyResult};
use crate::homography::Homography;

/// Maps the object's reference corners into the scene
pub struct CornerProjector;

impl CornerProjector {
    /// Apply `[x' y' w']ᵀ = H·[x y 1]ᵀ` to every corner and divide by `w'`.
    ///
    /// Vertex order is preserved. Fails with `SingularProjection` naming the
    /// first corner whose homogeneous weight vanishes.
    pub fn project(corners: &Quadrilateral, h: &Homography) -> HomographyResult<Quadrilateral> {
        let mut projected = [Point2::default(); 4];
        for (corner, (src, dst)) in corners.vertices().iter().zip(projected.iter_mut()).enumerate() {
            *dst = h
                .transform_point(*src)
                .ok_or(HomographyError::SingularProjection { corner })?;
        }
        Ok(Quadrilateral::new(projected))
    }
}
