//! Direct linear transform kernels.
//!
//! Both solvers work on Hartley-normalized coordinates (centroid at the
//! origin, mean distance sqrt(2)) and map the result back afterwards.

use nalgebra::{Matrix3, SMatrix, SVector, SymmetricEigen};

use crate::homography::Homography;

/// Relative tolerance for collinearity (sine of the angle between two spans)
pub const COLLINEAR_EPS: f64 = 1e-5;
/// Points closer than this (pixels) are coincident
pub const COINCIDENT_EPS: f64 = 1e-6;

type Matrix8 = SMatrix<f64, 8, 8>;
type Vector8 = SVector<f64, 8>;
type Matrix9 = SMatrix<f64, 9, 9>;
type Vector9 = SVector<f64, 9>;

/// Translate the centroid to the origin and scale the mean distance to sqrt(2).
/// `None` when every point coincides.
pub fn normalize_points(pts: &[[f64; 2]]) -> Option<(Matrix3<f64>, Vec<[f64; 2]>)> {
    let n = pts.len() as f64;
    let cx = pts.iter().map(|p| p[0]).sum::<f64>() / n;
    let cy = pts.iter().map(|p| p[1]).sum::<f64>() / n;

    let mean_dist = pts
        .iter()
        .map(|p| ((p[0] - cx).powi(2) + (p[1] - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    if mean_dist < COINCIDENT_EPS {
        return None;
    }

    let s = std::f64::consts::SQRT_2 / mean_dist;
    let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);
    let normalized = pts.iter().map(|p| [s * (p[0] - cx), s * (p[1] - cy)]).collect();
    Some((t, normalized))
}

/// Exact homography through four correspondences.
///
/// Solves the 8x8 system obtained by fixing `h33 = 1`. Returns `None` if the
/// system is singular.
pub fn solve_minimal(src: &[[f64; 2]; 4], dst: &[[f64; 2]; 4]) -> Option<Homography> {
    let (t_src, src_n) = normalize_points(src)?;
    let (t_dst, dst_n) = normalize_points(dst)?;

    let mut a = Matrix8::zeros();
    let mut b = Vector8::zeros();
    for i in 0..4 {
        let [x, y] = src_n[i];
        let [u, v] = dst_n[i];

        // u = (h0 x + h1 y + h2) / (h6 x + h7 y + 1)
        a[(2 * i, 0)] = x;
        a[(2 * i, 1)] = y;
        a[(2 * i, 2)] = 1.0;
        a[(2 * i, 6)] = -u * x;
        a[(2 * i, 7)] = -u * y;
        b[2 * i] = u;

        // v = (h3 x + h4 y + h5) / (h6 x + h7 y + 1)
        a[(2 * i + 1, 3)] = x;
        a[(2 * i + 1, 4)] = y;
        a[(2 * i + 1, 5)] = 1.0;
        a[(2 * i + 1, 6)] = -v * x;
        a[(2 * i + 1, 7)] = -v * y;
        b[2 * i + 1] = v;
    }

    let h = a.lu().solve(&b)?;
    let h_norm = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0);
    denormalize(&t_src, &t_dst, &h_norm)
}

/// Least-squares homography through `n >= 4` correspondences.
///
/// The solution is the eigenvector of the smallest eigenvalue of `AᵀA`,
/// where `A` is the `2n x 9` DLT design matrix.
pub fn solve_least_squares(src: &[[f64; 2]], dst: &[[f64; 2]]) -> Option<Homography> {
    if src.len() < 4 || src.len() != dst.len() {
        return None;
    }
    let (t_src, src_n) = normalize_points(src)?;
    let (t_dst, dst_n) = normalize_points(dst)?;

    // Accumulate AᵀA row pair by row pair instead of materializing A
    let mut ata = Matrix9::zeros();
    for (s, d) in src_n.iter().zip(&dst_n) {
        let [x, y] = *s;
        let [u, v] = *d;
        let r1 = Vector9::from_column_slice(&[0.0, 0.0, 0.0, -x, -y, -1.0, v * x, v * y, v]);
        let r2 = Vector9::from_column_slice(&[x, y, 1.0, 0.0, 0.0, 0.0, -u * x, -u * y, -u]);
        ata += r1 * r1.transpose();
        ata += r2 * r2.transpose();
    }

    let eig = SymmetricEigen::new(ata);
    let (min_idx, _) = eig
        .eigenvalues
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))?;
    let h = eig.eigenvectors.column(min_idx);
    let h_norm = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]);
    denormalize(&t_src, &t_dst, &h_norm)
}

/// H = T_dst⁻¹ · H_norm · T_src, rescaled so `h33 = 1`
fn denormalize(t_src: &Matrix3<f64>, t_dst: &Matrix3<f64>, h_norm: &Matrix3<f64>) -> Option<Homography> {
    let t_dst_inv = t_dst.try_inverse()?;
    let h = Homography::from_matrix(t_dst_inv * h_norm * t_src).ok()?;
    if h.is_singular() {
        return None;
    }
    Some(h)
}

/// True if `a`, `b`, `c` lie on one line, or two of them coincide
pub fn collinear(a: &[f64; 2], b: &[f64; 2], c: &[f64; 2]) -> bool {
    let (d1x, d1y) = (b[0] - a[0], b[1] - a[1]);
    let (d2x, d2y) = (c[0] - a[0], c[1] - a[1]);
    let n1 = d1x.hypot(d1y);
    let n2 = d2x.hypot(d2y);
    if n1 < COINCIDENT_EPS || n2 < COINCIDENT_EPS {
        return true;
    }
    (d1x * d2y - d1y * d2x).abs() <= COLLINEAR_EPS * n1 * n2
}

/// A minimal sample is usable only if no three of its points are collinear
pub fn is_degenerate_sample(pts: &[[f64; 2]; 4]) -> bool {
    const TRIPLES: [(usize, usize, usize); 4] = [(0, 1, 2), (0, 1, 3), (0, 2, 3), (1, 2, 3)];
    TRIPLES
        .iter()
        .any(|&(i, j, k)| collinear(&pts[i], &pts[j], &pts[k]))
}

/// True if every point lies on a single line (or all coincide)
pub fn all_collinear(pts: &[[f64; 2]]) -> bool {
    let Some(first) = pts.first() else {
        return true;
    };
    let far = pts.iter().max_by(|a, b| {
        let da = (a[0] - first[0]).hypot(a[1] - first[1]);
        let db = (b[0] - first[0]).hypot(b[1] - first[1]);
        da.total_cmp(&db)
    });
    match far {
        Some(far) if (far[0] - first[0]).hypot(far[1] - first[1]) >= COINCIDENT_EPS => {
            pts.iter().all(|p| collinear(first, far, p))
        }
        _ => true,
    }
}
