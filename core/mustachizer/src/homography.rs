//! Planar homography from four point correspondences.

use imageproc::geometric_transformations::Projection;
use nalgebra::{Matrix3, Point2, SMatrix, SVector};

/// A 3×3 projective transform between two planes, normalized so that the
/// bottom-right entry is 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography {
    matrix: Matrix3<f64>,
}

impl Homography {
    /// Solve the homography mapping each `from[i]` onto `to[i]`.
    ///
    /// Eight unknowns, two equations per correspondence. Returns `None` when
    /// the system is singular (three or more collinear points on either side).
    pub fn from_correspondences(from: &[Point2<f64>; 4], to: &[Point2<f64>; 4]) -> Option<Self> {
        let mut a = SMatrix::<f64, 8, 8>::zeros();
        let mut b = SVector::<f64, 8>::zeros();

        for (i, (src, dst)) in from.iter().zip(to.iter()).enumerate() {
            let (x, y) = (src.x, src.y);
            let (u, v) = (dst.x, dst.y);

            let row = 2 * i;
            a[(row, 0)] = x;
            a[(row, 1)] = y;
            a[(row, 2)] = 1.0;
            a[(row, 6)] = -u * x;
            a[(row, 7)] = -u * y;
            b[row] = u;

            a[(row + 1, 3)] = x;
            a[(row + 1, 4)] = y;
            a[(row + 1, 5)] = 1.0;
            a[(row + 1, 6)] = -v * x;
            a[(row + 1, 7)] = -v * y;
            b[row + 1] = v;
        }

        let h = a.lu().solve(&b)?;
        if h.iter().any(|value| !value.is_finite()) {
            return None;
        }

        #[rustfmt::skip]
        let matrix = Matrix3::new(
            h[0], h[1], h[2],
            h[3], h[4], h[5],
            h[6], h[7], 1.0,
        );
        if matrix.determinant().abs() <= 1e-12 * matrix.norm().powi(3) {
            return None;
        }

        Some(Self { matrix })
    }

    /// The normalized 3×3 matrix.
    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }

    /// Map a point through the transform.
    pub fn apply(&self, point: &Point2<f64>) -> Point2<f64> {
        let mapped = self.matrix * point.to_homogeneous();
        Point2::new(mapped.x / mapped.z, mapped.y / mapped.z)
    }

    /// Convert into the single-precision projection used for warping.
    pub fn to_projection(&self) -> Option<Projection> {
        let m = &self.matrix;
        #[rustfmt::skip]
        let transform = [
            m[(0, 0)] as f32, m[(0, 1)] as f32, m[(0, 2)] as f32,
            m[(1, 0)] as f32, m[(1, 1)] as f32, m[(1, 2)] as f32,
            m[(2, 0)] as f32, m[(2, 1)] as f32, m[(2, 2)] as f32,
        ];
        Projection::from_matrix(transform)
    }
}
