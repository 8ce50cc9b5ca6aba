//! Pinhole camera derived from the frame size.

use nalgebra::{Matrix3, Point2, Point3, Rotation3, Vector3, Vector4};

/// Assumed horizontal field of view, in degrees.
pub const HORIZONTAL_FOV_DEGREES: f64 = 60.0;

/// Intrinsics of the camera that took a frame.
///
/// Nothing about the real lens is known, so the focal length is derived from
/// the frame width and a fixed 60° horizontal field of view. Pixels are
/// assumed square: `fy` is set equal to `fx` rather than derived from a
/// vertical field of view.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    matrix: Matrix3<f64>,
    distortion: Vector4<f64>,
}

impl Camera {
    /// Build the camera for a `width` × `height` frame, without lens distortion.
    pub fn new(width: u32, height: u32) -> Self {
        let center_x = f64::from(width) / 2.0;
        let center_y = f64::from(height) / 2.0;
        let focal_x = center_x / (HORIZONTAL_FOV_DEGREES / 2.0).to_radians().tan();
        let focal_y = focal_x;

        #[rustfmt::skip]
        let matrix = Matrix3::new(
            focal_x, 0.0, center_x,
            0.0, focal_y, center_y,
            0.0, 0.0, 1.0,
        );

        Self {
            matrix,
            distortion: Vector4::zeros(),
        }
    }

    /// Replace the distortion coefficients (`k1, k2, p1, p2`), for when an
    /// external calibration is available.
    pub fn with_distortion(mut self, distortion: Vector4<f64>) -> Self {
        self.distortion = distortion;
        self
    }

    /// Intrinsic matrix.
    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }

    /// Distortion coefficients `k1, k2, p1, p2`.
    pub fn distortion(&self) -> &Vector4<f64> {
        &self.distortion
    }

    /// Horizontal focal length in pixels.
    pub fn focal_x(&self) -> f64 {
        self.matrix[(0, 0)]
    }

    /// Vertical focal length in pixels.
    pub fn focal_y(&self) -> f64 {
        self.matrix[(1, 1)]
    }

    /// Principal point.
    pub fn center(&self) -> Point2<f64> {
        Point2::new(self.matrix[(0, 2)], self.matrix[(1, 2)])
    }

    /// Project object-space points into pixel coordinates.
    ///
    /// `rotation` is a Rodrigues vector and `translation` moves the rotated
    /// points into camera space. Lens distortion follows the radial/tangential
    /// polynomial used by OpenCV's `projectPoints`.
    pub fn project_points(
        &self,
        points: &[Point3<f64>],
        rotation: &Vector3<f64>,
        translation: &Vector3<f64>,
    ) -> Vec<Point2<f64>> {
        let rotation = Rotation3::new(*rotation);
        points
            .iter()
            .map(|point| self.project_camera_point(&(rotation * point + translation)))
            .collect()
    }

    /// Project a point already expressed in camera space.
    pub fn project_camera_point(&self, point: &Point3<f64>) -> Point2<f64> {
        let x = point.x / point.z;
        let y = point.y / point.z;

        let [k1, k2, p1, p2] = [
            self.distortion[0],
            self.distortion[1],
            self.distortion[2],
            self.distortion[3],
        ];
        let r2 = x * x + y * y;
        let radial = 1.0 + k1 * r2 + k2 * r2 * r2;
        let distorted_x = x * radial + 2.0 * p1 * x * y + p2 * (r2 + 2.0 * x * x);
        let distorted_y = y * radial + p1 * (r2 + 2.0 * y * y) + 2.0 * p2 * x * y;

        let center = self.center();
        Point2::new(
            self.focal_x() * distorted_x + center.x,
            self.focal_y() * distorted_y + center.y,
        )
    }
}
