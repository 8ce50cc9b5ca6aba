use image::RgbaImage;
use nalgebra::Point2;

use crate::camera::Camera;
pub use crate::face::{FaceBounds, FacePose};
use crate::pose::{face_model, frontal_pose, select_landmarks, solve_pnp};

/// Pluggable face pose detection.
///
/// Implementations find every face in a frame and return its pose in the
/// camera frame described by `camera`. An empty result means no faces.
///
/// ```no_run
/// use mustachizer::{Camera, FaceDetector, FacePose};
/// use image::RgbaImage;
///
/// struct Fixed(FacePose);
/// impl FaceDetector for Fixed {
///     fn detect(&self, _frame: &RgbaImage, _camera: &Camera) -> Vec<FacePose> {
///         vec![self.0.clone()]
///     }
/// }
/// ```
pub trait FaceDetector: Send + Sync {
    /// Detect faces in one frame.
    fn detect(&self, frame: &RgbaImage, camera: &Camera) -> Vec<FacePose>;
}

/// Face box detection on a grayscale buffer.
///
/// Implement this trait to plug in any detection engine and wrap it in
/// [`FrontalPoseDetector`] or [`LandmarkPoseDetector`] to obtain poses.
pub trait BoundsDetector: Send + Sync {
    /// Detect faces in a row-major grayscale buffer of `width` × `height` bytes.
    fn detect(&self, gray: &[u8], width: u32, height: u32) -> Vec<FaceBounds>;
}

/// Facial landmark detection for a single face.
pub trait LandmarkDetector: Send + Sync {
    /// Locate the 68 standard landmarks of the face inside `bounds`, in
    /// pixel coordinates. `None` when the face cannot be fitted.
    fn landmarks(
        &self,
        gray: &[u8],
        width: u32,
        height: u32,
        bounds: &FaceBounds,
    ) -> Option<Vec<Point2<f64>>>;
}

/// Grayscale copy of `frame` as a row-major luma buffer.
pub fn to_gray(frame: &RgbaImage) -> Vec<u8> {
    image::imageops::grayscale(frame).into_raw()
}

/// Poses from face boxes alone, assuming every face is upright and frontal.
pub struct FrontalPoseDetector<B> {
    bounds: B,
}

impl<B: BoundsDetector> FrontalPoseDetector<B> {
    /// Wrap a box detector.
    pub fn new(bounds: B) -> Self {
        Self { bounds }
    }
}

impl<B: BoundsDetector> FaceDetector for FrontalPoseDetector<B> {
    fn detect(&self, frame: &RgbaImage, camera: &Camera) -> Vec<FacePose> {
        let gray = to_gray(frame);
        self.bounds
            .detect(&gray, frame.width(), frame.height())
            .into_iter()
            .filter(|bounds| bounds.width > 0.0 && bounds.height > 0.0)
            .map(|bounds| {
                let (rotation, translation) = frontal_pose(&bounds, camera);
                FacePose::new(bounds, rotation, translation)
            })
            .collect()
    }
}

/// Poses solved from facial landmarks.
///
/// Faces whose landmarks cannot be found, or whose pose solve fails, are
/// dropped with a warning.
pub struct LandmarkPoseDetector<B, L> {
    bounds: B,
    landmarks: L,
}

impl<B: BoundsDetector, L: LandmarkDetector> LandmarkPoseDetector<B, L> {
    /// Combine a box detector with a landmark detector.
    pub fn new(bounds: B, landmarks: L) -> Self {
        Self { bounds, landmarks }
    }

    fn pose_for(
        &self,
        gray: &[u8],
        width: u32,
        height: u32,
        bounds: FaceBounds,
        camera: &Camera,
    ) -> Option<FacePose> {
        let Some(landmarks) = self.landmarks.landmarks(gray, width, height, &bounds) else {
            log::warn!(
                "No landmarks for face at ({:.0}, {:.0}), dropping it",
                bounds.x,
                bounds.y
            );
            return None;
        };
        let Some(image_points) = select_landmarks(&landmarks) else {
            log::warn!(
                "Expected 68 landmarks, got {}, dropping face at ({:.0}, {:.0})",
                landmarks.len(),
                bounds.x,
                bounds.y
            );
            return None;
        };
        let Some((rotation, translation)) = solve_pnp(&face_model(), &image_points, camera) else {
            log::warn!(
                "Pose solve failed for face at ({:.0}, {:.0}), dropping it",
                bounds.x,
                bounds.y
            );
            return None;
        };
        Some(FacePose::new(bounds, rotation, translation).with_landmarks(landmarks))
    }
}

impl<B: BoundsDetector, L: LandmarkDetector> FaceDetector for LandmarkPoseDetector<B, L> {
    fn detect(&self, frame: &RgbaImage, camera: &Camera) -> Vec<FacePose> {
        let gray = to_gray(frame);
        let (width, height) = frame.dimensions();
        self.bounds
            .detect(&gray, width, height)
            .into_iter()
            .filter_map(|bounds| self.pose_for(&gray, width, height, bounds, camera))
            .collect()
    }
}
