use nalgebra::{Point2, Rotation3, Vector3};

/// Bounding box of a detected face within an image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceBounds {
    /// X coordinate of the top-left corner (pixels).
    pub x: f64,
    /// Y coordinate of the top-left corner (pixels).
    pub y: f64,
    /// Width of the bounding box (pixels).
    pub width: f64,
    /// Height of the bounding box (pixels).
    pub height: f64,
    /// Detection confidence score.
    pub confidence: f64,
}

impl FaceBounds {
    /// Box with full confidence.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            confidence: 1.0,
        }
    }

    /// Horizontal center.
    pub fn center_x(&self) -> f64 {
        self.x + self.width / 2.0
    }

    /// Vertical center.
    pub fn center_y(&self) -> f64 {
        self.y + self.height / 2.0
    }
}

/// A detected face and its pose relative to the camera.
///
/// Rotation and translation come from the same pose solve and only make sense
/// together: they map the canonical face model into camera space.
#[derive(Debug, Clone, PartialEq)]
pub struct FacePose {
    bounds: FaceBounds,
    rotation: Vector3<f64>,
    translation: Vector3<f64>,
    landmarks: Vec<Point2<f64>>,
}

impl FacePose {
    /// `rotation` is a Rodrigues vector in radians.
    pub fn new(bounds: FaceBounds, rotation: Vector3<f64>, translation: Vector3<f64>) -> Self {
        Self {
            bounds,
            rotation,
            translation,
            landmarks: Vec::new(),
        }
    }

    /// Attach the landmarks the pose was solved from.
    pub fn with_landmarks(mut self, landmarks: Vec<Point2<f64>>) -> Self {
        self.landmarks = landmarks;
        self
    }

    /// Detected bounding box.
    pub fn bounds(&self) -> &FaceBounds {
        &self.bounds
    }

    /// Rodrigues rotation vector, in radians.
    pub fn rotation(&self) -> &Vector3<f64> {
        &self.rotation
    }

    /// Translation in model units.
    pub fn translation(&self) -> &Vector3<f64> {
        &self.translation
    }

    /// Fitted landmarks in pixels, empty when the pose came from the box alone.
    pub fn landmarks(&self) -> &[Point2<f64>] {
        &self.landmarks
    }

    /// Rotation as a matrix.
    pub fn rotation_matrix(&self) -> Rotation3<f64> {
        Rotation3::new(self.rotation)
    }

    /// Rotation as `(pitch, yaw, roll)` in degrees, for logging.
    pub fn euler_degrees(&self) -> (f64, f64, f64) {
        let (roll, pitch, yaw) = self.rotation_matrix().euler_angles();
        (pitch.to_degrees(), yaw.to_degrees(), roll.to_degrees())
    }
}
