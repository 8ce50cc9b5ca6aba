//! Head pose from a face box or from facial landmarks.
//!
//! The canonical face model is y-up with the nose tip at the origin, so an
//! upright face looking at the camera is rotated half a turn about X.

use nalgebra::{DMatrix, DVector, Point2, Point3, Rotation3, Vector3};

use crate::camera::Camera;
use crate::decal::FACE_WIDTH;
use crate::face::FaceBounds;

/// Canonical 3D face model, in model units.
///
/// Nose tip, chin, left eye outer corner, right eye outer corner, left mouth
/// corner, right mouth corner.
pub const FACE_MODEL_POINTS: [[f64; 3]; 6] = [
    [0.0, 0.0, 0.0],
    [0.0, -330.0, -65.0],
    [-225.0, 170.0, -135.0],
    [225.0, 170.0, -135.0],
    [-150.0, -150.0, -125.0],
    [150.0, -150.0, -125.0],
];

/// Indexes of the model points within the standard 68-point landmark layout.
pub const LANDMARK_INDEXES: [usize; 6] = [30, 8, 36, 45, 48, 54];

/// Vertical position of the nose tip within a face box, as a fraction of its
/// height.
const NOSE_HEIGHT_RATIO: f64 = 0.55;

const MAX_ITERATIONS: usize = 100;
const MAX_DAMPING: f64 = 1e10;
const ROTATION_STEP: f64 = 1e-6;
const TRANSLATION_STEP: f64 = 1e-3;
/// Largest accepted RMS reprojection error, relative to the landmark extent.
const MAX_RMS_ERROR_RATIO: f64 = 0.1;

/// Rotation and translation of the face model in camera space.
pub type Pose = (Vector3<f64>, Vector3<f64>);

/// The face model as points.
pub fn face_model() -> [Point3<f64>; 6] {
    FACE_MODEL_POINTS.map(|[x, y, z]| Point3::new(x, y, z))
}

/// Pick the six model landmarks out of a 68-point landmark set.
pub fn select_landmarks(landmarks: &[Point2<f64>]) -> Option<[Point2<f64>; 6]> {
    let mut selected = [Point2::origin(); 6];
    for (slot, &index) in selected.iter_mut().zip(LANDMARK_INDEXES.iter()) {
        *slot = *landmarks.get(index)?;
    }
    Some(selected)
}

/// Pose of an upright face looking straight at the camera.
///
/// Depth is chosen so that the model's face width spans the box width, and
/// the nose tip sits at the horizontal center of the box, 55% of the way down.
pub fn frontal_pose(bounds: &FaceBounds, camera: &Camera) -> Pose {
    let depth = camera.focal_x() * FACE_WIDTH / bounds.width;
    let nose_u = bounds.center_x();
    let nose_v = bounds.y + bounds.height * NOSE_HEIGHT_RATIO;
    let center = camera.center();

    let rotation = Vector3::new(std::f64::consts::PI, 0.0, 0.0);
    let translation = Vector3::new(
        (nose_u - center.x) * depth / camera.focal_x(),
        (nose_v - center.y) * depth / camera.focal_y(),
        depth,
    );
    (rotation, translation)
}

/// Solve the perspective-n-point problem for `model` seen at `image_points`.
///
/// Starts from the frontal pose for the landmarks' bounding box and refines
/// with Levenberg-Marquardt. Returns `None` when fewer than four
/// correspondences are given, the solve diverges, or the result places the
/// face behind the camera or reprojects poorly.
pub fn solve_pnp(
    model: &[Point3<f64>],
    image_points: &[Point2<f64>],
    camera: &Camera,
) -> Option<Pose> {
    let bounds = landmark_bounds(image_points)?;
    solve_pnp_from(model, image_points, camera, frontal_pose(&bounds, camera))
}

/// Like [`solve_pnp`], starting from a caller-supplied pose.
pub fn solve_pnp_from(
    model: &[Point3<f64>],
    image_points: &[Point2<f64>],
    camera: &Camera,
    initial: Pose,
) -> Option<Pose> {
    if model.len() != image_points.len() || model.len() < 4 {
        return None;
    }
    let extent = landmark_bounds(image_points).map(|b| b.width.max(b.height))?;

    let mut rotation = Rotation3::new(initial.0);
    let mut translation = initial.1;
    let mut residual = residuals(model, image_points, camera, &rotation, &translation);
    let mut cost = residual.norm_squared();
    if !cost.is_finite() {
        return None;
    }
    let mut damping = 1e-3;

    for _ in 0..MAX_ITERATIONS {
        let jacobian = jacobian(model, image_points, camera, &rotation, &translation);
        let normal = jacobian.transpose() * &jacobian;
        let gradient = jacobian.transpose() * &residual;

        let mut accepted = None;
        while damping < MAX_DAMPING {
            let mut system = normal.clone();
            for k in 0..6 {
                system[(k, k)] += damping * normal[(k, k)].max(1e-9);
            }
            let Some(step) = system.lu().solve(&(-&gradient)) else {
                damping *= 10.0;
                continue;
            };

            let candidate_rotation =
                Rotation3::new(Vector3::new(step[0], step[1], step[2])) * rotation;
            let candidate_translation = translation + Vector3::new(step[3], step[4], step[5]);
            let candidate_residual = residuals(
                model,
                image_points,
                camera,
                &candidate_rotation,
                &candidate_translation,
            );
            let candidate_cost = candidate_residual.norm_squared();

            if candidate_cost.is_finite() && candidate_cost < cost {
                accepted = Some((
                    candidate_rotation,
                    candidate_translation,
                    candidate_residual,
                    candidate_cost,
                ));
                damping = (damping / 10.0).max(1e-12);
                break;
            }
            damping *= 10.0;
        }

        let Some((next_rotation, next_translation, next_residual, next_cost)) = accepted else {
            break;
        };
        let improvement = cost - next_cost;
        rotation = next_rotation;
        translation = next_translation;
        residual = next_residual;
        cost = next_cost;
        if improvement <= 1e-12 * cost.max(1e-12) {
            break;
        }
    }

    let rms = (cost / model.len() as f64).sqrt();
    let rotation_vector = rotation.scaled_axis();
    let finite = rotation_vector.iter().chain(translation.iter()).all(|v| v.is_finite());
    if !finite || translation.z <= 0.0 || rms > MAX_RMS_ERROR_RATIO * extent {
        log::debug!(
            "Rejecting pose: rms {rms:.2}px over {extent:.1}px landmarks, depth {:.1}",
            translation.z
        );
        return None;
    }

    Some((rotation_vector, translation))
}

fn landmark_bounds(points: &[Point2<f64>]) -> Option<FaceBounds> {
    let first = points.first()?;
    let (mut min, mut max) = (*first, *first);
    for point in points {
        min.x = min.x.min(point.x);
        min.y = min.y.min(point.y);
        max.x = max.x.max(point.x);
        max.y = max.y.max(point.y);
    }
    let (width, height) = (max.x - min.x, max.y - min.y);
    if width <= 0.0 || height <= 0.0 || !width.is_finite() || !height.is_finite() {
        return None;
    }
    Some(FaceBounds::new(min.x, min.y, width, height))
}

fn residuals(
    model: &[Point3<f64>],
    image_points: &[Point2<f64>],
    camera: &Camera,
    rotation: &Rotation3<f64>,
    translation: &Vector3<f64>,
) -> DVector<f64> {
    let mut residual = DVector::zeros(2 * model.len());
    for (i, (point, observed)) in model.iter().zip(image_points.iter()).enumerate() {
        let projected = camera.project_camera_point(&(rotation * point + translation));
        residual[2 * i] = projected.x - observed.x;
        residual[2 * i + 1] = projected.y - observed.y;
    }
    residual
}

/// Central-difference Jacobian. Rotation columns perturb on the left so the
/// update composes as `exp(delta) * R`.
fn jacobian(
    model: &[Point3<f64>],
    image_points: &[Point2<f64>],
    camera: &Camera,
    rotation: &Rotation3<f64>,
    translation: &Vector3<f64>,
) -> DMatrix<f64> {
    let mut jacobian = DMatrix::zeros(2 * model.len(), 6);

    for axis in 0..3 {
        let mut delta = Vector3::zeros();
        delta[axis] = ROTATION_STEP;
        let plus = Rotation3::new(delta) * rotation;
        let minus = Rotation3::new(-delta) * rotation;
        let plus = residuals(model, image_points, camera, &plus, translation);
        let minus = residuals(model, image_points, camera, &minus, translation);
        jacobian
            .column_mut(axis)
            .copy_from(&((plus - minus) / (2.0 * ROTATION_STEP)));
    }

    for axis in 0..3 {
        let mut delta = Vector3::zeros();
        delta[axis] = TRANSLATION_STEP;
        let plus = residuals(model, image_points, camera, rotation, &(translation + delta));
        let minus = residuals(model, image_points, camera, rotation, &(translation - delta));
        jacobian
            .column_mut(axis + 3)
            .copy_from(&((plus - minus) / (2.0 * TRANSLATION_STEP)));
    }

    jacobian
}
