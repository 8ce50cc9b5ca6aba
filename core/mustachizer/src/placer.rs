//! Perspective placement of a decal on a face.
//!
//! The mustache is a flat sprite, so its placement is a planar homography:
//! the sprite's rectangle is positioned around the decal anchor in face model
//! space, projected through the face pose and the camera, and the sprite is
//! warped onto the projected quadrilateral. This is perspective correct for
//! small and medium head rotations and degrades for extreme profiles.

use image::{Rgba, RgbaImage};
use imageproc::geometric_transformations::{warp_into, Interpolation};
use nalgebra::{Point2, Point3, Vector3};

use crate::camera::Camera;
use crate::debug::DebugSink;
use crate::decal::ResolvedDecal;
use crate::face::FacePose;
use crate::homography::Homography;

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Where a decal landed in the frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecalQuad {
    /// Projected corners, in the order of the source corners
    /// (0,0), (W,0), (W,H), (0,H).
    pub corners: [Point2<f64>; 4],
    /// Projected decal anchor.
    pub anchor: Point2<f64>,
}

impl DecalQuad {
    /// Axis-aligned bounds as `(min, max)`.
    pub fn bounds(&self) -> (Point2<f64>, Point2<f64>) {
        let mut min = self.corners[0];
        let mut max = self.corners[0];
        for corner in &self.corners[1..] {
            min.x = min.x.min(corner.x);
            min.y = min.y.min(corner.y);
            max.x = max.x.max(corner.x);
            max.y = max.y.max(corner.y);
        }
        (min, max)
    }

    /// Mean of the four corners.
    pub fn center(&self) -> Point2<f64> {
        let sum = self
            .corners
            .iter()
            .fold(Vector3::zeros(), |acc, c| acc + c.to_homogeneous());
        Point2::new(sum.x / 4.0, sum.y / 4.0)
    }
}

/// Decal rectangle in face model space, flat at the anchor's depth.
///
/// Corner order matches the source image corners so that the winding is the
/// same on both sides of the homography.
pub fn decal_box(decal: &ResolvedDecal<'_>) -> [Point3<f64>; 4] {
    let anchor = decal.decal().anchor();
    let half_w = decal.width() / 2.0;
    let half_h = decal.height() / 2.0;
    [
        anchor + Vector3::new(-half_w, -half_h, 0.0),
        anchor + Vector3::new(half_w, -half_h, 0.0),
        anchor + Vector3::new(half_w, half_h, 0.0),
        anchor + Vector3::new(-half_w, half_h, 0.0),
    ]
}

/// Corners of a `width` × `height` source image.
pub fn source_corners(width: u32, height: u32) -> [Point2<f64>; 4] {
    let (w, h) = (f64::from(width), f64::from(height));
    [
        Point2::new(0.0, 0.0),
        Point2::new(w, 0.0),
        Point2::new(w, h),
        Point2::new(0.0, h),
    ]
}

/// Project the decal rectangle and anchor into the frame.
pub fn project_decal(camera: &Camera, face: &FacePose, decal: &ResolvedDecal<'_>) -> DecalQuad {
    let corners = decal_box(decal);
    let projected = camera.project_points(&corners, face.rotation(), face.translation());
    let anchor = camera.project_points(
        &[*decal.decal().anchor()],
        face.rotation(),
        face.translation(),
    );

    DecalQuad {
        corners: [projected[0], projected[1], projected[2], projected[3]],
        anchor: anchor[0],
    }
}

/// Homography taking the decal sprite onto its projected quad.
pub fn decal_homography(decal: &ResolvedDecal<'_>, quad: &DecalQuad) -> Option<Homography> {
    let image = decal.decal().image();
    Homography::from_correspondences(&source_corners(image.width(), image.height()), &quad.corners)
}

/// Draw `decal` onto `frame` for one face.
///
/// The sprite is flipped vertically before warping: the face model is y-up
/// while image rows grow downward. Parts of the quad outside the frame are
/// clipped. A degenerate projection leaves the frame untouched.
pub fn place(
    frame: &mut RgbaImage,
    camera: &Camera,
    face: &FacePose,
    decal: &ResolvedDecal<'_>,
    debug: Option<&mut dyn DebugSink>,
) -> DecalQuad {
    let quad = project_decal(camera, face, decal);

    match decal_homography(decal, &quad).and_then(|h| h.to_projection()) {
        Some(projection) => {
            let flipped = image::imageops::flip_vertical(decal.decal().image());
            let mut warped = RgbaImage::from_pixel(frame.width(), frame.height(), TRANSPARENT);
            warp_into(
                &flipped,
                &projection,
                Interpolation::Bilinear,
                TRANSPARENT,
                &mut warped,
            );
            alpha_over(frame, &warped);
        }
        None => log::warn!(
            "Degenerate projection for {} at {:?}, skipping",
            decal.decal().name(),
            quad.corners
        ),
    }

    if let Some(sink) = debug {
        sink.face(face.bounds());
        if !face.landmarks().is_empty() {
            sink.landmarks(face.landmarks());
        }
        sink.decal(&quad);
    }

    quad
}

/// Straight (non-premultiplied) alpha-over of `overlay` onto `frame`, using
/// the overlay alpha as the mask. Both images must have the same size.
///
/// The result alpha is `a_s + a_d·(1 − a_s)`, so an opaque frame stays
/// opaque under a translucent decal.
pub(crate) fn alpha_over(frame: &mut RgbaImage, overlay: &RgbaImage) {
    debug_assert_eq!(frame.dimensions(), overlay.dimensions());

    for (dst, src) in frame.pixels_mut().zip(overlay.pixels()) {
        match src[3] {
            0 => {}
            255 => *dst = *src,
            alpha => {
                let src_alpha = f32::from(alpha) / 255.0;
                let dst_alpha = f32::from(dst[3]) / 255.0 * (1.0 - src_alpha);
                let out_alpha = src_alpha + dst_alpha;
                for channel in 0..3 {
                    let blended = (f32::from(src[channel]) * src_alpha
                        + f32::from(dst[channel]) * dst_alpha)
                        / out_alpha;
                    dst[channel] = blended.round().clamp(0.0, 255.0) as u8;
                }
                dst[3] = (out_alpha * 255.0).round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debug::{DebugOverlay, DebugShape};
    use crate::decal::{Decal, SizePreset};
    use crate::face::FaceBounds;

    fn bambino(width: u32, height: u32) -> Decal {
        let sprite = RgbaImage::from_pixel(width, height, Rgba([10, 10, 10, 255]));
        Decal::new("BAMBINO", sprite, 0.6, Point3::new(0.0, -70.0, -50.0), 2.0).unwrap()
    }

    fn pose(rotation: Vector3<f64>, translation: Vector3<f64>) -> FacePose {
        FacePose::new(FaceBounds::new(10.0, 20.0, 100.0, 120.0), rotation, translation)
    }

    fn gray_frame(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([200, 200, 200, 255]))
    }

    #[test]
    fn box_corners_surround_anchor() {
        let decal = bambino(200, 100);
        let resolved = decal.resolve(SizePreset::Realist);
        let corners = decal_box(&resolved);
        assert_eq!(corners[0], Point3::new(-150.0, -145.0, -50.0));
        assert_eq!(corners[1], Point3::new(150.0, -145.0, -50.0));
        assert_eq!(corners[2], Point3::new(150.0, 5.0, -50.0));
        assert_eq!(corners[3], Point3::new(-150.0, 5.0, -50.0));
    }

    #[test]
    fn frontal_face_projects_to_axis_aligned_rectangle() {
        let camera = Camera::new(640, 480);
        let decal = bambino(200, 100);
        let face = pose(Vector3::zeros(), Vector3::new(0.0, 0.0, 800.0));
        let quad = project_decal(&camera, &face, &decal.resolve(SizePreset::Realist));
        let [a, b, c, d] = quad.corners;
        assert!((a.y - b.y).abs() < 1e-9);
        assert!((c.y - d.y).abs() < 1e-9);
        assert!((a.x - d.x).abs() < 1e-9);
        assert!((b.x - c.x).abs() < 1e-9);
        // Scaled, not skewed: width over height keeps the sprite aspect.
        let width = (b.x - a.x).abs();
        let height = (d.y - a.y).abs();
        assert!((width / height - 2.0).abs() < 1e-9);
    }

    #[test]
    fn regression_scenario_behind_camera_origin() {
        // bbox (10, 20, 100, 120), no rotation, translation [0, 0, -500],
        // BAMBINO on a 640x480 frame.
        let camera = Camera::new(640, 480);
        let decal = bambino(200, 100);
        let face = pose(Vector3::zeros(), Vector3::new(0.0, 0.0, -500.0));
        let quad = project_decal(&camera, &face, &decal.resolve(SizePreset::Realist));

        let fx = camera.focal_x();
        let half_width = fx * 150.0 / 550.0;
        let (min, max) = quad.bounds();
        assert!((max.x - min.x - 2.0 * half_width).abs() < 1e-9);
        assert!((max.x - min.x - 302.3216).abs() < 1e-3);
        assert!((quad.center().x - 320.0).abs() < 1e-9);
        assert!((quad.anchor.x - 320.0).abs() < 1e-9);
        assert!((quad.anchor.y - (240.0 + fx * 70.0 / 550.0)).abs() < 1e-9);
        assert!((quad.anchor.y - 310.5417).abs() < 1e-3);
        // Negative depth mirrors the box: the first corner lands on the right.
        assert!((quad.corners[0].x - (320.0 + half_width)).abs() < 1e-9);
    }

    #[test]
    fn homography_reproduces_projected_corners() {
        let camera = Camera::new(640, 480);
        let decal = bambino(120, 40);
        let face = pose(Vector3::new(3.0, 0.25, -0.1), Vector3::new(15.0, -20.0, 900.0));
        let resolved = decal.resolve(SizePreset::Big);
        let quad = project_decal(&camera, &face, &resolved);
        let homography = decal_homography(&resolved, &quad).unwrap();

        for (source, projected) in source_corners(120, 40).iter().zip(quad.corners.iter()) {
            let mapped = homography.apply(source);
            assert!((mapped - projected).norm() < 1e-3, "{mapped:?} vs {projected:?}");
        }
    }

    #[test]
    fn opaque_decal_replaces_frame_pixels() {
        let camera = Camera::new(640, 480);
        let decal = bambino(200, 100);
        let face = pose(Vector3::zeros(), Vector3::new(0.0, 0.0, 800.0));
        let resolved = decal.resolve(SizePreset::Realist);
        let mut frame = gray_frame(640, 480);

        let quad = place(&mut frame, &camera, &face, &resolved, None);

        let center = quad.center();
        let pixel = frame.get_pixel(center.x as u32, center.y as u32);
        assert_eq!(pixel, &Rgba([10, 10, 10, 255]));
        // Far corner of the frame is untouched.
        assert_eq!(frame.get_pixel(0, 0), &Rgba([200, 200, 200, 255]));
    }

    #[test]
    fn vertical_flip_keeps_sprite_top_above_bottom_for_upright_face() {
        // Upper half red, lower half blue.
        let mut sprite = RgbaImage::new(100, 50);
        for (_, y, pixel) in sprite.enumerate_pixels_mut() {
            *pixel = if y < 25 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            };
        }
        let decal = Decal::new("TWO_TONE", sprite, 0.6, Point3::new(0.0, -70.0, -50.0), 2.0)
            .unwrap();
        let camera = Camera::new(640, 480);
        // Upright face: the y-up model is rotated half a turn about X.
        let face = pose(
            Vector3::new(std::f64::consts::PI, 0.0, 0.0),
            Vector3::new(0.0, 0.0, 800.0),
        );
        let mut frame = gray_frame(640, 480);
        let quad = place(&mut frame, &camera, &face, &decal.resolve(SizePreset::Realist), None);

        let (min, max) = quad.bounds();
        let x = ((min.x + max.x) / 2.0) as u32;
        let upper = frame.get_pixel(x, (min.y + (max.y - min.y) * 0.25) as u32);
        let lower = frame.get_pixel(x, (min.y + (max.y - min.y) * 0.75) as u32);
        assert_eq!(upper, &Rgba([255, 0, 0, 255]));
        assert_eq!(lower, &Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn transparent_decal_leaves_frame_untouched() {
        let sprite = RgbaImage::from_pixel(50, 20, TRANSPARENT);
        let decal = Decal::new("GHOST", sprite, 0.6, Point3::new(0.0, -70.0, -50.0), 2.0).unwrap();
        let camera = Camera::new(320, 240);
        let face = pose(Vector3::zeros(), Vector3::new(0.0, 0.0, 700.0));
        let original = gray_frame(320, 240);
        let mut frame = original.clone();
        place(&mut frame, &camera, &face, &decal.resolve(SizePreset::Realist), None);
        assert_eq!(frame, original);
    }

    #[test]
    fn quad_outside_frame_is_clipped_without_error() {
        let camera = Camera::new(64, 48);
        let decal = bambino(200, 100);
        let mut frame = gray_frame(64, 48);

        // Partially outside.
        let partial = pose(Vector3::zeros(), Vector3::new(120.0, 0.0, 400.0));
        place(&mut frame, &camera, &partial, &decal.resolve(SizePreset::Massive), None);

        // Fully outside.
        let original = frame.clone();
        let outside = pose(Vector3::zeros(), Vector3::new(5000.0, 5000.0, 400.0));
        let quad = place(&mut frame, &camera, &outside, &decal.resolve(SizePreset::Realist), None);
        assert!(quad.bounds().0.x > 64.0);
        assert_eq!(frame, original);
    }

    #[test]
    fn collapsed_quad_has_no_homography() {
        let decal = bambino(200, 100);
        let quad = DecalQuad {
            corners: [
                Point2::new(10.0, 10.0),
                Point2::new(20.0, 10.0),
                Point2::new(30.0, 10.0),
                Point2::new(40.0, 10.0),
            ],
            anchor: Point2::new(25.0, 10.0),
        };
        assert!(decal_homography(&decal.resolve(SizePreset::Realist), &quad).is_none());
    }

    #[test]
    fn partial_alpha_blends_color_and_keeps_frame_opaque() {
        let mut frame = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 255]));
        let overlay = RgbaImage::from_pixel(1, 1, Rgba([255, 255, 255, 51]));
        alpha_over(&mut frame, &overlay);
        assert_eq!(frame.get_pixel(0, 0), &Rgba([51, 51, 51, 255]));
    }

    #[test]
    fn half_transparent_decal_darkens_opaque_frame() {
        let mut frame = RgbaImage::from_pixel(2, 1, Rgba([100, 100, 100, 255]));
        let mut overlay = RgbaImage::from_pixel(2, 1, TRANSPARENT);
        overlay.put_pixel(0, 0, Rgba([0, 0, 0, 128]));
        alpha_over(&mut frame, &overlay);
        assert_eq!(frame.get_pixel(0, 0), &Rgba([50, 50, 50, 255]));
        assert_eq!(frame.get_pixel(1, 0), &Rgba([100, 100, 100, 255]));
    }

    #[test]
    fn translucent_decal_over_transparent_frame_keeps_decal_color() {
        let mut frame = RgbaImage::from_pixel(1, 1, TRANSPARENT);
        let overlay = RgbaImage::from_pixel(1, 1, Rgba([200, 40, 40, 128]));
        alpha_over(&mut frame, &overlay);
        assert_eq!(frame.get_pixel(0, 0), &Rgba([200, 40, 40, 128]));
    }

    #[test]
    fn debug_sink_receives_fitted_landmarks() {
        let camera = Camera::new(640, 480);
        let decal = bambino(200, 100);
        let landmarks = vec![Point2::new(300.0, 200.0); 68];
        let face = pose(Vector3::zeros(), Vector3::new(0.0, 0.0, 800.0))
            .with_landmarks(landmarks.clone());
        let mut frame = gray_frame(640, 480);
        let mut overlay = DebugOverlay::new();

        let quad = place(
            &mut frame,
            &camera,
            &face,
            &decal.resolve(SizePreset::Realist),
            Some(&mut overlay),
        );

        assert_eq!(
            overlay.shapes(),
            &[
                DebugShape::Face(*face.bounds()),
                DebugShape::Landmarks(landmarks),
                DebugShape::Decal(quad),
            ]
        );
    }

    #[test]
    fn debug_sink_receives_face_and_quad() {
        let camera = Camera::new(640, 480);
        let decal = bambino(200, 100);
        let face = pose(Vector3::zeros(), Vector3::new(0.0, 0.0, 800.0));
        let mut frame = gray_frame(640, 480);
        let mut overlay = DebugOverlay::new();

        let quad = place(
            &mut frame,
            &camera,
            &face,
            &decal.resolve(SizePreset::Realist),
            Some(&mut overlay),
        );

        assert_eq!(
            overlay.shapes(),
            &[DebugShape::Face(*face.bounds()), DebugShape::Decal(quad)]
        );
    }
}
