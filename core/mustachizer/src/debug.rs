//! Debug overlay: face boxes, fitted landmarks and decal outlines drawn over
//! the output.

use image::{Rgba, RgbaImage};
use imageproc::drawing::{
    draw_cross_mut, draw_filled_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut,
};
use imageproc::rect::Rect;
use nalgebra::Point2;

use crate::face::FaceBounds;
use crate::placer::DecalQuad;
use crate::pose::LANDMARK_INDEXES;

const FACE_COLOR: Rgba<u8> = Rgba([255, 0, 0, 255]);
const LANDMARK_COLOR: Rgba<u8> = Rgba([0, 255, 0, 255]);
const POSE_LANDMARK_COLOR: Rgba<u8> = Rgba([0, 0, 255, 255]);
const DECAL_COLOR: Rgba<u8> = Rgba([0, 255, 255, 255]);
const LANDMARK_RADIUS: i32 = 2;

/// Receives the geometry of each placement as it happens.
pub trait DebugSink {
    /// A face was about to be decorated.
    fn face(&mut self, bounds: &FaceBounds);
    /// The landmarks the face pose was solved from. Only called for faces
    /// that have them.
    fn landmarks(&mut self, _points: &[Point2<f64>]) {}
    /// A decal was projected to `quad`.
    fn decal(&mut self, quad: &DecalQuad);
}

/// A shape recorded by [`DebugOverlay`].
#[derive(Debug, Clone, PartialEq)]
pub enum DebugShape {
    /// Detected face box.
    Face(FaceBounds),
    /// Fitted facial landmarks, in 68-point order.
    Landmarks(Vec<Point2<f64>>),
    /// Projected decal outline and anchor.
    Decal(DecalQuad),
}

/// Records shapes for one frame, then draws them in order.
#[derive(Debug, Clone, Default)]
pub struct DebugOverlay {
    shapes: Vec<DebugShape>,
}

impl DebugOverlay {
    /// An empty overlay.
    pub fn new() -> Self {
        Self::default()
    }

    /// Shapes recorded so far, in arrival order.
    pub fn shapes(&self) -> &[DebugShape] {
        &self.shapes
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Draw every recorded shape onto `canvas`. Shapes that fall outside
    /// the canvas are clipped.
    pub fn draw(&self, canvas: &mut RgbaImage) {
        for shape in &self.shapes {
            match shape {
                DebugShape::Face(bounds) => draw_face(canvas, bounds),
                DebugShape::Landmarks(points) => draw_landmarks(canvas, points),
                DebugShape::Decal(quad) => draw_quad(canvas, quad),
            }
        }
    }
}

impl DebugSink for DebugOverlay {
    fn face(&mut self, bounds: &FaceBounds) {
        self.shapes.push(DebugShape::Face(*bounds));
    }

    fn landmarks(&mut self, points: &[Point2<f64>]) {
        self.shapes.push(DebugShape::Landmarks(points.to_vec()));
    }

    fn decal(&mut self, quad: &DecalQuad) {
        self.shapes.push(DebugShape::Decal(*quad));
    }
}

fn draw_face(canvas: &mut RgbaImage, bounds: &FaceBounds) {
    let rect = Rect::at(bounds.x.round() as i32, bounds.y.round() as i32).of_size(
        (bounds.width.round() as u32).max(1),
        (bounds.height.round() as u32).max(1),
    );
    draw_hollow_rect_mut(canvas, rect, FACE_COLOR);

    let (cx, cy) = (bounds.center_x() as f32, bounds.center_y() as f32);
    let (x0, x1) = (bounds.x as f32, (bounds.x + bounds.width) as f32);
    let (y0, y1) = (bounds.y as f32, (bounds.y + bounds.height) as f32);
    draw_line_segment_mut(canvas, (x0, cy), (x1, cy), FACE_COLOR);
    draw_line_segment_mut(canvas, (cx, y0), (cx, y1), FACE_COLOR);
}

/// Pose landmarks are drawn last so they stay visible where points overlap.
fn draw_landmarks(canvas: &mut RgbaImage, points: &[Point2<f64>]) {
    let dot = |canvas: &mut RgbaImage, point: &Point2<f64>, color: Rgba<u8>| {
        let center = (point.x.round() as i32, point.y.round() as i32);
        draw_filled_circle_mut(canvas, center, LANDMARK_RADIUS, color);
    };
    for (index, point) in points.iter().enumerate() {
        if !LANDMARK_INDEXES.contains(&index) {
            dot(canvas, point, LANDMARK_COLOR);
        }
    }
    for point in LANDMARK_INDEXES.iter().filter_map(|&index| points.get(index)) {
        dot(canvas, point, POSE_LANDMARK_COLOR);
    }
}

fn draw_quad(canvas: &mut RgbaImage, quad: &DecalQuad) {
    for i in 0..4 {
        let from = quad.corners[i];
        let to = quad.corners[(i + 1) % 4];
        draw_line_segment_mut(
            canvas,
            (from.x as f32, from.y as f32),
            (to.x as f32, to.y as f32),
            DECAL_COLOR,
        );
    }
    draw_cross_mut(
        canvas,
        DECAL_COLOR,
        quad.anchor.x.round() as i32,
        quad.anchor.y.round() as i32,
    );
}
