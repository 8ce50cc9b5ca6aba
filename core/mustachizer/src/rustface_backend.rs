use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::MustacheError;
use crate::face_detector::{BoundsDetector, FaceBounds};

/// Face box detector backed by the `rustface` crate (SeetaFace engine).
///
/// Only finds frontal faces. Wrap it in
/// [`FrontalPoseDetector`](crate::FrontalPoseDetector) to obtain poses.
pub struct RustfaceDetector {
    model: rustface::Model,
    min_face_size: u32,
    score_threshold: f64,
}

impl RustfaceDetector {
    /// Load the SeetaFace frontal model from `path`.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, MustacheError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            MustacheError::Detector(format!("cannot open model {}: {e}", path.display()))
        })?;
        let model = rustface::read_model(BufReader::new(file)).map_err(|e| {
            MustacheError::Detector(format!("cannot read model {}: {e}", path.display()))
        })?;
        log::debug!("Loaded face detection model from {}", path.display());

        Ok(Self {
            model,
            min_face_size: 20,
            score_threshold: 2.0,
        })
    }

    /// Smallest face searched for, in pixels (default: 20).
    pub fn min_face_size(mut self, size: u32) -> Self {
        self.min_face_size = size;
        self
    }

    /// Detection score threshold (default: 2.0).
    pub fn score_threshold(mut self, threshold: f64) -> Self {
        self.score_threshold = threshold;
        self
    }
}

impl BoundsDetector for RustfaceDetector {
    fn detect(&self, gray: &[u8], width: u32, height: u32) -> Vec<FaceBounds> {
        let mut detector = rustface::create_detector_with_model(self.model.clone());
        detector.set_min_face_size(self.min_face_size);
        detector.set_score_thresh(self.score_threshold);
        detector.set_pyramid_scale_factor(0.8);
        detector.set_slide_window_step(4, 4);

        let faces = detector.detect(&rustface::ImageData::new(gray, width, height));
        log::debug!("Found {} face box(es)", faces.len());

        faces
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                FaceBounds {
                    x: bbox.x() as f64,
                    y: bbox.y() as f64,
                    width: bbox.width() as f64,
                    height: bbox.height() as f64,
                    confidence: face.score(),
                }
            })
            .collect()
    }
}
