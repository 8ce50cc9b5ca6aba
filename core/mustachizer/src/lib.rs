//! Mustachizer: perspective-correct mustaches on every detected face of a
//! still or animated image.
//!
//! # Example
//!
//! ```no_run
//! use mustachizer::{DecalCatalog, DecalSelector, FrontalPoseDetector, Mustachizer, SizePreset};
//! # #[cfg(feature = "rustface")]
//! # fn run() -> Result<(), mustachizer::MustacheError> {
//! use mustachizer::RustfaceDetector;
//!
//! let catalog = DecalCatalog::load_builtin("assets/mustaches")?;
//! let detector = RustfaceDetector::from_file("model/seeta_fd_frontal_v1.0.bin")?;
//! let mut mustachizer = Mustachizer::new(catalog, Box::new(FrontalPoseDetector::new(detector)));
//!
//! let input = std::fs::read("portrait.jpg")?;
//! let result = mustachizer.apply(&input, &DecalSelector::Random, SizePreset::Big)?;
//! println!("{} mustache(s), {} bytes", result.placements.len(), result.data.len());
//! # Ok(())
//! # }
//! ```
#![warn(missing_docs)]

/// Pinhole camera model.
pub mod camera;
/// YAML configuration.
pub mod config;
/// Debug overlay for placements.
pub mod debug;
/// Mustache catalog, calibration table and size presets.
pub mod decal;
mod error;
mod face;
/// Face detection traits and pose detectors.
pub mod face_detector;
/// Four-point planar homography.
pub mod homography;
mod media;
/// Decal projection, warping and compositing.
pub mod placer;
/// Canonical face model and pose solving.
pub mod pose;
#[cfg(feature = "rustface")]
/// SeetaFace-based face box detector backend.
pub mod rustface_backend;

use rand::rngs::StdRng;
use rand::SeedableRng;

pub use camera::Camera;
pub use config::Config;
pub use debug::{DebugOverlay, DebugSink};
pub use decal::{Decal, DecalCatalog, DecalSelector, DecalSpec, ResolvedDecal, SizePreset};
/// Error type returned by mustachizer operations.
pub use error::MustacheError;
pub use face_detector::{
    BoundsDetector, FaceBounds, FaceDetector, FacePose, FrontalPoseDetector, LandmarkDetector,
    LandmarkPoseDetector,
};
pub use media::MediaFormat;
pub use placer::DecalQuad;
#[cfg(feature = "rustface")]
pub use rustface_backend::RustfaceDetector;

/// One mustache drawn on one face.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    /// Index of the frame, 0 for still images.
    pub frame: usize,
    /// Name of the mustache used.
    pub decal: String,
    /// Where it landed.
    pub quad: DecalQuad,
}

/// Result of [`Mustachizer::apply`].
#[derive(Debug, Clone)]
pub struct Mustachized {
    /// The encoded output image, in the input's format.
    pub data: Vec<u8>,

    /// Output format (same as the input).
    pub format: MediaFormat,

    /// Width of the output image in pixels.
    pub width: u32,

    /// Height of the output image in pixels.
    pub height: u32,

    /// Number of frames in the output.
    pub frame_count: usize,

    /// Every placement, in frame then detection order.
    pub placements: Vec<Placement>,
}

impl Mustachized {
    /// Distinct mustache names used, in order of first use.
    pub fn decal_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for placement in &self.placements {
            if !names.contains(&placement.decal.as_str()) {
                names.push(&placement.decal);
            }
        }
        names
    }
}

/// Draws mustaches on the faces of still and animated images.
///
/// Holds the loaded catalog, the face detector and the random generator used
/// to pick mustaches. Decoding, detection, placement and re-encoding all
/// happen synchronously inside [`Mustachizer::apply`].
pub struct Mustachizer {
    catalog: DecalCatalog,
    detector: Box<dyn FaceDetector>,
    rng: StdRng,
    debug: bool,
    jpeg_quality: u8,
    default_frame_delay_ms: u32,
}

impl Mustachizer {
    /// Create a mustachizer with default output settings and an OS-seeded
    /// random generator.
    pub fn new(catalog: DecalCatalog, detector: Box<dyn FaceDetector>) -> Self {
        let defaults = Config::default();
        Self {
            catalog,
            detector,
            rng: StdRng::from_os_rng(),
            debug: defaults.debug,
            jpeg_quality: defaults.jpeg_quality,
            default_frame_delay_ms: defaults.default_frame_delay_ms,
        }
    }

    /// Build from a configuration: loads the catalog and the SeetaFace model,
    /// and detects faces as upright and frontal.
    #[cfg(feature = "rustface")]
    pub fn from_config(config: &Config) -> Result<Self, MustacheError> {
        config.validate()?;
        let catalog = config.load_catalog()?;
        let detector = RustfaceDetector::from_file(&config.detector_model)?;
        Ok(Self::new(catalog, Box::new(FrontalPoseDetector::new(detector)))
            .debug(config.debug)
            .jpeg_quality(config.jpeg_quality)
            .frame_delay_ms(config.default_frame_delay_ms))
    }

    /// Draw face boxes, fitted landmarks and decal outlines over the output
    /// (default: false).
    pub fn debug(mut self, enable: bool) -> Self {
        self.debug = enable;
        self
    }

    /// Seed the random generator, for reproducible mustache choices.
    pub fn seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Set the JPEG output quality from 1 to 100 (default: 90).
    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality;
        self
    }

    /// Set the delay for animation frames that carry none, in milliseconds
    /// (default: 100). Must be greater than 0.
    pub fn frame_delay_ms(mut self, delay_ms: u32) -> Self {
        self.default_frame_delay_ms = delay_ms;
        self
    }

    /// The loaded mustache catalog.
    pub fn catalog(&self) -> &DecalCatalog {
        &self.catalog
    }

    /// Decode `input`, draw a mustache on every face of every frame and
    /// re-encode in the input's format.
    ///
    /// Animated input gets a single mustache choice kept across all frames.
    /// Still images with a random selector pick independently per face. An
    /// unknown mustache name falls back to a random one.
    pub fn apply(
        &mut self,
        input: &[u8],
        selector: &DecalSelector,
        size: SizePreset,
    ) -> Result<Mustachized, MustacheError> {
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(MustacheError::Config(format!(
                "JPEG quality must be between 1 and 100, got {}",
                self.jpeg_quality
            )));
        }
        if self.default_frame_delay_ms == 0 {
            return Err(MustacheError::Config(
                "Default frame delay must be greater than 0".to_string(),
            ));
        }

        let format = media::detect_format(input)?;
        let mut frames = media::decode_frames(input, format)?;
        let (width, height) = frames
            .first()
            .map(|frame| frame.image.dimensions())
            .ok_or(MustacheError::ZeroDimensions)?;
        log::debug!("Input {format} {width}x{height}, {} frame(s)", frames.len());

        let frozen = (frames.len() > 1).then(|| self.catalog.select(selector, &mut self.rng));
        let mut placements = Vec::new();

        for (index, frame) in frames.iter_mut().enumerate() {
            let (frame_width, frame_height) = frame.image.dimensions();
            let camera = Camera::new(frame_width, frame_height);
            let faces = self.detector.detect(&frame.image, &camera);
            log::debug!("Frame {index}: {} face(s)", faces.len());

            let mut overlay = self.debug.then(DebugOverlay::new);
            for face in &faces {
                let decal = match frozen {
                    Some(decal) => decal,
                    None => self.catalog.select(selector, &mut self.rng),
                };
                let (pitch, yaw, roll) = face.euler_degrees();
                log::debug!(
                    "Face at ({:.0}, {:.0}) pitch {pitch:.1} yaw {yaw:.1} roll {roll:.1}: {}",
                    face.bounds().x,
                    face.bounds().y,
                    decal.name()
                );

                let sink = overlay.as_mut().map(|o| o as &mut dyn DebugSink);
                let quad = placer::place(
                    &mut frame.image,
                    &camera,
                    face,
                    &decal.resolve(size),
                    sink,
                );
                placements.push(Placement {
                    frame: index,
                    decal: decal.name().to_string(),
                    quad,
                });
            }

            if let Some(overlay) = &overlay {
                overlay.draw(&mut frame.image);
            }
        }

        if placements.is_empty() {
            return Err(MustacheError::NoFaceDetected);
        }

        let frame_count = frames.len();
        let data = media::encode_frames(
            frames,
            format,
            self.jpeg_quality,
            self.default_frame_delay_ms,
        )?;

        Ok(Mustachized {
            data,
            format,
            width,
            height,
            frame_count,
            placements,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageEncoder, Rgba, RgbaImage};
    use nalgebra::{Point2, Point3};

    /// Reports one frontal face in the middle of every frame.
    struct CenteredFace;

    impl FaceDetector for CenteredFace {
        fn detect(&self, frame: &RgbaImage, camera: &Camera) -> Vec<FacePose> {
            let (w, h) = (frame.width() as f64, frame.height() as f64);
            let bounds = FaceBounds::new(w / 4.0, h / 4.0, w / 2.0, h / 2.0);
            let (rotation, translation) = pose::frontal_pose(&bounds, camera);
            vec![FacePose::new(bounds, rotation, translation)]
        }
    }

    struct NoFaces;

    impl FaceDetector for NoFaces {
        fn detect(&self, _frame: &RgbaImage, _camera: &Camera) -> Vec<FacePose> {
            Vec::new()
        }
    }

    fn catalog() -> DecalCatalog {
        let sprite = RgbaImage::from_pixel(40, 20, Rgba([20, 10, 5, 255]));
        let decals = ["BAMBINO", "HANDLEBAR"]
            .iter()
            .map(|name| {
                Decal::new(name, sprite.clone(), 0.6, Point3::new(0.0, -70.0, -50.0), 2.0).unwrap()
            })
            .collect();
        DecalCatalog::from_decals(decals).unwrap()
    }

    fn make_test_png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([200, 180, 160, 255]));
        let mut buffer = Vec::new();
        image::codecs::png::PngEncoder::new(&mut buffer)
            .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgba8)
            .unwrap();
        buffer
    }

    #[test]
    fn png_in_png_out() {
        let mut mustachizer = Mustachizer::new(catalog(), Box::new(CenteredFace)).seed(1);
        let result = mustachizer
            .apply(&make_test_png(160, 120), &DecalSelector::Random, SizePreset::Realist)
            .unwrap();
        assert_eq!(result.format, MediaFormat::Png);
        assert_eq!((result.width, result.height), (160, 120));
        assert_eq!(result.frame_count, 1);
        assert_eq!(result.placements.len(), 1);
        assert_eq!(&result.data[1..4], b"PNG");
    }

    #[test]
    fn named_selector_is_honored() {
        let mut mustachizer = Mustachizer::new(catalog(), Box::new(CenteredFace));
        let result = mustachizer
            .apply(
                &make_test_png(160, 120),
                &DecalSelector::Named("handlebar".to_string()),
                SizePreset::Big,
            )
            .unwrap();
        assert_eq!(result.decal_names(), vec!["HANDLEBAR"]);
    }

    #[test]
    fn no_face_is_an_error() {
        let mut mustachizer = Mustachizer::new(catalog(), Box::new(NoFaces));
        let result =
            mustachizer.apply(&make_test_png(64, 64), &DecalSelector::Random, SizePreset::Realist);
        assert!(matches!(result, Err(MustacheError::NoFaceDetected)));
    }

    #[test]
    fn invalid_input_is_unsupported() {
        let mut mustachizer = Mustachizer::new(catalog(), Box::new(CenteredFace));
        let result =
            mustachizer.apply(b"not an image", &DecalSelector::Random, SizePreset::Realist);
        assert!(matches!(result, Err(MustacheError::UnsupportedFormat(_))));
    }

    #[test]
    fn invalid_jpeg_quality_is_rejected() {
        let mut mustachizer =
            Mustachizer::new(catalog(), Box::new(CenteredFace)).jpeg_quality(0);
        let result =
            mustachizer.apply(&make_test_png(64, 64), &DecalSelector::Random, SizePreset::Realist);
        assert!(matches!(result, Err(MustacheError::Config(_))));
    }

    #[test]
    fn zero_frame_delay_is_rejected() {
        let mut mustachizer =
            Mustachizer::new(catalog(), Box::new(CenteredFace)).frame_delay_ms(0);
        let result =
            mustachizer.apply(&make_test_png(64, 64), &DecalSelector::Random, SizePreset::Realist);
        assert!(matches!(result, Err(MustacheError::Config(_))));
    }

    #[test]
    fn debug_overlay_changes_output() {
        let input = make_test_png(160, 120);
        let plain = Mustachizer::new(catalog(), Box::new(CenteredFace))
            .apply(&input, &DecalSelector::Named("BAMBINO".into()), SizePreset::Realist)
            .unwrap();
        let debug = Mustachizer::new(catalog(), Box::new(CenteredFace))
            .debug(true)
            .apply(&input, &DecalSelector::Named("BAMBINO".into()), SizePreset::Realist)
            .unwrap();
        assert_eq!(plain.placements, debug.placements);
        assert_ne!(plain.data, debug.data);
    }

    #[test]
    fn decal_names_are_deduplicated_in_order() {
        let quad = DecalQuad {
            corners: [Point2::origin(); 4],
            anchor: Point2::origin(),
        };
        let placement = |decal: &str| Placement {
            frame: 0,
            decal: decal.to_string(),
            quad,
        };
        let result = Mustachized {
            data: Vec::new(),
            format: MediaFormat::Png,
            width: 1,
            height: 1,
            frame_count: 1,
            placements: vec![placement("B"), placement("A"), placement("B")],
        };
        assert_eq!(result.decal_names(), vec!["B", "A"]);
    }
}
