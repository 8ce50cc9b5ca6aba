use std::fmt;
use std::io::Cursor;

use image::codecs::gif::{GifDecoder, GifEncoder, Repeat};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{
    AnimationDecoder, Delay, DynamicImage, Frame, ImageEncoder, ImageFormat, RgbImage, Rgba,
    RgbaImage,
};

use crate::error::MustacheError;
use crate::placer::alpha_over;

/// NeuQuant sampling speed for GIF frames with more than 256 colors (1 is
/// slowest, 30 fastest).
const GIF_QUANTIZER_SPEED: i32 = 10;

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Image container formats accepted as input and produced as output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFormat {
    /// PNG, kept as RGBA.
    Png,
    /// JPEG, flattened over white on output.
    Jpeg,
    /// GIF, still or animated.
    Gif,
}

impl MediaFormat {
    /// Map an `image` format onto the allow-list.
    pub fn from_image_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Png => Some(Self::Png),
            ImageFormat::Jpeg => Some(Self::Jpeg),
            ImageFormat::Gif => Some(Self::Gif),
            _ => None,
        }
    }

    /// Map a file extension (case-insensitive, without the dot).
    pub fn from_extension(extension: &str) -> Option<Self> {
        ImageFormat::from_extension(extension).and_then(Self::from_image_format)
    }

    /// Lower-case name, also used as the output file extension.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Gif => "gif",
        }
    }

    fn image_format(&self) -> ImageFormat {
        match self {
            Self::Png => ImageFormat::Png,
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Gif => ImageFormat::Gif,
        }
    }
}

impl fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Gif => "gif",
        })
    }
}

/// One decoded frame and how long it is shown.
#[derive(Debug, Clone)]
pub(crate) struct MediaFrame {
    pub image: RgbaImage,
    /// Display time in milliseconds, 0 when unspecified.
    pub delay_ms: u32,
}

/// Detect the input image format from the raw bytes and check it against the
/// allow-list.
pub(crate) fn detect_format(input: &[u8]) -> Result<MediaFormat, MustacheError> {
    let format =
        image::guess_format(input).map_err(|e| MustacheError::UnsupportedFormat(e.to_string()))?;
    MediaFormat::from_image_format(format)
        .ok_or_else(|| MustacheError::UnsupportedFormat(format!("{format:?}")))
}

/// Decode every frame of the input. PNG and JPEG yield one frame; GIF yields
/// all of them, composited to full canvas size.
pub(crate) fn decode_frames(
    input: &[u8],
    format: MediaFormat,
) -> Result<Vec<MediaFrame>, MustacheError> {
    let frames = match format {
        MediaFormat::Gif => {
            let decoder = GifDecoder::new(Cursor::new(input))
                .map_err(|e| MustacheError::UnsupportedFormat(e.to_string()))?;
            decoder
                .into_frames()
                .collect_frames()
                .map_err(|e| MustacheError::UnsupportedFormat(e.to_string()))?
                .into_iter()
                .map(|frame| {
                    let (numer, denom) = frame.delay().numer_denom_ms();
                    MediaFrame {
                        delay_ms: if denom == 0 { 0 } else { numer / denom },
                        image: frame.into_buffer(),
                    }
                })
                .collect::<Vec<_>>()
        }
        MediaFormat::Png | MediaFormat::Jpeg => {
            let decoded = image::load_from_memory_with_format(input, format.image_format())
                .map_err(|e| MustacheError::UnsupportedFormat(e.to_string()))?;
            vec![MediaFrame {
                image: decoded.to_rgba8(),
                delay_ms: 0,
            }]
        }
    };

    let Some(first) = frames.first() else {
        return Err(MustacheError::UnsupportedFormat(
            "image contains no frames".to_string(),
        ));
    };
    if first.image.width() == 0 || first.image.height() == 0 {
        return Err(MustacheError::ZeroDimensions);
    }

    log::debug!("Decoded {format} with {} frame(s)", frames.len());
    Ok(frames)
}

/// Drop the alpha channel for JPEG output, showing any transparent pixels
/// over white. Mustached JPEG frames are opaque and pass through unchanged.
pub(crate) fn flatten_alpha(rgba: &RgbaImage) -> RgbImage {
    let mut canvas = RgbaImage::from_pixel(rgba.width(), rgba.height(), WHITE);
    alpha_over(&mut canvas, rgba);
    DynamicImage::ImageRgba8(canvas).into_rgb8()
}

/// Encode frames back into `format`.
///
/// Single-frame formats encode the first frame only. GIF output loops forever
/// and replaces a zero delay with `default_delay_ms`.
pub(crate) fn encode_frames(
    frames: Vec<MediaFrame>,
    format: MediaFormat,
    jpeg_quality: u8,
    default_delay_ms: u32,
) -> Result<Vec<u8>, MustacheError> {
    let mut buffer = Vec::new();

    match format {
        MediaFormat::Png => {
            let image = first_frame(&frames)?;
            PngEncoder::new(&mut buffer)
                .write_image(
                    image.as_raw(),
                    image.width(),
                    image.height(),
                    image::ExtendedColorType::Rgba8,
                )
                .map_err(|e| MustacheError::EncodeError(e.to_string()))?;
        }
        MediaFormat::Jpeg => {
            let rgb = flatten_alpha(first_frame(&frames)?);
            JpegEncoder::new_with_quality(&mut buffer, jpeg_quality)
                .write_image(
                    rgb.as_raw(),
                    rgb.width(),
                    rgb.height(),
                    image::ExtendedColorType::Rgb8,
                )
                .map_err(|e| MustacheError::EncodeError(e.to_string()))?;
        }
        MediaFormat::Gif => {
            let animated = frames.len() > 1;
            // The encoder borrows the buffer until it is dropped, which also
            // writes the trailer.
            let mut encoder = GifEncoder::new_with_speed(&mut buffer, GIF_QUANTIZER_SPEED);
            if animated {
                encoder
                    .set_repeat(Repeat::Infinite)
                    .map_err(|e| MustacheError::EncodeError(e.to_string()))?;
            }
            encoder
                .encode_frames(frames.into_iter().map(|frame| {
                    let delay_ms = if frame.delay_ms == 0 {
                        default_delay_ms
                    } else {
                        frame.delay_ms
                    };
                    Frame::from_parts(frame.image, 0, 0, Delay::from_numer_denom_ms(delay_ms, 1))
                }))
                .map_err(|e| MustacheError::EncodeError(e.to_string()))?;
        }
    }

    Ok(buffer)
}

fn first_frame(frames: &[MediaFrame]) -> Result<&RgbaImage, MustacheError> {
    frames
        .first()
        .map(|frame| &frame.image)
        .ok_or_else(|| MustacheError::EncodeError("no frames to encode".to_string()))
}
