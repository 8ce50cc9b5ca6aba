use thiserror::Error;

/// Errors returned by mustachizer operations.
#[derive(Debug, Error)]
pub enum MustacheError {
    /// The input is not a decodable PNG, JPEG or GIF.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// The decoded image has no pixels.
    #[error("image dimensions are zero")]
    ZeroDimensions,

    /// No frame of the input contained a face.
    #[error("no face found in the image")]
    NoFaceDetected,

    /// No mustache with this name in the catalog.
    #[error("unknown mustache: {0}")]
    UnknownDecal(String),

    /// A catalog needs at least one mustache.
    #[error("the mustache catalog is empty")]
    EmptyCatalog,

    /// A mustache asset could not be loaded or is invalid.
    #[error("failed to load mustache {name}: {reason}")]
    DecalAsset {
        /// Mustache name.
        name: String,
        /// What went wrong.
        reason: String,
    },

    /// Output encoding failed.
    #[error("failed to encode image: {0}")]
    EncodeError(String),

    /// The face detector could not be set up.
    #[error("face detector error: {0}")]
    Detector(String),

    /// Invalid or unreadable configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// File system error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
