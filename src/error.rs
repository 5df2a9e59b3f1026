//! Error types for the expression clip pipeline.

use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// `ONNX` Runtime inference failed
    #[error("ONNX Runtime error: {0}")]
    OnnxRuntime(#[from] ort::OrtError),

    /// `OpenCV` operation failed
    #[cfg(feature = "opencv")]
    #[error("OpenCV error: {0}")]
    OpenCV(#[from] opencv::Error),

    /// File I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding or encoding failed
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Frame file has an extension the pipeline does not read
    #[error("Unsupported frame format: {0}")]
    UnsupportedFormat(String),

    /// Invalid input parameters provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Model loading or inference error
    #[error("Model error: {0}")]
    ModelError(String),

    /// Model input configuration error
    #[error("Model input error: {0}")]
    ModelInputError(String),

    /// Model output processing error
    #[error("Model output error: {0}")]
    ModelOutputError(String),

    /// Model data shape or format error
    #[error("Model data format error: {0}")]
    ModelDataFormatError(String),

    /// Tensors that must share a shape do not
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// No frame of a video could be normalized
    #[error("Empty clip: no readable frames among {frames} path(s)")]
    EmptyClip {
        /// Number of frame paths that were offered to the assembler
        frames: usize,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl Error {
    /// Whether this failure belongs to a single example and can be skipped
    /// without aborting the surrounding epoch.
    #[must_use]
    pub fn is_item_recoverable(&self) -> bool {
        matches!(
            self,
            Self::EmptyClip { .. } | Self::Image(_) | Self::Io(_) | Self::UnsupportedFormat(_)
        )
    }
}

/// Convenience type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;
