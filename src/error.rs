//! Error types for image-eval operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for image-eval operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during image analysis.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Two inputs that must agree in shape (dimensions, channels, precision,
    /// bin count) do not.
    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch {
        /// Shape of the first (reference) input.
        expected: String,
        /// Shape of the second (candidate) input.
        actual: String,
    },

    /// A single input has an impossible shape (zero area, bad channel count,
    /// data length that does not match the declared dimensions, ...).
    #[error("Invalid shape: {0}")]
    InvalidShape(String),

    /// A sample is outside the domain declared for the buffer.
    #[error("Sample out of range at index {index}: {value} (expected 0.0..=1.0)")]
    SampleOutOfRange {
        /// Index of the offending sample in the interleaved data.
        index: usize,
        /// The offending value.
        value: f32,
    },

    /// The buffer is too small for a windowed computation.
    #[error(
        "Insufficient data for {operation}: needs at least {required}x{required}, got {width}x{height}"
    )]
    InsufficientData {
        /// Operation that needed more data.
        operation: &'static str,
        /// Minimum side length required.
        required: usize,
        /// Actual buffer width.
        width: usize,
        /// Actual buffer height.
        height: usize,
    },

    /// Quality metric is outside the accepted threshold.
    #[error("{metric} outside threshold: {value} (threshold: {threshold})")]
    QualityBelowThreshold {
        /// Name of the quality metric.
        metric: String,
        /// Actual value.
        value: f64,
        /// Threshold that was not met.
        threshold: f64,
    },

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Failed to load or save an image file.
    #[error("Image load failed: {path}: {reason}")]
    ImageLoad {
        /// Path to the image that failed to load.
        path: PathBuf,
        /// Reason for the failure.
        reason: String,
    },

    /// I/O error wrapper.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Coarse classification of [`Error`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Dimension, channel, precision or bin-count problem. Always fatal.
    Shape,
    /// Sample outside its declared domain. Rejects buffer creation.
    Range,
    /// Too little data for a windowed computation. Recoverable per metric.
    InsufficientData,
    /// Anything else (thresholds, configuration, I/O, serialization).
    Other,
}

impl Error {
    /// Build a [`Error::ShapeMismatch`] from two displayable shapes.
    pub(crate) fn mismatch(expected: impl std::fmt::Display, actual: impl std::fmt::Display) -> Self {
        Self::ShapeMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ShapeMismatch { .. } | Self::InvalidShape(_) => ErrorKind::Shape,
            Self::SampleOutOfRange { .. } => ErrorKind::Range,
            Self::InsufficientData { .. } => ErrorKind::InsufficientData,
            _ => ErrorKind::Other,
        }
    }

    /// Whether this error is a shape error.
    #[must_use]
    pub fn is_shape_error(&self) -> bool {
        self.kind() == ErrorKind::Shape
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(Error::mismatch("1x1x1", "2x2x1").kind(), ErrorKind::Shape);
        assert_eq!(Error::InvalidShape("zero width".into()).kind(), ErrorKind::Shape);
        assert_eq!(
            Error::SampleOutOfRange { index: 0, value: 2.0 }.kind(),
            ErrorKind::Range
        );
        assert_eq!(
            Error::InsufficientData {
                operation: "noise",
                required: 5,
                width: 2,
                height: 2
            }
            .kind(),
            ErrorKind::InsufficientData
        );
        assert_eq!(Error::Config("bad".into()).kind(), ErrorKind::Other);
    }

    #[test]
    fn test_display() {
        let err = Error::mismatch("100x100x3", "50x50x3");
        assert_eq!(
            err.to_string(),
            "Shape mismatch: expected 100x100x3, got 50x50x3"
        );
    }
}
