//! Error types for the inference pipeline.

use thiserror::Error;

use crate::outcome::RequestStage;
use crate::store::StoreError;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that end a request in the `Failed` stage.
///
/// Rejections and degraded explanations are not errors; they are reported
/// through [`crate::PipelineOutcome`] and [`crate::Prediction::degraded`].
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Unexpected failure while processing a request.
    #[error("Processing failed after the {stage} stage: {message}")]
    Failed {
        /// Stage the request had reached.
        stage: RequestStage,
        /// Failure detail.
        message: String,
    },

    /// Uploaded bytes could not be decoded as an image.
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    /// Upload exceeds the configured size limit.
    #[error("Upload of {size} bytes exceeds the {limit} byte limit")]
    TooLarge {
        /// Upload size in bytes.
        size: usize,
        /// Configured limit in bytes.
        limit: usize,
    },

    /// Image persistence failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl PipelineError {
    /// Wrap any displayable error as a failure at `stage`.
    pub fn failed(stage: RequestStage, error: impl std::fmt::Display) -> Self {
        Self::Failed {
            stage,
            message: error.to_string(),
        }
    }
}
