//! Error types for retina_core.

use thiserror::Error;

/// Result type alias using [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors that can occur in retina_core operations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Invalid tensor shape provided.
    #[error("Invalid shape: expected {expected}, got {got}")]
    InvalidShape {
        /// Expected shape description.
        expected: String,
        /// Actual shape description.
        got: String,
    },

    /// Shape mismatch between tensors.
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Class index outside the class table.
    #[error("Unknown class index {0}")]
    UnknownClass(usize),

    /// Class label that does not name a diagnostic class.
    #[error("Unknown class label '{0}'")]
    UnknownLabel(String),

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Tensor data could not be read back from the backend.
    #[error("Tensor data error: {0}")]
    TensorData(String),

    /// The activation tap was read before any forward pass ran.
    #[error("No activation recorded: run a forward pass through the tap first")]
    TapEmpty,
}
