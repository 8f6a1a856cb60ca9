//! # retina_core
//!
//! Core types and traits for retinal scan classification.
//!
//! This crate provides:
//! - [`RetinalClass`], the fixed four-entry diagnostic class table
//! - [`ClassifierScores`] with argmax, softmax and one-hot seeding
//! - [`RetinalClassifier`], a classifier trait split at the Grad-CAM tap layer
//! - [`Preprocess`] for turning RGB images into normalised network inputs
//! - Error types and common utilities
//!
//! ## Class Convention
//!
//! Score vectors are index-aligned to the class table:
//! `0 = CNV`, `1 = DME`, `2 = DRUSEN`, `3 = NORMAL`.
//!
//! ## Example
//!
//! ```rust
//! use retina_core::{ClassifierScores, RetinalClass};
//!
//! let scores = ClassifierScores::new([0.1, 0.2, 0.05, 4.0]);
//! assert_eq!(scores.argmax().label(), "NORMAL");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod class;
mod error;
mod model_trait;
mod preprocess;
mod scores;

pub use class::{RetinalClass, NUM_CLASSES};
pub use error::{CoreError, Result};
pub use model_trait::RetinalClassifier;
pub use preprocess::{Preprocess, PreprocessConfig, IMAGENET_MEAN, IMAGENET_STD};
pub use scores::ClassifierScores;

/// Re-exported image type used across the workspace.
pub use image::RgbImage;

/// Backend type aliases for convenience
pub mod backend {
    pub use burn::backend::ndarray::NdArray;
    pub use burn::backend::Autodiff;
}
