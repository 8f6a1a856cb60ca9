//! # retina_models
//!
//! Convolutional classifiers for retinal scans.
//!
//! ## CNN Models
//! - [`RetinaResNet`] - residual CNN whose last stage is the Grad-CAM tap layer
//!
//! Every model implements [`retina_core::RetinalClassifier`], exposing the
//! `features` / `head` split used by the explainability pipeline.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod checkpoint;
pub mod cnn;
pub mod traits;

pub use checkpoint::{
    checkpoint_exists, load_checkpoint, save_checkpoint, CheckpointError, CheckpointMetadata,
};
pub use cnn::*;
