//! # retina_pipeline
//!
//! Request orchestration for retinal scan classification.
//!
//! An [`InferencePipeline`] takes an image through
//! `Received -> Validated -> Classified -> Explained -> Completed`:
//!
//! 1. the plausibility gate rejects non-retinal images early
//! 2. one forward pass through a fresh activation/gradient tap yields scores
//! 3. Grad-CAM explains the predicted (or requested) class
//! 4. the heatmap is blended onto the source and both are optionally stored
//!
//! Rejection and degraded explanations are outcomes, not errors; only
//! unexpected failures surface as [`PipelineError`].

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod outcome;
pub mod pipeline;
pub mod store;

pub use config::{PipelineConfig, MAX_UPLOAD_BYTES};
pub use error::{PipelineError, Result};
pub use outcome::{
    PipelineOutcome, Prediction, PredictionReport, Rejection, RequestMetadata, RequestStage,
};
pub use pipeline::InferencePipeline;
pub use store::{ImageStore, LocalDirStore, MemoryStore, StoreError};
