//! # retina
//!
//! Retinal scan classification with Grad-CAM explanations.
//!
//! - **Gate**: eight pixel-statistics checks reject non-retinal images
//! - **Models**: a burn residual CNN scoring CNV, DME, DRUSEN and NORMAL
//! - **Explain**: activation/gradient tap, Grad-CAM, jet overlays
//! - **Pipeline**: request orchestration with pluggable image storage
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use retina::prelude::*;
//!
//! type B = Autodiff<NdArray>;
//!
//! let device = Default::default();
//! let config = PipelineConfig::default();
//! let model = config.model.init::<B>(&device);
//! let pipeline = InferencePipeline::<B, _>::new(model, device, config)?;
//!
//! match pipeline.process(&image, None, &RequestMetadata::new())? {
//!     PipelineOutcome::Completed(prediction) => {
//!         println!("{} ({})", prediction.label, prediction.confidence_label());
//!     }
//!     PipelineOutcome::Rejected(rejection) => println!("{}", rejection.verdict.reason),
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

// Re-export all crates
pub use retina_core as core;
pub use retina_explain as explain;
pub use retina_gate as gate;
pub use retina_models as models;
pub use retina_pipeline as pipeline;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use retina::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use retina_core::backend::{Autodiff, NdArray};
    pub use retina_core::{
        ClassifierScores, Preprocess, PreprocessConfig, RetinalClass, RetinalClassifier, RgbImage,
    };

    // Models
    pub use retina_models::{load_checkpoint, save_checkpoint, RetinaResNet, RetinaResNetConfig};

    // Explain
    pub use retina_explain::{
        ActivationGradientTap, Heatmap, HeatmapOutcome, HeatmapSynthesizer, OverlayRenderer,
    };

    // Gate
    pub use retina_gate::{PlausibilityCheck, RetinalPlausibilityGate, ValidationVerdict};

    // Pipeline
    pub use retina_pipeline::{
        ImageStore, InferencePipeline, LocalDirStore, MemoryStore, PipelineConfig,
        PipelineError, PipelineOutcome, Prediction, RequestMetadata, RequestStage,
    };
}
