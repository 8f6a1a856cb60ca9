//! # retina_explain
//!
//! Explainability for retinal scan classifiers: activation/gradient capture,
//! Grad-CAM heatmaps, and heatmap overlays.
//!
//! This crate provides:
//! - [`ActivationGradientTap`] capturing the tap layer's activation and gradient
//! - [`HeatmapSynthesizer`] and [`grad_cam`] turning captures into a [`Heatmap`]
//! - [`OverlayRenderer`] colouring a heatmap and blending it onto the source
//!
//! ## Example
//!
//! ```rust,ignore
//! use retina_explain::{ActivationGradientTap, HeatmapSynthesizer, OverlayRenderer};
//!
//! let mut tap = ActivationGradientTap::new();
//! let scores = tap.forward(&model, input);
//! let explanation = HeatmapSynthesizer::new().synthesize(&mut tap, scores, None)?;
//! let (overlay, _) = OverlayRenderer::new().render_outcome(&image, &explanation.outcome);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod gradcam;
mod overlay;
mod tap;

pub use gradcam::{
    grad_cam, normalise_unit_interval, Explanation, Heatmap, HeatmapOutcome, HeatmapSynthesizer,
    NORMALISE_EPSILON,
};
pub use overlay::{jet, OverlayRenderer, NEUTRAL_GRAY, OVERLAY_ALPHA};
pub use tap::{ActivationGradientTap, TapCapture};
