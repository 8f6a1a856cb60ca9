//! Gradient-weighted class activation maps.

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use retina_core::{ClassifierScores, CoreError, Result, RetinalClass, NUM_CLASSES};
use serde::{Deserialize, Serialize};

use crate::tap::ActivationGradientTap;

/// Epsilon added to the min-max range during normalisation.
pub const NORMALISE_EPSILON: f32 = 1e-10;

/// Single-channel importance map in [0, 1], stored row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heatmap {
    height: usize,
    width: usize,
    values: Vec<f32>,
}

impl Heatmap {
    /// Create a heatmap from row-major values.
    pub fn new(height: usize, width: usize, values: Vec<f32>) -> Result<Self> {
        if values.len() != height * width {
            return Err(CoreError::InvalidShape {
                expected: format!("{} values ({height}x{width})", height * width),
                got: format!("{} values", values.len()),
            });
        }
        Ok(Self {
            height,
            width,
            values,
        })
    }

    /// A heatmap of zeros.
    #[must_use]
    pub fn zeros(height: usize, width: usize) -> Self {
        Self {
            height,
            width,
            values: vec![0.0; height * width],
        }
    }

    /// Number of rows.
    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of columns.
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Row-major values.
    #[must_use]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Value at (`row`, `col`), if in bounds.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        if row >= self.height || col >= self.width {
            return None;
        }
        self.values.get(row * self.width + col).copied()
    }

    /// Smallest value (0 for an empty map).
    #[must_use]
    pub fn min(&self) -> f32 {
        self.values.iter().copied().reduce(f32::min).unwrap_or(0.0)
    }

    /// Largest value (0 for an empty map).
    #[must_use]
    pub fn max(&self) -> f32 {
        self.values.iter().copied().reduce(f32::max).unwrap_or(0.0)
    }

    /// Whether every cell holds the same value.
    #[must_use]
    pub fn is_flat(&self) -> bool {
        self.max() - self.min() == 0.0
    }
}

/// Result of explaining one prediction.
///
/// `Degraded` carries a zero heatmap at the tap layer's native resolution and
/// means no gradient reached the tap; the prediction itself is still valid.
#[derive(Debug, Clone, PartialEq)]
pub enum HeatmapOutcome {
    /// A Grad-CAM map computed from real gradients.
    Attributed(Heatmap),
    /// A zero map substituted because the gradient was unavailable.
    Degraded(Heatmap),
}

impl HeatmapOutcome {
    /// The heatmap, whichever branch produced it.
    #[must_use]
    pub fn heatmap(&self) -> &Heatmap {
        match self {
            HeatmapOutcome::Attributed(map) | HeatmapOutcome::Degraded(map) => map,
        }
    }

    /// Whether the gradient was unavailable.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        matches!(self, HeatmapOutcome::Degraded(_))
    }
}

/// Min-max normalise `values` into [0, 1].
///
/// A uniform input maps to all zeros.
pub fn normalise_unit_interval(values: &mut [f32]) {
    let min = values.iter().copied().fold(f32::INFINITY, f32::min);
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let denom = max - min + NORMALISE_EPSILON;
    for value in values.iter_mut() {
        *value = ((*value - min) / denom).clamp(0.0, 1.0);
    }
}

/// Compute a Grad-CAM heatmap.
///
/// # Arguments
///
/// * `activations` - Tap-layer activations (1, channels, height, width)
/// * `gradients` - Gradients w.r.t. those activations, same shape
///
/// # Returns
///
/// A normalised (height, width) heatmap.
pub fn grad_cam<B: Backend>(activations: Tensor<B, 4>, gradients: Tensor<B, 4>) -> Result<Heatmap> {
    let dims = activations.dims();
    if dims != gradients.dims() {
        return Err(CoreError::ShapeMismatch(format!(
            "activations {:?} vs gradients {:?}",
            dims,
            gradients.dims()
        )));
    }
    if dims[0] != 1 {
        return Err(CoreError::InvalidShape {
            expected: "batch of 1".to_string(),
            got: format!("batch of {}", dims[0]),
        });
    }

    // Average the gradients over space: (1, C, H, W) -> (1, C, 1, 1)
    let weights = gradients.mean_dim(3).mean_dim(2);

    // Weight the activations and average over channels: -> (1, 1, H, W)
    let cam = (activations * weights).mean_dim(1);

    // ReLU
    let cam = cam.clamp_min(0.0);

    let [_, _, height, width] = cam.dims();
    let mut values = cam
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| CoreError::TensorData(format!("{e:?}")))?;
    normalise_unit_interval(&mut values);
    Heatmap::new(height, width, values)
}

/// A Grad-CAM explanation for one class.
#[derive(Debug, Clone)]
pub struct Explanation {
    /// Class whose score was backpropagated.
    pub target: RetinalClass,
    /// Scores from the forward pass.
    pub scores: ClassifierScores,
    /// The heatmap, attributed or degraded.
    pub outcome: HeatmapOutcome,
}

/// Drives the backward pass through an [`ActivationGradientTap`] and turns
/// the captured tensors into a heatmap.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeatmapSynthesizer;

impl HeatmapSynthesizer {
    /// Create a synthesizer.
    pub fn new() -> Self {
        Self
    }

    /// Explain `scores`, which must come from `tap.forward`.
    ///
    /// With `target == None` the highest-scoring class is explained.
    pub fn synthesize<B: AutodiffBackend>(
        &self,
        tap: &mut ActivationGradientTap<B>,
        scores: Tensor<B, 2>,
        target: Option<RetinalClass>,
    ) -> Result<Explanation> {
        let values = ClassifierScores::from_tensor(scores.clone().inner())?;
        let target = target.unwrap_or_else(|| values.argmax());

        let seed = Tensor::<B, 2>::from_data(
            TensorData::new(ClassifierScores::one_hot(target).to_vec(), [1, NUM_CLASSES]),
            &scores.device(),
        );
        tap.backward(scores, seed);

        let [_, _, height, width] = tap.activation_dims().ok_or(CoreError::TapEmpty)?;
        let outcome = match (tap.latest_activation(), tap.latest_gradient()) {
            (Some(activation), Some(gradient)) => {
                HeatmapOutcome::Attributed(grad_cam(activation.clone(), gradient.clone())?)
            }
            _ => {
                tracing::warn!(
                    "No gradient reached the tap layer for class {}; returning a zero heatmap",
                    target
                );
                HeatmapOutcome::Degraded(Heatmap::zeros(height, width))
            }
        };

        tracing::debug!(
            "Synthesized {}x{} heatmap for class {} (degraded: {})",
            height,
            width,
            target,
            outcome.is_degraded()
        );

        Ok(Explanation {
            target,
            scores: values,
            outcome,
        })
    }
}
