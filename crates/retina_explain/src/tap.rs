//! Activation and gradient capture at the classifier's tap layer.

use burn::module::AutodiffModule;
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use retina_core::RetinalClassifier;

/// Activation and gradient snapshots taken from one forward/backward pass.
#[derive(Debug, Clone)]
pub struct TapCapture<B: Backend> {
    /// Tap-layer output, shape (1, C, H, W).
    pub activation: Option<Tensor<B, 4>>,
    /// Gradient of the seeded score with respect to the tap-layer output.
    pub gradient: Option<Tensor<B, 4>>,
}

/// Records the tap-layer activation and the gradient flowing back into it.
///
/// The tap is an owned value: its fields change only inside
/// [`forward`](Self::forward) and [`backward`](Self::backward). Create one per
/// request; two requests must never share a tap.
///
/// Internally the model's `features` run on the inner (non-differentiable)
/// backend, and the activation re-enters the autodiff graph as a fresh leaf
/// before `head` runs. Only the head is differentiated, which is all Grad-CAM
/// needs.
#[derive(Debug)]
pub struct ActivationGradientTap<B: AutodiffBackend> {
    tracked: Option<Tensor<B, 4>>,
    activation: Option<Tensor<B::InnerBackend, 4>>,
    gradient: Option<Tensor<B::InnerBackend, 4>>,
}

impl<B: AutodiffBackend> ActivationGradientTap<B> {
    /// Create an empty tap.
    pub fn new() -> Self {
        Self {
            tracked: None,
            activation: None,
            gradient: None,
        }
    }

    /// Run `model` on `input`, recording the tap-layer activation.
    ///
    /// Replaces any previous activation and clears the previous gradient.
    /// Returns the differentiable class logits of shape (1, n_classes).
    pub fn forward<M>(&mut self, model: &M, input: Tensor<B::InnerBackend, 4>) -> Tensor<B, 2>
    where
        M: AutodiffModule<B> + RetinalClassifier<B>,
        M::InnerModule: RetinalClassifier<B::InnerBackend>,
    {
        let activation = model.valid().features(input);
        let tracked = Tensor::<B, 4>::from_inner(activation.clone()).require_grad();

        self.activation = Some(activation);
        self.gradient = None;
        self.tracked = Some(tracked.clone());

        model.head(tracked)
    }

    /// Backpropagate `sum(scores * seed)` and record the tap-layer gradient.
    ///
    /// The gradient is left absent when the backward pass never reaches the
    /// tap layer.
    pub fn backward(&mut self, scores: Tensor<B, 2>, seed: Tensor<B, 2>) {
        let grads = (scores * seed).sum().backward();
        self.gradient = self.tracked.as_ref().and_then(|tracked| tracked.grad(&grads));
    }

    /// Activation from the latest forward pass.
    pub fn latest_activation(&self) -> Option<&Tensor<B::InnerBackend, 4>> {
        self.activation.as_ref()
    }

    /// Gradient from the latest backward pass.
    pub fn latest_gradient(&self) -> Option<&Tensor<B::InnerBackend, 4>> {
        self.gradient.as_ref()
    }

    /// Shape of the latest activation.
    pub fn activation_dims(&self) -> Option<[usize; 4]> {
        self.activation.as_ref().map(Tensor::dims)
    }

    /// Copy out the current snapshots.
    pub fn capture(&self) -> TapCapture<B::InnerBackend> {
        TapCapture {
            activation: self.activation.clone(),
            gradient: self.gradient.clone(),
        }
    }

    /// Move the snapshots out, leaving the tap empty.
    pub fn take(&mut self) -> TapCapture<B::InnerBackend> {
        self.tracked = None;
        TapCapture {
            activation: self.activation.take(),
            gradient: self.gradient.take(),
        }
    }
}

impl<B: AutodiffBackend> Default for ActivationGradientTap<B> {
    fn default() -> Self {
        Self::new()
    }
}
