//! Classifier trait split at the tap layer.
//!
//! Grad-CAM needs the output of one internal layer and the gradient flowing
//! back into it. Rather than hooking a layer, classifiers expose the split
//! point directly: [`RetinalClassifier::features`] runs everything up to and
//! including the tap layer, [`RetinalClassifier::head`] runs the rest.

use burn::prelude::*;

/// A retinal scan classifier with an explicit tap layer.
pub trait RetinalClassifier<B: Backend>: Module<B> {
    /// Run the network up to the tap layer.
    ///
    /// # Arguments
    ///
    /// * `x` - Normalised input of shape (1, 3, height, width)
    ///
    /// # Returns
    ///
    /// Tap-layer activations of shape (1, channels, h, w)
    fn features(&self, x: Tensor<B, 4>) -> Tensor<B, 4>;

    /// Map tap-layer activations to logits of shape (1, n_classes).
    fn head(&self, activations: Tensor<B, 4>) -> Tensor<B, 2>;

    /// Full forward pass returning logits.
    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        self.head(self.features(x))
    }

}
