//! Trait implementations wiring models into the Grad-CAM split.

use burn::prelude::*;
use retina_core::RetinalClassifier;

use crate::cnn::RetinaResNet;

impl<B: Backend> RetinalClassifier<B> for RetinaResNet<B> {
    fn features(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.features(x)
    }

    fn head(&self, activations: Tensor<B, 4>) -> Tensor<B, 2> {
        self.head(activations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cnn::RetinaResNetConfig;
    use burn_ndarray::NdArray;

    #[test]
    fn test_trait_forward_matches_inherent() {
        let device = Default::default();
        let model = RetinaResNetConfig::default()
            .with_stem_filters(4)
            .with_filters(vec![4, 4])
            .init::<NdArray>(&device);
        let x = Tensor::<NdArray, 4>::ones([1, 3, 32, 32], &device);
        let direct = model.forward(x.clone()).into_data().to_vec::<f32>().unwrap();
        let via_trait = RetinalClassifier::forward(&model, x)
            .into_data()
            .to_vec::<f32>()
            .unwrap();
        assert_eq!(direct, via_trait);
    }
}
