//! ResNet architecture for retinal scans.

use burn::nn::{
    conv::{Conv2d, Conv2dConfig},
    pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
    BatchNorm, BatchNormConfig, Linear, LinearConfig, PaddingConfig2d, Relu,
};
use burn::prelude::*;
use retina_core::NUM_CLASSES;
use serde::{Deserialize, Serialize};

/// Configuration for RetinaResNet model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetinaResNetConfig {
    /// Number of input channels.
    pub in_channels: usize,
    /// Number of output classes.
    pub n_classes: usize,
    /// Filters in the 7x7 stem convolution.
    pub stem_filters: usize,
    /// Filters per residual stage. Every stage after the first halves the
    /// spatial resolution.
    pub n_filters: Vec<usize>,
    /// Kernel size of the residual convolutions (odd).
    pub kernel_size: usize,
}

impl Default for RetinaResNetConfig {
    fn default() -> Self {
        Self {
            in_channels: 3,
            n_classes: NUM_CLASSES,
            stem_filters: 32,
            n_filters: vec![32, 64, 128, 256],
            kernel_size: 3,
        }
    }
}

impl RetinaResNetConfig {
    /// Create a new config with the default stage layout.
    pub fn new(in_channels: usize, n_classes: usize) -> Self {
        Self {
            in_channels,
            n_classes,
            ..Default::default()
        }
    }

    /// Set the per-stage filter counts.
    #[must_use]
    pub fn with_filters(mut self, n_filters: Vec<usize>) -> Self {
        self.n_filters = n_filters;
        self
    }

    /// Set the stem width.
    #[must_use]
    pub fn with_stem_filters(mut self, stem_filters: usize) -> Self {
        self.stem_filters = stem_filters;
        self
    }

    /// Spatial side of the tap layer for a square input of side `input`.
    #[must_use]
    pub fn tap_size(&self, input: usize) -> usize {
        // stem conv (stride 2) then max-pool (stride 2)
        let mut side = conv_out(conv_out(input, 7, 2, 3), 3, 2, 1);
        let pad = self.kernel_size / 2;
        for _ in 1..self.n_filters.len() {
            side = conv_out(side, self.kernel_size, 2, pad);
        }
        side
    }

    /// Initialize the model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> RetinaResNet<B> {
        RetinaResNet::new(self.clone(), device)
    }
}

fn conv_out(size: usize, kernel: usize, stride: usize, padding: usize) -> usize {
    (size + 2 * padding).saturating_sub(kernel) / stride + 1
}

/// Residual block with two convolutions and a projection shortcut when needed.
#[derive(Module, Debug)]
pub struct ResidualBlock2d<B: Backend> {
    conv1: Conv2d<B>,
    bn1: BatchNorm<B, 2>,
    conv2: Conv2d<B>,
    bn2: BatchNorm<B, 2>,
    shortcut: Option<Conv2d<B>>,
    shortcut_bn: Option<BatchNorm<B, 2>>,
}

impl<B: Backend> ResidualBlock2d<B> {
    /// Create a new residual block.
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        stride: usize,
        device: &B::Device,
    ) -> Self {
        let pad = kernel_size / 2;
        let conv1 = Conv2dConfig::new([in_channels, out_channels], [kernel_size, kernel_size])
            .with_stride([stride, stride])
            .with_padding(PaddingConfig2d::Explicit(pad, pad))
            .with_bias(false)
            .init(device);
        let bn1 = BatchNormConfig::new(out_channels).init(device);

        let conv2 = Conv2dConfig::new([out_channels, out_channels], [kernel_size, kernel_size])
            .with_padding(PaddingConfig2d::Explicit(pad, pad))
            .with_bias(false)
            .init(device);
        let bn2 = BatchNormConfig::new(out_channels).init(device);

        // Project the shortcut when the block changes shape
        let (shortcut, shortcut_bn) = if in_channels != out_channels || stride != 1 {
            let sc = Conv2dConfig::new([in_channels, out_channels], [1, 1])
                .with_stride([stride, stride])
                .with_bias(false)
                .init(device);
            let sc_bn = BatchNormConfig::new(out_channels).init(device);
            (Some(sc), Some(sc_bn))
        } else {
            (None, None)
        };

        Self {
            conv1,
            bn1,
            conv2,
            bn2,
            shortcut,
            shortcut_bn,
        }
    }

    /// Forward pass.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let relu = Relu::new();

        let out = self.conv1.forward(x.clone());
        let out = self.bn1.forward(out);
        let out = relu.forward(out);

        let out = self.conv2.forward(out);
        let out = self.bn2.forward(out);

        let shortcut = if let (Some(sc), Some(sc_bn)) = (&self.shortcut, &self.shortcut_bn) {
            sc_bn.forward(sc.forward(x))
        } else {
            x
        };

        relu.forward(out + shortcut)
    }
}

/// ResNet classifier for retinal scans.
///
/// The tap layer is the output of the last residual stage, just before
/// global average pooling.
#[derive(Module, Debug)]
pub struct RetinaResNet<B: Backend> {
    stem: Conv2d<B>,
    stem_bn: BatchNorm<B, 2>,
    pool: MaxPool2d,
    stages: Vec<ResidualBlock2d<B>>,
    gap: AdaptiveAvgPool2d,
    fc: Linear<B>,
}

impl<B: Backend> RetinaResNet<B> {
    /// Create a new RetinaResNet model.
    pub fn new(config: RetinaResNetConfig, device: &B::Device) -> Self {
        let stem = Conv2dConfig::new([config.in_channels, config.stem_filters], [7, 7])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(3, 3))
            .with_bias(false)
            .init(device);
        let stem_bn = BatchNormConfig::new(config.stem_filters).init(device);
        let pool = MaxPool2dConfig::new([3, 3])
            .with_strides([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init();

        let mut stages = Vec::with_capacity(config.n_filters.len());
        let mut in_channels = config.stem_filters;
        for (i, &out_channels) in config.n_filters.iter().enumerate() {
            let stride = if i == 0 { 1 } else { 2 };
            stages.push(ResidualBlock2d::new(
                in_channels,
                out_channels,
                config.kernel_size,
                stride,
                device,
            ));
            in_channels = out_channels;
        }

        let gap = AdaptiveAvgPool2dConfig::new([1, 1]).init();
        let fc = LinearConfig::new(in_channels, config.n_classes).init(device);

        Self {
            stem,
            stem_bn,
            pool,
            stages,
            gap,
            fc,
        }
    }

    /// Run the stem and every residual stage.
    pub fn features(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let out = self.stem.forward(x);
        let out = self.stem_bn.forward(out);
        let out = Relu::new().forward(out);
        let mut out = self.pool.forward(out);

        for stage in &self.stages {
            out = stage.forward(out);
        }
        out
    }

    /// Pool the tap activations and project to class logits.
    pub fn head(&self, activations: Tensor<B, 4>) -> Tensor<B, 2> {
        let out = self.gap.forward(activations);
        let [batch, channels, _, _] = out.dims();
        let out = out.reshape([batch, channels]);
        self.fc.forward(out)
    }

    /// Forward pass.
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        self.head(self.features(x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    fn small_config() -> RetinaResNetConfig {
        RetinaResNetConfig::default()
            .with_stem_filters(4)
            .with_filters(vec![4, 8, 8, 8])
    }

    #[test]
    fn test_resnet_config() {
        let config = RetinaResNetConfig::default();
        assert_eq!(config.n_classes, 4);
        assert_eq!(config.kernel_size, 3);
        assert_eq!(config.tap_size(224), 7);
    }

    #[test]
    fn test_tap_shape() {
        let device = Default::default();
        let model = small_config().init::<NdArray>(&device);
        let x = Tensor::<NdArray, 4>::zeros([1, 3, 64, 64], &device);
        let features = model.features(x);
        let side = small_config().tap_size(64);
        assert_eq!(features.dims(), [1, 8, side, side]);
    }

    #[test]
    fn test_forward_shape() {
        let device = Default::default();
        let model = small_config().init::<NdArray>(&device);
        let x = Tensor::<NdArray, 4>::zeros([1, 3, 64, 64], &device);
        assert_eq!(model.forward(x).dims(), [1, 4]);
    }
}
