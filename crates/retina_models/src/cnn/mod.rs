//! Convolutional architectures.

mod resnet;

pub use resnet::{ResidualBlock2d, RetinaResNet, RetinaResNetConfig};
