//! Image-to-tensor preprocessing for the classifier.

use burn::prelude::*;
use image::imageops::{self, FilterType};
use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// ImageNet channel means.
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// ImageNet channel standard deviations.
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Configuration for [`Preprocess`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessConfig {
    /// Side length of the square network input.
    pub size: u32,
    /// Per-channel mean subtracted after scaling to [0, 1].
    pub mean: [f32; 3],
    /// Per-channel standard deviation divided out after mean subtraction.
    pub std: [f32; 3],
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            size: 224,
            mean: IMAGENET_MEAN,
            std: IMAGENET_STD,
        }
    }
}

impl PreprocessConfig {
    /// Check that the configuration can produce a valid tensor.
    pub fn validate(&self) -> Result<()> {
        if self.size == 0 {
            return Err(CoreError::InvalidConfig(
                "preprocess size must be greater than zero".to_string(),
            ));
        }
        if self.std.iter().any(|&s| s <= 0.0 || !s.is_finite()) {
            return Err(CoreError::InvalidConfig(format!(
                "preprocess std must be positive, got {:?}",
                self.std
            )));
        }
        Ok(())
    }
}

/// Resizes an RGB image and converts it to a normalised `(1, 3, H, W)` tensor.
#[derive(Debug, Clone)]
pub struct Preprocess {
    config: PreprocessConfig,
}

impl Preprocess {
    /// Create a preprocessor, validating its configuration.
    pub fn new(config: PreprocessConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Convert `image` into a network input tensor on `device`.
    pub fn to_tensor<B: Backend>(
        &self,
        image: &RgbImage,
        device: &B::Device,
    ) -> Result<Tensor<B, 4>> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(CoreError::InvalidShape {
                expected: "non-empty image".to_string(),
                got: format!("{width}x{height}"),
            });
        }

        let size = self.config.size;
        let resized = imageops::resize(image, size, size, FilterType::Triangle);
        let side = size as usize;
        let plane = side * side;

        let mut data = vec![0.0f32; 3 * plane];
        for (x, y, pixel) in resized.enumerate_pixels() {
            let offset = y as usize * side + x as usize;
            for c in 0..3 {
                let scaled = f32::from(pixel[c]) / 255.0;
                data[c * plane + offset] = (scaled - self.config.mean[c]) / self.config.std[c];
            }
        }

        Ok(Tensor::from_data(
            TensorData::new(data, [1, 3, side, side]),
            device,
        ))
    }
}

impl Default for Preprocess {
    fn default() -> Self {
        Self {
            config: PreprocessConfig::default(),
        }
    }
}
