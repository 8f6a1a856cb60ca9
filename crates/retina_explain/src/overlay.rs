//! Heatmap colouring and blending onto the source image.

use image::imageops::{self, FilterType};
use image::{ImageBuffer, Luma, Rgb, RgbImage};
use retina_core::{CoreError, Result};

use crate::gradcam::{Heatmap, HeatmapOutcome};

/// Weight of the coloured heatmap in the blend.
pub const OVERLAY_ALPHA: f32 = 0.4;

/// Channel value of the flat placeholder image.
pub const NEUTRAL_GRAY: u8 = 200;

// Jet colour map control points: (position, value) per channel.
const JET_RED: [(f32, f32); 5] = [(0.0, 0.0), (0.35, 0.0), (0.66, 1.0), (0.89, 1.0), (1.0, 0.5)];
const JET_GREEN: [(f32, f32); 6] = [
    (0.0, 0.0),
    (0.125, 0.0),
    (0.375, 1.0),
    (0.64, 1.0),
    (0.91, 0.0),
    (1.0, 0.0),
];
const JET_BLUE: [(f32, f32); 5] = [(0.0, 0.5), (0.11, 1.0), (0.34, 1.0), (0.65, 0.0), (1.0, 0.0)];

fn interpolate(points: &[(f32, f32)], t: f32) -> f32 {
    for pair in points.windows(2) {
        let (x0, y0) = pair[0];
        let (x1, y1) = pair[1];
        if t <= x1 {
            let span = x1 - x0;
            if span <= 0.0 {
                return y1;
            }
            return y0 + (y1 - y0) * (t - x0) / span;
        }
    }
    points.last().map_or(0.0, |&(_, y)| y)
}

/// Map an 8-bit intensity through the jet palette (blue -> cyan -> yellow -> red).
#[must_use]
pub fn jet(index: u8) -> Rgb<u8> {
    let t = f32::from(index) / 255.0;
    let channel = |points: &[(f32, f32)]| (interpolate(points, t) * 255.0).round() as u8;
    Rgb([channel(&JET_RED), channel(&JET_GREEN), channel(&JET_BLUE)])
}

/// Resizes a heatmap to the source resolution, colours it and blends it on top.
#[derive(Debug, Clone)]
pub struct OverlayRenderer {
    palette: [Rgb<u8>; 256],
}

impl OverlayRenderer {
    /// Create a renderer with the jet palette.
    pub fn new() -> Self {
        let mut palette = [Rgb([0, 0, 0]); 256];
        for (i, colour) in palette.iter_mut().enumerate() {
            *colour = jet(i as u8);
        }
        Self { palette }
    }

    /// Flat gray image of the given size, used when no heatmap is available.
    #[must_use]
    pub fn neutral(width: u32, height: u32) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb([NEUTRAL_GRAY; 3]))
    }

    /// Resize `heatmap` to `width` x `height` with bilinear interpolation.
    pub fn resize_heatmap(heatmap: &Heatmap, width: u32, height: u32) -> Result<Vec<f32>> {
        if heatmap.width() == 0 || heatmap.height() == 0 {
            return Err(CoreError::InvalidShape {
                expected: "non-empty heatmap".to_string(),
                got: format!("{}x{}", heatmap.width(), heatmap.height()),
            });
        }
        if (heatmap.width(), heatmap.height()) == (width as usize, height as usize) {
            return Ok(heatmap.values().to_vec());
        }
        let buffer: ImageBuffer<Luma<f32>, Vec<f32>> = ImageBuffer::from_raw(
            heatmap.width() as u32,
            heatmap.height() as u32,
            heatmap.values().to_vec(),
        )
        .ok_or_else(|| CoreError::InvalidShape {
            expected: format!("{}x{} heatmap buffer", heatmap.width(), heatmap.height()),
            got: format!("{} values", heatmap.values().len()),
        })?;
        let resized = imageops::resize(&buffer, width, height, FilterType::Triangle);
        Ok(resized.into_raw())
    }

    /// Colour `heatmap` and blend it onto `source`.
    ///
    /// Each channel is `clip(0.4 * colour + source, 0, 255)`, truncated.
    pub fn render(&self, source: &RgbImage, heatmap: &Heatmap) -> Result<RgbImage> {
        let (width, height) = source.dimensions();
        let resized = Self::resize_heatmap(heatmap, width, height)?;

        let mut output = RgbImage::new(width, height);
        for ((dst, src), &value) in output
            .pixels_mut()
            .zip(source.pixels())
            .zip(resized.iter())
        {
            let index = (255.0 * value.clamp(0.0, 1.0)) as u8;
            let colour = self.palette[usize::from(index)];
            for c in 0..3 {
                let blended = OVERLAY_ALPHA * f32::from(colour[c]) + f32::from(src[c]);
                dst[c] = blended.clamp(0.0, 255.0) as u8;
            }
        }
        Ok(output)
    }

    /// Render an explanation outcome.
    ///
    /// Degraded outcomes, and attributed ones that fail to render, produce the
    /// neutral placeholder. The returned flag is `true` when the placeholder
    /// was used.
    pub fn render_outcome(&self, source: &RgbImage, outcome: &HeatmapOutcome) -> (RgbImage, bool) {
        let (width, height) = source.dimensions();
        match outcome {
            HeatmapOutcome::Attributed(heatmap) => match self.render(source, heatmap) {
                Ok(image) => (image, false),
                Err(e) => {
                    tracing::warn!("Heatmap rendering failed, using placeholder: {}", e);
                    (Self::neutral(width, height), true)
                }
            },
            HeatmapOutcome::Degraded(_) => (Self::neutral(width, height), true),
        }
    }
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jet_endpoints() {
        assert_eq!(jet(0), Rgb([0, 0, 128]));
        assert_eq!(jet(255), Rgb([128, 0, 0]));
        // Middle of the map is green-dominant
        let mid = jet(128);
        assert!(mid[1] > mid[0] && mid[1] > mid[2]);
    }

    #[test]
    fn test_output_matches_source_size() {
        let renderer = OverlayRenderer::new();
        let source = RgbImage::from_pixel(317, 211, Rgb([10, 20, 30]));
        for (h, w) in [(7, 7), (1, 1), (14, 3)] {
            let heatmap = Heatmap::new(h, w, vec![0.5; h * w]).unwrap();
            let overlay = renderer.render(&source, &heatmap).unwrap();
            assert_eq!(overlay.dimensions(), source.dimensions());
        }
    }

    #[test]
    fn test_blend_formula() {
        let renderer = OverlayRenderer::new();
        let source = RgbImage::from_pixel(4, 4, Rgb([100, 200, 250]));
        let heatmap = Heatmap::new(1, 1, vec![1.0]).unwrap();
        let overlay = renderer.render(&source, &heatmap).unwrap();
        // jet(255) = (128, 0, 0): 0.4 * 128 + 100 = 151.2 -> 151
        assert_eq!(overlay.get_pixel(0, 0), &Rgb([151, 200, 250]));
    }

    #[test]
    fn test_blend_saturates() {
        let renderer = OverlayRenderer::new();
        let source = RgbImage::from_pixel(2, 2, Rgb([255, 255, 255]));
        let heatmap = Heatmap::new(1, 1, vec![0.0]).unwrap();
        let overlay = renderer.render(&source, &heatmap).unwrap();
        assert_eq!(overlay.get_pixel(1, 1), &Rgb([255, 255, 255]));
    }

    #[test]
    fn test_zero_heatmap_renders_flat() {
        let renderer = OverlayRenderer::new();
        let source = RgbImage::from_pixel(20, 10, Rgb([50, 50, 50]));
        let overlay = renderer.render(&source, &Heatmap::zeros(7, 7)).unwrap();
        let first = *overlay.get_pixel(0, 0);
        assert!(overlay.pixels().all(|p| *p == first));
    }

    #[test]
    fn test_degraded_outcome_uses_neutral() {
        let renderer = OverlayRenderer::new();
        let source = RgbImage::from_pixel(30, 40, Rgb([1, 2, 3]));
        let outcome = HeatmapOutcome::Degraded(Heatmap::zeros(7, 7));
        let (image, placeholder) = renderer.render_outcome(&source, &outcome);
        assert!(placeholder);
        assert_eq!(image.dimensions(), (30, 40));
        assert!(image.pixels().all(|p| *p == Rgb([NEUTRAL_GRAY; 3])));
    }

    #[test]
    fn test_empty_heatmap_falls_back() {
        let renderer = OverlayRenderer::new();
        let source = RgbImage::from_pixel(8, 8, Rgb([0, 0, 0]));
        let outcome = HeatmapOutcome::Attributed(Heatmap::zeros(0, 0));
        let (image, placeholder) = renderer.render_outcome(&source, &outcome);
        assert!(placeholder);
        assert_eq!(image.dimensions(), (8, 8));
    }
}
