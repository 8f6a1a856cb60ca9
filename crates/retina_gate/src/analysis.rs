//! Pixel statistics shared by the plausibility checks.

use image::{GrayImage, Luma, RgbImage};
use imageproc::contours::{find_contours, BorderType};

/// An RGB image together with its BT.601 grayscale rendition.
#[derive(Debug, Clone)]
pub struct ImageAnalysis<'a> {
    rgb: &'a RgbImage,
    gray: GrayImage,
}

impl<'a> ImageAnalysis<'a> {
    /// Compute the grayscale plane for `rgb`.
    pub fn new(rgb: &'a RgbImage) -> Self {
        let gray = GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
            let [r, g, b] = rgb.get_pixel(x, y).0;
            Luma([luma_bt601(r, g, b)])
        });
        Self { rgb, gray }
    }

    /// The source image.
    pub fn rgb(&self) -> &RgbImage {
        self.rgb
    }

    /// The grayscale plane.
    pub fn gray(&self) -> &GrayImage {
        &self.gray
    }

    /// (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        self.rgb.dimensions()
    }

    /// Total pixel count.
    pub fn pixel_count(&self) -> usize {
        self.rgb.width() as usize * self.rgb.height() as usize
    }

    /// Fraction of pixels whose intensity satisfies `predicate`.
    pub fn gray_fraction(&self, predicate: impl Fn(u8) -> bool) -> f64 {
        let matching = self.gray.pixels().filter(|p| predicate(p[0])).count();
        ratio(matching, self.pixel_count())
    }

    /// Mean (R, G, B) over pixels whose intensity is above `threshold`.
    ///
    /// Returns zeros when no pixel qualifies.
    pub fn channel_means_above(&self, threshold: u8) -> [f64; 3] {
        let mut sums = [0u64; 3];
        let mut count = 0u64;
        for (rgb, gray) in self.rgb.pixels().zip(self.gray.pixels()) {
            if gray[0] > threshold {
                for c in 0..3 {
                    sums[c] += u64::from(rgb[c]);
                }
                count += 1;
            }
        }
        if count == 0 {
            return [0.0; 3];
        }
        sums.map(|s| s as f64 / count as f64)
    }

    /// Normalised 256-bin intensity histogram.
    pub fn histogram(&self) -> [f64; 256] {
        let mut counts = [0usize; 256];
        for p in self.gray.pixels() {
            counts[usize::from(p[0])] += 1;
        }
        let total = self.pixel_count();
        counts.map(|c| ratio(c, total))
    }

    /// Area of the largest outermost contour of the `gray > threshold` mask,
    /// or `None` when the mask has no contour.
    pub fn largest_external_contour_area(&self, threshold: u8) -> Option<f64> {
        let mask = GrayImage::from_fn(self.gray.width(), self.gray.height(), |x, y| {
            if self.gray.get_pixel(x, y)[0] > threshold {
                Luma([255u8])
            } else {
                Luma([0u8])
            }
        });
        find_contours::<i32>(&mask)
            .into_iter()
            .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
            .map(|c| polygon_area(c.points.iter().map(|p| (p.x, p.y))))
            .reduce(f64::max)
    }

    /// Fraction of pixels whose 8-bit HSV saturation is above `threshold`.
    pub fn saturation_fraction_above(&self, threshold: u8) -> f64 {
        let saturated = self
            .rgb
            .pixels()
            .filter(|p| saturation(p[0], p[1], p[2]) > threshold)
            .count();
        ratio(saturated, self.pixel_count())
    }
}

/// BT.601 luma, rounded: `0.299 R + 0.587 G + 0.114 B`.
pub fn luma_bt601(r: u8, g: u8, b: u8) -> u8 {
    let y = 0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b);
    y.round().clamp(0.0, 255.0) as u8
}

/// 8-bit HSV saturation: `255 * (max - min) / max`, rounded; 0 for black.
pub fn saturation(r: u8, g: u8, b: u8) -> u8 {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    if max == 0 {
        return 0;
    }
    let s = (f64::from(max - min) * 255.0 / f64::from(max)).round();
    s as u8
}

/// Shoelace area of a closed polygon.
pub fn polygon_area(points: impl Iterator<Item = (i32, i32)>) -> f64 {
    let points: Vec<(f64, f64)> = points.map(|(x, y)| (f64::from(x), f64::from(y))).collect();
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice = 0.0;
    for i in 0..points.len() {
        let (x0, y0) = points[i];
        let (x1, y1) = points[(i + 1) % points.len()];
        twice += x0 * y1 - x1 * y0;
    }
    twice.abs() / 2.0
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    var.sqrt()
}

fn ratio(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}
