//! The eight plausibility checks, in evaluation order.

use imageproc::edges::canny;
use serde::{Deserialize, Serialize};

use crate::analysis::{std_dev, ImageAnalysis};

/// Minimum accepted width and height in pixels.
pub const MIN_DIMENSION: u32 = 100;
/// Intensity below which a pixel counts as background.
pub const DARK_THRESHOLD: u8 = 40;
/// Minimum share of dark pixels.
pub const MIN_DARK_RATIO: f64 = 0.15;
/// Minimum share of non-background pixels.
pub const MIN_BRIGHT_RATIO: f64 = 0.05;
/// Maximum spread of the bright-region channel means.
pub const MAX_CHANNEL_STD: f64 = 60.0;
/// Blue/green dominance factor over red.
pub const COOL_DOMINANCE: f64 = 1.2;
/// Binarisation threshold for the fundus mask.
pub const MASK_THRESHOLD: u8 = 25;
/// Exclusive bounds on the largest contour's share of the image.
pub const AREA_RATIO_BOUNDS: (f64, f64) = (0.08, 0.92);
/// Upper edge of the mid-tone histogram band.
pub const MID_TONE_LIMIT: usize = 180;
/// Minimum histogram mass in each of the dark and mid bands.
pub const MIN_BAND_MASS: f64 = 0.10;
/// Canny hysteresis thresholds.
pub const CANNY_THRESHOLDS: (f32, f32) = (50.0, 150.0);
/// Inclusive bounds on the edge-pixel share.
pub const EDGE_RATIO_BOUNDS: (f64, f64) = (0.01, 0.4);
/// Saturation above which a pixel counts as vivid.
pub const SATURATION_THRESHOLD: u8 = 100;
/// Maximum share of vivid pixels.
pub const MAX_SATURATED_RATIO: f64 = 0.3;

/// Identifies one plausibility check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlausibilityCheck {
    /// Width and height of at least 100 pixels.
    Resolution,
    /// Enough dark background around the fundus.
    DarkBackground,
    /// Enough non-background content.
    BrightContent,
    /// Colour balance typical of fundus photography.
    ColorProfile,
    /// A single roughly circular fundus region of plausible size.
    CircularRegion,
    /// Intensity mass in both the dark and mid-tone bands.
    IntensityDistribution,
    /// Edge density typical of vessel structure.
    EdgeDensity,
    /// Not a vivid, saturated photograph.
    Saturation,
}

impl PlausibilityCheck {
    /// All checks in evaluation order.
    pub const ALL: [PlausibilityCheck; 8] = [
        PlausibilityCheck::Resolution,
        PlausibilityCheck::DarkBackground,
        PlausibilityCheck::BrightContent,
        PlausibilityCheck::ColorProfile,
        PlausibilityCheck::CircularRegion,
        PlausibilityCheck::IntensityDistribution,
        PlausibilityCheck::EdgeDensity,
        PlausibilityCheck::Saturation,
    ];

    /// 1-based position in the evaluation order.
    pub fn ordinal(self) -> usize {
        self as usize + 1
    }

    /// Short identifier used in logs.
    pub fn name(self) -> &'static str {
        match self {
            PlausibilityCheck::Resolution => "resolution",
            PlausibilityCheck::DarkBackground => "dark_background",
            PlausibilityCheck::BrightContent => "bright_content",
            PlausibilityCheck::ColorProfile => "color_profile",
            PlausibilityCheck::CircularRegion => "circular_region",
            PlausibilityCheck::IntensityDistribution => "intensity_distribution",
            PlausibilityCheck::EdgeDensity => "edge_density",
            PlausibilityCheck::Saturation => "saturation",
        }
    }

    /// Run this check alone. `Err` carries the user-facing rejection reason.
    pub fn run(self, analysis: &ImageAnalysis<'_>) -> Result<(), String> {
        match self {
            PlausibilityCheck::Resolution => resolution(analysis),
            PlausibilityCheck::DarkBackground => dark_background(analysis),
            PlausibilityCheck::BrightContent => bright_content(analysis),
            PlausibilityCheck::ColorProfile => color_profile(analysis),
            PlausibilityCheck::CircularRegion => circular_region(analysis),
            PlausibilityCheck::IntensityDistribution => intensity_distribution(analysis),
            PlausibilityCheck::EdgeDensity => edge_density(analysis),
            PlausibilityCheck::Saturation => saturation(analysis),
        }
    }
}

impl std::fmt::Display for PlausibilityCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

fn resolution(analysis: &ImageAnalysis<'_>) -> Result<(), String> {
    let (width, height) = analysis.dimensions();
    if width < MIN_DIMENSION || height < MIN_DIMENSION {
        return Err(format!(
            "Image resolution too low ({width}x{height}); \
             at least {MIN_DIMENSION}x{MIN_DIMENSION} pixels required"
        ));
    }
    Ok(())
}

fn dark_background(analysis: &ImageAnalysis<'_>) -> Result<(), String> {
    let dark = analysis.gray_fraction(|v| v < DARK_THRESHOLD);
    if dark < MIN_DARK_RATIO {
        return Err(format!(
            "Image lacks the dark background typical of retinal scans ({:.1}% dark pixels)",
            dark * 100.0
        ));
    }
    Ok(())
}

fn bright_content(analysis: &ImageAnalysis<'_>) -> Result<(), String> {
    let bright = analysis.gray_fraction(|v| v > DARK_THRESHOLD);
    if bright < MIN_BRIGHT_RATIO {
        return Err("Image is almost entirely dark; no retinal region found".to_string());
    }
    Ok(())
}

fn color_profile(analysis: &ImageAnalysis<'_>) -> Result<(), String> {
    let [r, g, b] = analysis.channel_means_above(DARK_THRESHOLD);
    if std_dev(&[r, g, b]) > MAX_CHANNEL_STD {
        return Err("Colour balance does not match a retinal scan".to_string());
    }
    if b > COOL_DOMINANCE * r && g > COOL_DOMINANCE * r {
        return Err("Image is dominated by blue and green tones; not a retinal scan".to_string());
    }
    Ok(())
}

fn circular_region(analysis: &ImageAnalysis<'_>) -> Result<(), String> {
    let area = analysis
        .largest_external_contour_area(MASK_THRESHOLD)
        .ok_or_else(|| "No distinct retinal region found in the image".to_string())?;
    let ratio = area / analysis.pixel_count() as f64;
    let (low, high) = AREA_RATIO_BOUNDS;
    if ratio <= low || ratio >= high {
        return Err(format!(
            "Retinal region covers {:.1}% of the image; expected a circular fundus region",
            ratio * 100.0
        ));
    }
    Ok(())
}

fn intensity_distribution(analysis: &ImageAnalysis<'_>) -> Result<(), String> {
    let hist = analysis.histogram();
    let dark: f64 = hist[..usize::from(DARK_THRESHOLD)].iter().sum();
    let mid: f64 = hist[usize::from(DARK_THRESHOLD)..MID_TONE_LIMIT].iter().sum();
    if dark < MIN_BAND_MASS || mid < MIN_BAND_MASS {
        return Err("Intensity distribution does not match a retinal scan".to_string());
    }
    Ok(())
}

fn edge_density(analysis: &ImageAnalysis<'_>) -> Result<(), String> {
    let (low, high) = CANNY_THRESHOLDS;
    let edges = canny(analysis.gray(), low, high);
    let edge_pixels = edges.pixels().filter(|p| p[0] > 0).count();
    let ratio = edge_pixels as f64 / analysis.pixel_count() as f64;
    let (min, max) = EDGE_RATIO_BOUNDS;
    if ratio < min || ratio > max {
        return Err(format!(
            "Edge structure atypical for a retinal scan ({:.1}% edge pixels)",
            ratio * 100.0
        ));
    }
    Ok(())
}

fn saturation(analysis: &ImageAnalysis<'_>) -> Result<(), String> {
    let vivid = analysis.saturation_fraction_above(SATURATION_THRESHOLD);
    if vivid > MAX_SATURATED_RATIO {
        return Err("Image is too colourful to be a retinal scan".to_string());
    }
    Ok(())
}
