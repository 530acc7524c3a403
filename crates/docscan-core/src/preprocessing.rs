//! Image normalization applied before OCR.
//!
//! Pipeline order: grayscale, resize, denoise, deskew, threshold. Each stage
//! is optional except the grayscale conversion.

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma};
use imageproc::contrast::otsu_level;
use imageproc::filter::median_filter;
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::OcrError;

/// Binarization method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdMethod {
    /// Keep grayscale.
    None,
    /// Fixed global threshold at 128.
    Simple,
    /// Global threshold chosen by Otsu's method.
    Otsu,
    /// Local Gaussian-weighted mean threshold.
    #[default]
    Adaptive,
}

/// Which normalization stages to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeOptions {
    /// Shrink images wider than `max_width`.
    pub resize: bool,
    /// Median-filter salt-and-pepper noise.
    pub denoise: bool,
    /// Straighten slightly rotated scans.
    pub deskew: bool,
    pub threshold: ThresholdMethod,
    pub max_width: u32,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            resize: true,
            denoise: true,
            deskew: false,
            threshold: ThresholdMethod::Adaptive,
            max_width: 1800,
        }
    }
}

/// Turns a raw scan into an image suited for OCR.
pub trait ImageNormalizer: Send + Sync {
    fn normalize(&self, image: &DynamicImage, options: &NormalizeOptions) -> Result<DynamicImage, OcrError>;
}

/// Skew search range and step, in degrees.
const MAX_SKEW_DEGREES: f32 = 5.0;
const SKEW_STEP_DEGREES: f32 = 0.5;
/// Rotations smaller than this are not applied.
const MIN_SKEW_DEGREES: f32 = 1.0;
/// Width the skew search runs at.
const SKEW_SEARCH_WIDTH: u32 = 600;

const SIMPLE_THRESHOLD: u8 = 128;
/// Sigma of the local mean for a 11-pixel neighbourhood.
const ADAPTIVE_SIGMA: f32 = 2.0;
const ADAPTIVE_OFFSET: i16 = 2;
const OTSU_BLUR_SIGMA: f32 = 1.1;

/// Default normalizer built on `image` and `imageproc`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardNormalizer;

impl StandardNormalizer {
    pub fn new() -> Self {
        Self
    }

    fn resize(&self, gray: GrayImage, max_width: u32) -> GrayImage {
        let (width, height) = gray.dimensions();
        if width <= max_width || max_width == 0 {
            return gray;
        }

        let new_height = ((height as f64 * max_width as f64 / width as f64) as u32).max(1);
        debug!("Resizing {}x{} to {}x{}", width, height, max_width, new_height);
        imageops::resize(&gray, max_width, new_height, FilterType::Lanczos3)
    }

    fn deskew(&self, gray: GrayImage) -> GrayImage {
        let angle = estimate_skew(&gray);
        if angle.abs() < MIN_SKEW_DEGREES {
            debug!("Skew {:.1} degrees below threshold, not rotating", angle);
            return gray;
        }

        info!("Deskewing by {:.1} degrees", angle);
        rotate_about_center(
            &gray,
            angle.to_radians(),
            Interpolation::Bilinear,
            Luma([255]),
        )
    }

    fn threshold(&self, gray: GrayImage, method: ThresholdMethod) -> GrayImage {
        match method {
            ThresholdMethod::None => gray,
            ThresholdMethod::Simple => binarize(&gray, |_, _, value| value > SIMPLE_THRESHOLD),
            ThresholdMethod::Otsu => {
                let blurred = imageops::blur(&gray, OTSU_BLUR_SIGMA);
                let level = otsu_level(&blurred);
                debug!("Otsu level {}", level);
                binarize(&blurred, |_, _, value| value > level)
            }
            ThresholdMethod::Adaptive => {
                let local_mean = imageops::blur(&gray, ADAPTIVE_SIGMA);
                binarize(&gray, |x, y, value| {
                    value as i16 > local_mean.get_pixel(x, y)[0] as i16 - ADAPTIVE_OFFSET
                })
            }
        }
    }
}

impl ImageNormalizer for StandardNormalizer {
    fn normalize(&self, image: &DynamicImage, options: &NormalizeOptions) -> Result<DynamicImage, OcrError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(OcrError::InvalidImage(format!(
                "empty image {}x{}",
                image.width(),
                image.height()
            )));
        }

        let mut gray = image.to_luma8();

        if options.resize {
            gray = self.resize(gray, options.max_width);
        }
        if options.denoise {
            gray = median_filter(&gray, 1, 1);
        }
        if options.deskew {
            gray = self.deskew(gray);
        }
        gray = self.threshold(gray, options.threshold);

        Ok(DynamicImage::ImageLuma8(gray))
    }
}

/// Map every pixel to white where `keep_white` holds, black elsewhere.
fn binarize(gray: &GrayImage, keep_white: impl Fn(u32, u32, u8) -> bool) -> GrayImage {
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        if keep_white(x, y, gray.get_pixel(x, y)[0]) {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Find the rotation (degrees) that makes text rows most horizontal.
///
/// Each candidate angle is scored by the variance of the per-row dark pixel
/// counts: aligned text lines give sharp peaks and empty gaps.
pub fn estimate_skew(gray: &GrayImage) -> f32 {
    let sample = if gray.width() > SKEW_SEARCH_WIDTH {
        let height = ((gray.height() as f64 * SKEW_SEARCH_WIDTH as f64 / gray.width() as f64) as u32).max(1);
        imageops::resize(gray, SKEW_SEARCH_WIDTH, height, FilterType::Triangle)
    } else {
        gray.clone()
    };

    let steps = (MAX_SKEW_DEGREES / SKEW_STEP_DEGREES) as i32;
    let mut best = (0.0f32, row_profile_variance(&sample));

    for step in (-steps..=steps).filter(|s| *s != 0) {
        let angle = step as f32 * SKEW_STEP_DEGREES;
        let rotated = rotate_about_center(&sample, angle.to_radians(), Interpolation::Nearest, Luma([255]));
        let score = row_profile_variance(&rotated);
        if score > best.1 {
            best = (angle, score);
        }
    }

    best.0
}

fn row_profile_variance(gray: &GrayImage) -> f64 {
    let rows: Vec<f64> = gray
        .rows()
        .map(|row| row.filter(|p| p[0] < SIMPLE_THRESHOLD).count() as f64)
        .collect();
    if rows.is_empty() {
        return 0.0;
    }

    let mean = rows.iter().sum::<f64>() / rows.len() as f64;
    rows.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / rows.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stripes(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |_, y| {
            if y % 20 < 4 { Luma([0]) } else { Luma([255]) }
        })
    }

    fn only(threshold: ThresholdMethod) -> NormalizeOptions {
        NormalizeOptions {
            resize: false,
            denoise: false,
            deskew: false,
            threshold,
            ..NormalizeOptions::default()
        }
    }

    #[test]
    fn test_resize_keeps_aspect_ratio() {
        let image = DynamicImage::new_luma8(3600, 100);
        let options = NormalizeOptions {
            threshold: ThresholdMethod::None,
            ..NormalizeOptions::default()
        };

        let normalized = StandardNormalizer::new().normalize(&image, &options).unwrap();
        assert_eq!((normalized.width(), normalized.height()), (1800, 50));
    }

    #[test]
    fn test_small_image_not_resized() {
        let image = DynamicImage::new_luma8(640, 480);
        let normalized = StandardNormalizer::new()
            .normalize(&image, &NormalizeOptions::default())
            .unwrap();
        assert_eq!((normalized.width(), normalized.height()), (640, 480));
    }

    #[test]
    fn test_simple_threshold() {
        let gray = GrayImage::from_fn(2, 1, |x, _| if x == 0 { Luma([100]) } else { Luma([200]) });
        let normalized = StandardNormalizer::new()
            .normalize(&DynamicImage::ImageLuma8(gray), &only(ThresholdMethod::Simple))
            .unwrap()
            .to_luma8();

        assert_eq!(normalized.get_pixel(0, 0)[0], 0);
        assert_eq!(normalized.get_pixel(1, 0)[0], 255);
    }

    #[test]
    fn test_otsu_and_adaptive_are_binary() {
        let image = DynamicImage::ImageLuma8(stripes(60, 60));

        for method in [ThresholdMethod::Otsu, ThresholdMethod::Adaptive] {
            let normalized = StandardNormalizer::new()
                .normalize(&image, &only(method))
                .unwrap()
                .to_luma8();
            assert!(normalized.pixels().all(|p| p[0] == 0 || p[0] == 255));
            assert!(normalized.pixels().any(|p| p[0] == 0));
        }
    }

    #[test]
    fn test_adaptive_keeps_blank_page_white() {
        let image = DynamicImage::ImageLuma8(GrayImage::from_pixel(32, 32, Luma([255])));
        let normalized = StandardNormalizer::new()
            .normalize(&image, &only(ThresholdMethod::Adaptive))
            .unwrap()
            .to_luma8();
        assert!(normalized.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn test_straight_page_has_no_skew() {
        assert_eq!(estimate_skew(&stripes(200, 200)), 0.0);
    }

    #[test]
    fn test_rotated_page_is_detected() {
        let skewed = rotate_about_center(
            &stripes(200, 200),
            3.0f32.to_radians(),
            Interpolation::Nearest,
            Luma([255]),
        );
        let angle = estimate_skew(&skewed);
        assert!((angle + 3.0).abs() <= SKEW_STEP_DEGREES, "estimated {angle}");
    }

    #[test]
    fn test_empty_image_rejected() {
        let image = DynamicImage::new_luma8(0, 0);
        assert!(matches!(
            StandardNormalizer::new().normalize(&image, &NormalizeOptions::default()),
            Err(OcrError::InvalidImage(_))
        ));
    }
}
