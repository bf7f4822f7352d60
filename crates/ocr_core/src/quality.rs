//! Image quality assessment
//!
//! Scores an input photo for brightness, contrast and sharpness before the
//! orchestrator spends remote OCR attempts on it. The assessment is purely
//! advisory: a poor score produces a warning, never a refusal.

use crate::types::QualityReport;
use image::{DynamicImage, GrayImage};

/// Assessments run on a downsampled copy, at most this many pixels per side.
const MAX_ASSESS_DIMENSION: u32 = 1000;

/// Acceptable mean-luminance band (normalized to [0, 1]).
const BRIGHTNESS_RANGE: (f32, f32) = (0.2, 0.9);
/// Minimum acceptable luminance standard deviation.
const MIN_CONTRAST: f32 = 0.08;
/// Minimum acceptable mean neighbor-gradient magnitude.
const MIN_SHARPNESS: f32 = 0.03;

/// Assess image quality from raw bytes.
///
/// Never fails: an undecodable image yields a zero-score report with a
/// load-failure issue, since this check is advisory only.
pub fn assess_bytes(bytes: &[u8]) -> QualityReport {
    match image::load_from_memory(bytes) {
        Ok(img) => assess(&img),
        Err(err) => {
            tracing::debug!("quality assessment could not decode image: {err}");
            QualityReport::load_failure()
        }
    }
}

/// Assess brightness, contrast and sharpness of a decoded image.
///
/// Weighted sum: brightness contributes up to 0.4, contrast and sharpness up
/// to 0.3 each, so a perfect image scores 1.0.
pub fn assess(image: &DynamicImage) -> QualityReport {
    let gray = downsampled_gray(image);
    let brightness = mean_luminance(&gray);
    let contrast = luminance_stddev(&gray, brightness);
    let sharpness = mean_gradient(&gray);

    let mut issues = Vec::new();

    let brightness_factor = if brightness < BRIGHTNESS_RANGE.0 {
        issues.push("너무 어두움".to_string());
        graded(BRIGHTNESS_RANGE.0 - brightness)
    } else if brightness > BRIGHTNESS_RANGE.1 {
        issues.push("너무 밝음".to_string());
        graded(brightness - BRIGHTNESS_RANGE.1)
    } else {
        1.0
    };

    let contrast_factor = if contrast < MIN_CONTRAST {
        issues.push("대비 부족".to_string());
        contrast / MIN_CONTRAST
    } else {
        1.0
    };

    let sharpness_factor = if sharpness < MIN_SHARPNESS {
        issues.push("초점 흐림".to_string());
        sharpness / MIN_SHARPNESS
    } else {
        1.0
    };

    let score =
        (0.4 * brightness_factor + 0.3 * contrast_factor + 0.3 * sharpness_factor).clamp(0.0, 1.0);

    tracing::debug!(
        brightness,
        contrast,
        sharpness,
        score,
        "quality assessment complete"
    );

    QualityReport { score, issues }
}

/// Linear falloff for out-of-band brightness: a deviation of 0.2 or more
/// zeroes the brightness contribution.
fn graded(deviation: f32) -> f32 {
    (1.0 - deviation * 5.0).max(0.0)
}

fn downsampled_gray(image: &DynamicImage) -> GrayImage {
    let (w, h) = (image.width(), image.height());
    if w > MAX_ASSESS_DIMENSION || h > MAX_ASSESS_DIMENSION {
        image
            .thumbnail(MAX_ASSESS_DIMENSION, MAX_ASSESS_DIMENSION)
            .to_luma8()
    } else {
        image.to_luma8()
    }
}

fn mean_luminance(gray: &GrayImage) -> f32 {
    let total: u64 = gray.pixels().map(|p| u64::from(p[0])).sum();
    let count = (gray.width() as u64 * gray.height() as u64).max(1);
    total as f32 / count as f32 / 255.0
}

fn luminance_stddev(gray: &GrayImage, mean: f32) -> f32 {
    let count = (gray.width() as u64 * gray.height() as u64).max(1);
    let variance: f32 = gray
        .pixels()
        .map(|p| {
            let v = f32::from(p[0]) / 255.0 - mean;
            v * v
        })
        .sum::<f32>()
        / count as f32;
    variance.sqrt()
}

/// Mean absolute luminance difference between horizontally and vertically
/// adjacent pixels, normalized to [0, 1]. Degenerate (1×1) images have no
/// neighbors and score 0.
fn mean_gradient(gray: &GrayImage) -> f32 {
    let (w, h) = gray.dimensions();
    let mut total = 0u64;
    let mut samples = 0u64;
    for y in 0..h {
        for x in 0..w {
            let v = i32::from(gray.get_pixel(x, y)[0]);
            if x + 1 < w {
                total += (v - i32::from(gray.get_pixel(x + 1, y)[0])).unsigned_abs() as u64;
                samples += 1;
            }
            if y + 1 < h {
                total += (v - i32::from(gray.get_pixel(x, y + 1)[0])).unsigned_abs() as u64;
                samples += 1;
            }
        }
    }
    if samples == 0 {
        return 0.0;
    }
    total as f32 / samples as f32 / 255.0
}
