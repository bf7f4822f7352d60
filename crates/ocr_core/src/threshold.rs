//! Otsu global thresholding
//!
//! Picks the binarization cut-point that maximizes between-class variance of
//! the luminance histogram. Shared by the preprocessor (attempt 3) and the
//! local fallback pipeline.

use image::GrayImage;

/// Fallback threshold for degenerate histograms (e.g. a blank image where
/// every candidate split leaves one class empty).
pub const DEGENERATE_THRESHOLD: u8 = 128;

/// Compute the Otsu threshold for a grayscale buffer.
///
/// O(N) histogram pass plus an O(256) sweep. Deterministic.
pub fn otsu_threshold(gray: &GrayImage) -> u8 {
    let mut histogram = [0u32; 256];
    for pixel in gray.pixels() {
        histogram[pixel[0] as usize] += 1;
    }

    let total: u64 = histogram.iter().map(|&c| u64::from(c)).sum();
    if total == 0 {
        return DEGENERATE_THRESHOLD;
    }

    let weighted_total: u64 = histogram
        .iter()
        .enumerate()
        .map(|(i, &c)| i as u64 * u64::from(c))
        .sum();

    let mut weight_bg = 0u64;
    let mut sum_bg = 0u64;
    let mut best_variance = 0.0f64;
    // Bimodal images produce a plateau of equally good cut-points between
    // the two modes; taking the plateau midpoint keeps the threshold
    // centered instead of hugging the darker mode.
    let mut best_range: Option<(usize, usize)> = None;

    for t in 0..256usize {
        weight_bg += u64::from(histogram[t]);
        if weight_bg == 0 {
            continue;
        }
        let weight_fg = total - weight_bg;
        if weight_fg == 0 {
            break;
        }
        sum_bg += t as u64 * u64::from(histogram[t]);

        let mean_bg = sum_bg as f64 / weight_bg as f64;
        let mean_fg = (weighted_total - sum_bg) as f64 / weight_fg as f64;
        let variance =
            weight_bg as f64 * weight_fg as f64 * (mean_bg - mean_fg) * (mean_bg - mean_fg);

        if variance > best_variance {
            best_variance = variance;
            best_range = Some((t, t));
        } else if variance == best_variance {
            if let Some((_, last)) = best_range.as_mut() {
                *last = t;
            }
        }
    }

    match best_range {
        Some((first, last)) => ((first + last) / 2) as u8,
        None => DEGENERATE_THRESHOLD,
    }
}

/// Binarize a grayscale buffer against `threshold`: above goes white (255),
/// at-or-below goes black (0). Returns a new buffer.
pub fn binarize(gray: &GrayImage, threshold: u8) -> GrayImage {
    let mut out = GrayImage::new(gray.width(), gray.height());
    for (x, y, pixel) in gray.enumerate_pixels() {
        let v = if pixel[0] > threshold { 255 } else { 0 };
        out.put_pixel(x, y, image::Luma([v]));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma};

    #[test]
    fn test_otsu_on_two_level_step_image() {
        // Half the pixels at 20, half at 230: the split should land near the
        // midpoint (125), strictly between the two levels.
        let img: GrayImage =
            ImageBuffer::from_fn(100, 100, |x, _| Luma([if x < 50 { 20 } else { 230 }]));
        let t = otsu_threshold(&img);
        assert!(t > 20 && t < 230);
        assert!((i32::from(t) - 125).abs() <= 10, "threshold {t} not near midpoint");
    }

    #[test]
    fn test_otsu_degenerate_blank_image() {
        let img: GrayImage = ImageBuffer::from_pixel(30, 30, Luma([255u8]));
        assert_eq!(otsu_threshold(&img), DEGENERATE_THRESHOLD);
        let img: GrayImage = ImageBuffer::from_pixel(30, 30, Luma([0u8]));
        assert_eq!(otsu_threshold(&img), DEGENERATE_THRESHOLD);
    }

    #[test]
    fn test_otsu_deterministic() {
        let img: GrayImage = ImageBuffer::from_fn(64, 64, |x, y| Luma([((x * 3 + y * 5) % 256) as u8]));
        assert_eq!(otsu_threshold(&img), otsu_threshold(&img));
    }

    #[test]
    fn test_binarize_is_two_valued() {
        let img: GrayImage = ImageBuffer::from_fn(16, 16, |x, _| Luma([(x * 16) as u8]));
        let bin = binarize(&img, 128);
        assert!(bin.pixels().all(|p| p[0] == 0 || p[0] == 255));
        assert_eq!(bin.get_pixel(0, 0)[0], 0);
        assert_eq!(bin.get_pixel(15, 0)[0], 255);
    }

    #[test]
    fn test_binarize_does_not_mutate_input() {
        let img: GrayImage = ImageBuffer::from_pixel(8, 8, Luma([100u8]));
        let _ = binarize(&img, 50);
        assert!(img.pixels().all(|p| p[0] == 100));
    }
}
