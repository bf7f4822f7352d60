//! Specular glare suppression
//!
//! LCD/LED instrument displays photographed under workshop lighting carry
//! small over-bright highlights that defeat global thresholding. This pass
//! pulls local outliers back toward their neighborhood mean before the
//! binarization step.

use image::{GrayImage, Luma};
use imageproc::integral_image::{integral_image, sum_image_pixels};

/// A pixel brighter than its local mean by more than this is glare.
const GLARE_DELTA: f32 = 50.0;

/// Glare pixels keep this fraction of their excess over the local mean.
const RETAIN_FRACTION: f32 = 0.3;

/// Suppress specular highlights with a local-window brightness normalization.
///
/// The window side is roughly min(width, height) / 8, floored at 3. Local
/// means come from an integral image, so the whole pass is O(N).
pub fn remove_glare(gray: &GrayImage) -> GrayImage {
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return gray.clone();
    }

    let window = (w.min(h) / 8).max(3);
    let half = window / 2;
    let integral = integral_image::<Luma<u8>, u32>(gray);

    let mut out = GrayImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let left = x.saturating_sub(half);
            let right = (x + half).min(w - 1);
            let top = y.saturating_sub(half);
            let bottom = (y + half).min(h - 1);

            let sum = sum_image_pixels(&integral, left, top, right, bottom)[0] as f32;
            let area = ((right - left + 1) * (bottom - top + 1)) as f32;
            let local_mean = sum / area;

            let v = f32::from(gray.get_pixel(x, y)[0]);
            let suppressed = if v - local_mean > GLARE_DELTA {
                local_mean + RETAIN_FRACTION * (v - local_mean)
            } else {
                v
            };
            out.put_pixel(x, y, Luma([suppressed.clamp(0.0, 255.0) as u8]));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageBuffer;

    #[test]
    fn test_uniform_image_unchanged() {
        let img: GrayImage = ImageBuffer::from_pixel(40, 40, Luma([120u8]));
        let out = remove_glare(&img);
        assert!(out.pixels().all(|p| p[0] == 120));
    }

    #[test]
    fn test_hotspot_is_pulled_down() {
        // Mid-gray field with a single saturated pixel in the middle.
        let mut img: GrayImage = ImageBuffer::from_pixel(64, 64, Luma([100u8]));
        img.put_pixel(32, 32, Luma([255u8]));
        let out = remove_glare(&img);
        let suppressed = out.get_pixel(32, 32)[0];
        assert!(suppressed < 255, "hotspot untouched");
        // Pulled most of the way back toward the ~100 neighborhood mean.
        assert!(suppressed < 160, "hotspot only weakly suppressed: {suppressed}");
    }

    #[test]
    fn test_real_content_contrast_survives() {
        // A dark glyph on a light background is below the local mean and
        // must pass through untouched.
        let mut img: GrayImage = ImageBuffer::from_pixel(64, 64, Luma([200u8]));
        for y in 20..44 {
            for x in 30..34 {
                img.put_pixel(x, y, Luma([20u8]));
            }
        }
        let out = remove_glare(&img);
        assert_eq!(out.get_pixel(31, 30)[0], 20);
    }

    #[test]
    fn test_tiny_image_does_not_panic() {
        let img: GrayImage = ImageBuffer::from_pixel(1, 1, Luma([255u8]));
        let out = remove_glare(&img);
        assert_eq!(out.dimensions(), (1, 1));
    }
}
