//! Morphological noise reduction
//!
//! Classic opening (3×3 erosion then 3×3 dilation) over the binarized
//! buffer removes isolated speckles while keeping connected glyph strokes,
//! followed by a sharpening convolution to restore the edge crispness the
//! opening costs. Border pixels pass through the morphology unchanged.

use image::{GrayImage, Luma};
use imageproc::filter::filter3x3;

/// Sharpening kernel applied after the opening.
const SHARPEN_KERNEL: [f32; 9] = [0.0, -1.0, 0.0, -1.0, 5.0, -1.0, 0.0, -1.0, 0.0];

/// Full noise-reduction pass: opening, then sharpening.
pub fn denoise(binary: &GrayImage) -> GrayImage {
    sharpen(&open(binary))
}

/// Morphological opening: erosion followed by dilation.
pub fn open(binary: &GrayImage) -> GrayImage {
    dilate(&erode(binary))
}

/// Sharpen with a 5-center Laplacian kernel, clamped to [0, 255].
pub fn sharpen(gray: &GrayImage) -> GrayImage {
    filter3x3::<Luma<u8>, f32, u8>(gray, &SHARPEN_KERNEL)
}

/// 3×3 minimum filter on interior pixels; borders copied through.
fn erode(image: &GrayImage) -> GrayImage {
    morph(image, |neighborhood| {
        neighborhood.iter().copied().min().unwrap_or(0)
    })
}

/// 3×3 maximum filter on interior pixels; borders copied through.
fn dilate(image: &GrayImage) -> GrayImage {
    morph(image, |neighborhood| {
        neighborhood.iter().copied().max().unwrap_or(0)
    })
}

fn morph(image: &GrayImage, select: impl Fn(&[u8; 9]) -> u8) -> GrayImage {
    let (w, h) = image.dimensions();
    let mut out = image.clone();
    if w < 3 || h < 3 {
        return out;
    }
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let mut neighborhood = [0u8; 9];
            let mut i = 0;
            for dy in 0..3 {
                for dx in 0..3 {
                    neighborhood[i] = image.get_pixel(x + dx - 1, y + dy - 1)[0];
                    i += 1;
                }
            }
            out.put_pixel(x, y, Luma([select(&neighborhood)]));
        }
    }
    out
}
