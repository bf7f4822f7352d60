//! Image preprocessing variants for the OCR retry loop
//!
//! Each remote attempt gets a differently-enhanced monochrome rendition of
//! the source photo. Cheap transforms come first so that clean images
//! succeed on attempt 1 without paying for the edge-enhancement pass.
//! Every transform is deterministic and copy-on-write: the input image is
//! never mutated.

use crate::threshold;
use crate::types::PipelineError;
use image::{DynamicImage, GrayImage, Luma};
use std::io::Cursor;

/// Preprocessing works on a copy capped to this many pixels per side.
pub const MAX_DIMENSION: u32 = 1500;

/// JPEG quality used when re-encoding a variant for the remote API.
pub const JPEG_QUALITY: u8 = 95;

/// Enhancement strategy for one retry attempt, ordered cheapest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreprocessAttempt {
    /// Linear contrast stretch around midpoint 128 with gain 1.2.
    ContrastStretch,
    /// Hard double threshold: >140 goes white, <100 goes black.
    DoubleThreshold,
    /// Otsu-computed global threshold, binarized.
    OtsuBinarize,
    /// Shift every pixel so the mean luminance lands on 128.
    BrightnessNormalize,
    /// Discrete Laplacian edge enhancement at half weight.
    EdgeEnhance,
}

impl PreprocessAttempt {
    pub const ALL: [Self; 5] = [
        Self::ContrastStretch,
        Self::DoubleThreshold,
        Self::OtsuBinarize,
        Self::BrightnessNormalize,
        Self::EdgeEnhance,
    ];

    /// Strategy for 1-based attempt index `k`; indices past the table wrap
    /// onto the last (most aggressive) strategy.
    pub fn for_attempt(k: u32) -> Self {
        let idx = (k.max(1) as usize - 1).min(Self::ALL.len() - 1);
        Self::ALL[idx]
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::ContrastStretch => "contrast-stretch",
            Self::DoubleThreshold => "double-threshold",
            Self::OtsuBinarize => "otsu-binarize",
            Self::BrightnessNormalize => "brightness-normalize",
            Self::EdgeEnhance => "edge-enhance",
        }
    }
}

/// Produce the enhanced monochrome variant for one attempt.
pub fn preprocess(image: &DynamicImage, attempt: PreprocessAttempt) -> GrayImage {
    let gray = capped_gray(image);
    match attempt {
        PreprocessAttempt::ContrastStretch => contrast_stretch(&gray, 1.2),
        PreprocessAttempt::DoubleThreshold => double_threshold(&gray, 140, 100),
        PreprocessAttempt::OtsuBinarize => {
            let t = threshold::otsu_threshold(&gray);
            threshold::binarize(&gray, t)
        }
        PreprocessAttempt::BrightnessNormalize => brightness_normalize(&gray),
        PreprocessAttempt::EdgeEnhance => laplacian_enhance(&gray),
    }
}

/// Byte-level wrapper for the retry loop: if the input cannot be decoded the
/// original bytes are returned unchanged so the remote API can still be
/// tried on the raw upload.
pub fn preprocess_bytes(bytes: &[u8], attempt: PreprocessAttempt) -> Vec<u8> {
    match image::load_from_memory(bytes) {
        Ok(img) => {
            let variant = preprocess(&img, attempt);
            encode_jpeg(&variant).unwrap_or_else(|err| {
                tracing::warn!("failed to re-encode {} variant: {err}", attempt.label());
                bytes.to_vec()
            })
        }
        Err(err) => {
            tracing::warn!("preprocess could not decode image, passing through: {err}");
            bytes.to_vec()
        }
    }
}

/// Re-encode a variant as JPEG for the remote API payload.
pub fn encode_jpeg(gray: &GrayImage) -> Result<Vec<u8>, PipelineError> {
    let mut bytes = Vec::new();
    let encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(Cursor::new(&mut bytes), JPEG_QUALITY);
    gray.write_with_encoder(encoder)
        .map_err(PipelineError::Encode)?;
    Ok(bytes)
}

/// Grayscale copy of the source, downscaled so neither side exceeds
/// [`MAX_DIMENSION`]. Aspect ratio is preserved.
pub fn capped_gray(image: &DynamicImage) -> GrayImage {
    if image.width() > MAX_DIMENSION || image.height() > MAX_DIMENSION {
        image.thumbnail(MAX_DIMENSION, MAX_DIMENSION).to_luma8()
    } else {
        image.to_luma8()
    }
}

fn contrast_stretch(gray: &GrayImage, gain: f32) -> GrayImage {
    map_pixels(gray, |v| {
        (128.0 + gain * (f32::from(v) - 128.0)).clamp(0.0, 255.0) as u8
    })
}

fn double_threshold(gray: &GrayImage, high: u8, low: u8) -> GrayImage {
    map_pixels(gray, |v| {
        if v > high {
            255
        } else if v < low {
            0
        } else {
            v
        }
    })
}

fn brightness_normalize(gray: &GrayImage) -> GrayImage {
    let total: u64 = gray.pixels().map(|p| u64::from(p[0])).sum();
    let count = (gray.width() as u64 * gray.height() as u64).max(1);
    let mean = total as f32 / count as f32;
    let shift = 128.0 - mean;
    map_pixels(gray, |v| (f32::from(v) + shift).clamp(0.0, 255.0) as u8)
}

/// `enhanced = gray + 0.5 * (4*center - top - bottom - left - right)`,
/// clamped. Border pixels have no full neighborhood and pass through.
fn laplacian_enhance(gray: &GrayImage) -> GrayImage {
    let (w, h) = gray.dimensions();
    let mut out = gray.clone();
    if w < 3 || h < 3 {
        return out;
    }
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let center = i32::from(gray.get_pixel(x, y)[0]);
            let top = i32::from(gray.get_pixel(x, y - 1)[0]);
            let bottom = i32::from(gray.get_pixel(x, y + 1)[0]);
            let left = i32::from(gray.get_pixel(x - 1, y)[0]);
            let right = i32::from(gray.get_pixel(x + 1, y)[0]);
            let laplacian = 4 * center - top - bottom - left - right;
            let enhanced = (center as f32 + 0.5 * laplacian as f32).clamp(0.0, 255.0) as u8;
            out.put_pixel(x, y, Luma([enhanced]));
        }
    }
    out
}

fn map_pixels(gray: &GrayImage, f: impl Fn(u8) -> u8) -> GrayImage {
    let mut out = GrayImage::new(gray.width(), gray.height());
    for (x, y, pixel) in gray.enumerate_pixels() {
        out.put_pixel(x, y, Luma([f(pixel[0])]));
    }
    out
}
