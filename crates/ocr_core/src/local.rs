//! Local heuristic recognition pipeline
//!
//! The chain the orchestrator falls back to when every remote attempt has
//! failed: glare removal, Otsu binarization, morphological denoising,
//! projection segmentation, then rule-table recognition per glyph. However
//! coarse the result, this path always terminates with an [`OcrOutcome`] —
//! OCR failure must never block the inspection workflow.

use crate::types::OcrOutcome;
use crate::{denoise, glare, preprocess, recognize, segment, threshold};
use image::DynamicImage;

/// Confidence attached to per-character heuristic output.
///
/// Placeholder constant carried over from the product, not a calibrated
/// statistic; callers treat anything below 0.3 as "please retake".
pub const CONFIDENCE_CHAR_HEURISTIC: f32 = 0.3;

/// Confidence attached to coarse region-level guesses. Placeholder, see
/// [`CONFIDENCE_CHAR_HEURISTIC`].
pub const CONFIDENCE_REGION_GUESS: f32 = 0.1;

/// Run the full local pipeline against a decoded image.
pub fn recognize_local(image: &DynamicImage) -> OcrOutcome {
    let gray = preprocess::capped_gray(image);
    let deglared = glare::remove_glare(&gray);
    let cut = threshold::otsu_threshold(&deglared);
    let binary = threshold::binarize(&deglared, cut);
    let clean = denoise::denoise(&binary);

    let lines = segment::detect_text_lines(&clean);
    if lines.is_empty() {
        tracing::debug!("no text lines found, using whole-image classification");
        return match recognize::classify_whole(&clean) {
            Some(label) => OcrOutcome::new(label, CONFIDENCE_REGION_GUESS),
            None => OcrOutcome::no_text(),
        };
    }

    let mut line_texts = Vec::with_capacity(lines.len());
    let mut any_chars = false;
    for line in &lines {
        let candidates = segment::detect_char_candidates(&clean, line);
        if candidates.is_empty() {
            // Line-level fallback: the band has ink but no separable glyphs.
            if let Some(label) = recognize::classify_line(&clean, line) {
                line_texts.push(label.to_string());
            }
            continue;
        }
        any_chars = true;
        let text: String = candidates
            .iter()
            .map(|c| recognize::recognize_char(&clean, c))
            .collect();
        line_texts.push(text);
    }

    if line_texts.is_empty() {
        return match recognize::classify_whole(&clean) {
            Some(label) => OcrOutcome::new(label, CONFIDENCE_REGION_GUESS),
            None => OcrOutcome::no_text(),
        };
    }

    let confidence = if any_chars {
        CONFIDENCE_CHAR_HEURISTIC
    } else {
        CONFIDENCE_REGION_GUESS
    };
    tracing::debug!(
        lines = line_texts.len(),
        confidence,
        "local heuristic recognition complete"
    );
    OcrOutcome::new(line_texts.join("\n"), confidence)
}

/// Byte-level entry point: an undecodable image yields the processing-failed
/// diagnostic outcome instead of an error.
pub fn recognize_local_bytes(bytes: &[u8]) -> OcrOutcome {
    match image::load_from_memory(bytes) {
        Ok(img) => recognize_local(&img),
        Err(err) => {
            tracing::warn!("local pipeline could not decode image: {err}");
            OcrOutcome::processing_failed()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NO_TEXT_FOUND;
    use image::{GrayImage, ImageBuffer, Luma};

    #[test]
    fn test_blank_image_yields_no_text_diagnostic() {
        let img = DynamicImage::ImageLuma8(ImageBuffer::from_pixel(100, 100, Luma([255u8])));
        let outcome = recognize_local(&img);
        assert_eq!(outcome.text, NO_TEXT_FOUND);
        assert_eq!(outcome.confidence, 0.0);
    }

    #[test]
    fn test_textlike_line_yields_nonempty_low_confidence_text() {
        // One dark dashed band, ~30% ink overall: the pipeline must produce
        // some placeholder text with confidence below 0.5.
        let mut img: GrayImage = ImageBuffer::from_pixel(200, 60, Luma([255u8]));
        for y in 20..40 {
            for x in 0..200 {
                if x % 10 < 5 {
                    img.put_pixel(x, y, Luma([30u8]));
                }
            }
        }
        let outcome = recognize_local(&DynamicImage::ImageLuma8(img));
        assert!(!outcome.text.is_empty());
        assert_ne!(outcome.text, NO_TEXT_FOUND);
        assert!(outcome.confidence < 0.5);
        assert!(outcome.confidence > 0.0);
    }

    #[test]
    fn test_multi_line_output_joined_with_newlines() {
        let mut img: GrayImage = ImageBuffer::from_pixel(120, 60, Luma([255u8]));
        for &band in &[10u32, 35] {
            for y in band..band + 10 {
                for x in 10..110 {
                    if x % 12 < 6 {
                        img.put_pixel(x, y, Luma([20u8]));
                    }
                }
            }
        }
        let outcome = recognize_local(&DynamicImage::ImageLuma8(img));
        assert_eq!(outcome.text.lines().count(), 2);
    }

    #[test]
    fn test_undecodable_bytes_yield_processing_failed() {
        let outcome = recognize_local_bytes(b"garbage");
        assert_eq!(outcome, OcrOutcome::processing_failed());
    }

    #[test]
    fn test_decodable_bytes_run_pipeline() {
        let img: GrayImage = ImageBuffer::from_pixel(50, 50, Luma([255u8]));
        let mut bytes = Vec::new();
        img.write_to(
            &mut std::io::Cursor::new(&mut bytes),
            image::ImageFormat::Png,
        )
        .unwrap();
        let outcome = recognize_local_bytes(&bytes);
        assert_eq!(outcome.text, NO_TEXT_FOUND);
    }
}
