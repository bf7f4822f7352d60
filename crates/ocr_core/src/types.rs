//! Core types for the platescan OCR pipeline
//!
//! These are the boundary types the pipeline emits and consumes. Everything
//! downstream of the pipeline (field parsers, report generators, webhooks)
//! sees only `OcrOutcome`: plain multi-line UTF-8 text plus a 0..1
//! confidence. Segmentation types (`TextLine`, `CharCandidate`) live for a
//! single recognition attempt and are never persisted.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Diagnostic text returned when the pipeline finds no text at all.
///
/// Downstream consumers of the inspection app match on this string, so it is
/// kept verbatim from the product (Korean UI).
pub const NO_TEXT_FOUND: &str = "텍스트를 찾을 수 없습니다";

/// Diagnostic text returned when the input image cannot be decoded.
pub const PROCESSING_FAILED: &str = "처리 실패: 이미지를 분석할 수 없습니다";

/// Diagnostic text returned when the caller cancelled the operation.
pub const CANCELLED: &str = "처리가 취소되었습니다";

/// Errors internal to the pixel pipeline.
///
/// These never cross the orchestrator boundary: the engine absorbs them into
/// degraded-confidence [`OcrOutcome`]s. They exist so that intermediate
/// stages can use `?` instead of inventing sentinel values.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("failed to encode image: {0}")]
    Encode(image::ImageError),
}

/// Final artifact of an OCR invocation.
///
/// `text` is never empty: on total failure it carries a human-readable
/// diagnostic string and `confidence` is 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrOutcome {
    /// Recognized text, or a diagnostic placeholder.
    pub text: String,
    /// Trustworthiness estimate in [0, 1]. Values below ~0.3 should prompt
    /// the user to retake the photo.
    pub confidence: f32,
}

impl OcrOutcome {
    /// Build an outcome, clamping confidence into [0, 1].
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// "No text found" diagnostic outcome.
    pub fn no_text() -> Self {
        Self::new(NO_TEXT_FOUND, 0.0)
    }

    /// "Processing failed" diagnostic outcome (undecodable input).
    pub fn processing_failed() -> Self {
        Self::new(PROCESSING_FAILED, 0.0)
    }

    /// Outcome for a caller-cancelled operation.
    pub fn cancelled() -> Self {
        Self::new(CANCELLED, 0.0)
    }

    /// True if this outcome is one of the diagnostic placeholders rather
    /// than recognized text.
    pub fn is_diagnostic(&self) -> bool {
        self.text == NO_TEXT_FOUND || self.text == PROCESSING_FAILED || self.text == CANCELLED
    }
}

/// Pre-flight image quality assessment.
///
/// Advisory only: the pipeline proceeds regardless of the score, the caller
/// decides whether to surface a "retake photo" warning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    /// Weighted quality score in [0, 1].
    pub score: f32,
    /// Human-readable labels for each failed check.
    pub issues: Vec<String>,
}

impl QualityReport {
    /// Score below which callers should warn before spending OCR attempts.
    pub const WARN_THRESHOLD: f32 = 0.2;

    /// Report for an image that could not be decoded.
    pub fn load_failure() -> Self {
        Self {
            score: 0.0,
            issues: vec!["이미지 로드 실패".to_string()],
        }
    }

    pub fn is_poor(&self) -> bool {
        self.score < Self::WARN_THRESHOLD
    }
}

/// A horizontal band of the image hypothesized to contain one line of text.
///
/// Invariants: `start_y <= end_y`, `start_x <= end_x`, all coordinates
/// inside the image the line was detected in. Construct via
/// [`TextLine::clamped`], which normalizes rather than panics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextLine {
    pub start_x: u32,
    pub end_x: u32,
    pub start_y: u32,
    pub end_y: u32,
}

impl TextLine {
    /// Build a line band clamped into a `width`×`height` image, swapping
    /// endpoints if they are reversed.
    pub fn clamped(
        start_x: u32,
        end_x: u32,
        start_y: u32,
        end_y: u32,
        width: u32,
        height: u32,
    ) -> Self {
        let max_x = width.saturating_sub(1);
        let max_y = height.saturating_sub(1);
        let (x0, x1) = if start_x <= end_x {
            (start_x, end_x)
        } else {
            (end_x, start_x)
        };
        let (y0, y1) = if start_y <= end_y {
            (start_y, end_y)
        } else {
            (end_y, start_y)
        };
        Self {
            start_x: x0.min(max_x),
            end_x: x1.min(max_x),
            start_y: y0.min(max_y),
            end_y: y1.min(max_y),
        }
    }

    pub fn width(&self) -> u32 {
        self.end_x - self.start_x + 1
    }

    pub fn height(&self) -> u32 {
        self.end_y - self.start_y + 1
    }
}

/// A sub-rectangle of a [`TextLine`] hypothesized to contain one glyph.
///
/// Always nested within its parent line's Y-range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharCandidate {
    pub start_x: u32,
    pub end_x: u32,
    pub start_y: u32,
    pub end_y: u32,
}

impl CharCandidate {
    /// Build a candidate spanning `start_x..=end_x` within `line`'s Y-band.
    pub fn in_line(line: &TextLine, start_x: u32, end_x: u32) -> Self {
        let (x0, x1) = if start_x <= end_x {
            (start_x, end_x)
        } else {
            (end_x, start_x)
        };
        Self {
            start_x: x0.max(line.start_x),
            end_x: x1.min(line.end_x),
            start_y: line.start_y,
            end_y: line.end_y,
        }
    }

    pub fn width(&self) -> u32 {
        self.end_x - self.start_x + 1
    }

    pub fn height(&self) -> u32 {
        self.end_y - self.start_y + 1
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width() as f32 / self.height() as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_confidence_clamped() {
        assert_eq!(OcrOutcome::new("x", 1.7).confidence, 1.0);
        assert_eq!(OcrOutcome::new("x", -0.2).confidence, 0.0);
    }

    #[test]
    fn test_diagnostic_outcomes() {
        assert!(OcrOutcome::no_text().is_diagnostic());
        assert!(OcrOutcome::processing_failed().is_diagnostic());
        assert_eq!(OcrOutcome::no_text().confidence, 0.0);
        assert!(!OcrOutcome::new("MODEL-7", 0.9).is_diagnostic());
    }

    #[test]
    fn test_text_line_clamped_normalizes() {
        let line = TextLine::clamped(10, 5, 40, 2, 100, 30);
        assert_eq!(line.start_x, 5);
        assert_eq!(line.end_x, 10);
        assert_eq!(line.start_y, 2);
        assert_eq!(line.end_y, 29); // clamped to image height
        assert!(line.start_y <= line.end_y);
    }

    #[test]
    fn test_char_candidate_nested_in_line() {
        let line = TextLine::clamped(4, 90, 10, 20, 100, 50);
        let ch = CharCandidate::in_line(&line, 0, 200);
        assert_eq!(ch.start_x, 4);
        assert_eq!(ch.end_x, 90);
        assert_eq!(ch.start_y, line.start_y);
        assert_eq!(ch.end_y, line.end_y);
        assert_eq!(ch.height(), line.height());
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = OcrOutcome::new("FLOW 12.5", 0.85);
        let json = serde_json::to_string(&outcome).unwrap();
        let back: OcrOutcome = serde_json::from_str(&json).unwrap();
        assert_eq!(outcome, back);
    }

    #[test]
    fn test_quality_report_warn_threshold() {
        let poor = QualityReport {
            score: 0.1,
            issues: vec!["너무 어두움".to_string()],
        };
        assert!(poor.is_poor());
        let fine = QualityReport {
            score: 0.8,
            issues: Vec::new(),
        };
        assert!(!fine.is_poor());
    }
}
