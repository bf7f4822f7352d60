//! Heuristic glyph and region recognition
//!
//! This is NOT a trained classifier. It is a fixed rule table over
//! pixel-density and aspect-ratio features that produces *some* plausible
//! character so the pipeline degrades gracefully when the remote OCR API is
//! unreachable. Callers must treat its output as a last-resort placeholder,
//! surfaced with a near-zero confidence, never as ground truth.

use crate::types::{CharCandidate, TextLine};
use image::GrayImage;

/// Coarse label for a region that reads like printed text.
pub const LABEL_GENERIC_TEXT: &str = "일반텍스트내용";
/// Coarse label for a region that reads like an LCD/LED display.
pub const LABEL_LCD_DISPLAY: &str = "LCD화면표시내용";
/// Coarse label for a dense, digit-heavy region.
pub const LABEL_NUMERIC_DISPLAY: &str = "숫자표시내용";

/// Pixels below this are "dark" for density features. The recognizer runs
/// on binarized buffers where values are effectively 0 or 255.
const DARK_THRESHOLD: u8 = 128;

/// Adjacent-pixel luminance jump that counts as an edge.
const EDGE_DELTA: i32 = 100;

/// Regions with less ink than this are considered blank.
const BLANK_DARK_RATIO: f32 = 0.02;

/// Measured shape features of a rectangular region.
#[derive(Debug, Clone, Copy)]
struct GlyphFeatures {
    aspect: f32,
    dark_ratio: f32,
    edge_ratio: f32,
}

/// One row of the decision table: a shape predicate plus a refinement that
/// picks the concrete label from the same features.
type Rule = (
    fn(&GlyphFeatures) -> bool,
    fn(&GlyphFeatures) -> &'static str,
);

/// Ordered decision table. Earlier rows win; the symbol refinement is the
/// catch-all when nothing matches.
const RULES: [Rule; 3] = [
    (is_digit_shaped, digit_label),
    (is_hangul_shaped, hangul_label),
    (is_latin_shaped, latin_label),
];

fn is_digit_shaped(f: &GlyphFeatures) -> bool {
    f.aspect > 0.3 && f.aspect < 0.8 && f.dark_ratio > 0.3
}

fn is_hangul_shaped(f: &GlyphFeatures) -> bool {
    (0.8..=1.2).contains(&f.aspect) && f.dark_ratio > 0.2
}

fn is_latin_shaped(f: &GlyphFeatures) -> bool {
    f.aspect > 0.4 && f.aspect < 0.9
}

fn digit_label(f: &GlyphFeatures) -> &'static str {
    if f.dark_ratio > 0.65 {
        "8"
    } else if f.dark_ratio > 0.55 {
        "0"
    } else if f.edge_ratio > 0.2 {
        "2"
    } else if f.dark_ratio > 0.4 {
        "7"
    } else {
        "1"
    }
}

fn hangul_label(f: &GlyphFeatures) -> &'static str {
    if f.dark_ratio > 0.45 {
        "한"
    } else if f.edge_ratio > 0.25 {
        "텍"
    } else {
        "글"
    }
}

fn latin_label(f: &GlyphFeatures) -> &'static str {
    if f.dark_ratio > 0.5 {
        "B"
    } else if f.dark_ratio > 0.35 {
        "E"
    } else if f.edge_ratio > 0.2 {
        "T"
    } else {
        "I"
    }
}

fn symbol_label(f: &GlyphFeatures) -> &'static str {
    if f.dark_ratio > 0.7 {
        "■"
    } else if f.dark_ratio > 0.4 {
        "◇"
    } else if f.dark_ratio > 0.15 {
        "□"
    } else if f.dark_ratio > 0.05 {
        "·"
    } else {
        "?"
    }
}

/// Best-guess label for one glyph box.
pub fn recognize_char(gray: &GrayImage, candidate: &CharCandidate) -> &'static str {
    let f = measure(
        gray,
        candidate.start_x,
        candidate.end_x,
        candidate.start_y,
        candidate.end_y,
    );
    for (matches, label) in RULES {
        if matches(&f) {
            return label(&f);
        }
    }
    symbol_label(&f)
}

/// Coarse classification of a whole line band when per-glyph segmentation
/// produced nothing usable. None means the band is effectively blank.
pub fn classify_line(gray: &GrayImage, line: &TextLine) -> Option<&'static str> {
    classify_rect(gray, line.start_x, line.end_x, line.start_y, line.end_y)
}

/// Coarse classification of the entire image; the whole-image fallback when
/// line segmentation found nothing. None means no visible content.
pub fn classify_whole(gray: &GrayImage) -> Option<&'static str> {
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return None;
    }
    classify_rect(gray, 0, w - 1, 0, h - 1)
}

fn classify_rect(
    gray: &GrayImage,
    start_x: u32,
    end_x: u32,
    start_y: u32,
    end_y: u32,
) -> Option<&'static str> {
    let f = measure(gray, start_x, end_x, start_y, end_y);
    if f.dark_ratio < BLANK_DARK_RATIO {
        return None;
    }
    let label = if f.edge_ratio > 0.25 {
        LABEL_LCD_DISPLAY
    } else if f.dark_ratio > 0.55 {
        LABEL_NUMERIC_DISPLAY
    } else {
        LABEL_GENERIC_TEXT
    };
    Some(label)
}

fn measure(gray: &GrayImage, start_x: u32, end_x: u32, start_y: u32, end_y: u32) -> GlyphFeatures {
    let width = end_x - start_x + 1;
    let height = end_y - start_y + 1;
    let total = (width as u64 * height as u64).max(1);

    let mut dark = 0u64;
    let mut edges = 0u64;
    for y in start_y..=end_y {
        for x in start_x..=end_x {
            let v = i32::from(gray.get_pixel(x, y)[0]);
            if v < i32::from(DARK_THRESHOLD) {
                dark += 1;
            }
            if x < end_x {
                let right = i32::from(gray.get_pixel(x + 1, y)[0]);
                if (v - right).abs() > EDGE_DELTA {
                    edges += 1;
                }
            }
            if y < end_y {
                let below = i32::from(gray.get_pixel(x, y + 1)[0]);
                if (v - below).abs() > EDGE_DELTA {
                    edges += 1;
                }
            }
        }
    }

    GlyphFeatures {
        aspect: width as f32 / height as f32,
        dark_ratio: dark as f32 / total as f32,
        edge_ratio: edges as f32 / total as f32,
    }
}
