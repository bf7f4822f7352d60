//! Projection-based text segmentation
//!
//! Two-stage analysis over a (roughly) binarized buffer: a horizontal
//! projection histogram isolates candidate text lines, then a vertical
//! projection within each line isolates candidate glyph boxes. Both stages
//! use adaptive minimum densities because printed nameplates and live LCD
//! screens differ hugely in stroke darkness and size; a fixed cutoff that
//! works for one regime fails the other.

use crate::types::{CharCandidate, TextLine};
use image::GrayImage;

/// Pixels darker than this count as ink in the projections.
pub const INK_THRESHOLD: u8 = 160;

/// A line run survives this many consecutive below-minimum rows before it
/// closes; tolerates descender/ascender gaps inside Korean syllable blocks.
const LINE_GAP_TOLERANCE: u32 = 3;

/// Inter-character gaps are narrower than inter-line gaps, so the column
/// runs close faster.
const CHAR_GAP_TOLERANCE: u32 = 2;

const MIN_LINE_HEIGHT: u32 = 2;
const MIN_CHAR_WIDTH: u32 = 2;

/// Padding added when tightening a line's X-extent.
const X_PADDING: u32 = 2;

fn is_ink(v: u8) -> bool {
    v < INK_THRESHOLD
}

/// Stage A: find horizontal text-line bands.
///
/// A row belongs to a run when its ink count reaches
/// `max(1, min(0.01·width, 0.1·average_row_density))`. Surviving runs of
/// height ≥ 2 become [`TextLine`]s with their X-extent tightened to the
/// dark-pixel extremes (±2px).
pub fn detect_text_lines(gray: &GrayImage) -> Vec<TextLine> {
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return Vec::new();
    }

    let mut row_counts = vec![0u32; h as usize];
    for (_, y, pixel) in gray.enumerate_pixels() {
        if is_ink(pixel[0]) {
            row_counts[y as usize] += 1;
        }
    }

    let total: u64 = row_counts.iter().map(|&c| u64::from(c)).sum();
    let avg_row_density = total as f32 / h as f32;
    let min_count = (0.01 * w as f32).min(0.1 * avg_row_density).max(1.0);

    let mut lines = Vec::new();
    let mut run_start: Option<u32> = None;
    let mut last_ink_row = 0u32;
    let mut gap = 0u32;

    let mut close_run = |start: u32, end: u32, lines: &mut Vec<TextLine>| {
        if end - start + 1 >= MIN_LINE_HEIGHT {
            if let Some(line) = tightened_line(gray, start, end) {
                lines.push(line);
            }
        }
    };

    for y in 0..h {
        if row_counts[y as usize] as f32 >= min_count {
            if run_start.is_none() {
                run_start = Some(y);
            }
            last_ink_row = y;
            gap = 0;
        } else if let Some(start) = run_start {
            gap += 1;
            if gap >= LINE_GAP_TOLERANCE {
                close_run(start, last_ink_row, &mut lines);
                run_start = None;
                gap = 0;
            }
        }
    }
    if let Some(start) = run_start {
        close_run(start, last_ink_row, &mut lines);
    }

    tracing::debug!(line_count = lines.len(), "text line detection complete");
    lines
}

/// Tighten a run's X-extent by scanning for the leftmost/rightmost ink
/// pixel within its Y-range. Returns None when the band holds no ink at
/// all (cannot happen for runs produced by the projection, which demand at
/// least one ink pixel per row).
fn tightened_line(gray: &GrayImage, start_y: u32, end_y: u32) -> Option<TextLine> {
    let (w, h) = gray.dimensions();
    let mut min_x = None;
    let mut max_x = 0u32;
    for y in start_y..=end_y {
        for x in 0..w {
            if is_ink(gray.get_pixel(x, y)[0]) {
                min_x = Some(min_x.map_or(x, |m: u32| m.min(x)));
                max_x = max_x.max(x);
            }
        }
    }
    let min_x = min_x?;
    Some(TextLine::clamped(
        min_x.saturating_sub(X_PADDING),
        max_x + X_PADDING,
        start_y,
        end_y,
        w,
        h,
    ))
}

/// Stage B: find glyph boxes inside one text line.
///
/// Column minimum is `max(1, min(0.2·line_height, 0.1·average_column_density))`;
/// runs close after 2 consecutive below-minimum columns; runs of width ≥ 2
/// become [`CharCandidate`]s in left-to-right order.
pub fn detect_char_candidates(gray: &GrayImage, line: &TextLine) -> Vec<CharCandidate> {
    let cols = line.width();
    let mut col_counts = vec![0u32; cols as usize];
    for x in line.start_x..=line.end_x {
        for y in line.start_y..=line.end_y {
            if is_ink(gray.get_pixel(x, y)[0]) {
                col_counts[(x - line.start_x) as usize] += 1;
            }
        }
    }

    let total: u64 = col_counts.iter().map(|&c| u64::from(c)).sum();
    let avg_col_density = total as f32 / cols as f32;
    let min_count = (0.2 * line.height() as f32)
        .min(0.1 * avg_col_density)
        .max(1.0);

    let mut candidates = Vec::new();
    let mut run_start: Option<u32> = None;
    let mut last_ink_col = 0u32;
    let mut gap = 0u32;

    let mut close_run = |start: u32, end: u32, out: &mut Vec<CharCandidate>| {
        if end - start + 1 >= MIN_CHAR_WIDTH {
            out.push(CharCandidate::in_line(line, start, end));
        }
    };

    for i in 0..cols {
        let x = line.start_x + i;
        if col_counts[i as usize] as f32 >= min_count {
            if run_start.is_none() {
                run_start = Some(x);
            }
            last_ink_col = x;
            gap = 0;
        } else if let Some(start) = run_start {
            gap += 1;
            if gap >= CHAR_GAP_TOLERANCE {
                close_run(start, last_ink_col, &mut candidates);
                run_start = None;
                gap = 0;
            }
        }
    }
    if let Some(start) = run_start {
        close_run(start, last_ink_col, &mut candidates);
    }

    candidates
}
