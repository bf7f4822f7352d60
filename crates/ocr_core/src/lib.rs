//! Core pixel pipeline for platescan
//!
//! This crate holds the pure image-processing side of the equipment
//! inspection OCR flow: quality assessment, the per-attempt preprocessing
//! variants, Otsu thresholding, glare suppression, morphological denoising,
//! projection segmentation, and the heuristic recognizer the orchestrator
//! falls back to when the remote vision API is unavailable.
//!
//! Everything here is deterministic, synchronous, and copy-on-transform:
//! no function mutates a caller-visible buffer, so concurrent OCR calls can
//! share source images freely.

pub mod denoise;
pub mod glare;
pub mod local;
pub mod preprocess;
pub mod quality;
pub mod recognize;
pub mod segment;
pub mod threshold;
pub mod types;

pub use types::*;
