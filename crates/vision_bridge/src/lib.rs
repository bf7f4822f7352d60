//! Vision bridge for platescan
//!
//! Layers the remote OCR service and the retry/fallback orchestration on
//! top of the `ocr_core` pixel pipeline. The remote API is an opaque,
//! possibly-failing collaborator: HTTP errors, timeouts and empty answers
//! are all ordinary outcomes that the engine absorbs into retries and,
//! ultimately, the local heuristic fallback.

pub mod client;
pub mod engine;

pub use client::{RemoteError, RemoteOcr, RemoteText, VisionClient, VisionConfig};
pub use engine::{CancelFlag, Engine, EngineConfig, OcrRun, RecognitionOrigin};
